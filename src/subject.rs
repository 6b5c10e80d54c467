//! Subjects: objects that are an observer and an observable at once.
//!
//! A subject broadcasts what it observes to every current subscriber. The
//! variants differ in what they remember for late subscribers:
//!
//! | Subject | A new subscriber first receives |
//! |---------|---------------------------------|
//! | [`PublishSubject`] | nothing, only later events |
//! | [`BehaviorSubject`] | the latest value (or the seed) |
//! | [`ReplaySubject`] | up to the last `n` values |
//! | [`AsyncSubject`] | the last value, once the subject completed |
//!
//! Once a subject received a terminal event it is stopped: later emissions
//! are ignored and new subscribers receive whatever the variant replays,
//! followed by the terminal event.
//!
//! # Ordering
//!
//! Emission runs through the subject's [`AsyncLock`]. All observers see the
//! same event order even when several threads emit concurrently, and an
//! observer may emit into the subject it is observing: such a re-entrant
//! emission runs right after the current dispatch finishes.
//!
//! `subscribe` registers the observer and takes the replay in one step under
//! the state lock, then delivers the replay on the calling thread before it
//! returns. Events dispatched meanwhile are held back for that observer
//! until its replay is through. The state lock is never held while
//! observers run.

use std::{
  collections::VecDeque,
  sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Weak,
  },
};

use parking_lot::Mutex;
use smallvec::SmallVec;

use crate::{
  async_lock::AsyncLock,
  bag::{Bag, BagKey},
  disposable::{BoxDisposable, Disposable},
  error::RxError,
  event::Event,
  observable::{Observable, Subscribable},
  observer::{AnyObserver, Observer},
  resources::TraceResource,
};

mod async_subject;
mod behavior_subject;
mod publish_subject;
mod replay_subject;

pub use async_subject::{AsyncLast, AsyncSubject};
pub use behavior_subject::{Behavior, BehaviorSubject};
pub use publish_subject::{Publish, PublishSubject};
pub use replay_subject::{Replay, ReplaySubject};

// ============================================================================
// SubjectKind
// ============================================================================

/// Events a subject forwards for one emission.
pub type Emission<T> = SmallVec<[Event<T>; 2]>;

/// Values replayed to a new subscriber.
pub type Replayed<T> = SmallVec<[T; 1]>;

/// The memory of a subject variant.
///
/// Implemented by the marker/state types behind [`PublishSubject`],
/// [`BehaviorSubject`], [`ReplaySubject`] and [`AsyncSubject`].
pub trait SubjectKind<T>: Default + Send + 'static {
  /// Name used in diagnostics and in [`RxError::Disposed`].
  const NAME: &'static str;

  /// Records `event` and returns what to forward to the current observers.
  /// Only called while the subject is active.
  fn update(&mut self, event: Event<T>) -> Emission<T>;

  /// Values a new subscriber receives before anything else. `stopped` is
  /// the terminal event if the subject already stopped.
  fn replay(&self, stopped: Option<&Event<T>>) -> Replayed<T>;
}

// ============================================================================
// SubjectCore
// ============================================================================

/// One registered observer. Skipped once its subscription is disposed, even
/// by a dispatch that already took a snapshot of the observers.
struct SubjectObserver<T> {
  observer: AnyObserver<T>,
  active: AtomicBool,
  /// `Some` until the subscriber delivered the replay. Collects the events
  /// dispatched meanwhile.
  held: Mutex<Option<VecDeque<Event<T>>>>,
}

impl<T> SubjectObserver<T> {
  fn new(observer: AnyObserver<T>) -> Self {
    SubjectObserver {
      observer,
      active: AtomicBool::new(true),
      held: Mutex::new(Some(VecDeque::new())),
    }
  }

  fn deliver(&self, event: Event<T>) {
    if !self.active.load(Ordering::Acquire) {
      return;
    }
    if let Some(held) = self.held.lock().as_mut() {
      held.push_back(event);
      return;
    }
    self.observer.on(event);
  }

  #[inline]
  fn send(&self, event: Event<T>) {
    if self.active.load(Ordering::Acquire) {
      self.observer.on(event);
    }
  }

  /// Delivers the replay, then the events held back meanwhile, and switches
  /// to direct delivery.
  fn replay(&self, initial: Initial<T>) {
    for value in initial.values {
      self.send(Event::Next(value));
    }
    if let Some(terminal) = initial.terminal {
      self.send(terminal);
    }
    loop {
      let next = {
        let mut held = self.held.lock();
        match held.as_mut().and_then(VecDeque::pop_front) {
          Some(next) => next,
          None => {
            *held = None;
            return;
          }
        }
      };
      self.send(next);
    }
  }
}

/// What a new subscriber receives before live events.
struct Initial<T> {
  values: Replayed<T>,
  terminal: Option<Event<T>>,
}

struct SubjectState<T, K> {
  observers: Bag<Arc<SubjectObserver<T>>>,
  stopped: Option<Event<T>>,
  disposed: bool,
  kind: K,
}

struct SubjectCore<T, K> {
  state: Mutex<SubjectState<T, K>>,
  emit: AsyncLock,
  _trace: TraceResource,
}

impl<T, K> SubjectCore<T, K>
where
  T: Clone + Send + 'static,
  K: SubjectKind<T>,
{
  fn new(kind: K) -> Self {
    SubjectCore {
      state: Mutex::new(SubjectState {
        observers: Bag::new(),
        stopped: None,
        disposed: false,
        kind,
      }),
      emit: AsyncLock::new(),
      _trace: TraceResource::new(),
    }
  }

  fn dispatch(&self, event: Event<T>) {
    let mut state = self.state.lock();
    if state.disposed || state.stopped.is_some() {
      return;
    }
    let events = state.kind.update(event);
    let terminal = events.last().filter(|e| e.is_terminal()).cloned();
    let observers = match terminal {
      Some(terminal) => {
        tracing::trace!(subject = K::NAME, terminal = ?terminal.error(), "subject stopped");
        state.stopped = Some(terminal);
        state.observers.take_all()
      }
      None => state.observers.snapshot(),
    };
    drop(state);

    for event in events {
      for observer in observers.iter() {
        observer.deliver(event.clone());
      }
    }
  }

  /// Registers `registration` and takes its replay in one step.
  fn register(&self, registration: &Arc<SubjectObserver<T>>) -> (SubscriptionState, Initial<T>) {
    let mut state = self.state.lock();
    if state.disposed {
      let terminal = Some(Event::Error(RxError::Disposed(K::NAME)));
      return (SubscriptionState::Cancelled, Initial { values: Replayed::new(), terminal });
    }
    let values = state.kind.replay(state.stopped.as_ref());
    let terminal = state.stopped.clone();
    let subscription = match terminal {
      Some(_) => SubscriptionState::Cancelled,
      None => SubscriptionState::Ready(state.observers.insert(registration.clone())),
    };
    (subscription, Initial { values, terminal })
  }
}

// ============================================================================
// SubjectSubscription
// ============================================================================

/// Registration state of a subject subscription.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum SubscriptionState {
  /// Registered under this key.
  Ready(BagKey),
  /// Disposed, or never registered because the subject had stopped.
  Cancelled,
}

/// Removes one observer from its subject. Holds the subject weakly, so an
/// outstanding subscription does not keep a dropped subject alive.
struct SubjectSubscription<T, K> {
  core: Weak<SubjectCore<T, K>>,
  registration: Arc<SubjectObserver<T>>,
  state: Mutex<SubscriptionState>,
}

impl<T, K> Disposable for SubjectSubscription<T, K>
where
  T: Send + 'static,
  K: Send + 'static,
{
  fn dispose(&self) {
    self.registration.active.store(false, Ordering::Release);
    let prev = std::mem::replace(&mut *self.state.lock(), SubscriptionState::Cancelled);
    if let (SubscriptionState::Ready(key), Some(core)) = (prev, self.core.upgrade()) {
      let removed = core.state.lock().observers.remove(key);
      drop(removed);
    }
  }

  fn is_disposed(&self) -> bool {
    !self.registration.active.load(Ordering::Acquire)
      || *self.state.lock() == SubscriptionState::Cancelled
  }
}

// ============================================================================
// Subject
// ============================================================================

/// A subject of variant `K`. Use the aliases [`PublishSubject`],
/// [`BehaviorSubject`], [`ReplaySubject`] and [`AsyncSubject`].
///
/// Clones share the same subject.
pub struct Subject<T, K> {
  core: Arc<SubjectCore<T, K>>,
}

impl<T, K> Clone for Subject<T, K> {
  fn clone(&self) -> Self { Subject { core: self.core.clone() } }
}

impl<T, K> Subject<T, K>
where
  T: Clone + Send + 'static,
  K: SubjectKind<T>,
{
  pub(crate) fn with_kind(kind: K) -> Self {
    Subject { core: Arc::new(SubjectCore::new(kind)) }
  }

  /// The observable side of this subject.
  pub fn as_observable(&self) -> Observable<T> { Observable::new(self.clone()) }

  /// The observer side of this subject, for subscribing it to a source.
  pub fn as_observer(&self) -> AnyObserver<T> { Arc::new(self.clone()) }

  /// Whether any observer is currently subscribed.
  pub fn has_observers(&self) -> bool { !self.core.state.lock().observers.is_empty() }

  /// Whether the subject received a terminal event.
  pub fn is_stopped(&self) -> bool { self.core.state.lock().stopped.is_some() }

  /// Tears the subject down without a terminal event.
  ///
  /// Current observers are dropped without being notified, remembered values
  /// are released, later emissions are ignored and later subscribers receive
  /// [`RxError::Disposed`].
  pub fn dispose(&self) {
    let (observers, kind) = {
      let mut state = self.core.state.lock();
      if state.disposed {
        return;
      }
      state.disposed = true;
      (state.observers.take_all(), std::mem::take(&mut state.kind))
    };
    tracing::trace!(subject = K::NAME, "subject disposed");
    for observer in observers.iter() {
      observer.active.store(false, Ordering::Release);
    }
    drop((observers, kind));
  }

  /// Whether [`dispose`](Self::dispose) was called.
  pub fn is_disposed(&self) -> bool { self.core.state.lock().disposed }
}

impl<T, K> Observer<T> for Subject<T, K>
where
  T: Clone + Send + 'static,
  K: SubjectKind<T>,
{
  fn on(&self, event: Event<T>) {
    let core = self.core.clone();
    self.core.emit.wait(move || core.dispatch(event));
  }

  fn is_closed(&self) -> bool {
    let state = self.core.state.lock();
    state.disposed || state.stopped.is_some()
  }
}

impl<T, K> Subscribable<T> for Subject<T, K>
where
  T: Clone + Send + 'static,
  K: SubjectKind<T>,
{
  fn subscribe(&self, observer: AnyObserver<T>) -> BoxDisposable {
    let registration = Arc::new(SubjectObserver::new(observer));
    let (state, initial) = self.core.register(&registration);
    registration.replay(initial);
    Box::new(SubjectSubscription {
      core: Arc::downgrade(&self.core),
      registration,
      state: Mutex::new(state),
    })
  }
}

#[cfg(test)]
pub(crate) mod test_util {
  use std::sync::{Arc, Mutex};

  use crate::{
    event::Event,
    observer::{self, AnyObserver},
  };

  pub(crate) type Log<T> = Arc<Mutex<Vec<Event<T>>>>;

  /// An observer that records every event it receives.
  pub(crate) fn recorder<T: Send + 'static>() -> (Log<T>, AnyObserver<T>) {
    let log = Arc::new(Mutex::new(vec![]));
    let c_log = log.clone();
    (log, observer::from_fn(move |e| c_log.lock().unwrap().push(e)))
  }

  pub(crate) fn values<T: Clone>(log: &Log<T>) -> Vec<T> {
    log.lock().unwrap().iter().filter_map(|e| e.element().cloned()).collect()
  }
}
