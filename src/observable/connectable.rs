use std::sync::{
  atomic::{AtomicBool, Ordering},
  Arc, Weak,
};

use parking_lot::Mutex;

use super::{Observable, Subscribable};
use crate::{
  disposable::{BoxDisposable, Disposable, SingleAssignmentDisposable},
  event::Event,
  observer::{AnyObserver, Observer},
  subject::{Subject, SubjectKind},
};

/// Both sides of the subject a connectable observable multicasts through.
struct Hub<T> {
  observer: AnyObserver<T>,
  observable: Observable<T>,
}

impl<T> Clone for Hub<T> {
  fn clone(&self) -> Self {
    Hub { observer: self.observer.clone(), observable: self.observable.clone() }
  }
}

type MakeHub<T> = Box<dyn Fn() -> Hub<T> + Send + Sync>;

struct ConnectState<T> {
  hub: Option<Hub<T>>,
  connection: Option<Arc<Connection<T>>>,
}

struct Connectable<T> {
  source: Observable<T>,
  make_hub: MakeHub<T>,
  state: Mutex<ConnectState<T>>,
}

impl<T> Connectable<T> {
  fn hub(&self, state: &mut ConnectState<T>) -> Hub<T> {
    state.hub.get_or_insert_with(|| (self.make_hub)()).clone()
  }
}

impl<T: 'static> Subscribable<T> for Connectable<T> {
  fn subscribe(&self, observer: AnyObserver<T>) -> BoxDisposable {
    let hub = self.hub(&mut self.state.lock());
    hub.observable.subscribe(observer)
  }
}

/// An observable that shares one subscription to its source through a
/// subject, and only subscribes to the source when
/// [`connect`](ConnectableObservable::connect) is called.
///
/// Observers subscribe to the subject. They receive what the subject
/// replays, then whatever the source emits while connected. When the source
/// terminates or the connection is disposed, the subject is let go; the next
/// connection uses a new one from the subject factory (or the same subject
/// again, for [`multicast`](Observable::multicast)).
///
/// ```rust
/// use std::sync::{Arc, Mutex};
///
/// use rxrust_core::prelude::*;
///
/// let published = observable::from_iter(1..=3).publish();
/// let seen = Arc::new(Mutex::new(vec![]));
/// for name in ["a", "b"] {
///   let c_seen = seen.clone();
///   published.subscribe_next(move |v| c_seen.lock().unwrap().push(format!("{name}{v}")));
/// }
/// assert!(seen.lock().unwrap().is_empty());
///
/// published.connect();
/// assert_eq!(*seen.lock().unwrap(), ["a1", "b1", "a2", "b2", "a3", "b3"]);
/// ```
pub struct ConnectableObservable<T> {
  inner: Arc<Connectable<T>>,
}

impl<T> Clone for ConnectableObservable<T> {
  fn clone(&self) -> Self { ConnectableObservable { inner: self.inner.clone() } }
}

impl<T: Clone + Send + 'static> ConnectableObservable<T> {
  pub(crate) fn new<K, F>(source: Observable<T>, make_subject: F) -> Self
  where
    K: SubjectKind<T>,
    F: Fn() -> Subject<T, K> + Send + Sync + 'static,
  {
    let make_hub: MakeHub<T> = Box::new(move || {
      let subject = make_subject();
      Hub { observer: subject.as_observer(), observable: subject.as_observable() }
    });
    ConnectableObservable {
      inner: Arc::new(Connectable {
        source,
        make_hub,
        state: Mutex::new(ConnectState { hub: None, connection: None }),
      }),
    }
  }
}

impl<T: 'static> ConnectableObservable<T> {
  /// Subscribes `observer` to the current subject. Does not connect.
  pub fn subscribe(&self, observer: AnyObserver<T>) -> BoxDisposable {
    self.inner.subscribe(observer)
  }

  /// Like [`Observable::subscribe_next`].
  pub fn subscribe_next<N>(&self, next: N) -> BoxDisposable
  where
    N: FnMut(T) + Send + 'static,
  {
    self.as_observable().subscribe_next(next)
  }

  /// The subscribing side as a plain observable.
  pub fn as_observable(&self) -> Observable<T> { Observable::from(self.inner.clone()) }

  /// Subscribes the subject to the source.
  ///
  /// While a connection exists, calling `connect` again returns a handle to
  /// that same connection. Disposing any handle ends the connection.
  pub fn connect(&self) -> BoxDisposable {
    let (connection, is_new) = self.connection();
    if is_new {
      self.run(&connection);
    }
    Box::new(connection)
  }

  /// Like [`connect`](Self::connect), but assigns the handle to `handle`
  /// before the source is subscribed, so a synchronous source can be
  /// cancelled through it while it is still emitting.
  pub(crate) fn connect_into(&self, handle: &SingleAssignmentDisposable) {
    let (connection, is_new) = self.connection();
    handle.set(Box::new(connection.clone()));
    if is_new {
      self.run(&connection);
    }
  }

  /// The current connection, and whether it was created by this call.
  fn connection(&self) -> (Arc<Connection<T>>, bool) {
    let mut state = self.inner.state.lock();
    if let Some(connection) = &state.connection {
      return (connection.clone(), false);
    }
    let hub = self.inner.hub(&mut state);
    let connection = Arc::new(Connection {
      parent: Arc::downgrade(&self.inner),
      subject: hub.observer,
      subscription: SingleAssignmentDisposable::new(),
      disposed: AtomicBool::new(false),
    });
    state.connection = Some(connection.clone());
    (connection, true)
  }

  fn run(&self, connection: &Arc<Connection<T>>) {
    tracing::trace!("connectable observable connecting");
    let subscription = self.inner.source.subscribe(connection.clone());
    connection.subscription.set(subscription);
  }

  /// Whether the source is currently subscribed.
  pub fn is_connected(&self) -> bool { self.inner.state.lock().connection.is_some() }
}

/// The source subscription of one connection. Forwards into the subject.
struct Connection<T> {
  parent: Weak<Connectable<T>>,
  subject: AnyObserver<T>,
  subscription: SingleAssignmentDisposable,
  disposed: AtomicBool,
}

impl<T> Connection<T> {
  /// Detaches from the parent, which then starts over with a new subject,
  /// and releases the source subscription.
  fn release(&self) {
    if let Some(parent) = self.parent.upgrade() {
      let (connection, hub) = {
        let mut state = parent.state.lock();
        let current =
          state.connection.as_ref().is_some_and(|c| std::ptr::eq(Arc::as_ptr(c), self));
        if current {
          (state.connection.take(), state.hub.take())
        } else {
          (None, None)
        }
      };
      drop((connection, hub));
    }
    self.subscription.dispose();
  }
}

impl<T> Observer<T> for Connection<T> {
  fn on(&self, event: Event<T>) {
    if event.is_terminal() {
      if !self.disposed.swap(true, Ordering::AcqRel) {
        self.release();
        self.subject.on(event);
      }
    } else if !self.disposed.load(Ordering::Acquire) {
      self.subject.on(event);
    }
  }

  fn is_closed(&self) -> bool { self.disposed.load(Ordering::Acquire) || self.subject.is_closed() }
}

impl<T> Disposable for Connection<T> {
  fn dispose(&self) {
    if !self.disposed.swap(true, Ordering::AcqRel) {
      tracing::trace!("connectable observable disconnected");
      self.release();
    }
  }

  fn is_disposed(&self) -> bool { self.disposed.load(Ordering::Acquire) }
}
