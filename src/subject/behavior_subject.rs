use smallvec::{smallvec, SmallVec};

use super::{Emission, Replayed, Subject, SubjectKind};
use crate::{error::RxError, event::Event};

/// State of a [`BehaviorSubject`]: the latest value.
#[derive(Debug, Clone)]
pub struct Behavior<T>(Option<T>);

impl<T> Default for Behavior<T> {
  fn default() -> Self { Behavior(None) }
}

impl<T: Clone + Send + 'static> SubjectKind<T> for Behavior<T> {
  const NAME: &'static str = "BehaviorSubject";

  fn update(&mut self, event: Event<T>) -> Emission<T> {
    if let Event::Next(v) = &event {
      self.0 = Some(v.clone());
    }
    smallvec![event]
  }

  fn replay(&self, stopped: Option<&Event<T>>) -> Replayed<T> {
    match (stopped, &self.0) {
      (None, Some(v)) => smallvec![v.clone()],
      _ => SmallVec::new(),
    }
  }
}

/// Remembers the latest value and hands it to every new subscriber within
/// its `subscribe` call.
///
/// ```rust
/// use rxrust_core::prelude::*;
///
/// let subject = BehaviorSubject::new("initial");
/// let seen = std::sync::Arc::new(std::sync::Mutex::new(vec![]));
/// let c_seen = seen.clone();
/// subject.as_observable().subscribe_next(move |v| c_seen.lock().unwrap().push(v));
/// subject.on_next("updated");
///
/// assert_eq!(*seen.lock().unwrap(), vec!["initial", "updated"]);
/// assert_eq!(subject.value(), Ok("updated"));
/// ```
pub type BehaviorSubject<T> = Subject<T, Behavior<T>>;

impl<T: Clone + Send + 'static> Subject<T, Behavior<T>> {
  pub fn new(seed: T) -> Self { Self::with_kind(Behavior(Some(seed))) }

  /// The latest value, or the error the subject stopped with.
  pub fn value(&self) -> Result<T, RxError> {
    let state = self.core.state.lock();
    if state.disposed {
      return Err(RxError::Disposed(<Behavior<T> as SubjectKind<T>>::NAME));
    }
    if let Some(Event::Error(e)) = &state.stopped {
      return Err(e.clone());
    }
    state.kind.0.clone().ok_or(RxError::NoElements)
  }
}
