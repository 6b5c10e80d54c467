use smallvec::{smallvec, SmallVec};

use super::{Emission, Replayed, Subject, SubjectKind};
use crate::event::Event;

/// Marker for a subject that remembers nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct Publish;

impl<T: Send + 'static> SubjectKind<T> for Publish {
  const NAME: &'static str = "PublishSubject";

  #[inline]
  fn update(&mut self, event: Event<T>) -> Emission<T> { smallvec![event] }

  #[inline]
  fn replay(&self, _: Option<&Event<T>>) -> Replayed<T> { SmallVec::new() }
}

/// Broadcasts events to the observers subscribed at the time of emission.
///
/// A subscriber that arrives after the subject stopped only receives the
/// terminal event.
pub type PublishSubject<T> = Subject<T, Publish>;

impl<T: Clone + Send + 'static> Subject<T, Publish> {
  pub fn new() -> Self { Self::with_kind(Publish) }
}

impl<T: Clone + Send + 'static> Default for Subject<T, Publish> {
  fn default() -> Self { Self::new() }
}
