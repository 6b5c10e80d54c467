use smallvec::{smallvec, SmallVec};

use super::{Emission, Replayed, Subject, SubjectKind};
use crate::event::Event;

/// State of an [`AsyncSubject`]: the last value seen.
#[derive(Debug, Clone)]
pub struct AsyncLast<T>(Option<T>);

impl<T> Default for AsyncLast<T> {
  fn default() -> Self { AsyncLast(None) }
}

impl<T: Clone + Send + 'static> SubjectKind<T> for AsyncLast<T> {
  const NAME: &'static str = "AsyncSubject";

  fn update(&mut self, event: Event<T>) -> Emission<T> {
    match event {
      Event::Next(v) => {
        self.0 = Some(v);
        SmallVec::new()
      }
      Event::Completed => match &self.0 {
        Some(v) => smallvec![Event::Next(v.clone()), Event::Completed],
        None => smallvec![Event::Completed],
      },
      err @ Event::Error(_) => {
        self.0 = None;
        smallvec![err]
      }
    }
  }

  fn replay(&self, stopped: Option<&Event<T>>) -> Replayed<T> {
    match (stopped, &self.0) {
      (Some(Event::Completed), Some(v)) => smallvec![v.clone()],
      _ => SmallVec::new(),
    }
  }
}

/// Emits only the last value, and only once the source completed.
///
/// An error discards the value and is forwarded alone.
pub type AsyncSubject<T> = Subject<T, AsyncLast<T>>;

impl<T: Clone + Send + 'static> Subject<T, AsyncLast<T>> {
  pub fn new() -> Self { Self::with_kind(AsyncLast(None)) }
}

impl<T: Clone + Send + 'static> Default for Subject<T, AsyncLast<T>> {
  fn default() -> Self { Self::new() }
}
