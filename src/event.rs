//! The event grammar: `Next* (Error | Completed)?`.

use crate::error::RxError;

/// A single notification pushed from an observable to an observer.
#[derive(Debug, Clone, PartialEq)]
pub enum Event<T> {
  /// The next element of the sequence.
  Next(T),
  /// The sequence failed. Terminal.
  Error(RxError),
  /// The sequence finished successfully. Terminal.
  Completed,
}

impl<T> Event<T> {
  /// `true` for `Error` and `Completed`.
  #[inline]
  pub fn is_terminal(&self) -> bool { !matches!(self, Event::Next(_)) }

  #[inline]
  pub fn is_completed(&self) -> bool { matches!(self, Event::Completed) }

  /// The element carried by a `Next` event.
  pub fn element(&self) -> Option<&T> {
    match self {
      Event::Next(v) => Some(v),
      _ => None,
    }
  }

  /// Consumes the event, returning the element of a `Next` event.
  pub fn into_element(self) -> Option<T> {
    match self {
      Event::Next(v) => Some(v),
      _ => None,
    }
  }

  /// The error carried by an `Error` event.
  pub fn error(&self) -> Option<&RxError> {
    match self {
      Event::Error(e) => Some(e),
      _ => None,
    }
  }

  /// Maps the element of a `Next` event, keeping terminal events as they are.
  pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Event<U> {
    match self {
      Event::Next(v) => Event::Next(f(v)),
      Event::Error(e) => Event::Error(e),
      Event::Completed => Event::Completed,
    }
  }

  /// Like [`Event::map`] but for a fallible transform; a failed transform
  /// becomes an `Error` event.
  pub fn try_map<U>(self, f: impl FnOnce(T) -> Result<U, RxError>) -> Event<U> {
    match self {
      Event::Next(v) => match f(v) {
        Ok(u) => Event::Next(u),
        Err(e) => Event::Error(e),
      },
      Event::Error(e) => Event::Error(e),
      Event::Completed => Event::Completed,
    }
  }

  /// Re-types a terminal event. Returns `None` for `Next`.
  pub(crate) fn terminal<U>(&self) -> Option<Event<U>> {
    match self {
      Event::Next(_) => None,
      Event::Error(e) => Some(Event::Error(e.clone())),
      Event::Completed => Some(Event::Completed),
    }
  }
}

impl<T> From<Result<T, RxError>> for Event<T> {
  fn from(r: Result<T, RxError>) -> Self {
    match r {
      Ok(v) => Event::Next(v),
      Err(e) => Event::Error(e),
    }
  }
}
