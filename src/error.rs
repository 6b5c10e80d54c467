//! Error carried by [`Event::Error`](crate::event::Event::Error).
//!
//! Three kinds of failure exist in the pipeline:
//!
//! - **Callback errors**: a fallible user closure (`try_map`, `try_filter`,
//!   `try_zip`, ...) returned `Err`. The operator converts it into
//!   [`RxError::Callback`] and terminates the subscription.
//! - **Sequence errors**: a producer emitted an explicit error, usually
//!   [`RxError::Sequence`] or [`RxError::Message`].
//! - **Programmer errors**: invariant violations such as assigning a
//!   [`SingleAssignmentDisposable`](crate::disposable::SingleAssignmentDisposable)
//!   twice. These are not represented here; they panic.

use std::{borrow::Cow, error::Error, sync::Arc};

use thiserror::Error;

/// The error half of the event grammar.
///
/// `RxError` is cheap to clone so that a single error can be multicast by
/// subjects to every registered observer.
#[non_exhaustive]
#[derive(Error, Debug, Clone)]
pub enum RxError {
  /// A user supplied transform, predicate or combiner failed.
  #[error("callback failed: {0}")]
  Callback(Arc<dyn Error + Send + Sync>),

  /// A producer emitted an error of its own.
  #[error("{0}")]
  Sequence(Arc<dyn Error + Send + Sync>),

  /// A producer emitted a plain message.
  #[error("{0}")]
  Message(Cow<'static, str>),

  /// A blocking bridge expected at least one element.
  #[error("sequence contains no elements")]
  NoElements,

  /// A blocking bridge expected exactly one element.
  #[error("sequence contains more than one element")]
  MoreThanOneElement,

  /// A blocking bridge gave up waiting for the terminal event.
  #[error("timed out waiting for the sequence to terminate")]
  Timeout,

  /// The named object was already disposed.
  #[error("object `{0}` was already disposed")]
  Disposed(&'static str),
}

impl RxError {
  /// Wraps the error of a user callback.
  pub fn callback<E>(err: E) -> Self
  where
    E: Error + Send + Sync + 'static,
  {
    RxError::Callback(Arc::new(err))
  }

  /// Wraps an error raised by a producer.
  pub fn sequence<E>(err: E) -> Self
  where
    E: Error + Send + Sync + 'static,
  {
    RxError::Sequence(Arc::new(err))
  }

  /// Creates a sequence error from a message.
  pub fn msg(msg: impl Into<Cow<'static, str>>) -> Self { RxError::Message(msg.into()) }

  /// Returns a short stable label (snake_case) for use in logs.
  pub fn as_label(&self) -> &'static str {
    match self {
      RxError::Callback(_) => "callback",
      RxError::Sequence(_) | RxError::Message(_) => "sequence",
      RxError::NoElements => "no_elements",
      RxError::MoreThanOneElement => "more_than_one_element",
      RxError::Timeout => "timeout",
      RxError::Disposed(_) => "disposed",
    }
  }

  /// `true` when the error was produced by a failing user callback.
  pub fn is_callback(&self) -> bool { matches!(self, RxError::Callback(_)) }
}

/// Errors compare by kind and rendered message; wrapped sources are opaque.
impl PartialEq for RxError {
  fn eq(&self, other: &Self) -> bool {
    match (self, other) {
      (RxError::Callback(a), RxError::Callback(b))
      | (RxError::Sequence(a), RxError::Sequence(b)) => {
        Arc::ptr_eq(a, b) || a.to_string() == b.to_string()
      }
      (RxError::Message(a), RxError::Message(b)) => a == b,
      (RxError::Disposed(a), RxError::Disposed(b)) => a == b,
      (RxError::NoElements, RxError::NoElements)
      | (RxError::MoreThanOneElement, RxError::MoreThanOneElement)
      | (RxError::Timeout, RxError::Timeout) => true,
      _ => false,
    }
  }
}
