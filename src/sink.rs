//! The operator composition engine.
//!
//! Every operator is an [`Observable`] whose subscription builds a sink: an
//! observer of the upstream element type that owns the upstream subscription
//! and forwards transformed events to the downstream observer. [`Sink`] is
//! the part every operator shares. It
//!
//! - keeps one `stopped` flag for all event paths of the subscription, so no
//!   event passes after the first terminal one,
//! - disposes its upstream right after forwarding a terminal event
//!   ("auto-detach"),
//! - turns failing user callbacks into a downstream `Error`.

use std::sync::{
  atomic::{AtomicBool, Ordering},
  Arc,
};

use crate::{
  disposable::{BoxDisposable, Disposable, SingleAssignmentDisposable},
  error::RxError,
  event::Event,
  observable::Observable,
  observer::{AnyObserver, Observer},
  resources::TraceResource,
};

/// Downstream half of an operator.
pub(crate) struct Sink<T> {
  observer: AnyObserver<T>,
  stopped: AtomicBool,
  upstream: SingleAssignmentDisposable,
  _trace: TraceResource,
}

impl<T> Sink<T> {
  pub(crate) fn new(observer: AnyObserver<T>) -> Self {
    Sink {
      observer,
      stopped: AtomicBool::new(false),
      upstream: SingleAssignmentDisposable::new(),
      _trace: TraceResource::new(),
    }
  }

  /// Forwards `event` unless the sink already stopped. A terminal event
  /// stops the sink and detaches it from upstream.
  pub(crate) fn forward(&self, event: Event<T>) {
    if event.is_terminal() {
      if !self.stopped.swap(true, Ordering::AcqRel) {
        self.observer.on(event);
        self.upstream.dispose();
      }
    } else if !self.stopped.load(Ordering::Acquire) {
      self.observer.on(event);
    }
  }

  #[inline]
  pub(crate) fn forward_next(&self, value: T) { self.forward(Event::Next(value)) }

  #[inline]
  pub(crate) fn forward_error(&self, err: RxError) { self.forward(Event::Error(err)) }

  #[inline]
  pub(crate) fn forward_completed(&self) { self.forward(Event::Completed) }

  /// Forwards the terminal part of an upstream event of another element
  /// type. `Next` events are ignored.
  pub(crate) fn forward_terminal<U>(&self, event: Event<U>) {
    match event {
      Event::Next(_) => {}
      Event::Error(e) => self.forward_error(e),
      Event::Completed => self.forward_completed(),
    }
  }

  /// Terminates the subscription with the error of a failing user callback.
  pub(crate) fn fail(&self, err: RxError) {
    tracing::debug!(error = %err, "user callback failed, terminating subscription");
    self.forward_error(err);
  }

  /// Whether nothing more will be forwarded, either because this sink
  /// stopped or because everything downstream did.
  #[inline]
  pub(crate) fn is_stopped(&self) -> bool {
    self.stopped.load(Ordering::Acquire) || self.observer.is_closed()
  }

  #[inline]
  pub(crate) fn set_upstream(&self, upstream: BoxDisposable) { self.upstream.set(upstream) }

  pub(crate) fn dispose(&self) {
    self.stopped.store(true, Ordering::Release);
    self.upstream.dispose();
  }
}

/// An operator's observer that owns a [`Sink`].
pub(crate) trait Operator: Send + Sync + 'static {
  type Output;

  fn sink(&self) -> &Sink<Self::Output>;

  /// Cancels the subscription. Operators holding more than their upstream
  /// subscription release it here as well.
  fn dispose(&self) { self.sink().dispose() }
}

/// The disposable handed back to the subscriber of an operator.
pub(crate) struct SinkDisposable<S>(pub(crate) Arc<S>);

impl<S: Operator> Disposable for SinkDisposable<S> {
  #[inline]
  fn dispose(&self) { Operator::dispose(&*self.0) }

  #[inline]
  fn is_disposed(&self) -> bool { self.0.sink().stopped.load(Ordering::Acquire) }
}

/// Subscribes `sink` to `source` and returns the subscription of the
/// operator.
pub(crate) fn run<T, S>(source: &Observable<T>, sink: Arc<S>) -> BoxDisposable
where
  T: 'static,
  S: Operator + Observer<T>,
{
  let upstream = source.subscribe(sink.clone());
  sink.sink().set_upstream(upstream);
  Box::new(SinkDisposable(sink))
}

/// Closes the observer contract over a sink's stop state. Used by every
/// single-source operator's `Observer` impl.
macro_rules! impl_is_closed {
  () => {
    #[inline]
    fn is_closed(&self) -> bool { crate::sink::Operator::sink(self).is_stopped() }
  };
}

pub(crate) use impl_is_closed;
