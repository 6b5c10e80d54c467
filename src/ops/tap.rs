use std::sync::Arc;

use crate::{
  disposable::BoxDisposable,
  event::Event,
  observable::{Observable, Subscribable},
  observer::{AnyObserver, Observer},
  sink::{impl_is_closed, run, Operator, Sink},
};

type TapFn<T> = Arc<dyn Fn(&T) + Send + Sync>;

impl<T: 'static> Observable<T> {
  /// Calls `f` with a reference to every value before passing the value on.
  pub fn tap<F>(self, f: F) -> Observable<T>
  where
    F: Fn(&T) + Send + Sync + 'static,
  {
    Observable::new(TapOp { source: self, f: Arc::new(f) })
  }
}

struct TapOp<T> {
  source: Observable<T>,
  f: TapFn<T>,
}

impl<T: 'static> Subscribable<T> for TapOp<T> {
  fn subscribe(&self, observer: AnyObserver<T>) -> BoxDisposable {
    run(&self.source, Arc::new(TapSink { sink: Sink::new(observer), f: self.f.clone() }))
  }
}

struct TapSink<T> {
  sink: Sink<T>,
  f: TapFn<T>,
}

impl<T: 'static> Operator for TapSink<T> {
  type Output = T;

  #[inline]
  fn sink(&self) -> &Sink<T> { &self.sink }
}

impl<T: 'static> Observer<T> for TapSink<T> {
  fn on(&self, event: Event<T>) {
    if let Event::Next(v) = &event {
      if self.sink.is_stopped() {
        return;
      }
      (self.f)(v);
    }
    self.sink.forward(event);
  }

  impl_is_closed!();
}
