use std::{convert::Infallible, error::Error, sync::Arc};

use crate::{
  disposable::BoxDisposable,
  error::RxError,
  event::Event,
  observable::{Observable, Subscribable},
  observer::{AnyObserver, Observer},
  sink::{impl_is_closed, run, Operator, Sink},
};

type Predicate<T> = Arc<dyn Fn(&T) -> Result<bool, RxError> + Send + Sync>;

impl<T: 'static> Observable<T> {
  /// Emits only the values for which `predicate` returns `true`.
  pub fn filter<F>(self, predicate: F) -> Observable<T>
  where
    F: Fn(&T) -> bool + Send + Sync + 'static,
  {
    self.try_filter(move |v| Ok::<_, Infallible>(predicate(v)))
  }

  /// Like [`filter`](Self::filter), but the predicate may fail. A failure
  /// ends the subscription with [`RxError::Callback`].
  pub fn try_filter<E, F>(self, predicate: F) -> Observable<T>
  where
    E: Error + Send + Sync + 'static,
    F: Fn(&T) -> Result<bool, E> + Send + Sync + 'static,
  {
    Observable::new(FilterOp {
      source: self,
      predicate: Arc::new(move |v| predicate(v).map_err(RxError::callback)),
    })
  }
}

struct FilterOp<T> {
  source: Observable<T>,
  predicate: Predicate<T>,
}

impl<T: 'static> Subscribable<T> for FilterOp<T> {
  fn subscribe(&self, observer: AnyObserver<T>) -> BoxDisposable {
    run(
      &self.source,
      Arc::new(FilterSink { sink: Sink::new(observer), predicate: self.predicate.clone() }),
    )
  }
}

struct FilterSink<T> {
  sink: Sink<T>,
  predicate: Predicate<T>,
}

impl<T: 'static> Operator for FilterSink<T> {
  type Output = T;

  #[inline]
  fn sink(&self) -> &Sink<T> { &self.sink }
}

impl<T: 'static> Observer<T> for FilterSink<T> {
  fn on(&self, event: Event<T>) {
    match event {
      Event::Next(v) => {
        if self.sink.is_stopped() {
          return;
        }
        match (self.predicate)(&v) {
          Ok(true) => self.sink.forward_next(v),
          Ok(false) => {}
          Err(err) => self.sink.fail(err),
        }
      }
      terminal => self.sink.forward(terminal),
    }
  }

  impl_is_closed!();
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{
    observable::{from_iter, of},
    ops::test_util::{events, record},
  };

  #[test]
  fn keeps_matching_values() {
    let log = record(&from_iter(0..10).filter(|v| v % 3 == 0));
    assert_eq!(
      events(&log),
      vec![Event::Next(0), Event::Next(3), Event::Next(6), Event::Next(9), Event::Completed]
    );
  }

  #[test]
  fn fallible_predicate() {
    let parsed = of(["1", "22", "x", "4"]).try_filter(|s| s.parse::<i32>().map(|n| n > 5));
    let log = events(&record(&parsed));
    assert_eq!(log[0], Event::Next("22"));
    assert!(log[1].error().is_some_and(RxError::is_callback));
    assert_eq!(log.len(), 2);
  }
}
