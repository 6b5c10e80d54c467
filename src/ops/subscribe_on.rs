use std::sync::Arc;

use crate::{
  disposable::{BoxDisposable, SerialDisposable, SingleAssignmentDisposable},
  event::Event,
  observable::{Observable, Subscribable},
  observer::{AnyObserver, Observer},
  scheduler::{ScheduledDisposable, Scheduler, SchedulerRef},
  sink::{impl_is_closed, Operator, Sink, SinkDisposable},
};

impl<T: 'static> Observable<T> {
  /// Subscribes to the source, and later unsubscribes from it, on
  /// `scheduler`.
  ///
  /// Only the subscription side effects move. Where the events are
  /// delivered is up to the source; use
  /// [`observe_on`](Self::observe_on) to move those.
  pub fn subscribe_on<S>(self, scheduler: S) -> Observable<T>
  where
    S: Scheduler + 'static,
  {
    Observable::new(SubscribeOnOp { source: self, scheduler: Arc::new(scheduler) })
  }
}

struct SubscribeOnOp<T> {
  source: Observable<T>,
  scheduler: SchedulerRef,
}

impl<T: 'static> Subscribable<T> for SubscribeOnOp<T> {
  fn subscribe(&self, observer: AnyObserver<T>) -> BoxDisposable {
    let sink = Arc::new(SubscribeOnSink { sink: Sink::new(observer) });
    let everything = Arc::new(SerialDisposable::new());
    sink.sink.set_upstream(Box::new(everything.clone()));

    let cancel_schedule = Arc::new(SingleAssignmentDisposable::new());
    everything.set(Box::new(cancel_schedule.clone()));

    let (source, scheduler) = (self.source.clone(), self.scheduler.clone());
    let c_sink = sink.clone();
    cancel_schedule.set(self.scheduler.schedule(Box::new(move || {
      let subscription = source.subscribe(c_sink);
      everything.set(Box::new(ScheduledDisposable::new(scheduler, subscription)));
    })));
    Box::new(SinkDisposable(sink))
  }
}

struct SubscribeOnSink<T> {
  sink: Sink<T>,
}

impl<T: 'static> Operator for SubscribeOnSink<T> {
  type Output = T;

  #[inline]
  fn sink(&self) -> &Sink<T> { &self.sink }
}

impl<T: 'static> Observer<T> for SubscribeOnSink<T> {
  #[inline]
  fn on(&self, event: Event<T>) { self.sink.forward(event) }

  impl_is_closed!();
}

#[cfg(test)]
mod tests {
  use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Mutex,
  };

  use super::*;
  use crate::{
    disposable::{self, Disposable},
    observable::{create, from_iter},
    ops::test_util::{events, record},
    scheduler::VirtualTimeScheduler,
    subject::PublishSubject,
  };

  #[test]
  fn subscribes_when_scheduler_runs() {
    let s = VirtualTimeScheduler::new();
    let subject = PublishSubject::<i32>::new();
    let log = record(&subject.as_observable().subscribe_on(s.clone()));
    assert!(!subject.has_observers());
    s.start();
    assert!(subject.has_observers());
    subject.on_next(1);
    assert_eq!(events(&log), vec![Event::Next(1)]);
  }

  #[test]
  fn dispose_before_subscribing_cancels_it() {
    let s = VirtualTimeScheduler::new();
    let subscribed = Arc::new(AtomicUsize::new(0));
    let c_subscribed = subscribed.clone();
    let source = create(move |_: AnyObserver<i32>| {
      c_subscribed.fetch_add(1, Ordering::SeqCst);
      disposable::empty()
    });
    let d = source.subscribe_on(s.clone()).subscribe_next(|_| {});
    d.dispose();
    s.start();
    assert_eq!(subscribed.load(Ordering::SeqCst), 0);
  }

  #[test]
  fn unsubscribes_on_the_scheduler() {
    let s = VirtualTimeScheduler::new();
    let subject = PublishSubject::<i32>::new();
    let d = subject.as_observable().subscribe_on(s.clone()).subscribe_next(|_| {});
    s.start();
    d.dispose();
    assert!(subject.has_observers());
    s.start();
    assert!(!subject.has_observers());
  }

  #[test]
  fn forwards_a_synchronous_source() {
    let s = VirtualTimeScheduler::new();
    let seen = Arc::new(Mutex::new(vec![]));
    let c_seen = seen.clone();
    from_iter(1..=2).subscribe_on(s.clone()).subscribe_fn(move |e| c_seen.lock().unwrap().push(e));
    s.start();
    assert_eq!(*seen.lock().unwrap(), vec![Event::Next(1), Event::Next(2), Event::Completed]);
  }
}
