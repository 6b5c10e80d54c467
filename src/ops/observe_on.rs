use std::{
  collections::VecDeque,
  sync::{Arc, Weak},
};

use parking_lot::Mutex;

use crate::{
  disposable::{BoxDisposable, CompositeDisposable, Disposable, SingleAssignmentDisposable},
  event::Event,
  observable::{Observable, Subscribable},
  observer::{AnyObserver, Observer},
  scheduler::{Scheduler, SchedulerRef},
  sink::{impl_is_closed, run, Operator, Sink},
};

impl<T: Send + 'static> Observable<T> {
  /// Delivers every event on `scheduler` instead of the thread that
  /// produced it.
  ///
  /// Events are queued and drained by one scheduled action at a time, so
  /// their order is kept even on a scheduler that runs actions in parallel.
  ///
  /// ```rust
  /// use std::sync::{Arc, Mutex};
  ///
  /// use rxrust_core::prelude::*;
  ///
  /// let scheduler = VirtualTimeScheduler::new();
  /// let seen = Arc::new(Mutex::new(vec![]));
  /// let c_seen = seen.clone();
  /// let _d = observable::from_iter(1..=3)
  ///   .observe_on(scheduler.clone())
  ///   .subscribe_next(move |v| c_seen.lock().unwrap().push(v));
  /// assert!(seen.lock().unwrap().is_empty());
  /// scheduler.start();
  /// assert_eq!(*seen.lock().unwrap(), vec![1, 2, 3]);
  /// ```
  pub fn observe_on<S>(self, scheduler: S) -> Observable<T>
  where
    S: Scheduler + 'static,
  {
    Observable::new(ObserveOnOp { source: self, scheduler: Arc::new(scheduler) })
  }
}

struct ObserveOnOp<T> {
  source: Observable<T>,
  scheduler: SchedulerRef,
}

impl<T: Send + 'static> Subscribable<T> for ObserveOnOp<T> {
  fn subscribe(&self, observer: AnyObserver<T>) -> BoxDisposable {
    let sink = Arc::new_cyclic(|me| ObserveOnSink {
      sink: Sink::new(observer),
      scheduler: self.scheduler.clone(),
      queue: Mutex::new(Queue { events: VecDeque::new(), is_draining: false }),
      drains: CompositeDisposable::new(),
      me: me.clone(),
    });
    run(&self.source, sink)
  }
}

struct Queue<T> {
  events: VecDeque<Event<T>>,
  is_draining: bool,
}

struct ObserveOnSink<T> {
  sink: Sink<T>,
  scheduler: SchedulerRef,
  queue: Mutex<Queue<T>>,
  // Scheduled drain passes that have not finished yet.
  drains: CompositeDisposable,
  me: Weak<ObserveOnSink<T>>,
}

impl<T: Send + 'static> ObserveOnSink<T> {
  fn schedule_drain(&self) {
    let Some(me) = self.me.upgrade() else { return };
    let pass = Arc::new(SingleAssignmentDisposable::new());
    let Some(key) = self.drains.insert(Box::new(pass.clone())) else { return };
    pass.set(self.scheduler.schedule(Box::new(move || {
      me.drain();
      me.drains.remove(key);
    })));
  }

  /// Forwards queued events until the queue is empty.
  fn drain(&self) {
    loop {
      let stopped = self.sink.is_stopped();
      let event = {
        let mut queue = self.queue.lock();
        if stopped {
          queue.events.clear();
        }
        match queue.events.pop_front() {
          Some(event) => event,
          None => {
            queue.is_draining = false;
            return;
          }
        }
      };
      self.sink.forward(event);
    }
  }
}

impl<T: Send + 'static> Operator for ObserveOnSink<T> {
  type Output = T;

  #[inline]
  fn sink(&self) -> &Sink<T> { &self.sink }

  fn dispose(&self) {
    self.sink.dispose();
    self.drains.dispose();
  }
}

impl<T: Send + 'static> Observer<T> for ObserveOnSink<T> {
  fn on(&self, event: Event<T>) {
    let start = {
      let mut queue = self.queue.lock();
      queue.events.push_back(event);
      !std::mem::replace(&mut queue.is_draining, true)
    };
    if start {
      self.schedule_drain();
    }
  }

  impl_is_closed!();
}

#[cfg(test)]
mod tests {
  use std::{
    sync::Mutex as StdMutex,
    thread::{self, ThreadId},
  };

  use futures::executor::ThreadPool;

  use super::*;
  use crate::{
    observable::from_iter,
    ops::test_util::{events, record},
    scheduler::{ImmediateScheduler, SerialQueueScheduler, VirtualTimeScheduler},
    subject::PublishSubject,
  };

  #[test]
  fn delivers_when_scheduler_runs() {
    let s = VirtualTimeScheduler::new();
    let log = record(&from_iter(1..=3).observe_on(s.clone()));
    assert!(events(&log).is_empty());
    s.start();
    assert_eq!(
      events(&log),
      vec![Event::Next(1), Event::Next(2), Event::Next(3), Event::Completed]
    );
  }

  #[test]
  fn one_drain_per_burst() {
    let s = VirtualTimeScheduler::new();
    let subject = PublishSubject::<i32>::new();
    let log = record(&subject.as_observable().observe_on(s.clone()));
    subject.on_next(1);
    subject.on_next(2);
    assert_eq!(s.pending(), 1);
    s.start();
    subject.on_next(3);
    assert_eq!(s.pending(), 1);
    s.start();
    assert_eq!(events(&log), vec![Event::Next(1), Event::Next(2), Event::Next(3)]);
  }

  #[test]
  fn dispose_cancels_pending_delivery() {
    let s = VirtualTimeScheduler::new();
    let subject = PublishSubject::<i32>::new();
    let log = Arc::new(StdMutex::new(vec![]));
    let c_log = log.clone();
    let d = subject
      .as_observable()
      .observe_on(s.clone())
      .subscribe_next(move |v| c_log.lock().unwrap().push(v));
    subject.on_next(1);
    d.dispose();
    s.start();
    assert!(log.lock().unwrap().is_empty());
    assert!(!subject.has_observers());
  }

  #[test]
  fn immediate_scheduler_delivers_inline() {
    let log = record(&from_iter(0..2).observe_on(ImmediateScheduler));
    assert_eq!(events(&log), vec![Event::Next(0), Event::Next(1), Event::Completed]);
  }

  #[test]
  fn delivers_on_the_pool_in_order() {
    let pool = ThreadPool::new().unwrap();
    let caller = thread::current().id();
    let values = from_iter(0..100)
      .observe_on(SerialQueueScheduler::new(pool))
      .map(|v| (v, thread::current().id()))
      .to_blocking()
      .to_vec()
      .unwrap();
    assert_eq!(values.iter().map(|(v, _)| *v).collect::<Vec<_>>(), (0..100).collect::<Vec<_>>());
    assert!(values.iter().all(|(_, id): &(i32, ThreadId)| *id != caller));
  }
}
