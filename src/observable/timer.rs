use std::{sync::Arc, time::Duration};

use crate::{
  disposable::BoxDisposable,
  observable::{Observable, Subscribable},
  observer::AnyObserver,
  scheduler::{self, Scheduler, SchedulerRef},
};

/// Emits `0` once `due` has elapsed on `scheduler`, then completes.
pub fn timer<S>(due: Duration, scheduler: S) -> Observable<u64>
where
  S: Scheduler + 'static,
{
  Observable::new(Timer { due, scheduler: Arc::new(scheduler) })
}

/// Emits an increasing counter, starting at `0`, once every `period` on
/// `scheduler`. The first value arrives after one period.
pub fn interval<S>(period: Duration, scheduler: S) -> Observable<u64>
where
  S: Scheduler + 'static,
{
  Observable::new(Interval { period, scheduler: Arc::new(scheduler) })
}

struct Timer {
  due: Duration,
  scheduler: SchedulerRef,
}

impl Subscribable<u64> for Timer {
  fn subscribe(&self, observer: AnyObserver<u64>) -> BoxDisposable {
    self.scheduler.schedule_relative(
      self.due,
      Box::new(move || {
        observer.on_next(0);
        observer.on_completed();
      }),
    )
  }
}

struct Interval {
  period: Duration,
  scheduler: SchedulerRef,
}

impl Subscribable<u64> for Interval {
  fn subscribe(&self, observer: AnyObserver<u64>) -> BoxDisposable {
    let mut tick = 0;
    scheduler::schedule_periodic(self.scheduler.clone(), self.period, self.period, move || {
      observer.on_next(tick);
      tick += 1;
    })
  }
}

#[cfg(test)]
mod tests {
  use std::sync::Mutex;

  use super::*;
  use crate::{disposable::Disposable, event::Event, scheduler::VirtualTimeScheduler};

  #[test]
  fn timer_fires_once() {
    let s = VirtualTimeScheduler::new();
    let seen = Arc::new(Mutex::new(vec![]));
    let c_seen = seen.clone();
    timer(Duration::from_millis(100), s.clone()).subscribe_fn(move |e| {
      c_seen.lock().unwrap().push(e);
    });
    s.advance_by(Duration::from_millis(99));
    assert!(seen.lock().unwrap().is_empty());
    s.advance_by(Duration::from_millis(1));
    assert_eq!(*seen.lock().unwrap(), vec![Event::Next(0), Event::Completed]);
  }

  #[test]
  fn interval_until_disposed() {
    let s = VirtualTimeScheduler::new();
    let seen = Arc::new(Mutex::new(vec![]));
    let c_seen = seen.clone();
    let d = interval(Duration::from_secs(1), s.clone())
      .subscribe_next(move |v| c_seen.lock().unwrap().push(v));
    s.advance_by(Duration::from_millis(3500));
    assert_eq!(*seen.lock().unwrap(), vec![0, 1, 2]);
    d.dispose();
    s.advance_by(Duration::from_secs(10));
    assert_eq!(*seen.lock().unwrap(), vec![0, 1, 2]);
    assert_eq!(s.pending(), 0);
  }
}
