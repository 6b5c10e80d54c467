//! A scheduler driven by a logical clock, for deterministic tests of time
//! based pipelines.
//!
//! Nothing runs until the clock is moved by [`start`], [`advance_to`] or
//! [`advance_by`]. Due items then run in order of their due time, and items
//! due at the same time run in the order they were scheduled.
//!
//! ```rust
//! use std::{
//!   sync::{Arc, Mutex},
//!   time::Duration,
//! };
//!
//! use rxrust_core::prelude::*;
//!
//! let scheduler = VirtualTimeScheduler::new();
//! let ticks = Arc::new(Mutex::new(vec![]));
//! let c_ticks = ticks.clone();
//! observable::interval(Duration::from_secs(1), scheduler.clone())
//!   .take(3)
//!   .subscribe_next(move |v| c_ticks.lock().unwrap().push(v));
//!
//! scheduler.advance_by(Duration::from_secs(2));
//! assert_eq!(*ticks.lock().unwrap(), vec![0, 1]);
//! scheduler.start();
//! assert_eq!(*ticks.lock().unwrap(), vec![0, 1, 2]);
//! assert_eq!(scheduler.clock(), Duration::from_secs(3));
//! ```
//!
//! [`start`]: VirtualTimeScheduler::start
//! [`advance_to`]: VirtualTimeScheduler::advance_to
//! [`advance_by`]: VirtualTimeScheduler::advance_by

use std::{
  collections::BTreeMap,
  sync::{Arc, Weak},
  time::{Duration, Instant},
};

use parking_lot::Mutex;

use super::{Action, ScheduledItem, Scheduler};
use crate::disposable::{BoxDisposable, Disposable};

// ==================== Internal State ====================

type ItemKey = (Duration, u64);

#[derive(Default)]
struct VirtualState {
  clock: Duration,
  next_id: u64,
  queue: BTreeMap<ItemKey, Arc<ScheduledItem>>,
  running: bool,
}

struct VirtualInner {
  epoch: Instant,
  state: Mutex<VirtualState>,
}

// ==================== VirtualTimeScheduler ====================

/// Scheduler with a logical clock. Clones share the clock and the queue.
#[derive(Clone)]
pub struct VirtualTimeScheduler {
  inner: Arc<VirtualInner>,
}

impl Default for VirtualTimeScheduler {
  fn default() -> Self { Self::new() }
}

impl VirtualTimeScheduler {
  pub fn new() -> Self {
    VirtualTimeScheduler {
      inner: Arc::new(VirtualInner { epoch: Instant::now(), state: Mutex::default() }),
    }
  }

  /// Logical time elapsed since the scheduler was created.
  pub fn clock(&self) -> Duration { self.inner.state.lock().clock }

  /// Number of items waiting to run.
  pub fn pending(&self) -> usize { self.inner.state.lock().queue.len() }

  /// Schedules `action` at logical time `at`. Items in the past run on the
  /// next clock movement.
  pub fn schedule_at(&self, at: Duration, action: Action) -> BoxDisposable {
    let item = ScheduledItem::new(action);
    let key = {
      let mut state = self.inner.state.lock();
      let key = (at, state.next_id);
      state.next_id += 1;
      state.queue.insert(key, item.clone());
      key
    };
    tracing::trace!(?at, "virtual time item scheduled");
    Box::new(VirtualItem { scheduler: Arc::downgrade(&self.inner), key, item })
  }

  /// Runs queued items in due order, moving the clock forward to each one,
  /// until the queue is empty or [`stop`](Self::stop) is called.
  pub fn start(&self) {
    self.inner.state.lock().running = true;
    loop {
      let item = {
        let mut state = self.inner.state.lock();
        if !state.running {
          break;
        }
        let Some(((due, _), item)) = state.queue.pop_first() else {
          break;
        };
        state.clock = state.clock.max(due);
        item
      };
      item.invoke();
    }
    self.inner.state.lock().running = false;
  }

  /// Makes a running [`start`](Self::start) return after the current item.
  pub fn stop(&self) { self.inner.state.lock().running = false; }

  /// Runs every item due up to `at`, then sets the clock to `at`.
  ///
  /// # Panics
  ///
  /// Moving the clock backwards panics.
  pub fn advance_to(&self, at: Duration) {
    let clock = self.clock();
    if at < clock {
      tracing::error!(?at, ?clock, "virtual clock moved backwards");
      panic!("cannot advance the virtual clock backwards from {clock:?} to {at:?}");
    }
    loop {
      let item = {
        let mut state = self.inner.state.lock();
        match state.queue.first_key_value() {
          Some((&(due, _), _)) if due <= at => {}
          _ => break,
        }
        let Some(((due, _), item)) = state.queue.pop_first() else {
          break;
        };
        state.clock = state.clock.max(due);
        item
      };
      item.invoke();
    }
    let mut state = self.inner.state.lock();
    state.clock = state.clock.max(at);
  }

  /// Advances the clock by `by`, running everything that becomes due.
  pub fn advance_by(&self, by: Duration) { self.advance_to(self.clock() + by) }

  /// Moves the clock forward by `by` without running anything.
  pub fn sleep(&self, by: Duration) { self.inner.state.lock().clock += by; }
}

impl Scheduler for VirtualTimeScheduler {
  fn now(&self) -> Instant { self.inner.epoch + self.clock() }

  fn schedule(&self, action: Action) -> BoxDisposable { self.schedule_at(self.clock(), action) }

  fn schedule_relative(&self, due: Duration, action: Action) -> BoxDisposable {
    self.schedule_at(self.clock() + due, action)
  }
}

// ==================== VirtualItem ====================

/// Cancels one queued item and removes it from the queue.
struct VirtualItem {
  scheduler: Weak<VirtualInner>,
  key: ItemKey,
  item: Arc<ScheduledItem>,
}

impl Disposable for VirtualItem {
  fn dispose(&self) {
    self.item.dispose();
    if let Some(inner) = self.scheduler.upgrade() {
      let removed = inner.state.lock().queue.remove(&self.key);
      drop(removed);
    }
  }

  #[inline]
  fn is_disposed(&self) -> bool { self.item.is_disposed() }
}

#[cfg(test)]
mod tests {
  use super::*;

  type Log = Arc<Mutex<Vec<(Duration, &'static str)>>>;

  fn record(log: &Log, s: &VirtualTimeScheduler, tag: &'static str) -> Action {
    let (c_log, c_s) = (log.clone(), s.clone());
    Box::new(move || c_log.lock().push((c_s.clock(), tag)))
  }

  #[test]
  fn runs_in_due_order() {
    let s = VirtualTimeScheduler::new();
    let log = Arc::new(Mutex::new(vec![]));
    s.schedule_at(Duration::from_millis(20), record(&log, &s, "b"));
    s.schedule_at(Duration::from_millis(10), record(&log, &s, "a"));
    s.schedule_at(Duration::from_millis(20), record(&log, &s, "c"));
    assert!(log.lock().is_empty());
    s.start();
    assert_eq!(
      *log.lock(),
      vec![
        (Duration::from_millis(10), "a"),
        (Duration::from_millis(20), "b"),
        (Duration::from_millis(20), "c"),
      ]
    );
    assert_eq!(s.clock(), Duration::from_millis(20));
  }

  #[test]
  fn cancel_removes_item() {
    let s = VirtualTimeScheduler::new();
    let log = Arc::new(Mutex::new(vec![]));
    let d = s.schedule_relative(Duration::from_millis(5), record(&log, &s, "x"));
    assert_eq!(s.pending(), 1);
    d.dispose();
    d.dispose();
    assert_eq!(s.pending(), 0);
    s.start();
    assert!(log.lock().is_empty());
  }

  #[test]
  fn advance_runs_only_due_items() {
    let s = VirtualTimeScheduler::new();
    let log = Arc::new(Mutex::new(vec![]));
    s.schedule_relative(Duration::from_millis(5), record(&log, &s, "early"));
    s.schedule_relative(Duration::from_millis(50), record(&log, &s, "late"));
    s.advance_by(Duration::from_millis(10));
    assert_eq!(*log.lock(), vec![(Duration::from_millis(5), "early")]);
    assert_eq!(s.clock(), Duration::from_millis(10));
    assert_eq!(s.pending(), 1);
  }

  #[test]
  fn stop_from_inside_an_action() {
    let s = VirtualTimeScheduler::new();
    let log = Arc::new(Mutex::new(vec![]));
    let c_s = s.clone();
    s.schedule_at(Duration::from_millis(1), Box::new(move || c_s.stop()));
    s.schedule_at(Duration::from_millis(2), record(&log, &s, "after stop"));
    s.start();
    assert!(log.lock().is_empty());
    assert_eq!(s.pending(), 1);
  }

  #[test]
  fn sleep_skips_time() {
    let s = VirtualTimeScheduler::new();
    let before = s.now();
    s.sleep(Duration::from_secs(3));
    assert_eq!(s.now() - before, Duration::from_secs(3));
  }

  #[test]
  #[should_panic(expected = "backwards")]
  fn no_time_travel() {
    let s = VirtualTimeScheduler::new();
    s.advance_by(Duration::from_secs(1));
    s.advance_to(Duration::ZERO);
  }
}
