//! Where and when work runs.
//!
//! A [`Scheduler`] accepts actions and runs them, right away, later or on
//! some executor. Every `schedule*` call returns a disposable that prevents
//! the action from starting if it is disposed first. When cancellation and
//! execution race, whichever gets to the action first wins; the other side
//! has no effect.
//!
//! | Scheduler | Runs actions |
//! |-----------|--------------|
//! | [`ImmediateScheduler`] | synchronously, on the calling thread |
//! | [`CurrentThreadScheduler`] | on the calling thread, nested calls trampolined |
//! | [`SerialQueueScheduler`] | one at a time, in order, on a supplied executor |
//! | [`VirtualTimeScheduler`] | when its logical clock is advanced |

use std::{
  sync::Arc,
  time::{Duration, Instant},
};

use parking_lot::Mutex;

use crate::disposable::{BoxDisposable, Disposable, SerialDisposable};

mod current_thread;
mod immediate;
mod serial_queue;
mod virtual_time;

pub use current_thread::CurrentThreadScheduler;
pub use immediate::ImmediateScheduler;
pub use serial_queue::SerialQueueScheduler;
pub use virtual_time::VirtualTimeScheduler;

/// A unit of work handed to a scheduler.
pub type Action = Box<dyn FnOnce() + Send>;

/// Orders actions and schedules their execution.
pub trait Scheduler: Send + Sync {
  /// The scheduler's notion of the current time.
  fn now(&self) -> Instant { Instant::now() }

  /// Runs `action` as soon as the scheduler allows.
  fn schedule(&self, action: Action) -> BoxDisposable;

  /// Runs `action` after `due` has elapsed.
  fn schedule_relative(&self, due: Duration, action: Action) -> BoxDisposable;

  /// Runs `action` at `at`, or as soon as possible if `at` already passed.
  fn schedule_absolute(&self, at: Instant, action: Action) -> BoxDisposable {
    self.schedule_relative(at.saturating_duration_since(self.now()), action)
  }
}

/// A shared, type erased scheduler.
pub type SchedulerRef = Arc<dyn Scheduler>;

impl<S: Scheduler + ?Sized> Scheduler for Arc<S> {
  #[inline]
  fn now(&self) -> Instant { (**self).now() }

  #[inline]
  fn schedule(&self, action: Action) -> BoxDisposable { (**self).schedule(action) }

  #[inline]
  fn schedule_relative(&self, due: Duration, action: Action) -> BoxDisposable {
    (**self).schedule_relative(due, action)
  }

  #[inline]
  fn schedule_absolute(&self, at: Instant, action: Action) -> BoxDisposable {
    (**self).schedule_absolute(at, action)
  }
}

// ============================================================================
// ScheduledItem
// ============================================================================

/// A queued action that runs at most once. Disposing it first drops the
/// action without running it.
pub(crate) struct ScheduledItem {
  action: Mutex<Option<Action>>,
}

impl ScheduledItem {
  pub(crate) fn new(action: Action) -> Arc<Self> {
    Arc::new(ScheduledItem { action: Mutex::new(Some(action)) })
  }

  pub(crate) fn invoke(&self) {
    let action = self.action.lock().take();
    if let Some(action) = action {
      action();
    }
  }
}

impl Disposable for ScheduledItem {
  fn dispose(&self) {
    let action = self.action.lock().take();
    if action.is_some() {
      tracing::trace!("scheduled action cancelled before it ran");
    }
  }

  #[inline]
  fn is_disposed(&self) -> bool { self.action.lock().is_none() }
}

// ============================================================================
// ScheduledDisposable
// ============================================================================

/// Disposes its inner disposable on a scheduler rather than on the caller's
/// thread. `subscribe_on` uses it to release the upstream subscription where
/// it was made.
pub struct ScheduledDisposable {
  scheduler: SchedulerRef,
  inner: Mutex<Option<BoxDisposable>>,
}

impl ScheduledDisposable {
  pub fn new(scheduler: SchedulerRef, inner: BoxDisposable) -> Self {
    ScheduledDisposable { scheduler, inner: Mutex::new(Some(inner)) }
  }
}

impl Disposable for ScheduledDisposable {
  fn dispose(&self) {
    let inner = self.inner.lock().take();
    if let Some(inner) = inner {
      // The disposal work itself is never cancelled.
      let _ = self.scheduler.schedule(Box::new(move || inner.dispose()));
    }
  }

  #[inline]
  fn is_disposed(&self) -> bool { self.inner.lock().is_none() }
}

// ============================================================================
// Recursive and periodic scheduling
// ============================================================================

type RecursiveAction = Box<dyn FnMut(&Recurse) + Send>;

struct RecursiveSlot {
  action: Option<RecursiveAction>,
  /// Invocations that arrived while the action was already running.
  reruns: usize,
}

struct RecursiveState {
  scheduler: SchedulerRef,
  slot: Mutex<RecursiveSlot>,
  pending: SerialDisposable,
}

/// Handle passed to a recursive action to schedule its next run.
pub struct Recurse {
  state: Arc<RecursiveState>,
}

impl Recurse {
  /// Schedules the action to run again as soon as possible.
  pub fn schedule(&self) { schedule_next(&self.state, None) }

  /// Schedules the action to run again after `due`.
  pub fn schedule_relative(&self, due: Duration) { schedule_next(&self.state, Some(due)) }
}

fn schedule_next(state: &Arc<RecursiveState>, due: Option<Duration>) {
  if state.pending.is_disposed() {
    return;
  }
  let c_state = state.clone();
  let action: Action = Box::new(move || run_recursive(&c_state));
  let scheduled = match due {
    Some(due) => state.scheduler.schedule_relative(due, action),
    None => state.scheduler.schedule(action),
  };
  state.pending.set(scheduled);
}

fn run_recursive(state: &Arc<RecursiveState>) {
  let mut action = {
    let mut slot = state.slot.lock();
    match slot.action.take() {
      Some(action) => action,
      None => {
        // Already running further up this stack or on another thread; the
        // running invocation picks this one up when it returns.
        slot.reruns += 1;
        return;
      }
    }
  };
  let recurse = Recurse { state: state.clone() };
  loop {
    if state.pending.is_disposed() {
      return;
    }
    action(&recurse);
    let mut slot = state.slot.lock();
    if state.pending.is_disposed() {
      // Disposed while running: the action is dropped, not put back.
      slot.reruns = 0;
      return;
    }
    if slot.reruns == 0 {
      slot.action = Some(action);
      return;
    }
    slot.reruns -= 1;
  }
}

struct RecursiveDisposable(Arc<RecursiveState>);

impl Disposable for RecursiveDisposable {
  fn dispose(&self) {
    self.0.pending.dispose();
    let action = self.0.slot.lock().action.take();
    drop(action);
  }

  #[inline]
  fn is_disposed(&self) -> bool { self.0.pending.is_disposed() }
}

fn recursive(
  scheduler: SchedulerRef,
  first: Option<Duration>,
  action: RecursiveAction,
) -> BoxDisposable {
  let state = Arc::new(RecursiveState {
    scheduler,
    slot: Mutex::new(RecursiveSlot { action: Some(action), reruns: 0 }),
    pending: SerialDisposable::new(),
  });
  schedule_next(&state, first);
  Box::new(RecursiveDisposable(state))
}

/// Schedules `action` and lets it reschedule itself through the
/// [`Recurse`] handle it receives.
///
/// Runs of the action never overlap, even on schedulers that run actions
/// synchronously: a rescheduled run that would start while the current one
/// is still on the stack is deferred until it returns. Disposing the result
/// cancels the pending run and drops the action.
pub fn schedule_recursive<F>(scheduler: SchedulerRef, action: F) -> BoxDisposable
where
  F: FnMut(&Recurse) + Send + 'static,
{
  recursive(scheduler, None, Box::new(action))
}

/// Runs `action` after `start_after` and then once every `period`, until
/// the result is disposed.
pub fn schedule_periodic<F>(
  scheduler: SchedulerRef,
  start_after: Duration,
  period: Duration,
  mut action: F,
) -> BoxDisposable
where
  F: FnMut() + Send + 'static,
{
  recursive(
    scheduler,
    Some(start_after),
    Box::new(move |recurse: &Recurse| {
      action();
      recurse.schedule_relative(period);
    }),
  )
}

#[cfg(test)]
mod tests {
  use std::sync::atomic::{AtomicUsize, Ordering};

  use super::*;

  #[test]
  fn item_runs_once() {
    let hits = Arc::new(AtomicUsize::new(0));
    let c_hits = hits.clone();
    let item = ScheduledItem::new(Box::new(move || {
      c_hits.fetch_add(1, Ordering::SeqCst);
    }));
    item.invoke();
    item.invoke();
    assert_eq!(hits.load(Ordering::SeqCst), 1);
    assert!(item.is_disposed());
  }

  #[test]
  fn cancelled_item_never_runs() {
    let hits = Arc::new(AtomicUsize::new(0));
    let c_hits = hits.clone();
    let item = ScheduledItem::new(Box::new(move || {
      c_hits.fetch_add(1, Ordering::SeqCst);
    }));
    item.dispose();
    item.invoke();
    assert_eq!(hits.load(Ordering::SeqCst), 0);
  }

  #[test]
  fn recursion_on_immediate_does_not_grow_the_stack() {
    let count = Arc::new(AtomicUsize::new(0));
    let c_count = count.clone();
    let d = schedule_recursive(Arc::new(ImmediateScheduler), move |recurse| {
      if c_count.fetch_add(1, Ordering::SeqCst) < 100_000 {
        recurse.schedule();
      }
    });
    assert_eq!(count.load(Ordering::SeqCst), 100_001);
    assert!(!d.is_disposed());
    d.dispose();
    assert!(d.is_disposed());
  }

  #[test]
  fn periodic_on_virtual_time() {
    let scheduler = VirtualTimeScheduler::new();
    let ticks = Arc::new(Mutex::new(vec![]));
    let (c_ticks, c_scheduler) = (ticks.clone(), scheduler.clone());
    let d = schedule_periodic(
      Arc::new(scheduler.clone()),
      Duration::from_millis(5),
      Duration::from_millis(10),
      move || c_ticks.lock().push(c_scheduler.clock()),
    );
    scheduler.advance_to(Duration::from_millis(30));
    assert_eq!(
      *ticks.lock(),
      vec![Duration::from_millis(5), Duration::from_millis(15), Duration::from_millis(25)]
    );
    d.dispose();
    scheduler.start();
    assert_eq!(ticks.lock().len(), 3);
    assert_eq!(scheduler.pending(), 0);
  }

  #[test]
  fn scheduled_disposable_releases_on_scheduler() {
    let scheduler = VirtualTimeScheduler::new();
    let inner = crate::disposable::BooleanDisposable::new();
    let inner = Arc::new(inner);
    let d = ScheduledDisposable::new(Arc::new(scheduler.clone()), Box::new(inner.clone()));
    d.dispose();
    assert!(d.is_disposed());
    assert!(!inner.is_disposed());
    scheduler.start();
    assert!(inner.is_disposed());
  }
}
