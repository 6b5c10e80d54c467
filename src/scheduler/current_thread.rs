use std::{
  cell::RefCell,
  collections::VecDeque,
  sync::Arc,
  thread,
  time::{Duration, Instant},
};

use super::{Action, ScheduledItem, Scheduler};
use crate::disposable::BoxDisposable;

thread_local! {
  /// `Some` while a trampoline is draining on this thread.
  static QUEUE: RefCell<Option<VecDeque<Arc<ScheduledItem>>>> = const { RefCell::new(None) };
}

/// Runs actions on the calling thread through a thread local trampoline.
///
/// The outermost `schedule` call on a thread runs its action right away and
/// then drains everything scheduled meanwhile, in FIFO order. Nested calls
/// only enqueue and return, so recursive scheduling never grows the stack.
#[derive(Debug, Clone, Copy, Default)]
pub struct CurrentThreadScheduler;

impl CurrentThreadScheduler {
  /// Whether the calling thread has no trampoline running, so that a
  /// `schedule` call would execute its action immediately.
  pub fn is_schedule_required() -> bool { QUEUE.with(|q| q.borrow().is_none()) }
}

/// Tears the trampoline down, also when an action panics.
struct Trampoline;

impl Trampoline {
  fn enter() -> Self {
    QUEUE.with(|q| *q.borrow_mut() = Some(VecDeque::new()));
    Trampoline
  }

  fn next(&self) -> Option<Arc<ScheduledItem>> {
    QUEUE.with(|q| q.borrow_mut().as_mut().and_then(VecDeque::pop_front))
  }
}

impl Drop for Trampoline {
  fn drop(&mut self) { QUEUE.with(|q| *q.borrow_mut() = None) }
}

impl Scheduler for CurrentThreadScheduler {
  fn schedule(&self, action: Action) -> BoxDisposable {
    let item = ScheduledItem::new(action);
    let queued = QUEUE.with(|q| match q.borrow_mut().as_mut() {
      Some(queue) => {
        queue.push_back(item.clone());
        true
      }
      None => false,
    });
    if queued {
      return Box::new(item);
    }

    let trampoline = Trampoline::enter();
    item.invoke();
    while let Some(next) = trampoline.next() {
      next.invoke();
    }
    Box::new(item)
  }

  fn schedule_relative(&self, due: Duration, action: Action) -> BoxDisposable {
    if due.is_zero() {
      return self.schedule(action);
    }
    let deadline = Instant::now() + due;
    self.schedule(Box::new(move || {
      let left = deadline.saturating_duration_since(Instant::now());
      if !left.is_zero() {
        thread::sleep(left);
      }
      action();
    }))
  }
}
