use std::{thread, time::Duration};

use super::{Action, Scheduler};
use crate::disposable::{self, BoxDisposable};

/// Runs every action synchronously on the calling thread.
///
/// Relative scheduling blocks the caller for the due time first. Nested
/// schedules run nested; use [`CurrentThreadScheduler`](super::CurrentThreadScheduler)
/// to flatten them.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImmediateScheduler;

impl Scheduler for ImmediateScheduler {
  fn schedule(&self, action: Action) -> BoxDisposable {
    action();
    disposable::empty()
  }

  fn schedule_relative(&self, due: Duration, action: Action) -> BoxDisposable {
    if !due.is_zero() {
      tracing::trace!(?due, "immediate scheduler blocking for due time");
      thread::sleep(due);
    }
    self.schedule(action)
  }
}
