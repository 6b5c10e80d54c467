//! A lock that never blocks its callers.
//!
//! [`AsyncLock::wait`] either runs the action right away or queues it behind
//! the action that is currently running. The caller that finds the lock idle
//! becomes its worker and keeps running queued actions, including the ones
//! queued by the actions themselves, until the queue is empty. Every other
//! caller returns immediately. Actions therefore run one at a time and in
//! submission order, without anyone waiting on a mutex while user code runs.
//!
//! Subjects route every emission through one of these, which is what keeps
//! their observers' event order consistent when several threads emit at
//! once, and what lets an observer emit into the subject it observes.

use std::collections::VecDeque;

use parking_lot::Mutex;

use crate::disposable::Disposable;

type Job = Box<dyn FnOnce() + Send>;

#[derive(Default)]
struct LockState {
  queue: VecDeque<Job>,
  is_executing: bool,
  has_faulted: bool,
}

/// Serializes actions in FIFO order with at most one runner at a time.
#[derive(Default)]
pub struct AsyncLock {
  state: Mutex<LockState>,
}

impl AsyncLock {
  #[inline]
  pub fn new() -> Self { Self::default() }

  /// Runs `action` now if the lock is idle, otherwise queues it for the
  /// running worker. Does nothing once the lock is disposed.
  ///
  /// If an action panics the worker gives the lock up while unwinding. The
  /// actions still queued run with the next call to `wait`.
  pub fn wait(&self, action: impl FnOnce() + Send + 'static) {
    {
      let mut state = self.state.lock();
      if state.has_faulted {
        tracing::warn!("action submitted to a disposed AsyncLock was dropped");
        return;
      }
      state.queue.push_back(Box::new(action));
      if state.is_executing {
        return;
      }
      state.is_executing = true;
    }

    let _worker = Worker(&self.state);
    loop {
      let next = {
        let mut state = self.state.lock();
        match state.queue.pop_front() {
          Some(next) if !state.has_faulted => next,
          _ => {
            state.is_executing = false;
            return;
          }
        }
      };
      next();
    }
  }

  /// Whether an action is running right now.
  pub fn is_executing(&self) -> bool { self.state.lock().is_executing }
}

/// Releases the lock when an action unwinds out of the worker loop.
struct Worker<'a>(&'a Mutex<LockState>);

impl Drop for Worker<'_> {
  fn drop(&mut self) {
    if std::thread::panicking() {
      self.0.lock().is_executing = false;
    }
  }
}

impl Disposable for AsyncLock {
  /// Faults the lock: queued actions are dropped and nothing submitted later
  /// ever runs. An action that is already running finishes.
  fn dispose(&self) {
    let queue = {
      let mut state = self.state.lock();
      state.has_faulted = true;
      std::mem::take(&mut state.queue)
    };
    drop(queue);
  }

  fn is_disposed(&self) -> bool { self.state.lock().has_faulted }
}

#[cfg(test)]
mod tests {
  use std::{
    panic::{catch_unwind, AssertUnwindSafe},
    sync::{Arc, Barrier, Mutex},
    thread,
  };

  use super::*;

  #[test]
  fn reentrant_actions_run_after_the_current_one() {
    let lock = Arc::new(AsyncLock::new());
    let log = Arc::new(Mutex::new(vec![]));
    let (c_lock, c_log) = (lock.clone(), log.clone());
    lock.wait(move || {
      c_log.lock().unwrap().push(1);
      let inner_log = c_log.clone();
      c_lock.wait(move || inner_log.lock().unwrap().push(3));
      let inner_log = c_log.clone();
      c_lock.wait(move || inner_log.lock().unwrap().push(4));
      c_log.lock().unwrap().push(2);
    });
    assert_eq!(*log.lock().unwrap(), vec![1, 2, 3, 4]);
    assert!(!lock.is_executing());
  }

  #[test]
  fn concurrent_submitters_keep_their_order() {
    let lock = Arc::new(AsyncLock::new());
    let inside = Arc::new(Mutex::new(false));
    let log = Arc::new(Mutex::new(vec![]));
    let barrier = Arc::new(Barrier::new(4));
    let handles: Vec<_> = (0..4)
      .map(|t| {
        let (lock, inside, log, barrier) =
          (lock.clone(), inside.clone(), log.clone(), barrier.clone());
        thread::spawn(move || {
          barrier.wait();
          for seq in 0..500 {
            let (inside, log) = (inside.clone(), log.clone());
            lock.wait(move || {
              assert!(!std::mem::replace(&mut *inside.lock().unwrap(), true));
              log.lock().unwrap().push((t, seq));
              *inside.lock().unwrap() = false;
            });
          }
        })
      })
      .collect();
    for h in handles {
      h.join().unwrap();
    }
    // A submitter may return while the worker on another thread is still
    // draining; wait for the queue to settle.
    while lock.is_executing() {
      thread::yield_now();
    }
    let log = log.lock().unwrap();
    assert_eq!(log.len(), 2000);
    for t in 0..4 {
      let seqs: Vec<_> = log.iter().filter(|(th, _)| *th == t).map(|(_, seq)| *seq).collect();
      assert_eq!(seqs, (0..500).collect::<Vec<_>>());
    }
  }

  #[test]
  fn panicking_action_releases_the_lock() {
    let lock = Arc::new(AsyncLock::new());
    let log = Arc::new(Mutex::new(vec![]));
    let (c_lock, c_log) = (lock.clone(), log.clone());
    let result = catch_unwind(AssertUnwindSafe(|| {
      lock.wait(move || {
        let inner_log = c_log.clone();
        c_lock.wait(move || inner_log.lock().unwrap().push("queued"));
        panic!("action failed");
      })
    }));
    assert!(result.is_err());
    assert!(!lock.is_executing());

    let c_log = log.clone();
    lock.wait(move || c_log.lock().unwrap().push("next"));
    assert_eq!(*log.lock().unwrap(), vec!["queued", "next"]);
    assert!(!lock.is_executing());
  }

  #[test]
  fn dispose_drops_pending_and_future_actions() {
    let lock = Arc::new(AsyncLock::new());
    let log = Arc::new(Mutex::new(vec![]));
    let (c_lock, c_log) = (lock.clone(), log.clone());
    lock.wait(move || {
      let inner_log = c_log.clone();
      c_lock.wait(move || inner_log.lock().unwrap().push("queued"));
      c_lock.dispose();
      c_log.lock().unwrap().push("running");
    });
    let c_log = log.clone();
    lock.wait(move || c_log.lock().unwrap().push("late"));
    assert_eq!(*log.lock().unwrap(), vec!["running"]);
    assert!(lock.is_disposed());
    assert!(!lock.is_executing());
  }
}
