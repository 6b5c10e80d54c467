use std::collections::VecDeque;

use smallvec::smallvec;

use super::{Emission, Replayed, Subject, SubjectKind};
use crate::event::Event;

/// State of a [`ReplaySubject`]: the most recent values, oldest first.
#[derive(Debug, Clone)]
pub struct Replay<T> {
  /// `None` keeps everything.
  capacity: Option<usize>,
  values: VecDeque<T>,
}

impl<T> Default for Replay<T> {
  fn default() -> Self { Replay { capacity: None, values: VecDeque::new() } }
}

impl<T: Clone + Send + 'static> SubjectKind<T> for Replay<T> {
  const NAME: &'static str = "ReplaySubject";

  fn update(&mut self, event: Event<T>) -> Emission<T> {
    if let Event::Next(v) = &event {
      match self.capacity {
        Some(0) => {}
        Some(capacity) => {
          if self.values.len() == capacity {
            self.values.pop_front();
          }
          self.values.push_back(v.clone());
        }
        None => self.values.push_back(v.clone()),
      }
    }
    smallvec![event]
  }

  fn replay(&self, _: Option<&Event<T>>) -> Replayed<T> { self.values.iter().cloned().collect() }
}

/// Replays buffered values to every new subscriber before live events.
///
/// A subscriber that arrives after the subject stopped receives the buffer
/// followed by the terminal event.
pub type ReplaySubject<T> = Subject<T, Replay<T>>;

impl<T: Clone + Send + 'static> Subject<T, Replay<T>> {
  /// Keeps the last `capacity` values.
  pub fn new(capacity: usize) -> Self {
    Self::with_kind(Replay {
      capacity: Some(capacity),
      values: VecDeque::with_capacity(capacity.min(64)),
    })
  }

  /// Keeps every value.
  pub fn unbounded() -> Self { Self::with_kind(Replay::default()) }
}
