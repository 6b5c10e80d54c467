use std::{cell::RefCell, sync::Arc};

use parking_lot::ReentrantMutex;

use crate::{
  bag::BagKey,
  disposable::{self, BoxDisposable, CompositeDisposable, SingleAssignmentDisposable},
  event::Event,
  observable::{Observable, Subscribable},
  observer::{AnyObserver, Observer},
  sink::{Operator, Sink, SinkDisposable},
};

impl<T: 'static> Observable<T> {
  /// Combines two observables into one by forwarding the values of both as
  /// they arrive.
  ///
  /// The merged observable completes once both sources have completed and
  /// fails as soon as either of them fails.
  ///
  /// ```rust
  /// use rxrust_core::prelude::*;
  ///
  /// let numbers = PublishSubject::<i32>::new();
  /// let even = numbers.as_observable().filter(|v| v % 2 == 0);
  /// let odd = numbers.as_observable().filter(|v| v % 2 != 0);
  ///
  /// let _all = even.merge(odd).subscribe_next(|v| println!("{v}"));
  /// numbers.on_next(1);
  /// numbers.on_next(2);
  /// ```
  pub fn merge(self, other: Observable<T>) -> Observable<T> { merge([self, other]) }
}

/// Merges any number of observables into one.
///
/// Completes right away when `sources` is empty.
pub fn merge<T: 'static>(sources: impl IntoIterator<Item = Observable<T>>) -> Observable<T> {
  Observable::new(MergeOp { sources: sources.into_iter().collect() })
}

struct MergeOp<T> {
  sources: Vec<Observable<T>>,
}

impl<T: 'static> Subscribable<T> for MergeOp<T> {
  fn subscribe(&self, observer: AnyObserver<T>) -> BoxDisposable {
    if self.sources.is_empty() {
      observer.on_completed();
      return disposable::empty();
    }

    let group = Arc::new(CompositeDisposable::new());
    let sink = Arc::new(MergeSink {
      sink: Sink::new(observer),
      active: ReentrantMutex::new(RefCell::new(self.sources.len())),
      group: group.clone(),
    });
    sink.sink.set_upstream(Box::new(group.clone()));

    for source in &self.sources {
      let slot = Arc::new(SingleAssignmentDisposable::new());
      let Some(key) = group.insert(Box::new(slot.clone())) else {
        // Stopped while an earlier source was subscribing.
        break;
      };
      slot.set(source.subscribe(Arc::new(MergeChild { parent: sink.clone(), key })));
    }
    Box::new(SinkDisposable(sink))
  }
}

struct MergeSink<T> {
  sink: Sink<T>,
  // Sources that have not completed yet. The lock also serializes
  // downstream delivery.
  active: ReentrantMutex<RefCell<usize>>,
  group: Arc<CompositeDisposable>,
}

impl<T: 'static> Operator for MergeSink<T> {
  type Output = T;

  #[inline]
  fn sink(&self) -> &Sink<T> { &self.sink }
}

/// Observer of one merged source.
struct MergeChild<T> {
  parent: Arc<MergeSink<T>>,
  key: BagKey,
}

impl<T: 'static> Observer<T> for MergeChild<T> {
  fn on(&self, event: Event<T>) {
    let parent = &self.parent;
    let active = parent.active.lock();
    match event {
      Event::Completed => {
        parent.group.remove(self.key);
        let finished = {
          let mut active = active.borrow_mut();
          *active -= 1;
          *active == 0
        };
        if finished {
          parent.sink.forward_completed();
        }
      }
      other => parent.sink.forward(other),
    }
  }

  #[inline]
  fn is_closed(&self) -> bool { self.parent.sink.is_stopped() }
}
