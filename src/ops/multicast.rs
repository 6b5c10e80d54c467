use crate::{
  observable::{ConnectableObservable, Observable},
  subject::{PublishSubject, ReplaySubject, Subject, SubjectKind},
};

impl<T: Clone + Send + 'static> Observable<T> {
  /// Shares this observable through `subject`, which is subscribed to it on
  /// [`connect`](ConnectableObservable::connect).
  ///
  /// Every connection goes through the same subject, so once the source
  /// terminated later observers only get what the subject replays.
  pub fn multicast<K: SubjectKind<T>>(self, subject: Subject<T, K>) -> ConnectableObservable<T> {
    ConnectableObservable::new(self, move || subject.clone())
  }

  /// Like [`multicast`](Self::multicast), with a new subject from
  /// `make_subject` for every connection.
  pub fn multicast_with<K, F>(self, make_subject: F) -> ConnectableObservable<T>
  where
    K: SubjectKind<T>,
    F: Fn() -> Subject<T, K> + Send + Sync + 'static,
  {
    ConnectableObservable::new(self, make_subject)
  }

  /// Multicasts through a [`PublishSubject`].
  pub fn publish(self) -> ConnectableObservable<T> { self.multicast(PublishSubject::new()) }

  /// Multicasts through a [`ReplaySubject`] keeping the last `count` values.
  pub fn replay(self, count: usize) -> ConnectableObservable<T> {
    self.multicast(ReplaySubject::new(count))
  }

  /// Shares one subscription to this observable between all current
  /// observers. The source is subscribed with the first observer and
  /// released with the last one.
  pub fn share(self) -> Observable<T> { self.multicast_with(PublishSubject::new).ref_count() }

  /// Like [`share`](Self::share), and a new observer first receives up to
  /// the last `count` values of the running connection.
  ///
  /// ```rust
  /// use std::sync::{
  ///   atomic::{AtomicUsize, Ordering},
  ///   Arc,
  /// };
  ///
  /// use rxrust_core::prelude::*;
  ///
  /// let subscriptions = Arc::new(AtomicUsize::new(0));
  /// let c_subscriptions = subscriptions.clone();
  /// let ticks = PublishSubject::new();
  /// let c_ticks = ticks.clone();
  /// let shared = observable::defer(move || {
  ///   c_subscriptions.fetch_add(1, Ordering::SeqCst);
  ///   c_ticks.as_observable()
  /// })
  /// .share_replay(1);
  ///
  /// let first = shared.subscribe_next(|_: i32| {});
  /// ticks.on_next(7);
  /// let late = shared.clone().take(1).to_blocking().first();
  /// assert_eq!(late, Ok(7));
  /// assert_eq!(subscriptions.load(Ordering::SeqCst), 1);
  /// first.dispose();
  /// ```
  pub fn share_replay(self, count: usize) -> Observable<T> {
    self.multicast_with(move || ReplaySubject::new(count)).ref_count()
  }
}

#[cfg(test)]
mod tests {
  use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
  };

  use crate::{
    disposable::Disposable,
    event::Event,
    observer::Observer,
    observable::{self, Observable},
    ops::test_util::{events, record},
    subject::PublishSubject,
  };

  fn counted(source: &PublishSubject<i32>) -> (Arc<AtomicUsize>, Observable<i32>) {
    let count = Arc::new(AtomicUsize::new(0));
    let (c_count, source) = (count.clone(), source.clone());
    let o = observable::defer(move || {
      c_count.fetch_add(1, Ordering::SeqCst);
      source.as_observable()
    });
    (count, o)
  }

  #[test]
  fn share_subscribes_once() {
    let source = PublishSubject::new();
    let (subscriptions, o) = counted(&source);
    let shared = o.share();
    let first = record(&shared);
    let second = record(&shared.clone().map(|v| v * 10));
    source.on_next(1);
    source.on_completed();
    assert_eq!(subscriptions.load(Ordering::SeqCst), 1);
    assert_eq!(events(&first), vec![Event::Next(1), Event::Completed]);
    assert_eq!(events(&second), vec![Event::Next(10), Event::Completed]);
  }

  #[test]
  fn share_replay_hands_late_observers_the_latest() {
    let source = PublishSubject::new();
    let shared = source.as_observable().share_replay(2);
    let _first = shared.subscribe_next(|_| {});
    for v in 1..=3 {
      source.on_next(v);
    }
    let late = record(&shared);
    source.on_next(4);
    assert_eq!(events(&late), vec![Event::Next(2), Event::Next(3), Event::Next(4)]);
  }

  #[test]
  fn last_observer_releases_the_source() {
    let source = PublishSubject::<i32>::new();
    let (subscriptions, o) = counted(&source);
    let shared = o.share_replay(1);
    let a = shared.subscribe_next(|_| {});
    let b = shared.subscribe_next(|_| {});
    source.on_next(1);
    a.dispose();
    assert!(source.has_observers());
    b.dispose();
    assert!(!source.has_observers());

    // A new observer reconnects with a fresh replay buffer.
    let late = record(&shared);
    assert_eq!(subscriptions.load(Ordering::SeqCst), 2);
    assert!(events(&late).is_empty());
    source.on_next(2);
    assert_eq!(events(&late), vec![Event::Next(2)]);
  }

  #[test]
  fn synchronous_source_completes_every_connection() {
    let shared = observable::from_iter(1..=3).share();
    let first = shared.clone().to_blocking().to_vec();
    let second = shared.to_blocking().to_vec();
    assert_eq!(first, Ok(vec![1, 2, 3]));
    assert_eq!(second, Ok(vec![1, 2, 3]));
  }

  #[test]
  fn replay_keeps_values_across_connections() {
    let source = PublishSubject::new();
    let replayed = source.as_observable().replay(1);
    let connection = replayed.connect();
    source.on_next(1);
    connection.dispose();
    let late = record(&replayed.as_observable());
    assert_eq!(events(&late), vec![Event::Next(1)]);
  }
}
