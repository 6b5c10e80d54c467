//! Keyed multiset used for observer and disposable fan-out.

use std::fmt::{Debug, Formatter};

use smallvec::SmallVec;

/// Opaque identity of an element stored in a [`Bag`].
///
/// Keys are handed out in increasing order and are never reused by the bag
/// that produced them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BagKey(u64);

/// A bag of elements addressed by [`BagKey`].
///
/// The same value may be stored several times; every insertion gets its own
/// key. The container is tuned for the overwhelmingly common fan-out of zero
/// or one observer:
///
/// - **0 or 1 element**: stored inline, no heap allocation.
/// - **N elements**: spills to the heap.
///
/// Insertion is O(1), removal by key is O(n). Iteration that may re-enter the
/// owner (dispatching events to observers, disposing children) goes through
/// [`Bag::snapshot`], so a visitor that inserts or removes elements cannot
/// corrupt the pass in flight.
///
/// ```rust
/// use rxrust_core::bag::Bag;
///
/// let mut bag = Bag::new();
/// let a = bag.insert("a");
/// let b = bag.insert("b");
/// assert_eq!(bag.remove(a), Some("a"));
/// assert_eq!(bag.snapshot().as_slice(), &["b"]);
/// assert!(bag.contains(b));
/// ```
pub struct Bag<T> {
  last_key: u64,
  entries: SmallVec<[(BagKey, T); 1]>,
}

impl<T> Default for Bag<T> {
  fn default() -> Self { Self { last_key: 0, entries: SmallVec::new() } }
}

impl<T> Bag<T> {
  #[inline]
  pub fn new() -> Self { Self::default() }

  /// Inserts `value` and returns the key that removes it again.
  ///
  /// # Panics
  ///
  /// Panics when the keyspace is exhausted. Keys are never reused, so a bag
  /// that ran out of keys can no longer guarantee identity.
  pub fn insert(&mut self, value: T) -> BagKey {
    let Some(next) = self.last_key.checked_add(1) else {
      tracing::error!(last_key = self.last_key, "bag keyspace exhausted");
      panic!("Bag keyspace exhausted");
    };
    self.last_key = next;
    let key = BagKey(next);
    self.entries.push((key, value));
    key
  }

  /// Removes the element stored under `key`, returning it if it was present.
  pub fn remove(&mut self, key: BagKey) -> Option<T> {
    self
      .entries
      .iter()
      .position(|(k, _)| *k == key)
      .map(|idx| self.entries.remove(idx).1)
  }

  #[inline]
  pub fn contains(&self, key: BagKey) -> bool { self.entries.iter().any(|(k, _)| *k == key) }

  #[inline]
  pub fn len(&self) -> usize { self.entries.len() }

  #[inline]
  pub fn is_empty(&self) -> bool { self.entries.is_empty() }

  /// Iterates values in insertion order.
  #[inline]
  pub fn iter(&self) -> impl Iterator<Item = &T> { self.entries.iter().map(|(_, v)| v) }

  /// Removes every element, returning them in insertion order.
  ///
  /// The key counter is kept, so keys handed out before the call stay
  /// unique.
  pub fn take_all(&mut self) -> SmallVec<[T; 1]> {
    self.entries.drain(..).map(|(_, v)| v).collect()
  }

  /// Whether the bag still stores its elements inline.
  #[inline]
  pub fn is_inline(&self) -> bool { !self.entries.spilled() }
}

impl<T: Clone> Bag<T> {
  /// Clones the current values, in insertion order.
  pub fn snapshot(&self) -> SmallVec<[T; 1]> { self.iter().cloned().collect() }
}

impl<T> Debug for Bag<T> {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    write!(f, "{} elements in Bag", self.entries.len())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn keys_increase_and_are_not_reused() {
    let mut bag = Bag::new();
    let k1 = bag.insert(1);
    bag.remove(k1);
    let k2 = bag.insert(1);
    assert!(k2 > k1);
    assert_eq!(bag.remove(k1), None);
    assert_eq!(bag.remove(k2), Some(1));
  }

  #[test]
  fn same_value_many_times() {
    let mut bag = Bag::new();
    let a = bag.insert(7);
    let b = bag.insert(7);
    assert_eq!(bag.len(), 2);
    assert_eq!(bag.remove(a), Some(7));
    assert!(bag.contains(b));
    assert_eq!(bag.len(), 1);
  }

  #[test]
  fn inline_until_second_element() {
    let mut bag = Bag::new();
    assert!(bag.is_inline());
    bag.insert(1);
    assert!(bag.is_inline());
    bag.insert(2);
    assert!(!bag.is_inline());
  }

  #[test]
  fn snapshot_survives_mutation() {
    let mut bag = Bag::new();
    let keys: Vec<_> = (0..4).map(|v| bag.insert(v)).collect();
    let snapshot = bag.snapshot();
    for v in snapshot.iter() {
      // A visitor removing and inserting while the pass is in flight.
      bag.remove(keys[*v as usize]);
      bag.insert(v + 10);
    }
    assert_eq!(snapshot.as_slice(), &[0, 1, 2, 3]);
    assert_eq!(bag.iter().copied().collect::<Vec<_>>(), vec![10, 11, 12, 13]);
  }

  #[test]
  fn take_all_keeps_key_counter() {
    let mut bag = Bag::new();
    let k1 = bag.insert('a');
    bag.insert('b');
    assert_eq!(bag.take_all().as_slice(), &['a', 'b']);
    assert!(bag.is_empty());
    assert!(bag.insert('c') > k1);
  }

  #[test]
  #[should_panic(expected = "keyspace exhausted")]
  fn exhausted_keyspace_fails_fast() {
    let mut bag = Bag { last_key: u64::MAX - 1, entries: SmallVec::new() };
    bag.insert(());
    bag.insert(());
  }
}
