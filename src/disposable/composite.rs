use parking_lot::Mutex;

use super::{BoxDisposable, Disposable};
use crate::{
  bag::{Bag, BagKey},
  resources::TraceResource,
};

/// A dynamic group of disposables released together.
///
/// Children are disposed outside the internal lock, so a child may touch the
/// composite (for example remove a sibling) while it is being released.
pub struct CompositeDisposable {
  // `None` once disposed.
  children: Mutex<Option<Bag<BoxDisposable>>>,
  _trace: TraceResource,
}

impl Default for CompositeDisposable {
  fn default() -> Self {
    CompositeDisposable { children: Mutex::new(Some(Bag::new())), _trace: TraceResource::new() }
  }
}

impl CompositeDisposable {
  #[inline]
  pub fn new() -> Self { Self::default() }

  /// Creates a composite that already owns `children`.
  pub fn from_disposables(children: impl IntoIterator<Item = BoxDisposable>) -> Self {
    let composite = Self::new();
    for child in children {
      composite.insert(child);
    }
    composite
  }

  /// Adds a child.
  ///
  /// Returns the key that [`remove`](Self::remove)s it again, or `None` when
  /// the composite is already disposed, in which case `child` is disposed on
  /// the spot.
  pub fn insert(&self, child: BoxDisposable) -> Option<BagKey> {
    let mut children = self.children.lock();
    match children.as_mut() {
      Some(bag) => Some(bag.insert(child)),
      None => {
        drop(children);
        child.dispose();
        None
      }
    }
  }

  /// Disposes and detaches the child stored under `key`, leaving its
  /// siblings untouched.
  pub fn remove(&self, key: BagKey) {
    let child = self.children.lock().as_mut().and_then(|bag| bag.remove(key));
    if let Some(child) = child {
      child.dispose();
    }
  }

  /// Number of children currently held.
  pub fn len(&self) -> usize { self.children.lock().as_ref().map_or(0, Bag::len) }

  pub fn is_empty(&self) -> bool { self.len() == 0 }
}

impl Disposable for CompositeDisposable {
  fn dispose(&self) {
    let children = self.children.lock().take();
    if let Some(mut children) = children {
      for child in children.take_all() {
        child.dispose();
      }
    }
  }

  fn is_disposed(&self) -> bool { self.children.lock().is_none() }
}
