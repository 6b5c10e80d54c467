//! Operators.
//!
//! Every operator is a method on [`Observable`](crate::observable::Observable)
//! that returns a new observable. Subscribing to it builds one sink per
//! operator, chained from the source to the final observer; see
//! [`sink`](crate::sink) for the rules every sink follows.
//!
//! Operators taking a fallible closure come in pairs: `map`/`try_map`,
//! `filter`/`try_filter`, `combine_latest`/`try_combine_latest` and
//! `zip`/`try_zip`. An `Err` from the closure terminates the subscription
//! with [`RxError::Callback`](crate::error::RxError::Callback).

pub mod catch;
pub mod combine_latest;
pub mod filter;
pub mod map;
pub mod merge;
pub mod multicast;
pub mod observe_on;
pub mod ref_count;
pub mod skip;
pub mod subscribe_on;
pub mod take;
pub mod tap;
pub mod with_latest_from;
pub mod zip;

#[cfg(test)]
pub(crate) mod test_util {
  use std::sync::{Arc, Mutex};

  use crate::{event::Event, observable::Observable};

  pub(crate) type Log<T> = Arc<Mutex<Vec<Event<T>>>>;

  /// Subscribes and records every event.
  pub(crate) fn record<T: Send + 'static>(o: &Observable<T>) -> Log<T> {
    let log = Arc::new(Mutex::new(vec![]));
    let c_log = log.clone();
    o.subscribe_fn(move |e| c_log.lock().unwrap().push(e));
    log
  }

  pub(crate) fn events<T: Clone>(log: &Log<T>) -> Vec<Event<T>> { log.lock().unwrap().clone() }
}
