//! # rxrust-core: the push-based core of Reactive Extensions
//!
//! Observables push events to observers. Operators turn observables into
//! new observables, subjects broadcast to many observers at once, and
//! schedulers decide where and when the work runs. Every subscription
//! returns a [`Disposable`] that cancels it.
//!
//! ## Quick Start
//!
//! ```rust
//! use rxrust_core::prelude::*;
//!
//! let evens = observable::from_iter(0..10)
//!   .filter(|v| v % 2 == 0)
//!   .map(|v| v * 2)
//!   .to_blocking()
//!   .to_vec();
//! assert_eq!(evens, Ok(vec![0, 4, 8, 12, 16]));
//! ```
//!
//! ## Key Concepts
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Event`] | `Next(value)`, `Error(err)` or `Completed` |
//! | [`Observable`] | a cloneable description of a push computation |
//! | [`Observer`] | consumes events, in the order `Next* (Error \| Completed)?` |
//! | [`Disposable`] | cancels a subscription and releases what it holds |
//! | [`Scheduler`] | runs actions now, later or elsewhere |
//! | [`subject`] | observer and observable at once |
//!
//! ## Feature Flags
//!
//! - **`trace-resources`**: keep the [`resources`] counter in release builds
//!
//! [`Event`]: event::Event
//! [`Observable`]: observable::Observable
//! [`Observer`]: observer::Observer
//! [`Disposable`]: disposable::Disposable
//! [`Scheduler`]: scheduler::Scheduler

pub mod async_lock;
pub mod bag;
pub mod disposable;
pub mod error;
pub mod event;
pub mod observable;
pub mod observer;
pub mod ops;
pub mod prelude;
pub mod resources;
pub mod scheduler;
pub mod subject;

pub(crate) mod sink;

#[cfg(doctest)]
mod readme {
  #![doc = include_str!("../README.md")]
}
