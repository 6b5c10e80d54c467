//! Prelude module for convenient imports
//!
//! `use rxrust_core::prelude::*` brings in the core types, every subject and
//! scheduler, and the [`observable`] and [`disposable`] modules holding the
//! creation functions.

pub use crate::{
  async_lock::AsyncLock,
  bag::{Bag, BagKey},
  disposable::{
    self, AnonymousDisposable, BooleanDisposable, BoxDisposable, CompositeDisposable, Disposable,
    DisposeBag, RefCountDisposable, SerialDisposable, SingleAssignmentDisposable,
  },
  error::RxError,
  event::Event,
  observable::{
    self, BlockingObservable, ConnectableObservable, Observable, ObservableStream, Subscribable,
  },
  observer::{AnyObserver, Observer},
  scheduler::{
    CurrentThreadScheduler, ImmediateScheduler, ScheduledDisposable, Scheduler, SchedulerRef,
    SerialQueueScheduler, VirtualTimeScheduler,
  },
  subject::{AsyncSubject, BehaviorSubject, PublishSubject, ReplaySubject},
};
