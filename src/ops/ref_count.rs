use std::{cell::RefCell, sync::Arc};

use parking_lot::ReentrantMutex;

use crate::{
  disposable::{
    BoxDisposable, CompositeDisposable, Disposable, RefCountDisposable, SingleAssignmentDisposable,
  },
  event::Event,
  observable::{ConnectableObservable, Observable, Subscribable},
  observer::{AnyObserver, Observer},
  sink::{impl_is_closed, Operator, Sink, SinkDisposable},
};

impl<T: 'static> ConnectableObservable<T> {
  /// Connects with the first observer and disconnects once every observer
  /// is gone, either disposed or terminated.
  pub fn ref_count(&self) -> Observable<T> {
    Observable::new(RefCountOp {
      connectable: self.clone(),
      connection: ReentrantMutex::new(RefCell::new(None)),
    })
  }
}

/// Observers of the running connection each hold a dependent of its
/// `RefCountDisposable`; the connection ends with the last dependent.
struct RefCountOp<T> {
  connectable: ConnectableObservable<T>,
  connection: ReentrantMutex<RefCell<Option<RefCountDisposable>>>,
}

impl<T: 'static> Subscribable<T> for RefCountOp<T> {
  fn subscribe(&self, observer: AnyObserver<T>) -> BoxDisposable {
    let sink = Arc::new(RefCountSink { sink: Sink::new(observer) });
    let current = self.connection.lock();
    let subscription = self.connectable.subscribe(sink.clone());
    if sink.sink.is_stopped() {
      // A subject that already terminated: nothing to connect for.
      sink.sink.set_upstream(subscription);
      return Box::new(SinkDisposable(sink));
    }

    let (dependent, connect) = {
      let mut current = current.borrow_mut();
      match current.as_ref().filter(|rc| !rc.is_disposed()) {
        Some(rc) => (rc.retain(), None),
        None => {
          let connection = Arc::new(SingleAssignmentDisposable::new());
          let rc = RefCountDisposable::new(Box::new(connection.clone()));
          let dependent = rc.retain();
          // From here on the dependents alone keep the connection.
          rc.dispose();
          *current = Some(rc);
          (dependent, Some(connection))
        }
      }
    };
    let upstream = CompositeDisposable::from_disposables([subscription, dependent]);
    sink.sink.set_upstream(Box::new(upstream));
    if let Some(connection) = connect {
      self.connectable.connect_into(&connection);
    }
    Box::new(SinkDisposable(sink))
  }
}

struct RefCountSink<T> {
  sink: Sink<T>,
}

impl<T: 'static> Operator for RefCountSink<T> {
  type Output = T;

  fn sink(&self) -> &Sink<T> { &self.sink }
}

impl<T: 'static> Observer<T> for RefCountSink<T> {
  fn on(&self, event: Event<T>) {
    self.sink.forward(event);
    // A downstream that closed on its own, such as `take`, gives its share up.
    if self.sink.is_stopped() {
      Operator::dispose(self);
    }
  }

  impl_is_closed!();
}
