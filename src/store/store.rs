use std::pin::Pin;
use std::sync::{Arc, Mutex, Weak};
use std::task::{Context, Poll};

use futures::stream::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

use crate::runtime::lock;

type Subscriber<S> = Arc<dyn Fn(&Arc<S>) + Send + Sync>;

struct Cell<S> {
    name: String,
    inner: Mutex<Inner<S>>,
}

struct Inner<S> {
    state: Arc<S>,
    subscribers: Vec<(u64, Subscriber<S>)>,
    next_id: u64,
}

impl<S> Inner<S> {
    fn attach(&mut self, subscriber: Subscriber<S>) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.subscribers.push((id, subscriber));
        id
    }
}

trait Detach: Send + Sync {
    fn detach(&self, id: u64);
}

impl<S: Send + Sync> Detach for Cell<S> {
    fn detach(&self, id: u64) {
        lock(&self.inner).subscribers.retain(|(sid, _)| *sid != id);
    }
}

/// Read side of a store: the current state plus change notifications.
///
/// A handle behaves like a behavior subject. It always holds a value, new
/// subscribers immediately see the current state, and every state the store
/// adopts afterwards is pushed to them. Clones share the same store.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use agendum::{Dispatcher, Reducer};
/// use futures::StreamExt;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let dispatcher: Dispatcher<serde_json::Value> = Dispatcher::new();
/// let count = Reducer::named("count", |state: &Arc<u32>, _: &serde_json::Value| {
///     Arc::new(**state + 1)
/// });
///
/// let store = dispatcher.reduce(&count, 0);
/// let mut changes = store.changes();
/// assert_eq!(*changes.next().await.unwrap(), 1); // the init action
///
/// dispatcher.dispatch(serde_json::json!({ "type": "TICK" }));
/// assert_eq!(*changes.next().await.unwrap(), 2);
/// assert_eq!(*store.get(), 2);
/// # }
/// ```
pub struct StoreHandle<S> {
    cell: Arc<Cell<S>>,
}

impl<S: Send + Sync + 'static> StoreHandle<S> {
    pub(crate) fn new(name: String, initial: Arc<S>) -> Self {
        Self {
            cell: Arc::new(Cell {
                name,
                inner: Mutex::new(Inner {
                    state: initial,
                    subscribers: Vec::new(),
                    next_id: 0,
                }),
            }),
        }
    }

    /// The current state.
    pub fn get(&self) -> Arc<S> {
        Arc::clone(&lock(&self.cell.inner).state)
    }

    /// Read the current state without holding on to it.
    pub fn read<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&S) -> R,
    {
        let state = self.get();
        f(&state)
    }

    /// The store's diagnostic name.
    pub fn name(&self) -> &str {
        &self.cell.name
    }

    /// Call `callback` with the current state now and with every state the
    /// store emits later, until the returned [`Subscription`] is dropped.
    ///
    /// Callbacks run on the delivery task, while the store is busy; they
    /// must not subscribe to the same store from inside the callback.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&Arc<S>) + Send + Sync + 'static,
    {
        let callback: Subscriber<S> = Arc::new(callback);
        let (id, current) = {
            let mut inner = lock(&self.cell.inner);
            (inner.attach(Arc::clone(&callback)), Arc::clone(&inner.state))
        };
        callback(&current);
        self.guard(id)
    }

    /// Stream the current state followed by every emitted state.
    ///
    /// Dropping the stream detaches it from the store.
    pub fn changes(&self) -> StateStream<S> {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = {
            let mut inner = lock(&self.cell.inner);
            let _ = tx.send(Arc::clone(&inner.state));
            inner.attach(Arc::new(move |state: &Arc<S>| {
                let _ = tx.send(Arc::clone(state));
            }))
        };
        StateStream {
            receiver: UnboundedReceiverStream::new(rx),
            _subscription: self.guard(id),
        }
    }

    /// Whether both handles refer to the same store.
    pub fn same_store(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.cell, &other.cell)
    }

    /// Number of attached subscribers.
    pub fn subscriber_count(&self) -> usize {
        lock(&self.cell.inner).subscribers.len()
    }

    /// Adopt `state` and notify every subscriber.
    pub(crate) fn emit(&self, state: Arc<S>) {
        let subscribers: Vec<Subscriber<S>> = {
            let mut inner = lock(&self.cell.inner);
            inner.state = Arc::clone(&state);
            inner.subscribers.iter().map(|(_, s)| Arc::clone(s)).collect()
        };
        for subscriber in subscribers {
            subscriber(&state);
        }
    }

    fn guard(&self, id: u64) -> Subscription {
        let cell: Arc<dyn Detach> = self.cell.clone();
        Subscription {
            id,
            cell: Arc::downgrade(&cell),
        }
    }
}

impl<S> Clone for StoreHandle<S> {
    fn clone(&self) -> Self {
        Self {
            cell: Arc::clone(&self.cell),
        }
    }
}

impl<S> std::fmt::Debug for StoreHandle<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreHandle")
            .field("name", &self.cell.name)
            .finish_non_exhaustive()
    }
}

/// RAII guard for a store subscription.
pub struct Subscription {
    id: u64,
    cell: Weak<dyn Detach>,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(cell) = self.cell.upgrade() {
            cell.detach(self.id);
        }
    }
}

/// Stream returned by [`StoreHandle::changes`].
pub struct StateStream<S> {
    receiver: UnboundedReceiverStream<Arc<S>>,
    _subscription: Subscription,
}

impl<S> Stream for StateStream<S> {
    type Item = Arc<S>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_next_unpin(cx)
    }
}
