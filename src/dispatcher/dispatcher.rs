use std::any::Any;
use std::collections::HashMap;
use std::fmt::{self, Debug};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use futures::future::{BoxFuture, FutureExt, Shared};
use serde::de::DeserializeOwned;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

use super::delivery::{Delivery, Lane};
use super::options::{DispatcherBuilder, DispatcherOptions};
use super::sinks::{AgendaLogger, ForwardSink};
use crate::action::Action;
use crate::agenda::{Agenda, AgendaId, AgendaSink, Multicast};
use crate::error::{AgendaError, Error, Result};
use crate::runtime::lock;
use crate::store::{Reducer, ReducerId, StoreEngine, StoreHandle};

/// Handle returned by [`Dispatcher::dispatch_future`]; resolves to the same
/// outcome the stores observe.
pub type Deferred<A> = Shared<BoxFuture<'static, Result<A, AgendaError>>>;

/// Stream returned by [`Dispatcher::actions`].
pub type ActionStream<A> = UnboundedReceiverStream<A>;

/// Type-erased store registry keyed by reducer identity.
///
/// Each value is the `StoreHandle<S>` of the reducer's store;
/// downcasting recovers the typed handle.
type StoreRegistry = HashMap<ReducerId, Box<dyn Any + Send + Sync>>;

struct Hub<A> {
    /// One lane per sink. Publishing holds this lock while it queues the
    /// agenda on every lane, so all sinks see agendas in the same order.
    lanes: Mutex<Vec<Lane<A>>>,
    stores: Mutex<StoreRegistry>,
    next_agenda: AtomicU64,
    options: DispatcherOptions,
}

/// The central broadcast point for agendas.
///
/// Every agenda published through a dispatcher reaches every store
/// registered with [`reduce`](Dispatcher::reduce) at the time of
/// publication. Each store folds the agenda's actions into its own history
/// and, should the agenda fail, retracts exactly those actions again while
/// keeping everything other agendas contributed in the meantime.
///
/// `Clone` is cheap; clones share the same hub.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use agendum::{Action, Agenda, AgendaError, Dispatcher, Reducer};
/// use futures::StreamExt;
///
/// #[derive(Debug, Clone)]
/// enum Todo {
///     Init,
///     Add(&'static str),
/// }
///
/// impl Action for Todo {
///     fn init() -> Self {
///         Todo::Init
///     }
///
///     fn name(&self) -> &str {
///         match self {
///             Todo::Init => "_INIT_",
///             Todo::Add(_) => "ADD",
///         }
///     }
/// }
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let dispatcher = Dispatcher::new();
/// let todos = Reducer::optional(|state: &Vec<&'static str>, action: &Todo| match action {
///     Todo::Add(item) => Some([state.as_slice(), &[*item]].concat()),
///     Todo::Init => None,
/// });
///
/// let store = dispatcher.reduce(&todos, Vec::new());
/// let mut changes = store.changes();
/// changes.next().await;
///
/// dispatcher.dispatch(Todo::Add("write docs"));
/// assert_eq!(*changes.next().await.unwrap(), vec!["write docs"]);
///
/// // A failing agenda leaves no trace.
/// dispatcher.schedule([Agenda::from_stream(futures::stream::iter(vec![
///     Ok(Todo::Add("doomed")),
///     Err(AgendaError::msg("server said no")),
/// ]))]);
/// assert_eq!(*changes.next().await.unwrap(), vec!["write docs", "doomed"]);
/// assert_eq!(*changes.next().await.unwrap(), vec!["write docs"]);
/// # }
/// ```
pub struct Dispatcher<A> {
    hub: Arc<Hub<A>>,
}

impl<A: Action> Dispatcher<A> {
    /// A dispatcher with default options.
    pub fn new() -> Self {
        Self::with_options(DispatcherOptions::default())
    }

    /// Configure a dispatcher.
    pub fn builder() -> DispatcherBuilder<A> {
        DispatcherBuilder::new()
    }

    /// A dispatcher with explicit options.
    pub fn with_options(options: DispatcherOptions) -> Self {
        let mut lanes = Vec::new();
        if options.logging.agendas {
            lanes.push(Lane::new(Arc::new(AgendaLogger) as Arc<dyn AgendaSink<A>>));
        }
        Self {
            hub: Arc::new(Hub {
                lanes: Mutex::new(lanes),
                stores: Mutex::new(HashMap::new()),
                next_agenda: AtomicU64::new(0),
                options,
            }),
        }
    }

    /// The options this dispatcher was built with.
    pub fn options(&self) -> &DispatcherOptions {
        &self.hub.options
    }

    /// Broadcast `agenda` to every sink.
    ///
    /// The agenda is shared: it runs once no matter how many stores listen.
    /// Each sink is fed by a single driver on the configured scheduler, which
    /// handles agendas in publish order, so actions that are available right
    /// away are folded by every store in the order they were published. With
    /// nobody listening the agenda is dropped without ever being started.
    pub fn publish(&self, agenda: Agenda<A>) {
        let mut lanes = lock(&self.hub.lanes);
        let id = AgendaId(self.hub.next_agenda.fetch_add(1, Ordering::Relaxed));
        lanes.retain(|lane| !lane.sink().is_closed());
        if lanes.is_empty() {
            tracing::trace!(%id, "no sinks, agenda dropped");
            return;
        }

        let multicast = Multicast::new(agenda);
        // Attach everyone before anything runs so no subscriber misses the start.
        let deliveries: Vec<_> = lanes
            .iter()
            .map(|lane| Delivery::new(multicast.subscribe(), Arc::clone(lane.sink()).open(id)))
            .collect();
        let scheduler = &*self.hub.options.scheduler;
        for (lane, delivery) in lanes.iter_mut().zip(deliveries) {
            lane.send(delivery, scheduler);
        }
    }

    /// Dispatch a single action.
    ///
    /// Publishing never waits for the stores, so the action is handed
    /// straight back.
    pub fn dispatch(&self, action: A) -> A {
        self.publish(Agenda::of(action.clone()));
        action
    }

    /// Dispatch the action `future` resolves to.
    ///
    /// The agenda emits once the future resolves; if it fails instead, the
    /// failure goes through the usual agenda error path. The returned handle
    /// resolves to the same outcome.
    pub fn dispatch_future<F>(&self, future: F) -> Deferred<A>
    where
        F: Future<Output = Result<A, AgendaError>> + Send + 'static,
    {
        let deferred = future.boxed().shared();
        self.publish(Agenda::from_future(deferred.clone()));
        deferred
    }

    /// Run a thunk.
    ///
    /// The thunk runs right away and receives an [`Emitter`]; every action
    /// it emits, now or later, is published as an agenda of its own. The
    /// thunk's return value is handed back.
    pub fn dispatch_thunk<F, R>(&self, thunk: F) -> R
    where
        F: FnOnce(Emitter<A>) -> R,
    {
        let emitter = Emitter {
            dispatcher: self.clone(),
        };
        thunk(emitter)
    }

    /// Dispatch an untyped action.
    ///
    /// Only JSON objects are actions.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ContractViolation`] for any other JSON value, or
    /// for an object that does not decode into `A`.
    pub fn dispatch_json(&self, value: serde_json::Value) -> Result<A>
    where
        A: DeserializeOwned,
    {
        if !value.is_object() {
            return Err(Error::ContractViolation(format!(
                "`dispatch` only takes thunks and actions as arguments, got `{value}`"
            )));
        }
        let action = serde_json::from_value(value).map_err(|e| {
            Error::ContractViolation(format!("object is not a valid action: {e}"))
        })?;
        Ok(self.dispatch(action))
    }

    /// Publish pre-built agendas.
    ///
    /// A single agenda is published as is. Several are published as one
    /// agenda that runs them strictly one after another. Nothing happens
    /// for an empty list.
    pub fn schedule<I>(&self, agendas: I)
    where
        I: IntoIterator<Item = Agenda<A>>,
    {
        let mut agendas: Vec<Agenda<A>> = agendas.into_iter().collect();
        if agendas.len() > 1 {
            self.publish(Agenda::concat(agendas));
        } else if let Some(agenda) = agendas.pop() {
            self.publish(agenda);
        }
    }

    /// Register `reducer` and return its store.
    ///
    /// The first call seeds the store by folding [`Action::init`] into
    /// `initial`. Later calls with the same reducer (or a clone of it)
    /// return the existing store and ignore `initial`.
    ///
    /// The store only sees agendas published after it was registered.
    pub fn reduce<S>(&self, reducer: &Reducer<S, A>, initial: S) -> StoreHandle<S>
    where
        S: Debug + Send + Sync + 'static,
    {
        let mut stores = lock(&self.hub.stores);
        if let Some(handle) = stores
            .get(&reducer.id())
            .and_then(|entry| entry.downcast_ref::<StoreHandle<S>>())
        {
            return handle.clone();
        }

        let name = match reducer.name() {
            Some(name) => name.to_string(),
            None => format!("#{}", stores.len()),
        };
        let engine = StoreEngine::new(name, reducer.clone(), initial, self.hub.options.logging.stores);
        let handle = engine.handle().clone();
        lock(&self.hub.lanes).push(Lane::new(engine));
        stores.insert(reducer.id(), Box::new(handle.clone()));
        handle
    }

    /// The store registered for `reducer`, if any.
    pub fn store<S>(&self, reducer: &Reducer<S, A>) -> Option<StoreHandle<S>>
    where
        S: Send + Sync + 'static,
    {
        lock(&self.hub.stores)
            .get(&reducer.id())
            .and_then(|entry| entry.downcast_ref::<StoreHandle<S>>())
            .cloned()
    }

    /// Current state of `reducer`'s store.
    ///
    /// Returns `None` and logs an error if the reducer was never
    /// registered.
    pub fn get_state<S>(&self, reducer: &Reducer<S, A>) -> Option<Arc<S>>
    where
        S: Send + Sync + 'static,
    {
        match self.store(reducer) {
            Some(store) => Some(store.get()),
            None => {
                let err = Error::UnknownReducer {
                    reducer: reducer.label(),
                };
                tracing::error!(error = %err, "get_state failed");
                None
            }
        }
    }

    /// Every action of every agenda published from now on, in delivery
    /// order.
    pub fn actions(&self) -> ActionStream<A> {
        let (tx, rx) = mpsc::unbounded_channel();
        lock(&self.hub.lanes).push(Lane::new(Arc::new(ForwardSink::new(tx))));
        UnboundedReceiverStream::new(rx)
    }

    /// Number of registered stores.
    pub fn store_count(&self) -> usize {
        lock(&self.hub.stores).len()
    }
}

impl<A: Action> Default for Dispatcher<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A> Clone for Dispatcher<A> {
    fn clone(&self) -> Self {
        Self {
            hub: Arc::clone(&self.hub),
        }
    }
}

impl<A> fmt::Debug for Dispatcher<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("options", &self.hub.options)
            .finish_non_exhaustive()
    }
}

/// Capability handed to thunks for emitting actions.
///
/// Each emitted action becomes its own single-action agenda. The emitter
/// can be cloned and moved into spawned tasks to emit later.
pub struct Emitter<A> {
    dispatcher: Dispatcher<A>,
}

impl<A: Action> Emitter<A> {
    /// Publish `action` as a single-action agenda.
    pub fn emit(&self, action: A) {
        self.dispatcher.publish(Agenda::of(action));
    }
}

impl<A> Clone for Emitter<A> {
    fn clone(&self) -> Self {
        Self {
            dispatcher: self.dispatcher.clone(),
        }
    }
}

impl<A> fmt::Debug for Emitter<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Emitter").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use serde_json::{json, Value};
    use std::time::Duration;
    use tokio::time::timeout;

    fn counter() -> Reducer<i64, Value> {
        Reducer::named("counter", |state: &Arc<i64>, action: &Value| {
            match action.name() {
                "INC" => Arc::new(**state + 1),
                "DEC" => Arc::new(**state - 1),
                _ => Arc::clone(state),
            }
        })
    }

    #[tokio::test]
    async fn reduce_is_idempotent_per_reducer() {
        let dispatcher: Dispatcher<Value> = Dispatcher::new();
        let reducer = counter();
        let first = dispatcher.reduce(&reducer, 0);
        let second = dispatcher.reduce(&reducer.clone(), 100);
        assert!(first.same_store(&second));
        assert_eq!(*second.get(), 0);
        assert_eq!(dispatcher.store_count(), 1);
    }

    #[tokio::test]
    async fn unnamed_stores_are_numbered() {
        let dispatcher: Dispatcher<Value> = Dispatcher::new();
        let a = Reducer::new(|state: &Arc<u8>, _: &Value| Arc::clone(state));
        let b = Reducer::new(|state: &Arc<u8>, _: &Value| Arc::clone(state));
        assert_eq!(dispatcher.reduce(&a, 0).name(), "#0");
        assert_eq!(dispatcher.reduce(&b, 0).name(), "#1");
    }

    #[tokio::test]
    async fn get_state_of_unknown_reducer_is_none() {
        let dispatcher: Dispatcher<Value> = Dispatcher::new();
        assert!(dispatcher.get_state(&counter()).is_none());
    }

    #[tokio::test]
    async fn dispatch_resolves_to_the_action() {
        let dispatcher: Dispatcher<Value> = Dispatcher::new();
        let action = dispatcher.dispatch(json!({ "type": "INC" }));
        assert_eq!(action, json!({ "type": "INC" }));
    }

    #[tokio::test]
    async fn dispatch_json_rejects_non_objects() {
        let dispatcher: Dispatcher<Value> = Dispatcher::new();
        for value in [json!(42), json!("INC"), json!([1, 2]), Value::Null] {
            assert!(matches!(
                dispatcher.dispatch_json(value),
                Err(Error::ContractViolation(_))
            ));
        }
        assert!(dispatcher.dispatch_json(json!({ "type": "INC" })).is_ok());
    }

    #[tokio::test]
    async fn dispatch_future_returns_shared_outcome() {
        let dispatcher: Dispatcher<Value> = Dispatcher::new();
        let store = dispatcher.reduce(&counter(), 0);
        let mut changes = store.changes();
        changes.next().await;

        let handle = dispatcher.dispatch_future(async { Ok(json!({ "type": "INC" })) });
        assert_eq!(handle.await.unwrap(), json!({ "type": "INC" }));
        assert_eq!(*changes.next().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn thunk_emits_independent_agendas() {
        let dispatcher: Dispatcher<Value> = Dispatcher::new();
        let store = dispatcher.reduce(&counter(), 0);
        let mut changes = store.changes();
        changes.next().await;

        let result = dispatcher.dispatch_thunk(|emit| {
            emit.emit(json!({ "type": "INC" }));
            emit.emit(json!({ "type": "INC" }));
            "thunk done"
        });
        assert_eq!(result, "thunk done");

        assert_eq!(*changes.next().await.unwrap(), 1);
        assert_eq!(*changes.next().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn actions_stream_sees_every_agenda() {
        let dispatcher: Dispatcher<Value> = Dispatcher::new();
        let mut actions = dispatcher.actions();
        dispatcher.schedule([
            Agenda::from_actions(vec![json!({ "type": "A" }), json!({ "type": "B" })]),
            Agenda::of(json!({ "type": "C" })),
        ]);

        let mut names = Vec::new();
        for _ in 0..3 {
            let action = timeout(Duration::from_secs(1), actions.next())
                .await
                .unwrap()
                .unwrap();
            names.push(action.name().to_string());
        }
        assert_eq!(names, vec!["A", "B", "C"]);
    }

    #[tokio::test]
    async fn dropped_action_stream_stops_being_a_sink() {
        let dispatcher: Dispatcher<Value> = Dispatcher::new();
        let store = dispatcher.reduce(&counter(), 0);
        let mut kept = dispatcher.actions();
        let dropped = dispatcher.actions();
        assert_eq!(lock(&dispatcher.hub.lanes).len(), 3);

        drop(dropped);
        let mut changes = store.changes();
        changes.next().await;
        dispatcher.dispatch(json!({ "type": "INC" }));

        assert_eq!(lock(&dispatcher.hub.lanes).len(), 2);
        assert_eq!(*changes.next().await.unwrap(), 1);
        assert_eq!(kept.next().await.unwrap()["type"], "INC");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn sequential_dispatches_fold_in_call_order() {
        let dispatcher: Dispatcher<Value> = Dispatcher::new();
        let record = || {
            Reducer::new(|state: &Arc<Vec<u64>>, action: &Value| match action["n"].as_u64() {
                Some(n) => {
                    let mut next = (**state).clone();
                    next.push(n);
                    Arc::new(next)
                }
                None => Arc::clone(state),
            })
        };
        let first = dispatcher.reduce(&record(), Vec::new());
        let second = dispatcher.reduce(&record(), Vec::new());
        let mut done = second.changes();

        for n in 0..200u64 {
            dispatcher.dispatch(json!({ "type": "N", "n": n }));
        }
        timeout(Duration::from_secs(5), async {
            while let Some(state) = done.next().await {
                if state.len() == 200 {
                    break;
                }
            }
        })
        .await
        .unwrap();

        let expected: Vec<u64> = (0..200).collect();
        assert_eq!(*second.get(), expected);
        // Every store folds the same sequence.
        timeout(Duration::from_secs(5), async {
            while first.get().len() < 200 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
        assert_eq!(*first.get(), expected);
    }

    #[tokio::test]
    async fn schedule_nothing_is_a_noop() {
        let dispatcher: Dispatcher<Value> = Dispatcher::new();
        dispatcher.schedule(Vec::new());
        assert_eq!(dispatcher.hub.next_agenda.load(Ordering::Relaxed), 0);
    }

    #[tokio::test]
    async fn agenda_logging_runs_agendas_without_stores() {
        let dispatcher: Dispatcher<Value> = Dispatcher::builder().logging(true).build();
        let (tx, rx) = tokio::sync::oneshot::channel();
        dispatcher.publish(Agenda::from_future(async move {
            let _ = tx.send(());
            Ok(json!({ "type": "PING" }))
        }));
        timeout(Duration::from_secs(1), rx).await.unwrap().unwrap();
    }
}
