//! Binding action creators to a dispatcher.

use std::collections::BTreeMap;
use std::future::Future;

use super::{Deferred, Dispatcher, Emitter};
use crate::action::Action;
use crate::error::AgendaError;

/// An action creator whose result is dispatched automatically.
pub type BoundAction<T, A> = Box<dyn Fn(T) -> A + Send + Sync>;

impl<A: Action> Dispatcher<A> {
    /// Bind `creator` so that calling it dispatches the action it returns.
    ///
    /// Creators taking several arguments take them as a tuple.
    ///
    /// # Examples
    ///
    /// ```
    /// use agendum::Dispatcher;
    /// use serde_json::{json, Value};
    ///
    /// # #[tokio::main(flavor = "current_thread")]
    /// # async fn main() {
    /// let dispatcher: Dispatcher<Value> = Dispatcher::new();
    /// let add = dispatcher.wrap_action(|(a, b): (i64, i64)| json!({ "type": "ADD", "sum": a + b }));
    /// let action = add((2, 3));
    /// assert_eq!(action["sum"], 5);
    /// # }
    /// ```
    pub fn wrap_action<T, F>(&self, creator: F) -> BoundAction<T, A>
    where
        F: Fn(T) -> A + Send + Sync + 'static,
        T: 'static,
    {
        let dispatcher = self.clone();
        Box::new(move |args| dispatcher.dispatch(creator(args)))
    }

    /// Bind a creator that produces an action asynchronously.
    ///
    /// Each call goes through [`Dispatcher::dispatch_future`] and returns
    /// its [`Deferred`] handle.
    pub fn wrap_future_action<T, F, Fut>(&self, creator: F) -> Box<dyn Fn(T) -> Deferred<A> + Send + Sync>
    where
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<A, AgendaError>> + Send + 'static,
        T: 'static,
    {
        let dispatcher = self.clone();
        Box::new(move |args| dispatcher.dispatch_future(creator(args)))
    }

    /// Bind a creator that produces a thunk.
    ///
    /// Each call runs the thunk through [`Dispatcher::dispatch_thunk`] and
    /// returns whatever the thunk returns.
    pub fn wrap_thunk_action<T, F, Th, R>(&self, creator: F) -> Box<dyn Fn(T) -> R + Send + Sync>
    where
        F: Fn(T) -> Th + Send + Sync + 'static,
        Th: FnOnce(Emitter<A>) -> R,
        T: 'static,
        R: 'static,
    {
        let dispatcher = self.clone();
        Box::new(move |args| dispatcher.dispatch_thunk(creator(args)))
    }

    /// Bind every creator in a list, keeping the order.
    pub fn wrap_actions<T, F, I>(&self, creators: I) -> Vec<BoundAction<T, A>>
    where
        I: IntoIterator<Item = F>,
        F: Fn(T) -> A + Send + Sync + 'static,
        T: 'static,
    {
        creators
            .into_iter()
            .map(|creator| self.wrap_action(creator))
            .collect()
    }

    /// Bind every creator in a keyed map, keeping the keys.
    pub fn wrap_action_map<K, T, F, I>(&self, creators: I) -> BTreeMap<K, BoundAction<T, A>>
    where
        I: IntoIterator<Item = (K, F)>,
        K: Ord,
        F: Fn(T) -> A + Send + Sync + 'static,
        T: 'static,
    {
        creators
            .into_iter()
            .map(|(key, creator)| (key, self.wrap_action(creator)))
            .collect()
    }
}
