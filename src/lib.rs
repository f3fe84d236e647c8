//! # Agendum
//!
//! Reactive action dispatch with per-reducer stores and selective rollback.
//!
//! Producers hand the [`Dispatcher`] plain actions, futures, thunks or whole
//! [`Agenda`]s (streams of actions). Every agenda is broadcast once to every
//! store registered through [`Dispatcher::reduce`], and each store folds the
//! agenda's actions into its own state.
//!
//! ## Rollback
//!
//! Agendas can fail midway. When that happens every store retracts exactly
//! the actions the failing agenda contributed, recomputes its state from the
//! point the agenda started while keeping the actions other agendas
//! delivered in the meantime, and emits the corrected state if it differs.
//!
//! ## Building blocks
//!
//! - [`Anchor`]: the persistent per-store history that makes rollback cheap
//! - [`StoreHandle`]: the observable current state of one store
//! - [`Reducer`]: a pure fold function with a stable identity
//! - [`Scheduler`]: where agenda deliveries run (tokio by default)

pub mod action;
pub mod agenda;
pub mod anchor;
pub mod dispatcher;
pub mod error;
pub mod runtime;
pub mod store;

// Re-export main types for convenience
pub use action::{Action, INIT_TYPE};
pub use agenda::{Agenda, AgendaId, AgendaObserver, AgendaSink};
pub use anchor::{Anchor, Ancestors, Entry};
pub use dispatcher::{
    ActionStream, BoundAction, Deferred, Dispatcher, DispatcherBuilder, DispatcherOptions,
    Emitter, LoggingOptions,
};
pub use error::{AgendaError, Error, Result};
pub use runtime::{Scheduler, TokioScheduler};
pub use store::{ReduceFn, Reducer, ReducerId, StateStream, StoreHandle, Subscription};
