//! Per-reducer stores.
//!
//! A store pairs a [`Reducer`] with an observable current state. The
//! dispatcher creates one store per reducer and feeds it every agenda; the
//! store folds actions into its history and rolls back the contributions of
//! agendas that fail.

mod engine;
mod reducer;
mod store;

pub(crate) use engine::StoreEngine;
pub use reducer::{ReduceFn, Reducer, ReducerId};
pub use store::{StateStream, StoreHandle, Subscription};
