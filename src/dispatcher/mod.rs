//! The dispatcher hub.
//!
//! [`Dispatcher`] accepts actions, futures, thunks and pre-built agendas,
//! multicasts every agenda to all registered stores and keeps the registry
//! of stores by reducer identity. [`DispatcherBuilder`] and
//! [`DispatcherOptions`] configure scheduling and logging.

mod binder;
mod delivery;
mod dispatcher;
mod options;
mod sinks;

pub use binder::BoundAction;
pub use dispatcher::{ActionStream, Deferred, Dispatcher, Emitter};
pub use options::{DispatcherBuilder, DispatcherOptions, LoggingOptions};
