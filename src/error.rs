//! Crate-level error types.

use std::fmt;
use std::sync::Arc;

/// Error returned by the dispatcher's public operations.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    /// The caller handed an operation an argument of the wrong kind.
    ///
    /// Always surfaced synchronously to the caller and never recovered
    /// internally.
    #[error("contract violation: {0}")]
    ContractViolation(String),

    /// An agenda terminated with an error.
    ///
    /// Stores recover from this locally by rolling back the agenda's
    /// actions, so it only ever reaches the diagnostic log.
    #[error("agenda failed: {0}")]
    AgendaFailure(#[from] AgendaError),

    /// `get_state` was called with a reducer that was never registered.
    #[error("reducer `{reducer}` wasn't yet reduced and is therefore unknown")]
    UnknownReducer {
        /// Display name of the reducer.
        reducer: String,
    },
}

/// Convenience alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// The error an agenda terminates with.
///
/// Agendas are multicast to every store, so the error has to be handed to
/// each subscriber. `AgendaError` is therefore a cheap `Clone` around a
/// shared source error.
#[derive(Clone)]
pub struct AgendaError {
    source: Arc<dyn std::error::Error + Send + Sync + 'static>,
}

impl AgendaError {
    /// Wrap an arbitrary error.
    pub fn new<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self {
            source: Arc::new(err),
        }
    }

    /// Build an error from a plain message.
    pub fn msg(message: impl Into<String>) -> Self {
        Self {
            source: Arc::new(Message(message.into())),
        }
    }

    /// Borrow the wrapped error.
    pub fn inner(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
        &*self.source
    }
}

impl fmt::Debug for AgendaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.source, f)
    }
}

impl fmt::Display for AgendaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&*self.source, f)
    }
}

impl std::error::Error for AgendaError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.source()
    }
}

#[derive(Debug)]
struct Message(String);

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for Message {}
