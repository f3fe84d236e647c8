use std::sync::Arc;

use super::AgendaId;
use crate::error::AgendaError;

/// Something that wants to see every agenda the dispatcher publishes.
///
/// Stores are sinks; so are the combined action stream and the agenda
/// logger. For each published agenda the dispatcher asks every sink for a
/// fresh [`AgendaObserver`] and drives it until the agenda terminates.
pub trait AgendaSink<A>: Send + Sync {
    /// Start observing the agenda `agenda`.
    fn open(self: Arc<Self>, agenda: AgendaId) -> Box<dyn AgendaObserver<A>>;

    /// Whether the sink will never want another agenda.
    ///
    /// Closed sinks are dropped by the dispatcher on its next publish.
    fn is_closed(&self) -> bool {
        false
    }
}

/// Per-agenda callbacks.
///
/// `next` is called once per action in emission order, then exactly one of
/// `complete` or `fail`.
pub trait AgendaObserver<A>: Send {
    /// The agenda emitted `action`.
    fn next(&mut self, action: A);

    /// The agenda terminated with `err`.
    fn fail(self: Box<Self>, err: AgendaError);

    /// The agenda completed.
    fn complete(self: Box<Self>);
}
