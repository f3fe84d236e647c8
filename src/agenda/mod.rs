//! Agendas: sequences of actions published through the dispatcher.
//!
//! - [`Agenda`] is the producer-facing sequence and its constructors,
//!   including strict concatenation.
//! - `Multicast` shares one agenda between every subscriber with replay and
//!   reference-counted teardown.
//! - [`AgendaSink`] and [`AgendaObserver`] are the seam stores and other
//!   listeners plug into.

mod agenda;
mod multicast;
mod sink;

pub use agenda::{Agenda, AgendaId};
pub(crate) use multicast::{AgendaSubscription, Multicast};
pub use sink::{AgendaObserver, AgendaSink};
