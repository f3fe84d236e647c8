//! Persistent state history.
//!
//! Every store keeps its history as a chain of immutable [`Anchor`]s. Each
//! anchor remembers the action that produced it and links back to its
//! predecessor, which is what makes excluding a failed agenda's actions
//! possible after the fact.

mod anchor;

pub use anchor::{Anchor, Ancestors, Entry};
