//! The action trait.

use std::fmt::Debug;

/// Type tag of the reserved action folded into a store's initial state.
pub const INIT_TYPE: &str = "_INIT_";

/// Marker trait for values that can be dispatched to stores.
///
/// Actions are immutable once emitted: they may be replayed during a
/// rollback and are delivered to every registered store.
pub trait Action: Clone + Debug + Send + Sync + 'static {
    /// The reserved action each store folds into its initial state.
    fn init() -> Self;

    /// Short name used in diagnostics.
    fn name(&self) -> &str;
}

/// Untyped JSON actions, conventionally `{"type": "...", ...}`.
impl Action for serde_json::Value {
    fn init() -> Self {
        serde_json::json!({ "type": INIT_TYPE })
    }

    fn name(&self) -> &str {
        self.get("type")
            .and_then(serde_json::Value::as_str)
            .unwrap_or("<untyped>")
    }
}
