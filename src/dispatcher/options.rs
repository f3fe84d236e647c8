use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::Dispatcher;
use crate::action::Action;
use crate::runtime::{Scheduler, TokioScheduler};

/// Which diagnostics the dispatcher reports through `tracing`.
///
/// Deserializes either from a flag (`true` turns everything on) or from a
/// map with the individual switches.
///
/// # Examples
///
/// ```
/// use agendum::LoggingOptions;
///
/// let all: LoggingOptions = serde_json::from_str("true").unwrap();
/// assert_eq!(all, LoggingOptions::all());
///
/// let stores: LoggingOptions = serde_json::from_str(r#"{ "stores": true }"#).unwrap();
/// assert!(stores.stores);
/// assert!(!stores.agendas);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "LoggingConfig")]
pub struct LoggingOptions {
    /// Report every published agenda, its actions and how it terminated.
    pub agendas: bool,

    /// Report every state change and rollback of every store.
    ///
    /// When off, stores still report agenda failures at error level.
    pub stores: bool,
}

impl LoggingOptions {
    /// Everything on.
    pub fn all() -> Self {
        Self {
            agendas: true,
            stores: true,
        }
    }

    /// Everything off.
    pub fn none() -> Self {
        Self::default()
    }
}

impl From<bool> for LoggingOptions {
    fn from(enabled: bool) -> Self {
        if enabled {
            Self::all()
        } else {
            Self::none()
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum LoggingConfig {
    Flag(bool),
    Detailed {
        #[serde(default)]
        agendas: bool,
        #[serde(default)]
        stores: bool,
    },
}

impl From<LoggingConfig> for LoggingOptions {
    fn from(config: LoggingConfig) -> Self {
        match config {
            LoggingConfig::Flag(enabled) => enabled.into(),
            LoggingConfig::Detailed { agendas, stores } => Self { agendas, stores },
        }
    }
}

/// Construction options for a [`Dispatcher`].
#[derive(Clone)]
pub struct DispatcherOptions {
    /// Runs agenda deliveries. Defaults to [`TokioScheduler`].
    pub scheduler: Arc<dyn Scheduler>,

    /// Diagnostic switches.
    pub logging: LoggingOptions,
}

impl Default for DispatcherOptions {
    fn default() -> Self {
        Self {
            scheduler: Arc::new(TokioScheduler::new()),
            logging: LoggingOptions::default(),
        }
    }
}

impl fmt::Debug for DispatcherOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatcherOptions")
            .field("logging", &self.logging)
            .finish_non_exhaustive()
    }
}

/// Builder for [`Dispatcher`].
///
/// # Examples
///
/// ```
/// use agendum::{Dispatcher, LoggingOptions};
///
/// let dispatcher: Dispatcher<serde_json::Value> = Dispatcher::builder()
///     .logging(LoggingOptions { agendas: true, stores: false })
///     .build();
/// assert!(dispatcher.options().logging.agendas);
/// ```
pub struct DispatcherBuilder<A> {
    options: DispatcherOptions,
    _action: PhantomData<fn() -> A>,
}

impl<A: Action> DispatcherBuilder<A> {
    /// Start from the default options.
    pub fn new() -> Self {
        Self {
            options: DispatcherOptions::default(),
            _action: PhantomData,
        }
    }

    /// Run deliveries on `scheduler`.
    pub fn scheduler(mut self, scheduler: impl Scheduler) -> Self {
        self.options.scheduler = Arc::new(scheduler);
        self
    }

    /// Set the diagnostic switches; `true`/`false` toggle everything.
    pub fn logging(mut self, logging: impl Into<LoggingOptions>) -> Self {
        self.options.logging = logging.into();
        self
    }

    /// Build the dispatcher.
    pub fn build(self) -> Dispatcher<A> {
        Dispatcher::with_options(self.options)
    }
}

impl<A: Action> Default for DispatcherBuilder<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A> fmt::Debug for DispatcherBuilder<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatcherBuilder")
            .field("options", &self.options)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bool_converts_to_all_or_nothing() {
        assert_eq!(LoggingOptions::from(true), LoggingOptions::all());
        assert_eq!(LoggingOptions::from(false), LoggingOptions::none());
    }

    #[test]
    fn deserializes_partial_map() {
        let opts: LoggingOptions = serde_json::from_str(r#"{ "agendas": true }"#).unwrap();
        assert!(opts.agendas);
        assert!(!opts.stores);
    }

    #[test]
    fn deserializes_flag() {
        let opts: LoggingOptions = serde_json::from_str("false").unwrap();
        assert_eq!(opts, LoggingOptions::none());
    }

    #[test]
    fn default_options_log_nothing() {
        let opts = DispatcherOptions::default();
        assert_eq!(opts.logging, LoggingOptions::none());
    }
}
