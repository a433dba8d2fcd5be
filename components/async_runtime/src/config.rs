//! Runtime configuration.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised when a [`RuntimeConfig`] is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A drain budget of zero would make `run_until_idle` a no-op forever.
    #[error("drain budget must allow at least one task per run")]
    ZeroDrainBudget,
}

/// Settings for a [`Runtime`](crate::Runtime).
///
/// Every field has a default, so partial documents deserialize:
///
/// ```
/// use async_runtime::RuntimeConfig;
///
/// let config: RuntimeConfig = serde_json::from_str(r#"{ "drain_budget": 64 }"#).unwrap();
/// assert_eq!(config.drain_budget, Some(64));
/// assert!(config.catch_panics);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Maximum number of tasks one `run_until_idle` call executes.
    /// `None` drains until the queue is empty.
    pub drain_budget: Option<usize>,
    /// Turn panics inside continuations and tasks into rejections instead
    /// of unwinding into the host.
    pub catch_panics: bool,
    /// Report an unhandled rejection as soon as its last handle is dropped,
    /// not only at the next idle check.
    pub report_unhandled_on_drop: bool,
}

impl RuntimeConfig {
    /// Creates the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the per-run drain budget.
    pub fn with_drain_budget(mut self, budget: Option<usize>) -> Self {
        self.drain_budget = budget;
        self
    }

    /// Sets whether callback panics are caught.
    pub fn with_catch_panics(mut self, catch_panics: bool) -> Self {
        self.catch_panics = catch_panics;
        self
    }

    /// Sets whether dropping an unhandled rejection reports it.
    pub fn with_report_unhandled_on_drop(mut self, report: bool) -> Self {
        self.report_unhandled_on_drop = report;
        self
    }

    /// Checks the configuration for values the runtime cannot honour.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.drain_budget == Some(0) {
            return Err(ConfigError::ZeroDrainBudget);
        }
        Ok(())
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            drain_budget: None,
            catch_panics: true,
            report_unhandled_on_drop: true,
        }
    }
}
