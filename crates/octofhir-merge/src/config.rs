//! Merge engine configuration.
//!
//! Both structs deserialize from TOML with human-readable durations.
//!
//! # Example Configuration
//!
//! ```toml
//! [merge]
//! interval = "50ms"
//! max_delay = "250ms"
//! operation_name = "MergedOperation"
//!
//! [transport]
//! timeout = "30s"
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::merge::MERGED_OPERATION_NAME;

/// Debounce and merge settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeConfig {
    /// Period of the debounce grid. Flushes are aligned to multiples of this
    /// interval since the engine was created.
    /// Default: 50ms
    #[serde(with = "humantime_serde")]
    pub interval: Duration,

    /// Upper bound on how long the oldest pending request may wait for its
    /// batch. Unset means the flush keeps sliding for as long as requests
    /// keep arriving.
    /// Default: unset
    #[serde(with = "humantime_serde")]
    pub max_delay: Option<Duration>,

    /// Name of the synthetic merged operation.
    /// Default: "MergedOperation"
    pub operation_name: String,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(50),
            max_delay: None,
            operation_name: MERGED_OPERATION_NAME.to_string(),
        }
    }
}

impl MergeConfig {
    /// Creates a configuration with the given debounce interval.
    #[must_use]
    pub fn with_interval(interval: Duration) -> Self {
        Self {
            interval,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = Some(max_delay);
        self
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration values are invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.interval.is_zero() {
            return Err("merge.interval must be > 0".into());
        }
        if self.max_delay.is_some_and(|d| d.is_zero()) {
            return Err("merge.max_delay must be > 0 when set".into());
        }
        if !is_graphql_name(&self.operation_name) {
            return Err(format!(
                "merge.operation_name '{}' is not a valid GraphQL name",
                self.operation_name
            ));
        }
        Ok(())
    }
}

/// Settings for [`ReqwestTransport`](crate::ReqwestTransport).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Timeout for a whole request including reading the body.
    /// Default: 30s
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,

    /// Value of the `User-Agent` header.
    pub user_agent: String,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            user_agent: concat!("octofhir-merge/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl TransportConfig {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration values are invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.timeout.is_zero() {
            return Err("transport.timeout must be > 0".into());
        }
        Ok(())
    }
}

/// `/[_A-Za-z][_0-9A-Za-z]*/`
fn is_graphql_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c == '_' || c.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c == '_' || c.is_ascii_alphanumeric())
}
