//! Processor configuration.
//!
//! Handles loading configuration from environment variables, with the
//! entrypoint defaulting to `process` for every signal.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use validator::Validate;

/// Entrypoint used when no per-signal override is set.
pub const DEFAULT_FUNCTION: &str = "process";

/// Errors that can occur while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required environment variable is not set.
    #[error("environment variable {0} is not set")]
    MissingVar(&'static str),

    /// The configuration failed validation.
    #[error("invalid configuration: {0}")]
    Validation(#[from] validator::ValidationErrors),

    /// The script file could not be read.
    #[error("failed to read script {path}: {source}")]
    ReadScript {
        /// Path from the configuration.
        path: String,
        /// The I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// The script does not load.
    #[error("failed to load script: {0}")]
    Script(#[from] shared::ScriptError),
}

/// Signal types the processor handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalKind {
    /// Metrics batches.
    Metrics,
    /// Log batches.
    Logs,
    /// Trace batches (passed through).
    Traces,
}

/// Lua processor configuration.
///
/// Configuration values can be set via environment variables:
/// - `OTLUA_SCRIPT`: Path to the Lua script (required)
/// - `OTLUA_FUNCTION`: Entrypoint name (default: "process")
/// - `OTLUA_METRICS_FUNCTION`: Entrypoint for metrics, overrides `OTLUA_FUNCTION`
/// - `OTLUA_LOGS_FUNCTION`: Entrypoint for logs, overrides `OTLUA_FUNCTION`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct Config {
    /// Path to the Lua source file.
    #[validate(length(min = 1, message = "Script path cannot be empty"))]
    pub script: String,

    /// Entrypoint called for every signal without an override.
    #[serde(default = "default_function")]
    #[validate(length(min = 1, message = "Function name cannot be empty"))]
    pub function: String,

    /// Entrypoint for metrics.
    #[serde(default)]
    #[validate(length(min = 1, message = "Metrics function name cannot be empty"))]
    pub metrics_function: Option<String>,

    /// Entrypoint for logs.
    #[serde(default)]
    #[validate(length(min = 1, message = "Logs function name cannot be empty"))]
    pub logs_function: Option<String>,
}

fn default_function() -> String {
    DEFAULT_FUNCTION.to_string()
}

impl Config {
    /// Creates a configuration for `script` with default entrypoints.
    ///
    /// # Examples
    ///
    /// ```
    /// use processor::config::{Config, SignalKind};
    ///
    /// let config = Config::new("filter.lua");
    /// assert_eq!(config.entrypoint(SignalKind::Metrics), "process");
    /// ```
    #[must_use]
    pub fn new(script: impl Into<String>) -> Self {
        Self {
            script: script.into(),
            function: default_function(),
            metrics_function: None,
            logs_function: None,
        }
    }

    /// Creates a new configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `OTLUA_SCRIPT` is not set
    /// - any value fails validation
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`Config::from_env`], reading variables through `lookup`.
    ///
    /// # Errors
    ///
    /// See [`Config::from_env`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let script = lookup("OTLUA_SCRIPT").ok_or(ConfigError::MissingVar("OTLUA_SCRIPT"))?;
        let config = Self {
            script,
            function: lookup("OTLUA_FUNCTION").unwrap_or_else(default_function),
            metrics_function: lookup("OTLUA_METRICS_FUNCTION"),
            logs_function: lookup("OTLUA_LOGS_FUNCTION"),
        };
        config.validate_config()?;
        Ok(config)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] if a field is empty.
    pub fn validate_config(&self) -> Result<(), ConfigError> {
        self.validate()?;
        Ok(())
    }

    /// Returns the entrypoint for a signal.
    #[must_use]
    pub fn entrypoint(&self, kind: SignalKind) -> &str {
        let specific = match kind {
            SignalKind::Metrics => self.metrics_function.as_deref(),
            SignalKind::Logs => self.logs_function.as_deref(),
            SignalKind::Traces => None,
        };
        specific.unwrap_or(&self.function)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_from_lookup_defaults() {
        let config = Config::from_lookup(lookup(&[("OTLUA_SCRIPT", "/etc/otlua/filter.lua")])).unwrap();
        assert_eq!(config, Config::new("/etc/otlua/filter.lua"));
        assert_eq!(config.entrypoint(SignalKind::Logs), "process");
    }

    #[test]
    fn test_from_lookup_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("OTLUA_SCRIPT", "filter.lua"),
            ("OTLUA_FUNCTION", "run"),
            ("OTLUA_METRICS_FUNCTION", "on_metrics"),
        ]))
        .unwrap();
        assert_eq!(config.entrypoint(SignalKind::Metrics), "on_metrics");
        assert_eq!(config.entrypoint(SignalKind::Logs), "run");
        assert_eq!(config.entrypoint(SignalKind::Traces), "run");
    }

    #[test]
    fn test_missing_script_var() {
        let result = Config::from_lookup(lookup(&[]));
        assert!(matches!(result, Err(ConfigError::MissingVar("OTLUA_SCRIPT"))));
    }

    #[test]
    fn test_empty_values_fail_validation() {
        let result = Config::from_lookup(lookup(&[("OTLUA_SCRIPT", "")]));
        assert!(matches!(result, Err(ConfigError::Validation(_))));

        let mut config = Config::new("filter.lua");
        config.logs_function = Some(String::new());
        assert!(matches!(
            config.validate_config(),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_deserialize_applies_default_function() {
        let config: Config = serde_json::from_str(r#"{"script": "filter.lua"}"#).unwrap();
        assert_eq!(config.function, "process");
        assert_eq!(config.metrics_function, None);
    }

    #[test]
    fn test_signal_kind_serde() {
        let json = serde_json::to_string(&SignalKind::Metrics).unwrap();
        assert_eq!(json, "\"metrics\"");
    }
}
