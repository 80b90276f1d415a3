//! otlua Lua Processor
//!
//! Runs a user-supplied Lua function over OTLP metrics and log batches. Each
//! batch is converted to a Lua table, handed to the configured entrypoint,
//! and the returned table is converted back. A failing script never drops
//! data: the original batch is returned with the error.
//!
//! # Example
//!
//! ```
//! use processor::{Config, LuaExecutor, LuaProcessor};
//! use shared::TracingSink;
//! use opentelemetry_proto::tonic::metrics::v1::MetricsData;
//! use std::sync::Arc;
//!
//! let executor = LuaExecutor::new("noop.lua", "function process(batch) return batch end");
//! let processor = LuaProcessor::new(
//!     Config::new("noop.lua"),
//!     Arc::new(executor),
//!     Arc::new(TracingSink),
//! )
//! .unwrap();
//!
//! let processed = processor.process_metrics(MetricsData::default()).unwrap();
//! assert_eq!(processed, MetricsData::default());
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod config;
pub mod lua;

pub use config::{Config, ConfigError, SignalKind};
pub use lua::LuaExecutor;

use opentelemetry_proto::tonic::logs::v1::LogsData;
use opentelemetry_proto::tonic::metrics::v1::MetricsData;
use opentelemetry_proto::tonic::trace::v1::TracesData;
use shared::{
    DiagnosticsSink, LogsConverter, MetricsConverter, ProcessingFailure, ScriptExecutor,
    TracingSink,
};
use std::path::Path;
use std::sync::Arc;

/// Applies a Lua script to telemetry batches.
#[derive(Clone)]
pub struct LuaProcessor {
    config: Config,
    executor: Arc<dyn ScriptExecutor>,
    metrics: MetricsConverter,
    logs: LogsConverter,
}

impl LuaProcessor {
    /// Creates a processor from parts.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] if `config` is invalid.
    pub fn new(
        config: Config,
        executor: Arc<dyn ScriptExecutor>,
        sink: Arc<dyn DiagnosticsSink>,
    ) -> Result<Self, ConfigError> {
        config.validate_config()?;
        Ok(Self {
            config,
            executor,
            metrics: MetricsConverter::new(Arc::clone(&sink)),
            logs: LogsConverter::new(sink),
        })
    }

    /// Loads the configured script and logs diagnostics through `tracing`.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid, the script cannot
    /// be read, or it fails to load.
    pub fn from_config(config: Config) -> Result<Self, ConfigError> {
        config.validate_config()?;
        let executor = LuaExecutor::from_file(Path::new(&config.script))?;
        executor.check()?;
        for kind in [SignalKind::Metrics, SignalKind::Logs] {
            let entrypoint = config.entrypoint(kind);
            if !executor.has_function(entrypoint)? {
                tracing::warn!(
                    script = %config.script,
                    entrypoint,
                    signal = ?kind,
                    "Entrypoint not defined, batches of this signal will pass through unchanged"
                );
            }
        }
        tracing::info!(script = %config.script, "Loaded Lua script");
        Self::new(config, Arc::new(executor), Arc::new(TracingSink))
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Runs the metrics entrypoint over `batch`.
    ///
    /// # Errors
    ///
    /// Returns the untouched batch inside [`ProcessingFailure`] if the
    /// script fails.
    pub fn process_metrics(
        &self,
        batch: MetricsData,
    ) -> Result<MetricsData, ProcessingFailure<MetricsData>> {
        self.metrics.process(
            batch,
            self.executor.as_ref(),
            self.config.entrypoint(SignalKind::Metrics),
        )
    }

    /// Runs the logs entrypoint over `batch`.
    ///
    /// # Errors
    ///
    /// Returns the untouched batch inside [`ProcessingFailure`] if the
    /// script fails.
    pub fn process_logs(&self, batch: LogsData) -> Result<LogsData, ProcessingFailure<LogsData>> {
        self.logs.process(
            batch,
            self.executor.as_ref(),
            self.config.entrypoint(SignalKind::Logs),
        )
    }

    /// Traces are not scripted; the batch is returned as is.
    #[must_use]
    pub fn process_traces(&self, batch: TracesData) -> TracesData {
        tracing::debug!(
            resources = batch.resource_spans.len(),
            "Passing traces batch through"
        );
        batch
    }
}

impl std::fmt::Debug for LuaProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LuaProcessor")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
