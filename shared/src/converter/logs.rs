//! Logs converter.

use super::{
    count, decode_resource_groups, encode_resource_groups, run_script, ResourceGroup, ScopeGroup,
    Signal,
};
use crate::codec::log::{decode_log_record, encode_log_record};
use crate::codec::{put, DecodeContext};
use crate::diagnostics::{DiagnosticsSink, TracingSink};
use crate::dynamic::{DynamicMap, DynamicValue};
use crate::script::{ProcessingFailure, ScriptExecutor};
use opentelemetry_proto::tonic::common::v1::InstrumentationScope;
use opentelemetry_proto::tonic::logs::v1::{LogRecord, LogsData, ResourceLogs, ScopeLogs};
use opentelemetry_proto::tonic::resource::v1::Resource;
use std::sync::Arc;

/// The logs signal.
pub struct Logs;

impl Signal for Logs {
    type Resource = ResourceLogs;

    const RESOURCES_KEY: &'static str = "resourceLogs";
    const SCOPES_KEY: &'static str = "libraryLogs";
    const RECORDS_KEY: &'static str = "logs";

    fn encode_record(record: &LogRecord) -> DynamicValue {
        encode_log_record(record)
    }

    fn decode_record(record: &mut LogRecord, node: &DynamicMap, ctx: &mut DecodeContext<'_>) {
        decode_log_record(record, node, ctx);
    }
}

impl ResourceGroup for ResourceLogs {
    type Scope = ScopeLogs;

    fn resource(&self) -> Option<&Resource> {
        self.resource.as_ref()
    }

    fn resource_mut(&mut self) -> &mut Option<Resource> {
        &mut self.resource
    }

    fn schema_url(&self) -> &str {
        &self.schema_url
    }

    fn schema_url_mut(&mut self) -> &mut String {
        &mut self.schema_url
    }

    fn scopes(&self) -> &[ScopeLogs] {
        &self.scope_logs
    }

    fn scopes_mut(&mut self) -> &mut Vec<ScopeLogs> {
        &mut self.scope_logs
    }
}

impl ScopeGroup for ScopeLogs {
    type Record = LogRecord;

    fn scope(&self) -> Option<&InstrumentationScope> {
        self.scope.as_ref()
    }

    fn scope_mut(&mut self) -> &mut Option<InstrumentationScope> {
        &mut self.scope
    }

    fn schema_url(&self) -> &str {
        &self.schema_url
    }

    fn schema_url_mut(&mut self) -> &mut String {
        &mut self.schema_url
    }

    fn records(&self) -> &[LogRecord] {
        &self.log_records
    }

    fn records_mut(&mut self) -> &mut Vec<LogRecord> {
        &mut self.log_records
    }
}

/// Converts log batches to and from the dynamic tree.
#[derive(Clone)]
pub struct LogsConverter {
    sink: Arc<dyn DiagnosticsSink>,
}

impl Default for LogsConverter {
    fn default() -> Self {
        Self::new(Arc::new(TracingSink))
    }
}

impl LogsConverter {
    /// Creates a converter reporting decode diagnostics into `sink`.
    #[must_use]
    pub fn new(sink: Arc<dyn DiagnosticsSink>) -> Self {
        Self { sink }
    }

    /// Encodes a batch, adding `logRecordCount`.
    #[must_use]
    pub fn encode(&self, batch: &LogsData) -> DynamicValue {
        let mut node = DynamicMap::new();
        put(
            &mut node,
            Logs::RESOURCES_KEY,
            encode_resource_groups::<Logs>(&batch.resource_logs),
        );
        put(&mut node, "logRecordCount", count(record_count(batch)));
        DynamicValue::Map(node)
    }

    /// Builds a batch from a tree. `logRecordCount` is ignored.
    #[must_use]
    pub fn decode(&self, node: &DynamicMap) -> LogsData {
        let mut ctx = DecodeContext::new(self.sink.as_ref());
        let mut batch = LogsData::default();
        decode_resource_groups::<Logs>(&mut ctx, node, &mut batch.resource_logs);
        batch
    }

    /// Runs `entrypoint` over the batch.
    ///
    /// # Errors
    ///
    /// Returns the original batch inside [`ProcessingFailure`] if the script
    /// fails or returns something other than a table.
    pub fn process(
        &self,
        batch: LogsData,
        executor: &dyn ScriptExecutor,
        entrypoint: &str,
    ) -> Result<LogsData, ProcessingFailure<LogsData>> {
        tracing::debug!(
            entrypoint,
            resources = batch.resource_logs.len(),
            log_records = record_count(&batch),
            "Processing logs batch"
        );
        let encoded = self.encode(&batch);
        run_script(batch, encoded, executor, entrypoint, |node| self.decode(node))
    }
}

impl std::fmt::Debug for LogsConverter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogsConverter").finish_non_exhaustive()
    }
}

/// Total number of log records in a batch.
#[must_use]
pub fn record_count(batch: &LogsData) -> usize {
    batch
        .resource_logs
        .iter()
        .flat_map(|rl| &rl.scope_logs)
        .map(|sl| sl.log_records.len())
        .sum()
}
