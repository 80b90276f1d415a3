//! Metrics converter.

use super::{
    count, decode_resource_groups, encode_resource_groups, run_script, ResourceGroup, ScopeGroup,
    Signal,
};
use crate::codec::metric::{decode_metric, encode_metric};
use crate::codec::{put, DecodeContext};
use crate::diagnostics::{DiagnosticsSink, TracingSink};
use crate::dynamic::{DynamicMap, DynamicValue};
use crate::script::{ProcessingFailure, ScriptExecutor};
use opentelemetry_proto::tonic::common::v1::InstrumentationScope;
use opentelemetry_proto::tonic::metrics::v1::{
    metric::Data, Metric, MetricsData, ResourceMetrics, ScopeMetrics,
};
use opentelemetry_proto::tonic::resource::v1::Resource;
use std::sync::Arc;

/// The metrics signal.
pub struct Metrics;

impl Signal for Metrics {
    type Resource = ResourceMetrics;

    const RESOURCES_KEY: &'static str = "resourceMetrics";
    const SCOPES_KEY: &'static str = "libraryMetrics";
    const RECORDS_KEY: &'static str = "metrics";

    fn encode_record(record: &Metric) -> DynamicValue {
        encode_metric(record)
    }

    fn decode_record(record: &mut Metric, node: &DynamicMap, ctx: &mut DecodeContext<'_>) {
        decode_metric(record, node, ctx);
    }
}

impl ResourceGroup for ResourceMetrics {
    type Scope = ScopeMetrics;

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

    fn scopes(&self) -> &[ScopeMetrics] {
        &self.scope_metrics
    }

    fn scopes_mut(&mut self) -> &mut Vec<ScopeMetrics> {
        &mut self.scope_metrics
    }
}

impl ScopeGroup for ScopeMetrics {
    type Record = Metric;

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

    fn records(&self) -> &[Metric] {
        &self.metrics
    }

    fn records_mut(&mut self) -> &mut Vec<Metric> {
        &mut self.metrics
    }
}

/// Converts metrics batches to and from the dynamic tree.
///
/// # Example
///
/// ```
/// use shared::converter::MetricsConverter;
/// use shared::dynamic::DynamicValue;
/// use opentelemetry_proto::tonic::metrics::v1::MetricsData;
///
/// let converter = MetricsConverter::default();
/// let DynamicValue::Map(tree) = converter.encode(&MetricsData::default()) else {
///     unreachable!()
/// };
/// assert_eq!(tree.get("metricCount"), Some(&DynamicValue::Int(0)));
/// assert_eq!(converter.decode(&tree), MetricsData::default());
/// ```
#[derive(Clone)]
pub struct MetricsConverter {
    sink: Arc<dyn DiagnosticsSink>,
}

impl Default for MetricsConverter {
    fn default() -> Self {
        Self::new(Arc::new(TracingSink))
    }
}

impl MetricsConverter {
    /// Creates a converter reporting decode diagnostics into `sink`.
    #[must_use]
    pub fn new(sink: Arc<dyn DiagnosticsSink>) -> Self {
        Self { sink }
    }

    /// Encodes a batch, adding `metricCount` and `dataPointCount`.
    #[must_use]
    pub fn encode(&self, batch: &MetricsData) -> DynamicValue {
        let (metrics, data_points) = totals(batch);
        let mut node = DynamicMap::new();
        put(
            &mut node,
            Metrics::RESOURCES_KEY,
            encode_resource_groups::<Metrics>(&batch.resource_metrics),
        );
        put(&mut node, "metricCount", count(metrics));
        put(&mut node, "dataPointCount", count(data_points));
        DynamicValue::Map(node)
    }

    /// Builds a batch from a tree. The derived counters are ignored.
    #[must_use]
    pub fn decode(&self, node: &DynamicMap) -> MetricsData {
        let mut ctx = DecodeContext::new(self.sink.as_ref());
        let mut batch = MetricsData::default();
        decode_resource_groups::<Metrics>(&mut ctx, node, &mut batch.resource_metrics);
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
        batch: MetricsData,
        executor: &dyn ScriptExecutor,
        entrypoint: &str,
    ) -> Result<MetricsData, ProcessingFailure<MetricsData>> {
        let (metrics, data_points) = totals(&batch);
        tracing::debug!(
            entrypoint,
            resources = batch.resource_metrics.len(),
            metrics,
            data_points,
            "Processing metrics batch"
        );
        let encoded = self.encode(&batch);
        run_script(batch, encoded, executor, entrypoint, |node| self.decode(node))
    }
}

impl std::fmt::Debug for MetricsConverter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsConverter").finish_non_exhaustive()
    }
}

/// Total metric and data point counts of a batch.
#[must_use]
pub fn totals(batch: &MetricsData) -> (usize, usize) {
    batch
        .resource_metrics
        .iter()
        .flat_map(|rm| &rm.scope_metrics)
        .flat_map(|sm| &sm.metrics)
        .fold((0, 0), |(metrics, points), metric| {
            (metrics + 1, points + data_point_count(metric))
        })
}

fn data_point_count(metric: &Metric) -> usize {
    match &metric.data {
        Some(Data::Gauge(s)) => s.data_points.len(),
        Some(Data::Sum(s)) => s.data_points.len(),
        Some(Data::Histogram(s)) => s.data_points.len(),
        Some(Data::ExponentialHistogram(s)) => s.data_points.len(),
        Some(Data::Summary(s)) => s.data_points.len(),
        None => 0,
    }
}
