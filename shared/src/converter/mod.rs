//! Top-level converters between OTLP batches and the dynamic tree.
//!
//! Metrics and logs share the resource → scope → record layering. The
//! [`ResourceGroup`], [`ScopeGroup`] and [`Signal`] traits describe that
//! layering once, and the generic group codecs in this module walk it for
//! both signals.

pub mod logs;
pub mod metrics;

pub use logs::LogsConverter;
pub use metrics::MetricsConverter;

use crate::codec::scope::{decode_resource, decode_scope, encode_resource, encode_scope};
use crate::codec::{decode_list, encode_list, put, set_string, DecodeContext};
use crate::dynamic::{DynamicMap, DynamicValue};
use crate::script::{ProcessingFailure, ScriptError, ScriptExecutor};
use opentelemetry_proto::tonic::common::v1::InstrumentationScope;
use opentelemetry_proto::tonic::resource::v1::Resource;
use std::fmt::Debug;

/// A resource-level group (`ResourceMetrics`, `ResourceLogs`).
pub trait ResourceGroup: Default {
    /// Scope-level group type.
    type Scope: ScopeGroup;

    /// The resource, if set.
    fn resource(&self) -> Option<&Resource>;
    /// The resource, for decoding.
    fn resource_mut(&mut self) -> &mut Option<Resource>;
    /// Schema URL.
    fn schema_url(&self) -> &str;
    /// Schema URL, for decoding.
    fn schema_url_mut(&mut self) -> &mut String;
    /// Scope groups in order.
    fn scopes(&self) -> &[Self::Scope];
    /// Scope groups, for decoding.
    fn scopes_mut(&mut self) -> &mut Vec<Self::Scope>;
}

/// A scope-level group (`ScopeMetrics`, `ScopeLogs`).
pub trait ScopeGroup: Default {
    /// Record type.
    type Record: Default;

    /// The instrumentation scope, if set.
    fn scope(&self) -> Option<&InstrumentationScope>;
    /// The instrumentation scope, for decoding.
    fn scope_mut(&mut self) -> &mut Option<InstrumentationScope>;
    /// Schema URL.
    fn schema_url(&self) -> &str;
    /// Schema URL, for decoding.
    fn schema_url_mut(&mut self) -> &mut String;
    /// Records in order.
    fn records(&self) -> &[Self::Record];
    /// Records, for decoding.
    fn records_mut(&mut self) -> &mut Vec<Self::Record>;
}

/// One telemetry signal: its wire keys and its record codec.
pub trait Signal {
    /// Resource-level group type.
    type Resource: ResourceGroup;

    /// Batch key of the resource list, e.g. `resourceMetrics`.
    const RESOURCES_KEY: &'static str;
    /// Resource key of the scope list, e.g. `libraryMetrics`.
    const SCOPES_KEY: &'static str;
    /// Scope key of the record list, e.g. `metrics`.
    const RECORDS_KEY: &'static str;

    /// Encodes one record.
    fn encode_record(record: &Record<Self>) -> DynamicValue;

    /// Applies a record node.
    fn decode_record(record: &mut Record<Self>, node: &DynamicMap, ctx: &mut DecodeContext<'_>);
}

type Scope<S> = <<S as Signal>::Resource as ResourceGroup>::Scope;
type Record<S> = <Scope<S> as ScopeGroup>::Record;

/// Encodes the resource groups of a batch as a list.
pub fn encode_resource_groups<S: Signal>(groups: &[S::Resource]) -> DynamicValue {
    encode_list(groups, |group| {
        let mut node = DynamicMap::new();
        put(&mut node, "schemaUrl", group.schema_url());
        put(&mut node, "resource", encode_resource(group.resource()));
        put(
            &mut node,
            S::SCOPES_KEY,
            encode_list(group.scopes(), |scope| {
                let mut scope_node = DynamicMap::new();
                put(&mut scope_node, "schemaUrl", scope.schema_url());
                put(&mut scope_node, "library", encode_scope(scope.scope()));
                put(
                    &mut scope_node,
                    S::RECORDS_KEY,
                    encode_list(scope.records(), S::encode_record),
                );
                DynamicValue::Map(scope_node)
            }),
        );
        DynamicValue::Map(node)
    })
}

/// Decodes the resource list of a batch node into `target`.
pub fn decode_resource_groups<S: Signal>(
    ctx: &mut DecodeContext<'_>,
    node: &DynamicMap,
    target: &mut Vec<S::Resource>,
) {
    decode_list(ctx, node, S::RESOURCES_KEY, target, |group, group_node, ctx| {
        set_string(ctx, group_node, "schemaUrl", group.schema_url_mut());
        decode_resource(group.resource_mut(), group_node, "resource", ctx);
        decode_list(
            ctx,
            group_node,
            S::SCOPES_KEY,
            group.scopes_mut(),
            |scope, scope_node, ctx| {
                set_string(ctx, scope_node, "schemaUrl", scope.schema_url_mut());
                decode_scope(scope.scope_mut(), scope_node, "library", ctx);
                decode_list(
                    ctx,
                    scope_node,
                    S::RECORDS_KEY,
                    scope.records_mut(),
                    S::decode_record,
                );
            },
        );
    });
}

/// Hands an encoded batch to the script and decodes what it returns.
///
/// Any script failure, including a non-map result, returns the original
/// batch with the error.
pub(crate) fn run_script<B: Debug>(
    batch: B,
    encoded: DynamicValue,
    executor: &dyn ScriptExecutor,
    entrypoint: &str,
    decode: impl FnOnce(&DynamicMap) -> B,
) -> Result<B, ProcessingFailure<B>> {
    let result = executor
        .execute(entrypoint, vec![encoded])
        .and_then(|result| match result {
            DynamicValue::Map(node) => Ok(node),
            other => Err(ScriptError::InvalidReturn {
                found: other.type_name(),
            }),
        });

    match result {
        Ok(node) => Ok(decode(&node)),
        Err(source) => {
            tracing::error!(
                entrypoint,
                error = %source,
                "Script failed, passing batch through unchanged"
            );
            Err(ProcessingFailure { batch, source })
        }
    }
}

/// Saturating conversion for the derived counters.
pub(crate) fn count(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}
