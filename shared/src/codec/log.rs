//! Log record codec.

use super::id::{decode_id_field, encode_id_field, SPAN_ID_LEN, TRACE_ID_LEN};
use super::value::{decode_attributes_field, decode_value, encode_attributes, encode_value};
use super::{put, set_i32, set_string, set_u32, set_u64, DecodeContext};
use crate::dynamic::{DynamicMap, DynamicValue, FieldAccess};
use opentelemetry_proto::tonic::logs::v1::LogRecord;

/// Encodes one log record.
#[must_use]
pub fn encode_log_record(record: &LogRecord) -> DynamicValue {
    let mut node = DynamicMap::new();
    put(&mut node, "timestamp", record.time_unix_nano);
    put(&mut node, "observedTimestamp", record.observed_time_unix_nano);
    put(&mut node, "traceID", encode_id_field::<TRACE_ID_LEN>(&record.trace_id));
    put(&mut node, "spanID", encode_id_field::<SPAN_ID_LEN>(&record.span_id));
    put(&mut node, "flags", record.flags);
    put(&mut node, "severityText", record.severity_text.as_str());
    put(&mut node, "severityNumber", record.severity_number);
    put(&mut node, "name", record.event_name.as_str());
    put(
        &mut node,
        "body",
        record
            .body
            .as_ref()
            .map_or_else(|| DynamicValue::Map(DynamicMap::new()), encode_value),
    );
    put(&mut node, "attributes", encode_attributes(&record.attributes));
    put(&mut node, "droppedAttributesCount", record.dropped_attributes_count);
    DynamicValue::Map(node)
}

/// Applies a log record node onto `record`.
///
/// A `body` that decodes to the empty value clears the body.
pub fn decode_log_record(record: &mut LogRecord, node: &DynamicMap, ctx: &mut DecodeContext<'_>) {
    set_u64(ctx, node, "timestamp", &mut record.time_unix_nano);
    set_u64(ctx, node, "observedTimestamp", &mut record.observed_time_unix_nano);
    decode_id_field::<TRACE_ID_LEN>(ctx, node, "traceID", "trace", &mut record.trace_id);
    decode_id_field::<SPAN_ID_LEN>(ctx, node, "spanID", "span", &mut record.span_id);
    set_u32(ctx, node, "flags", &mut record.flags);
    set_string(ctx, node, "severityText", &mut record.severity_text);
    set_i32(ctx, node, "severityNumber", &mut record.severity_number);
    set_string(ctx, node, "name", &mut record.event_name);
    if let Some(body) = node.value_field("body") {
        let body = ctx.field("body", |ctx| decode_value(body, ctx));
        record.body = body.value.is_some().then_some(body);
    }
    decode_attributes_field(ctx, node, "attributes", &mut record.attributes);
    set_u32(
        ctx,
        node,
        "droppedAttributesCount",
        &mut record.dropped_attributes_count,
    );
}
