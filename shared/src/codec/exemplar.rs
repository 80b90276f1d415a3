//! Exemplars attached to number, histogram and exponential histogram points.

use super::id::{decode_id_field, encode_id_field, SPAN_ID_LEN, TRACE_ID_LEN};
use super::value::{decode_attributes_field, encode_attributes};
use super::{decode_scalar, put, set_u64, DecodeContext, Scalar};
use crate::dynamic::{DynamicMap, DynamicValue};
use opentelemetry_proto::tonic::metrics::v1::{exemplar, Exemplar};

/// Encodes one exemplar.
#[must_use]
pub fn encode_exemplar(exemplar: &Exemplar) -> DynamicValue {
    let mut node = DynamicMap::new();
    put(&mut node, "attributes", encode_attributes(&exemplar.filtered_attributes));
    put(&mut node, "timestamp", exemplar.time_unix_nano);
    if let Some(value) = &exemplar.value {
        put(&mut node, "value", scalar_of(value));
    }
    put(
        &mut node,
        "traceID",
        encode_id_field::<TRACE_ID_LEN>(&exemplar.trace_id),
    );
    put(&mut node, "spanID", encode_id_field::<SPAN_ID_LEN>(&exemplar.span_id));
    DynamicValue::Map(node)
}

/// Applies an exemplar node onto `exemplar`.
pub fn decode_exemplar(exemplar: &mut Exemplar, node: &DynamicMap, ctx: &mut DecodeContext<'_>) {
    decode_attributes_field(ctx, node, "attributes", &mut exemplar.filtered_attributes);
    set_u64(ctx, node, "timestamp", &mut exemplar.time_unix_nano);
    if let Some(scalar) = decode_scalar(ctx, node, "value") {
        exemplar.value = Some(match scalar {
            Scalar::Int(i) => exemplar::Value::AsInt(i),
            Scalar::Double(d) => exemplar::Value::AsDouble(d),
        });
    }
    decode_id_field::<TRACE_ID_LEN>(ctx, node, "traceID", "trace", &mut exemplar.trace_id);
    decode_id_field::<SPAN_ID_LEN>(ctx, node, "spanID", "span", &mut exemplar.span_id);
}

fn scalar_of(value: &exemplar::Value) -> Scalar {
    match value {
        exemplar::Value::AsInt(i) => Scalar::Int(*i),
        exemplar::Value::AsDouble(d) => Scalar::Double(*d),
    }
}
