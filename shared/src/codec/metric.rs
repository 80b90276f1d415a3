//! Metric codec and shape dispatch.

use super::aggregation::{decode_shape, encode_shape, Shape};
use super::value::{decode_attributes_field, encode_attributes};
use super::{put, set_string, ConversionError, DecodeContext};
use crate::dynamic::{DynamicMap, DynamicValue, FieldAccess, Lookup};
use opentelemetry_proto::tonic::metrics::v1::{
    metric::Data, ExponentialHistogram, Gauge, Histogram, Metric, Sum, Summary,
};

type ShapeDecoder = fn(&mut Option<Data>, &DynamicMap, &mut DecodeContext<'_>);

/// Shape keys in the order they are looked for on decode.
const SHAPE_DECODERS: [(&str, ShapeDecoder); 5] = [
    (Gauge::KEY, decode_shape::<Gauge>),
    (Sum::KEY, decode_shape::<Sum>),
    (Histogram::KEY, decode_shape::<Histogram>),
    (ExponentialHistogram::KEY, decode_shape::<ExponentialHistogram>),
    (Summary::KEY, decode_shape::<Summary>),
];

/// Encodes a metric: name, description, unit, metadata and its one shape key.
#[must_use]
pub fn encode_metric(metric: &Metric) -> DynamicValue {
    let mut node = DynamicMap::new();
    put(&mut node, "name", metric.name.as_str());
    put(&mut node, "description", metric.description.as_str());
    put(&mut node, "unit", metric.unit.as_str());
    put(&mut node, "metadata", encode_attributes(&metric.metadata));

    if let Some(data) = &metric.data {
        let (key, shape) = match data {
            Data::Gauge(s) => (Gauge::KEY, encode_shape(s)),
            Data::Sum(s) => (Sum::KEY, encode_shape(s)),
            Data::Histogram(s) => (Histogram::KEY, encode_shape(s)),
            Data::ExponentialHistogram(s) => (ExponentialHistogram::KEY, encode_shape(s)),
            Data::Summary(s) => (Summary::KEY, encode_shape(s)),
        };
        put(&mut node, key, shape);
    }
    DynamicValue::Map(node)
}

/// Applies a metric node onto `metric`.
///
/// The first shape key found (gauge, sum, histogram, exponentialHistogram,
/// summary) selects the variant; later keys are ignored. With no shape key
/// the metric keeps its current shape.
pub fn decode_metric(metric: &mut Metric, node: &DynamicMap, ctx: &mut DecodeContext<'_>) {
    set_string(ctx, node, "name", &mut metric.name);
    set_string(ctx, node, "description", &mut metric.description);
    set_string(ctx, node, "unit", &mut metric.unit);
    decode_attributes_field(ctx, node, "metadata", &mut metric.metadata);

    for (key, decode) in SHAPE_DECODERS {
        match node.map_field(key) {
            Lookup::Present(shape_node) => {
                decode(&mut metric.data, shape_node, ctx);
                return;
            }
            Lookup::Absent => {}
            Lookup::Mismatch { expected, found } => {
                ctx.report(key, ConversionError::FieldTypeMismatch { expected, found });
                decode(&mut metric.data, &DynamicMap::new(), ctx);
                return;
            }
        }
    }
}
