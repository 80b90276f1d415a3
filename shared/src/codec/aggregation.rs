//! Aggregation shapes: gauge, sum, histogram, exponential histogram, summary.
//!
//! Each shape is a list of data points plus a few shape-level scalars. The
//! [`Shape`] trait describes one shape; [`encode_shape`] and [`decode_shape`]
//! are the only encode/decode implementations, shared by all five.

use super::data_point::PointCodec;
use super::{decode_list, encode_list, put, set_bool, set_i32, DecodeContext};
use crate::dynamic::{DynamicMap, DynamicValue};
use opentelemetry_proto::tonic::metrics::v1::{
    metric::Data, ExponentialHistogram, ExponentialHistogramDataPoint, Gauge, Histogram,
    HistogramDataPoint, NumberDataPoint, Sum, Summary, SummaryDataPoint,
};

/// One aggregation shape of a metric.
pub trait Shape: Default {
    /// Key naming the shape on the metric node.
    const KEY: &'static str;

    /// Data point kind of this shape.
    type Point: PointCodec;

    /// The data points.
    fn points(&self) -> &[Self::Point];

    /// The data points, for decoding.
    fn points_mut(&mut self) -> &mut Vec<Self::Point>;

    /// Writes shape-level scalars.
    fn encode_scalars(&self, _node: &mut DynamicMap) {}

    /// Applies shape-level scalars.
    fn decode_scalars(&mut self, _node: &DynamicMap, _ctx: &mut DecodeContext<'_>) {}

    /// Extracts the shape if `data` holds this variant.
    fn from_data(data: Data) -> Option<Self>;

    /// Wraps the shape into its metric variant.
    fn into_data(self) -> Data;
}

/// Encodes a shape as `{dataPoints, ...scalars}`.
pub fn encode_shape<S: Shape>(shape: &S) -> DynamicValue {
    let mut node = DynamicMap::new();
    put(
        &mut node,
        "dataPoints",
        encode_list(shape.points(), <S::Point as PointCodec>::encode_point),
    );
    shape.encode_scalars(&mut node);
    DynamicValue::Map(node)
}

/// Decodes a shape node into `data`, selecting the variant `S`.
///
/// If `data` already holds `S`, the node is applied on top of it. Any other
/// variant is discarded first, so nothing of a previous shape survives.
pub fn decode_shape<S: Shape>(
    data: &mut Option<Data>,
    node: &DynamicMap,
    ctx: &mut DecodeContext<'_>,
) {
    let mut shape = data.take().and_then(S::from_data).unwrap_or_default();
    ctx.field(S::KEY, |ctx| {
        decode_list(ctx, node, "dataPoints", shape.points_mut(), |point, item, ctx| {
            point.decode_point(item, ctx);
        });
        shape.decode_scalars(node, ctx);
    });
    *data = Some(shape.into_data());
}

fn put_temporality(node: &mut DynamicMap, temporality: i32) {
    put(node, "aggregationTemporality", temporality);
}

impl Shape for Gauge {
    const KEY: &'static str = "gauge";
    type Point = NumberDataPoint;

    fn points(&self) -> &[NumberDataPoint] {
        &self.data_points
    }

    fn points_mut(&mut self) -> &mut Vec<NumberDataPoint> {
        &mut self.data_points
    }

    fn from_data(data: Data) -> Option<Self> {
        match data {
            Data::Gauge(gauge) => Some(gauge),
            _ => None,
        }
    }

    fn into_data(self) -> Data {
        Data::Gauge(self)
    }
}

impl Shape for Sum {
    const KEY: &'static str = "sum";
    type Point = NumberDataPoint;

    fn points(&self) -> &[NumberDataPoint] {
        &self.data_points
    }

    fn points_mut(&mut self) -> &mut Vec<NumberDataPoint> {
        &mut self.data_points
    }

    fn encode_scalars(&self, node: &mut DynamicMap) {
        put(node, "isMonotonic", self.is_monotonic);
        put_temporality(node, self.aggregation_temporality);
    }

    fn decode_scalars(&mut self, node: &DynamicMap, ctx: &mut DecodeContext<'_>) {
        set_bool(ctx, node, "isMonotonic", &mut self.is_monotonic);
        set_i32(ctx, node, "aggregationTemporality", &mut self.aggregation_temporality);
    }

    fn from_data(data: Data) -> Option<Self> {
        match data {
            Data::Sum(sum) => Some(sum),
            _ => None,
        }
    }

    fn into_data(self) -> Data {
        Data::Sum(self)
    }
}

impl Shape for Histogram {
    const KEY: &'static str = "histogram";
    type Point = HistogramDataPoint;

    fn points(&self) -> &[HistogramDataPoint] {
        &self.data_points
    }

    fn points_mut(&mut self) -> &mut Vec<HistogramDataPoint> {
        &mut self.data_points
    }

    fn encode_scalars(&self, node: &mut DynamicMap) {
        put_temporality(node, self.aggregation_temporality);
    }

    fn decode_scalars(&mut self, node: &DynamicMap, ctx: &mut DecodeContext<'_>) {
        set_i32(ctx, node, "aggregationTemporality", &mut self.aggregation_temporality);
    }

    fn from_data(data: Data) -> Option<Self> {
        match data {
            Data::Histogram(histogram) => Some(histogram),
            _ => None,
        }
    }

    fn into_data(self) -> Data {
        Data::Histogram(self)
    }
}

impl Shape for ExponentialHistogram {
    const KEY: &'static str = "exponentialHistogram";
    type Point = ExponentialHistogramDataPoint;

    fn points(&self) -> &[ExponentialHistogramDataPoint] {
        &self.data_points
    }

    fn points_mut(&mut self) -> &mut Vec<ExponentialHistogramDataPoint> {
        &mut self.data_points
    }

    fn encode_scalars(&self, node: &mut DynamicMap) {
        put_temporality(node, self.aggregation_temporality);
    }

    fn decode_scalars(&mut self, node: &DynamicMap, ctx: &mut DecodeContext<'_>) {
        set_i32(ctx, node, "aggregationTemporality", &mut self.aggregation_temporality);
    }

    fn from_data(data: Data) -> Option<Self> {
        match data {
            Data::ExponentialHistogram(histogram) => Some(histogram),
            _ => None,
        }
    }

    fn into_data(self) -> Data {
        Data::ExponentialHistogram(self)
    }
}

impl Shape for Summary {
    const KEY: &'static str = "summary";
    type Point = SummaryDataPoint;

    fn points(&self) -> &[SummaryDataPoint] {
        &self.data_points
    }

    fn points_mut(&mut self) -> &mut Vec<SummaryDataPoint> {
        &mut self.data_points
    }

    fn from_data(data: Data) -> Option<Self> {
        match data {
            Data::Summary(summary) => Some(summary),
            _ => None,
        }
    }

    fn into_data(self) -> Data {
        Data::Summary(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::CollectingSink;
    use opentelemetry_proto::tonic::metrics::v1::{number_data_point, AggregationTemporality};

    fn number(value: f64) -> NumberDataPoint {
        NumberDataPoint {
            value: Some(number_data_point::Value::AsDouble(value)),
            ..Default::default()
        }
    }

    #[test]
    fn test_sum_scalars_roundtrip() {
        let sum = Sum {
            data_points: vec![number(1.0), number(2.0)],
            aggregation_temporality: AggregationTemporality::Cumulative as i32,
            is_monotonic: true,
        };
        let DynamicValue::Map(node) = encode_shape(&sum) else {
            panic!("shapes encode as maps");
        };
        assert_eq!(node.get("isMonotonic"), Some(&DynamicValue::Bool(true)));

        let sink = CollectingSink::new();
        let mut data = None;
        decode_shape::<Sum>(&mut data, &node, &mut DecodeContext::new(&sink));
        assert_eq!(data, Some(Data::Sum(sum)));
    }

    #[test]
    fn test_other_variant_is_discarded() {
        let mut data = Some(Data::Sum(Sum {
            data_points: vec![number(5.0)],
            aggregation_temporality: 2,
            is_monotonic: true,
        }));

        let sink = CollectingSink::new();
        decode_shape::<Gauge>(&mut data, &DynamicMap::new(), &mut DecodeContext::new(&sink));
        assert_eq!(data, Some(Data::Gauge(Gauge::default())));
    }

    #[test]
    fn test_same_variant_is_updated_in_place() {
        let mut data = Some(Data::Histogram(Histogram {
            data_points: vec![HistogramDataPoint {
                count: 3,
                ..Default::default()
            }],
            aggregation_temporality: 1,
        }));
        let mut node = DynamicMap::new();
        put(&mut node, "aggregationTemporality", 2_i64);

        let sink = CollectingSink::new();
        decode_shape::<Histogram>(&mut data, &node, &mut DecodeContext::new(&sink));
        let Some(Data::Histogram(histogram)) = data else {
            panic!("expected a histogram");
        };
        assert_eq!(histogram.aggregation_temporality, 2);
        assert_eq!(histogram.data_points[0].count, 3);
    }

    #[test]
    fn test_diagnostic_path_includes_shape_key() {
        let mut node = DynamicMap::new();
        put(&mut node, "isMonotonic", "yes");

        let sink = CollectingSink::new();
        let mut data = None;
        decode_shape::<Sum>(&mut data, &node, &mut DecodeContext::new(&sink));
        assert_eq!(sink.take()[0].path, "sum.isMonotonic");
    }
}
