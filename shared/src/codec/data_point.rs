//! Data point codecs.
//!
//! All four point kinds share an envelope (attributes, start timestamp,
//! timestamp, flags and, except for summaries, exemplars). [`PointCodec`]
//! handles the envelope once; each kind only adds its own fields.

use super::exemplar::{decode_exemplar, encode_exemplar};
use super::value::{decode_attributes_field, encode_attributes};
use super::{
    apply, decode_list, decode_scalar, encode_list, put, set_count, set_f64, set_i32, set_opt_f64,
    set_u32, set_u64, ConversionError, DecodeContext, Scalar,
};
use crate::dynamic::{DynamicMap, DynamicValue, FieldAccess, Lookup};
use opentelemetry_proto::tonic::common::v1::KeyValue;
use opentelemetry_proto::tonic::metrics::v1::{
    exponential_histogram_data_point, number_data_point, summary_data_point, Exemplar,
    ExponentialHistogramDataPoint, HistogramDataPoint, NumberDataPoint, SummaryDataPoint,
};

/// Borrowed view of the shared point fields.
pub struct Envelope<'p> {
    /// Point attributes.
    pub attributes: &'p [KeyValue],
    /// `start_time_unix_nano`.
    pub start_time: u64,
    /// `time_unix_nano`.
    pub time: u64,
    /// Data point flags.
    pub flags: u32,
    /// Exemplars, for kinds that carry them.
    pub exemplars: Option<&'p [Exemplar]>,
}

/// Mutable view of the shared point fields.
pub struct EnvelopeMut<'p> {
    /// Point attributes.
    pub attributes: &'p mut Vec<KeyValue>,
    /// `start_time_unix_nano`.
    pub start_time: &'p mut u64,
    /// `time_unix_nano`.
    pub time: &'p mut u64,
    /// Data point flags.
    pub flags: &'p mut u32,
    /// Exemplars, for kinds that carry them.
    pub exemplars: Option<&'p mut Vec<Exemplar>>,
}

/// Encode/decode for one data point kind.
pub trait PointCodec: Default {
    /// Shared fields, read side.
    fn envelope(&self) -> Envelope<'_>;

    /// Shared fields, write side.
    fn envelope_mut(&mut self) -> EnvelopeMut<'_>;

    /// Writes the kind-specific fields.
    fn encode_fields(&self, node: &mut DynamicMap);

    /// Applies the kind-specific fields.
    fn decode_fields(&mut self, node: &DynamicMap, ctx: &mut DecodeContext<'_>);

    /// Encodes the whole point.
    fn encode_point(&self) -> DynamicValue {
        let envelope = self.envelope();
        let mut node = DynamicMap::new();
        put(&mut node, "attributes", encode_attributes(envelope.attributes));
        put(&mut node, "startTimestamp", envelope.start_time);
        put(&mut node, "timestamp", envelope.time);
        put(&mut node, "flags", envelope.flags);
        if let Some(exemplars) = envelope.exemplars {
            put(&mut node, "exemplars", encode_list(exemplars, encode_exemplar));
        }
        self.encode_fields(&mut node);
        DynamicValue::Map(node)
    }

    /// Applies a point node; absent keys keep their typed values.
    fn decode_point(&mut self, node: &DynamicMap, ctx: &mut DecodeContext<'_>) {
        let envelope = self.envelope_mut();
        decode_attributes_field(ctx, node, "attributes", envelope.attributes);
        set_u64(ctx, node, "startTimestamp", envelope.start_time);
        set_u64(ctx, node, "timestamp", envelope.time);
        set_u32(ctx, node, "flags", envelope.flags);
        if let Some(exemplars) = envelope.exemplars {
            decode_list(ctx, node, "exemplars", exemplars, decode_exemplar);
        }
        self.decode_fields(node, ctx);
    }
}

impl PointCodec for NumberDataPoint {
    fn envelope(&self) -> Envelope<'_> {
        Envelope {
            attributes: &self.attributes,
            start_time: self.start_time_unix_nano,
            time: self.time_unix_nano,
            flags: self.flags,
            exemplars: Some(&self.exemplars),
        }
    }

    fn envelope_mut(&mut self) -> EnvelopeMut<'_> {
        EnvelopeMut {
            attributes: &mut self.attributes,
            start_time: &mut self.start_time_unix_nano,
            time: &mut self.time_unix_nano,
            flags: &mut self.flags,
            exemplars: Some(&mut self.exemplars),
        }
    }

    fn encode_fields(&self, node: &mut DynamicMap) {
        match self.value {
            Some(number_data_point::Value::AsInt(i)) => put(node, "value", i),
            Some(number_data_point::Value::AsDouble(d)) => put(node, "value", d),
            None => {}
        }
    }

    fn decode_fields(&mut self, node: &DynamicMap, ctx: &mut DecodeContext<'_>) {
        if let Some(scalar) = decode_scalar(ctx, node, "value") {
            self.value = Some(match scalar {
                Scalar::Int(i) => number_data_point::Value::AsInt(i),
                Scalar::Double(d) => number_data_point::Value::AsDouble(d),
            });
        }
    }
}

impl PointCodec for HistogramDataPoint {
    fn envelope(&self) -> Envelope<'_> {
        Envelope {
            attributes: &self.attributes,
            start_time: self.start_time_unix_nano,
            time: self.time_unix_nano,
            flags: self.flags,
            exemplars: Some(&self.exemplars),
        }
    }

    fn envelope_mut(&mut self) -> EnvelopeMut<'_> {
        EnvelopeMut {
            attributes: &mut self.attributes,
            start_time: &mut self.start_time_unix_nano,
            time: &mut self.time_unix_nano,
            flags: &mut self.flags,
            exemplars: Some(&mut self.exemplars),
        }
    }

    fn encode_fields(&self, node: &mut DynamicMap) {
        put(node, "count", self.count);
        put_opt_f64(node, "sum", self.sum);
        put(node, "bucketCounts", u64_list(&self.bucket_counts));
        put(node, "explicitBounds", f64_list(&self.explicit_bounds));
        put_opt_f64(node, "min", self.min);
        put_opt_f64(node, "max", self.max);
    }

    fn decode_fields(&mut self, node: &DynamicMap, ctx: &mut DecodeContext<'_>) {
        set_count(ctx, node, "count", &mut self.count);
        set_opt_f64(ctx, node, "sum", &mut self.sum);
        apply(ctx, "bucketCounts", node.u64_list_field("bucketCounts"), &mut self.bucket_counts);
        apply(
            ctx,
            "explicitBounds",
            node.f64_list_field("explicitBounds"),
            &mut self.explicit_bounds,
        );
        set_opt_f64(ctx, node, "min", &mut self.min);
        set_opt_f64(ctx, node, "max", &mut self.max);
    }
}

impl PointCodec for ExponentialHistogramDataPoint {
    fn envelope(&self) -> Envelope<'_> {
        Envelope {
            attributes: &self.attributes,
            start_time: self.start_time_unix_nano,
            time: self.time_unix_nano,
            flags: self.flags,
            exemplars: Some(&self.exemplars),
        }
    }

    fn envelope_mut(&mut self) -> EnvelopeMut<'_> {
        EnvelopeMut {
            attributes: &mut self.attributes,
            start_time: &mut self.start_time_unix_nano,
            time: &mut self.time_unix_nano,
            flags: &mut self.flags,
            exemplars: Some(&mut self.exemplars),
        }
    }

    fn encode_fields(&self, node: &mut DynamicMap) {
        put(node, "count", self.count);
        put_opt_f64(node, "sum", self.sum);
        put(node, "scale", self.scale);
        put(node, "zeroCount", self.zero_count);
        if let Some(positive) = &self.positive {
            put(node, "positive", encode_buckets(positive));
        }
        if let Some(negative) = &self.negative {
            put(node, "negative", encode_buckets(negative));
        }
        put_opt_f64(node, "min", self.min);
        put_opt_f64(node, "max", self.max);
        put(node, "zeroThreshold", self.zero_threshold);
    }

    fn decode_fields(&mut self, node: &DynamicMap, ctx: &mut DecodeContext<'_>) {
        set_count(ctx, node, "count", &mut self.count);
        set_opt_f64(ctx, node, "sum", &mut self.sum);
        set_i32(ctx, node, "scale", &mut self.scale);
        set_count(ctx, node, "zeroCount", &mut self.zero_count);
        decode_buckets(ctx, node, "positive", &mut self.positive);
        decode_buckets(ctx, node, "negative", &mut self.negative);
        set_opt_f64(ctx, node, "min", &mut self.min);
        set_opt_f64(ctx, node, "max", &mut self.max);
        set_f64(ctx, node, "zeroThreshold", &mut self.zero_threshold);
    }
}

impl PointCodec for SummaryDataPoint {
    fn envelope(&self) -> Envelope<'_> {
        Envelope {
            attributes: &self.attributes,
            start_time: self.start_time_unix_nano,
            time: self.time_unix_nano,
            flags: self.flags,
            exemplars: None,
        }
    }

    fn envelope_mut(&mut self) -> EnvelopeMut<'_> {
        EnvelopeMut {
            attributes: &mut self.attributes,
            start_time: &mut self.start_time_unix_nano,
            time: &mut self.time_unix_nano,
            flags: &mut self.flags,
            exemplars: None,
        }
    }

    fn encode_fields(&self, node: &mut DynamicMap) {
        put(node, "count", self.count);
        put(node, "sum", self.sum);
        put(
            node,
            "quantileValues",
            encode_list(&self.quantile_values, |q| {
                let mut entry = DynamicMap::new();
                put(&mut entry, "quantile", q.quantile);
                put(&mut entry, "value", q.value);
                DynamicValue::Map(entry)
            }),
        );
    }

    fn decode_fields(&mut self, node: &DynamicMap, ctx: &mut DecodeContext<'_>) {
        set_count(ctx, node, "count", &mut self.count);
        set_f64(ctx, node, "sum", &mut self.sum);
        decode_list(
            ctx,
            node,
            "quantileValues",
            &mut self.quantile_values,
            |q: &mut summary_data_point::ValueAtQuantile, entry, ctx| {
                set_f64(ctx, entry, "quantile", &mut q.quantile);
                set_f64(ctx, entry, "value", &mut q.value);
            },
        );
    }
}

fn encode_buckets(buckets: &exponential_histogram_data_point::Buckets) -> DynamicValue {
    let mut node = DynamicMap::new();
    put(&mut node, "offset", buckets.offset);
    put(&mut node, "bucketCounts", u64_list(&buckets.bucket_counts));
    DynamicValue::Map(node)
}

/// Applies a bucket run onto the prior run (or an empty one).
fn decode_buckets(
    ctx: &mut DecodeContext<'_>,
    node: &DynamicMap,
    key: &'static str,
    target: &mut Option<exponential_histogram_data_point::Buckets>,
) {
    match node.map_field(key) {
        Lookup::Present(bucket_node) => {
            let buckets = target.get_or_insert_with(Default::default);
            ctx.field(key, |ctx| {
                set_i32(ctx, bucket_node, "offset", &mut buckets.offset);
                apply(
                    ctx,
                    "bucketCounts",
                    bucket_node.u64_list_field("bucketCounts"),
                    &mut buckets.bucket_counts,
                );
            });
        }
        Lookup::Absent => {}
        Lookup::Mismatch { expected, found } => {
            ctx.report(key, ConversionError::FieldTypeMismatch { expected, found });
        }
    }
}

fn put_opt_f64(node: &mut DynamicMap, key: &str, value: Option<f64>) {
    if let Some(value) = value {
        put(node, key, value);
    }
}

fn u64_list(values: &[u64]) -> DynamicValue {
    DynamicValue::List(values.iter().copied().map(DynamicValue::from).collect())
}

fn f64_list(values: &[f64]) -> DynamicValue {
    DynamicValue::List(values.iter().copied().map(DynamicValue::from).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::CollectingSink;

    fn roundtrip<P: PointCodec + Clone>(point: &P) -> (P, CollectingSink) {
        let DynamicValue::Map(node) = point.encode_point() else {
            panic!("points encode as maps");
        };
        let sink = CollectingSink::new();
        let mut decoded = P::default();
        decoded.decode_point(&node, &mut DecodeContext::new(&sink));
        (decoded, sink)
    }

    #[test]
    fn test_histogram_point_roundtrip() {
        let point = HistogramDataPoint {
            start_time_unix_nano: 10,
            time_unix_nano: 20,
            count: 4,
            sum: Some(2.5),
            bucket_counts: vec![1, 2, 1],
            explicit_bounds: vec![0.5, 1.0],
            min: Some(0.1),
            max: Some(1.7),
            flags: 1,
            ..Default::default()
        };
        let (decoded, sink) = roundtrip(&point);
        assert_eq!(decoded, point);
        assert!(sink.is_empty());
    }

    #[test]
    fn test_exponential_histogram_buckets_roundtrip() {
        let point = ExponentialHistogramDataPoint {
            count: 6,
            sum: Some(12.0),
            scale: -2,
            zero_count: 1,
            positive: Some(exponential_histogram_data_point::Buckets {
                offset: -3,
                bucket_counts: vec![2, 0, 3],
            }),
            negative: None,
            zero_threshold: 0.001,
            ..Default::default()
        };
        let (decoded, sink) = roundtrip(&point);
        assert_eq!(decoded, point);
        assert!(sink.is_empty());
    }

    #[test]
    fn test_summary_point_roundtrip_has_no_exemplars_key() {
        let point = SummaryDataPoint {
            count: 3,
            sum: 9.0,
            quantile_values: vec![
                summary_data_point::ValueAtQuantile {
                    quantile: 0.5,
                    value: 3.0,
                },
                summary_data_point::ValueAtQuantile {
                    quantile: 0.99,
                    value: 5.0,
                },
            ],
            ..Default::default()
        };
        let DynamicValue::Map(node) = point.encode_point() else {
            panic!("points encode as maps");
        };
        assert!(!node.contains_key("exemplars"));

        let (decoded, _) = roundtrip(&point);
        assert_eq!(decoded, point);
    }

    #[test]
    fn test_number_point_partial_update() {
        let mut point = NumberDataPoint {
            time_unix_nano: 99,
            flags: 1,
            value: Some(number_data_point::Value::AsDouble(1.5)),
            ..Default::default()
        };
        let mut node = DynamicMap::new();
        put(&mut node, "value", 7_i64);

        let sink = CollectingSink::new();
        point.decode_point(&node, &mut DecodeContext::new(&sink));
        assert_eq!(point.value, Some(number_data_point::Value::AsInt(7)));
        assert_eq!(point.time_unix_nano, 99);
        assert_eq!(point.flags, 1);
    }

    #[test]
    fn test_number_point_without_value_omits_key() {
        let point = NumberDataPoint::default();
        let DynamicValue::Map(node) = point.encode_point() else {
            panic!("points encode as maps");
        };
        assert!(!node.contains_key("value"));
    }

    #[test]
    fn test_bad_bucket_counts_keep_prior() {
        let mut point = HistogramDataPoint {
            bucket_counts: vec![1, 1],
            ..Default::default()
        };
        let mut node = DynamicMap::new();
        put(
            &mut node,
            "bucketCounts",
            DynamicValue::List(vec![DynamicValue::Int(1), DynamicValue::from("x")]),
        );

        let sink = CollectingSink::new();
        point.decode_point(&node, &mut DecodeContext::new(&sink));
        assert_eq!(point.bucket_counts, vec![1, 1]);
        assert_eq!(sink.take()[0].path, "bucketCounts");
    }

    #[test]
    fn test_negative_counts_are_reported_not_wrapped() {
        let mut point = ExponentialHistogramDataPoint {
            count: 9,
            zero_count: 2,
            ..Default::default()
        };
        let mut node = DynamicMap::new();
        put(&mut node, "count", DynamicValue::Int(-1));
        put(&mut node, "zeroCount", DynamicValue::Int(-4));

        let sink = CollectingSink::new();
        point.decode_point(&node, &mut DecodeContext::new(&sink));
        assert_eq!(point.count, 9);
        assert_eq!(point.zero_count, 2);

        let paths: Vec<String> = sink.take().into_iter().map(|d| d.path).collect();
        assert_eq!(paths, vec!["count".to_string(), "zeroCount".to_string()]);
    }
}
