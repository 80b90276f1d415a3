//! Tagged attribute values and attribute sets.
//!
//! A single [`AnyValue`] encodes as a one-key map naming its arm:
//!
//! ```text
//! {stringVal = "a"}  {boolVal = true}  {intVal = 1}  {doubleVal = 1.5}
//! {bytesVal = <bytes>}  {arrayVal = {...}}  {mapVal = {...}}  {}
//! ```
//!
//! An attribute set encodes as a flat map from attribute name to that tagged
//! form. On the way back, attribute entries may also be plain values written
//! by a script (`attrs.env = "prod"`); those are resolved by their runtime
//! type instead of by tag.

use super::{put, ConversionError, DecodeContext};
use crate::dynamic::{DynamicMap, DynamicValue, FieldAccess, Lookup};
use opentelemetry_proto::tonic::common::v1::{any_value, AnyValue, ArrayValue, KeyValue, KeyValueList};

/// Key of the string arm.
pub const STRING_VAL: &str = "stringVal";
/// Key of the boolean arm.
pub const BOOL_VAL: &str = "boolVal";
/// Key of the integer arm.
pub const INT_VAL: &str = "intVal";
/// Key of the double arm.
pub const DOUBLE_VAL: &str = "doubleVal";
/// Key of the bytes arm.
pub const BYTES_VAL: &str = "bytesVal";
/// Key of the array arm.
pub const ARRAY_VAL: &str = "arrayVal";
/// Key of the map arm.
pub const MAP_VAL: &str = "mapVal";

/// Tag keys in decode priority order.
pub const TAG_PRIORITY: [&str; 7] = [
    STRING_VAL, BOOL_VAL, INT_VAL, DOUBLE_VAL, MAP_VAL, ARRAY_VAL, BYTES_VAL,
];

/// Encodes one attribute value as a single-key tagged map.
#[must_use]
pub fn encode_value(value: &AnyValue) -> DynamicValue {
    use any_value::Value;

    let mut node = DynamicMap::new();
    match &value.value {
        Some(Value::StringValue(s)) => put(&mut node, STRING_VAL, s.as_str()),
        Some(Value::BoolValue(b)) => put(&mut node, BOOL_VAL, *b),
        Some(Value::IntValue(i)) => put(&mut node, INT_VAL, *i),
        Some(Value::DoubleValue(d)) => put(&mut node, DOUBLE_VAL, *d),
        Some(Value::BytesValue(b)) => put(&mut node, BYTES_VAL, DynamicValue::Bytes(b.clone())),
        Some(Value::ArrayValue(arr)) => put(
            &mut node,
            ARRAY_VAL,
            DynamicValue::List(arr.values.iter().map(encode_value).collect()),
        ),
        Some(Value::KvlistValue(kv)) => put(&mut node, MAP_VAL, encode_attributes(&kv.values)),
        None => {}
    }
    DynamicValue::Map(node)
}

/// Encodes an attribute set as a map from name to tagged value.
///
/// Entries without a value encode as the empty tagged map.
#[must_use]
pub fn encode_attributes(attributes: &[KeyValue]) -> DynamicValue {
    DynamicValue::Map(
        attributes
            .iter()
            .map(|kv| {
                let value = kv
                    .value
                    .as_ref()
                    .map_or_else(|| DynamicValue::Map(DynamicMap::new()), encode_value);
                (kv.key.clone(), value)
            })
            .collect(),
    )
}

/// Decodes one attribute value.
///
/// A map that is a tagged encoding (empty, or carrying one of the tag keys)
/// is resolved by the first tag present in [`TAG_PRIORITY`]. Anything else is
/// a plain value and resolved by its runtime type, see [`decode_plain_value`].
pub fn decode_value(node: &DynamicValue, ctx: &mut DecodeContext<'_>) -> AnyValue {
    match node {
        DynamicValue::Map(map) if is_tagged(map) => decode_tagged(map, ctx),
        other => decode_plain_value(other, ctx),
    }
}

/// Decodes a value written without a tag, by its runtime type.
///
/// | dynamic type | attribute arm |
/// |---|---|
/// | integer | int |
/// | float | double |
/// | string | string |
/// | boolean | bool |
/// | bytes | bytes |
/// | map | map (entries decoded with [`decode_value`]) |
/// | list | array (items decoded with [`decode_value`]) |
/// | absent | empty |
pub fn decode_plain_value(node: &DynamicValue, ctx: &mut DecodeContext<'_>) -> AnyValue {
    use any_value::Value;

    let value = match node {
        DynamicValue::Int(i) => Some(Value::IntValue(*i)),
        DynamicValue::Float(f) => Some(Value::DoubleValue(*f)),
        DynamicValue::String(s) => Some(Value::StringValue(s.clone())),
        DynamicValue::Bool(b) => Some(Value::BoolValue(*b)),
        DynamicValue::Bytes(b) => Some(Value::BytesValue(b.clone())),
        DynamicValue::Map(map) => Some(Value::KvlistValue(KeyValueList {
            values: decode_attribute_map(map, ctx),
        })),
        DynamicValue::List(items) => Some(Value::ArrayValue(decode_array(items, ctx))),
        DynamicValue::Absent => None,
    };
    AnyValue { value }
}

/// Decodes an attribute set. Entries come back ordered by name.
pub fn decode_attribute_map(map: &DynamicMap, ctx: &mut DecodeContext<'_>) -> Vec<KeyValue> {
    let mut attributes = Vec::with_capacity(map.len());
    for (key, value) in map {
        let decoded = ctx.key(key, |ctx| decode_value(value, ctx));
        attributes.push(KeyValue {
            key: key.clone(),
            value: Some(decoded),
        });
    }
    attributes
}

/// Replaces `target` with the attribute set under `key`, if present.
pub(crate) fn decode_attributes_field(
    ctx: &mut DecodeContext<'_>,
    node: &DynamicMap,
    key: &'static str,
    target: &mut Vec<KeyValue>,
) {
    match node.map_field(key) {
        Lookup::Present(map) => *target = ctx.field(key, |ctx| decode_attribute_map(map, ctx)),
        Lookup::Absent => {}
        Lookup::Mismatch { expected, found } => {
            ctx.report(key, ConversionError::FieldTypeMismatch { expected, found });
        }
    }
}

fn is_tagged(map: &DynamicMap) -> bool {
    map.is_empty() || TAG_PRIORITY.iter().any(|tag| map.value_field(tag).is_some())
}

fn decode_tagged(map: &DynamicMap, ctx: &mut DecodeContext<'_>) -> AnyValue {
    use any_value::Value;

    let Some((tag, node)) = TAG_PRIORITY
        .iter()
        .find_map(|tag| map.value_field(tag).map(|node| (*tag, node)))
    else {
        return AnyValue { value: None };
    };

    let value = match tag {
        STRING_VAL => node.as_str().map(|s| Value::StringValue(s.to_string())),
        BOOL_VAL => node.as_bool().map(Value::BoolValue),
        INT_VAL => node.as_i64().map(Value::IntValue),
        DOUBLE_VAL => node.as_f64().map(Value::DoubleValue),
        MAP_VAL => node.as_map().map(|entries| {
            Value::KvlistValue(KeyValueList {
                values: ctx.field(MAP_VAL, |ctx| decode_attribute_map(entries, ctx)),
            })
        }),
        ARRAY_VAL => node
            .as_list()
            .map(|items| Value::ArrayValue(ctx.field(ARRAY_VAL, |ctx| decode_array(items, ctx)))),
        _ => match decode_bytes(node) {
            Ok(bytes) => Some(Value::BytesValue(bytes)),
            Err(error) => {
                ctx.report(tag, error);
                return AnyValue { value: None };
            }
        },
    };

    if value.is_none() {
        ctx.report(
            tag,
            ConversionError::FieldTypeMismatch {
                expected: tag_type(tag),
                found: node.type_name(),
            },
        );
    }
    AnyValue { value }
}

fn decode_array(items: &[DynamicValue], ctx: &mut DecodeContext<'_>) -> ArrayValue {
    let mut values = Vec::with_capacity(items.len());
    for (idx, item) in items.iter().enumerate() {
        values.push(ctx.index(idx, |ctx| decode_value(item, ctx)));
    }
    ArrayValue { values }
}

/// Accepts a byte sequence, a string (its raw bytes) or a list of
/// integers in `0..=255`.
fn decode_bytes(node: &DynamicValue) -> Result<Vec<u8>, ConversionError> {
    match node {
        DynamicValue::Bytes(b) => Ok(b.clone()),
        DynamicValue::String(s) => Ok(s.as_bytes().to_vec()),
        other => {
            let items = other.as_list().ok_or(ConversionError::FieldTypeMismatch {
                expected: "bytes",
                found: other.type_name(),
            })?;
            items
                .iter()
                .enumerate()
                .map(|(index, item)| {
                    item.as_i64()
                        .and_then(|b| u8::try_from(b).ok())
                        .ok_or(ConversionError::InvalidByte { index })
                })
                .collect()
        }
    }
}

fn tag_type(tag: &str) -> &'static str {
    match tag {
        STRING_VAL => "string",
        BOOL_VAL => "boolean",
        INT_VAL => "integer",
        DOUBLE_VAL => "float",
        MAP_VAL => "map",
        ARRAY_VAL => "list",
        _ => "bytes",
    }
}
