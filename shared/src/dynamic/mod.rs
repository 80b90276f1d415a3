//! Dynamic tree representation exchanged with embedded scripts.
//!
//! A [`DynamicValue`] is the untyped, self-describing tree a script receives
//! and returns. It deliberately mirrors what a scripting runtime can express:
//! maps, lists, strings, booleans, 64-bit integers, 64-bit floats, raw bytes
//! and an explicit "absent" marker.
//!
//! Reading fields back out of a tree goes through the [`FieldAccess`]
//! extension trait. Every accessor is total: it reports [`Lookup::Absent`]
//! for missing keys, [`Lookup::Mismatch`] for values of the wrong runtime
//! type, and never panics.
//!
//! # Example
//!
//! ```
//! use shared::dynamic::{DynamicMap, DynamicValue, FieldAccess, Lookup};
//!
//! let mut node = DynamicMap::new();
//! node.insert("count".to_string(), DynamicValue::Int(3));
//! node.insert("name".to_string(), DynamicValue::from("cpu"));
//!
//! assert_eq!(node.u64_field("count"), Lookup::Present(3));
//! assert_eq!(node.u64_field("missing"), Lookup::Absent);
//! assert!(matches!(node.u64_field("name"), Lookup::Mismatch { .. }));
//! ```

#[cfg(feature = "lua")]
pub mod lua;

use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;

/// A string-keyed map node of the dynamic tree.
///
/// Keys are kept ordered so that two encodings of the same data compare
/// equal regardless of the order the typed model stored them in.
pub type DynamicMap = BTreeMap<String, DynamicValue>;

static EMPTY_MAP: DynamicMap = BTreeMap::new();

/// A node of the dynamic tree.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum DynamicValue {
    /// UTF-8 text.
    String(String),
    /// Boolean.
    Bool(bool),
    /// 64-bit signed integer.
    Int(i64),
    /// 64-bit float.
    Float(f64),
    /// Raw byte sequence.
    Bytes(Vec<u8>),
    /// Ordered list.
    List(Vec<DynamicValue>),
    /// String-keyed map.
    Map(DynamicMap),
    /// No value (a script's `nil`).
    #[default]
    Absent,
}

impl DynamicValue {
    /// Returns the runtime type name of this node, as used in diagnostics.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::String(_) => "string",
            Self::Bool(_) => "boolean",
            Self::Int(_) => "integer",
            Self::Float(_) => "float",
            Self::Bytes(_) => "bytes",
            Self::List(_) => "list",
            Self::Map(_) => "map",
            Self::Absent => "absent",
        }
    }

    /// Returns `true` for [`DynamicValue::Absent`].
    #[must_use]
    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }

    /// Returns the text of a string node.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Returns the value of a boolean node.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns an integer, accepting floats that carry no fractional part.
    ///
    /// Scripts doing arithmetic on integer fields can silently produce
    /// floats (`count * 2.0`), so integral floats are accepted here.
    #[must_use]
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_precision_loss,
        clippy::float_cmp
    )]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            Self::Float(f)
                if f.is_finite()
                    && f.fract() == 0.0
                    && *f >= i64::MIN as f64
                    && *f < i64::MAX as f64 =>
            {
                Some(*f as i64)
            }
            _ => None,
        }
    }

    /// Returns a float, widening integers.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            Self::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Returns the entries of a map node.
    ///
    /// An empty list is accepted as an empty map: scripting runtimes with a
    /// single table type cannot tell the two apart.
    #[must_use]
    pub fn as_map(&self) -> Option<&DynamicMap> {
        match self {
            Self::Map(m) => Some(m),
            Self::List(l) if l.is_empty() => Some(&EMPTY_MAP),
            _ => None,
        }
    }

    /// Returns the items of a list node.
    ///
    /// An empty map is accepted as an empty list.
    #[must_use]
    pub fn as_list(&self) -> Option<&[DynamicValue]> {
        match self {
            Self::List(l) => Some(l.as_slice()),
            Self::Map(m) if m.is_empty() => Some(&[]),
            _ => None,
        }
    }
}

impl From<&str> for DynamicValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for DynamicValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<bool> for DynamicValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for DynamicValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for DynamicValue {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<u32> for DynamicValue {
    fn from(value: u32) -> Self {
        Self::Int(i64::from(value))
    }
}

/// Unsigned 64-bit values (timestamps, counts) cross the boundary as the
/// same 64 bits reinterpreted as a signed integer.
impl From<u64> for DynamicValue {
    #[allow(clippy::cast_possible_wrap)]
    fn from(value: u64) -> Self {
        Self::Int(value as i64)
    }
}

impl From<f64> for DynamicValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<Vec<DynamicValue>> for DynamicValue {
    fn from(value: Vec<DynamicValue>) -> Self {
        Self::List(value)
    }
}

impl From<DynamicMap> for DynamicValue {
    fn from(value: DynamicMap) -> Self {
        Self::Map(value)
    }
}

/// Serializes the tree as plain JSON-like data; bytes become base64 strings.
impl Serialize for DynamicValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::String(s) => serializer.serialize_str(s),
            Self::Bool(b) => serializer.serialize_bool(*b),
            Self::Int(i) => serializer.serialize_i64(*i),
            Self::Float(f) => serializer.serialize_f64(*f),
            Self::Bytes(b) => {
                use base64::Engine;
                serializer.serialize_str(&base64::engine::general_purpose::STANDARD.encode(b))
            }
            Self::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Self::Map(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (key, value) in entries {
                    map.serialize_entry(key, value)?;
                }
                map.end()
            }
            Self::Absent => serializer.serialize_none(),
        }
    }
}

/// Outcome of reading one field out of a map node.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup<T> {
    /// The key is missing or holds [`DynamicValue::Absent`].
    Absent,
    /// The key holds a value of the expected shape.
    Present(T),
    /// The key holds a value of another runtime type.
    Mismatch {
        /// The shape the caller asked for.
        expected: &'static str,
        /// The runtime type that was found.
        found: &'static str,
    },
}

impl<T> Lookup<T> {
    /// Converts into an `Option`, treating a mismatch like an absent key.
    pub fn present(self) -> Option<T> {
        match self {
            Self::Present(value) => Some(value),
            Self::Absent | Self::Mismatch { .. } => None,
        }
    }
}

/// Typed, panic-free field extraction on map nodes.
pub trait FieldAccess {
    /// Returns the raw value under `key`, skipping explicit absents.
    fn value_field(&self, key: &str) -> Option<&DynamicValue>;

    /// Reads a string field.
    fn str_field(&self, key: &str) -> Lookup<&str> {
        extract(self.value_field(key), "string", DynamicValue::as_str)
    }

    /// Reads a boolean field.
    fn bool_field(&self, key: &str) -> Lookup<bool> {
        extract(self.value_field(key), "boolean", DynamicValue::as_bool)
    }

    /// Reads a signed 64-bit integer field.
    fn i64_field(&self, key: &str) -> Lookup<i64> {
        extract(self.value_field(key), "integer", DynamicValue::as_i64)
    }

    /// Reads an unsigned 64-bit timestamp; negative integers carry the high bit.
    #[allow(clippy::cast_sign_loss)]
    fn u64_field(&self, key: &str) -> Lookup<u64> {
        extract(self.value_field(key), "integer", |v| v.as_i64().map(|i| i as u64))
    }

    /// Reads a count, which must not be negative.
    fn count_field(&self, key: &str) -> Lookup<u64> {
        extract(self.value_field(key), "non-negative integer", |v| {
            v.as_i64().and_then(|i| u64::try_from(i).ok())
        })
    }

    /// Reads a field that must fit in an `i32`.
    fn i32_field(&self, key: &str) -> Lookup<i32> {
        extract(self.value_field(key), "32-bit integer", |v| {
            v.as_i64().and_then(|i| i32::try_from(i).ok())
        })
    }

    /// Reads a field that must fit in a `u32`.
    fn u32_field(&self, key: &str) -> Lookup<u32> {
        extract(self.value_field(key), "32-bit unsigned integer", |v| {
            v.as_i64().and_then(|i| u32::try_from(i).ok())
        })
    }

    /// Reads a float field, widening integers.
    fn f64_field(&self, key: &str) -> Lookup<f64> {
        extract(self.value_field(key), "float", DynamicValue::as_f64)
    }

    /// Reads a nested map.
    fn map_field(&self, key: &str) -> Lookup<&DynamicMap> {
        extract(self.value_field(key), "map", DynamicValue::as_map)
    }

    /// Reads a nested list.
    fn list_field(&self, key: &str) -> Lookup<&[DynamicValue]> {
        extract(self.value_field(key), "list", DynamicValue::as_list)
    }

    /// Reads a list of counts; one bad or negative element rejects the list.
    fn u64_list_field(&self, key: &str) -> Lookup<Vec<u64>> {
        extract(self.value_field(key), "list of non-negative integers", |v| {
            v.as_list()?
                .iter()
                .map(|item| item.as_i64().and_then(|i| u64::try_from(i).ok()))
                .collect()
        })
    }

    /// Reads a list of floats; one bad element rejects the list.
    fn f64_list_field(&self, key: &str) -> Lookup<Vec<f64>> {
        extract(self.value_field(key), "list of floats", |v| {
            v.as_list()?.iter().map(DynamicValue::as_f64).collect()
        })
    }
}

impl FieldAccess for DynamicMap {
    fn value_field(&self, key: &str) -> Option<&DynamicValue> {
        self.get(key).filter(|value| !value.is_absent())
    }
}

fn extract<'a, T>(
    value: Option<&'a DynamicValue>,
    expected: &'static str,
    convert: impl FnOnce(&'a DynamicValue) -> Option<T>,
) -> Lookup<T> {
    match value {
        None => Lookup::Absent,
        Some(value) => match convert(value) {
            Some(converted) => Lookup::Present(converted),
            None => Lookup::Mismatch {
                expected,
                found: value.type_name(),
            },
        },
    }
}
