//! Codecs between the OTLP model and the dynamic tree.
//!
//! Every codec comes as an `encode_*` function producing a [`DynamicValue`]
//! and a `decode_*` function that applies a map node onto an existing typed
//! value. Decoding is field-by-field: a key missing from the node leaves the
//! typed field untouched, a key of the wrong runtime type is reported to the
//! [`DecodeContext`]'s sink and also leaves the field untouched.
//!
//! - [`value`] - tagged attribute values and attribute sets
//! - [`id`] - trace and span identifiers
//! - [`exemplar`] - exemplars
//! - [`data_point`] - the four data point kinds
//! - [`aggregation`] - gauge, sum, histogram, exponential histogram, summary
//! - [`metric`] - metrics and shape dispatch
//! - [`log`] - log records
//! - [`scope`] - resources and instrumentation scopes

pub mod aggregation;
pub mod data_point;
pub mod exemplar;
pub mod id;
pub mod log;
pub mod metric;
pub mod scope;
pub mod value;

use crate::diagnostics::{Diagnostic, DiagnosticsSink};
use crate::dynamic::{DynamicMap, DynamicValue, FieldAccess, Lookup};
use std::fmt::Write as _;
use thiserror::Error;

/// Non-fatal errors raised while decoding a dynamic tree.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConversionError {
    /// An identifier string was not valid hex.
    #[error("malformed {kind} identifier {value:?}: {source}")]
    MalformedIdentifier {
        /// `trace` or `span`.
        kind: &'static str,
        /// The offending string.
        value: String,
        /// The hex decoding failure.
        #[source]
        source: hex::FromHexError,
    },

    /// An int-or-double field held neither an integer nor a float.
    #[error("unsupported scalar type {found}, expected integer or float")]
    UnsupportedScalarType {
        /// The runtime type that was found.
        found: &'static str,
    },

    /// A field held a value of the wrong runtime type.
    #[error("expected {expected}, found {found}")]
    FieldTypeMismatch {
        /// The expected shape.
        expected: &'static str,
        /// The runtime type that was found.
        found: &'static str,
    },

    /// A byte list contained something other than integers in `0..=255`.
    #[error("invalid byte at index {index}")]
    InvalidByte {
        /// Position of the first bad element.
        index: usize,
    },
}

enum Segment {
    Field(&'static str),
    Key(String),
    Index(usize),
}

/// State carried through one decode pass: the diagnostics sink and the
/// current position in the tree.
pub struct DecodeContext<'a> {
    sink: &'a dyn DiagnosticsSink,
    path: Vec<Segment>,
}

impl<'a> DecodeContext<'a> {
    /// Creates a context reporting into `sink`.
    #[must_use]
    pub fn new(sink: &'a dyn DiagnosticsSink) -> Self {
        Self {
            sink,
            path: Vec::new(),
        }
    }

    /// Runs `f` one fixed key deeper.
    pub fn field<R>(&mut self, key: &'static str, f: impl FnOnce(&mut Self) -> R) -> R {
        self.path.push(Segment::Field(key));
        let result = f(self);
        self.path.pop();
        result
    }

    /// Runs `f` one user-supplied key (attribute name) deeper.
    pub fn key<R>(&mut self, key: &str, f: impl FnOnce(&mut Self) -> R) -> R {
        self.path.push(Segment::Key(key.to_string()));
        let result = f(self);
        self.path.pop();
        result
    }

    /// Runs `f` one list index deeper.
    pub fn index<R>(&mut self, index: usize, f: impl FnOnce(&mut Self) -> R) -> R {
        self.path.push(Segment::Index(index));
        let result = f(self);
        self.path.pop();
        result
    }

    /// Reports an error for `key` below the current position.
    pub fn report(&mut self, key: &str, error: ConversionError) {
        let mut path = self.path();
        if !key.is_empty() {
            if !path.is_empty() {
                path.push('.');
            }
            path.push_str(key);
        }
        self.sink.report(Diagnostic { path, error });
    }

    /// Reports an error at the current position.
    pub fn report_here(&mut self, error: ConversionError) {
        self.report("", error);
    }

    fn path(&self) -> String {
        let mut rendered = String::new();
        for segment in &self.path {
            let key = match segment {
                Segment::Field(key) => *key,
                Segment::Key(key) => key.as_str(),
                Segment::Index(idx) => {
                    let _ = write!(rendered, "[{idx}]");
                    continue;
                }
            };
            if !rendered.is_empty() {
                rendered.push('.');
            }
            rendered.push_str(key);
        }
        rendered
    }
}

/// Writes a looked-up value into `target`; absent keeps it, mismatch reports.
pub(crate) fn apply<T>(ctx: &mut DecodeContext<'_>, key: &str, lookup: Lookup<T>, target: &mut T) {
    match lookup {
        Lookup::Present(value) => *target = value,
        Lookup::Absent => {}
        Lookup::Mismatch { expected, found } => {
            ctx.report(key, ConversionError::FieldTypeMismatch { expected, found });
        }
    }
}

pub(crate) fn set_string(
    ctx: &mut DecodeContext<'_>,
    node: &DynamicMap,
    key: &str,
    target: &mut String,
) {
    let lookup = match node.str_field(key) {
        Lookup::Present(s) => Lookup::Present(s.to_string()),
        Lookup::Absent => Lookup::Absent,
        Lookup::Mismatch { expected, found } => Lookup::Mismatch { expected, found },
    };
    apply(ctx, key, lookup, target);
}

pub(crate) fn set_u64(ctx: &mut DecodeContext<'_>, node: &DynamicMap, key: &str, target: &mut u64) {
    apply(ctx, key, node.u64_field(key), target);
}

pub(crate) fn set_count(ctx: &mut DecodeContext<'_>, node: &DynamicMap, key: &str, target: &mut u64) {
    apply(ctx, key, node.count_field(key), target);
}

pub(crate) fn set_u32(ctx: &mut DecodeContext<'_>, node: &DynamicMap, key: &str, target: &mut u32) {
    apply(ctx, key, node.u32_field(key), target);
}

pub(crate) fn set_i32(ctx: &mut DecodeContext<'_>, node: &DynamicMap, key: &str, target: &mut i32) {
    apply(ctx, key, node.i32_field(key), target);
}

pub(crate) fn set_f64(ctx: &mut DecodeContext<'_>, node: &DynamicMap, key: &str, target: &mut f64) {
    apply(ctx, key, node.f64_field(key), target);
}

pub(crate) fn set_bool(ctx: &mut DecodeContext<'_>, node: &DynamicMap, key: &str, target: &mut bool) {
    apply(ctx, key, node.bool_field(key), target);
}

/// Optional floats (histogram `sum`, `min`, `max`) become `Some` when present.
pub(crate) fn set_opt_f64(
    ctx: &mut DecodeContext<'_>,
    node: &DynamicMap,
    key: &str,
    target: &mut Option<f64>,
) {
    let lookup = match node.f64_field(key) {
        Lookup::Present(v) => Lookup::Present(Some(v)),
        Lookup::Absent => Lookup::Absent,
        Lookup::Mismatch { expected, found } => Lookup::Mismatch { expected, found },
    };
    apply(ctx, key, lookup, target);
}

/// The value arm of an int-or-double field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Scalar {
    /// Integer arm.
    Int(i64),
    /// Double arm.
    Double(f64),
}

impl From<Scalar> for DynamicValue {
    fn from(value: Scalar) -> Self {
        match value {
            Scalar::Int(i) => Self::Int(i),
            Scalar::Double(d) => Self::Float(d),
        }
    }
}

/// Resolves an int-or-double field by the runtime type of the node.
///
/// The resolution order is fixed: a dynamic integer selects the int arm, a
/// dynamic float selects the double arm. There is no coercion between the
/// two, so a script that writes `2.0` gets a double and `2` gets an int.
/// Anything else is reported as [`ConversionError::UnsupportedScalarType`]
/// and yields `None`, leaving the typed value as it was.
pub(crate) fn decode_scalar(
    ctx: &mut DecodeContext<'_>,
    node: &DynamicMap,
    key: &str,
) -> Option<Scalar> {
    match node.value_field(key)? {
        DynamicValue::Int(i) => Some(Scalar::Int(*i)),
        DynamicValue::Float(f) => Some(Scalar::Double(*f)),
        other => {
            ctx.report(
                key,
                ConversionError::UnsupportedScalarType {
                    found: other.type_name(),
                },
            );
            None
        }
    }
}

/// Decodes a list of records into `target`, replacing it.
///
/// Item `i` of the node is applied onto the prior record at position `i`
/// (or a default one), so keys missing from an item keep their values. The
/// result is pre-sized to the node's length; items that are not maps are
/// reported and skipped. A missing key keeps `target` as it was.
pub(crate) fn decode_list<T: Default>(
    ctx: &mut DecodeContext<'_>,
    node: &DynamicMap,
    key: &'static str,
    target: &mut Vec<T>,
    mut decode: impl FnMut(&mut T, &DynamicMap, &mut DecodeContext<'_>),
) {
    let items = match node.list_field(key) {
        Lookup::Present(items) => items,
        Lookup::Absent => return,
        Lookup::Mismatch { expected, found } => {
            ctx.report(key, ConversionError::FieldTypeMismatch { expected, found });
            return;
        }
    };

    let mut prior = std::mem::take(target).into_iter();
    let mut decoded = Vec::with_capacity(items.len());
    ctx.field(key, |ctx| {
        for (idx, item) in items.iter().enumerate() {
            let record = prior.next().unwrap_or_default();
            ctx.index(idx, |ctx| match item.as_map() {
                Some(item_node) => {
                    let mut record = record;
                    decode(&mut record, item_node, ctx);
                    decoded.push(record);
                }
                None => ctx.report_here(ConversionError::FieldTypeMismatch {
                    expected: "map",
                    found: item.type_name(),
                }),
            });
        }
    });
    *target = decoded;
}

/// Encodes a slice of records as a list node.
pub(crate) fn encode_list<T>(items: &[T], encode: impl Fn(&T) -> DynamicValue) -> DynamicValue {
    DynamicValue::List(items.iter().map(encode).collect())
}

/// Inserts `value` under a fixed key.
pub(crate) fn put(node: &mut DynamicMap, key: &str, value: impl Into<DynamicValue>) {
    node.insert(key.to_string(), value.into());
}
