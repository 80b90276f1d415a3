//! Resource and instrumentation scope codecs.
//!
//! Both are always emitted, even when the typed model leaves them unset, so a
//! script can write `resource.attributes.env = ...` without creating tables.
//! An unset resource or scope that comes back unchanged stays unset.

use super::value::{decode_attributes_field, encode_attributes};
use super::{put, set_string, set_u32, ConversionError, DecodeContext};
use crate::dynamic::{DynamicMap, DynamicValue, FieldAccess, Lookup};
use opentelemetry_proto::tonic::common::v1::InstrumentationScope;
use opentelemetry_proto::tonic::resource::v1::Resource;

/// Encodes a resource as `{attributes, droppedAttributesCount}`.
#[must_use]
pub fn encode_resource(resource: Option<&Resource>) -> DynamicValue {
    let mut node = DynamicMap::new();
    let (attributes, dropped) = resource.map_or((&[][..], 0), |r| {
        (r.attributes.as_slice(), r.dropped_attributes_count)
    });
    put(&mut node, "attributes", encode_attributes(attributes));
    put(&mut node, "droppedAttributesCount", dropped);
    DynamicValue::Map(node)
}

/// Decodes the resource map under `key`.
pub fn decode_resource(
    target: &mut Option<Resource>,
    node: &DynamicMap,
    key: &'static str,
    ctx: &mut DecodeContext<'_>,
) {
    decode_optional(ctx, node, key, target, |resource, resource_node, ctx| {
        decode_attributes_field(ctx, resource_node, "attributes", &mut resource.attributes);
        set_u32(
            ctx,
            resource_node,
            "droppedAttributesCount",
            &mut resource.dropped_attributes_count,
        );
    });
}

/// Encodes a scope as `{name, version, attributes, droppedAttributesCount}`.
#[must_use]
pub fn encode_scope(scope: Option<&InstrumentationScope>) -> DynamicValue {
    let default = InstrumentationScope::default();
    let scope = scope.unwrap_or(&default);
    let mut node = DynamicMap::new();
    put(&mut node, "name", scope.name.as_str());
    put(&mut node, "version", scope.version.as_str());
    put(&mut node, "attributes", encode_attributes(&scope.attributes));
    put(&mut node, "droppedAttributesCount", scope.dropped_attributes_count);
    DynamicValue::Map(node)
}

/// Decodes the scope map under `key`.
pub fn decode_scope(
    target: &mut Option<InstrumentationScope>,
    node: &DynamicMap,
    key: &'static str,
    ctx: &mut DecodeContext<'_>,
) {
    decode_optional(ctx, node, key, target, |scope, scope_node, ctx| {
        set_string(ctx, scope_node, "name", &mut scope.name);
        set_string(ctx, scope_node, "version", &mut scope.version);
        decode_attributes_field(ctx, scope_node, "attributes", &mut scope.attributes);
        set_u32(
            ctx,
            scope_node,
            "droppedAttributesCount",
            &mut scope.dropped_attributes_count,
        );
    });
}

fn decode_optional<T: Default + PartialEq>(
    ctx: &mut DecodeContext<'_>,
    node: &DynamicMap,
    key: &'static str,
    target: &mut Option<T>,
    decode: impl FnOnce(&mut T, &DynamicMap, &mut DecodeContext<'_>),
) {
    let inner = match node.map_field(key) {
        Lookup::Present(inner) => inner,
        Lookup::Absent => return,
        Lookup::Mismatch { expected, found } => {
            ctx.report(key, ConversionError::FieldTypeMismatch { expected, found });
            return;
        }
    };

    let was_set = target.is_some();
    let mut value = target.take().unwrap_or_default();
    ctx.field(key, |ctx| decode(&mut value, inner, ctx));
    *target = (was_set || value != T::default()).then_some(value);
}
