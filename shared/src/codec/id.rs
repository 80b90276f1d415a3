//! Trace and span identifiers.
//!
//! Identifiers travel as lowercase hex of a fixed width: 32 characters for a
//! trace id, 16 for a span id. The typed model stores them as byte vectors
//! where an empty vector means "unset"; unset ids encode as all zeroes and an
//! all-zero id decodes back to unset.

use super::{ConversionError, DecodeContext};
use crate::dynamic::{DynamicMap, FieldAccess, Lookup};

/// Width of a trace id in bytes.
pub const TRACE_ID_LEN: usize = 16;
/// Width of a span id in bytes.
pub const SPAN_ID_LEN: usize = 8;

/// Renders `id` as lowercase hex.
#[must_use]
pub fn encode_id<const N: usize>(id: &[u8; N]) -> String {
    hex::encode(id)
}

/// Parses a hex identifier.
///
/// Longer input is truncated to `N` bytes, shorter input is zero-padded on
/// the right. Odd lengths and non-hex characters are rejected.
///
/// # Errors
///
/// Returns the underlying [`hex::FromHexError`] for malformed input.
pub fn decode_id<const N: usize>(text: &str) -> Result<[u8; N], hex::FromHexError> {
    let bytes = hex::decode(text)?;
    let mut id = [0_u8; N];
    let len = bytes.len().min(N);
    id[..len].copy_from_slice(&bytes[..len]);
    Ok(id)
}

/// Widens a stored id to its fixed width; unset and odd-sized ids are
/// treated the same way as hex input of that length.
#[must_use]
pub fn to_fixed<const N: usize>(bytes: &[u8]) -> [u8; N] {
    let mut id = [0_u8; N];
    let len = bytes.len().min(N);
    id[..len].copy_from_slice(&bytes[..len]);
    id
}

/// Narrows a fixed-width id back to storage form: all zeroes become unset.
#[must_use]
pub fn from_fixed<const N: usize>(id: [u8; N]) -> Vec<u8> {
    if id.iter().all(|b| *b == 0) {
        Vec::new()
    } else {
        id.to_vec()
    }
}

/// Hex form of a stored id.
#[must_use]
pub fn encode_id_field<const N: usize>(bytes: &[u8]) -> String {
    encode_id(&to_fixed::<N>(bytes))
}

/// Decodes the hex id under `key` into `target`.
///
/// A malformed string clears the id and reports
/// [`ConversionError::MalformedIdentifier`]; a value that is not a string at
/// all keeps the id and reports a type mismatch.
pub(crate) fn decode_id_field<const N: usize>(
    ctx: &mut DecodeContext<'_>,
    node: &DynamicMap,
    key: &str,
    kind: &'static str,
    target: &mut Vec<u8>,
) {
    match node.str_field(key) {
        Lookup::Present(text) => match decode_id::<N>(text) {
            Ok(id) => *target = from_fixed(id),
            Err(source) => {
                target.clear();
                ctx.report(
                    key,
                    ConversionError::MalformedIdentifier {
                        kind,
                        value: text.to_string(),
                        source,
                    },
                );
            }
        },
        Lookup::Absent => {}
        Lookup::Mismatch { expected, found } => {
            ctx.report(key, ConversionError::FieldTypeMismatch { expected, found });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::put;
    use crate::diagnostics::CollectingSink;

    #[test]
    fn test_encode_pads_to_width() {
        assert_eq!(
            encode_id_field::<TRACE_ID_LEN>(&[]),
            "00000000000000000000000000000000"
        );
        assert_eq!(encode_id_field::<SPAN_ID_LEN>(&[0xab, 0xcd]), "abcd000000000000");
    }

    #[test]
    fn test_decode_truncates_and_pads() {
        let id: [u8; 4] = decode_id("0102030405").unwrap();
        assert_eq!(id, [1, 2, 3, 4]);
        let id: [u8; 4] = decode_id("ff").unwrap();
        assert_eq!(id, [0xff, 0, 0, 0]);
    }

    #[test]
    fn test_decode_accepts_uppercase() {
        let id: [u8; 2] = decode_id("ABcd").unwrap();
        assert_eq!(id, [0xab, 0xcd]);
    }

    #[test]
    fn test_all_zero_decodes_to_unset() {
        let sink = CollectingSink::new();
        let mut ctx = DecodeContext::new(&sink);
        let mut node = DynamicMap::new();
        put(&mut node, "spanID", "0000000000000000");

        let mut span_id = vec![1, 2, 3, 4, 5, 6, 7, 8];
        decode_id_field::<SPAN_ID_LEN>(&mut ctx, &node, "spanID", "span", &mut span_id);
        assert!(span_id.is_empty());
        assert!(sink.is_empty());
    }

    #[test]
    fn test_malformed_clears_and_reports() {
        let sink = CollectingSink::new();
        let mut ctx = DecodeContext::new(&sink);
        let mut node = DynamicMap::new();
        put(&mut node, "traceID", "not-hex");

        let mut trace_id = vec![7; TRACE_ID_LEN];
        decode_id_field::<TRACE_ID_LEN>(&mut ctx, &node, "traceID", "trace", &mut trace_id);
        assert!(trace_id.is_empty());

        let diagnostics = sink.take();
        assert_eq!(diagnostics.len(), 1);
        assert!(matches!(
            diagnostics[0].error,
            ConversionError::MalformedIdentifier { kind: "trace", .. }
        ));
    }

    #[test]
    fn test_non_string_keeps_id() {
        let sink = CollectingSink::new();
        let mut ctx = DecodeContext::new(&sink);
        let mut node = DynamicMap::new();
        put(&mut node, "spanID", 12_i64);

        let mut span_id = vec![9; SPAN_ID_LEN];
        decode_id_field::<SPAN_ID_LEN>(&mut ctx, &node, "spanID", "span", &mut span_id);
        assert_eq!(span_id, vec![9; SPAN_ID_LEN]);
        assert_eq!(sink.len(), 1);
    }
}
