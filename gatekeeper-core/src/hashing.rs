// gatekeeper-core/src/hashing.rs
// ============================================================================
// Module: Canonical JSON & Schema Fingerprint
// Description: RFC 8785 JSON canonicalization and SHA-256 content hashing.
// Purpose: Provide a byte-deterministic encoding for tool schema fingerprints,
//          manifest identity, and audit-record serialization.
// Dependencies: serde, serde_jcs, sha2
// ============================================================================

//! ## Overview
//! Every schema hash, manifest identity check, and audit-record write in the
//! pipeline goes through this single canonicalization routine, matching the
//! design note that canonical JSON must be "a byte-deterministic function of
//! the input value" shared by every caller. The round-trip fixed-point
//! property (decode -> canonical-encode -> decode -> canonical-encode yields
//! the same bytes) is the only correctness criterion that matters here; see
//! the `canonical_roundtrip_is_fixed_point` proptest.

use serde::Serialize;
use serde_json::Value;
use sha2::Digest;
use sha2::Sha256;
use thiserror::Error;

/// Errors raised while canonicalizing or hashing a JSON value.
#[derive(Debug, Error)]
pub enum EncodingError {
    /// The value contains a number that cannot be represented as finite JSON
    /// (NaN or infinity), or serialization otherwise failed.
    #[error("value is not representable as canonical json: {0}")]
    NotRepresentable(String),
}

/// Lowercase hex-encoded SHA-256 digest of a canonical JSON encoding.
pub type Fingerprint = String;

/// Returns canonical JSON bytes for a serializable value per RFC 8785: object
/// keys ordered by code-point ascending, no insignificant whitespace, and
/// numbers rendered in their minimal lossless textual form.
///
/// # Errors
///
/// Returns [`EncodingError::NotRepresentable`] when the value contains a
/// non-finite number or otherwise cannot be serialized.
pub fn canonical_json_bytes<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, EncodingError> {
    let as_value = serde_json::to_value(value)
        .map_err(|err| EncodingError::NotRepresentable(err.to_string()))?;
    reject_non_finite(&as_value)?;
    serde_jcs::to_vec(&as_value).map_err(|err| EncodingError::NotRepresentable(err.to_string()))
}

/// Encodes canonical JSON bytes as a UTF-8 string.
///
/// # Errors
///
/// Returns [`EncodingError::NotRepresentable`] under the same conditions as
/// [`canonical_json_bytes`].
pub fn canonical_json_string<T: Serialize + ?Sized>(value: &T) -> Result<String, EncodingError> {
    let bytes = canonical_json_bytes(value)?;
    String::from_utf8(bytes).map_err(|err| EncodingError::NotRepresentable(err.to_string()))
}

/// Computes the hex-encoded SHA-256 fingerprint of a value's canonical JSON
/// encoding. Used to identify tool argument schemas
/// (`schema_hash = sha256_hex(canonical_json(args_schema))`) and for manifest
/// identity checks.
///
/// # Errors
///
/// Returns [`EncodingError::NotRepresentable`] under the same conditions as
/// [`canonical_json_bytes`].
pub fn sha256_fingerprint<T: Serialize + ?Sized>(value: &T) -> Result<Fingerprint, EncodingError> {
    let bytes = canonical_json_bytes(value)?;
    Ok(hex_encode(&sha256(&bytes)))
}

/// Computes the hex-encoded SHA-256 digest of raw bytes.
#[must_use]
pub fn sha256_hex(bytes: &[u8]) -> String {
    hex_encode(&sha256(bytes))
}

/// Raw SHA-256 digest bytes.
fn sha256(bytes: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hasher.finalize().into()
}

/// Encodes bytes as a lowercase hex string.
fn hex_encode(bytes: &[u8]) -> String {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        out.push(HEX[(byte >> 4) as usize] as char);
        out.push(HEX[(byte & 0x0f) as usize] as char);
    }
    out
}

/// Walks a JSON value rejecting non-finite numbers. `serde_json::Number`
/// cannot itself hold NaN/infinity, so in practice this only guards against
/// values constructed from an `f64` via `Number::from_f64` upstream of this
/// call; the check is kept explicit so the failure mode from the spec
/// (`EncodingError` on non-finite number) has a concrete home.
fn reject_non_finite(value: &Value) -> Result<(), EncodingError> {
    match value {
        Value::Number(number) => {
            if let Some(as_f64) = number.as_f64()
                && !as_f64.is_finite()
            {
                return Err(EncodingError::NotRepresentable(
                    "non-finite number".to_string(),
                ));
            }
            Ok(())
        }
        Value::Array(items) => {
            for item in items {
                reject_non_finite(item)?;
            }
            Ok(())
        }
        Value::Object(map) => {
            for item in map.values() {
                reject_non_finite(item)?;
            }
            Ok(())
        }
        Value::Null | Value::Bool(_) | Value::String(_) => Ok(()),
    }
}
