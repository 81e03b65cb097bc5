//! Canonical serialization of configuration documents
//!
//! The content hash must be a pure function of the configuration's meaning:
//! object key order never matters, and the volatile bookkeeping timestamps
//! in `metadata` (`createdAt`, `updatedAt`) are stripped before hashing.
//! `metadata.forcedUpdateAt` is deliberately NOT stripped — forced writes
//! stamp it precisely so the hash perturbs.

use serde_json::Value;

/// Metadata fields excluded from the canonical form.
const VOLATILE_METADATA_FIELDS: [&str; 2] = ["createdAt", "updatedAt"];

/// Produce the canonical byte form of a JSON value.
///
/// Keys are sorted recursively; volatile metadata timestamps are removed.
#[must_use]
pub fn canonical_bytes(value: &Value) -> Vec<u8> {
    canonical_string(value).into_bytes()
}

/// Produce the canonical string form of a JSON value.
#[must_use]
pub fn canonical_string(value: &Value) -> String {
    let mut normalized = value.clone();
    strip_volatile(&mut normalized);
    let mut out = String::new();
    write_canonical(&normalized, &mut out);
    out
}

/// Remove the volatile timestamp fields from a document's `metadata`.
///
/// Operates on the JSON form so it works for full documents and for raw
/// imported values alike; a value without a `metadata` object is untouched.
pub fn strip_volatile(value: &mut Value) {
    if let Some(metadata) = value.get_mut("metadata").and_then(Value::as_object_mut) {
        for field in VOLATILE_METADATA_FIELDS {
            metadata.remove(field);
        }
    }
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String((*key).clone()).to_string());
                out.push(':');
                write_canonical(&map[*key], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        // Scalars already have a deterministic compact form.
        scalar => out.push_str(&scalar.to_string()),
    }
}
