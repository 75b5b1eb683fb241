//! Deterministic witness identifiers for check failures.
//!
//! Two runs that hit the same semantic failure produce the same id, which
//! keeps regression logs diffable.
//!
//! `witnessId = "w1_" || base32hex_lower(SHA256(canonical key bytes))` where
//! the key is `{schema, class, subject, context}` serialized with sorted
//! keys and no whitespace.

use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

const WITNESS_SCHEMA: u64 = 1;

/// Compute a witness id for a failure `class` on `subject` (a column, chain
/// or quantity name) with optional structured `context`.
pub fn compute_witness_id(class: &str, subject: &str, context: Option<&Value>) -> String {
    let key = canonical_key(class, subject, context);
    let hash = Sha256::digest(key.as_bytes());
    format!("w1_{}", base32hex_lower_no_pad(&hash))
}

fn canonical_key(class: &str, subject: &str, context: Option<&Value>) -> String {
    let mut map = Map::new();
    map.insert("schema".to_string(), Value::from(WITNESS_SCHEMA));
    map.insert("class".to_string(), Value::from(class));
    map.insert("subject".to_string(), Value::from(subject));
    map.insert(
        "context".to_string(),
        context.map(sorted).unwrap_or(Value::Null),
    );
    Value::Object(map).to_string()
}

/// Rebuild objects so key order is lexicographic at every depth.
fn sorted(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut out = Map::new();
            for key in keys {
                out.insert(key.clone(), sorted(&map[key]));
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(sorted).collect()),
        other => other.clone(),
    }
}

/// RFC 4648 base32hex, lowercase, unpadded.
fn base32hex_lower_no_pad(data: &[u8]) -> String {
    const ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuv";

    let mut out = String::with_capacity(data.len().div_ceil(5) * 8);
    let mut buffer: u32 = 0;
    let mut bits: u32 = 0;
    for &byte in data {
        buffer = (buffer << 8) | u32::from(byte);
        bits += 8;
        while bits >= 5 {
            bits -= 5;
            out.push(ALPHABET[((buffer >> bits) & 0x1f) as usize] as char);
        }
        buffer &= (1 << bits) - 1;
    }
    if bits > 0 {
        out.push(ALPHABET[((buffer << (5 - bits)) & 0x1f) as usize] as char);
    }
    out
}
