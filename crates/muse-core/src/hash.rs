// SPDX-License-Identifier: MIT OR Apache-2.0
//! Canonical JSON encoding and content hashing shared by the VCS object
//! store and the event envelope sequence.

use serde::Serialize;
use sha2::{Digest, Sha256};

/// Errors that can occur while canonicalizing or hashing a value.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// The value could not be serialized to JSON.
    #[error("failed to serialize value to canonical JSON: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Serialize `value` to JSON with map keys sorted lexicographically, so
/// that two semantically equal values always hash to the same bytes
/// regardless of field declaration or insertion order.
pub fn canonical_json<T: Serialize>(value: &T) -> Result<Vec<u8>, CoreError> {
    let value = serde_json::to_value(value)?;
    let sorted = sort_value(value);
    Ok(serde_json::to_vec(&sorted)?)
}

fn sort_value(value: serde_json::Value) -> serde_json::Value {
    use serde_json::Value;
    match value {
        Value::Array(items) => Value::Array(items.into_iter().map(sort_value).collect()),
        Value::Object(map) => {
            let mut sorted = serde_json::Map::new();
            let mut keys: Vec<_> = map.keys().cloned().collect();
            keys.sort();
            for key in keys {
                let v = map[&key].clone();
                sorted.insert(key, sort_value(v));
            }
            Value::Object(sorted)
        }
        other => other,
    }
}

/// Hex-encoded SHA-256 digest of `bytes`.
#[must_use]
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let digest = hasher.finalize();
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn canonical_json_is_key_order_independent() {
        let a = json!({"b": 1, "a": 2});
        let b = json!({"a": 2, "b": 1});
        assert_eq!(canonical_json(&a).unwrap(), canonical_json(&b).unwrap());
    }

    #[test]
    fn sha256_hex_is_deterministic() {
        let bytes = b"muse";
        assert_eq!(sha256_hex(bytes), sha256_hex(bytes));
        assert_eq!(sha256_hex(bytes).len(), 64);
    }

    #[test]
    fn different_bytes_hash_differently() {
        assert_ne!(sha256_hex(b"muse"), sha256_hex(b"hub"));
    }
}
