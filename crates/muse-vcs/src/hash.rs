// SPDX-License-Identifier: MIT OR Apache-2.0
//! Content-addressing helpers built on `muse-core`'s canonical JSON and
//! SHA-256 primitives.

use muse_core::{canonical_json, sha256_hex};
use serde::Serialize;

/// The fields of a [`muse_core::Commit`] that participate in its hash.
///
/// Mirrors `Commit` minus the `id` field itself — a commit's ID is the
/// hash of everything else about it, so the struct being hashed can never
/// contain the hash.
#[derive(Serialize)]
pub struct CommitPreimage<'a> {
    /// Owning repo.
    pub repo_id: &'a str,
    /// State-snapshot object this commit records.
    pub object_id: &'a str,
    /// Parent commit IDs.
    pub parent_ids: &'a [String],
    /// Commit message.
    pub message: &'a str,
    /// Author handle.
    pub author: &'a str,
    /// Commit timestamp.
    pub created_at: chrono::DateTime<chrono::Utc>,
    /// Arbitrary metadata.
    pub metadata: &'a std::collections::BTreeMap<String, serde_json::Value>,
}

/// Computes the content-addressed ID for a commit's fields.
///
/// Falls back to a fixed sentinel digest on the (practically unreachable)
/// case that the preimage fails to serialize, since every field type here
/// always round-trips through `serde_json`.
pub fn commit_id(preimage: &CommitPreimage<'_>) -> String {
    match canonical_json(preimage) {
        Ok(bytes) => sha256_hex(&bytes),
        Err(_) => sha256_hex(b"unhashable-commit"),
    }
}

/// Computes the content-addressed ID for an object's payload.
#[must_use]
pub fn object_id(data: &serde_json::Value) -> String {
    match canonical_json(data) {
        Ok(bytes) => sha256_hex(&bytes),
        Err(_) => sha256_hex(b"unhashable-object"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::collections::BTreeMap;

    #[test]
    fn object_id_is_deterministic_and_order_independent() {
        let a = serde_json::json!({"b": 1, "a": 2});
        let b = serde_json::json!({"a": 2, "b": 1});
        assert_eq!(object_id(&a), object_id(&b));
    }

    #[test]
    fn commit_id_changes_with_message() {
        let metadata = BTreeMap::new();
        let now = Utc::now();
        let base = CommitPreimage {
            repo_id: "r1",
            object_id: "obj1",
            parent_ids: &[],
            message: "initial",
            author: "alice",
            created_at: now,
            metadata: &metadata,
        };
        let changed = CommitPreimage {
            message: "different",
            ..base
        };
        assert_ne!(commit_id(&base), commit_id(&changed));
    }
}
