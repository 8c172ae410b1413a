// SPDX-License-Identifier: MIT OR Apache-2.0
//! Entity record shared by the registry and the state store.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use uuid::Uuid;

/// The kind of entity a project tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// A track (instrument lane).
    Track,
    /// A region within a track (a bounded span of notes).
    Region,
    /// A mix bus.
    Bus,
    /// The project itself.
    Project,
}

/// A server-issued, name-resolvable entity.
///
/// IDs are always server-generated UUIDs; external callers (including the
/// LLM planner) reference entities by name and the server resolves the name
/// to an ID through the [`EntityRegistry`](https://docs.rs/muse-registry).
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Entity {
    /// Server-issued unique identifier.
    pub id: Uuid,
    /// Entity kind.
    pub kind: EntityKind,
    /// Human-readable name; indexed case-insensitively.
    pub name: String,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Arbitrary key-value metadata (tempo hints, color, etc.).
    #[serde(default)]
    pub metadata: BTreeMap<String, Value>,
    /// Parent track ID. Required for `Region`, unset otherwise.
    #[serde(default)]
    pub parent_id: Option<Uuid>,
    /// Region start, in beats. Set only for `Region` entities.
    #[serde(default)]
    pub start_beat: Option<f64>,
    /// Region length, in beats. Set only for `Region` entities.
    #[serde(default)]
    pub duration_beats: Option<f64>,
}

impl Entity {
    /// Construct a new entity with the given kind and name.
    #[must_use]
    pub fn new(kind: EntityKind, name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            name: name.into(),
            created_at: Utc::now(),
            metadata: BTreeMap::new(),
            parent_id: None,
            start_beat: None,
            duration_beats: None,
        }
    }

    /// Construct a region entity owned by `parent_id`, spanning
    /// `[start_beat, start_beat + duration_beats)`.
    #[must_use]
    pub fn new_region(
        name: impl Into<String>,
        parent_id: Uuid,
        start_beat: f64,
        duration_beats: f64,
    ) -> Self {
        let mut e = Self::new(EntityKind::Region, name);
        e.parent_id = Some(parent_id);
        e.start_beat = Some(start_beat);
        e.duration_beats = Some(duration_beats);
        e
    }

    /// Construct an entity with a caller-supplied identifier, used when
    /// re-indexing from a client-reported snapshot whose IDs already exist
    /// outside the registry.
    #[must_use]
    pub fn with_id(id: Uuid, kind: EntityKind, name: impl Into<String>) -> Self {
        let mut e = Self::new(kind, name);
        e.id = id;
        e
    }

    /// Construct a region entity with a caller-supplied identifier.
    #[must_use]
    pub fn region_with_id(
        id: Uuid,
        name: impl Into<String>,
        parent_id: Uuid,
        start_beat: f64,
        duration_beats: f64,
    ) -> Self {
        let mut e = Self::new_region(name, parent_id, start_beat, duration_beats);
        e.id = id;
        e
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_entity_has_no_parent() {
        let e = Entity::new(EntityKind::Track, "Drums");
        assert_eq!(e.kind, EntityKind::Track);
        assert!(e.parent_id.is_none());
    }

    #[test]
    fn new_region_carries_parent() {
        let track_id = Uuid::new_v4();
        let r = Entity::new_region("Verse", track_id, 0.0, 4.0);
        assert_eq!(r.kind, EntityKind::Region);
        assert_eq!(r.parent_id, Some(track_id));
        assert_eq!(r.start_beat, Some(0.0));
        assert_eq!(r.duration_beats, Some(4.0));
    }

    #[test]
    fn region_with_id_preserves_caller_supplied_id() {
        let track_id = Uuid::new_v4();
        let region_id = Uuid::new_v4();
        let r = Entity::region_with_id(region_id, "Verse", track_id, 8.0, 4.0);
        assert_eq!(r.id, region_id);
        assert_eq!(r.start_beat, Some(8.0));
    }

    #[test]
    fn serde_roundtrip() {
        let e = Entity::new(EntityKind::Bus, "Reverb Bus");
        let json = serde_json::to_string(&e).unwrap();
        let back: Entity = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, e.id);
        assert_eq!(back.name, e.name);
    }
}
