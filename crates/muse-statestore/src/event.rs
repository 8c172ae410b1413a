// SPDX-License-Identifier: MIT OR Apache-2.0
//! The append-only event log a `StateStore` produces on every mutation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The kind of mutation a [`StateEvent`] records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StateEventType {
    /// A track was created.
    TrackCreated,
    /// A region was created.
    RegionCreated,
    /// One or more notes were added to a region.
    NotesAdded,
    /// One or more notes were removed from a region.
    NotesRemoved,
    /// One or more controller events were added to a region.
    ControllerEventsAdded,
    /// The project tempo changed.
    TempoSet,
    /// The project key changed.
    KeySet,
}

/// One entry in a `StateStore`'s audit log.
///
/// Exactly one event is appended per logical mutation, whether applied
/// directly or as part of a committed transaction — the audit substrate
/// variation diffs are computed against.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateEvent {
    /// What kind of mutation this was.
    pub event_type: StateEventType,
    /// The entity (region, track) the mutation applied to, if any.
    pub entity_id: Option<String>,
    /// The store version this event was recorded under.
    pub version: u64,
    /// Wall-clock time the mutation was applied.
    pub timestamp: DateTime<Utc>,
    /// Mutation-specific detail (note IDs added, new tempo value, etc.).
    pub payload: serde_json::Value,
}
