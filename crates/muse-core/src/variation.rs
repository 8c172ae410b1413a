// SPDX-License-Identifier: MIT OR Apache-2.0
//! Phrase and note-change types produced by the variation pipeline.
//!
//! The variation *status* state machine lives in `muse-variation`; this
//! module only holds the data shapes a phrase carries.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A single note-level change within a phrase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    /// A note was added.
    Added,
    /// A note was removed.
    Removed,
    /// A note's parameters were modified.
    Modified,
}

/// A point-in-time snapshot of a MIDI note, used as the `before`/`after`
/// halves of a [`NoteChange`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct MidiNoteSnapshot {
    /// MIDI pitch (0-127).
    pub pitch: u8,
    /// Start position in beats.
    pub start_beat: f64,
    /// Duration in beats.
    pub duration_beats: f64,
    /// MIDI velocity (0-127).
    pub velocity: u8,
    /// MIDI channel (0-15).
    pub channel: u8,
}

/// One note's change within a phrase.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct NoteChange {
    /// Identifier of the note within its region.
    pub note_id: String,
    /// What kind of change this is.
    pub change_type: ChangeType,
    /// State before the change. `None` for `Added`.
    #[serde(default)]
    pub before: Option<MidiNoteSnapshot>,
    /// State after the change. `None` for `Removed`.
    #[serde(default)]
    pub after: Option<MidiNoteSnapshot>,
}

/// One generated musical edit within a Variation.
///
/// Sequence numbers are unique and strictly increasing per parent
/// variation; sequence `1` is reserved for the variation's `meta` envelope,
/// so the first phrase carries sequence `2`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Phrase {
    /// Unique phrase identifier.
    pub phrase_id: String,
    /// Sequence number of this phrase's envelope within the variation stream.
    pub sequence: u64,
    /// Track this phrase affects.
    pub track_id: String,
    /// Region this phrase affects.
    pub region_id: String,
    /// Start of the affected span, in beats.
    pub beat_start: f64,
    /// End of the affected span, in beats.
    pub beat_end: f64,
    /// Short human-readable label (e.g. "add syncopated hats").
    pub label: String,
    /// Free-form tags.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Optional natural-language explanation of the edit.
    #[serde(default)]
    pub explanation: Option<String>,
    /// Note-level changes, in application order (additions, removals,
    /// modifications — enforced by the pipeline, not this type).
    #[serde(default)]
    pub note_changes: Vec<NoteChange>,
    /// Controller (CC/pitch-bend/aftertouch) changes, opaque to the core.
    #[serde(default)]
    pub controller_changes: Vec<serde_json::Value>,
    /// Region start position, captured at generation time so commit can
    /// build `updatedRegions` without re-querying the live store.
    #[serde(default)]
    pub region_start_beat: Option<f64>,
    /// Region duration, captured at generation time.
    #[serde(default)]
    pub region_duration_beats: Option<f64>,
    /// Region name, captured at generation time.
    #[serde(default)]
    pub region_name: Option<String>,
}
