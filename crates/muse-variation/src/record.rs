// SPDX-License-Identifier: MIT OR Apache-2.0
//! In-memory representation of a single variation and its phrases.

use crate::state_machine::{assert_transition, InvalidTransitionError, VariationStatus};
use chrono::{DateTime, Utc};
use muse_core::{Phrase, SequenceCounter};
use uuid::Uuid;

/// A proposed edit, from creation through its terminal outcome.
#[derive(Debug, Clone)]
pub struct VariationRecord {
    /// Server-issued identifier.
    pub variation_id: Uuid,
    /// The project this variation targets.
    pub project_id: String,
    /// The `stateId` this variation was generated against.
    pub base_state_id: String,
    /// The natural-language intent that produced this variation.
    pub intent: String,
    /// Current lifecycle status.
    pub status: VariationStatus,
    /// Planner-supplied rationale, once generation completes.
    pub ai_explanation: Option<String>,
    /// Track IDs touched by this variation's phrases.
    pub affected_tracks: Vec<String>,
    /// Region IDs touched by this variation's phrases.
    pub affected_regions: Vec<String>,
    /// Phrases emitted so far, in sequence order.
    pub phrases: Vec<Phrase>,
    /// Why this variation failed or was discarded, if applicable.
    pub error_message: Option<String>,
    /// The conversation this variation belongs to.
    pub conversation_id: String,
    /// When this record was created.
    pub created_at: DateTime<Utc>,
    /// When this record was last modified.
    pub updated_at: DateTime<Utc>,
    sequence: SequenceCounter,
}

impl VariationRecord {
    /// A freshly-created record in [`VariationStatus::Created`].
    #[must_use]
    pub fn new(
        variation_id: Uuid,
        project_id: impl Into<String>,
        base_state_id: impl Into<String>,
        intent: impl Into<String>,
        conversation_id: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            variation_id,
            project_id: project_id.into(),
            base_state_id: base_state_id.into(),
            intent: intent.into(),
            status: VariationStatus::Created,
            ai_explanation: None,
            affected_tracks: Vec::new(),
            affected_regions: Vec::new(),
            phrases: Vec::new(),
            error_message: None,
            conversation_id: conversation_id.into(),
            created_at: now,
            updated_at: now,
            sequence: SequenceCounter::new(),
        }
    }

    /// Allocate the next SSE sequence number for this variation.
    pub fn next_sequence(&mut self) -> u64 {
        self.sequence.next()
    }

    /// The highest sequence number allocated so far.
    #[must_use]
    pub fn last_sequence(&self) -> u64 {
        self.sequence.current()
    }

    /// Move to a new lifecycle status, rejecting illegal transitions.
    pub fn transition_to(&mut self, to: VariationStatus) -> Result<(), InvalidTransitionError> {
        assert_transition(self.status, to)?;
        tracing::debug!(
            variation_id = %self.variation_id,
            from = %self.status,
            to = %to,
            "variation transition"
        );
        self.status = to;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Append a generated phrase, recording its track/region as affected.
    pub fn add_phrase(&mut self, phrase: Phrase) {
        if !self.affected_tracks.contains(&phrase.track_id) {
            self.affected_tracks.push(phrase.track_id.clone());
        }
        if !self.affected_regions.contains(&phrase.region_id) {
            self.affected_regions.push(phrase.region_id.clone());
        }
        self.phrases.push(phrase);
        self.updated_at = Utc::now();
    }

    /// Look up a phrase by ID.
    #[must_use]
    pub fn get_phrase(&self, phrase_id: &str) -> Option<&Phrase> {
        self.phrases.iter().find(|p| p.phrase_id == phrase_id)
    }

    /// Phrase IDs in emission order.
    #[must_use]
    pub fn phrase_ids_in_order(&self) -> Vec<String> {
        let mut phrases = self.phrases.clone();
        phrases.sort_by_key(|p| p.sequence);
        phrases.into_iter().map(|p| p.phrase_id).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_phrase(phrase_id: &str, sequence: u64, track_id: &str) -> Phrase {
        Phrase {
            phrase_id: phrase_id.to_string(),
            sequence,
            track_id: track_id.to_string(),
            region_id: "region-1".to_string(),
            beat_start: 0.0,
            beat_end: 4.0,
            label: "intro".to_string(),
            tags: vec![],
            explanation: Some("added a melodic fill".to_string()),
            note_changes: vec![],
            controller_changes: vec![],
            region_start_beat: Some(0.0),
            region_duration_beats: Some(4.0),
            region_name: Some("Verse".to_string()),
        }
    }

    #[test]
    fn new_record_starts_created_with_no_sequence_used() {
        let record = VariationRecord::new(Uuid::new_v4(), "proj", "3", "add drums", "conv-1");
        assert_eq!(record.status, VariationStatus::Created);
        assert_eq!(record.last_sequence(), 0);
    }

    #[test]
    fn next_sequence_increments_from_one() {
        let mut record = VariationRecord::new(Uuid::new_v4(), "proj", "3", "add drums", "conv-1");
        assert_eq!(record.next_sequence(), 1);
        assert_eq!(record.next_sequence(), 2);
        assert_eq!(record.last_sequence(), 2);
    }

    #[test]
    fn transition_to_rejects_illegal_moves() {
        let mut record = VariationRecord::new(Uuid::new_v4(), "proj", "3", "add drums", "conv-1");
        assert!(record.transition_to(VariationStatus::Ready).is_err());
        assert!(record.transition_to(VariationStatus::Streaming).is_ok());
        assert_eq!(record.status, VariationStatus::Streaming);
    }

    #[test]
    fn add_phrase_tracks_affected_tracks_and_regions_once_each() {
        let mut record = VariationRecord::new(Uuid::new_v4(), "proj", "3", "add drums", "conv-1");
        record.add_phrase(sample_phrase("ph-1", 1, "track-a"));
        record.add_phrase(sample_phrase("ph-2", 2, "track-a"));
        assert_eq!(record.affected_tracks, vec!["track-a".to_string()]);
        assert_eq!(record.phrases.len(), 2);
    }

    #[test]
    fn get_phrase_finds_by_id() {
        let mut record = VariationRecord::new(Uuid::new_v4(), "proj", "3", "add drums", "conv-1");
        record.add_phrase(sample_phrase("ph-1", 1, "track-a"));
        assert!(record.get_phrase("ph-1").is_some());
        assert!(record.get_phrase("missing").is_none());
    }

    #[test]
    fn phrase_ids_in_order_sorts_by_sequence() {
        let mut record = VariationRecord::new(Uuid::new_v4(), "proj", "3", "add drums", "conv-1");
        record.add_phrase(sample_phrase("ph-2", 2, "track-a"));
        record.add_phrase(sample_phrase("ph-1", 1, "track-a"));
        assert_eq!(
            record.phrase_ids_in_order(),
            vec!["ph-1".to_string(), "ph-2".to_string()]
        );
    }

}
