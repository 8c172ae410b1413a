// SPDX-License-Identifier: MIT OR Apache-2.0
//! In-process registry of live and recently-terminal variations.

use crate::record::VariationRecord;
use crate::state_machine::VariationStatus;
use chrono::{Duration as ChronoDuration, Utc};
use muse_error::{ErrorCode, MuseError};
use std::collections::HashMap;
use uuid::Uuid;

/// Holds every variation this daemon process knows about.
///
/// One instance is shared (behind a lock, owned by the caller) across all
/// of a project's proposals; it does not persist across restarts.
#[derive(Debug, Default)]
pub struct VariationStore {
    records: HashMap<Uuid, VariationRecord>,
}

impl VariationStore {
    /// An empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            records: HashMap::new(),
        }
    }

    /// Create and insert a new record in [`VariationStatus::Created`].
    ///
    /// # Errors
    ///
    /// Returns [`ErrorCode::Internal`] if `variation_id` is already in use.
    pub fn create(
        &mut self,
        project_id: impl Into<String>,
        base_state_id: impl Into<String>,
        intent: impl Into<String>,
        variation_id: Uuid,
        conversation_id: impl Into<String>,
    ) -> Result<VariationRecord, MuseError> {
        if self.records.contains_key(&variation_id) {
            return Err(MuseError::new(
                ErrorCode::Internal,
                format!("variation id already in use: {variation_id}"),
            ));
        }
        let record = VariationRecord::new(
            variation_id,
            project_id,
            base_state_id,
            intent,
            conversation_id,
        );
        self.records.insert(variation_id, record.clone());
        Ok(record)
    }

    /// Look up a variation by ID.
    #[must_use]
    pub fn get(&self, variation_id: Uuid) -> Option<&VariationRecord> {
        self.records.get(&variation_id)
    }

    /// Look up a variation by ID, failing with [`ErrorCode::VariationNotFound`].
    pub fn get_or_raise(&self, variation_id: Uuid) -> Result<&VariationRecord, MuseError> {
        self.get(variation_id).ok_or_else(|| {
            MuseError::new(
                ErrorCode::VariationNotFound,
                format!("no such variation: {variation_id}"),
            )
        })
    }

    /// Mutable lookup, failing with [`ErrorCode::VariationNotFound`].
    pub fn get_mut_or_raise(
        &mut self,
        variation_id: Uuid,
    ) -> Result<&mut VariationRecord, MuseError> {
        self.records.get_mut(&variation_id).ok_or_else(|| {
            MuseError::new(
                ErrorCode::VariationNotFound,
                format!("no such variation: {variation_id}"),
            )
        })
    }

    /// Apply a lifecycle transition to a stored variation.
    pub fn transition(
        &mut self,
        variation_id: Uuid,
        to: VariationStatus,
    ) -> Result<(), MuseError> {
        let record = self.get_mut_or_raise(variation_id)?;
        record.transition_to(to).map_err(|err| {
            MuseError::new(ErrorCode::VariationInvalidTransition, err.to_string())
        })
    }

    /// Remove a variation entirely.
    pub fn delete(&mut self, variation_id: Uuid) {
        self.records.remove(&variation_id);
    }

    /// Variations for a project, optionally filtered by status, newest
    /// `created_at` first.
    #[must_use]
    pub fn list_for_project(
        &self,
        project_id: &str,
        status: Option<VariationStatus>,
    ) -> Vec<&VariationRecord> {
        let mut matching: Vec<&VariationRecord> = self
            .records
            .values()
            .filter(|r| r.project_id == project_id)
            .filter(|r| status.is_none_or(|s| r.status == s))
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        matching
    }

    /// Transition any non-terminal variation older than `max_age` to
    /// [`VariationStatus::Expired`]. Illegal transitions (a variation that
    /// raced to a terminal state concurrently) are silently skipped.
    pub fn cleanup_expired(&mut self, max_age: ChronoDuration) {
        let now = Utc::now();
        let stale: Vec<Uuid> = self
            .records
            .values()
            .filter(|r| !r.status.is_terminal() && now - r.created_at > max_age)
            .map(|r| r.variation_id)
            .collect();
        for variation_id in stale {
            if let Some(record) = self.records.get_mut(&variation_id) {
                let _ = record.transition_to(VariationStatus::Expired);
            }
        }
    }

    /// Remove every record.
    pub fn clear(&mut self) {
        self.records.clear();
    }

    /// Number of variations currently held.
    #[must_use]
    pub fn count(&self) -> usize {
        self.records.len()
    }
}
