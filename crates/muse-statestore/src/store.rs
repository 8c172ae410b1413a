// SPDX-License-Identifier: MIT OR Apache-2.0
//! The versioned, transactional project state store.

use crate::event::{StateEvent, StateEventType};
use crate::note::{ControllerEvent, Note};
use crate::snapshot::SnapshotBundle;
use crate::transaction::{StagedMutation, Transaction};
use chrono::Utc;
use muse_error::{ErrorCode, MuseError};
use std::collections::HashMap;
use uuid::Uuid;

/// Per-conversation project state: note/cc maps keyed by region, tempo,
/// key, and a strictly-increasing version counter.
///
/// Every successful mutation — whether applied directly or through a
/// committed transaction — increases `version` by exactly one and appends
/// exactly one corresponding [`StateEvent`] per logical change.
#[derive(Debug)]
pub struct StateStore {
    conversation_id: Uuid,
    version: u64,
    notes_by_region: HashMap<String, Vec<Note>>,
    controller_events_by_region: HashMap<String, Vec<ControllerEvent>>,
    tempo: f64,
    key: String,
    events: Vec<StateEvent>,
    active_transaction: Option<Uuid>,
}

impl StateStore {
    /// A fresh store for `conversation_id`, version 0, tempo 120, key C major.
    #[must_use]
    pub fn new(conversation_id: Uuid) -> Self {
        Self {
            conversation_id,
            version: 0,
            notes_by_region: HashMap::new(),
            controller_events_by_region: HashMap::new(),
            tempo: 120.0,
            key: "C major".to_string(),
            events: Vec::new(),
            active_transaction: None,
        }
    }

    /// The conversation this store is scoped to.
    #[must_use]
    pub fn conversation_id(&self) -> Uuid {
        self.conversation_id
    }

    /// Current version, as a string suitable for `baseStateId` comparison.
    #[must_use]
    pub fn state_id(&self) -> String {
        self.version.to_string()
    }

    /// Whether `expected` matches the store's current version string.
    #[must_use]
    pub fn check_state_id(&self, expected: &str) -> bool {
        self.state_id() == expected
    }

    /// Current tempo in BPM.
    #[must_use]
    pub fn tempo(&self) -> f64 {
        self.tempo
    }

    /// Current musical key.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// This store's append-only event log.
    #[must_use]
    pub fn events(&self) -> &[StateEvent] {
        &self.events
    }

    /// Notes currently held by `region_id`.
    #[must_use]
    pub fn region_notes(&self, region_id: &str) -> &[Note] {
        self.notes_by_region
            .get(region_id)
            .map_or(&[], Vec::as_slice)
    }

    /// Controller events currently held by `region_id`.
    #[must_use]
    pub fn region_controller_events(&self, region_id: &str) -> &[ControllerEvent] {
        self.controller_events_by_region
            .get(region_id)
            .map_or(&[], Vec::as_slice)
    }

    // -- Transactions ------------------------------------------------------

    /// Open a new transaction labelled `label`.
    ///
    /// # Errors
    ///
    /// Fails if a transaction is already active on this store.
    pub fn begin_transaction(&mut self, label: impl Into<String>) -> Result<Transaction, MuseError> {
        if self.active_transaction.is_some() {
            return Err(MuseError::new(
                ErrorCode::Internal,
                "a transaction is already active on this store",
            ));
        }
        let tx = Transaction::new(label);
        self.active_transaction = Some(tx.id());
        Ok(tx)
    }

    fn assert_owns(&self, tx: &Transaction) -> Result<(), MuseError> {
        if self.active_transaction != Some(tx.id()) {
            return Err(MuseError::new(
                ErrorCode::Internal,
                "transaction does not belong to this store, or has already been resolved",
            ));
        }
        Ok(())
    }

    /// Commit `tx`: apply its staged mutations in order, bump the version
    /// exactly once, and append one event per applied mutation.
    ///
    /// # Errors
    ///
    /// Fails if `tx` is not this store's active transaction.
    pub fn commit(&mut self, tx: Transaction) -> Result<(), MuseError> {
        self.assert_owns(&tx)?;
        let mutations = tx.mutations;
        if mutations.is_empty() {
            self.active_transaction = None;
            return Ok(());
        }
        self.version += 1;
        for mutation in mutations {
            self.apply(mutation);
        }
        self.active_transaction = None;
        Ok(())
    }

    /// Roll back `tx`, discarding its staged mutations without touching
    /// the store's version.
    ///
    /// # Errors
    ///
    /// Fails if `tx` is not this store's active transaction.
    pub fn rollback(&mut self, tx: Transaction) -> Result<(), MuseError> {
        self.assert_owns(&tx)?;
        self.active_transaction = None;
        Ok(())
    }

    // -- Mutations -----------------------------------------------------

    /// Add `notes` to `region_id`. If `tx` is given, the mutation is
    /// staged; otherwise it is applied immediately and the version
    /// increments by one.
    pub fn add_notes(
        &mut self,
        region_id: impl Into<String>,
        notes: Vec<Note>,
        tx: Option<&mut Transaction>,
    ) {
        let mutation = StagedMutation::AddNotes {
            region_id: region_id.into(),
            notes,
        };
        self.stage_or_apply(mutation, tx);
    }

    /// Remove notes by ID from `region_id`. Staged/applied like
    /// [`Self::add_notes`].
    pub fn remove_notes(
        &mut self,
        region_id: impl Into<String>,
        note_ids: Vec<String>,
        tx: Option<&mut Transaction>,
    ) {
        let mutation = StagedMutation::RemoveNotes {
            region_id: region_id.into(),
            note_ids,
        };
        self.stage_or_apply(mutation, tx);
    }

    /// Add controller (CC/pitch-bend/aftertouch) events to `region_id`.
    /// Staged/applied like [`Self::add_notes`]; callers that also stage
    /// note changes for the same region in the same transaction should add
    /// the notes first, since controller data is meant to layer on top of
    /// notes that already exist.
    pub fn add_controller_events(
        &mut self,
        region_id: impl Into<String>,
        events: Vec<ControllerEvent>,
        tx: Option<&mut Transaction>,
    ) {
        let mutation = StagedMutation::AddControllerEvents {
            region_id: region_id.into(),
            events,
        };
        self.stage_or_apply(mutation, tx);
    }

    /// Set the project tempo. Staged/applied like [`Self::add_notes`].
    pub fn set_tempo(&mut self, bpm: f64, tx: Option<&mut Transaction>) {
        self.stage_or_apply(StagedMutation::SetTempo(bpm), tx);
    }

    /// Set the project key. Staged/applied like [`Self::add_notes`].
    pub fn set_key(&mut self, key: impl Into<String>, tx: Option<&mut Transaction>) {
        self.stage_or_apply(StagedMutation::SetKey(key.into()), tx);
    }

    fn stage_or_apply(&mut self, mutation: StagedMutation, tx: Option<&mut Transaction>) {
        match tx {
            Some(tx) => tx.mutations.push(mutation),
            None => {
                self.version += 1;
                self.apply(mutation);
            }
        }
    }

    fn apply(&mut self, mutation: StagedMutation) {
        let version = self.version;
        match mutation {
            StagedMutation::AddNotes { region_id, notes } => {
                let note_ids: Vec<&str> = notes.iter().map(|n| n.id.as_str()).collect();
                let payload = serde_json::json!({ "noteIds": note_ids });
                self.notes_by_region
                    .entry(region_id.clone())
                    .or_default()
                    .extend(notes);
                self.push_event(StateEventType::NotesAdded, Some(region_id), version, payload);
            }
            StagedMutation::RemoveNotes {
                region_id,
                note_ids,
            } => {
                if let Some(notes) = self.notes_by_region.get_mut(&region_id) {
                    notes.retain(|n| !note_ids.contains(&n.id));
                }
                let payload = serde_json::json!({ "noteIds": note_ids });
                self.push_event(
                    StateEventType::NotesRemoved,
                    Some(region_id),
                    version,
                    payload,
                );
            }
            StagedMutation::AddControllerEvents { region_id, events } => {
                let event_ids: Vec<&str> = events.iter().map(ControllerEvent::id).collect();
                let payload = serde_json::json!({ "eventIds": event_ids });
                self.controller_events_by_region
                    .entry(region_id.clone())
                    .or_default()
                    .extend(events);
                self.push_event(
                    StateEventType::ControllerEventsAdded,
                    Some(region_id),
                    version,
                    payload,
                );
            }
            StagedMutation::SetTempo(bpm) => {
                self.tempo = bpm;
                self.push_event(
                    StateEventType::TempoSet,
                    None,
                    version,
                    serde_json::json!({ "tempo": bpm }),
                );
            }
            StagedMutation::SetKey(key) => {
                self.key = key.clone();
                self.push_event(
                    StateEventType::KeySet,
                    None,
                    version,
                    serde_json::json!({ "key": key }),
                );
            }
        }
    }

    fn push_event(
        &mut self,
        event_type: StateEventType,
        entity_id: Option<String>,
        version: u64,
        payload: serde_json::Value,
    ) {
        self.events.push(StateEvent {
            event_type,
            entity_id,
            version,
            timestamp: Utc::now(),
            payload,
        });
    }

    // -- Snapshots -----------------------------------------------------

    /// Capture a deep-copy snapshot of the store's current region state.
    ///
    /// Callers typically call this once at the start of variation
    /// generation (the "base" snapshot) and again after a dry-run
    /// execution pass (the "proposed" snapshot); diffing the two produces
    /// a variation's phrases.
    #[must_use]
    pub fn capture_snapshot(&self) -> SnapshotBundle {
        SnapshotBundle {
            state_id: self.state_id(),
            notes_by_region: self.notes_by_region.clone(),
            controller_events_by_region: self.controller_events_by_region.clone(),
            tempo: self.tempo,
            key: self.key.clone(),
        }
    }
}
