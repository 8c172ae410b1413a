// SPDX-License-Identifier: MIT OR Apache-2.0
//! Frozen, shareable copies of a store's region state.

use crate::note::{ControllerEvent, Note};
use std::collections::HashMap;

/// A deep, immutable copy of a `StateStore`'s region maps, taken at a
/// point in time.
///
/// Safe to hand across ownership boundaries: Muse Hub's variation pipeline
/// only ever sees `SnapshotBundle`s, never the live store, which is the
/// boundary that keeps the VCS side decoupled from Maestro's mutation
/// machinery.
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotBundle {
    /// Store version this snapshot was captured at.
    pub state_id: String,
    /// Notes per region, at capture time.
    pub notes_by_region: HashMap<String, Vec<Note>>,
    /// Controller events per region, at capture time.
    pub controller_events_by_region: HashMap<String, Vec<ControllerEvent>>,
    /// Project tempo at capture time.
    pub tempo: f64,
    /// Project key at capture time.
    pub key: String,
}

impl SnapshotBundle {
    /// Notes held by `region_id` in this snapshot, if the region has any.
    #[must_use]
    pub fn region_notes(&self, region_id: &str) -> &[Note] {
        self.notes_by_region
            .get(region_id)
            .map_or(&[], Vec::as_slice)
    }

    /// Controller events held by `region_id` in this snapshot, if any.
    #[must_use]
    pub fn region_controller_events(&self, region_id: &str) -> &[ControllerEvent] {
        self.controller_events_by_region
            .get(region_id)
            .map_or(&[], Vec::as_slice)
    }
}
