// SPDX-License-Identifier: MIT OR Apache-2.0
//! Server-side entity registry: the authoritative source of truth for
//! entity IDs within a project.
//!
//! The server generates every track/region/bus ID; external callers
//! (including the LLM planner behind a variation) only ever reference
//! entities by name, and [`EntityRegistry::resolve_track`] and friends turn
//! those names back into IDs. This removes the "the model invented an ID"
//! failure mode entirely — a name that doesn't resolve is a normal lookup
//! miss, not a crash.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use muse_core::{Entity, EntityKind};
use std::collections::HashMap;
use uuid::Uuid;

/// Per-project name/ID index over [`Entity`] records.
///
/// Not thread-safe on its own; callers that need shared mutable access
/// (e.g. `muse-daemon`'s per-project state) wrap it in a
/// `tokio::sync::RwLock`.
#[derive(Debug)]
pub struct EntityRegistry {
    project_id: Uuid,
    tracks: HashMap<Uuid, Entity>,
    regions: HashMap<Uuid, Entity>,
    buses: HashMap<Uuid, Entity>,
    track_names: HashMap<String, Uuid>,
    region_names: HashMap<String, Uuid>,
    bus_names: HashMap<String, Uuid>,
    track_regions: HashMap<Uuid, Vec<Uuid>>,
}

impl EntityRegistry {
    /// Create an empty registry scoped to `project_id`.
    #[must_use]
    pub fn new(project_id: Uuid) -> Self {
        Self {
            project_id,
            tracks: HashMap::new(),
            regions: HashMap::new(),
            buses: HashMap::new(),
            track_names: HashMap::new(),
            region_names: HashMap::new(),
            bus_names: HashMap::new(),
            track_regions: HashMap::new(),
        }
    }

    /// The project this registry is scoped to.
    #[must_use]
    pub fn project_id(&self) -> Uuid {
        self.project_id
    }

    /// Remove all entities, resetting the registry to empty.
    ///
    /// Called before re-syncing from a client-reported project snapshot so
    /// the registry never carries stale entries for deleted entities.
    pub fn clear(&mut self) {
        self.tracks.clear();
        self.regions.clear();
        self.buses.clear();
        self.track_names.clear();
        self.region_names.clear();
        self.bus_names.clear();
        self.track_regions.clear();
    }

    /// Clear the registry and re-index it from a client-reported project
    /// snapshot.
    ///
    /// Unlike [`create_track`](Self::create_track) and
    /// [`create_region`](Self::create_region), this uses the client-supplied
    /// IDs directly rather than minting fresh ones, since the client is
    /// reporting state the server previously handed out (or, for a freshly
    /// imported project, state the client is the first to name). A
    /// malformed entry — missing or non-UUID `id`, or a region naming a
    /// parent track that isn't in the snapshot — is logged and skipped
    /// rather than aborting the whole sync.
    ///
    /// Expected shape:
    ///
    /// ```json
    /// { "tracks": [ { "id": "...", "name": "Drums", "regions": [
    ///     { "id": "...", "name": "Verse", "startBeat": 0.0, "durationBeats": 4.0 }
    /// ] } ] }
    /// ```
    pub fn sync_from_client(&mut self, project_snapshot: &serde_json::Value) {
        self.clear();

        let tracks = project_snapshot
            .get("tracks")
            .and_then(|v| v.as_array())
            .cloned()
            .unwrap_or_default();

        for track in &tracks {
            let Some(id) = track.get("id").and_then(|v| v.as_str()).and_then(parse_uuid) else {
                tracing::warn!(?track, "skipping track with missing or invalid id during sync");
                continue;
            };
            let name = track.get("name").and_then(|v| v.as_str()).unwrap_or_default();
            self.track_names.insert(name.to_lowercase(), id);
            self.track_regions.entry(id).or_default();
            self.tracks.insert(id, Entity::with_id(id, EntityKind::Track, name));
        }

        for track in &tracks {
            let Some(track_id) = track.get("id").and_then(|v| v.as_str()).and_then(parse_uuid)
            else {
                continue;
            };
            if !self.tracks.contains_key(&track_id) {
                continue;
            }
            let regions = track.get("regions").and_then(|v| v.as_array()).cloned().unwrap_or_default();
            for region in &regions {
                let Some(region_id) =
                    region.get("id").and_then(|v| v.as_str()).and_then(parse_uuid)
                else {
                    tracing::warn!(?region, "skipping region with missing or invalid id during sync");
                    continue;
                };
                let name = region.get("name").and_then(|v| v.as_str()).unwrap_or_default();
                let start_beat = region.get("startBeat").and_then(|v| v.as_f64()).unwrap_or(0.0);
                let duration_beats =
                    region.get("durationBeats").and_then(|v| v.as_f64()).unwrap_or(0.0);

                self.region_names.insert(name.to_lowercase(), region_id);
                self.track_regions.entry(track_id).or_default().push(region_id);
                self.regions.insert(
                    region_id,
                    Entity::region_with_id(region_id, name, track_id, start_beat, duration_beats),
                );
            }
        }
    }

    // -- Creation --------------------------------------------------------

    /// Register a new track, generating its ID.
    pub fn create_track(&mut self, name: impl Into<String>) -> Uuid {
        let entity = Entity::new(EntityKind::Track, name);
        let id = entity.id;
        self.track_names.insert(entity.name.to_lowercase(), id);
        self.track_regions.insert(id, Vec::new());
        self.tracks.insert(id, entity);
        id
    }

    /// Register a new region under `parent_track_id`, spanning
    /// `[start_beat, start_beat + duration_beats)`.
    ///
    /// Idempotent: if a region already exists under the same parent track
    /// with the same name and span, its existing ID is returned instead of
    /// minting a new one.
    ///
    /// # Errors
    ///
    /// Returns the unregistered `parent_track_id` back as `Err` if no such
    /// track is registered.
    pub fn create_region(
        &mut self,
        name: impl Into<String>,
        parent_track_id: Uuid,
        start_beat: f64,
        duration_beats: f64,
    ) -> Result<Uuid, Uuid> {
        if !self.tracks.contains_key(&parent_track_id) {
            return Err(parent_track_id);
        }
        let name = name.into();
        let name_lower = name.to_lowercase();

        let existing = self.find_region_in_track(parent_track_id, &name_lower).filter(|id| {
            self.regions.get(id).is_some_and(|r| {
                r.start_beat == Some(start_beat) && r.duration_beats == Some(duration_beats)
            })
        });
        if let Some(id) = existing {
            return Ok(id);
        }

        let entity = Entity::new_region(name, parent_track_id, start_beat, duration_beats);
        let id = entity.id;
        self.region_names.insert(entity.name.to_lowercase(), id);
        self.track_regions.entry(parent_track_id).or_default().push(id);
        self.regions.insert(id, entity);
        Ok(id)
    }

    /// Register a new bus, generating its ID.
    pub fn create_bus(&mut self, name: impl Into<String>) -> Uuid {
        let entity = Entity::new(EntityKind::Bus, name);
        let id = entity.id;
        self.bus_names.insert(entity.name.to_lowercase(), id);
        self.buses.insert(id, entity);
        id
    }

    /// Resolve `name` to an existing bus, or register a new one.
    pub fn get_or_create_bus(&mut self, name: impl Into<String>) -> Uuid {
        let name = name.into();
        if let Some(id) = self.resolve_bus(&name) {
            return id;
        }
        self.create_bus(name)
    }

    // -- Resolution --------------------------------------------------------

    /// Resolve a track reference to its ID.
    ///
    /// Tries, in order: exact ID match, case-insensitive exact name match,
    /// and (unless `exact` is set) a substring match either direction —
    /// `"drums"` resolves `"Drums Bus 2"` and vice versa. Use `exact: true`
    /// when checking for a name collision before creating a new track.
    #[must_use]
    pub fn resolve_track(&self, name_or_id: &str, exact: bool) -> Option<Uuid> {
        resolve(
            name_or_id,
            exact,
            |id| self.tracks.contains_key(id),
            &self.track_names,
        )
    }

    /// Resolve a region reference to its ID.
    ///
    /// If `parent_track` is given, regions belonging to that track are
    /// searched first (by exact case-insensitive name); this disambiguates
    /// same-named regions on different tracks. Falls back to a global
    /// name lookup if no scoped match is found.
    #[must_use]
    pub fn resolve_region(&self, name_or_id: &str, parent_track: Option<&str>) -> Option<Uuid> {
        if let Some(id) = parse_uuid(name_or_id) {
            if self.regions.contains_key(&id) {
                return Some(id);
            }
        }
        let name_lower = name_or_id.to_lowercase();

        if let Some(parent_ref) = parent_track {
            if let Some(parent_id) = self.resolve_track(parent_ref, false) {
                if let Some(found) = self.find_region_in_track(parent_id, &name_lower) {
                    return Some(found);
                }
            }
        }

        self.region_names.get(&name_lower).copied()
    }

    fn find_region_in_track(&self, track_id: Uuid, name_lower: &str) -> Option<Uuid> {
        self.track_regions.get(&track_id)?.iter().find_map(|rid| {
            let region = self.regions.get(rid)?;
            (region.name.to_lowercase() == name_lower).then_some(*rid)
        })
    }

    /// Resolve a bus reference to its ID.
    #[must_use]
    pub fn resolve_bus(&self, name_or_id: &str) -> Option<Uuid> {
        resolve(
            name_or_id,
            true,
            |id| self.buses.contains_key(id),
            &self.bus_names,
        )
    }

    // -- Existence & retrieval ---------------------------------------------

    /// Whether a track with this ID is registered.
    #[must_use]
    pub fn exists_track(&self, track_id: Uuid) -> bool {
        self.tracks.contains_key(&track_id)
    }

    /// Whether a region with this ID is registered.
    #[must_use]
    pub fn exists_region(&self, region_id: Uuid) -> bool {
        self.regions.contains_key(&region_id)
    }

    /// Whether a bus with this ID is registered.
    #[must_use]
    pub fn exists_bus(&self, bus_id: Uuid) -> bool {
        self.buses.contains_key(&bus_id)
    }

    /// Look up a track's full record.
    #[must_use]
    pub fn get_track(&self, track_id: Uuid) -> Option<&Entity> {
        self.tracks.get(&track_id)
    }

    /// Look up a region's full record.
    #[must_use]
    pub fn get_region(&self, region_id: Uuid) -> Option<&Entity> {
        self.regions.get(&region_id)
    }

    /// Look up a bus's full record.
    #[must_use]
    pub fn get_bus(&self, bus_id: Uuid) -> Option<&Entity> {
        self.buses.get(&bus_id)
    }

    /// All regions registered under `track_id`, in creation order.
    #[must_use]
    pub fn track_regions(&self, track_id: Uuid) -> Vec<&Entity> {
        self.track_regions
            .get(&track_id)
            .into_iter()
            .flatten()
            .filter_map(|rid| self.regions.get(rid))
            .collect()
    }

    /// The most recently created region for `track_id`, if any.
    #[must_use]
    pub fn latest_region_for_track(&self, track_id: Uuid) -> Option<Uuid> {
        self.track_regions.get(&track_id)?.last().copied()
    }

    /// All registered tracks.
    #[must_use]
    pub fn list_tracks(&self) -> Vec<&Entity> {
        self.tracks.values().collect()
    }

    /// All registered regions.
    #[must_use]
    pub fn list_regions(&self) -> Vec<&Entity> {
        self.regions.values().collect()
    }

    /// All registered buses.
    #[must_use]
    pub fn list_buses(&self) -> Vec<&Entity> {
        self.buses.values().collect()
    }
}

fn parse_uuid(s: &str) -> Option<Uuid> {
    Uuid::parse_str(s).ok()
}

fn resolve(
    name_or_id: &str,
    exact: bool,
    id_exists: impl Fn(&Uuid) -> bool,
    names: &HashMap<String, Uuid>,
) -> Option<Uuid> {
    if let Some(id) = parse_uuid(name_or_id) {
        if id_exists(&id) {
            return Some(id);
        }
    }

    let name_lower = name_or_id.to_lowercase();
    if let Some(id) = names.get(&name_lower) {
        return Some(*id);
    }

    if !exact {
        for (stored_name, id) in names {
            if stored_name.contains(&name_lower) || name_lower.contains(stored_name.as_str()) {
                return Some(*id);
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> EntityRegistry {
        EntityRegistry::new(Uuid::new_v4())
    }

    #[test]
    fn create_and_resolve_track_by_name() {
        let mut reg = registry();
        let id = reg.create_track("Drums");
        assert_eq!(reg.resolve_track("drums", false), Some(id));
        assert_eq!(reg.resolve_track("DRUMS", true), Some(id));
    }

    #[test]
    fn resolve_track_by_exact_id() {
        let mut reg = registry();
        let id = reg.create_track("Bass");
        assert_eq!(reg.resolve_track(&id.to_string(), true), Some(id));
    }

    #[test]
    fn fuzzy_match_only_when_not_exact() {
        let mut reg = registry();
        let id = reg.create_track("Drums Track");
        assert_eq!(reg.resolve_track("drums", false), Some(id));
        assert_eq!(reg.resolve_track("drums", true), None);
    }

    #[test]
    fn create_region_requires_existing_track() {
        let mut reg = registry();
        let bogus = Uuid::new_v4();
        assert_eq!(reg.create_region("Verse", bogus, 0.0, 4.0), Err(bogus));
    }

    #[test]
    fn region_scoped_to_parent_track_disambiguates() {
        let mut reg = registry();
        let drums = reg.create_track("Drums");
        let bass = reg.create_track("Bass");
        let drums_verse = reg.create_region("Verse", drums, 0.0, 4.0).unwrap();
        let bass_verse = reg.create_region("Verse", bass, 0.0, 4.0).unwrap();

        assert_eq!(reg.resolve_region("Verse", Some("Drums")), Some(drums_verse));
        assert_eq!(reg.resolve_region("Verse", Some("Bass")), Some(bass_verse));
    }

    #[test]
    fn latest_region_for_track_is_most_recent() {
        let mut reg = registry();
        let drums = reg.create_track("Drums");
        reg.create_region("Intro", drums, 0.0, 4.0).unwrap();
        let second = reg.create_region("Verse", drums, 4.0, 4.0).unwrap();
        assert_eq!(reg.latest_region_for_track(drums), Some(second));
    }

    #[test]
    fn create_region_is_idempotent_on_same_span() {
        let mut reg = registry();
        let drums = reg.create_track("Drums");
        let first = reg.create_region("Verse", drums, 0.0, 4.0).unwrap();
        let second = reg.create_region("Verse", drums, 0.0, 4.0).unwrap();
        assert_eq!(first, second);
        assert_eq!(reg.track_regions(drums).len(), 1);
    }

    #[test]
    fn create_region_mints_new_id_when_span_differs() {
        let mut reg = registry();
        let drums = reg.create_track("Drums");
        let first = reg.create_region("Verse", drums, 0.0, 4.0).unwrap();
        let second = reg.create_region("Verse", drums, 4.0, 4.0).unwrap();
        assert_ne!(first, second);
        assert_eq!(reg.track_regions(drums).len(), 2);
    }

    #[test]
    fn sync_from_client_indexes_client_supplied_ids() {
        let mut reg = registry();
        let track_id = Uuid::new_v4();
        let region_id = Uuid::new_v4();
        let snapshot = serde_json::json!({
            "tracks": [{
                "id": track_id.to_string(),
                "name": "Drums",
                "regions": [{
                    "id": region_id.to_string(),
                    "name": "Verse",
                    "startBeat": 0.0,
                    "durationBeats": 4.0,
                }],
            }],
        });

        reg.sync_from_client(&snapshot);

        assert!(reg.exists_track(track_id));
        assert!(reg.exists_region(region_id));
        assert_eq!(reg.resolve_track("Drums", true), Some(track_id));
        let region = reg.get_region(region_id).unwrap();
        assert_eq!(region.parent_id, Some(track_id));
        assert_eq!(region.start_beat, Some(0.0));
    }

    #[test]
    fn sync_from_client_clears_previous_state() {
        let mut reg = registry();
        reg.create_track("Stale");
        reg.sync_from_client(&serde_json::json!({ "tracks": [] }));
        assert!(reg.list_tracks().is_empty());
    }

    #[test]
    fn sync_from_client_skips_malformed_entries_without_raising() {
        let mut reg = registry();
        let track_id = Uuid::new_v4();
        let snapshot = serde_json::json!({
            "tracks": [
                { "name": "Missing id" },
                {
                    "id": track_id.to_string(),
                    "name": "Drums",
                    "regions": [
                        { "name": "Missing id region" },
                        { "id": "not-a-uuid", "name": "Bad id region" },
                    ],
                },
            ],
        });

        reg.sync_from_client(&snapshot);

        assert_eq!(reg.list_tracks().len(), 1);
        assert!(reg.list_regions().is_empty());
    }

    #[test]
    fn get_or_create_bus_reuses_existing() {
        let mut reg = registry();
        let a = reg.get_or_create_bus("Reverb");
        let b = reg.get_or_create_bus("reverb");
        assert_eq!(a, b);
        assert_eq!(reg.list_buses().len(), 1);
    }

    #[test]
    fn clear_resets_all_indexes() {
        let mut reg = registry();
        let drums = reg.create_track("Drums");
        reg.create_region("Verse", drums, 0.0, 4.0).unwrap();
        reg.create_bus("Reverb");
        reg.clear();
        assert!(reg.list_tracks().is_empty());
        assert!(reg.list_regions().is_empty());
        assert!(reg.list_buses().is_empty());
        assert_eq!(reg.resolve_track("Drums", false), None);
    }

    #[test]
    fn nonexistent_lookup_returns_none() {
        let reg = registry();
        assert_eq!(reg.resolve_track("nope", false), None);
        assert_eq!(reg.resolve_bus("nope"), None);
    }
}
