// SPDX-License-Identifier: MIT OR Apache-2.0
//! Process-wide shared state for the daemon.

use crate::auth::JwtVerifier;
use muse_daw::DAWAdapter;
use muse_registry::EntityRegistry;
use muse_statestore::StateStore;
use muse_variation::{CancellableRun, FixedPlanPlanner, Planner, SSEBroadcaster, VariationStore};
use muse_vcs::{PullRequestStore, VcsStore};
use std::collections::HashMap;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

/// Per-conversation [`StateStore`] instances, keyed by `conversation_id`
/// only (not also by `project_id` — see `SPEC_FULL.md` §9's open-question
/// decision: a conversation belongs to exactly one project for its
/// lifetime, so the extra key would never disambiguate anything).
#[derive(Default)]
pub struct StateStoreRegistry {
    stores: HashMap<String, StateStore>,
}

impl StateStoreRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the store for `conversation_id`, creating one (seeded at
    /// version 0) if this is the first time it's been referenced.
    pub fn get_or_create(&mut self, conversation_id: uuid::Uuid) -> &mut StateStore {
        self.stores
            .entry(conversation_id.to_string())
            .or_insert_with(|| StateStore::new(conversation_id))
    }

    /// Returns the store for `conversation_id` if it has been created.
    #[must_use]
    pub fn get(&self, conversation_id: &str) -> Option<&StateStore> {
        self.stores.get(conversation_id)
    }

    /// Returns a mutable handle to the store for `conversation_id` if it
    /// has been created.
    pub fn get_mut(&mut self, conversation_id: &str) -> Option<&mut StateStore> {
        self.stores.get_mut(conversation_id)
    }
}

/// Per-project [`EntityRegistry`] instances, keyed by `project_id`.
#[derive(Default)]
pub struct EntityRegistryStore {
    registries: HashMap<String, EntityRegistry>,
}

impl EntityRegistryStore {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the registry for `project_id`, creating one if this is the
    /// first time it's been referenced. `project_id` need not itself be a
    /// UUID; the registry's own identity is distinct from its key here.
    pub fn get_or_create(&mut self, project_id: &str) -> &mut EntityRegistry {
        self.registries.entry(project_id.to_string()).or_insert_with(|| {
            let scope = Uuid::parse_str(project_id).unwrap_or_else(|_| Uuid::new_v4());
            EntityRegistry::new(scope)
        })
    }

    /// Returns the registry for `project_id` if it has been created.
    #[must_use]
    pub fn get(&self, project_id: &str) -> Option<&EntityRegistry> {
        self.registries.get(project_id)
    }
}

/// Everything the HTTP handlers share across requests.
///
/// Mirrors the teacher daemon's single `AppState` struct of `Arc`-wrapped
/// locks: one lock per logically independent piece of state, rather than
/// one lock around everything.
pub struct AppState {
    /// Variation records and their lifecycle.
    pub variations: Mutex<VariationStore>,
    /// SSE fan-out for variation streams.
    pub broadcaster: SSEBroadcaster,
    /// Per-conversation canonical project state.
    pub state_stores: RwLock<StateStoreRegistry>,
    /// Per-project entity name/ID registry.
    pub registries: RwLock<EntityRegistryStore>,
    /// Muse Hub repo/branch/commit object store.
    pub vcs: RwLock<VcsStore>,
    /// Muse Hub pull requests.
    pub pull_requests: RwLock<PullRequestStore>,
    /// DAW tool-dispatch port.
    pub daw: Box<dyn DAWAdapter>,
    /// Execution planner collaborator.
    pub planner: Box<dyn Planner>,
    /// JWT verifier for Muse Hub routes.
    pub jwt: JwtVerifier,
    /// Cancellation handles for variations whose generation is in flight,
    /// so a discard request can stop a running background task.
    pub runs: Mutex<HashMap<Uuid, CancellableRun>>,
}

impl AppState {
    /// Builds an `AppState` wired to the in-process mock DAW adapter and
    /// a fixed-plan planner, suitable for local development and tests.
    /// Production deployments construct the adapter/planner themselves
    /// and call a more specific constructor; this crate only ships the
    /// mock wiring the spec calls for.
    #[must_use]
    pub fn new_with_mocks(jwt_secret: &str) -> Self {
        Self {
            variations: Mutex::new(VariationStore::new()),
            broadcaster: SSEBroadcaster::new(),
            state_stores: RwLock::new(StateStoreRegistry::new()),
            registries: RwLock::new(EntityRegistryStore::new()),
            vcs: RwLock::new(VcsStore::new()),
            pull_requests: RwLock::new(PullRequestStore::new()),
            daw: Box::new(muse_daw::MockDawAdapter::with_default_registry()),
            planner: Box::new(FixedPlanPlanner::with_default_plan()),
            jwt: JwtVerifier::from_hs256_secret(jwt_secret),
            runs: Mutex::new(HashMap::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn get_or_create_is_idempotent_per_conversation() {
        let mut registry = StateStoreRegistry::new();
        let id = Uuid::new_v4();
        let version_before = registry.get_or_create(id).state_id();
        registry.get_or_create(id).set_tempo(140.0, None);
        let version_after = registry.get(&id.to_string()).unwrap().state_id();
        assert_ne!(version_before, version_after);
    }
}
