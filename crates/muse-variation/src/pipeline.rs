// SPDX-License-Identifier: MIT OR Apache-2.0
//! Propose, generate, commit, and discard — the variation lifecycle glued
//! together end to end.
//!
//! This module is the one place that knows about every other module in
//! the crate; everything else (the state machine, the store, the
//! broadcaster, the executor) is usable on its own. A daemon wires these
//! functions to HTTP handlers and owns the locks around the shared
//! `VariationStore`/`SSEBroadcaster`/`StateStore` instances — this crate
//! never assumes a particular concurrency wrapper beyond the `tokio::sync`
//! primitives needed for the background generation task itself.

use crate::broadcaster::SSEBroadcaster;
use crate::cancel::{CancellableRun, CancellationReason};
use crate::executor::{compute_variation_from_context, execute_plan, RegionMeta};
use crate::plan::Planner;
use crate::state_machine::VariationStatus;
use crate::store::VariationStore;
use muse_core::{DonePayload, ErrorPayload, EventEnvelope, EventPayload, MetaPayload};
use muse_daw::DAWAdapter;
use muse_error::{ErrorCode, MuseError};
use muse_statestore::{ControllerEvent, Note, SnapshotBundle, StateStore};
use std::collections::HashMap;
use uuid::Uuid;

/// What a successful `propose` call hands back to the client immediately,
/// before generation has produced anything.
#[derive(Debug, Clone)]
pub struct ProposeOutcome {
    /// The new variation's ID.
    pub variation_id: Uuid,
    /// Where the client should open an SSE connection to watch it stream.
    pub stream_url: String,
}

/// Validate the client's baseline and register a new variation in
/// [`VariationStatus::Created`]. Does not start generation.
///
/// # Errors
///
/// [`ErrorCode::BaselineMismatch`] if `base_state_id` doesn't match the
/// store's current `stateId`.
pub fn propose(
    store: &StateStore,
    variations: &mut VariationStore,
    project_id: &str,
    base_state_id: &str,
    intent: &str,
    conversation_id: &str,
) -> Result<ProposeOutcome, MuseError> {
    if !store.check_state_id(base_state_id) {
        return Err(MuseError::new(
            ErrorCode::BaselineMismatch,
            "base state id does not match current project state",
        ));
    }
    let variation_id = Uuid::new_v4();
    let record = variations.create(project_id, base_state_id, intent, variation_id, conversation_id)?;
    Ok(ProposeOutcome {
        variation_id: record.variation_id,
        stream_url: format!("/api/v1/variation/stream?variation_id={variation_id}"),
    })
}

/// Everything [`run_generation`] needs beyond the record it operates on.
pub struct GenerationInputs<'a> {
    /// The DAW adapter to dispatch tool calls through.
    pub daw: &'a dyn DAWAdapter,
    /// The planner collaborator that turns intent into an execution plan.
    pub planner: &'a dyn Planner,
    /// An immutable snapshot of state as of `base_state_id`.
    pub base_snapshot: SnapshotBundle,
    /// Region beat-span/name metadata, for phrase records.
    pub region_meta: HashMap<String, RegionMeta>,
    /// Region-to-track mapping, for phrase records.
    pub track_of_region: HashMap<String, String>,
    /// Cancellation handle shared with whoever might discard this run.
    pub run: CancellableRun,
}

/// Run a variation's full generation: `CREATED -> STREAMING -> READY`
/// (or `FAILED`/`DISCARDED`), publishing every envelope to `broadcaster`
/// and recording every phrase on the matching record in `variations`.
///
/// This is the body of the background task a daemon spawns per proposed
/// variation; it never touches the canonical `StateStore` — only the
/// immutable `base_snapshot` it was handed.
pub async fn run_generation(
    variation_id: Uuid,
    variations: &tokio::sync::Mutex<VariationStore>,
    broadcaster: &SSEBroadcaster,
    inputs: GenerationInputs<'_>,
) {
    let (project_id, base_state_id, intent) = {
        let mut guard = variations.lock().await;
        if guard.transition(variation_id, VariationStatus::Streaming).is_err() {
            return;
        }
        let record = guard.get(variation_id).expect("just transitioned");
        (
            record.project_id.clone(),
            record.base_state_id.clone(),
            record.intent.clone(),
        )
    };

    publish(
        broadcaster,
        variation_id,
        &project_id,
        &base_state_id,
        1,
        EventPayload::Meta(MetaPayload {
            variation_id: variation_id.to_string(),
            project_id: project_id.clone(),
            base_state_id: base_state_id.clone(),
            intent: intent.clone(),
        }),
    )
    .await;

    if inputs.run.is_cancelled() {
        finish_discarded(variation_id, variations, broadcaster, &project_id, &base_state_id).await;
        return;
    }

    let registry_snapshot = inputs.daw.registry().clone();
    let plan = match inputs.planner.plan(&intent, &registry_snapshot).await {
        Ok(plan) => plan,
        Err(err) => {
            finish_failed(variation_id, variations, broadcaster, &project_id, &base_state_id, &err).await;
            return;
        }
    };

    let exec_result = tokio::select! {
        biased;
        () = inputs.run.token().cancelled() => None,
        result = execute_plan(
            &plan,
            inputs.daw,
            &inputs.base_snapshot,
            inputs.region_meta,
            inputs.track_of_region,
        ) => Some(result),
    };

    let Some(exec_result) = exec_result else {
        finish_discarded(variation_id, variations, broadcaster, &project_id, &base_state_id).await;
        return;
    };

    let ctx = match exec_result {
        Ok(ctx) => ctx,
        Err(err) => {
            finish_failed(variation_id, variations, broadcaster, &project_id, &base_state_id, &err).await;
            return;
        }
    };

    let phrases = compute_variation_from_context(&ctx, &intent);

    for mut phrase in phrases {
        if inputs.run.is_cancelled() {
            finish_discarded(variation_id, variations, broadcaster, &project_id, &base_state_id).await;
            return;
        }
        let sequence = {
            let mut guard = variations.lock().await;
            let record = guard.get_mut_or_raise(variation_id).expect("record exists");
            record.next_sequence()
        };
        phrase.sequence = sequence;
        {
            let mut guard = variations.lock().await;
            let record = guard.get_mut_or_raise(variation_id).expect("record exists");
            record.add_phrase(phrase.clone());
        }
        publish(
            broadcaster,
            variation_id,
            &project_id,
            &base_state_id,
            sequence,
            EventPayload::Phrase(Box::new(phrase)),
        )
        .await;
    }

    let (phrase_count, affected_tracks, affected_regions) = {
        let guard = variations.lock().await;
        let record = guard.get(variation_id).expect("record exists");
        (
            record.phrases.len(),
            record.affected_tracks.clone(),
            record.affected_regions.clone(),
        )
    };

    {
        let mut guard = variations.lock().await;
        guard
            .transition(variation_id, VariationStatus::Ready)
            .expect("streaming -> ready is always legal");
    }

    let sequence = {
        let mut guard = variations.lock().await;
        guard.get_mut_or_raise(variation_id).unwrap().next_sequence()
    };
    publish(
        broadcaster,
        variation_id,
        &project_id,
        &base_state_id,
        sequence,
        EventPayload::Done(DonePayload {
            phrase_count,
            affected_tracks,
            affected_regions,
        }),
    )
    .await;
}

async fn publish(
    broadcaster: &SSEBroadcaster,
    variation_id: Uuid,
    project_id: &str,
    base_state_id: &str,
    sequence: u64,
    payload: EventPayload,
) {
    let envelope = EventEnvelope::new(sequence, variation_id.to_string(), project_id, base_state_id, payload);
    broadcaster.publish(envelope).await;
}

async fn finish_failed(
    variation_id: Uuid,
    variations: &tokio::sync::Mutex<VariationStore>,
    broadcaster: &SSEBroadcaster,
    project_id: &str,
    base_state_id: &str,
    err: &MuseError,
) {
    let sequence = {
        let mut guard = variations.lock().await;
        if let Ok(record) = guard.get_mut_or_raise(variation_id) {
            record.error_message = Some(err.message.clone());
            let sequence = record.next_sequence();
            let _ = guard.transition(variation_id, VariationStatus::Failed);
            sequence
        } else {
            return;
        }
    };
    publish(
        broadcaster,
        variation_id,
        project_id,
        base_state_id,
        sequence,
        EventPayload::Error(ErrorPayload {
            code: err.code.as_str().to_string(),
            message: err.message.clone(),
        }),
    )
    .await;
    let done_sequence = sequence + 1;
    publish(
        broadcaster,
        variation_id,
        project_id,
        base_state_id,
        done_sequence,
        EventPayload::Done(DonePayload {
            phrase_count: 0,
            affected_tracks: Vec::new(),
            affected_regions: Vec::new(),
        }),
    )
    .await;
}

async fn finish_discarded(
    variation_id: Uuid,
    variations: &tokio::sync::Mutex<VariationStore>,
    broadcaster: &SSEBroadcaster,
    project_id: &str,
    base_state_id: &str,
) {
    let sequence = {
        let mut guard = variations.lock().await;
        if let Ok(record) = guard.get_mut_or_raise(variation_id) {
            if record.status.is_terminal() {
                return;
            }
            let sequence = record.next_sequence();
            let _ = guard.transition(variation_id, VariationStatus::Discarded);
            sequence
        } else {
            return;
        }
    };
    publish(
        broadcaster,
        variation_id,
        project_id,
        base_state_id,
        sequence,
        EventPayload::Done(DonePayload {
            phrase_count: 0,
            affected_tracks: Vec::new(),
            affected_regions: Vec::new(),
        }),
    )
    .await;
    broadcaster.close_stream(&variation_id.to_string()).await;
}

/// One region's post-commit state, ready for the client to sync its UI
/// from without re-querying the store.
#[derive(Debug, Clone)]
pub struct UpdatedRegion {
    /// The region's ID.
    pub region_id: String,
    /// The region's parent track, as captured at generation time.
    pub track_id: String,
    /// The region's notes after commit.
    pub notes: Vec<Note>,
    /// The region's CC events after commit.
    pub cc_events: Vec<ControllerEvent>,
    /// The region's pitch-bend events after commit.
    pub pitch_bends: Vec<ControllerEvent>,
    /// The region's aftertouch events after commit.
    pub aftertouch: Vec<ControllerEvent>,
    /// Region start in beats, as captured at generation time.
    pub start_beat: Option<f64>,
    /// Region duration in beats, as captured at generation time.
    pub duration_beats: Option<f64>,
    /// Region display name, as captured at generation time.
    pub name: Option<String>,
}

/// What a successful commit hands back to the client.
#[derive(Debug, Clone)]
pub struct CommitOutcome {
    /// The store's version after this commit.
    pub new_state_id: String,
    /// Phrase IDs that were actually applied.
    pub applied_phrase_ids: Vec<String>,
    /// Per-region post-commit payloads.
    pub updated_regions: Vec<UpdatedRegion>,
}

/// Accept some or all of a ready variation's phrases and apply them to the
/// canonical store.
///
/// # Errors
///
/// - [`ErrorCode::VariationInvalidTransition`] if the record is not
///   currently [`VariationStatus::Ready`].
/// - [`ErrorCode::BaselineMismatch`] if `base_state_id` no longer matches
///   the store's current version.
/// - [`ErrorCode::EntityNotFound`] if an accepted phrase ID isn't on the
///   record.
pub fn commit(
    variations: &mut VariationStore,
    store: &mut StateStore,
    variation_id: Uuid,
    base_state_id: &str,
    accepted_phrase_ids: &[String],
) -> Result<CommitOutcome, MuseError> {
    let record = variations.get_or_raise(variation_id)?;
    if record.status != VariationStatus::Ready {
        return Err(MuseError::new(
            ErrorCode::VariationInvalidTransition,
            format!("variation is not ready to commit (status: {})", record.status),
        ));
    }
    if !store.check_state_id(base_state_id) {
        return Err(MuseError::new(
            ErrorCode::BaselineMismatch,
            "base state id no longer matches current project state",
        ));
    }

    let mut accepted_phrases = Vec::new();
    for phrase_id in accepted_phrase_ids {
        let phrase = record.get_phrase(phrase_id).ok_or_else(|| {
            MuseError::new(ErrorCode::EntityNotFound, format!("unknown phrase id: {phrase_id}"))
        })?;
        accepted_phrases.push(phrase.clone());
    }
    accepted_phrases.sort_by_key(|p| p.sequence);

    let mut tx = store.begin_transaction(format!("commit variation {variation_id}"))?;
    for phrase in &accepted_phrases {
        let additions: Vec<Note> = phrase
            .note_changes
            .iter()
            .filter(|c| c.change_type == muse_core::ChangeType::Added)
            .filter_map(|c| c.after.map(|snap| to_note(&c.note_id, snap)))
            .collect();
        if !additions.is_empty() {
            store.add_notes(phrase.region_id.clone(), additions, Some(&mut tx));
        }

        let removals: Vec<String> = phrase
            .note_changes
            .iter()
            .filter(|c| c.change_type == muse_core::ChangeType::Removed)
            .map(|c| c.note_id.clone())
            .collect();
        if !removals.is_empty() {
            store.remove_notes(phrase.region_id.clone(), removals, Some(&mut tx));
        }

        for change in phrase
            .note_changes
            .iter()
            .filter(|c| c.change_type == muse_core::ChangeType::Modified)
        {
            let Some(after) = change.after else {
                store.rollback(tx)?;
                let record = variations.get_mut_or_raise(variation_id)?;
                record.error_message = Some(format!("modified note {} missing after-state", change.note_id));
                variations.transition(variation_id, VariationStatus::Failed)?;
                return Err(MuseError::new(ErrorCode::Internal, "modified note missing after-state"));
            };
            store.remove_notes(phrase.region_id.clone(), vec![change.note_id.clone()], Some(&mut tx));
            store.add_notes(phrase.region_id.clone(), vec![to_note(&change.note_id, after)], Some(&mut tx));
        }

        let controller_events: Vec<ControllerEvent> = phrase
            .controller_changes
            .iter()
            .filter_map(|raw| match serde_json::from_value(raw.clone()) {
                Ok(event) => Some(event),
                Err(err) => {
                    tracing::warn!(?err, region_id = %phrase.region_id, "skipping malformed controller change");
                    None
                }
            })
            .collect();
        if !controller_events.is_empty() {
            store.add_controller_events(phrase.region_id.clone(), controller_events, Some(&mut tx));
        }
    }

    store.commit(tx)?;
    variations.transition(variation_id, VariationStatus::Committed)?;

    let mut updated_regions = Vec::new();
    let mut seen_regions = std::collections::HashSet::new();
    for phrase in &accepted_phrases {
        if !seen_regions.insert(phrase.region_id.clone()) {
            continue;
        }
        let controller_events = store.region_controller_events(&phrase.region_id);
        let cc_events = controller_events
            .iter()
            .filter(|e| matches!(e, ControllerEvent::Cc { .. }))
            .cloned()
            .collect();
        let pitch_bends = controller_events
            .iter()
            .filter(|e| matches!(e, ControllerEvent::PitchBend { .. }))
            .cloned()
            .collect();
        let aftertouch = controller_events
            .iter()
            .filter(|e| matches!(e, ControllerEvent::Aftertouch { .. }))
            .cloned()
            .collect();
        updated_regions.push(UpdatedRegion {
            region_id: phrase.region_id.clone(),
            track_id: phrase.track_id.clone(),
            notes: store.region_notes(&phrase.region_id).to_vec(),
            cc_events,
            pitch_bends,
            aftertouch,
            start_beat: phrase.region_start_beat,
            duration_beats: phrase.region_duration_beats,
            name: phrase.region_name.clone(),
        });
    }

    Ok(CommitOutcome {
        new_state_id: store.state_id(),
        applied_phrase_ids: accepted_phrase_ids.to_vec(),
        updated_regions,
    })
}

fn to_note(note_id: &str, snap: muse_core::MidiNoteSnapshot) -> Note {
    Note {
        id: note_id.to_string(),
        pitch: snap.pitch,
        start_beat: snap.start_beat,
        duration_beats: snap.duration_beats,
        velocity: snap.velocity,
        channel: snap.channel,
    }
}

/// Discard a variation. Idempotent: a missing or already-discarded record
/// is reported as success.
///
/// # Errors
///
/// [`ErrorCode::VariationInvalidTransition`] if the record is in a
/// terminal state other than [`VariationStatus::Discarded`].
pub fn discard(
    variations: &mut VariationStore,
    variation_id: Uuid,
    run: Option<&CancellableRun>,
) -> Result<(), MuseError> {
    let Some(record) = variations.get(variation_id) else {
        return Ok(());
    };
    if record.status == VariationStatus::Discarded {
        return Ok(());
    }
    if record.status.is_terminal() {
        return Err(MuseError::new(
            ErrorCode::VariationInvalidTransition,
            format!("variation already resolved as {}", record.status),
        ));
    }
    if record.status == VariationStatus::Streaming {
        if let Some(run) = run {
            run.cancel(CancellationReason::UserDiscard);
        }
    }
    variations.transition(variation_id, VariationStatus::Discarded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broadcaster::SSEBroadcaster;
    use crate::cancel::CancellationToken;
    use crate::mock_planner::FixedPlanPlanner;
    use muse_core::{ChangeType, MidiNoteSnapshot, NoteChange};
    use muse_daw::MockDawAdapter;

    fn fresh_store() -> StateStore {
        StateStore::new(Uuid::new_v4())
    }

    #[test]
    fn propose_rejects_stale_baseline() {
        let store = fresh_store();
        let mut variations = VariationStore::new();
        let err = propose(&store, &mut variations, "proj", "41", "add drums", "conv-1").unwrap_err();
        assert_eq!(err.code, ErrorCode::BaselineMismatch);
    }

    #[test]
    fn propose_succeeds_against_current_baseline() {
        let store = fresh_store();
        let mut variations = VariationStore::new();
        let outcome = propose(&store, &mut variations, "proj", "0", "add drums", "conv-1").unwrap();
        assert_eq!(variations.count(), 1);
        assert!(outcome.stream_url.contains(&outcome.variation_id.to_string()));
    }

    #[tokio::test]
    async fn run_generation_reaches_ready_and_publishes_done() {
        let store = fresh_store();
        let mut variation_store = VariationStore::new();
        let outcome = propose(&store, &mut variation_store, "proj", "0", "add drums", "conv-1").unwrap();
        let variations = tokio::sync::Mutex::new(variation_store);
        let broadcaster = SSEBroadcaster::new();
        let daw = MockDawAdapter::with_default_registry();
        let planner = FixedPlanPlanner::with_default_plan();
        let base = SnapshotBundle {
            state_id: "0".to_string(),
            notes_by_region: HashMap::new(),
            controller_events_by_region: HashMap::new(),
            tempo: 120.0,
            key: "C major".to_string(),
        };
        let run = CancellableRun::new(CancellationToken::new());

        run_generation(
            outcome.variation_id,
            &variations,
            &broadcaster,
            GenerationInputs {
                daw: &daw,
                planner: &planner,
                base_snapshot: base,
                region_meta: HashMap::new(),
                track_of_region: HashMap::new(),
                run,
            },
        )
        .await;

        let guard = variations.lock().await;
        let record = guard.get(outcome.variation_id).unwrap();
        assert_eq!(record.status, VariationStatus::Ready);

        let history = broadcaster.get_history(&outcome.variation_id.to_string(), 0).await;
        assert!(history.iter().any(|e| e.event_name() == "meta"));
        assert!(history.iter().any(|e| e.event_name() == "done"));
    }

    fn phrase_with_addition(variation_id: Uuid, region_id: &str) -> muse_core::Phrase {
        let _ = variation_id;
        muse_core::Phrase {
            phrase_id: "ph-1".to_string(),
            sequence: 2,
            track_id: "track-1".to_string(),
            region_id: region_id.to_string(),
            beat_start: 0.0,
            beat_end: 1.0,
            label: "add note".to_string(),
            tags: vec![],
            explanation: Some("add a kick".to_string()),
            note_changes: vec![NoteChange {
                note_id: "n1".to_string(),
                change_type: ChangeType::Added,
                before: None,
                after: Some(MidiNoteSnapshot {
                    pitch: 60,
                    start_beat: 0.0,
                    duration_beats: 1.0,
                    velocity: 100,
                    channel: 0,
                }),
            }],
            controller_changes: vec![],
            region_start_beat: Some(0.0),
            region_duration_beats: Some(4.0),
            region_name: Some("Verse".to_string()),
        }
    }

    #[test]
    fn commit_requires_ready_status() {
        let mut store = fresh_store();
        let mut variations = VariationStore::new();
        let outcome = propose(&store, &mut variations, "proj", "0", "add drums", "conv-1").unwrap();
        let err = commit(&mut variations, &mut store, outcome.variation_id, "0", &["ph-1".to_string()])
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::VariationInvalidTransition);
    }

    #[test]
    fn commit_applies_additions_and_advances_state_id() {
        let mut store = fresh_store();
        let mut variations = VariationStore::new();
        let outcome = propose(&store, &mut variations, "proj", "0", "add drums", "conv-1").unwrap();
        variations.transition(outcome.variation_id, VariationStatus::Streaming).unwrap();
        variations
            .get_mut_or_raise(outcome.variation_id)
            .unwrap()
            .add_phrase(phrase_with_addition(outcome.variation_id, "region-1"));
        variations.transition(outcome.variation_id, VariationStatus::Ready).unwrap();

        let result = commit(
            &mut variations,
            &mut store,
            outcome.variation_id,
            "0",
            &["ph-1".to_string()],
        )
        .unwrap();

        assert_eq!(result.new_state_id, "1");
        assert_eq!(result.applied_phrase_ids, vec!["ph-1".to_string()]);
        assert_eq!(result.updated_regions.len(), 1);
        assert_eq!(store.region_notes("region-1").len(), 1);
        assert_eq!(
            variations.get(outcome.variation_id).unwrap().status,
            VariationStatus::Committed
        );
    }

    fn phrase_with_controller_event(variation_id: Uuid, region_id: &str) -> muse_core::Phrase {
        let mut phrase = phrase_with_addition(variation_id, region_id);
        phrase.note_changes.clear();
        phrase.controller_changes = vec![serde_json::json!({
            "kind": "cc",
            "id": "cc1",
            "controller": 11,
            "value": 100,
            "beat": 0.5,
            "channel": 0,
        })];
        phrase
    }

    #[test]
    fn commit_applies_controller_events_and_exposes_them_on_updated_region() {
        let mut store = fresh_store();
        let mut variations = VariationStore::new();
        let outcome = propose(&store, &mut variations, "proj", "0", "swell the pedal", "conv-1").unwrap();
        variations.transition(outcome.variation_id, VariationStatus::Streaming).unwrap();
        variations
            .get_mut_or_raise(outcome.variation_id)
            .unwrap()
            .add_phrase(phrase_with_controller_event(outcome.variation_id, "region-1"));
        variations.transition(outcome.variation_id, VariationStatus::Ready).unwrap();

        let result = commit(
            &mut variations,
            &mut store,
            outcome.variation_id,
            "0",
            &["ph-1".to_string()],
        )
        .unwrap();

        assert_eq!(result.updated_regions.len(), 1);
        let region = &result.updated_regions[0];
        assert_eq!(region.cc_events.len(), 1);
        assert!(region.pitch_bends.is_empty());
        assert!(region.aftertouch.is_empty());
        assert_eq!(store.region_controller_events("region-1").len(), 1);
    }

    #[test]
    fn commit_rejects_stale_baseline() {
        let mut store = fresh_store();
        let mut variations = VariationStore::new();
        let outcome = propose(&store, &mut variations, "proj", "0", "add drums", "conv-1").unwrap();
        variations.transition(outcome.variation_id, VariationStatus::Streaming).unwrap();
        variations.transition(outcome.variation_id, VariationStatus::Ready).unwrap();
        store.set_tempo(140.0, None);

        let err = commit(&mut variations, &mut store, outcome.variation_id, "0", &[]).unwrap_err();
        assert_eq!(err.code, ErrorCode::BaselineMismatch);
    }

    #[test]
    fn commit_rejects_unknown_phrase_id() {
        let mut store = fresh_store();
        let mut variations = VariationStore::new();
        let outcome = propose(&store, &mut variations, "proj", "0", "add drums", "conv-1").unwrap();
        variations.transition(outcome.variation_id, VariationStatus::Streaming).unwrap();
        variations.transition(outcome.variation_id, VariationStatus::Ready).unwrap();

        let err = commit(&mut variations, &mut store, outcome.variation_id, "0", &["missing".to_string()])
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::EntityNotFound);
    }

    #[test]
    fn discard_is_idempotent_for_unknown_variation() {
        let mut variations = VariationStore::new();
        assert!(discard(&mut variations, Uuid::new_v4(), None).is_ok());
    }

    #[test]
    fn discard_rejects_already_committed() {
        let mut store = fresh_store();
        let mut variations = VariationStore::new();
        let outcome = propose(&store, &mut variations, "proj", "0", "add drums", "conv-1").unwrap();
        variations.transition(outcome.variation_id, VariationStatus::Streaming).unwrap();
        variations.transition(outcome.variation_id, VariationStatus::Ready).unwrap();
        commit(&mut variations, &mut store, outcome.variation_id, "0", &[]).unwrap();

        let err = discard(&mut variations, outcome.variation_id, None).unwrap_err();
        assert_eq!(err.code, ErrorCode::VariationInvalidTransition);
    }

    #[test]
    fn discard_cancels_a_streaming_run() {
        let store = fresh_store();
        let mut variations = VariationStore::new();
        let outcome = propose(&store, &mut variations, "proj", "0", "add drums", "conv-1").unwrap();
        variations.transition(outcome.variation_id, VariationStatus::Streaming).unwrap();
        let run = CancellableRun::new(CancellationToken::new());

        discard(&mut variations, outcome.variation_id, Some(&run)).unwrap();
        assert!(run.is_cancelled());
        assert_eq!(
            variations.get(outcome.variation_id).unwrap().status,
            VariationStatus::Discarded
        );
    }
}
