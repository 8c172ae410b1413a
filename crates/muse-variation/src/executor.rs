// SPDX-License-Identifier: MIT OR Apache-2.0
//! The three-phase plan executor and the pure diff it feeds.
//!
//! The executor never touches the canonical `StateStore` — it accumulates
//! a before/after view of each region's notes into a [`VariationContext`],
//! which [`compute_variation_from_context`] then diffs into ordered
//! [`Phrase`]s. Nothing here is visible to the caller except the
//! resulting phrases; the context is an implementation detail of one
//! generation run.

use crate::plan::{ExecutionPlan, ToolCall};
use muse_core::{ChangeType, MidiNoteSnapshot, NoteChange, Phrase};
use muse_daw::{DAWAdapter, Phase as DawPhase};
use muse_error::{ErrorCode, MuseError};
use muse_statestore::{ControllerEvent, Note, SnapshotBundle};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, Semaphore};

/// Beat-span metadata for a region, supplied by the caller (the daemon
/// reads this from project/registry state) since a [`SnapshotBundle`]
/// only carries note content, not region geometry.
#[derive(Debug, Clone)]
pub struct RegionMeta {
    /// Region start, in beats.
    pub start_beat: f64,
    /// Region duration, in beats.
    pub duration_beats: f64,
    /// Region display name.
    pub name: String,
}

/// Upper bound on concurrently-executing Phase 2 instrument groups.
const INSTRUMENT_GROUP_CONCURRENCY: usize = 4;

/// Accumulated before/after state for one generation run.
#[derive(Debug, Clone)]
pub struct VariationContext {
    base_notes: HashMap<String, Vec<Note>>,
    proposed_notes: HashMap<String, Vec<Note>>,
    base_controller_events: HashMap<String, Vec<ControllerEvent>>,
    proposed_controller_events: HashMap<String, Vec<ControllerEvent>>,
    region_meta: HashMap<String, RegionMeta>,
    track_of_region: HashMap<String, String>,
}

fn note_ids(params: &serde_json::Value) -> Result<Vec<String>, MuseError> {
    serde_json::from_value(params.get("note_ids").cloned().unwrap_or_default()).map_err(|e| {
        MuseError::new(ErrorCode::DawInvalidParams, format!("bad note_ids: {e}"))
    })
}

fn notes_from(params: &serde_json::Value) -> Result<Vec<Note>, MuseError> {
    serde_json::from_value(params.get("notes").cloned().unwrap_or_default()).map_err(|e| {
        MuseError::new(ErrorCode::DawInvalidParams, format!("bad notes: {e}"))
    })
}

fn controller_events_from(params: &serde_json::Value) -> Result<Vec<ControllerEvent>, MuseError> {
    serde_json::from_value(params.get("events").cloned().unwrap_or_default()).map_err(|e| {
        MuseError::new(ErrorCode::DawInvalidParams, format!("bad events: {e}"))
    })
}

fn region_id_of(params: &serde_json::Value) -> Result<String, MuseError> {
    params
        .get("region_id")
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .ok_or_else(|| MuseError::new(ErrorCode::DawInvalidParams, "missing region_id"))
}

/// Run a plan's setup, instrument, and mixing phases against an immutable
/// base snapshot, returning the accumulated before/after context.
///
/// Setup tool calls mutate nothing the diff cares about directly (tempo
/// and key live on the `StateStore`, not in the note-level diff); they
/// are still dispatched so a real DAW client observes them. Instrument
/// calls named `add_notes`/`remove_notes` are interpreted to build the
/// proposed note set; any other instrument-phase tool is dispatched but
/// does not participate in the note diff. Mixing calls are dispatched but
/// never touch notes.
///
/// # Errors
///
/// Propagates whatever error the `DAWAdapter` returns from `dispatch`, or
/// a [`ErrorCode::DawInvalidParams`] error if a recognized tool's
/// parameters don't match its expected shape.
pub async fn execute_plan(
    plan: &ExecutionPlan,
    daw: &dyn DAWAdapter,
    base: &SnapshotBundle,
    region_meta: HashMap<String, RegionMeta>,
    track_of_region: HashMap<String, String>,
) -> Result<VariationContext, MuseError> {
    let proposed = Arc::new(Mutex::new(base.notes_by_region.clone()));
    let proposed_cc = Arc::new(Mutex::new(base.controller_events_by_region.clone()));

    for call in plan.calls.iter().filter(|c| daw.phase_for_tool(&c.name) == DawPhase::Setup) {
        daw.dispatch(&call.name, call.params.clone()).await?;
    }

    let instrument_calls: Vec<&ToolCall> = plan
        .calls
        .iter()
        .filter(|c| daw.phase_for_tool(&c.name) == DawPhase::Instrument)
        .collect();
    let mut groups: HashMap<String, Vec<&ToolCall>> = HashMap::new();
    for call in instrument_calls {
        let key = call
            .instrument_key
            .as_deref()
            .unwrap_or("default")
            .to_lowercase();
        groups.entry(key).or_default().push(call);
    }

    let semaphore = Arc::new(Semaphore::new(INSTRUMENT_GROUP_CONCURRENCY));
    let mut handles = Vec::new();
    for (_, calls) in groups {
        let calls: Vec<ToolCall> = calls.into_iter().cloned().collect();
        let semaphore = Arc::clone(&semaphore);
        let proposed = Arc::clone(&proposed);
        let proposed_cc = Arc::clone(&proposed_cc);
        handles.push(tokio::spawn(run_instrument_group(
            calls, semaphore, proposed, proposed_cc,
        )));
    }
    for handle in handles {
        handle
            .await
            .map_err(|e| MuseError::new(ErrorCode::Internal, format!("instrument task panicked: {e}")))??;
    }

    for call in plan.calls.iter().filter(|c| daw.phase_for_tool(&c.name) == DawPhase::Mixing) {
        daw.dispatch(&call.name, call.params.clone()).await?;
    }

    let proposed_notes = Arc::try_unwrap(proposed)
        .expect("no instrument task should outlive its handle")
        .into_inner();
    let proposed_controller_events = Arc::try_unwrap(proposed_cc)
        .expect("no instrument task should outlive its handle")
        .into_inner();

    Ok(VariationContext {
        base_notes: base.notes_by_region.clone(),
        proposed_notes,
        base_controller_events: base.controller_events_by_region.clone(),
        proposed_controller_events,
        region_meta,
        track_of_region,
    })
}

async fn run_instrument_group(
    calls: Vec<ToolCall>,
    semaphore: Arc<Semaphore>,
    proposed: Arc<Mutex<HashMap<String, Vec<Note>>>>,
    proposed_cc: Arc<Mutex<HashMap<String, Vec<ControllerEvent>>>>,
) -> Result<(), MuseError> {
    let _permit = semaphore
        .acquire_owned()
        .await
        .map_err(|e| MuseError::new(ErrorCode::Internal, format!("semaphore closed: {e}")))?;

    for call in calls {
        match call.name.as_str() {
            "add_notes" => {
                let region_id = region_id_of(&call.params)?;
                let notes = notes_from(&call.params)?;
                let mut guard = proposed.lock().await;
                guard.entry(region_id).or_default().extend(notes);
            }
            "remove_notes" => {
                let region_id = region_id_of(&call.params)?;
                let ids = note_ids(&call.params)?;
                let mut guard = proposed.lock().await;
                if let Some(notes) = guard.get_mut(&region_id) {
                    notes.retain(|n| !ids.contains(&n.id));
                }
            }
            "add_controller_events" => {
                let region_id = region_id_of(&call.params)?;
                let events = controller_events_from(&call.params)?;
                let mut guard = proposed_cc.lock().await;
                guard.entry(region_id).or_default().extend(events);
            }
            _ => {}
        }
    }
    Ok(())
}

fn note_to_snapshot(note: &Note) -> MidiNoteSnapshot {
    MidiNoteSnapshot {
        pitch: note.pitch,
        start_beat: note.start_beat,
        duration_beats: note.duration_beats,
        velocity: note.velocity,
        channel: note.channel,
    }
}

/// Diff a [`VariationContext`]'s base/proposed note sets into ordered
/// phrases, one per touched region, in region-iteration order.
///
/// Sequence numbers start at `2` (sequence `1` is reserved for the
/// stream's `meta` envelope).
#[must_use]
pub fn compute_variation_from_context(ctx: &VariationContext, intent: &str) -> Vec<Phrase> {
    let mut region_ids: Vec<&String> = ctx
        .base_notes
        .keys()
        .chain(ctx.proposed_notes.keys())
        .chain(ctx.base_controller_events.keys())
        .chain(ctx.proposed_controller_events.keys())
        .collect();
    region_ids.sort();
    region_ids.dedup();

    let mut phrases = Vec::new();
    let mut sequence = 1u64;

    for region_id in region_ids {
        let before = ctx.base_notes.get(region_id).cloned().unwrap_or_default();
        let after = ctx.proposed_notes.get(region_id).cloned().unwrap_or_default();

        let mut note_changes = Vec::new();
        for note in &after {
            if !before.iter().any(|b| b.id == note.id) {
                note_changes.push(NoteChange {
                    note_id: note.id.clone(),
                    change_type: ChangeType::Added,
                    before: None,
                    after: Some(note_to_snapshot(note)),
                });
            }
        }
        for note in &before {
            if !after.iter().any(|a| a.id == note.id) {
                note_changes.push(NoteChange {
                    note_id: note.id.clone(),
                    change_type: ChangeType::Removed,
                    before: Some(note_to_snapshot(note)),
                    after: None,
                });
            }
        }
        for before_note in &before {
            if let Some(after_note) = after.iter().find(|a| a.id == before_note.id) {
                if note_to_snapshot(before_note) != note_to_snapshot(after_note) {
                    note_changes.push(NoteChange {
                        note_id: before_note.id.clone(),
                        change_type: ChangeType::Modified,
                        before: Some(note_to_snapshot(before_note)),
                        after: Some(note_to_snapshot(after_note)),
                    });
                }
            }
        }

        let cc_before = ctx
            .base_controller_events
            .get(region_id)
            .cloned()
            .unwrap_or_default();
        let cc_after = ctx
            .proposed_controller_events
            .get(region_id)
            .cloned()
            .unwrap_or_default();
        let controller_changes: Vec<serde_json::Value> = cc_after
            .iter()
            .filter(|event| !cc_before.iter().any(|b| b.id() == event.id()))
            .map(|event| serde_json::to_value(event).unwrap_or(serde_json::Value::Null))
            .collect();

        if note_changes.is_empty() && controller_changes.is_empty() {
            continue;
        }

        sequence += 1;
        let meta = ctx.region_meta.get(region_id);
        let beats: Vec<f64> = after
            .iter()
            .chain(before.iter())
            .flat_map(|n| [n.start_beat, n.start_beat + n.duration_beats])
            .collect();
        let beat_start = beats.iter().cloned().fold(f64::INFINITY, f64::min);
        let beat_end = beats.iter().cloned().fold(f64::NEG_INFINITY, f64::max);

        phrases.push(Phrase {
            phrase_id: uuid::Uuid::new_v4().to_string(),
            sequence,
            track_id: ctx
                .track_of_region
                .get(region_id)
                .cloned()
                .unwrap_or_default(),
            region_id: region_id.clone(),
            beat_start: if beat_start.is_finite() { beat_start } else { 0.0 },
            beat_end: if beat_end.is_finite() { beat_end } else { 0.0 },
            label: format!("edit: {intent}"),
            tags: Vec::new(),
            explanation: Some(intent.to_string()),
            note_changes,
            controller_changes,
            region_start_beat: meta.map(|m| m.start_beat),
            region_duration_beats: meta.map(|m| m.duration_beats),
            region_name: meta.map(|m| m.name.clone()),
        });
    }

    phrases
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock_planner::FixedPlanPlanner;
    use crate::plan::Planner;
    use muse_daw::MockDawAdapter;

    fn note(id: &str, pitch: u8, start: f64) -> Note {
        Note {
            id: id.to_string(),
            pitch,
            start_beat: start,
            duration_beats: 1.0,
            velocity: 100,
            channel: 0,
        }
    }

    #[tokio::test]
    async fn execute_plan_applies_add_notes_to_its_region() {
        let daw = MockDawAdapter::with_default_registry();
        let planner = FixedPlanPlanner::new(vec![crate::plan::ToolCall {
            name: "add_notes".to_string(),
            params: serde_json::json!({
                "region_id": "region-1",
                "notes": [note("n1", 60, 0.0)],
            }),
            instrument_key: Some("drums".to_string()),
        }]);
        let plan = planner
            .plan("add a kick drum note", daw.registry())
            .await
            .unwrap();
        let base = SnapshotBundle {
            state_id: "0".to_string(),
            notes_by_region: HashMap::new(),
            controller_events_by_region: HashMap::new(),
            tempo: 120.0,
            key: "C major".to_string(),
        };
        let ctx = execute_plan(&plan, &daw, &base, HashMap::new(), HashMap::new())
            .await
            .unwrap();
        assert_eq!(ctx.proposed_notes.get("region-1").unwrap().len(), 1);
    }

    #[test]
    fn diff_reports_added_note_as_a_phrase() {
        let mut proposed = HashMap::new();
        proposed.insert("region-1".to_string(), vec![note("n1", 60, 0.0)]);
        let ctx = VariationContext {
            base_notes: HashMap::new(),
            proposed_notes: proposed,
            base_controller_events: HashMap::new(),
            proposed_controller_events: HashMap::new(),
            region_meta: HashMap::new(),
            track_of_region: HashMap::new(),
        };
        let phrases = compute_variation_from_context(&ctx, "add a kick");
        assert_eq!(phrases.len(), 1);
        assert_eq!(phrases[0].note_changes.len(), 1);
        assert_eq!(phrases[0].note_changes[0].change_type, ChangeType::Added);
        assert_eq!(phrases[0].sequence, 2);
    }

    #[test]
    fn diff_reports_removed_and_modified_notes() {
        let mut base_notes = HashMap::new();
        base_notes.insert(
            "region-1".to_string(),
            vec![note("n1", 60, 0.0), note("n2", 62, 1.0)],
        );
        let mut proposed = HashMap::new();
        proposed.insert("region-1".to_string(), vec![note("n1", 64, 0.0)]);
        let ctx = VariationContext {
            base_notes,
            proposed_notes: proposed,
            base_controller_events: HashMap::new(),
            proposed_controller_events: HashMap::new(),
            region_meta: HashMap::new(),
            track_of_region: HashMap::new(),
        };
        let phrases = compute_variation_from_context(&ctx, "thicken the chord");
        assert_eq!(phrases.len(), 1);
        let kinds: Vec<ChangeType> = phrases[0]
            .note_changes
            .iter()
            .map(|c| c.change_type)
            .collect();
        assert!(kinds.contains(&ChangeType::Removed));
        assert!(kinds.contains(&ChangeType::Modified));
    }

    #[tokio::test]
    async fn execute_plan_applies_add_controller_events_to_its_region() {
        let daw = MockDawAdapter::with_default_registry();
        let planner = FixedPlanPlanner::new(vec![crate::plan::ToolCall {
            name: "add_controller_events".to_string(),
            params: serde_json::json!({
                "region_id": "region-1",
                "events": [{
                    "kind": "cc",
                    "id": "cc1",
                    "controller": 11,
                    "value": 100,
                    "beat": 0.5,
                    "channel": 0,
                }],
            }),
            instrument_key: Some("drums".to_string()),
        }]);
        let plan = planner
            .plan("swell the expression pedal", daw.registry())
            .await
            .unwrap();
        let base = SnapshotBundle {
            state_id: "0".to_string(),
            notes_by_region: HashMap::new(),
            controller_events_by_region: HashMap::new(),
            tempo: 120.0,
            key: "C major".to_string(),
        };
        let ctx = execute_plan(&plan, &daw, &base, HashMap::new(), HashMap::new())
            .await
            .unwrap();
        assert_eq!(
            ctx.proposed_controller_events
                .get("region-1")
                .unwrap()
                .len(),
            1
        );
    }

    #[test]
    fn diff_reports_added_controller_event_as_a_phrase() {
        let mut proposed = HashMap::new();
        proposed.insert(
            "region-1".to_string(),
            vec![ControllerEvent::Cc {
                id: "cc1".to_string(),
                controller: 11,
                value: 100,
                beat: 0.5,
                channel: 0,
            }],
        );
        let ctx = VariationContext {
            base_notes: HashMap::new(),
            proposed_notes: HashMap::new(),
            base_controller_events: HashMap::new(),
            proposed_controller_events: proposed,
            region_meta: HashMap::new(),
            track_of_region: HashMap::new(),
        };
        let phrases = compute_variation_from_context(&ctx, "swell the pedal");
        assert_eq!(phrases.len(), 1);
        assert!(phrases[0].note_changes.is_empty());
        assert_eq!(phrases[0].controller_changes.len(), 1);
    }

    #[test]
    fn untouched_regions_produce_no_phrase() {
        let mut base_notes = HashMap::new();
        base_notes.insert("region-1".to_string(), vec![note("n1", 60, 0.0)]);
        let ctx = VariationContext {
            base_notes: base_notes.clone(),
            proposed_notes: base_notes,
            base_controller_events: HashMap::new(),
            proposed_controller_events: HashMap::new(),
            region_meta: HashMap::new(),
            track_of_region: HashMap::new(),
        };
        assert!(compute_variation_from_context(&ctx, "no-op").is_empty());
    }
}
