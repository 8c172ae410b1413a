// SPDX-License-Identifier: MIT OR Apache-2.0
//! The Variation Protocol's HTTP surface: propose, stream, inspect,
//! commit, and discard.

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use axum::extract::{Path, Query, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use axum::Json;
use chrono::{DateTime, Utc};
use muse_core::Phrase;
use muse_error::{ErrorCode, MuseError};
use muse_registry::EntityRegistry;
use muse_variation::{
    discard as discard_variation, propose as propose_variation, CancellableRun, CancellationToken,
    GenerationInputs, RegionMeta, VariationStatus,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::{Stream, StreamExt};
use uuid::Uuid;

/// `POST /api/v1/variation/propose` request body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposeRequest {
    project_id: String,
    base_state_id: String,
    intent: String,
    conversation_id: Uuid,
    /// Client-reported project state (tracks/regions with their IDs and
    /// spans), used to refresh the server's entity registry before
    /// generation. Optional: a client that hasn't changed its project
    /// structure since the last propose can omit it and reuse whatever the
    /// registry already has on file.
    #[serde(default)]
    project_snapshot: Option<serde_json::Value>,
}

/// `POST /api/v1/variation/propose` response body.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposeResponse {
    variation_id: Uuid,
    stream_url: String,
}

/// Validate the baseline, register the variation, and spawn its
/// generation in the background. Returns as soon as the record exists;
/// the client watches progress over `stream_url`.
pub async fn propose(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ProposeRequest>,
) -> ApiResult<Json<ProposeResponse>> {
    let outcome = {
        let mut stores = state.state_stores.write().await;
        let store = stores.get_or_create(req.conversation_id);
        let mut variations = state.variations.lock().await;
        propose_variation(
            store,
            &mut variations,
            &req.project_id,
            &req.base_state_id,
            &req.intent,
            &req.conversation_id.to_string(),
        )?
    };

    let base_snapshot = {
        let stores = state.state_stores.read().await;
        stores
            .get(&req.conversation_id.to_string())
            .expect("just created above")
            .capture_snapshot()
    };

    let (region_meta, track_of_region) = {
        let mut registries = state.registries.write().await;
        let registry = registries.get_or_create(&req.project_id);
        if let Some(snapshot) = &req.project_snapshot {
            registry.sync_from_client(snapshot);
        }
        region_metadata_from_registry(registry, &base_snapshot)
    };

    let run = CancellableRun::new(CancellationToken::new());
    state.runs.lock().await.insert(outcome.variation_id, run.clone());

    let spawn_state = Arc::clone(&state);
    let variation_id = outcome.variation_id;
    tokio::spawn(async move {
        let inputs = GenerationInputs {
            daw: &*spawn_state.daw,
            planner: &*spawn_state.planner,
            base_snapshot,
            region_meta,
            track_of_region,
            run,
        };
        muse_variation::run_generation(
            variation_id,
            &spawn_state.variations,
            &spawn_state.broadcaster,
            inputs,
        )
        .await;
        spawn_state.runs.lock().await.remove(&variation_id);
    });

    Ok(Json(ProposeResponse {
        variation_id: outcome.variation_id,
        stream_url: outcome.stream_url,
    }))
}

/// Derive region metadata for every region the snapshot touches, preferring
/// the entity registry's record (span, name, parent track) when the region
/// is registered. A region the registry doesn't know about — most often
/// because the client never sent a `projectSnapshot` — falls back to a
/// synthetic single-track group so generation can still proceed.
fn region_metadata_from_registry(
    registry: &EntityRegistry,
    snapshot: &muse_statestore::SnapshotBundle,
) -> (HashMap<String, RegionMeta>, HashMap<String, String>) {
    let mut region_meta = HashMap::new();
    let mut track_of_region = HashMap::new();

    for region_id in snapshot.notes_by_region.keys() {
        let registered = Uuid::parse_str(region_id).ok().and_then(|id| registry.get_region(id));

        match registered {
            Some(entity) => {
                let track_id = entity
                    .parent_id
                    .map(|id| id.to_string())
                    .unwrap_or_else(|| region_id.clone());
                region_meta.insert(
                    region_id.clone(),
                    RegionMeta {
                        start_beat: entity.start_beat.unwrap_or(0.0),
                        duration_beats: entity.duration_beats.unwrap_or(4.0),
                        name: entity.name.clone(),
                    },
                );
                track_of_region.insert(region_id.clone(), track_id);
            }
            None => {
                region_meta.insert(
                    region_id.clone(),
                    RegionMeta {
                        start_beat: 0.0,
                        duration_beats: 4.0,
                        name: region_id.clone(),
                    },
                );
                track_of_region.insert(region_id.clone(), region_id.clone());
            }
        }
    }

    (region_meta, track_of_region)
}

/// `GET /api/v1/variation/stream` query parameters.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamQuery {
    variation_id: Uuid,
    #[serde(default)]
    from_sequence: u64,
}

/// Stream a variation's events as Server-Sent Events, replaying any
/// buffered history with a sequence greater than `from_sequence`.
pub async fn stream(
    State(state): State<Arc<AppState>>,
    Query(query): Query<StreamQuery>,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    {
        let variations = state.variations.lock().await;
        variations.get_or_raise(query.variation_id)?;
    }

    let rx = state
        .broadcaster
        .subscribe(&query.variation_id.to_string(), query.from_sequence)
        .await;

    let events = ReceiverStream::new(rx).map(|envelope| {
        let data = envelope.to_sse_data().unwrap_or_else(|_| "{}".to_string());
        Ok(Event::default()
            .event(envelope.event_name())
            .id(envelope.sequence.to_string())
            .data(data))
    });

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

/// Wire shape for `GET /api/v1/variation/{variationId}`.
///
/// [`muse_variation::VariationRecord`] isn't itself serializable — its
/// phrase vector and status enum are built for in-process use, not wire
/// transport — so this DTO copies out exactly what a client needs.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VariationRecordDto {
    variation_id: Uuid,
    project_id: String,
    base_state_id: String,
    intent: String,
    status: VariationStatus,
    ai_explanation: Option<String>,
    affected_tracks: Vec<String>,
    affected_regions: Vec<String>,
    phrases: Vec<Phrase>,
    error_message: Option<String>,
    conversation_id: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Fetch a variation's current record, including every phrase emitted so far.
pub async fn get_variation(
    State(state): State<Arc<AppState>>,
    Path(variation_id): Path<Uuid>,
) -> ApiResult<Json<VariationRecordDto>> {
    let variations = state.variations.lock().await;
    let record = variations.get_or_raise(variation_id)?;
    Ok(Json(VariationRecordDto {
        variation_id: record.variation_id,
        project_id: record.project_id.clone(),
        base_state_id: record.base_state_id.clone(),
        intent: record.intent.clone(),
        status: record.status,
        ai_explanation: record.ai_explanation.clone(),
        affected_tracks: record.affected_tracks.clone(),
        affected_regions: record.affected_regions.clone(),
        phrases: record.phrases.clone(),
        error_message: record.error_message.clone(),
        conversation_id: record.conversation_id.clone(),
        created_at: record.created_at,
        updated_at: record.updated_at,
    }))
}

/// `POST /api/v1/variation/commit` request body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitRequest {
    variation_id: Uuid,
    conversation_id: Uuid,
    base_state_id: String,
    accepted_phrase_ids: Vec<String>,
}

/// One region's post-commit payload, as returned to the client.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatedRegionDto {
    region_id: String,
    track_id: String,
    notes: Vec<muse_statestore::Note>,
    cc_events: Vec<muse_statestore::ControllerEvent>,
    pitch_bends: Vec<muse_statestore::ControllerEvent>,
    aftertouch: Vec<muse_statestore::ControllerEvent>,
    start_beat: Option<f64>,
    duration_beats: Option<f64>,
    name: Option<String>,
}

/// `POST /api/v1/variation/commit` response body.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitResponse {
    new_state_id: String,
    applied_phrase_ids: Vec<String>,
    updated_regions: Vec<UpdatedRegionDto>,
}

/// Accept some or all of a ready variation's phrases into the conversation's
/// canonical state.
pub async fn commit(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CommitRequest>,
) -> ApiResult<Json<CommitResponse>> {
    let mut variations = state.variations.lock().await;
    let mut stores = state.state_stores.write().await;
    let store = stores
        .get_mut(&req.conversation_id.to_string())
        .ok_or_else(|| MuseError::new(ErrorCode::EntityNotFound, "unknown conversation"))?;

    let outcome = muse_variation::commit(
        &mut variations,
        store,
        req.variation_id,
        &req.base_state_id,
        &req.accepted_phrase_ids,
    )?;

    Ok(Json(CommitResponse {
        new_state_id: outcome.new_state_id,
        applied_phrase_ids: outcome.applied_phrase_ids,
        updated_regions: outcome
            .updated_regions
            .into_iter()
            .map(|r| UpdatedRegionDto {
                region_id: r.region_id,
                track_id: r.track_id,
                notes: r.notes,
                cc_events: r.cc_events,
                pitch_bends: r.pitch_bends,
                aftertouch: r.aftertouch,
                start_beat: r.start_beat,
                duration_beats: r.duration_beats,
                name: r.name,
            })
            .collect(),
    }))
}

/// `POST /api/v1/variation/discard` request body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscardRequest {
    variation_id: Uuid,
}

/// Discard a variation, cancelling its background generation if one is
/// still in flight. Idempotent.
pub async fn discard(
    State(state): State<Arc<AppState>>,
    Json(req): Json<DiscardRequest>,
) -> ApiResult<impl IntoResponse> {
    let run = state.runs.lock().await.get(&req.variation_id).cloned();
    let mut variations = state.variations.lock().await;
    discard_variation(&mut variations, req.variation_id, run.as_ref())?;
    Ok(axum::http::StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::AppState;
    use axum::routing::{get, post};
    use axum::Router;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn router() -> Router {
        let state = Arc::new(AppState::new_with_mocks("test-secret"));
        Router::new()
            .route("/api/v1/variation/propose", post(propose))
            .route("/api/v1/variation/stream", get(stream))
            .route("/api/v1/variation/{variation_id}", get(get_variation))
            .route("/api/v1/variation/commit", post(commit))
            .route("/api/v1/variation/discard", post(discard))
            .with_state(state)
    }

    #[tokio::test]
    async fn propose_then_get_round_trips_through_http() {
        let app = router();
        let conversation_id = Uuid::new_v4();
        let body = serde_json::json!({
            "projectId": "proj-1",
            "baseStateId": "0",
            "intent": "add syncopated hats",
            "conversationId": conversation_id,
        });

        let response = app
            .clone()
            .oneshot(
                axum::http::Request::builder()
                    .method("POST")
                    .uri("/api/v1/variation/propose")
                    .header("content-type", "application/json")
                    .body(axum::body::Body::from(serde_json::to_vec(&body).unwrap()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), axum::http::StatusCode::OK);

        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let parsed: ProposeResponse = serde_json::from_slice(&bytes).unwrap();

        let get_response = app
            .oneshot(
                axum::http::Request::builder()
                    .method("GET")
                    .uri(format!("/api/v1/variation/{}", parsed.variation_id))
                    .body(axum::body::Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(get_response.status(), axum::http::StatusCode::OK);
    }

    #[tokio::test]
    async fn propose_rejects_stale_baseline_with_409() {
        let app = router();
        let body = serde_json::json!({
            "projectId": "proj-1",
            "baseStateId": "not-the-current-state",
            "intent": "add drums",
            "conversationId": Uuid::new_v4(),
        });

        let response = app
            .oneshot(
                axum::http::Request::builder()
                    .method("POST")
                    .uri("/api/v1/variation/propose")
                    .header("content-type", "application/json")
                    .body(axum::body::Body::from(serde_json::to_vec(&body).unwrap()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), axum::http::StatusCode::CONFLICT);
    }

    #[test]
    fn region_metadata_prefers_registry_over_synthetic_fallback() {
        let mut registry = EntityRegistry::new(Uuid::new_v4());
        let track_id = registry.create_track("Drums");
        let region_id = registry.create_region("Verse", track_id, 8.0, 4.0).unwrap();

        let mut notes_by_region = HashMap::new();
        notes_by_region.insert(region_id.to_string(), Vec::new());
        let snapshot = muse_statestore::SnapshotBundle {
            state_id: "0".to_string(),
            notes_by_region,
            controller_events_by_region: HashMap::new(),
            tempo: 120.0,
            key: "C".to_string(),
        };

        let (region_meta, track_of_region) = region_metadata_from_registry(&registry, &snapshot);

        let meta = &region_meta[&region_id.to_string()];
        assert_eq!(meta.start_beat, 8.0);
        assert_eq!(meta.duration_beats, 4.0);
        assert_eq!(meta.name, "Verse");
        assert_eq!(track_of_region[&region_id.to_string()], track_id.to_string());
    }

    #[test]
    fn region_metadata_falls_back_when_region_unregistered() {
        let registry = EntityRegistry::new(Uuid::new_v4());
        let mut notes_by_region = HashMap::new();
        notes_by_region.insert("unregistered-region".to_string(), Vec::new());
        let snapshot = muse_statestore::SnapshotBundle {
            state_id: "0".to_string(),
            notes_by_region,
            controller_events_by_region: HashMap::new(),
            tempo: 120.0,
            key: "C".to_string(),
        };

        let (region_meta, track_of_region) = region_metadata_from_registry(&registry, &snapshot);

        let meta = &region_meta["unregistered-region"];
        assert_eq!(meta.duration_beats, 4.0);
        assert_eq!(track_of_region["unregistered-region"], "unregistered-region");
    }

    #[tokio::test]
    async fn discard_unknown_variation_is_a_no_op_success() {
        let app = router();
        let body = serde_json::json!({ "variationId": Uuid::new_v4() });
        let response = app
            .oneshot(
                axum::http::Request::builder()
                    .method("POST")
                    .uri("/api/v1/variation/discard")
                    .header("content-type", "application/json")
                    .body(axum::body::Body::from(serde_json::to_vec(&body).unwrap()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), axum::http::StatusCode::NO_CONTENT);
    }
}
