// SPDX-License-Identifier: MIT OR Apache-2.0
//! Muse Hub HTTP surface: repos, branches, the push/pull/fetch/clone
//! sync protocol, and pull requests.
//!
//! Most routes require a Bearer token; reads of a public repo do not. Each
//! handler below decides that for itself via [`require_claims`] after
//! checking the repo's [`Visibility`].

use crate::auth::{require_claims, Claims};
use crate::error::ApiResult;
use crate::state::AppState;
use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use muse_core::{Commit, Object, PrState, PullRequest, Repo, Visibility};
use muse_error::{ErrorCode, MuseError};
use muse_vcs::{
    clone_repo, fetch, pull, push, CloneRequest, FetchEntry, PullOutcome, PullRequestBody,
    PushOutcome, PushRequest,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

fn claims_ref(claims: &Option<Extension<Claims>>) -> Option<&Claims> {
    claims.as_ref().map(|Extension(c)| c)
}

fn authorize_read(claims: Option<&Claims>, repo: &Repo) -> Result<(), MuseError> {
    if repo.visibility == Visibility::Public {
        return Ok(());
    }
    require_claims(claims).map(|_| ())
}

/// `POST /api/v1/musehub/repos` request body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRepoRequest {
    owner: String,
    name: String,
    #[serde(default)]
    visibility: Option<Visibility>,
}

/// Create a new repo. Always requires a valid token.
pub async fn create_repo(
    State(state): State<Arc<AppState>>,
    claims: Option<Extension<Claims>>,
    Json(req): Json<CreateRepoRequest>,
) -> ApiResult<Json<Repo>> {
    require_claims(claims_ref(&claims))?;
    let mut vcs = state.vcs.write().await;
    let repo = vcs.create_repo(req.owner, req.name, req.visibility.unwrap_or(Visibility::Private));
    Ok(Json(repo))
}

/// Fetch a repo's metadata. Public repos are readable without a token.
pub async fn get_repo(
    State(state): State<Arc<AppState>>,
    claims: Option<Extension<Claims>>,
    Path(repo_id): Path<String>,
) -> ApiResult<Json<Repo>> {
    let vcs = state.vcs.read().await;
    let repo = vcs.get_repo(&repo_id)?;
    authorize_read(claims_ref(&claims), repo)?;
    Ok(Json(repo.clone()))
}

/// List a repo's branches.
pub async fn list_branches(
    State(state): State<Arc<AppState>>,
    claims: Option<Extension<Claims>>,
    Path(repo_id): Path<String>,
) -> ApiResult<Json<Vec<muse_core::Branch>>> {
    let vcs = state.vcs.read().await;
    let repo = vcs.get_repo(&repo_id)?;
    authorize_read(claims_ref(&claims), repo)?;
    let branches = vcs.list_branches(&repo_id)?.into_iter().cloned().collect();
    Ok(Json(branches))
}

/// `POST /api/v1/musehub/repos/{repo_id}/push` request body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushBody {
    branch: String,
    head_commit_id: String,
    #[serde(default)]
    commits: Vec<Commit>,
    #[serde(default)]
    objects: Vec<Object>,
    #[serde(default)]
    force: bool,
    #[serde(default)]
    force_with_lease: bool,
    #[serde(default)]
    expected_remote_head: Option<String>,
    #[serde(default)]
    tags: Vec<(String, String)>,
}

/// `POST /api/v1/musehub/repos/{repo_id}/push` response body.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PushResponse {
    branch: String,
    new_head: String,
    fast_forward: bool,
}

impl From<PushOutcome> for PushResponse {
    fn from(outcome: PushOutcome) -> Self {
        Self {
            branch: outcome.branch,
            new_head: outcome.new_head,
            fast_forward: outcome.fast_forward,
        }
    }
}

/// Push new commits/objects and advance a branch. Always requires a token.
pub async fn push_branch(
    State(state): State<Arc<AppState>>,
    claims: Option<Extension<Claims>>,
    Path(repo_id): Path<String>,
    Json(body): Json<PushBody>,
) -> ApiResult<Json<PushResponse>> {
    require_claims(claims_ref(&claims))?;
    let mut vcs = state.vcs.write().await;
    let outcome = push(
        &mut vcs,
        &repo_id,
        PushRequest {
            branch: body.branch,
            head_commit_id: body.head_commit_id,
            commits: body.commits,
            objects: body.objects,
            force: body.force,
            force_with_lease: body.force_with_lease,
            expected_remote_head: body.expected_remote_head,
            tags: body.tags,
        },
    )?;
    Ok(Json(outcome.into()))
}

/// `POST /api/v1/musehub/repos/{repo_id}/pull` request body.
#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct PullBody {
    branch: String,
    #[serde(default)]
    have_commits: Vec<String>,
    #[serde(default)]
    have_objects: Vec<String>,
}

/// `POST /api/v1/musehub/repos/{repo_id}/pull` response body.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PullResponse {
    commits: Vec<Commit>,
    objects: Vec<Object>,
    remote_head: String,
    diverged: bool,
}

impl From<PullOutcome> for PullResponse {
    fn from(outcome: PullOutcome) -> Self {
        Self {
            commits: outcome.commits,
            objects: outcome.objects,
            remote_head: outcome.remote_head,
            diverged: outcome.diverged,
        }
    }
}

/// Pull the commits/objects a client is missing for a branch.
pub async fn pull_branch(
    State(state): State<Arc<AppState>>,
    claims: Option<Extension<Claims>>,
    Path(repo_id): Path<String>,
    Json(body): Json<PullBody>,
) -> ApiResult<Json<PullResponse>> {
    let vcs = state.vcs.read().await;
    let repo = vcs.get_repo(&repo_id)?;
    authorize_read(claims_ref(&claims), repo)?;
    let outcome = pull(
        &vcs,
        &repo_id,
        &PullRequestBody {
            branch: body.branch,
            have_commits: body.have_commits,
            have_objects: body.have_objects,
        },
    )?;
    Ok(Json(outcome.into()))
}

/// `GET /api/v1/musehub/repos/{repo_id}/fetch` query parameters.
///
/// `branch` is a comma-separated list rather than a repeated query key —
/// `serde_urlencoded` (what Axum's `Query` extractor uses) has no way to
/// collect a repeated key into a `Vec`, so this is the wire-friendly
/// equivalent. An absent or empty value means "all branches".
#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct FetchQuery {
    #[serde(default)]
    branch: Option<String>,
}

impl FetchQuery {
    fn branches(&self) -> Vec<String> {
        self.branch
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }
}

/// Wire shape for [`FetchEntry`], which carries no serde derives of its
/// own since `muse-vcs` is a pure domain crate.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchEntryDto {
    branch: String,
    head_commit_id: String,
    is_new: bool,
}

impl From<FetchEntry> for FetchEntryDto {
    fn from(entry: FetchEntry) -> Self {
        Self {
            branch: entry.branch,
            head_commit_id: entry.head_commit_id,
            is_new: entry.is_new,
        }
    }
}

/// Report head pointers for the requested branches (or all of them).
pub async fn fetch_branches(
    State(state): State<Arc<AppState>>,
    claims: Option<Extension<Claims>>,
    Path(repo_id): Path<String>,
    Query(query): Query<FetchQuery>,
) -> ApiResult<Json<Vec<FetchEntryDto>>> {
    let vcs = state.vcs.read().await;
    let repo = vcs.get_repo(&repo_id)?;
    authorize_read(claims_ref(&claims), repo)?;
    let entries = fetch(&vcs, &repo_id, &query.branches())?;
    Ok(Json(entries.into_iter().map(FetchEntryDto::from).collect()))
}

/// `POST /api/v1/musehub/repos/{repo_id}/clone` request body.
#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct CloneBody {
    #[serde(default)]
    branch: Option<String>,
    #[serde(default)]
    depth: Option<u32>,
    #[serde(default)]
    single_track: Option<String>,
}

/// `POST /api/v1/musehub/repos/{repo_id}/clone` response body.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CloneResponse {
    repo_id: String,
    default_branch: String,
    remote_head: String,
    commits: Vec<Commit>,
    objects: Vec<Object>,
}

/// Clone a repo's branch history (optionally depth- or track-limited).
pub async fn clone_branch(
    State(state): State<Arc<AppState>>,
    claims: Option<Extension<Claims>>,
    Path(repo_id): Path<String>,
    Json(body): Json<CloneBody>,
) -> ApiResult<Json<CloneResponse>> {
    let vcs = state.vcs.read().await;
    let repo = vcs.get_repo(&repo_id)?;
    authorize_read(claims_ref(&claims), repo)?;
    let outcome = clone_repo(
        &vcs,
        &repo_id,
        &CloneRequest {
            branch: body.branch,
            depth: body.depth,
            single_track: body.single_track,
        },
    )?;
    Ok(Json(CloneResponse {
        repo_id: outcome.repo_id,
        default_branch: outcome.default_branch,
        remote_head: outcome.remote_head,
        commits: outcome.commits,
        objects: outcome.objects,
    }))
}

/// `POST /api/v1/repos/{repo_id}/pull-requests` request body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePullRequestBody {
    title: String,
    from_branch: String,
    to_branch: String,
    #[serde(default)]
    description: Option<String>,
}

/// Open a new pull request against a repo.
pub async fn create_pull_request(
    State(state): State<Arc<AppState>>,
    claims: Option<Extension<Claims>>,
    Path(repo_id): Path<String>,
    Json(body): Json<CreatePullRequestBody>,
) -> ApiResult<Json<PullRequest>> {
    let claims = require_claims(claims_ref(&claims))?;
    let vcs = state.vcs.read().await;
    let mut prs = state.pull_requests.write().await;
    let pr = prs.create(
        &vcs,
        &repo_id,
        body.title,
        body.from_branch,
        body.to_branch,
        claims.sub.clone(),
        body.description,
    )?;
    Ok(Json(pr))
}

/// `GET /api/v1/repos/{repo_id}/pull-requests` query parameters.
#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ListPullRequestsQuery {
    state: Option<PrState>,
}

/// List a repo's pull requests, oldest first, optionally filtered by state.
pub async fn list_pull_requests(
    State(state): State<Arc<AppState>>,
    claims: Option<Extension<Claims>>,
    Path(repo_id): Path<String>,
    Query(query): Query<ListPullRequestsQuery>,
) -> ApiResult<Json<Vec<PullRequest>>> {
    let vcs = state.vcs.read().await;
    let repo = vcs.get_repo(&repo_id)?;
    authorize_read(claims_ref(&claims), repo)?;
    let prs = state.pull_requests.read().await;
    Ok(Json(
        prs.list(&repo_id, query.state).into_iter().cloned().collect(),
    ))
}

/// Fetch a single pull request by ID.
pub async fn get_pull_request(
    State(state): State<Arc<AppState>>,
    claims: Option<Extension<Claims>>,
    Path((repo_id, pr_id)): Path<(String, String)>,
) -> ApiResult<Json<PullRequest>> {
    let vcs = state.vcs.read().await;
    let repo = vcs.get_repo(&repo_id)?;
    authorize_read(claims_ref(&claims), repo)?;
    let prs = state.pull_requests.read().await;
    let pr = prs
        .get(&pr_id)
        .ok_or_else(|| MuseError::new(ErrorCode::PullRequestNotFound, format!("no PR {pr_id}")))?;
    Ok(Json(pr.clone()))
}

/// Merge an open pull request via the `merge_commit` strategy.
pub async fn merge_pull_request(
    State(state): State<Arc<AppState>>,
    claims: Option<Extension<Claims>>,
    Path((_repo_id, pr_id)): Path<(String, String)>,
) -> ApiResult<Json<Commit>> {
    let claims = require_claims(claims_ref(&claims))?;
    let mut vcs = state.vcs.write().await;
    let mut prs = state.pull_requests.write().await;
    let commit = prs.merge(&mut vcs, &pr_id, claims.sub.clone())?;
    Ok(Json(commit))
}

/// Close an open pull request without merging it.
pub async fn close_pull_request(
    State(state): State<Arc<AppState>>,
    claims: Option<Extension<Claims>>,
    Path((_repo_id, pr_id)): Path<(String, String)>,
) -> ApiResult<StatusCode> {
    require_claims(claims_ref(&claims))?;
    let mut prs = state.pull_requests.write().await;
    prs.close(&pr_id)?;
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /health` liveness probe.
pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::auth_middleware;
    use crate::state::AppState;
    use axum::middleware::from_fn_with_state;
    use axum::routing::{get, post};
    use axum::Router;
    use http_body_util::BodyExt;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use tower::ServiceExt;

    fn router() -> (Router, Arc<AppState>) {
        let state = Arc::new(AppState::new_with_mocks("test-secret"));
        let app = Router::new()
            .route("/api/v1/musehub/repos", post(create_repo))
            .route("/api/v1/musehub/repos/{repo_id}", get(get_repo))
            .route(
                "/api/v1/musehub/repos/{repo_id}/push",
                post(push_branch),
            )
            .route(
                "/api/v1/repos/{repo_id}/pull-requests",
                post(create_pull_request).get(list_pull_requests),
            )
            .route(
                "/api/v1/repos/{repo_id}/pull-requests/{pr_id}/merge",
                post(merge_pull_request),
            )
            .layer(from_fn_with_state(state.clone(), auth_middleware))
            .with_state(state.clone());
        (app, state)
    }

    fn bearer(secret: &str) -> String {
        let token = encode(
            &Header::default(),
            &Claims { sub: "alice".to_string(), exp: 9_999_999_999 },
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap();
        format!("Bearer {token}")
    }

    #[tokio::test]
    async fn create_repo_without_token_is_rejected() {
        let (app, _) = router();
        let body = serde_json::json!({ "owner": "alice", "name": "demo" });
        let response = app
            .oneshot(
                axum::http::Request::builder()
                    .method("POST")
                    .uri("/api/v1/musehub/repos")
                    .header("content-type", "application/json")
                    .body(axum::body::Body::from(serde_json::to_vec(&body).unwrap()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn get_private_repo_without_token_is_rejected() {
        let (app, _) = router();
        let body = serde_json::json!({ "owner": "alice", "name": "demo" });
        let response = app
            .clone()
            .oneshot(
                axum::http::Request::builder()
                    .method("POST")
                    .uri("/api/v1/musehub/repos")
                    .header("authorization", bearer("test-secret"))
                    .header("content-type", "application/json")
                    .body(axum::body::Body::from(serde_json::to_vec(&body).unwrap()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let repo: Repo = serde_json::from_slice(&bytes).unwrap();

        let get_response = app
            .oneshot(
                axum::http::Request::builder()
                    .method("GET")
                    .uri(format!("/api/v1/musehub/repos/{}", repo.id))
                    .body(axum::body::Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(get_response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn get_public_repo_without_token_succeeds() {
        let (app, _) = router();
        let body = serde_json::json!({ "owner": "alice", "name": "demo", "visibility": "public" });
        let response = app
            .clone()
            .oneshot(
                axum::http::Request::builder()
                    .method("POST")
                    .uri("/api/v1/musehub/repos")
                    .header("authorization", bearer("test-secret"))
                    .header("content-type", "application/json")
                    .body(axum::body::Body::from(serde_json::to_vec(&body).unwrap()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let repo: Repo = serde_json::from_slice(&bytes).unwrap();

        let get_response = app
            .oneshot(
                axum::http::Request::builder()
                    .method("GET")
                    .uri(format!("/api/v1/musehub/repos/{}", repo.id))
                    .body(axum::body::Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(get_response.status(), StatusCode::OK);
    }
}
