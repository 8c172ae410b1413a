// SPDX-License-Identifier: MIT OR Apache-2.0
//! The `muse-daemon` HTTP control plane: Maestro's Variation Protocol and
//! Muse Hub's VCS surface, served from a single Axum [`Router`].

pub mod auth;
pub mod error;
pub mod middleware;
pub mod state;
pub mod variation_routes;
pub mod vcs_routes;

use axum::middleware::{from_fn, from_fn_with_state};
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use std::time::Duration;

pub use state::AppState;

/// Assembles the full daemon router: Variation Protocol routes, Muse Hub
/// routes, and the health check, layered with request-id tagging, access
/// logging, mixed JWT auth, a rate limiter, and CORS.
///
/// Each `.layer()` call wraps the router built so far, so the *last*
/// layer added is the *outermost* one a request passes through. CORS
/// goes last so preflight `OPTIONS` requests are answered before they
/// ever reach the auth layer; request-id goes next so every response,
/// including ones auth rejects, carries an `X-Request-Id` and a log line.
#[must_use]
pub fn build_app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(vcs_routes::health))
        .route("/api/v1/variation/propose", post(variation_routes::propose))
        .route("/api/v1/variation/stream", get(variation_routes::stream))
        .route(
            "/api/v1/variation/{variation_id}",
            get(variation_routes::get_variation),
        )
        .route("/api/v1/variation/commit", post(variation_routes::commit))
        .route("/api/v1/variation/discard", post(variation_routes::discard))
        .route(
            "/api/v1/musehub/repos",
            post(vcs_routes::create_repo),
        )
        .route(
            "/api/v1/musehub/repos/{repo_id}",
            get(vcs_routes::get_repo),
        )
        .route(
            "/api/v1/musehub/repos/{repo_id}/branches",
            get(vcs_routes::list_branches),
        )
        .route(
            "/api/v1/musehub/repos/{repo_id}/push",
            post(vcs_routes::push_branch),
        )
        .route(
            "/api/v1/musehub/repos/{repo_id}/pull",
            post(vcs_routes::pull_branch),
        )
        .route(
            "/api/v1/musehub/repos/{repo_id}/fetch",
            get(vcs_routes::fetch_branches),
        )
        .route(
            "/api/v1/musehub/repos/{repo_id}/clone",
            post(vcs_routes::clone_branch),
        )
        .route(
            "/api/v1/musehub/repos/{repo_id}/pull-requests",
            post(vcs_routes::create_pull_request).get(vcs_routes::list_pull_requests),
        )
        .route(
            "/api/v1/musehub/repos/{repo_id}/pull-requests/{pr_id}",
            get(vcs_routes::get_pull_request),
        )
        .route(
            "/api/v1/musehub/repos/{repo_id}/pull-requests/{pr_id}/merge",
            post(vcs_routes::merge_pull_request),
        )
        .route(
            "/api/v1/musehub/repos/{repo_id}/pull-requests/{pr_id}/close",
            post(vcs_routes::close_pull_request),
        )
        .layer(middleware::RateLimiter::new(600, Duration::from_secs(60)).into_layer())
        .layer(from_fn_with_state(state.clone(), auth::auth_middleware))
        .layer(from_fn(middleware::request_logger))
        .layer(from_fn(middleware::request_id_middleware))
        .layer(middleware::CorsConfig::permissive().to_cors_layer())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    #[tokio::test]
    async fn health_check_responds_ok() {
        let state = Arc::new(AppState::new_with_mocks("test-secret"));
        let app = build_app(state);

        let response = app
            .oneshot(
                axum::http::Request::builder()
                    .uri("/health")
                    .body(axum::body::Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), axum::http::StatusCode::OK);

        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn unauthenticated_write_is_rejected() {
        let state = Arc::new(AppState::new_with_mocks("test-secret"));
        let app = build_app(state);

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
        assert_eq!(response.status(), axum::http::StatusCode::UNAUTHORIZED);
    }
}
