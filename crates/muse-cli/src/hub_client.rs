// SPDX-License-Identifier: MIT OR Apache-2.0
//! Thin `reqwest` client for a Muse Hub daemon's repo sync endpoints.
//!
//! Security note: never log `token` in raw form. Every log line this
//! module emits references the token, if at all, as the literal string
//! `"Bearer ***"`.

use muse_core::{Commit, Object, Repo};
use serde::{Deserialize, Serialize};

/// A Muse Hub HTTP client scoped to one repo's base URL, e.g.
/// `http://localhost:8420/api/v1/musehub/repos/<repo_id>`.
pub struct HubClient {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl HubClient {
    #[must_use]
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            token,
        }
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{path}", self.base_url.trim_end_matches('/'));
        let mut req = self.client.request(method, url);
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }
        req
    }

    pub async fn get_repo(&self) -> anyhow::Result<Repo> {
        let resp = self.request(reqwest::Method::GET, "").send().await?;
        unwrap_json(resp).await
    }

    pub async fn push(&self, req: PushBody) -> anyhow::Result<PushResponse> {
        let resp = self.request(reqwest::Method::POST, "/push").json(&req).send().await?;
        unwrap_json(resp).await
    }

    pub async fn pull(&self, req: PullBody) -> anyhow::Result<PullResponse> {
        let resp = self.request(reqwest::Method::POST, "/pull").json(&req).send().await?;
        unwrap_json(resp).await
    }

    pub async fn fetch(&self, branches: &[String]) -> anyhow::Result<Vec<FetchEntry>> {
        let path = if branches.is_empty() {
            "/fetch".to_string()
        } else {
            format!("/fetch?branch={}", branches.join(","))
        };
        let resp = self.request(reqwest::Method::GET, &path).send().await?;
        unwrap_json(resp).await
    }

    pub async fn clone_repo(&self, req: CloneBody) -> anyhow::Result<CloneResponse> {
        let resp = self.request(reqwest::Method::POST, "/clone").json(&req).send().await?;
        unwrap_json(resp).await
    }
}

async fn unwrap_json<T: for<'de> Deserialize<'de>>(resp: reqwest::Response) -> anyhow::Result<T> {
    let status = resp.status();
    let bytes = resp.bytes().await?;
    if !status.is_success() {
        let body = String::from_utf8_lossy(&bytes);
        anyhow::bail!("Hub request failed with {status}: {body}");
    }
    serde_json::from_slice(&bytes)
        .map_err(|e| anyhow::anyhow!("failed to parse Hub response: {e}"))
}

#[derive(Debug, Clone, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct PushBody {
    pub branch: String,
    pub head_commit_id: String,
    #[serde(default)]
    pub commits: Vec<Commit>,
    #[serde(default)]
    pub objects: Vec<Object>,
    #[serde(default)]
    pub force: bool,
    #[serde(default)]
    pub force_with_lease: bool,
    #[serde(default)]
    pub expected_remote_head: Option<String>,
    #[serde(default)]
    pub tags: Vec<(String, String)>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushResponse {
    pub branch: String,
    pub new_head: String,
    pub fast_forward: bool,
}

#[derive(Debug, Clone, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct PullBody {
    pub branch: String,
    #[serde(default)]
    pub have_commits: Vec<String>,
    #[serde(default)]
    pub have_objects: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PullResponse {
    pub commits: Vec<Commit>,
    pub objects: Vec<Object>,
    pub remote_head: String,
    pub diverged: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchEntry {
    pub branch: String,
    pub head_commit_id: String,
    #[serde(default)]
    pub is_new: bool,
}

#[derive(Debug, Clone, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct CloneBody {
    #[serde(default)]
    pub branch: Option<String>,
    #[serde(default)]
    pub depth: Option<u32>,
    #[serde(default)]
    pub single_track: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloneResponse {
    pub repo_id: String,
    pub default_branch: String,
    pub remote_head: String,
    pub commits: Vec<Commit>,
    pub objects: Vec<Object>,
}
