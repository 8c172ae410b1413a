// SPDX-License-Identifier: MIT OR Apache-2.0
//! Content-addressed object model for the Muse Hub VCS core.
//!
//! Mirrors Git's shape (repo/branch/commit/object/PR) but the payload a
//! commit points at is a musical project snapshot rather than a tree of
//! files. Commit and object IDs are `sha256_hex` digests of their
//! canonical JSON form, computed by `muse-vcs`; this crate only defines
//! the shapes being hashed.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Whether a repo is visible to other accounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    /// Only the owner (and explicit collaborators) can read the repo.
    Private,
    /// Anyone can read the repo.
    Public,
}

/// A Muse Hub repository: a named collection of branches sharing one
/// content-addressed object store.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Repo {
    /// Server-issued unique identifier.
    pub id: String,
    /// Owning account's handle.
    pub owner: String,
    /// Repo name, unique within `owner`.
    pub name: String,
    /// Read visibility.
    pub visibility: Visibility,
    /// Name of the branch `HEAD` points to by default (usually `main`).
    pub default_branch: String,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl Repo {
    /// The canonical `owner/name` identifier used in CLI remotes and URLs.
    #[must_use]
    pub fn slug(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

/// A named, mutable pointer to a commit.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Branch {
    /// Branch name, unique within its repo.
    pub name: String,
    /// Repo this branch belongs to.
    pub repo_id: String,
    /// Hex object ID of the commit this branch currently points to.
    pub head_commit_id: String,
    /// Last time the branch pointer moved.
    pub updated_at: DateTime<Utc>,
}

/// A snapshot object in the content-addressed store: the project state a
/// commit's `state_id` points to. Stored and addressed exactly like a Git
/// blob, keyed by the hash of its canonical JSON encoding.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Object {
    /// Hex content hash of `data`; the object's key in the store.
    pub id: String,
    /// Opaque project-state payload (entity registry + track/region data).
    pub data: serde_json::Value,
}

/// A point in a repo's history.
///
/// `parent_ids` has zero entries for a repo's root commit, one entry for
/// an ordinary commit, and two for a merge commit (`[to_branch head,
/// from_branch head]`, in that order).
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Commit {
    /// Hex content hash of this commit's canonical JSON (sans `id` itself).
    pub id: String,
    /// Repo this commit belongs to.
    pub repo_id: String,
    /// Object ID of the project-state snapshot this commit records.
    pub object_id: String,
    /// Ancestor commit IDs, see struct docs for ordering.
    pub parent_ids: Vec<String>,
    /// Commit message.
    pub message: String,
    /// Author identity (account handle, or `musehub-server` for merges
    /// the server performs on a PR's behalf).
    pub author: String,
    /// Commit timestamp.
    pub created_at: DateTime<Utc>,
    /// Arbitrary metadata (e.g. which variation this commit came from).
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl Commit {
    /// Whether this is a merge commit (more than one parent).
    #[must_use]
    pub fn is_merge(&self) -> bool {
        self.parent_ids.len() > 1
    }

    /// Whether this is the root commit of its repo (no parents).
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.parent_ids.is_empty()
    }
}

/// Lifecycle state of a pull request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum PrState {
    /// Open for review; mergeable.
    Open,
    /// Merged into its target branch.
    Merged,
    /// Closed without merging.
    Closed,
}

/// A request to merge one branch into another.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PullRequest {
    /// Server-issued unique identifier.
    pub id: String,
    /// Repo this PR belongs to.
    pub repo_id: String,
    /// Human-readable title.
    pub title: String,
    /// Optional description body.
    #[serde(default)]
    pub description: Option<String>,
    /// Source branch name.
    pub from_branch: String,
    /// Destination branch name.
    pub to_branch: String,
    /// Current lifecycle state.
    pub state: PrState,
    /// Account handle that opened the PR.
    pub author: String,
    /// Commit ID of the merge commit, set once `state` is `Merged`.
    #[serde(default)]
    pub merge_commit_id: Option<String>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last state-change timestamp.
    pub updated_at: DateTime<Utc>,
}

impl PullRequest {
    /// Whether the PR is still open and can be merged or closed.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.state == PrState::Open
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn sample_commit(parents: Vec<&str>) -> Commit {
        Commit {
            id: "deadbeef".into(),
            repo_id: "r1".into(),
            object_id: "obj1".into(),
            parent_ids: parents.into_iter().map(String::from).collect(),
            message: "initial".into(),
            author: "alice".into(),
            created_at: Utc::now(),
            metadata: BTreeMap::new(),
        }
    }

    #[test]
    fn root_commit_has_no_parents() {
        let c = sample_commit(vec![]);
        assert!(c.is_root());
        assert!(!c.is_merge());
    }

    #[test]
    fn two_parents_is_a_merge() {
        let c = sample_commit(vec!["a", "b"]);
        assert!(c.is_merge());
        assert!(!c.is_root());
    }

    #[test]
    fn repo_slug_combines_owner_and_name() {
        let repo = Repo {
            id: "1".into(),
            owner: "alice".into(),
            name: "demo-track".into(),
            visibility: Visibility::Private,
            default_branch: "main".into(),
            created_at: Utc::now(),
        };
        assert_eq!(repo.slug(), "alice/demo-track");
    }

    #[test]
    fn open_pr_is_open() {
        let pr = PullRequest {
            id: "pr1".into(),
            repo_id: "r1".into(),
            title: "Add hats".into(),
            description: None,
            from_branch: "variation/123".into(),
            to_branch: "main".into(),
            state: PrState::Open,
            author: "alice".into(),
            merge_commit_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert!(pr.is_open());
    }
}
