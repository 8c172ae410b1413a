// SPDX-License-Identifier: MIT OR Apache-2.0
//! In-memory repo/branch/commit/object store and ancestry queries.
//!
//! Not thread-safe on its own; `muse-daemon` wraps a single process-wide
//! instance in a `tokio::sync::RwLock`, the same way it would for any
//! other shared, process-local store.

use chrono::Utc;
use muse_core::{Branch, Commit, Object, Repo, Visibility};
use muse_error::{ErrorCode, MuseError};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

/// The full Muse Hub VCS state: every repo, and each repo's branches,
/// tags, commits, and objects.
#[derive(Debug, Default)]
pub struct VcsStore {
    repos: HashMap<String, Repo>,
    branches: HashMap<String, HashMap<String, Branch>>,
    tags: HashMap<String, HashMap<String, String>>,
    commits: HashMap<String, HashMap<String, Commit>>,
    objects: HashMap<String, HashMap<String, Object>>,
}

impl VcsStore {
    /// An empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new repo, empty of branches and history.
    pub fn create_repo(
        &mut self,
        owner: impl Into<String>,
        name: impl Into<String>,
        visibility: Visibility,
    ) -> Repo {
        let repo = Repo {
            id: Uuid::new_v4().to_string(),
            owner: owner.into(),
            name: name.into(),
            visibility,
            default_branch: "main".to_string(),
            created_at: Utc::now(),
        };
        self.repos.insert(repo.id.clone(), repo.clone());
        self.branches.insert(repo.id.clone(), HashMap::new());
        self.tags.insert(repo.id.clone(), HashMap::new());
        self.commits.insert(repo.id.clone(), HashMap::new());
        self.objects.insert(repo.id.clone(), HashMap::new());
        repo
    }

    /// Looks up a repo by ID.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorCode::RepoNotFound`] if no such repo exists.
    pub fn get_repo(&self, repo_id: &str) -> Result<&Repo, MuseError> {
        self.repos
            .get(repo_id)
            .ok_or_else(|| MuseError::new(ErrorCode::RepoNotFound, format!("no repo {repo_id}")))
    }

    /// Looks up a branch by name within a repo.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorCode::RepoNotFound`] or [`ErrorCode::BranchNotFound`].
    pub fn get_branch(&self, repo_id: &str, branch: &str) -> Result<&Branch, MuseError> {
        self.branches
            .get(repo_id)
            .ok_or_else(|| MuseError::new(ErrorCode::RepoNotFound, format!("no repo {repo_id}")))?
            .get(branch)
            .ok_or_else(|| {
                MuseError::new(ErrorCode::BranchNotFound, format!("no branch {branch}"))
            })
    }

    /// All branches of a repo, in no particular order.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorCode::RepoNotFound`] if the repo does not exist.
    pub fn list_branches(&self, repo_id: &str) -> Result<Vec<&Branch>, MuseError> {
        Ok(self
            .branches
            .get(repo_id)
            .ok_or_else(|| MuseError::new(ErrorCode::RepoNotFound, format!("no repo {repo_id}")))?
            .values()
            .collect())
    }

    /// Looks up a commit by ID within a repo.
    pub fn get_commit(&self, repo_id: &str, commit_id: &str) -> Option<&Commit> {
        self.commits.get(repo_id)?.get(commit_id)
    }

    /// Looks up an object by ID within a repo.
    pub fn get_object(&self, repo_id: &str, object_id: &str) -> Option<&Object> {
        self.objects.get(repo_id)?.get(object_id)
    }

    /// Inserts a commit, leaving any existing commit with the same ID
    /// untouched (pushes are idempotent on already-known commits).
    pub(crate) fn put_commit(&mut self, repo_id: &str, commit: Commit) {
        self.commits
            .entry(repo_id.to_string())
            .or_default()
            .entry(commit.id.clone())
            .or_insert(commit);
    }

    /// Inserts an object, leaving any existing object with the same ID
    /// untouched.
    pub(crate) fn put_object(&mut self, repo_id: &str, object: Object) {
        self.objects
            .entry(repo_id.to_string())
            .or_default()
            .entry(object.id.clone())
            .or_insert(object);
    }

    /// Moves (or creates) a branch's head pointer.
    pub(crate) fn set_branch_head(&mut self, repo_id: &str, branch: &str, head_commit_id: &str) {
        let entry = self
            .branches
            .entry(repo_id.to_string())
            .or_default()
            .entry(branch.to_string())
            .or_insert_with(|| Branch {
                name: branch.to_string(),
                repo_id: repo_id.to_string(),
                head_commit_id: head_commit_id.to_string(),
                updated_at: Utc::now(),
            });
        entry.head_commit_id = head_commit_id.to_string();
        entry.updated_at = Utc::now();
    }

    /// Upserts a tag ref.
    pub(crate) fn set_tag(&mut self, repo_id: &str, tag: &str, commit_id: &str) {
        self.tags
            .entry(repo_id.to_string())
            .or_default()
            .insert(tag.to_string(), commit_id.to_string());
    }

    /// Walks `parent_ids` from `start`, collecting every reachable commit
    /// ID (`start` included). `pending` supplies commits not yet persisted
    /// (e.g. the ones accompanying an in-flight push), consulted before
    /// falling back to the store.
    pub(crate) fn ancestry(
        &self,
        repo_id: &str,
        start: &str,
        pending: &HashMap<String, Commit>,
    ) -> HashSet<String> {
        let mut seen = HashSet::new();
        let mut stack = vec![start.to_string()];
        while let Some(id) = stack.pop() {
            if !seen.insert(id.clone()) {
                continue;
            }
            let parents = pending
                .get(&id)
                .or_else(|| self.get_commit(repo_id, &id))
                .map(|c| c.parent_ids.clone())
                .unwrap_or_default();
            stack.extend(parents);
        }
        seen
    }

    /// Whether `ancestor` is reachable from `commit_id` by walking parents.
    pub(crate) fn is_ancestor(
        &self,
        repo_id: &str,
        ancestor: &str,
        commit_id: &str,
        pending: &HashMap<String, Commit>,
    ) -> bool {
        if ancestor == commit_id {
            return true;
        }
        self.ancestry(repo_id, commit_id, pending).contains(ancestor)
    }
}
