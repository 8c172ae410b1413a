// SPDX-License-Identifier: MIT OR Apache-2.0
//! Pull request CRUD and the `merge_commit` merge engine.

use crate::hash::{commit_id, object_id, CommitPreimage};
use crate::store::VcsStore;
use chrono::Utc;
use muse_core::{Commit, Object, PrState, PullRequest};
use muse_error::{ErrorCode, MuseError};
use std::collections::{BTreeMap, HashMap};
use uuid::Uuid;

/// In-memory pull request store, keyed by PR ID.
///
/// Kept separate from [`VcsStore`] because PRs reference branches by name
/// rather than owning any content-addressed data of their own.
#[derive(Debug, Default)]
pub struct PullRequestStore {
    prs: HashMap<String, PullRequest>,
}

impl PullRequestStore {
    /// An empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a new pull request.
    ///
    /// # Errors
    ///
    /// [`ErrorCode::BranchNotFound`] if `from_branch` does not exist on
    /// the repo (the spec only requires checking the source branch; the
    /// target branch may not exist yet for a brand-new repo).
    pub fn create(
        &mut self,
        vcs: &VcsStore,
        repo_id: &str,
        title: impl Into<String>,
        from_branch: impl Into<String>,
        to_branch: impl Into<String>,
        author: impl Into<String>,
        description: Option<String>,
    ) -> Result<PullRequest, MuseError> {
        let from_branch = from_branch.into();
        vcs.get_branch(repo_id, &from_branch)?;

        let now = Utc::now();
        let pr = PullRequest {
            id: Uuid::new_v4().to_string(),
            repo_id: repo_id.to_string(),
            title: title.into(),
            description,
            from_branch,
            to_branch: to_branch.into(),
            state: PrState::Open,
            author: author.into(),
            merge_commit_id: None,
            created_at: now,
            updated_at: now,
        };
        self.prs.insert(pr.id.clone(), pr.clone());
        Ok(pr)
    }

    /// Lists PRs for a repo, oldest first, optionally filtered by state.
    #[must_use]
    pub fn list(&self, repo_id: &str, state: Option<PrState>) -> Vec<&PullRequest> {
        let mut prs: Vec<&PullRequest> = self
            .prs
            .values()
            .filter(|pr| pr.repo_id == repo_id)
            .filter(|pr| state.is_none_or(|s| pr.state == s))
            .collect();
        prs.sort_by_key(|pr| pr.created_at);
        prs
    }

    /// Looks up a PR by ID.
    #[must_use]
    pub fn get(&self, pr_id: &str) -> Option<&PullRequest> {
        self.prs.get(pr_id)
    }

    /// Closes an open PR without merging.
    ///
    /// # Errors
    ///
    /// [`ErrorCode::PullRequestNotFound`] or [`ErrorCode::VcsPullRequestNotOpen`].
    pub fn close(&mut self, pr_id: &str) -> Result<(), MuseError> {
        let pr = self.prs.get_mut(pr_id).ok_or_else(|| {
            MuseError::new(ErrorCode::PullRequestNotFound, format!("no PR {pr_id}"))
        })?;
        if pr.state != PrState::Open {
            return Err(MuseError::new(
                ErrorCode::VcsPullRequestNotOpen,
                "PR is not open",
            ));
        }
        pr.state = PrState::Closed;
        pr.updated_at = Utc::now();
        Ok(())
    }

    /// Merges an open PR via the `merge_commit` strategy (the only one
    /// supported): creates a commit on `to_branch` with `parent_ids =
    /// [to_branch.head, from_branch.head]`, advances `to_branch`, and
    /// transitions the PR to `Merged`.
    ///
    /// # Errors
    ///
    /// [`ErrorCode::PullRequestNotFound`], [`ErrorCode::VcsPullRequestNotOpen`]
    /// if the PR isn't open, or [`ErrorCode::BranchNotFound`] if either
    /// branch has no commits.
    pub fn merge(
        &mut self,
        vcs: &mut VcsStore,
        pr_id: &str,
        merge_author: impl Into<String>,
    ) -> Result<Commit, MuseError> {
        let pr = self.prs.get(pr_id).ok_or_else(|| {
            MuseError::new(ErrorCode::PullRequestNotFound, format!("no PR {pr_id}"))
        })?;
        if pr.state != PrState::Open {
            return Err(MuseError::new(
                ErrorCode::VcsPullRequestNotOpen,
                "PR is not open",
            ));
        }
        let repo_id = pr.repo_id.clone();
        let from_branch = pr.from_branch.clone();
        let to_branch = pr.to_branch.clone();
        let title = pr.title.clone();

        let from_head = vcs.get_branch(&repo_id, &from_branch)?.head_commit_id.clone();
        let to_head = vcs.get_branch(&repo_id, &to_branch)?.head_commit_id.clone();

        let from_commit = vcs
            .get_commit(&repo_id, &from_head)
            .ok_or_else(|| MuseError::new(ErrorCode::CommitNotFound, "from branch has no commits"))?
            .clone();

        let object = vcs
            .get_object(&repo_id, &from_commit.object_id)
            .cloned()
            .unwrap_or_else(|| Object {
                id: object_id(&serde_json::json!({})),
                data: serde_json::json!({}),
            });

        let author = merge_author.into();
        let parent_ids = vec![to_head.clone(), from_head.clone()];
        let mut metadata = BTreeMap::new();
        metadata.insert("pull_request_id".to_string(), serde_json::json!(pr_id));
        let now = Utc::now();

        let preimage = CommitPreimage {
            repo_id: &repo_id,
            object_id: &object.id,
            parent_ids: &parent_ids,
            message: &format!("Merge pull request: {title}"),
            author: &author,
            created_at: now,
            metadata: &metadata,
        };
        let id = commit_id(&preimage);

        let commit = Commit {
            id: id.clone(),
            repo_id: repo_id.clone(),
            object_id: object.id.clone(),
            parent_ids,
            message: format!("Merge pull request: {title}"),
            author,
            created_at: now,
            metadata,
        };

        vcs.put_commit(&repo_id, commit.clone());
        vcs.set_branch_head(&repo_id, &to_branch, &id);

        let pr = self.prs.get_mut(pr_id).expect("checked present above");
        pr.state = PrState::Merged;
        pr.merge_commit_id = Some(id);
        pr.updated_at = now;

        Ok(commit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use muse_core::Visibility;

    fn seeded_store() -> (VcsStore, String) {
        let mut vcs = VcsStore::new();
        let repo = vcs.create_repo("alice", "demo", Visibility::Private);
        let base = Commit {
            id: "base".to_string(),
            repo_id: repo.id.clone(),
            object_id: "obj-base".to_string(),
            parent_ids: vec![],
            message: "root".to_string(),
            author: "alice".to_string(),
            created_at: Utc::now(),
            metadata: Default::default(),
        };
        vcs.put_commit(&repo.id, base);
        vcs.put_object(
            &repo.id,
            Object {
                id: "obj-base".to_string(),
                data: serde_json::json!({}),
            },
        );
        vcs.set_branch_head(&repo.id, "main", "base");
        vcs.set_branch_head(&repo.id, "variation/add-drums", "base");
        (vcs, repo.id)
    }

    #[test]
    fn create_rejects_missing_from_branch() {
        let (vcs, repo_id) = seeded_store();
        let mut prs = PullRequestStore::new();
        let err = prs
            .create(&vcs, &repo_id, "Add hats", "nonexistent", "main", "alice", None)
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::BranchNotFound);
    }

    #[test]
    fn list_orders_oldest_first_and_filters_by_state() {
        let (vcs, repo_id) = seeded_store();
        let mut prs = PullRequestStore::new();
        let first = prs
            .create(&vcs, &repo_id, "First", "variation/add-drums", "main", "alice", None)
            .unwrap();
        std::thread::sleep(std::time::Duration::from_millis(2));
        prs.create(&vcs, &repo_id, "Second", "variation/add-drums", "main", "bob", None)
            .unwrap();

        let all = prs.list(&repo_id, None);
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id, first.id);

        let open = prs.list(&repo_id, Some(PrState::Open));
        assert_eq!(open.len(), 2);
    }

    #[test]
    fn merge_advances_to_branch_and_records_merge_commit() {
        let (mut vcs, repo_id) = seeded_store();
        let mut prs = PullRequestStore::new();
        let pr = prs
            .create(&vcs, &repo_id, "Add hats", "variation/add-drums", "main", "alice", None)
            .unwrap();

        let commit = prs.merge(&mut vcs, &pr.id, "musehub-server").unwrap();
        assert_eq!(commit.parent_ids, vec!["base".to_string(), "base".to_string()]);

        let updated = prs.get(&pr.id).unwrap();
        assert_eq!(updated.state, PrState::Merged);
        assert_eq!(updated.merge_commit_id.as_deref(), Some(commit.id.as_str()));
        assert_eq!(vcs.get_branch(&repo_id, "main").unwrap().head_commit_id, commit.id);
    }

    #[test]
    fn merge_rejects_already_merged_pr() {
        let (mut vcs, repo_id) = seeded_store();
        let mut prs = PullRequestStore::new();
        let pr = prs
            .create(&vcs, &repo_id, "Add hats", "variation/add-drums", "main", "alice", None)
            .unwrap();
        prs.merge(&mut vcs, &pr.id, "musehub-server").unwrap();

        let err = prs.merge(&mut vcs, &pr.id, "musehub-server").unwrap_err();
        assert_eq!(err.code, ErrorCode::VcsPullRequestNotOpen);
    }

    #[test]
    fn close_rejects_non_open_pr() {
        let (vcs, repo_id) = seeded_store();
        let mut prs = PullRequestStore::new();
        let pr = prs
            .create(&vcs, &repo_id, "Add hats", "variation/add-drums", "main", "alice", None)
            .unwrap();
        prs.close(&pr.id).unwrap();
        let err = prs.close(&pr.id).unwrap_err();
        assert_eq!(err.code, ErrorCode::VcsPullRequestNotOpen);
    }
}
