// SPDX-License-Identifier: MIT OR Apache-2.0
//! The push / pull / fetch / clone wire protocol.

use crate::store::VcsStore;
use muse_core::{Commit, Object};
use muse_error::{ErrorCode, MuseError};
use std::collections::{HashMap, HashSet};

/// Domain-specific reasons a push can be rejected, kept narrow and
/// independent of the generic wire error shape; converted into a
/// [`MuseError`] only at the function boundary.
#[derive(Debug, thiserror::Error)]
pub enum PushRejection {
    /// The push is not a fast-forward and neither `force` nor
    /// `force_with_lease` was set.
    #[error("push is not a fast-forward; retry with force or force_with_lease")]
    NonFastForward,
    /// `force_with_lease` was set but `expected_remote_head` no longer
    /// matches the branch's current head.
    #[error("remote head advanced since expected_remote_head was read")]
    LeaseMismatch,
}

impl From<PushRejection> for MuseError {
    fn from(rejection: PushRejection) -> Self {
        let code = match rejection {
            PushRejection::NonFastForward => ErrorCode::VcsNonFastForward,
            PushRejection::LeaseMismatch => ErrorCode::VcsLeaseMismatch,
        };
        MuseError::new(code, rejection.to_string())
    }
}

/// A push request body.
#[derive(Debug, Clone)]
pub struct PushRequest {
    /// Branch being pushed to.
    pub branch: String,
    /// The commit the client wants `branch` to point to afterward.
    pub head_commit_id: String,
    /// New commits the client is uploading.
    pub commits: Vec<Commit>,
    /// New objects the client is uploading.
    pub objects: Vec<Object>,
    /// Unconditionally overwrite a non-fast-forward branch.
    pub force: bool,
    /// Overwrite only if `expected_remote_head` still matches the server.
    pub force_with_lease: bool,
    /// Required when `force_with_lease` is set.
    pub expected_remote_head: Option<String>,
    /// Tag refs to upsert, `(name, commit_id)`.
    pub tags: Vec<(String, String)>,
}

/// The server's response to an accepted push.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushOutcome {
    /// Branch that was updated.
    pub branch: String,
    /// The new head commit ID (equal to the request's `head_commit_id`).
    pub new_head: String,
    /// Whether the update was a plain fast-forward, as opposed to a
    /// force overwrite.
    pub fast_forward: bool,
}

/// Applies a push, enforcing fast-forward/force/force-with-lease rules.
///
/// # Errors
///
/// [`ErrorCode::RepoNotFound`] if the repo does not exist;
/// [`ErrorCode::VcsNonFastForward`] if the push is not a fast-forward and
/// neither `force` nor `force_with_lease` was set;
/// [`ErrorCode::VcsLeaseMismatch`] if `force_with_lease`'s expected head
/// does not match the server.
pub fn push(store: &mut VcsStore, repo_id: &str, req: PushRequest) -> Result<PushOutcome, MuseError> {
    store.get_repo(repo_id)?;

    let current_head = store.get_branch(repo_id, &req.branch).ok().map(|b| b.head_commit_id.clone());

    let pending: HashMap<String, Commit> = req
        .commits
        .iter()
        .cloned()
        .map(|c| (c.id.clone(), c))
        .collect();

    let is_fast_forward = match &current_head {
        None => true,
        Some(head) => store.is_ancestor(repo_id, head, &req.head_commit_id, &pending),
    };

    let fast_forward = if is_fast_forward {
        true
    } else if req.force_with_lease {
        let expected = req.expected_remote_head.as_deref();
        if expected == current_head.as_deref() {
            false
        } else {
            return Err(PushRejection::LeaseMismatch.into());
        }
    } else if req.force {
        false
    } else {
        return Err(PushRejection::NonFastForward.into());
    };

    for commit in req.commits {
        store.put_commit(repo_id, commit);
    }
    for object in req.objects {
        store.put_object(repo_id, object);
    }
    store.set_branch_head(repo_id, &req.branch, &req.head_commit_id);
    for (tag, commit_id) in &req.tags {
        store.set_tag(repo_id, tag, commit_id);
    }

    Ok(PushOutcome {
        branch: req.branch,
        new_head: req.head_commit_id,
        fast_forward,
    })
}

/// A pull request body.
#[derive(Debug, Clone, Default)]
pub struct PullRequestBody {
    /// Branch being pulled.
    pub branch: String,
    /// Commit IDs the client already has.
    pub have_commits: Vec<String>,
    /// Object IDs the client already has.
    pub have_objects: Vec<String>,
}

/// The server's response to a pull.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullOutcome {
    /// Commits reachable from the branch head that the client lacks, in
    /// no particular order.
    pub commits: Vec<Commit>,
    /// Objects referenced by those commits that the client lacks.
    pub objects: Vec<Object>,
    /// The branch's current head commit.
    pub remote_head: String,
    /// True if any of `have_commits` is not an ancestor of `remote_head` —
    /// the client's branch has diverged and a plain fast-forward merge
    /// will not reconcile it.
    pub diverged: bool,
}

/// Computes what a client pulling `branch` is missing.
///
/// # Errors
///
/// [`ErrorCode::RepoNotFound`] or [`ErrorCode::BranchNotFound`].
pub fn pull(
    store: &VcsStore,
    repo_id: &str,
    req: &PullRequestBody,
) -> Result<PullOutcome, MuseError> {
    let branch = store.get_branch(repo_id, &req.branch)?;
    let remote_head = branch.head_commit_id.clone();

    let reachable = store.ancestry(repo_id, &remote_head, &HashMap::new());
    let have: HashSet<&str> = req.have_commits.iter().map(String::as_str).collect();

    let commits: Vec<Commit> = reachable
        .iter()
        .filter(|id| !have.contains(id.as_str()))
        .filter_map(|id| store.get_commit(repo_id, id).cloned())
        .collect();

    let have_objects: HashSet<&str> = req.have_objects.iter().map(String::as_str).collect();
    let needed_object_ids: HashSet<String> = commits.iter().map(|c| c.object_id.clone()).collect();
    let objects: Vec<Object> = needed_object_ids
        .iter()
        .filter(|id| !have_objects.contains(id.as_str()))
        .filter_map(|id| store.get_object(repo_id, id).cloned())
        .collect();

    let diverged = req
        .have_commits
        .iter()
        .any(|local| !reachable.contains(local));

    Ok(PullOutcome {
        commits,
        objects,
        remote_head,
        diverged,
    })
}

/// One branch's state as returned by fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchEntry {
    /// Branch name.
    pub branch: String,
    /// The branch's current head commit.
    pub head_commit_id: String,
    /// Advisory hint that the branch is new to the client. The server has
    /// no notion of per-client fetch history, so this is always `true`;
    /// the CLI overrides it from its own tracking-file state, as the
    /// protocol allows.
    pub is_new: bool,
}

/// Reports head pointers for the requested branches without transferring
/// any commits or objects. An empty `branches` list means "all branches".
///
/// # Errors
///
/// [`ErrorCode::RepoNotFound`].
pub fn fetch(
    store: &VcsStore,
    repo_id: &str,
    branches: &[String],
) -> Result<Vec<FetchEntry>, MuseError> {
    let all = store.list_branches(repo_id)?;
    let wanted: HashSet<&str> = branches.iter().map(String::as_str).collect();
    Ok(all
        .into_iter()
        .filter(|b| wanted.is_empty() || wanted.contains(b.name.as_str()))
        .map(|b| FetchEntry {
            branch: b.name.clone(),
            head_commit_id: b.head_commit_id.clone(),
            is_new: true,
        })
        .collect())
}

/// A clone request body.
#[derive(Debug, Clone, Default)]
pub struct CloneRequest {
    /// Branch to clone; defaults to the repo's default branch.
    pub branch: Option<String>,
    /// Only include this many generations of history back from the head.
    pub depth: Option<u32>,
    /// Only include objects tagged with this track name in their payload
    /// (a `"track"` key at the top level of the object's JSON), the
    /// closest analogue a content-addressed snapshot store has to Git's
    /// sparse/single-path clone filtering.
    pub single_track: Option<String>,
}

/// The server's response to a clone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloneOutcome {
    /// Repo being cloned.
    pub repo_id: String,
    /// The repo's default branch name.
    pub default_branch: String,
    /// Head commit of the cloned branch.
    pub remote_head: String,
    /// Commits included in the clone.
    pub commits: Vec<Commit>,
    /// Objects included in the clone, after depth/track filtering.
    pub objects: Vec<Object>,
}

/// Produces the commit and object set for a clone.
///
/// # Errors
///
/// [`ErrorCode::RepoNotFound`] or [`ErrorCode::BranchNotFound`].
pub fn clone_repo(
    store: &VcsStore,
    repo_id: &str,
    req: &CloneRequest,
) -> Result<CloneOutcome, MuseError> {
    let repo = store.get_repo(repo_id)?;
    let branch_name = req.branch.clone().unwrap_or_else(|| repo.default_branch.clone());
    let branch = store.get_branch(repo_id, &branch_name)?;
    let remote_head = branch.head_commit_id.clone();

    let commits = commits_by_generation(store, repo_id, &remote_head, req.depth);
    let mut objects: Vec<Object> = commits
        .iter()
        .filter_map(|c| store.get_object(repo_id, &c.object_id).cloned())
        .collect();

    if let Some(track) = &req.single_track {
        objects.retain(|o| {
            o.data
                .get("track")
                .and_then(|v| v.as_str())
                .is_some_and(|t| t == track)
        });
    }

    Ok(CloneOutcome {
        repo_id: repo_id.to_string(),
        default_branch: repo.default_branch.clone(),
        remote_head,
        commits,
        objects,
    })
}

/// Breadth-first walk back from `head`, `depth` generations deep
/// (`None` means unbounded — the whole history).
fn commits_by_generation(
    store: &VcsStore,
    repo_id: &str,
    head: &str,
    depth: Option<u32>,
) -> Vec<Commit> {
    let mut out = Vec::new();
    let mut seen = HashSet::new();
    let mut frontier = vec![head.to_string()];
    let mut generation = 0u32;

    while !frontier.is_empty() {
        if let Some(max) = depth {
            if generation >= max {
                break;
            }
        }
        let mut next = Vec::new();
        for id in frontier {
            if !seen.insert(id.clone()) {
                continue;
            }
            if let Some(commit) = store.get_commit(repo_id, &id) {
                next.extend(commit.parent_ids.clone());
                out.push(commit.clone());
            }
        }
        frontier = next;
        generation += 1;
    }
    out
}
