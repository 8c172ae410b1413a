// SPDX-License-Identifier: MIT OR Apache-2.0
//! The on-disk `.muse/` working-copy layout: `HEAD`, branch refs,
//! remote-tracking pointers, and a flat-file object store.
//!
//! Mirrors Git's loose-object layout rather than the original Python
//! CLI's local Postgres cache: a single-binary client has no business
//! requiring a database just to remember which commits it already has.

use muse_core::{Commit, Object};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::config::MuseConfig;

/// Name of the hidden directory a Muse Hub working copy lives under.
pub const MUSE_DIR: &str = ".muse";

/// A discovered (or freshly initialized) working copy.
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    fn muse_dir(&self) -> PathBuf {
        self.root.join(MUSE_DIR)
    }

    /// Root of the working copy (the directory containing `.muse/`).
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path to `.muse/config.toml`.
    #[must_use]
    pub fn config_path(&self) -> PathBuf {
        self.muse_dir().join("config.toml")
    }

    /// Loads `.muse/config.toml`.
    pub fn load_config(&self) -> anyhow::Result<MuseConfig> {
        MuseConfig::load(&self.config_path())
    }

    /// Initializes a new working copy at `root`, defaulting `HEAD` to
    /// `default_branch` with no commits yet.
    pub fn init(root: &Path, default_branch: &str) -> anyhow::Result<Self> {
        let muse_dir = root.join(MUSE_DIR);
        if muse_dir.exists() {
            anyhow::bail!("{} is already a Muse Hub working copy", root.display());
        }
        std::fs::create_dir_all(muse_dir.join("refs/heads"))?;
        std::fs::create_dir_all(muse_dir.join("remotes"))?;
        std::fs::create_dir_all(muse_dir.join("objects/commits"))?;
        std::fs::create_dir_all(muse_dir.join("objects/blobs"))?;

        let ws = Self { root: root.to_path_buf() };
        std::fs::write(ws.head_path(), format!("refs/heads/{default_branch}\n"))?;
        std::fs::write(ws.branch_ref_path(default_branch), "")?;

        let repo_stub = serde_json::json!({
            "schema_version": 1,
            "created_at": chrono::Utc::now(),
        });
        std::fs::write(
            muse_dir.join("repo.json"),
            serde_json::to_string_pretty(&repo_stub)?,
        )?;
        ws.load_config()?.save(&ws.config_path())?;
        Ok(ws)
    }

    /// Walks up from `start` looking for a `.muse` directory.
    pub fn discover(start: &Path) -> anyhow::Result<Self> {
        let mut dir = start.canonicalize().unwrap_or_else(|_| start.to_path_buf());
        loop {
            if dir.join(MUSE_DIR).is_dir() {
                return Ok(Self { root: dir });
            }
            if !dir.pop() {
                anyhow::bail!("not a Muse Hub working copy (no .muse directory found)");
            }
        }
    }

    fn head_path(&self) -> PathBuf {
        self.muse_dir().join("HEAD")
    }

    fn branch_ref_path(&self, branch: &str) -> PathBuf {
        self.muse_dir().join("refs/heads").join(branch)
    }

    fn remote_tracking_path(&self, remote: &str, branch: &str) -> PathBuf {
        self.muse_dir().join("remotes").join(remote).join(branch)
    }

    /// The branch `HEAD` currently points to.
    pub fn head_branch(&self) -> anyhow::Result<String> {
        let raw = std::fs::read_to_string(self.head_path())
            .map_err(|e| anyhow::anyhow!("failed to read HEAD: {e}"))?;
        raw.trim()
            .strip_prefix("refs/heads/")
            .map(str::to_string)
            .ok_or_else(|| anyhow::anyhow!("malformed HEAD: {raw:?}"))
    }

    /// The commit a local branch currently points to, if it has one.
    pub fn branch_head(&self, branch: &str) -> anyhow::Result<Option<String>> {
        let path = self.branch_ref_path(branch);
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(path)?;
        let trimmed = content.trim();
        Ok(if trimmed.is_empty() { None } else { Some(trimmed.to_string()) })
    }

    /// Moves a local branch to point at `commit_id`.
    pub fn set_branch_head(&self, branch: &str, commit_id: &str) -> anyhow::Result<()> {
        std::fs::create_dir_all(self.muse_dir().join("refs/heads"))?;
        std::fs::write(self.branch_ref_path(branch), commit_id)?;
        Ok(())
    }

    /// The last commit this working copy saw a remote's branch at.
    pub fn remote_tracking_head(&self, remote: &str, branch: &str) -> anyhow::Result<Option<String>> {
        let path = self.remote_tracking_path(remote, branch);
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(path)?;
        let trimmed = content.trim();
        Ok(if trimmed.is_empty() { None } else { Some(trimmed.to_string()) })
    }

    /// Records that `remote`'s `branch` was last observed at `commit_id`.
    pub fn set_remote_tracking_head(
        &self,
        remote: &str,
        branch: &str,
        commit_id: &str,
    ) -> anyhow::Result<()> {
        let path = self.remote_tracking_path(remote, branch);
        std::fs::create_dir_all(path.parent().unwrap())?;
        std::fs::write(path, commit_id)?;
        Ok(())
    }

    /// Persists a commit to the local object store.
    pub fn store_commit(&self, commit: &Commit) -> anyhow::Result<()> {
        let path = self.muse_dir().join("objects/commits").join(format!("{}.json", commit.id));
        std::fs::write(path, serde_json::to_string_pretty(commit)?)?;
        Ok(())
    }

    /// Loads a commit from the local object store, if present.
    pub fn load_commit(&self, id: &str) -> anyhow::Result<Option<Commit>> {
        let path = self.muse_dir().join("objects/commits").join(format!("{id}.json"));
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_str(&std::fs::read_to_string(path)?)?))
    }

    /// Persists a project-state object to the local object store.
    pub fn store_object(&self, object: &Object) -> anyhow::Result<()> {
        let path = self.muse_dir().join("objects/blobs").join(format!("{}.json", object.id));
        std::fs::write(path, serde_json::to_string_pretty(object)?)?;
        Ok(())
    }

    /// Loads a project-state object from the local object store, if present.
    pub fn load_object(&self, id: &str) -> anyhow::Result<Option<Object>> {
        let path = self.muse_dir().join("objects/blobs").join(format!("{id}.json"));
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_str(&std::fs::read_to_string(path)?)?))
    }

    /// Walks the local commit graph back from `head`, returning every
    /// commit reachable from it and the objects those commits reference.
    ///
    /// Used to build a push payload: the server's object store is
    /// content-addressed, so resending a commit or object it already has
    /// is a harmless no-op, and the CLI does not need to track what the
    /// remote already holds.
    pub fn collect_history(&self, head: &str) -> anyhow::Result<(Vec<Commit>, Vec<Object>)> {
        let mut commits = Vec::new();
        let mut objects = Vec::new();
        let mut seen = HashSet::new();
        let mut frontier = vec![head.to_string()];

        while let Some(id) = frontier.pop() {
            if !seen.insert(id.clone()) {
                continue;
            }
            let Some(commit) = self.load_commit(&id)? else {
                continue;
            };
            if let Some(object) = self.load_object(&commit.object_id)? {
                objects.push(object);
            }
            frontier.extend(commit.parent_ids.iter().cloned());
            commits.push(commit);
        }

        Ok((commits, objects))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_creates_head_pointing_at_default_branch() {
        let dir = tempfile::tempdir().unwrap();
        let ws = Workspace::init(dir.path(), "main").unwrap();
        assert_eq!(ws.head_branch().unwrap(), "main");
        assert_eq!(ws.branch_head("main").unwrap(), None);
    }

    #[test]
    fn init_twice_fails() {
        let dir = tempfile::tempdir().unwrap();
        Workspace::init(dir.path(), "main").unwrap();
        assert!(Workspace::init(dir.path(), "main").is_err());
    }

    #[test]
    fn discover_finds_muse_dir_from_a_subdirectory() {
        let dir = tempfile::tempdir().unwrap();
        Workspace::init(dir.path(), "main").unwrap();
        let nested = dir.path().join("a/b/c");
        std::fs::create_dir_all(&nested).unwrap();
        let ws = Workspace::discover(&nested).unwrap();
        assert_eq!(ws.root(), dir.path().canonicalize().unwrap());
    }

    #[test]
    fn discover_outside_a_working_copy_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Workspace::discover(dir.path()).is_err());
    }

    #[test]
    fn branch_head_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let ws = Workspace::init(dir.path(), "main").unwrap();
        ws.set_branch_head("main", "deadbeef").unwrap();
        assert_eq!(ws.branch_head("main").unwrap(), Some("deadbeef".to_string()));
    }

    #[test]
    fn remote_tracking_head_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let ws = Workspace::init(dir.path(), "main").unwrap();
        assert_eq!(ws.remote_tracking_head("origin", "main").unwrap(), None);
        ws.set_remote_tracking_head("origin", "main", "abc123").unwrap();
        assert_eq!(
            ws.remote_tracking_head("origin", "main").unwrap(),
            Some("abc123".to_string())
        );
    }

    fn commit(id: &str, parents: &[&str], object_id: &str) -> Commit {
        Commit {
            id: id.to_string(),
            repo_id: "r1".to_string(),
            object_id: object_id.to_string(),
            parent_ids: parents.iter().map(|p| p.to_string()).collect(),
            message: "m".to_string(),
            author: "alice".to_string(),
            created_at: chrono::Utc::now(),
            metadata: Default::default(),
        }
    }

    #[test]
    fn collect_history_walks_back_through_parents() {
        let dir = tempfile::tempdir().unwrap();
        let ws = Workspace::init(dir.path(), "main").unwrap();

        let root = commit("c1", &[], "o1");
        let child = commit("c2", &["c1"], "o2");
        ws.store_commit(&root).unwrap();
        ws.store_commit(&child).unwrap();
        ws.store_object(&Object { id: "o1".into(), data: serde_json::json!({}) }).unwrap();
        ws.store_object(&Object { id: "o2".into(), data: serde_json::json!({}) }).unwrap();

        let (commits, objects) = ws.collect_history("c2").unwrap();
        assert_eq!(commits.len(), 2);
        assert_eq!(objects.len(), 2);
    }
}
