// SPDX-License-Identifier: MIT OR Apache-2.0
//! Implementations of the `muse` subcommands.

use crate::config::{AuthConfig, MuseConfig, RemoteConfig};
use crate::hub_client::{CloneBody, HubClient, PullBody, PushBody};
use crate::workspace::Workspace;
use muse_core::{Commit, Object};
use muse_vcs::{commit_id, object_id, CommitPreimage};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

const DEFAULT_BRANCH: &str = "main";
const DEFAULT_REMOTE: &str = "origin";

pub async fn init(path: Option<PathBuf>) -> anyhow::Result<()> {
    let root = path.unwrap_or_else(|| PathBuf::from("."));
    std::fs::create_dir_all(&root)?;
    Workspace::init(&root, DEFAULT_BRANCH)?;
    println!("Initialized empty Muse Hub working copy in {}/.muse", root.display());
    Ok(())
}

pub async fn remote_add(name: String, url: String) -> anyhow::Result<()> {
    let ws = Workspace::discover(Path::new("."))?;
    let mut config = ws.load_config()?;
    config.remotes.insert(name.clone(), RemoteConfig { url });
    config.save(&ws.config_path())?;
    println!("Added remote '{name}'");
    Ok(())
}

pub async fn remote_remove(name: String) -> anyhow::Result<()> {
    let ws = Workspace::discover(Path::new("."))?;
    let mut config = ws.load_config()?;
    if config.remotes.remove(&name).is_none() {
        anyhow::bail!("no such remote: {name}");
    }
    config.save(&ws.config_path())?;
    println!("Removed remote '{name}'");
    Ok(())
}

pub async fn remote_list() -> anyhow::Result<()> {
    let ws = Workspace::discover(Path::new("."))?;
    let config = ws.load_config()?;
    for (name, remote) in &config.remotes {
        println!("{name}\t{}", remote.url);
    }
    Ok(())
}

pub async fn login(token: String) -> anyhow::Result<()> {
    let ws = Workspace::discover(Path::new("."))?;
    let mut config = ws.load_config()?;
    config.auth = Some(AuthConfig { token });
    config.save(&ws.config_path())?;
    println!("Stored Bearer ***");
    Ok(())
}

fn resolve_remote(config: &MuseConfig, name: &str) -> anyhow::Result<RemoteConfig> {
    config
        .remote(name)
        .cloned()
        .ok_or_else(|| anyhow::anyhow!("no such remote: {name} (run `muse remote add {name} <url>`)"))
}

pub async fn push(remote: Option<String>, branch: Option<String>, force: bool) -> anyhow::Result<()> {
    let ws = Workspace::discover(Path::new("."))?;
    let config = ws.load_config()?;
    let remote_name = remote.unwrap_or_else(|| DEFAULT_REMOTE.to_string());
    let remote_config = resolve_remote(&config, &remote_name)?;
    let branch_name = match branch {
        Some(b) => b,
        None => ws.head_branch()?,
    };
    let head = ws
        .branch_head(&branch_name)?
        .ok_or_else(|| anyhow::anyhow!("branch '{branch_name}' has no commits to push"))?;

    let (commits, objects) = ws.collect_history(&head)?;
    let client = HubClient::new(remote_config.url, config.token().map(str::to_string));
    let expected_remote_head = ws.remote_tracking_head(&remote_name, &branch_name)?;

    let outcome = client
        .push(PushBody {
            branch: branch_name.clone(),
            head_commit_id: head.clone(),
            commits,
            objects,
            force,
            force_with_lease: !force && expected_remote_head.is_some(),
            expected_remote_head,
            tags: Vec::new(),
        })
        .await?;

    ws.set_remote_tracking_head(&remote_name, &branch_name, &outcome.new_head)?;
    println!(
        "Pushed {branch_name} -> {remote_name}/{branch_name} ({})",
        &outcome.new_head[..outcome.new_head.len().min(12)]
    );
    Ok(())
}

pub async fn pull(remote: Option<String>, branch: Option<String>) -> anyhow::Result<()> {
    let ws = Workspace::discover(Path::new("."))?;
    let config = ws.load_config()?;
    let remote_name = remote.unwrap_or_else(|| DEFAULT_REMOTE.to_string());
    let remote_config = resolve_remote(&config, &remote_name)?;
    let branch_name = match branch {
        Some(b) => b,
        None => ws.head_branch()?,
    };

    let (have_commits, _) = match ws.branch_head(&branch_name)? {
        Some(head) => ws.collect_history(&head)?,
        None => (Vec::new(), Vec::new()),
    };

    let client = HubClient::new(remote_config.url, config.token().map(str::to_string));
    let outcome = client
        .pull(PullBody {
            branch: branch_name.clone(),
            have_commits: have_commits.iter().map(|c| c.id.clone()).collect(),
            have_objects: Vec::new(),
        })
        .await?;

    if outcome.diverged {
        anyhow::bail!(
            "'{branch_name}' has diverged from {remote_name}/{branch_name}; a merge is required"
        );
    }

    for object in &outcome.objects {
        ws.store_object(object)?;
    }
    for commit in &outcome.commits {
        ws.store_commit(commit)?;
    }
    ws.set_branch_head(&branch_name, &outcome.remote_head)?;
    ws.set_remote_tracking_head(&remote_name, &branch_name, &outcome.remote_head)?;

    println!(
        "Pulled {} new commit(s) for {branch_name} from {remote_name}",
        outcome.commits.len()
    );
    Ok(())
}

pub async fn fetch(remote: Option<String>, branches: Vec<String>) -> anyhow::Result<()> {
    let ws = Workspace::discover(Path::new("."))?;
    let config = ws.load_config()?;
    let remote_name = remote.unwrap_or_else(|| DEFAULT_REMOTE.to_string());
    let remote_config = resolve_remote(&config, &remote_name)?;

    let client = HubClient::new(remote_config.url, config.token().map(str::to_string));
    let entries = client.fetch(&branches).await?;

    let mut updated = 0;
    for entry in &entries {
        let previous = ws.remote_tracking_head(&remote_name, &entry.branch)?;
        let is_new = previous.is_none();
        if previous.as_deref() == Some(entry.head_commit_id.as_str()) {
            continue;
        }
        ws.set_remote_tracking_head(&remote_name, &entry.branch, &entry.head_commit_id)?;
        updated += 1;
        let suffix = if is_new { " (new branch)" } else { "" };
        let short = &entry.head_commit_id[..entry.head_commit_id.len().min(12)];
        println!(
            "From {remote_name}: + {short} {branch} -> {remote_name}/{branch}{suffix}",
            branch = entry.branch
        );
    }

    if updated == 0 {
        println!("Already up to date.");
    }
    Ok(())
}

pub async fn clone_repo(
    url: String,
    directory: Option<String>,
    branch: Option<String>,
    depth: Option<u32>,
    single_track: Option<String>,
    token: Option<String>,
) -> anyhow::Result<()> {
    let repo_id = url
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| anyhow::anyhow!("could not determine repo ID from URL: {url}"))?
        .to_string();
    let dir_name = directory.unwrap_or_else(|| repo_id.clone());
    let root = PathBuf::from(&dir_name);

    let client = HubClient::new(url.clone(), token.clone());
    let outcome = client
        .clone_repo(CloneBody { branch: branch.clone(), depth, single_track })
        .await?;
    let branch_name = branch.unwrap_or_else(|| outcome.default_branch.clone());

    std::fs::create_dir_all(&root)?;
    let ws = Workspace::init(&root, &branch_name)?;
    let mut config = ws.load_config()?;
    config.remotes.insert(DEFAULT_REMOTE.to_string(), RemoteConfig { url });
    if let Some(token) = token {
        config.auth = Some(AuthConfig { token });
    }
    config.save(&ws.config_path())?;

    for object in &outcome.objects {
        ws.store_object(object)?;
    }
    for commit in &outcome.commits {
        ws.store_commit(commit)?;
    }
    ws.set_branch_head(&branch_name, &outcome.remote_head)?;
    ws.set_remote_tracking_head(DEFAULT_REMOTE, &branch_name, &outcome.remote_head)?;

    println!(
        "Cloned {} into {dir_name} ({} commits)",
        outcome.repo_id,
        outcome.commits.len()
    );
    Ok(())
}

/// Records a new local commit from a project-state JSON file on disk,
/// advancing the current branch. The building block that gives `push`
/// something new to send — the Hub itself never originates commits.
pub async fn commit(message: String, state_path: PathBuf) -> anyhow::Result<()> {
    let ws = Workspace::discover(Path::new("."))?;
    let branch = ws.head_branch()?;
    let parent = ws.branch_head(&branch)?;

    let raw = std::fs::read_to_string(&state_path)
        .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", state_path.display()))?;
    let data: serde_json::Value = serde_json::from_str(&raw)
        .map_err(|e| anyhow::anyhow!("failed to parse {}: {e}", state_path.display()))?;

    let obj_id = object_id(&data);
    let object = Object { id: obj_id.clone(), data };
    ws.store_object(&object)?;

    let parent_ids: Vec<String> = parent.into_iter().collect();
    let metadata: BTreeMap<String, serde_json::Value> = BTreeMap::new();
    let created_at = chrono::Utc::now();
    let id = commit_id(&CommitPreimage {
        repo_id: "local",
        object_id: &obj_id,
        parent_ids: &parent_ids,
        message: &message,
        author: whoami(),
        created_at,
        metadata: &metadata,
    });

    let commit = Commit {
        id: id.clone(),
        repo_id: "local".to_string(),
        object_id: obj_id,
        parent_ids,
        message,
        author: whoami().to_string(),
        created_at,
        metadata,
    };
    ws.store_commit(&commit)?;
    ws.set_branch_head(&branch, &id)?;

    println!("[{branch} {}] {}", &id[..id.len().min(12)], commit.message);
    Ok(())
}

fn whoami() -> &'static str {
    "local"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn commit_then_push_requires_a_remote() {
        let dir = tempfile::tempdir().unwrap();
        std::env::set_current_dir(dir.path()).unwrap();
        Workspace::init(dir.path(), DEFAULT_BRANCH).unwrap();

        let state_path = dir.path().join("state.json");
        std::fs::write(&state_path, r#"{"tracks":[]}"#).unwrap();
        commit("initial snapshot".to_string(), state_path).await.unwrap();

        let err = push(None, None, false).await.unwrap_err();
        assert!(err.to_string().contains("no such remote"));
    }
}
