// SPDX-License-Identifier: MIT OR Apache-2.0
//! `.muse/config.toml`: the Bearer token used to authenticate against a
//! Muse Hub daemon, and the set of configured remotes.
//!
//! Security note: the auth token must never appear in a log line or error
//! message in anything other than its masked form. [`AuthConfig`]'s `Debug`
//! impl enforces this; callers that need to log a config value should log
//! the `MuseConfig` (or `AuthConfig`), never `token` directly.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

/// Parsed `.muse/config.toml`.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct MuseConfig {
    #[serde(default)]
    pub auth: Option<AuthConfig>,
    #[serde(default)]
    pub remotes: BTreeMap<String, RemoteConfig>,
}

/// Bearer-token credentials for talking to a Muse Hub daemon.
#[derive(Clone, Deserialize, Serialize)]
pub struct AuthConfig {
    pub token: String,
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig").field("token", &"Bearer ***").finish()
    }
}

/// A named remote: just the base URL of the repo resource on the Hub,
/// e.g. `http://localhost:8420/api/v1/musehub/repos/<repo_id>`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RemoteConfig {
    pub url: String,
}

impl MuseConfig {
    /// Loads `.muse/config.toml`, or returns an empty config if the file
    /// does not exist yet (a freshly `init`-ed repo has none).
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("failed to read config file '{}': {e}", path.display()))?;
        toml::from_str(&content)
            .map_err(|e| anyhow::anyhow!("failed to parse config file '{}': {e}", path.display()))
    }

    /// Writes `.muse/config.toml` back out.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| anyhow::anyhow!("failed to serialize config: {e}"))?;
        std::fs::write(path, content)
            .map_err(|e| anyhow::anyhow!("failed to write config file '{}': {e}", path.display()))?;
        Ok(())
    }

    /// The token to send as `Authorization: Bearer <token>`, if configured.
    #[must_use]
    pub fn token(&self) -> Option<&str> {
        self.auth.as_ref().map(|a| a.token.as_str())
    }

    /// Looks up a remote by name.
    #[must_use]
    pub fn remote(&self, name: &str) -> Option<&RemoteConfig> {
        self.remotes.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_debug_never_prints_the_raw_token() {
        let auth = AuthConfig { token: "super-secret-value".to_string() };
        let rendered = format!("{auth:?}");
        assert!(!rendered.contains("super-secret-value"));
        assert!(rendered.contains("Bearer ***"));
    }

    #[test]
    fn load_missing_file_returns_default() {
        let config = MuseConfig::load(Path::new("/nonexistent/.muse/config.toml")).unwrap();
        assert!(config.auth.is_none());
        assert!(config.remotes.is_empty());
    }

    #[test]
    fn round_trips_through_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut config = MuseConfig::default();
        config.auth = Some(AuthConfig { token: "tok".to_string() });
        config.remotes.insert(
            "origin".to_string(),
            RemoteConfig { url: "http://localhost:8420/api/v1/musehub/repos/r1".to_string() },
        );
        config.save(&path).unwrap();

        let loaded = MuseConfig::load(&path).unwrap();
        assert_eq!(loaded.token(), Some("tok"));
        assert_eq!(loaded.remote("origin").unwrap().url, config.remotes["origin"].url);
    }
}
