// SPDX-License-Identifier: MIT OR Apache-2.0
//! A minimal in-process `DAWAdapter` for tests and local development.

use crate::{DAWAdapter, Phase, ToolRegistry, ValidationResult};
use async_trait::async_trait;
use muse_error::MuseError;
use std::collections::HashSet;

/// Accepts every call its registry declares and echoes parameters back.
///
/// Used by `muse-variation`'s tests and by `muse-daemon` when no real DAW
/// client is configured (e.g. local smoke-testing).
#[derive(Debug, Default)]
pub struct MockDawAdapter {
    registry: ToolRegistry,
}

impl MockDawAdapter {
    /// A mock adapter exposing the given tool registry.
    #[must_use]
    pub fn new(registry: ToolRegistry) -> Self {
        Self { registry }
    }

    /// A mock adapter with a small built-in registry covering the three
    /// phases: `set_tempo`/`set_key` (setup), `add_notes`/`remove_notes`/
    /// `add_controller_events` (instrument), `set_bus_volume` (mixing).
    #[must_use]
    pub fn with_default_registry() -> Self {
        let mut registry = ToolRegistry::default();
        for tool in ["set_tempo", "set_key"] {
            registry.server_side_tools.insert(tool.to_string());
            registry
                .categories
                .insert(tool.to_string(), "setup".to_string());
        }
        for tool in ["add_notes", "remove_notes", "add_controller_events"] {
            registry.daw_tools.insert(tool.to_string());
            registry
                .categories
                .insert(tool.to_string(), "instrument".to_string());
        }
        registry.daw_tools.insert("set_bus_volume".to_string());
        registry
            .categories
            .insert("set_bus_volume".to_string(), "mixing".to_string());
        Self::new(registry)
    }
}

#[async_trait]
impl DAWAdapter for MockDawAdapter {
    fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    fn validate_tool_call(
        &self,
        name: &str,
        _params: &serde_json::Value,
        allowed_tools: &HashSet<String>,
    ) -> ValidationResult {
        if !self.registry.contains(name) {
            return ValidationResult::Invalid(format!("unknown tool: {name}"));
        }
        if !allowed_tools.is_empty() && !allowed_tools.contains(name) {
            return ValidationResult::Invalid(format!("tool not in allowed set: {name}"));
        }
        ValidationResult::Valid
    }

    fn phase_for_tool(&self, name: &str) -> Phase {
        match self.registry.categories.get(name).map(String::as_str) {
            Some("mixing") => Phase::Mixing,
            Some("setup") => Phase::Setup,
            _ => Phase::Instrument,
        }
    }

    async fn dispatch(
        &self,
        name: &str,
        params: serde_json::Value,
    ) -> Result<serde_json::Value, MuseError> {
        if !self.registry.contains(name) {
            return Err(MuseError::new(
                muse_error::ErrorCode::DawInvalidParams,
                format!("unknown tool: {name}"),
            ));
        }
        Ok(params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn dispatch_echoes_params_for_known_tool() {
        let adapter = MockDawAdapter::with_default_registry();
        let params = serde_json::json!({"pitch": 60});
        let result = adapter.dispatch("add_notes", params.clone()).await.unwrap();
        assert_eq!(result, params);
    }

    #[tokio::test]
    async fn dispatch_rejects_unknown_tool() {
        let adapter = MockDawAdapter::with_default_registry();
        let err = adapter
            .dispatch("delete_universe", serde_json::json!({}))
            .await
            .unwrap_err();
        assert_eq!(err.code, muse_error::ErrorCode::DawInvalidParams);
    }

    #[test]
    fn phase_classification_matches_default_registry() {
        let adapter = MockDawAdapter::with_default_registry();
        assert_eq!(adapter.phase_for_tool("set_tempo"), Phase::Setup);
        assert_eq!(adapter.phase_for_tool("add_notes"), Phase::Instrument);
        assert_eq!(adapter.phase_for_tool("set_bus_volume"), Phase::Mixing);
    }

    #[test]
    fn validate_tool_call_enforces_allowed_set() {
        let adapter = MockDawAdapter::with_default_registry();
        let mut allowed = HashSet::new();
        allowed.insert("add_notes".to_string());
        assert!(adapter
            .validate_tool_call("add_notes", &serde_json::json!({}), &allowed)
            .is_valid());
        assert!(!adapter
            .validate_tool_call("remove_notes", &serde_json::json!({}), &allowed)
            .is_valid());
    }
}
