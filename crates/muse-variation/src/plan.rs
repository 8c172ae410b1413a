// SPDX-License-Identifier: MIT OR Apache-2.0
//! The execution plan a planner collaborator produces for a variation.

use async_trait::async_trait;
use muse_daw::ToolRegistry;
use muse_error::MuseError;
use serde::{Deserialize, Serialize};

/// One tool invocation the plan wants executed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    /// Name of the tool to invoke, as known to the `ToolRegistry`.
    pub name: String,
    /// Call parameters, tool-specific.
    pub params: serde_json::Value,
    /// Instrument group this call belongs to (Phase 2 only). Calls sharing
    /// a key (case-insensitively) execute as one bounded-parallelism group.
    #[serde(default)]
    pub instrument_key: Option<String>,
}

/// An ordered sequence of tool calls a planner wants the executor to run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutionPlan {
    /// The calls to make, in the order the planner emitted them.
    pub calls: Vec<ToolCall>,
}

/// Produces an [`ExecutionPlan`] for a natural-language intent.
///
/// This is the seam between the pipeline and whatever LLM collaborator
/// turns "add a syncopated hi-hat pattern" into concrete tool calls; the
/// pipeline itself never constructs tool calls directly.
#[async_trait]
pub trait Planner: Send + Sync {
    /// Plan the tool calls needed to realize `intent` against the given
    /// tool vocabulary.
    async fn plan(&self, intent: &str, registry: &ToolRegistry) -> Result<ExecutionPlan, MuseError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_call_instrument_key_defaults_to_none() {
        let json = serde_json::json!({"name": "set_tempo", "params": {"bpm": 120}});
        let call: ToolCall = serde_json::from_value(json).unwrap();
        assert!(call.instrument_key.is_none());
    }
}
