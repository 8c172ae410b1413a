// SPDX-License-Identifier: MIT OR Apache-2.0
//! A deterministic stand-in for the LLM planner, for tests and local dev.

use crate::plan::{ExecutionPlan, Planner, ToolCall};
use async_trait::async_trait;
use muse_daw::ToolRegistry;
use muse_error::MuseError;

/// Always proposes the same fixed set of calls, regardless of intent.
///
/// Used exactly like `muse-daw`'s `MockDawAdapter`: it lets the rest of the
/// pipeline be exercised without a real planning collaborator on the line.
#[derive(Debug, Clone, Default)]
pub struct FixedPlanPlanner {
    calls: Vec<ToolCall>,
}

impl FixedPlanPlanner {
    /// A planner that always proposes the given calls.
    #[must_use]
    pub fn new(calls: Vec<ToolCall>) -> Self {
        Self { calls }
    }

    /// A small built-in plan: set the tempo, add notes to one instrument
    /// group, then adjust a bus volume — one call per execution phase.
    #[must_use]
    pub fn with_default_plan() -> Self {
        Self::new(vec![
            ToolCall {
                name: "set_tempo".to_string(),
                params: serde_json::json!({"bpm": 128}),
                instrument_key: None,
            },
            ToolCall {
                name: "add_notes".to_string(),
                params: serde_json::json!({"region_id": "region-1"}),
                instrument_key: Some("drums".to_string()),
            },
            ToolCall {
                name: "set_bus_volume".to_string(),
                params: serde_json::json!({"bus": "drums", "db": -3.0}),
                instrument_key: None,
            },
        ])
    }
}

#[async_trait]
impl Planner for FixedPlanPlanner {
    async fn plan(&self, _intent: &str, _registry: &ToolRegistry) -> Result<ExecutionPlan, MuseError> {
        Ok(ExecutionPlan {
            calls: self.calls.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn default_plan_has_one_call_per_phase() {
        let planner = FixedPlanPlanner::with_default_plan();
        let plan = planner.plan("add drums", &ToolRegistry::default()).await.unwrap();
        assert_eq!(plan.calls.len(), 3);
    }
}
