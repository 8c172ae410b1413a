// SPDX-License-Identifier: MIT OR Apache-2.0
//! The abstract DAW adapter port.
//!
//! This is the only DAW interface the variation pipeline may depend on.
//! A concrete adapter (vendor tool vocabulary, parameter validation rules,
//! transport to the DAW client) lives outside this crate and implements
//! [`DAWAdapter`]; the pipeline only ever calls through the trait, so the
//! same executor works unmodified against any DAW.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod mock;

pub use mock::MockDawAdapter;

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};

/// Which part of the three-phase execution a tool belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Project-level tools: tempo, key.
    Setup,
    /// Per-instrument tools: note/CC edits on a track's regions.
    Instrument,
    /// Bus/send/volume/pan tools.
    Mixing,
}

impl Phase {
    /// The canonical lowercase name used in logs and diagnostics.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Setup => "setup",
            Phase::Instrument => "instrument",
            Phase::Mixing => "mixing",
        }
    }
}

/// Immutable snapshot of every tool a DAW adapter exposes.
///
/// Maestro's planner reads `tool_schemas`/`tool_meta` to build its prompt;
/// the executor reads `server_side_tools`/`daw_tools` to decide dispatch
/// target, and `categories` to group Phase 2 work by instrument.
#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    /// Tool definitions in the adapter's native MCP-style wire shape.
    pub tool_defs: Vec<serde_json::Value>,
    /// Tool definitions in OpenAI function-calling schema shape, as sent
    /// to the planner collaborator.
    pub tool_schemas: Vec<serde_json::Value>,
    /// Per-tool metadata (description, parameter shape), keyed by name.
    pub tool_meta: HashMap<String, serde_json::Value>,
    /// Names of tools Maestro executes itself (no DAW round-trip).
    pub server_side_tools: HashSet<String>,
    /// Names of tools forwarded to the DAW client for execution.
    pub daw_tools: HashSet<String>,
    /// Tool name → category string (used to group Phase 2 instrument work).
    pub categories: HashMap<String, String>,
}

impl ToolRegistry {
    /// Whether `name` is a known tool in either the server-side or DAW set.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.server_side_tools.contains(name) || self.daw_tools.contains(name)
    }
}

/// Outcome of validating a tool call against a DAW adapter's schema and
/// constraints.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationResult {
    /// The call is well-formed and allowed.
    Valid,
    /// The call was rejected, with a human-readable reason.
    Invalid(String),
}

impl ValidationResult {
    /// Whether this result is [`ValidationResult::Valid`].
    #[must_use]
    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationResult::Valid)
    }
}

/// Port that every DAW integration must satisfy.
///
/// The variation pipeline calls these methods; a concrete adapter wires
/// them to DAW-specific vocabulary, validation rules, and transport.
#[async_trait]
pub trait DAWAdapter: Send + Sync {
    /// The full tool vocabulary this DAW exposes.
    fn registry(&self) -> &ToolRegistry;

    /// Validate a tool call against the DAW's schema and constraints,
    /// given the set of tools the current execution is allowed to use.
    fn validate_tool_call(
        &self,
        name: &str,
        params: &serde_json::Value,
        allowed_tools: &HashSet<String>,
    ) -> ValidationResult;

    /// Classify a tool into an execution phase.
    fn phase_for_tool(&self, name: &str) -> Phase;

    /// Forward a tool call to the DAW client and await its result.
    ///
    /// Server-side tools never reach this method — the executor applies
    /// them directly against the `StateStore` instead.
    async fn dispatch(
        &self,
        name: &str,
        params: serde_json::Value,
    ) -> Result<serde_json::Value, muse_error::MuseError>;
}
