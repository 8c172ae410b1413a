//! Unified error taxonomy with stable error codes for Muse Hub and Maestro.
//!
//! Every error that can cross the HTTP boundary carries a [`MuseError`]: a
//! stable machine-readable [`ErrorCode`], a human-readable message, an
//! optional cause chain, and arbitrary key-value context. Use the builder
//! returned by [`MuseError::new`] to construct errors fluently, and
//! [`MuseError::http_status`] to map one onto a response status code.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ---------------------------------------------------------------------------
// ErrorCategory
// ---------------------------------------------------------------------------

/// Broad family that an [`ErrorCode`] belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Request envelope / wire-format errors.
    Protocol,
    /// Authentication and authorization errors.
    Auth,
    /// Entity registry resolution errors.
    Registry,
    /// State store / optimistic-concurrency errors.
    State,
    /// Variation lifecycle and state-machine errors.
    Variation,
    /// DAW adapter port errors.
    Daw,
    /// Budget and resource-limit errors.
    Budget,
    /// Muse Hub VCS errors (repo/branch/commit/PR).
    Vcs,
    /// Configuration errors.
    Config,
    /// Catch-all for unexpected internal errors.
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Protocol => "protocol",
            Self::Auth => "auth",
            Self::Registry => "registry",
            Self::State => "state",
            Self::Variation => "variation",
            Self::Daw => "daw",
            Self::Budget => "budget",
            Self::Vcs => "vcs",
            Self::Config => "config",
            Self::Internal => "internal",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// ErrorCode
// ---------------------------------------------------------------------------

/// Machine-readable, stable error code.
///
/// Each variant serializes to a `SCREAMING_SNAKE_CASE` string that is
/// guaranteed not to change across patch releases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // -- Protocol --
    /// Request body failed to parse or has missing/invalid fields.
    ProtocolInvalidEnvelope,
    /// Requested API/contract version is not supported.
    ProtocolVersionMismatch,

    // -- Auth --
    /// No `Authorization: Bearer` header was supplied.
    AuthMissingToken,
    /// Token is malformed, expired, or fails signature verification.
    AuthInvalidToken,
    /// Token is valid but lacks the scope required for this operation.
    AuthInsufficientScope,

    // -- Registry --
    /// Referenced track/region/bus/project entity does not exist.
    EntityNotFound,
    /// Entity name is ambiguous or already claimed within its scope.
    EntityNameConflict,

    // -- State --
    /// No conversation/state store entry exists at the requested key.
    StateNotFound,
    /// Commit's expected base state no longer matches the live state.
    BaselineMismatch,

    // -- Variation --
    /// Referenced variation does not exist.
    VariationNotFound,
    /// Requested status transition is not legal from the current status.
    VariationInvalidTransition,
    /// Caller attempted an operation on a variation already in a terminal state.
    VariationTerminal,

    // -- Daw --
    /// DAW adapter rejected a tool call as outside its allowed set.
    DawToolDenied,
    /// DAW adapter rejected a tool call's parameters.
    DawInvalidParams,
    /// DAW adapter is not reachable or timed out.
    DawUnavailable,

    // -- Budget --
    /// A configured budget ceiling (time, tokens, phrases) was exceeded.
    BudgetExceeded,
    /// The run was cancelled before completion.
    Cancelled,

    // -- Vcs --
    /// Referenced repo does not exist.
    RepoNotFound,
    /// Referenced branch does not exist.
    BranchNotFound,
    /// Referenced commit does not exist.
    CommitNotFound,
    /// Referenced pull request does not exist.
    PullRequestNotFound,
    /// Push would not fast-forward and neither `force` nor
    /// `force_with_lease` was set.
    VcsNonFastForward,
    /// `force_with_lease` push's expected remote head did not match.
    VcsLeaseMismatch,
    /// Pull request is not open and cannot be merged or closed again.
    VcsPullRequestNotOpen,

    // -- Config --
    /// Configuration file or value is invalid.
    ConfigInvalid,

    // -- Internal --
    /// Catch-all for unexpected internal errors.
    Internal,
}

impl ErrorCode {
    /// Returns the broad [`ErrorCategory`] this code belongs to.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::ProtocolInvalidEnvelope | Self::ProtocolVersionMismatch => {
                ErrorCategory::Protocol
            }

            Self::AuthMissingToken | Self::AuthInvalidToken | Self::AuthInsufficientScope => {
                ErrorCategory::Auth
            }

            Self::EntityNotFound | Self::EntityNameConflict => ErrorCategory::Registry,

            Self::StateNotFound | Self::BaselineMismatch => ErrorCategory::State,

            Self::VariationNotFound
            | Self::VariationInvalidTransition
            | Self::VariationTerminal => ErrorCategory::Variation,

            Self::DawToolDenied | Self::DawInvalidParams | Self::DawUnavailable => {
                ErrorCategory::Daw
            }

            Self::BudgetExceeded | Self::Cancelled => ErrorCategory::Budget,

            Self::RepoNotFound
            | Self::BranchNotFound
            | Self::CommitNotFound
            | Self::PullRequestNotFound
            | Self::VcsNonFastForward
            | Self::VcsLeaseMismatch
            | Self::VcsPullRequestNotOpen => ErrorCategory::Vcs,

            Self::ConfigInvalid => ErrorCategory::Config,

            Self::Internal => ErrorCategory::Internal,
        }
    }

    /// Stable `&'static str` representation of the code (e.g.
    /// `"BASELINE_MISMATCH"`).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ProtocolInvalidEnvelope => "PROTOCOL_INVALID_ENVELOPE",
            Self::ProtocolVersionMismatch => "PROTOCOL_VERSION_MISMATCH",
            Self::AuthMissingToken => "AUTH_MISSING_TOKEN",
            Self::AuthInvalidToken => "AUTH_INVALID_TOKEN",
            Self::AuthInsufficientScope => "AUTH_INSUFFICIENT_SCOPE",
            Self::EntityNotFound => "ENTITY_NOT_FOUND",
            Self::EntityNameConflict => "ENTITY_NAME_CONFLICT",
            Self::StateNotFound => "STATE_NOT_FOUND",
            Self::BaselineMismatch => "BASELINE_MISMATCH",
            Self::VariationNotFound => "VARIATION_NOT_FOUND",
            Self::VariationInvalidTransition => "VARIATION_INVALID_TRANSITION",
            Self::VariationTerminal => "VARIATION_TERMINAL",
            Self::DawToolDenied => "DAW_TOOL_DENIED",
            Self::DawInvalidParams => "DAW_INVALID_PARAMS",
            Self::DawUnavailable => "DAW_UNAVAILABLE",
            Self::BudgetExceeded => "BUDGET_EXCEEDED",
            Self::Cancelled => "CANCELLED",
            Self::RepoNotFound => "REPO_NOT_FOUND",
            Self::BranchNotFound => "BRANCH_NOT_FOUND",
            Self::CommitNotFound => "COMMIT_NOT_FOUND",
            Self::PullRequestNotFound => "PULL_REQUEST_NOT_FOUND",
            Self::VcsNonFastForward => "VCS_NON_FAST_FORWARD",
            Self::VcsLeaseMismatch => "VCS_LEASE_MISMATCH",
            Self::VcsPullRequestNotOpen => "VCS_PULL_REQUEST_NOT_OPEN",
            Self::ConfigInvalid => "CONFIG_INVALID",
            Self::Internal => "INTERNAL",
        }
    }

    /// The HTTP status code `muse-daemon` should answer with for this code.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::ProtocolInvalidEnvelope | Self::ProtocolVersionMismatch => 400,

            Self::AuthMissingToken | Self::AuthInvalidToken => 401,
            Self::AuthInsufficientScope | Self::DawToolDenied => 403,

            Self::EntityNotFound
            | Self::StateNotFound
            | Self::VariationNotFound
            | Self::RepoNotFound
            | Self::BranchNotFound
            | Self::CommitNotFound
            | Self::PullRequestNotFound => 404,

            Self::EntityNameConflict
            | Self::BaselineMismatch
            | Self::VariationInvalidTransition
            | Self::VariationTerminal
            | Self::VcsNonFastForward
            | Self::VcsLeaseMismatch
            | Self::VcsPullRequestNotOpen => 409,

            Self::DawInvalidParams | Self::ConfigInvalid => 400,

            Self::BudgetExceeded => 429,
            Self::Cancelled => 499,
            Self::DawUnavailable => 503,

            Self::Internal => 500,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// MuseError
// ---------------------------------------------------------------------------

/// Unified Muse Hub / Maestro error.
///
/// Carries a stable [`ErrorCode`], a human-readable message, an optional
/// source error for cause-chaining, and arbitrary structured context.
///
/// # Builder usage
///
/// ```
/// use muse_error::{MuseError, ErrorCode};
///
/// let err = MuseError::new(ErrorCode::BaselineMismatch, "base state moved")
///     .with_context("expected", "state-7")
///     .with_context("actual", "state-9");
/// ```
#[derive(Debug, thiserror::Error)]
#[error("[{code}] {message}")]
pub struct MuseError {
    /// Machine-readable error code.
    pub code: ErrorCode,
    /// Human-readable description.
    pub message: String,
    /// Optional underlying cause.
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
    /// Arbitrary structured context for diagnostics.
    pub context: BTreeMap<String, serde_json::Value>,
}

impl MuseError {
    /// Create a new error with the given code and message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            source: None,
            context: BTreeMap::new(),
        }
    }

    /// Attach a key-value pair to the diagnostic context.
    ///
    /// The value is converted via [`serde_json::to_value`]; if serialization
    /// fails, the entry is silently skipped.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.context.insert(key.into(), v);
        }
        self
    }

    /// Attach an underlying cause.
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Shorthand for `self.code.category()`.
    pub fn category(&self) -> ErrorCategory {
        self.code.category()
    }

    /// Shorthand for `self.code.http_status()`.
    pub fn http_status(&self) -> u16 {
        self.code.http_status()
    }
}

// ---------------------------------------------------------------------------
// Serialization support
// ---------------------------------------------------------------------------

/// Serializable snapshot of a [`MuseError`] (without the opaque source),
/// the shape that goes out over the wire as an HTTP error body.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MuseErrorDto {
    /// Error code.
    pub code: ErrorCode,
    /// Human-readable message.
    pub message: String,
    /// Structured context.
    pub context: BTreeMap<String, serde_json::Value>,
    /// String representation of the source error, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_message: Option<String>,
}

impl From<&MuseError> for MuseErrorDto {
    fn from(err: &MuseError) -> Self {
        Self {
            code: err.code,
            message: err.message.clone(),
            context: err.context.clone(),
            source_message: err.source.as_ref().map(|s| s.to_string()),
        }
    }
}

impl From<MuseErrorDto> for MuseError {
    fn from(dto: MuseErrorDto) -> Self {
        Self {
            code: dto.code,
            message: dto.message,
            source: None,
            context: dto.context,
        }
    }
}
