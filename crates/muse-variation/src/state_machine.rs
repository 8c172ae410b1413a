// SPDX-License-Identifier: MIT OR Apache-2.0
//! The variation lifecycle and its valid transitions.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a variation sits in its propose/stream/review/commit lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariationStatus {
    /// Created, generation not yet started.
    Created,
    /// Phrases are being generated and streamed to subscribers.
    Streaming,
    /// Generation finished; the variation is awaiting commit or discard.
    Ready,
    /// Accepted and merged into project state. Terminal.
    Committed,
    /// Rejected without being applied. Terminal.
    Discarded,
    /// Generation failed. Terminal.
    Failed,
    /// Left unresolved past its time-to-live. Terminal.
    Expired,
}

impl VariationStatus {
    /// Whether no further transition is possible from this state.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            VariationStatus::Committed
                | VariationStatus::Discarded
                | VariationStatus::Failed
                | VariationStatus::Expired
        )
    }

    /// Whether a variation in this state may be committed.
    #[must_use]
    pub fn can_commit(self) -> bool {
        self == VariationStatus::Ready
    }

    /// Whether a variation in this state may be discarded.
    #[must_use]
    pub fn can_discard(self) -> bool {
        matches!(
            self,
            VariationStatus::Created | VariationStatus::Streaming | VariationStatus::Ready
        )
    }

    fn valid_targets(self) -> &'static [VariationStatus] {
        use VariationStatus::{Committed, Created, Discarded, Expired, Failed, Ready, Streaming};
        match self {
            Created => &[Streaming, Discarded, Failed, Expired],
            Streaming => &[Ready, Discarded, Failed, Expired],
            Ready => &[Committed, Discarded, Failed, Expired],
            Committed | Discarded | Failed | Expired => &[],
        }
    }

    /// Whether `self -> to` is a legal transition.
    #[must_use]
    pub fn can_transition_to(self, to: VariationStatus) -> bool {
        self.valid_targets().contains(&to)
    }
}

impl fmt::Display for VariationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            VariationStatus::Created => "created",
            VariationStatus::Streaming => "streaming",
            VariationStatus::Ready => "ready",
            VariationStatus::Committed => "committed",
            VariationStatus::Discarded => "discarded",
            VariationStatus::Failed => "failed",
            VariationStatus::Expired => "expired",
        };
        f.write_str(s)
    }
}

/// A requested transition was not legal from the variation's current state.
#[derive(Debug, thiserror::Error)]
#[error("invalid variation transition: {from} -> {to}")]
pub struct InvalidTransitionError {
    /// The state the variation was in.
    pub from: VariationStatus,
    /// The state the caller tried to move it to.
    pub to: VariationStatus,
}

/// Validate a transition, or describe why it is illegal.
pub fn assert_transition(
    from: VariationStatus,
    to: VariationStatus,
) -> Result<(), InvalidTransitionError> {
    if from.can_transition_to(to) {
        Ok(())
    } else {
        Err(InvalidTransitionError { from, to })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use VariationStatus::{Committed, Created, Discarded, Expired, Failed, Ready, Streaming};

    #[test]
    fn created_can_move_to_streaming_discarded_failed_expired() {
        for target in [Streaming, Discarded, Failed, Expired] {
            assert!(Created.can_transition_to(target));
        }
        assert!(!Created.can_transition_to(Ready));
        assert!(!Created.can_transition_to(Committed));
    }

    #[test]
    fn ready_can_commit_or_discard_but_not_restream() {
        assert!(Ready.can_transition_to(Committed));
        assert!(Ready.can_transition_to(Discarded));
        assert!(!Ready.can_transition_to(Streaming));
    }

    #[test]
    fn terminal_states_accept_nothing() {
        for terminal in [Committed, Discarded, Failed, Expired] {
            assert!(terminal.is_terminal());
            for target in [Created, Streaming, Ready, Committed, Discarded, Failed, Expired] {
                assert!(!terminal.can_transition_to(target));
            }
        }
    }

    #[test]
    fn can_commit_only_from_ready() {
        assert!(Ready.can_commit());
        assert!(!Streaming.can_commit());
        assert!(!Created.can_commit());
    }

    #[test]
    fn can_discard_from_any_non_terminal_state() {
        assert!(Created.can_discard());
        assert!(Streaming.can_discard());
        assert!(Ready.can_discard());
        assert!(!Committed.can_discard());
    }

    #[test]
    fn assert_transition_reports_from_and_to() {
        let err = assert_transition(Committed, Streaming).unwrap_err();
        assert_eq!(err.from, Committed);
        assert_eq!(err.to, Streaming);
        assert!(assert_transition(Created, Streaming).is_ok());
    }

    #[test]
    fn display_matches_wire_vocabulary() {
        assert_eq!(Ready.to_string(), "ready");
        assert_eq!(Expired.to_string(), "expired");
    }
}
