// SPDX-License-Identifier: MIT OR Apache-2.0
//! Shared domain and wire types for the Muse Hub VCS and the Maestro
//! variation pipeline.
//!
//! This crate holds only data: entities, variations, event envelopes, and
//! the VCS object model. No I/O, no business rules beyond what is encoded
//! directly in a type's shape (e.g. state machine enums live in
//! `muse-variation`, not here).

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod entity;
mod envelope;
mod hash;
mod variation;
mod vcs;

pub use entity::{Entity, EntityKind};
pub use envelope::{
    DonePayload, ErrorPayload, EventEnvelope, EventPayload, MetaPayload, SequenceCounter,
};
pub use hash::{canonical_json, sha256_hex, CoreError};
pub use variation::{ChangeType, MidiNoteSnapshot, NoteChange, Phrase};
pub use vcs::{Branch, Commit, Object, PrState, PullRequest, Repo, Visibility};

/// Stable identifier for the wire contract described by this crate.
///
/// Bump only on a breaking change to any `#[serde]` shape exported here.
pub const CONTRACT_VERSION: &str = "muse/v1";
