// SPDX-License-Identifier: MIT OR Apache-2.0
//! Versioned, transactional project state for a single conversation.
//!
//! A [`StateStore`] is the mutation boundary between Maestro's tool
//! dispatch and Muse Hub's VCS: every musical edit goes through it, every
//! edit produces exactly one [`event::StateEvent`], and every commit that
//! wants to be baseline-safe checks its `stateId` against
//! [`StateStore::check_state_id`] before applying anything.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod event;
mod note;
mod snapshot;
mod store;
mod transaction;

pub use event::{StateEvent, StateEventType};
pub use note::{ControllerEvent, Note};
pub use snapshot::SnapshotBundle;
pub use store::StateStore;
pub use transaction::Transaction;
