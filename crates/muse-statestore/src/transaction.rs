// SPDX-License-Identifier: MIT OR Apache-2.0
//! Staged mutations awaiting `commit` or `rollback`.

use crate::note::{ControllerEvent, Note};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub(crate) enum StagedMutation {
    AddNotes {
        region_id: String,
        notes: Vec<Note>,
    },
    RemoveNotes {
        region_id: String,
        note_ids: Vec<String>,
    },
    AddControllerEvents {
        region_id: String,
        events: Vec<ControllerEvent>,
    },
    SetTempo(f64),
    SetKey(String),
}

/// A handle to a store's single active transaction.
///
/// Only one `Transaction` can be open on a `StateStore` at a time —
/// `begin_transaction` fails while one is outstanding. Mutations recorded
/// through the transaction's store methods are staged here; they take
/// effect only when the transaction is passed to
/// [`StateStore::commit`](crate::StateStore::commit).
#[derive(Debug)]
pub struct Transaction {
    pub(crate) id: Uuid,
    /// Caller-supplied label, surfaced in logs and event context.
    pub label: String,
    pub(crate) mutations: Vec<StagedMutation>,
}

impl Transaction {
    pub(crate) fn new(label: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            label: label.into(),
            mutations: Vec::new(),
        }
    }

    /// The transaction's unique identifier.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Number of mutations staged so far.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.mutations.len()
    }
}
