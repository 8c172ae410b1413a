// SPDX-License-Identifier: MIT OR Apache-2.0
//! The variation lifecycle: propose an AI-generated edit, stream it phrase
//! by phrase, and commit or discard it against the project's canonical
//! [`muse_statestore::StateStore`].
//!
//! This crate is the only place that knows how a `Variation` moves through
//! its states, how its phrases are diffed out of a generation run, and how
//! its SSE stream is fanned out to subscribers. It depends on `muse-daw`
//! for the abstract tool-dispatch port and on `muse-statestore` for the
//! store it eventually commits into, but never on a concrete DAW adapter
//! or HTTP framework.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod broadcaster;
mod budget;
mod cancel;
mod executor;
mod mock_planner;
mod pipeline;
mod plan;
mod record;
mod state_machine;
mod store;

pub use broadcaster::SSEBroadcaster;
pub use budget::{BudgetLimit, BudgetRemaining, BudgetStatus, BudgetTracker, BudgetViolation};
pub use cancel::{CancellableRun, CancellationReason, CancellationToken};
pub use executor::{compute_variation_from_context, execute_plan, RegionMeta, VariationContext};
pub use mock_planner::FixedPlanPlanner;
pub use pipeline::{
    commit, discard, propose, run_generation, CommitOutcome, GenerationInputs, ProposeOutcome,
    UpdatedRegion,
};
pub use plan::{ExecutionPlan, Planner, ToolCall};
pub use record::VariationRecord;
pub use state_machine::{assert_transition, InvalidTransitionError, VariationStatus};
pub use store::VariationStore;
