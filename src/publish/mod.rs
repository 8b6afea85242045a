//! Claim publishing: transaction planning and execution
//!
//! [`build_plan`] turns a claim draft into an ordered list of on-chain
//! steps with a cost estimate; [`TransactionExecutor`] walks that plan
//! against the chain clients, reporting step transitions to an observer
//! and returning a [`PublishResult`] that captures partial progress on
//! failure.

mod executor;
mod plan;

pub use executor::{PublishResult, TransactionExecutor};
pub use plan::{
    build_plan, ClaimDraft, EntityRef, EntitySlot, Stake, StakeSide, StepKind, StepStatus,
    TransactionPlan, TransactionStep,
};
