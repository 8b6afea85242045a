//! Transaction execution
//!
//! Walks a plan one step at a time: sign and submit through the
//! write-client, block on the receipt, decode the step's event from the
//! receipt logs, and carry the recovered ID forward to later steps. The
//! first failure stops the loop. Mined transactions cannot be rolled back,
//! so everything completed before the failure is returned to the caller
//! for display and re-planning.

use alloy::primitives::{Address, TxHash, U256};
use std::sync::Arc;

use crate::chain::{abi, ContractCall, ReadClient, WriteClient};
use crate::publish::plan::{
    ClaimDraft, EntitySlot, Stake, StakeSide, StepKind, StepStatus, TransactionPlan,
    TransactionStep,
};
use crate::wallet::UnlockedHandle;
use crate::{Error, Result};

/// Terminal value of one execution. Never mutated after return.
#[derive(Debug, Clone, Default)]
pub struct PublishResult {
    pub success: bool,
    pub relationship_id: Option<U256>,
    pub entities_created: Vec<U256>,
    pub transaction_hashes: Vec<TxHash>,
    pub shares_received: Option<U256>,
    pub error: Option<String>,
}

/// IDs accumulated across steps: seeded from `Existing` references, filled
/// in from decoded receipt events as creation steps confirm.
#[derive(Debug, Default)]
struct ResolvedIds {
    subject: Option<U256>,
    predicate: Option<U256>,
    object: Option<U256>,
    relationship: Option<U256>,
    shares: Option<U256>,
}

impl ResolvedIds {
    fn seed(draft: &ClaimDraft) -> Self {
        Self {
            subject: draft.subject.existing_id(),
            predicate: draft.predicate.existing_id(),
            object: draft.object.existing_id(),
            relationship: draft.existing_relationship,
            shares: None,
        }
    }

    fn slot(&self, slot: EntitySlot) -> Option<U256> {
        match slot {
            EntitySlot::Subject => self.subject,
            EntitySlot::Predicate => self.predicate,
            EntitySlot::Object => self.object,
        }
    }

    fn assign_slot(&mut self, slot: EntitySlot, id: U256) {
        match slot {
            EntitySlot::Subject => self.subject = Some(id),
            EntitySlot::Predicate => self.predicate = Some(id),
            EntitySlot::Object => self.object = Some(id),
        }
    }
}

/// What a confirmed step produced, for the running result.
enum StepOutput {
    Entity(U256),
    Relationship(U256),
    Shares(U256),
}

/// Sequential state machine over a [`TransactionPlan`]. One instance per
/// execution; callers must serialize executions against one wallet.
pub struct TransactionExecutor {
    read: Arc<dyn ReadClient>,
    write: Arc<dyn WriteClient>,
    registry: Address,
    /// Balance snapshot used for the pre-flight cost check.
    cached_balance: U256,
}

impl TransactionExecutor {
    pub fn new(handle: &UnlockedHandle, registry: Address, cached_balance: U256) -> Self {
        Self {
            read: handle.read.clone(),
            write: handle.write.clone(),
            registry,
            cached_balance,
        }
    }

    /// Execute every step of `plan` in order.
    ///
    /// Never returns `Err`: failures are captured in the returned
    /// [`PublishResult`] and the failing step, because a partially-executed
    /// plan is meaningful data. `on_step` receives an owned snapshot of the
    /// step on every status transition.
    pub async fn execute(
        &self,
        draft: &ClaimDraft,
        stake: &Stake,
        plan: &mut TransactionPlan,
        mut on_step: impl FnMut(TransactionStep),
    ) -> PublishResult {
        let mut result = PublishResult::default();

        // Pre-flight: the cached balance must cover the whole plan. No
        // network calls are spent on a plan that cannot complete.
        if self.cached_balance < plan.total_cost {
            result.error = Some(format!(
                "insufficient balance: have {} wei, plan requires {} wei",
                self.cached_balance, plan.total_cost
            ));
            return result;
        }

        let mut resolved = ResolvedIds::seed(draft);

        for index in 0..plan.steps.len() {
            let outcome = self
                .run_step(&mut plan.steps[index], stake, &mut resolved, &mut on_step)
                .await;

            let step = &mut plan.steps[index];
            match outcome {
                Ok(output) => {
                    step.status = StepStatus::Confirmed;
                    on_step(step.clone());
                    if let Some(hash) = step.tx_hash {
                        result.transaction_hashes.push(hash);
                    }
                    match output {
                        StepOutput::Entity(id) => result.entities_created.push(id),
                        StepOutput::Relationship(id) => result.relationship_id = Some(id),
                        StepOutput::Shares(shares) => result.shares_received = Some(shares),
                    }
                }
                Err(e) => {
                    step.status = StepStatus::Failed;
                    step.error = Some(e.to_string());
                    on_step(step.clone());
                    tracing::warn!(
                        step = %step.description,
                        error = %e,
                        "publish stopped at failed step"
                    );
                    // Steps after this one stay pending; on-chain progress
                    // made so far is already recorded in the result.
                    result.relationship_id = resolved.relationship;
                    result.error = Some(e.to_string());
                    return result;
                }
            }
        }

        result.success = true;
        result.relationship_id = resolved.relationship;
        result.shares_received = resolved.shares;
        result
    }

    /// Run one step through signing, submission, confirmation, and log
    /// decoding. The final `Confirmed` transition belongs to the caller.
    async fn run_step(
        &self,
        step: &mut TransactionStep,
        stake: &Stake,
        resolved: &mut ResolvedIds,
        on_step: &mut impl FnMut(TransactionStep),
    ) -> Result<StepOutput> {
        step.status = StepStatus::Signing;
        on_step(step.clone());

        let call = self.prepare_call(&step.kind, stake, resolved).await?;

        let tx_hash = self.write.write_contract(call).await?;
        step.status = StepStatus::Confirming;
        step.tx_hash = Some(tx_hash);
        on_step(step.clone());
        tracing::debug!(tx_hash = %tx_hash, step = %step.description, "transaction submitted");

        let receipt = self.read.wait_for_receipt(tx_hash).await?;
        if !receipt.success {
            return Err(Error::Network(format!(
                "transaction reverted on-chain ({})",
                step.description
            )));
        }

        // A receipt can carry logs from other emitted events; anything that
        // does not decode as this step's event is skipped, not an error.
        match &step.kind {
            StepKind::CreateEntity { slot, label } => {
                let id = receipt
                    .logs
                    .iter()
                    .find_map(abi::decode_entity_created)
                    .ok_or_else(|| {
                        Error::Network(format!(
                            "no EntityCreated event in receipt while creating entity \"{}\"",
                            label
                        ))
                    })?;
                resolved.assign_slot(*slot, id);
                Ok(StepOutput::Entity(id))
            }
            StepKind::CreateRelationship => {
                let id = receipt
                    .logs
                    .iter()
                    .find_map(abi::decode_relationship_created)
                    .ok_or_else(|| {
                        Error::Network(
                            "no RelationshipCreated event in receipt while creating relationship"
                                .to_string(),
                        )
                    })?;
                resolved.relationship = Some(id);
                Ok(StepOutput::Relationship(id))
            }
            StepKind::DepositStake => {
                let shares = receipt
                    .logs
                    .iter()
                    .find_map(abi::decode_deposited_shares)
                    .ok_or_else(|| {
                        Error::Network(
                            "no Deposited event in receipt while depositing stake".to_string(),
                        )
                    })?;
                resolved.shares = Some(shares);
                Ok(StepOutput::Shares(shares))
            }
        }
    }

    /// Resolve a step's call parameters from accumulated state.
    ///
    /// A missing ID here means the planner and executor disagree about step
    /// ordering: a defect, not a user error.
    async fn prepare_call(
        &self,
        kind: &StepKind,
        stake: &Stake,
        resolved: &ResolvedIds,
    ) -> Result<ContractCall> {
        match kind {
            StepKind::CreateEntity { label, .. } => Ok(ContractCall {
                to: self.registry,
                calldata: abi::encode_create_entity(label),
                value: crate::config::entity_creation_fee(),
            }),
            StepKind::CreateRelationship => {
                let subject = require_slot(resolved, EntitySlot::Subject)?;
                let predicate = require_slot(resolved, EntitySlot::Predicate)?;
                let object = require_slot(resolved, EntitySlot::Object)?;
                Ok(ContractCall {
                    to: self.registry,
                    calldata: abi::encode_create_relationship(subject, predicate, object),
                    value: crate::config::relationship_creation_fee(),
                })
            }
            StepKind::DepositStake => {
                let relationship = resolved.relationship.ok_or_else(|| {
                    Error::Internal("missing relationship id for stake deposit".into())
                })?;
                let vault_id = match stake.side {
                    StakeSide::For => relationship,
                    StakeSide::Against => {
                        // The against-side vault is a separate pool; ask the
                        // registry for it rather than assuming an encoding.
                        let data = self
                            .read
                            .read_contract(
                                self.registry,
                                abi::encode_counter_vault_of(relationship),
                            )
                            .await?;
                        abi::decode_u256_return(&data)?
                    }
                };
                Ok(ContractCall {
                    to: self.registry,
                    calldata: abi::encode_deposit_stake(vault_id),
                    value: stake.amount,
                })
            }
        }
    }
}

fn require_slot(resolved: &ResolvedIds, slot: EntitySlot) -> Result<U256> {
    resolved.slot(slot).ok_or_else(|| {
        Error::Internal(format!(
            "missing {} entity id for relationship creation",
            slot.name()
        ))
    })
}
