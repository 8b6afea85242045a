//! Transaction planning
//!
//! Pure, deterministic translation of a claim draft into the ordered steps
//! required to publish it. Ordering is significant: entity creations come
//! first (subject, predicate, object), then the relationship creation,
//! then exactly one stake deposit; later steps consume IDs produced by
//! earlier ones.

use alloy::primitives::{TxHash, U256};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::{entity_creation_fee, relationship_creation_fee, GAS_PER_STEP};

/// Position of an entity within a claim triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntitySlot {
    Subject,
    Predicate,
    Object,
}

impl EntitySlot {
    pub const ALL: [EntitySlot; 3] = [EntitySlot::Subject, EntitySlot::Predicate, EntitySlot::Object];

    pub fn name(&self) -> &'static str {
        match self {
            EntitySlot::Subject => "subject",
            EntitySlot::Predicate => "predicate",
            EntitySlot::Object => "object",
        }
    }
}

/// Reference to an entity record: either an existing on-chain ID or a label
/// for a record that must be created first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum EntityRef {
    Existing { id: U256 },
    New { label: String },
}

impl EntityRef {
    pub fn existing_id(&self) -> Option<U256> {
        match self {
            EntityRef::Existing { id } => Some(*id),
            EntityRef::New { .. } => None,
        }
    }

    pub fn is_new(&self) -> bool {
        matches!(self, EntityRef::New { .. })
    }
}

/// A claim draft supplied by the caller. Read-only to this crate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimDraft {
    pub subject: EntityRef,
    pub predicate: EntityRef,
    pub object: EntityRef,
    /// An already-published relationship to stake on instead of creating
    /// a new one.
    #[serde(default)]
    pub existing_relationship: Option<U256>,
}

impl ClaimDraft {
    pub fn entity_ref(&self, slot: EntitySlot) -> &EntityRef {
        match slot {
            EntitySlot::Subject => &self.subject,
            EntitySlot::Predicate => &self.predicate,
            EntitySlot::Object => &self.object,
        }
    }
}

/// Which side of the claim the stake takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StakeSide {
    For,
    Against,
}

impl std::fmt::Display for StakeSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StakeSide::For => write!(f, "for"),
            StakeSide::Against => write!(f, "against"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stake {
    pub amount: U256,
    pub side: StakeSide,
}

/// What a single step does on-chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepKind {
    /// Create the entity record for one slot of the triple.
    CreateEntity { slot: EntitySlot, label: String },
    CreateRelationship,
    DepositStake,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepStatus {
    Pending,
    Signing,
    Confirming,
    Confirmed,
    Failed,
}

impl std::fmt::Display for StepStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            StepStatus::Pending => "pending",
            StepStatus::Signing => "signing",
            StepStatus::Confirming => "confirming",
            StepStatus::Confirmed => "confirmed",
            StepStatus::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}

/// One planned transaction. Created by the planner in `Pending` and mutated
/// in place by the executor; never created mid-execution.
#[derive(Debug, Clone)]
pub struct TransactionStep {
    pub id: Uuid,
    pub kind: StepKind,
    pub description: String,
    pub status: StepStatus,
    pub tx_hash: Option<TxHash>,
    pub error: Option<String>,
}

impl TransactionStep {
    fn new(kind: StepKind, description: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            description,
            status: StepStatus::Pending,
            tx_hash: None,
            error: None,
        }
    }
}

/// An ordered plan plus its cost estimate.
#[derive(Debug, Clone)]
pub struct TransactionPlan {
    pub steps: Vec<TransactionStep>,
    /// Stake amount plus one creation fee per create step. Always at least
    /// the stake amount.
    pub total_cost: U256,
    /// Coarse advisory figure; not used for correctness.
    pub estimated_gas: U256,
}

/// Build the ordered step list for publishing `draft` with `stake`.
///
/// One `CreateEntity` per `New` reference in subject→predicate→object
/// order, one `CreateRelationship` unless the draft points at an existing
/// relationship, and always exactly one trailing `DepositStake`.
pub fn build_plan(draft: &ClaimDraft, stake: &Stake) -> TransactionPlan {
    let mut steps = Vec::new();
    let mut total_cost = stake.amount;

    for slot in EntitySlot::ALL {
        if let EntityRef::New { label } = draft.entity_ref(slot) {
            steps.push(TransactionStep::new(
                StepKind::CreateEntity {
                    slot,
                    label: label.clone(),
                },
                format!("Create entity \"{}\"", label),
            ));
            total_cost += entity_creation_fee();
        }
    }

    if draft.existing_relationship.is_none() {
        steps.push(TransactionStep::new(
            StepKind::CreateRelationship,
            "Create relationship record".to_string(),
        ));
        total_cost += relationship_creation_fee();
    }

    steps.push(TransactionStep::new(
        StepKind::DepositStake,
        format!("Deposit stake ({})", stake.side),
    ));

    let estimated_gas = U256::from(steps.len() as u64 * GAS_PER_STEP);

    TransactionPlan {
        steps,
        total_cost,
        estimated_gas,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn existing(id: u64) -> EntityRef {
        EntityRef::Existing { id: U256::from(id) }
    }

    fn new_ref(label: &str) -> EntityRef {
        EntityRef::New {
            label: label.to_string(),
        }
    }

    fn draft(subject: EntityRef, predicate: EntityRef, object: EntityRef) -> ClaimDraft {
        ClaimDraft {
            subject,
            predicate,
            object,
            existing_relationship: None,
        }
    }

    fn stake(amount_wei: u128) -> Stake {
        Stake {
            amount: U256::from(amount_wei),
            side: StakeSide::For,
        }
    }

    #[test]
    fn step_count_scales_with_new_entities() {
        // k new entities and no existing relationship: k + 2 steps.
        let cases = [
            (draft(existing(1), existing(2), existing(3)), 2),
            (draft(new_ref("a"), existing(2), existing(3)), 3),
            (draft(new_ref("a"), new_ref("b"), existing(3)), 4),
            (draft(new_ref("a"), new_ref("b"), new_ref("c")), 5),
        ];
        for (d, expected) in cases {
            let plan = build_plan(&d, &stake(1));
            assert_eq!(plan.steps.len(), expected);
        }
    }

    #[test]
    fn existing_relationship_drops_create_step() {
        let mut d = draft(new_ref("a"), existing(2), existing(3));
        d.existing_relationship = Some(U256::from(44));

        let plan = build_plan(&d, &stake(1));
        // k + 1 steps: one create, one deposit.
        assert_eq!(plan.steps.len(), 2);
        assert!(!plan
            .steps
            .iter()
            .any(|s| s.kind == StepKind::CreateRelationship));
    }

    #[test]
    fn cost_formula() {
        let stake_amount = 1_000u128;
        let d = draft(new_ref("a"), new_ref("b"), existing(3));
        let plan = build_plan(&d, &stake(stake_amount));

        let expected = U256::from(stake_amount)
            + entity_creation_fee() * U256::from(2)
            + relationship_creation_fee();
        assert_eq!(plan.total_cost, expected);
        assert!(plan.total_cost >= U256::from(stake_amount));
    }

    #[test]
    fn cost_with_existing_relationship_omits_relationship_fee() {
        let mut d = draft(existing(1), existing(2), existing(3));
        d.existing_relationship = Some(U256::from(44));

        let plan = build_plan(&d, &stake(500));
        assert_eq!(plan.total_cost, U256::from(500));
    }

    #[test]
    fn steps_ordered_subject_predicate_object_then_relationship_then_deposit() {
        let d = draft(new_ref("s"), new_ref("p"), new_ref("o"));
        let plan = build_plan(&d, &stake(1));

        let kinds: Vec<_> = plan.steps.iter().map(|s| s.kind.clone()).collect();
        assert_eq!(
            kinds,
            vec![
                StepKind::CreateEntity {
                    slot: EntitySlot::Subject,
                    label: "s".into()
                },
                StepKind::CreateEntity {
                    slot: EntitySlot::Predicate,
                    label: "p".into()
                },
                StepKind::CreateEntity {
                    slot: EntitySlot::Object,
                    label: "o".into()
                },
                StepKind::CreateRelationship,
                StepKind::DepositStake,
            ]
        );
    }

    #[test]
    fn all_steps_start_pending_with_unique_ids() {
        let d = draft(new_ref("a"), new_ref("b"), new_ref("c"));
        let plan = build_plan(&d, &stake(1));

        assert!(plan.steps.iter().all(|s| s.status == StepStatus::Pending));
        assert!(plan.steps.iter().all(|s| s.tx_hash.is_none()));
        let mut ids: Vec<_> = plan.steps.iter().map(|s| s.id).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), plan.steps.len());
    }

    #[test]
    fn estimated_gas_scales_with_step_count() {
        let d = draft(new_ref("a"), existing(2), existing(3));
        let plan = build_plan(&d, &stake(1));
        assert_eq!(
            plan.estimated_gas,
            U256::from(plan.steps.len() as u64 * crate::config::GAS_PER_STEP)
        );
    }

    #[test]
    fn publish_bitcoin_claim_plan() {
        // Three new entities, 0.001 ETH stake on the "for" side.
        let d = draft(new_ref("Bitcoin"), new_ref("is"), new_ref("cryptocurrency"));
        let s = Stake {
            amount: U256::from(1_000_000_000_000_000u128),
            side: StakeSide::For,
        };
        let plan = build_plan(&d, &s);

        assert_eq!(plan.steps.len(), 5);
        assert_eq!(
            plan.total_cost,
            s.amount + entity_creation_fee() * U256::from(3) + relationship_creation_fee()
        );

        // Same triple staked onto an already-published relationship: the
        // relationship step and its fee drop out.
        let mut d = d;
        d.existing_relationship = Some(U256::from(9));
        let plan = build_plan(&d, &s);
        assert_eq!(plan.steps.len(), 4); // 3 creates + deposit
        assert_eq!(
            plan.total_cost,
            s.amount + entity_creation_fee() * U256::from(3)
        );
    }

    #[test]
    fn draft_serde_roundtrip() {
        let raw = r#"{
            "subject": {"kind": "new", "label": "Bitcoin"},
            "predicate": {"kind": "existing", "id": "0x2"},
            "object": {"kind": "new", "label": "cryptocurrency"}
        }"#;
        let parsed: ClaimDraft = serde_json::from_str(raw).unwrap();
        assert!(parsed.subject.is_new());
        assert_eq!(parsed.predicate.existing_id(), Some(U256::from(2)));
        assert!(parsed.existing_relationship.is_none());

        let back = serde_json::to_string(&parsed).unwrap();
        let reparsed: ClaimDraft = serde_json::from_str(&back).unwrap();
        assert_eq!(reparsed.subject, parsed.subject);
    }
}
