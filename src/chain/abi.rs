//! Registry contract ABI
//!
//! Call and event types for the knowledge-graph registry, plus the decode
//! helpers the executor uses to recover generated record IDs from receipt
//! logs. Decoding is tolerant by design: a receipt can carry logs from other
//! events (or other contracts entirely), so helpers return `None` for
//! anything that does not decode as the expected event.

use alloy::primitives::{Bytes, LogData, U256};
use alloy::sol;
use alloy::sol_types::{SolCall, SolEvent, SolValue};

use crate::chain::LogEntry;
use crate::{Error, Result};

sol! {
    /// Emitted when a new entity record is materialized.
    event EntityCreated(uint256 indexed entityId, address indexed creator, string label);

    /// Emitted when a new relationship record links three entities.
    event RelationshipCreated(
        uint256 indexed relationshipId,
        uint256 subjectId,
        uint256 predicateId,
        uint256 objectId
    );

    /// Emitted when stake lands in a vault; `shares` is the minted position.
    event Deposited(address indexed sender, uint256 indexed vaultId, uint256 assets, uint256 shares);

    function createEntity(string label) external payable returns (uint256);
    function createRelationship(
        uint256 subjectId,
        uint256 predicateId,
        uint256 objectId
    ) external payable returns (uint256);
    function depositStake(uint256 vaultId) external payable returns (uint256);
    function counterVaultOf(uint256 relationshipId) external view returns (uint256);
}

pub fn encode_create_entity(label: &str) -> Bytes {
    createEntityCall {
        label: label.to_string(),
    }
    .abi_encode()
    .into()
}

pub fn encode_create_relationship(subject_id: U256, predicate_id: U256, object_id: U256) -> Bytes {
    createRelationshipCall {
        subjectId: subject_id,
        predicateId: predicate_id,
        objectId: object_id,
    }
    .abi_encode()
    .into()
}

pub fn encode_deposit_stake(vault_id: U256) -> Bytes {
    depositStakeCall { vaultId: vault_id }.abi_encode().into()
}

pub fn encode_counter_vault_of(relationship_id: U256) -> Bytes {
    counterVaultOfCall {
        relationshipId: relationship_id,
    }
    .abi_encode()
    .into()
}

/// Decode the single `uint256` returned by a registry view call.
pub fn decode_u256_return(data: &Bytes) -> Result<U256> {
    U256::abi_decode(data)
        .map_err(|e| Error::Network(format!("undecodable contract return: {}", e)))
}

fn log_data(log: &LogEntry) -> LogData {
    LogData::new_unchecked(log.topics.clone(), log.data.clone())
}

/// Entity ID from an `EntityCreated` log, or `None` if this log is some
/// other event.
pub fn decode_entity_created(log: &LogEntry) -> Option<U256> {
    EntityCreated::decode_log_data(&log_data(log))
        .ok()
        .map(|event| event.entityId)
}

/// Relationship ID from a `RelationshipCreated` log.
pub fn decode_relationship_created(log: &LogEntry) -> Option<U256> {
    RelationshipCreated::decode_log_data(&log_data(log))
        .ok()
        .map(|event| event.relationshipId)
}

/// Minted share count from a `Deposited` log.
pub fn decode_deposited_shares(log: &LogEntry) -> Option<U256> {
    Deposited::decode_log_data(&log_data(log))
        .ok()
        .map(|event| event.shares)
}
