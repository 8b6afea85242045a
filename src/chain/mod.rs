//! Chain-client abstraction
//!
//! The core consumes exactly four operations: contract reads, transaction
//! writes, receipt waits, and balance reads. They are expressed as
//! object-safe traits so executions can run against the alloy-backed
//! implementation in [`rpc`] or against scripted fakes in tests. Transport
//! is out of scope; the traits deal in ABI-encoded calldata and decoded-log
//! material only.

pub mod abi;
pub mod rpc;

use alloy::primitives::{Address, Bytes, TxHash, B256, U256};
use async_trait::async_trait;
use std::sync::Arc;

use crate::config::NetworkProfile;
use crate::wallet::SecureWallet;
use crate::Result;

pub use rpc::AlloyClientFactory;

/// One emitted log entry from a transaction receipt.
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub address: Address,
    pub topics: Vec<B256>,
    pub data: Bytes,
}

/// A mined transaction's receipt, reduced to what the executor needs.
#[derive(Debug, Clone)]
pub struct Receipt {
    pub tx_hash: TxHash,
    /// On-chain execution status; a mined-but-reverted transaction is `false`.
    pub success: bool,
    pub logs: Vec<LogEntry>,
}

/// A prepared contract write: target, ABI-encoded calldata, attached value.
#[derive(Debug, Clone)]
pub struct ContractCall {
    pub to: Address,
    pub calldata: Bytes,
    pub value: U256,
}

/// Read-side chain operations.
#[async_trait]
pub trait ReadClient: Send + Sync {
    /// `eth_call` against `to` with ABI-encoded `calldata`.
    async fn read_contract(&self, to: Address, calldata: Bytes) -> Result<Bytes>;

    /// Block until the transaction is mined and return its receipt. No
    /// local timeout is imposed; bounded waits are the caller's concern.
    async fn wait_for_receipt(&self, tx_hash: TxHash) -> Result<Receipt>;

    async fn get_balance(&self, address: Address) -> Result<U256>;
}

/// Write-side chain operations, bound to one signing account.
#[async_trait]
pub trait WriteClient: Send + Sync {
    /// Sign and submit the call; returns the transaction hash on
    /// acknowledgement, before the transaction is mined.
    async fn write_contract(&self, call: ContractCall) -> Result<TxHash>;

    /// The account this client signs with.
    fn account(&self) -> Address;
}

/// Produces read/write clients bound to a decrypted key and a network.
///
/// Injected into the wallet so hosts and tests control the transport.
pub trait ClientFactory: Send + Sync {
    fn make_clients(
        &self,
        wallet: &SecureWallet,
        profile: &NetworkProfile,
    ) -> Result<(Arc<dyn ReadClient>, Arc<dyn WriteClient>)>;
}
