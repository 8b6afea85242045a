//! Alloy-backed chain clients
//!
//! HTTP JSON-RPC implementations of [`ReadClient`] and [`WriteClient`],
//! plus the [`ClientFactory`] the wallet uses to bind them to a decrypted
//! key. Receipt waits poll at a fixed cadence and never time out locally.

use alloy::primitives::{Address, Bytes, TxHash, U256};
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::rpc::types::{TransactionReceipt, TransactionRequest};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::chain::{ClientFactory, ContractCall, LogEntry, ReadClient, Receipt, WriteClient};
use crate::config::NetworkProfile;
use crate::wallet::SecureWallet;
use crate::{Error, Result};

/// Receipt polling cadence.
const RECEIPT_POLL_INTERVAL: Duration = Duration::from_secs(2);

fn parse_rpc_url(raw: &str) -> Result<url::Url> {
    raw.parse()
        .map_err(|e| Error::Network(format!("invalid RPC URL {}: {}", raw, e)))
}

fn map_receipt(receipt: TransactionReceipt) -> Receipt {
    let logs = receipt
        .inner
        .logs()
        .iter()
        .map(|log| LogEntry {
            address: log.inner.address,
            topics: log.inner.data.topics().to_vec(),
            data: log.inner.data.data.clone(),
        })
        .collect();

    Receipt {
        tx_hash: receipt.transaction_hash,
        success: receipt.status(),
        logs,
    }
}

/// Read-only client over HTTP JSON-RPC.
#[derive(Debug)]
pub struct RpcReadClient {
    provider: DynProvider,
}

impl RpcReadClient {
    pub fn connect(rpc_url: &str) -> Result<Self> {
        let url = parse_rpc_url(rpc_url)?;
        let provider = ProviderBuilder::new().connect_http(url).erased();
        Ok(Self { provider })
    }
}

#[async_trait]
impl ReadClient for RpcReadClient {
    async fn read_contract(&self, to: Address, calldata: Bytes) -> Result<Bytes> {
        let tx = TransactionRequest::default().to(to).input(calldata.into());
        self.provider
            .call(tx)
            .await
            .map_err(|e| Error::Network(format!("contract read failed: {}", e)))
    }

    async fn wait_for_receipt(&self, tx_hash: TxHash) -> Result<Receipt> {
        let mut ticker = tokio::time::interval(RECEIPT_POLL_INTERVAL);
        loop {
            ticker.tick().await;

            let receipt = self
                .provider
                .get_transaction_receipt(tx_hash)
                .await
                .map_err(|e| Error::Network(format!("receipt poll failed: {}", e)))?;

            match receipt {
                Some(receipt) => return Ok(map_receipt(receipt)),
                None => {
                    tracing::debug!(tx_hash = %tx_hash, "transaction pending");
                }
            }
        }
    }

    async fn get_balance(&self, address: Address) -> Result<U256> {
        self.provider
            .get_balance(address)
            .await
            .map_err(|e| Error::Network(format!("balance read failed: {}", e)))
    }
}

/// Signing client bound to one account over HTTP JSON-RPC.
pub struct RpcWriteClient {
    provider: DynProvider,
    account: Address,
}

impl RpcWriteClient {
    pub fn connect(rpc_url: &str, wallet: &SecureWallet) -> Result<Self> {
        let url = parse_rpc_url(rpc_url)?;
        let provider = ProviderBuilder::new()
            .wallet(wallet.ethereum_wallet().clone())
            .connect_http(url)
            .erased();
        Ok(Self {
            provider,
            account: wallet.address(),
        })
    }
}

#[async_trait]
impl WriteClient for RpcWriteClient {
    async fn write_contract(&self, call: ContractCall) -> Result<TxHash> {
        let tx = TransactionRequest::default()
            .from(self.account)
            .to(call.to)
            .input(call.calldata.into())
            .value(call.value);

        let pending = self
            .provider
            .send_transaction(tx)
            .await
            .map_err(|e| Error::Network(format!("transaction submit failed: {}", e)))?;

        Ok(*pending.tx_hash())
    }

    fn account(&self) -> Address {
        self.account
    }
}

/// Default factory: one read client and one key-bound write client against
/// the profile's RPC endpoint.
#[derive(Debug, Default)]
pub struct AlloyClientFactory;

impl ClientFactory for AlloyClientFactory {
    fn make_clients(
        &self,
        wallet: &SecureWallet,
        profile: &NetworkProfile,
    ) -> Result<(Arc<dyn ReadClient>, Arc<dyn WriteClient>)> {
        let rpc_url = profile.rpc_url();
        tracing::debug!(
            network = profile.network.name(),
            rpc_url = rpc_url,
            "binding chain clients"
        );
        let read = RpcReadClient::connect(rpc_url)?;
        let write = RpcWriteClient::connect(rpc_url, wallet)?;
        Ok((Arc::new(read), Arc::new(write)))
    }
}
