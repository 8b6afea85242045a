//! Configuration for the claim publisher
//!
//! Network selection, registry contract addresses, and the fixed protocol
//! fees. Endpoints come from a small static table keyed by network name,
//! with optional user-supplied override URLs on top.

use alloy::primitives::{address, Address, U256};
use serde::{Deserialize, Serialize};

/// Fixed fee charged by the registry for creating one entity record, in wei.
pub const ENTITY_CREATION_FEE_WEI: u128 = 300_000_000_000_000; // 0.0003 ETH

/// Fixed fee charged by the registry for creating one relationship record, in wei.
pub const RELATIONSHIP_CREATION_FEE_WEI: u128 = 500_000_000_000_000; // 0.0005 ETH

/// Coarse per-step gas figure used for plan estimates. Advisory only.
pub const GAS_PER_STEP: u64 = 150_000;

/// Fee for one entity record as a [`U256`].
pub fn entity_creation_fee() -> U256 {
    U256::from(ENTITY_CREATION_FEE_WEI)
}

/// Fee for one relationship record as a [`U256`].
pub fn relationship_creation_fee() -> U256 {
    U256::from(RELATIONSHIP_CREATION_FEE_WEI)
}

/// Supported networks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Base,
    #[default]
    #[serde(rename = "base-sepolia")]
    BaseSepolia,
}

impl Network {
    pub fn chain_id(&self) -> u64 {
        match self {
            Network::Base => 8453,
            Network::BaseSepolia => 84532,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Network::Base => "base",
            Network::BaseSepolia => "base-sepolia",
        }
    }

    /// Knowledge-graph registry contract on this network.
    pub fn registry_address(&self) -> Address {
        match self {
            Network::Base => address!("430bbf52503bd4801e51182f4cb9f8f534225de5"),
            Network::BaseSepolia => address!("1a6950807e33d5bc9975067e6d6b5ea4cd661665"),
        }
    }

    /// Default public RPC endpoint (rate limited, fine for light use).
    pub fn default_rpc_url(&self) -> &'static str {
        match self {
            Network::Base => "https://mainnet.base.org",
            Network::BaseSepolia => "https://sepolia.base.org",
        }
    }

    /// Default GraphQL indexer endpoint for entity lookups.
    pub fn default_graphql_url(&self) -> &'static str {
        match self {
            Network::Base => "https://indexer.knowledge.systems/v1/graphql",
            Network::BaseSepolia => "https://indexer.sepolia.knowledge.systems/v1/graphql",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "base" | "mainnet" => Some(Network::Base),
            "base-sepolia" | "sepolia" | "testnet" => Some(Network::BaseSepolia),
            _ => None,
        }
    }
}

/// A resolved network profile: the static table entry plus any user overrides.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkProfile {
    pub network: Network,
    /// Override for the RPC endpoint. `None` falls back to the static table.
    #[serde(default)]
    pub rpc_url_override: Option<String>,
    /// Override for the GraphQL indexer endpoint.
    #[serde(default)]
    pub graphql_url_override: Option<String>,
}

impl NetworkProfile {
    pub fn new(network: Network) -> Self {
        Self {
            network,
            rpc_url_override: None,
            graphql_url_override: None,
        }
    }

    pub fn rpc_url(&self) -> &str {
        self.rpc_url_override
            .as_deref()
            .unwrap_or_else(|| self.network.default_rpc_url())
    }

    pub fn graphql_url(&self) -> &str {
        self.graphql_url_override
            .as_deref()
            .unwrap_or_else(|| self.network.default_graphql_url())
    }

    pub fn chain_id(&self) -> u64 {
        self.network.chain_id()
    }

    pub fn registry_address(&self) -> Address {
        self.network.registry_address()
    }
}

impl Default for NetworkProfile {
    fn default() -> Self {
        Self::new(Network::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn network_serde_names() {
        let n: Network = serde_json::from_str("\"base\"").unwrap();
        assert_eq!(n, Network::Base);
        let n: Network = serde_json::from_str("\"base-sepolia\"").unwrap();
        assert_eq!(n, Network::BaseSepolia);
    }

    #[test]
    fn from_name_aliases() {
        assert_eq!(Network::from_name("mainnet"), Some(Network::Base));
        assert_eq!(Network::from_name("SEPOLIA"), Some(Network::BaseSepolia));
        assert_eq!(Network::from_name("unknown"), None);
    }

    #[test]
    fn profile_override_wins() {
        let mut profile = NetworkProfile::new(Network::Base);
        assert_eq!(profile.rpc_url(), "https://mainnet.base.org");

        profile.rpc_url_override = Some("https://base.example.com/rpc".into());
        assert_eq!(profile.rpc_url(), "https://base.example.com/rpc");
        // GraphQL endpoint untouched by the RPC override
        assert_eq!(
            profile.graphql_url(),
            Network::Base.default_graphql_url()
        );
    }

    #[test]
    fn fees_are_positive_and_distinct() {
        assert!(entity_creation_fee() > U256::ZERO);
        assert!(relationship_creation_fee() > U256::ZERO);
        assert_ne!(entity_creation_fee(), relationship_creation_fee());
    }
}
