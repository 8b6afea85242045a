//! Claim Publisher
//!
//! Client-side core for publishing knowledge-graph claims to an on-chain
//! registry on behalf of one local user:
//! - Encrypted key vault: the signing key lives encrypted inside
//!   caller-owned settings and is decrypted into memory only while the
//!   wallet is unlocked
//! - Transaction planning: a claim draft becomes an ordered list of
//!   entity-create / relationship-create / stake-deposit steps with a
//!   cost estimate
//! - Transaction execution: steps run sequentially with status tracking,
//!   receipt-log decoding, and partial-failure reporting
//!
//! # Security Model
//!
//! - The private key is decrypted only inside the wallet module and is
//!   zeroized on lock
//! - Failures during execution never roll back on-chain state; the caller
//!   gets back exactly how far the plan got

pub mod cache;
pub mod chain;
pub mod config;
pub mod crypto;
pub mod graphql;
pub mod notify;
pub mod publish;
pub mod settings;
pub mod wallet;

mod error;

// Re-export commonly used types
pub use config::{Network, NetworkProfile};
pub use error::{Error, Result};
pub use publish::{
    build_plan, ClaimDraft, EntityRef, PublishResult, Stake, StakeSide, TransactionExecutor,
    TransactionPlan,
};
pub use wallet::{KeyWallet, UnlockedHandle};
