//! Secure wallet management
//!
//! This module owns the one local signing identity. The private key exists
//! in exactly two places: encrypted at rest inside caller-owned settings,
//! and decrypted in memory inside [`SecureWallet`] while the wallet is
//! unlocked. It is never serialized, never logged, and zeroized on lock.

mod keystore;
mod signer;

pub use keystore::{KeyWallet, UnlockedHandle, WalletState};
pub use signer::SecureWallet;
