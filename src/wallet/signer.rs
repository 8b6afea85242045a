//! Secure signer implementation
//!
//! SECURITY: This is the ONLY place where a decrypted private key lives.
//! - Keys are held in alloy's PrivateKeySigner, which zeroizes on drop
//! - Keys are never serialized (no Serialize impl)
//! - Debug output redacts the signer

use alloy::network::EthereumWallet;
use alloy::primitives::{Address, B256};
use alloy::signers::local::PrivateKeySigner;
use zeroize::Zeroizing;

use crate::{Error, Result};

/// Secure wrapper around the local signing key.
pub struct SecureWallet {
    /// The signer
    signer: PrivateKeySigner,
    /// Public address (safe to expose)
    address: Address,
    /// Ethereum wallet for alloy provider integration
    wallet: EthereumWallet,
}

impl SecureWallet {
    /// Generate a fresh random secp256k1 key.
    pub fn generate() -> Self {
        Self::from_signer(PrivateKeySigner::random())
    }

    /// Reconstruct a wallet from raw decrypted key bytes.
    ///
    /// The caller keeps ownership of the buffer and should zeroize it once
    /// this returns; the signer holds its own protected copy.
    pub fn from_key_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != 32 {
            return Err(Error::InvalidPrivateKey(format!(
                "expected 32 key bytes, got {}",
                bytes.len()
            )));
        }
        let signer = PrivateKeySigner::from_bytes(&B256::from_slice(bytes))
            .map_err(|e| Error::InvalidPrivateKey(e.to_string()))?;
        Ok(Self::from_signer(signer))
    }

    /// Parse a wallet from a `0x`-prefixed 64-hex-char private key string.
    ///
    /// A string that fails the format check is a [`Error::Validation`];
    /// a well-formed string encoding a cryptographically invalid scalar
    /// (zero, or at least the curve order) is [`Error::InvalidPrivateKey`].
    /// Both are recoverable.
    pub fn from_hex(key_hex: &str) -> Result<Self> {
        let digits = key_hex
            .strip_prefix("0x")
            .ok_or_else(|| Error::Validation("private key must start with 0x".into()))?;
        if digits.len() != 64 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(Error::Validation(
                "private key must be 0x followed by 64 hex characters".into(),
            ));
        }

        let mut bytes = Zeroizing::new([0u8; 32]);
        hex::decode_to_slice(digits, bytes.as_mut())
            .map_err(|e| Error::Validation(format!("invalid hex: {}", e)))?;
        Self::from_key_bytes(bytes.as_ref())
    }

    fn from_signer(signer: PrivateKeySigner) -> Self {
        let address = signer.address();
        let wallet = EthereumWallet::from(signer.clone());
        Self {
            signer,
            address,
            wallet,
        }
    }

    /// Raw key bytes in a zeroizing buffer, for encryption at rest.
    pub fn key_bytes(&self) -> Zeroizing<[u8; 32]> {
        Zeroizing::new(self.signer.to_bytes().0)
    }

    /// Get the public address (safe to share)
    pub fn address(&self) -> Address {
        self.address
    }

    /// Checksummed address string.
    pub fn address_string(&self) -> String {
        self.address.to_string()
    }

    /// The EthereumWallet for alloy providers. Exposes signing operations
    /// only, never the raw key.
    pub fn ethereum_wallet(&self) -> &EthereumWallet {
        &self.wallet
    }
}

// Implement Debug manually to avoid exposing the signer
impl std::fmt::Debug for SecureWallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecureWallet")
            .field("address", &self.address)
            .field("signer", &"[REDACTED]")
            .finish()
    }
}
