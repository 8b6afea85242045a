//! Password-based encryption for the wallet's private key
//!
//! AES-256-GCM over a PBKDF2-HMAC-SHA256 derived key. The salt, nonce, and
//! KDF parameters are stored alongside the ciphertext so that secrets written
//! with older parameters stay decryptable after a parameter bump.
//!
//! SECURITY NOTE:
//! - Derived keys and decrypted plaintext are held in zeroizing buffers
//! - The iteration count is deliberately high to slow offline brute force

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::{Error, Result};

/// Algorithm tag written into every envelope.
const ALGORITHM: &str = "aes-256-gcm";

/// Key-derivation tag written into every envelope.
const KEY_DERIVATION: &str = "pbkdf2-hmac-sha256";

/// PBKDF2 salt length in bytes.
const SALT_LEN: usize = 16;

/// AES-GCM nonce length in bytes.
const NONCE_LEN: usize = 12;

/// Minimum accepted password length.
const MIN_PASSWORD_LEN: usize = 8;

/// Default PBKDF2 iteration count for new envelopes.
pub const DEFAULT_ITERATIONS: u32 = 100_000;

/// Check password strength up front, before any key material is generated
/// or derived.
pub fn validate_password(password: &SecretString) -> Result<()> {
    if password.expose_secret().chars().count() < MIN_PASSWORD_LEN {
        return Err(Error::Validation(format!(
            "password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    Ok(())
}

/// An encrypted secret together with everything needed to decrypt it later.
///
/// Byte fields are hex-encoded when serialized so the envelope can be stored
/// as an opaque string inside caller-owned settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EncryptedSecret {
    #[serde(with = "hex")]
    pub ciphertext: Vec<u8>,
    #[serde(with = "hex")]
    pub iv: Vec<u8>,
    #[serde(with = "hex")]
    pub salt: Vec<u8>,
    pub algorithm: String,
    pub key_derivation: String,
    pub iterations: u32,
}

impl EncryptedSecret {
    /// Serialize to the opaque string persisted in settings.
    pub fn to_opaque_string(&self) -> String {
        // The envelope is plain serializable data; this cannot fail.
        serde_json::to_string(self).expect("envelope serialization")
    }

    /// Parse an envelope back from its persisted form.
    pub fn from_opaque_string(raw: &str) -> Result<Self> {
        serde_json::from_str(raw)
            .map_err(|e| Error::Encryption(format!("malformed envelope: {}", e)))
    }
}

/// Password-based authenticated encryption of arbitrary secret bytes.
#[derive(Debug, Clone)]
pub struct CryptoVault {
    iterations: u32,
}

impl CryptoVault {
    pub fn new() -> Self {
        Self {
            iterations: DEFAULT_ITERATIONS,
        }
    }

    /// Override the iteration count for new envelopes. Decryption always
    /// uses the count stored in the envelope, never this value.
    pub fn with_iterations(iterations: u32) -> Self {
        Self { iterations }
    }

    /// Encrypt `secret` under `password`.
    ///
    /// Generates a fresh random salt and nonce on every call; neither is
    /// ever reused across envelopes.
    pub fn encrypt(&self, secret: &[u8], password: &SecretString) -> Result<EncryptedSecret> {
        validate_password(password)?;

        use rand::RngCore;
        let mut salt = [0u8; SALT_LEN];
        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::rngs::OsRng.fill_bytes(&mut salt);
        rand::rngs::OsRng.fill_bytes(&mut nonce_bytes);

        let key = derive_key(password, &salt, self.iterations);
        let cipher = Aes256Gcm::new_from_slice(key.as_ref())
            .map_err(|e| Error::Encryption(format!("cipher init: {}", e)))?;

        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce_bytes), secret)
            .map_err(|e| Error::Encryption(format!("encryption failed: {}", e)))?;

        Ok(EncryptedSecret {
            ciphertext,
            iv: nonce_bytes.to_vec(),
            salt: salt.to_vec(),
            algorithm: ALGORITHM.to_string(),
            key_derivation: KEY_DERIVATION.to_string(),
            iterations: self.iterations,
        })
    }

    /// Decrypt an envelope produced by [`encrypt`](Self::encrypt).
    ///
    /// Re-derives the key from the envelope's stored salt and iteration
    /// count. An authentication-tag mismatch (wrong password, or tampered
    /// data; indistinguishable by construction) yields
    /// [`Error::InvalidPassword`]; a malformed envelope yields
    /// [`Error::Encryption`]. No retries are performed here.
    pub fn decrypt(
        &self,
        data: &EncryptedSecret,
        password: &SecretString,
    ) -> Result<Zeroizing<Vec<u8>>> {
        if data.algorithm != ALGORITHM {
            return Err(Error::Encryption(format!(
                "unsupported algorithm: {}",
                data.algorithm
            )));
        }
        if data.key_derivation != KEY_DERIVATION {
            return Err(Error::Encryption(format!(
                "unsupported key derivation: {}",
                data.key_derivation
            )));
        }
        if data.iv.len() != NONCE_LEN {
            return Err(Error::Encryption(format!(
                "bad nonce length: {} != {}",
                data.iv.len(),
                NONCE_LEN
            )));
        }
        if data.salt.is_empty() || data.iterations == 0 {
            return Err(Error::Encryption("missing KDF parameters".into()));
        }

        let key = derive_key(password, &data.salt, data.iterations);
        let cipher = Aes256Gcm::new_from_slice(key.as_ref())
            .map_err(|e| Error::Encryption(format!("cipher init: {}", e)))?;

        cipher
            .decrypt(Nonce::from_slice(&data.iv), data.ciphertext.as_slice())
            .map(Zeroizing::new)
            .map_err(|_| Error::InvalidPassword)
    }
}

impl Default for CryptoVault {
    fn default() -> Self {
        Self::new()
    }
}

/// PBKDF2-HMAC-SHA256 key derivation. The result zeroizes on drop.
fn derive_key(password: &SecretString, salt: &[u8], iterations: u32) -> Zeroizing<[u8; 32]> {
    let mut key = Zeroizing::new([0u8; 32]);
    pbkdf2::pbkdf2_hmac::<sha2::Sha256>(
        password.expose_secret().as_bytes(),
        salt,
        iterations,
        key.as_mut(),
    );
    key
}

#[cfg(test)]
mod tests {
    use super::*;

    // Low iteration count to keep the test suite fast; decryption reads the
    // count from the envelope, so this exercises the same code path.
    fn test_vault() -> CryptoVault {
        CryptoVault::with_iterations(1_000)
    }

    fn password(s: &str) -> SecretString {
        SecretString::from(s.to_string())
    }

    #[test]
    fn encrypt_decrypt_roundtrip() {
        let vault = test_vault();
        let secret = b"0xac0974bec39a17e36ba4a6b4d238ff94";

        let envelope = vault.encrypt(secret, &password("correct horse")).unwrap();
        let decrypted = vault.decrypt(&envelope, &password("correct horse")).unwrap();
        assert_eq!(decrypted.as_slice(), secret);
    }

    #[test]
    fn wrong_password_fails() {
        let vault = test_vault();
        let envelope = vault.encrypt(b"secret", &password("password-1")).unwrap();

        let err = vault.decrypt(&envelope, &password("password-2")).unwrap_err();
        assert!(matches!(err, Error::InvalidPassword));
        assert!(err.is_recoverable());
    }

    #[test]
    fn short_password_rejected() {
        let vault = test_vault();
        let err = vault.encrypt(b"secret", &password("short")).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn eight_char_password_accepted() {
        let vault = test_vault();
        assert!(vault.encrypt(b"secret", &password("12345678")).is_ok());
    }

    #[test]
    fn tampered_ciphertext_fails_as_invalid_password() {
        let vault = test_vault();
        let mut envelope = vault.encrypt(b"secret", &password("password-1")).unwrap();
        let last = envelope.ciphertext.len() - 1;
        envelope.ciphertext[last] ^= 0xFF;

        // Wrong password and corrupted data are indistinguishable to GCM.
        let err = vault.decrypt(&envelope, &password("password-1")).unwrap_err();
        assert!(matches!(err, Error::InvalidPassword));
    }

    #[test]
    fn malformed_envelope_is_not_recoverable() {
        let vault = test_vault();
        let mut envelope = vault.encrypt(b"secret", &password("password-1")).unwrap();
        envelope.algorithm = "rot13".into();

        let err = vault.decrypt(&envelope, &password("password-1")).unwrap_err();
        assert!(matches!(err, Error::Encryption(_)));
        assert!(!err.is_recoverable());
    }

    #[test]
    fn bad_nonce_length_is_malformed() {
        let vault = test_vault();
        let mut envelope = vault.encrypt(b"secret", &password("password-1")).unwrap();
        envelope.iv.truncate(4);

        let err = vault.decrypt(&envelope, &password("password-1")).unwrap_err();
        assert!(matches!(err, Error::Encryption(_)));
    }

    #[test]
    fn stored_iterations_survive_parameter_bump() {
        let old_vault = CryptoVault::with_iterations(1_000);
        let envelope = old_vault.encrypt(b"secret", &password("password-1")).unwrap();
        assert_eq!(envelope.iterations, 1_000);

        // A vault configured with a different default still decrypts old
        // envelopes, because the envelope's own count wins.
        let new_vault = CryptoVault::with_iterations(2_000);
        let decrypted = new_vault.decrypt(&envelope, &password("password-1")).unwrap();
        assert_eq!(decrypted.as_slice(), b"secret");
    }

    #[test]
    fn salt_and_nonce_fresh_per_call() {
        let vault = test_vault();
        let a = vault.encrypt(b"secret", &password("password-1")).unwrap();
        let b = vault.encrypt(b"secret", &password("password-1")).unwrap();

        assert_ne!(a.salt, b.salt);
        assert_ne!(a.iv, b.iv);
        assert_ne!(a.ciphertext, b.ciphertext);
    }

    #[test]
    fn opaque_string_roundtrip() {
        let vault = test_vault();
        let envelope = vault.encrypt(b"secret", &password("password-1")).unwrap();

        let raw = envelope.to_opaque_string();
        let parsed = EncryptedSecret::from_opaque_string(&raw).unwrap();
        assert_eq!(parsed, envelope);

        let decrypted = vault.decrypt(&parsed, &password("password-1")).unwrap();
        assert_eq!(decrypted.as_slice(), b"secret");
    }

    #[test]
    fn garbage_opaque_string_rejected() {
        let err = EncryptedSecret::from_opaque_string("not json").unwrap_err();
        assert!(matches!(err, Error::Encryption(_)));
    }
}
