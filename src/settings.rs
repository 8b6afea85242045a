//! Persisted settings
//!
//! The wallet's entire persisted footprint is `wallet.{has_wallet,
//! encrypted_private_key, encryption_salt, address}`; the encrypted key
//! travels as the opaque envelope string produced by
//! [`EncryptedSecret::to_opaque_string`](crate::crypto::EncryptedSecret).
//! The core never touches disk directly; persistence goes through the
//! [`SettingsStore`] seam so the host application owns the storage format.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Mutex;

use crate::config::NetworkProfile;
use crate::{Error, Result};

/// Wallet portion of the settings. Only these four fields are persisted
/// for the wallet; the decrypted key never appears here.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct WalletSettings {
    #[serde(default)]
    pub has_wallet: bool,
    /// Opaque encrypted-secret envelope, present iff `has_wallet`.
    #[serde(default)]
    pub encrypted_private_key: Option<String>,
    /// Hex copy of the envelope's salt. Decryption reads the envelope's
    /// embedded salt; this mirror exists for host-side diagnostics.
    #[serde(default)]
    pub encryption_salt: Option<String>,
    /// Checksummed public address of the stored key.
    #[serde(default)]
    pub address: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub wallet: WalletSettings,
    #[serde(default)]
    pub network: NetworkProfile,
}

/// Persistence seam for [`Settings`].
pub trait SettingsStore: Send + Sync {
    fn load(&self) -> Result<Settings>;
    fn save(&self, settings: &Settings) -> Result<()>;
}

/// JSON-file-backed store used by the CLI. A missing file loads as defaults.
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl SettingsStore for JsonFileStore {
    fn load(&self) -> Result<Settings> {
        if !self.path.exists() {
            return Ok(Settings::default());
        }
        let content = std::fs::read_to_string(&self.path)
            .map_err(|e| Error::Internal(format!("read settings: {}", e)))?;
        serde_json::from_str(&content)
            .map_err(|e| Error::Internal(format!("parse settings: {}", e)))
    }

    fn save(&self, settings: &Settings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::Internal(format!("create settings dir: {}", e)))?;
        }
        let content = serde_json::to_string_pretty(settings)
            .map_err(|e| Error::Internal(format!("serialize settings: {}", e)))?;
        std::fs::write(&self.path, content)
            .map_err(|e| Error::Internal(format!("write settings: {}", e)))
    }
}

/// In-memory store for tests and embedding hosts that persist elsewhere.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Settings>,
}

impl MemoryStore {
    pub fn new(settings: Settings) -> Self {
        Self {
            inner: Mutex::new(settings),
        }
    }
}

impl SettingsStore for MemoryStore {
    fn load(&self) -> Result<Settings> {
        Ok(self.inner.lock().expect("settings lock").clone())
    }

    fn save(&self, settings: &Settings) -> Result<()> {
        *self.inner.lock().expect("settings lock") = settings.clone();
        Ok(())
    }
}
