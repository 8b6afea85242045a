//! Wallet lifecycle: create, import, unlock, lock, delete
//!
//! State machine: `Uninitialized → Initialized(locked) ⇄ Unlocked`, with
//! delete returning to `Uninitialized`. The decrypted key and its bound
//! chain clients live only inside the `Option<UnlockedHandle>`; `lock()`
//! takes it out and drops it, and the raw key buffer is zeroized as soon as
//! the signer is constructed.

use alloy::primitives::{Address, U256};
use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, FutureExt, Shared};
use secrecy::SecretString;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use crate::chain::{ClientFactory, ReadClient, WriteClient};
use crate::crypto::{validate_password, CryptoVault, EncryptedSecret};
use crate::notify::Notifier;
use crate::settings::{SettingsStore, WalletSettings};
use crate::wallet::SecureWallet;
use crate::{Error, Result};

/// Observable wallet state. `is_unlocked` implies `is_initialized`.
#[derive(Debug, Clone, Default)]
pub struct WalletState {
    pub is_initialized: bool,
    pub is_unlocked: bool,
    pub address: Option<Address>,
    pub balance: Option<U256>,
    pub last_balance_check: Option<DateTime<Utc>>,
}

/// The in-memory unlocked identity: the public address plus chain clients
/// bound to the decrypted key. Cheap to clone; dropping the last clone
/// releases the underlying signer.
#[derive(Clone)]
pub struct UnlockedHandle {
    pub address: Address,
    pub read: Arc<dyn ReadClient>,
    pub write: Arc<dyn WriteClient>,
}

impl std::fmt::Debug for UnlockedHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnlockedHandle")
            .field("address", &self.address)
            .finish()
    }
}

/// In-flight balance read, shared between concurrent refresh callers.
/// The error side is a plain string so the future stays cloneable.
type BalanceFuture = Shared<BoxFuture<'static, std::result::Result<U256, String>>>;

/// Owns the one local signing identity and its encrypted-at-rest form.
pub struct KeyWallet {
    vault: CryptoVault,
    store: Arc<dyn SettingsStore>,
    factory: Arc<dyn ClientFactory>,
    notifier: Arc<dyn Notifier>,
    state: Mutex<WalletState>,
    unlocked: Mutex<Option<UnlockedHandle>>,
    inflight_balance: Mutex<Option<BalanceFuture>>,
}

impl KeyWallet {
    /// Construct from persisted settings; starts locked.
    pub fn new(
        store: Arc<dyn SettingsStore>,
        factory: Arc<dyn ClientFactory>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self> {
        let settings = store.load()?;
        let address = settings
            .wallet
            .address
            .as_deref()
            .and_then(|raw| Address::from_str(raw).ok());

        let state = WalletState {
            is_initialized: settings.wallet.has_wallet,
            is_unlocked: false,
            address: if settings.wallet.has_wallet {
                address
            } else {
                None
            },
            balance: None,
            last_balance_check: None,
        };

        Ok(Self {
            vault: CryptoVault::new(),
            store,
            factory,
            notifier,
            state: Mutex::new(state),
            unlocked: Mutex::new(None),
            inflight_balance: Mutex::new(None),
        })
    }

    /// Replace the crypto vault, e.g. to tune the KDF iteration count.
    pub fn with_vault(mut self, vault: CryptoVault) -> Self {
        self.vault = vault;
        self
    }

    /// Snapshot of the current state.
    pub fn state(&self) -> WalletState {
        self.state.lock().expect("state lock").clone()
    }

    pub fn is_unlocked(&self) -> bool {
        self.state.lock().expect("state lock").is_unlocked
    }

    /// The unlocked clients, or [`Error::WalletLocked`].
    pub fn unlocked_handle(&self) -> Result<UnlockedHandle> {
        self.unlocked
            .lock()
            .expect("unlocked lock")
            .clone()
            .ok_or(Error::WalletLocked)
    }

    /// Generate a fresh key, encrypt and persist it, then unlock.
    ///
    /// A failed unlock-after-create is surfaced to the caller but does not
    /// roll back creation: the wallet exists, just locked.
    pub async fn create_wallet(&self, password: &SecretString) -> Result<Address> {
        validate_password(password)?;
        if self.store.load()?.wallet.has_wallet {
            return Err(Error::AlreadyExists);
        }

        let wallet = SecureWallet::generate();
        let address = wallet.address();
        self.persist_key(&wallet, password)?;
        tracing::info!(address = %address, "wallet created");

        self.unlock(password).await?;
        self.notifier
            .success(&format!("Wallet created: {}", wallet.address_string()));
        Ok(address)
    }

    /// Import an existing `0x`-prefixed private key, encrypt and persist
    /// it, then unlock.
    pub async fn import_wallet(
        &self,
        private_key_hex: &str,
        password: &SecretString,
    ) -> Result<Address> {
        validate_password(password)?;
        if self.store.load()?.wallet.has_wallet {
            return Err(Error::AlreadyExists);
        }

        let wallet = SecureWallet::from_hex(private_key_hex)?;
        let address = wallet.address();
        self.persist_key(&wallet, password)?;
        tracing::info!(address = %address, "wallet imported");

        self.unlock(password).await?;
        self.notifier
            .success(&format!("Wallet imported: {}", wallet.address_string()));
        Ok(address)
    }

    fn persist_key(&self, wallet: &SecureWallet, password: &SecretString) -> Result<()> {
        let key_bytes = wallet.key_bytes();
        let envelope = self.vault.encrypt(key_bytes.as_ref(), password)?;

        let mut settings = self.store.load()?;
        settings.wallet = WalletSettings {
            has_wallet: true,
            encrypted_private_key: Some(envelope.to_opaque_string()),
            encryption_salt: Some(hex::encode(&envelope.salt)),
            address: Some(wallet.address_string()),
        };
        self.store.save(&settings)?;

        let mut state = self.state.lock().expect("state lock");
        state.is_initialized = true;
        state.address = Some(wallet.address());
        Ok(())
    }

    /// Decrypt the stored key and bind chain clients to it.
    ///
    /// Propagates [`Error::InvalidPassword`] verbatim so the caller can
    /// tell a wrong password apart from other failures. A balance-refresh
    /// failure after unlocking is logged but does not fail the unlock.
    pub async fn unlock(&self, password: &SecretString) -> Result<UnlockedHandle> {
        let settings = self.store.load()?;
        if !settings.wallet.has_wallet {
            return Err(Error::NoWallet);
        }
        let raw = settings
            .wallet
            .encrypted_private_key
            .as_deref()
            .ok_or(Error::NoWallet)?;

        let envelope = EncryptedSecret::from_opaque_string(raw)?;
        let key = self.vault.decrypt(&envelope, password)?;
        let wallet = SecureWallet::from_key_bytes(&key)?;
        drop(key); // zeroized; the signer holds its own protected copy

        let (read, write) = self.factory.make_clients(&wallet, &settings.network)?;
        let handle = UnlockedHandle {
            address: wallet.address(),
            read,
            write,
        };

        {
            let mut unlocked = self.unlocked.lock().expect("unlocked lock");
            *unlocked = Some(handle.clone());
        }
        {
            let mut state = self.state.lock().expect("state lock");
            state.is_unlocked = true;
            state.address = Some(handle.address);
        }
        tracing::info!(address = %handle.address, "wallet unlocked");

        if let Err(e) = self.refresh_balance().await {
            // The key is already usable for signing even if the read fails.
            tracing::warn!(error = %e, "balance refresh after unlock failed");
            self.notifier
                .warning(&format!("Could not fetch balance: {}", e));
        }

        Ok(handle)
    }

    /// Drop the decrypted key and bound clients. Idempotent.
    pub fn lock(&self) {
        let had_key = self
            .unlocked
            .lock()
            .expect("unlocked lock")
            .take()
            .is_some();

        // Cancel the in-flight refresh marker; waiters already holding the
        // shared future finish on their own but find the wallet locked.
        *self.inflight_balance.lock().expect("inflight lock") = None;

        let mut state = self.state.lock().expect("state lock");
        state.is_unlocked = false;
        state.balance = None;
        state.last_balance_check = None;

        if had_key {
            tracing::info!("wallet locked");
        }
    }

    /// Read the account balance from the chain.
    ///
    /// At most one network read is in flight at a time: a second call while
    /// one is outstanding awaits the same shared future instead of issuing
    /// a duplicate read. The in-flight marker is cleared on every exit path
    /// so a failed refresh cannot wedge later calls.
    pub async fn refresh_balance(&self) -> Result<U256> {
        let fut = {
            let handle = self.unlocked_handle()?;
            let mut inflight = self.inflight_balance.lock().expect("inflight lock");
            match inflight.as_ref() {
                Some(existing) => existing.clone(),
                None => {
                    let read = handle.read.clone();
                    let address = handle.address;
                    let fresh: BalanceFuture = async move {
                        read.get_balance(address).await.map_err(|e| e.to_string())
                    }
                    .boxed()
                    .shared();
                    *inflight = Some(fresh.clone());
                    fresh
                }
            }
        };

        let result = fut.clone().await;

        {
            let mut inflight = self.inflight_balance.lock().expect("inflight lock");
            // Only clear our own marker; lock() may have swapped it already.
            if inflight.as_ref().is_some_and(|f| f.ptr_eq(&fut)) {
                *inflight = None;
            }
        }

        let balance = result.map_err(Error::Network)?;

        {
            let mut state = self.state.lock().expect("state lock");
            if state.is_unlocked {
                state.balance = Some(balance);
                state.last_balance_check = Some(Utc::now());
            }
        }
        tracing::debug!(balance = %balance, "balance refreshed");
        Ok(balance)
    }

    /// Remove the persisted wallet after re-verifying the password.
    ///
    /// Verification failure deletes nothing.
    pub async fn delete_wallet(&self, password: &SecretString) -> Result<()> {
        self.unlock(password).await?;

        let mut settings = self.store.load()?;
        settings.wallet = WalletSettings::default();
        self.store.save(&settings)?;

        {
            let mut state = self.state.lock().expect("state lock");
            state.is_initialized = false;
            state.address = None;
        }
        self.lock();
        self.notifier.info("Wallet deleted");
        tracing::info!("wallet deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::{ContractCall, Receipt};
    use crate::config::NetworkProfile;
    use crate::notify::test_support::RecordingNotifier;
    use crate::settings::MemoryStore;
    use alloy::primitives::{Bytes, TxHash};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::sync::Notify;

    const TEST_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
    const TEST_ADDRESS: &str = "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266";

    /// Scripted read client: counts calls, optionally gates each read on a
    /// notify, and fails the first `fail_first` reads.
    struct ScriptedReadClient {
        balance: U256,
        balance_calls: AtomicU32,
        fail_first: AtomicU32,
        gate: Option<Arc<Notify>>,
    }

    impl ScriptedReadClient {
        fn instant(balance: U256) -> Self {
            Self {
                balance,
                balance_calls: AtomicU32::new(0),
                fail_first: AtomicU32::new(0),
                gate: None,
            }
        }

        fn failing(times: u32) -> Self {
            Self {
                balance: U256::from(5),
                balance_calls: AtomicU32::new(0),
                fail_first: AtomicU32::new(times),
                gate: None,
            }
        }

        fn gated(balance: U256, gate: Arc<Notify>) -> Self {
            Self {
                balance,
                balance_calls: AtomicU32::new(0),
                fail_first: AtomicU32::new(0),
                gate: Some(gate),
            }
        }
    }

    #[async_trait]
    impl ReadClient for ScriptedReadClient {
        async fn read_contract(&self, _to: Address, _calldata: Bytes) -> Result<Bytes> {
            Ok(Bytes::new())
        }

        async fn wait_for_receipt(&self, _tx_hash: TxHash) -> Result<Receipt> {
            Err(Error::Network("not scripted".into()))
        }

        async fn get_balance(&self, _address: Address) -> Result<U256> {
            self.balance_calls.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            let remaining = self.fail_first.load(Ordering::SeqCst);
            if remaining > 0 {
                self.fail_first.store(remaining - 1, Ordering::SeqCst);
                return Err(Error::Network("balance read refused".into()));
            }
            Ok(self.balance)
        }
    }

    struct NoopWriteClient {
        account: Address,
    }

    #[async_trait]
    impl WriteClient for NoopWriteClient {
        async fn write_contract(&self, _call: ContractCall) -> Result<TxHash> {
            Err(Error::Network("not scripted".into()))
        }

        fn account(&self) -> Address {
            self.account
        }
    }

    struct MockFactory {
        read: Arc<ScriptedReadClient>,
    }

    impl ClientFactory for MockFactory {
        fn make_clients(
            &self,
            wallet: &SecureWallet,
            _profile: &NetworkProfile,
        ) -> Result<(Arc<dyn ReadClient>, Arc<dyn WriteClient>)> {
            Ok((
                self.read.clone(),
                Arc::new(NoopWriteClient {
                    account: wallet.address(),
                }),
            ))
        }
    }

    fn password(s: &str) -> SecretString {
        SecretString::from(s.to_string())
    }

    fn build_wallet(read: Arc<ScriptedReadClient>) -> KeyWallet {
        KeyWallet::new(
            Arc::new(MemoryStore::default()),
            Arc::new(MockFactory { read }),
            Arc::new(RecordingNotifier::default()),
        )
        .unwrap()
        // Fast KDF for tests; decryption honors the stored count.
        .with_vault(CryptoVault::with_iterations(1_000))
    }

    #[tokio::test]
    async fn create_initializes_and_unlocks() {
        let read = Arc::new(ScriptedReadClient::instant(U256::from(100)));
        let wallet = build_wallet(read.clone());

        let address = wallet.create_wallet(&password("hunter22-ok")).await.unwrap();

        let state = wallet.state();
        assert!(state.is_initialized);
        assert!(state.is_unlocked);
        assert_eq!(state.address, Some(address));
        assert_eq!(state.balance, Some(U256::from(100)));
        assert!(state.last_balance_check.is_some());
        assert_eq!(read.balance_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn create_twice_is_already_exists() {
        let wallet = build_wallet(Arc::new(ScriptedReadClient::instant(U256::ZERO)));
        wallet.create_wallet(&password("hunter22-ok")).await.unwrap();

        let err = wallet.create_wallet(&password("hunter22-ok")).await.unwrap_err();
        assert!(matches!(err, Error::AlreadyExists));
    }

    #[tokio::test]
    async fn short_password_rejected_before_persisting() {
        let store = Arc::new(MemoryStore::default());
        let wallet = KeyWallet::new(
            store.clone(),
            Arc::new(MockFactory {
                read: Arc::new(ScriptedReadClient::instant(U256::ZERO)),
            }),
            Arc::new(RecordingNotifier::default()),
        )
        .unwrap();

        let err = wallet.create_wallet(&password("short")).await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        // Nothing was generated or persisted.
        assert!(!store.load().unwrap().wallet.has_wallet);
        assert!(!wallet.state().is_initialized);
    }

    #[tokio::test]
    async fn import_derives_known_address() {
        let wallet = build_wallet(Arc::new(ScriptedReadClient::instant(U256::ZERO)));
        let address = wallet
            .import_wallet(TEST_KEY, &password("hunter22-ok"))
            .await
            .unwrap();
        assert_eq!(address.to_string().to_lowercase(), TEST_ADDRESS);
    }

    #[tokio::test]
    async fn import_malformed_vs_invalid_scalar() {
        let wallet = build_wallet(Arc::new(ScriptedReadClient::instant(U256::ZERO)));

        let err = wallet
            .import_wallet("ac0974", &password("hunter22-ok"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));

        let too_big = format!("0x{}", "ff".repeat(32));
        let err = wallet
            .import_wallet(&too_big, &password("hunter22-ok"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidPrivateKey(_)));
    }

    #[tokio::test]
    async fn unlock_without_wallet_is_no_wallet() {
        let wallet = build_wallet(Arc::new(ScriptedReadClient::instant(U256::ZERO)));
        let err = wallet.unlock(&password("hunter22-ok")).await.unwrap_err();
        assert!(matches!(err, Error::NoWallet));
    }

    #[tokio::test]
    async fn unlock_wrong_password_stays_locked() {
        let wallet = build_wallet(Arc::new(ScriptedReadClient::instant(U256::ZERO)));
        wallet.create_wallet(&password("hunter22-ok")).await.unwrap();
        wallet.lock();

        let err = wallet.unlock(&password("wrong-password")).await.unwrap_err();
        assert!(matches!(err, Error::InvalidPassword));
        assert!(!wallet.state().is_unlocked);
        assert!(wallet.unlocked_handle().is_err());
    }

    #[tokio::test]
    async fn lock_is_idempotent_and_clears_unlocked_state() {
        let wallet = build_wallet(Arc::new(ScriptedReadClient::instant(U256::from(7))));
        wallet.create_wallet(&password("hunter22-ok")).await.unwrap();
        assert!(wallet.is_unlocked());

        wallet.lock();
        wallet.lock(); // safe on an already-locked wallet

        let state = wallet.state();
        assert!(state.is_initialized);
        assert!(!state.is_unlocked);
        assert!(state.balance.is_none());
        // Address survives locking; it is persisted public data.
        assert!(state.address.is_some());

        let err = wallet.refresh_balance().await.unwrap_err();
        assert!(matches!(err, Error::WalletLocked));
    }

    #[tokio::test]
    async fn failed_balance_refresh_does_not_fail_unlock() {
        let read = Arc::new(ScriptedReadClient::failing(1));
        let wallet = build_wallet(read.clone());

        wallet.create_wallet(&password("hunter22-ok")).await.unwrap();

        let state = wallet.state();
        assert!(state.is_unlocked);
        assert!(state.balance.is_none());

        // The failure did not wedge the in-flight marker.
        let balance = wallet.refresh_balance().await.unwrap();
        assert_eq!(balance, U256::from(5));
        assert_eq!(read.balance_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn concurrent_refreshes_share_one_network_read() {
        let gate = Arc::new(Notify::new());
        let read = Arc::new(ScriptedReadClient::gated(U256::from(42), gate.clone()));
        let wallet = build_wallet(read.clone());

        // Pre-store a permit so the unlock-time refresh passes the gate.
        gate.notify_one();
        wallet.create_wallet(&password("hunter22-ok")).await.unwrap();
        read.balance_calls.store(0, Ordering::SeqCst);

        let (first, second, _) = tokio::join!(
            wallet.refresh_balance(),
            wallet.refresh_balance(),
            async {
                // Let both callers attach to the shared future, then release.
                tokio::task::yield_now().await;
                tokio::task::yield_now().await;
                gate.notify_one();
            }
        );

        assert_eq!(first.unwrap(), U256::from(42));
        assert_eq!(second.unwrap(), U256::from(42));
        assert_eq!(read.balance_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn delete_requires_correct_password() {
        let store = Arc::new(MemoryStore::default());
        let wallet = KeyWallet::new(
            store.clone(),
            Arc::new(MockFactory {
                read: Arc::new(ScriptedReadClient::instant(U256::ZERO)),
            }),
            Arc::new(RecordingNotifier::default()),
        )
        .unwrap()
        .with_vault(CryptoVault::with_iterations(1_000));
        wallet.create_wallet(&password("hunter22-ok")).await.unwrap();

        let err = wallet
            .delete_wallet(&password("wrong-password"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidPassword));
        assert!(store.load().unwrap().wallet.has_wallet);

        wallet.delete_wallet(&password("hunter22-ok")).await.unwrap();
        assert!(!store.load().unwrap().wallet.has_wallet);
        assert!(!wallet.state().is_initialized);

        let err = wallet.unlock(&password("hunter22-ok")).await.unwrap_err();
        assert!(matches!(err, Error::NoWallet));
    }

    #[tokio::test]
    async fn reopen_from_persisted_settings_starts_locked() {
        let store = Arc::new(MemoryStore::default());
        let factory = Arc::new(MockFactory {
            read: Arc::new(ScriptedReadClient::instant(U256::ZERO)),
        });
        let wallet = KeyWallet::new(
            store.clone(),
            factory.clone(),
            Arc::new(RecordingNotifier::default()),
        )
        .unwrap()
        .with_vault(CryptoVault::with_iterations(1_000));
        let address = wallet.create_wallet(&password("hunter22-ok")).await.unwrap();
        drop(wallet);

        // Fresh process: state comes from settings, key stays encrypted.
        let reopened = KeyWallet::new(store, factory, Arc::new(RecordingNotifier::default()))
            .unwrap()
            .with_vault(CryptoVault::with_iterations(1_000));
        let state = reopened.state();
        assert!(state.is_initialized);
        assert!(!state.is_unlocked);
        assert_eq!(state.address, Some(address));

        let handle = reopened.unlock(&password("hunter22-ok")).await.unwrap();
        assert_eq!(handle.address, address);
    }
}
