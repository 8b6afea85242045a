//! Error types for the claim publisher

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("invalid password")]
    InvalidPassword,

    #[error("invalid private key: {0}")]
    InvalidPrivateKey(String),

    #[error("wallet already exists")]
    AlreadyExists,

    #[error("no wallet configured")]
    NoWallet,

    #[error("wallet is locked")]
    WalletLocked,

    #[error("encryption error: {0}")]
    Encryption(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("GraphQL query failed: {0}")]
    GraphQL(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether the caller can meaningfully retry after fixing its input
    /// (wrong password, bad hex, precondition not met). `Encryption` and
    /// `Internal` indicate corrupted data or a defect and are terminal.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Error::Encryption(_) | Error::Internal(_))
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Network(e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Encryption(format!("serialization: {}", e))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
