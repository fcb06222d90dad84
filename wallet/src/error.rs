//! Wallet-local error taxonomy. Wraps `obscura_core::error::CryptoError`
//! (`spec.md` §7) plus the filesystem/format failures the keystore itself
//! introduces.

use obscura_core::address::Address;
use obscura_core::error::CryptoError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WalletError {
    #[error("no keystore entry for account {0}")]
    AccountNotFound(Address),

    #[error("keystore directory unreadable or unwritable")]
    Io,

    #[error("keystore file is not valid JSON")]
    Corrupt,

    #[error(transparent)]
    Crypto(#[from] CryptoError),
}

impl From<std::io::Error> for WalletError {
    fn from(_: std::io::Error) -> Self {
        WalletError::Io
    }
}

impl From<serde_json::Error> for WalletError {
    fn from(_: serde_json::Error) -> Self {
        WalletError::Corrupt
    }
}
