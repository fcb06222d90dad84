//! Error taxonomy for the **Obscura** core crate (`spec.md` §7).
//!
//! Five small enums, one per failure domain, rather than one flat catch-all —
//! callers (mempool, state engine, RPC layer) match on the domain they
//! expect and propagate the rest with `?`. Each is a [`thiserror::Error`]
//! so `Display` gives a human-readable message with no internal file paths,
//! per §7's user-visible-failure rule.

use thiserror::Error;

/// Failures from [`crate::tx::validate`].
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ValidationError {
    #[error("signature does not recover to the claimed author")]
    ForgedSender,

    #[error("nonce gap: expected {expected}, got {got}")]
    NonceGap { expected: u64, got: u64 },

    #[error("insufficient pending balance")]
    InsufficientBalance,

    #[error("transaction already admitted or archived")]
    DuplicateTx,

    #[error("invalid content identifier")]
    InvalidContent,
}

/// Failures from [`crate::state::State::apply_block`] / `add_block`.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum BlockError {
    #[error("expected block number {expected}, got {got}")]
    WrongHeight { expected: u64, got: u64 },

    #[error("block parent does not match chain tip")]
    WrongParent,

    #[error("block hash does not satisfy the proof-of-work target")]
    BadPoW,

    #[error("transaction {index} invalid: {cause}")]
    Tx { index: usize, cause: ValidationError },
}

/// Failures from [`crate::store`] / block-log persistence.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StorageError {
    #[error("failed to write block log record")]
    LogWriteFailed,

    #[error("block log corrupt at line {0}")]
    LogCorrupt(usize),

    #[error("rollback of the latest block-log record failed")]
    RollbackFailed,

    #[error("node is in read-only mode after a prior storage failure")]
    ReadOnly,
}

/// Failures surfaced by the sync/network layer (implemented in
/// `obscura-network`/`obscura-node`; the variants live here so
/// `obscura-core` can be the single source of truth for the error
/// taxonomy `spec.md` §7 names).
#[derive(Debug, Error, PartialEq, Eq, Clone, Copy)]
pub enum NetworkError {
    #[error("peer unreachable")]
    PeerUnreachable,

    #[error("stream closed unexpectedly")]
    StreamClosed,

    #[error("deadline exceeded waiting for peer")]
    DeadlineExceeded,

    #[error("outbox full, message dropped (best-effort)")]
    PublishDropped,
}

/// Failures from [`crate::crypto`] and the wallet keystore.
#[derive(Debug, Error, PartialEq, Eq, Clone, Copy)]
pub enum CryptoError {
    #[error("signature is malformed")]
    SignatureMalformed,

    #[error("keystore is locked or password incorrect")]
    KeystoreLocked,

    #[error("authenticated decryption failed")]
    AuthFailed,
}

#[derive(Debug, Error, Clone)]
pub enum Error {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Block(#[from] BlockError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Network(#[from] NetworkError),
    #[error(transparent)]
    Crypto(#[from] CryptoError),
}

pub type Result<T> = core::result::Result<T, Error>;
