//! Obscura account keystore: password-encrypted secp256k1 account keys plus
//! the Curve25519 pair used for private channel messages (`spec.md` §4.A,
//! §6), grounded on `examples/original_source/wallet/wallet.go`.

pub mod crypt;
pub mod error;
pub mod keys;
pub mod keystore;

pub use error::WalletError;
