//! Password-encrypted Curve25519 key pair used by an account's private
//! channel messages (`spec.md` §4.A's sealed-box construction). Stored as a
//! single `<data_dir>/keystore/keys.json`, separate from the secp256k1
//! account files in [`crate::keystore`].
//!
//! `examples/original_source/wallet/wallet.go`'s `GetEncryptionPublicKey`
//! derives this pair by running `curve25519.ScalarBaseMult` directly on the
//! account's secp256k1 private key bytes — treating a secp256k1 scalar as a
//! Curve25519 scalar. That cross-curve reuse has no standard justification
//! and buys nothing here, so this port generates an independent Curve25519
//! pair instead and persists it under its own password (see `DESIGN.md`).

use crate::crypt::{self, EncryptedBlob};
use crate::error::WalletError;
use obscura_core::crypto::EncryptionKeyPair;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const KEYS_FILE_NAME: &str = "keys.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct KeysFile {
    public: [u8; 32],
    crypt: EncryptedBlob,
}

fn keys_file_path(data_dir: &Path) -> PathBuf {
    crate::keystore::keystore_dir(data_dir).join(KEYS_FILE_NAME)
}

/// Generates a new encryption key pair, encrypts the secret half under
/// `password`, and writes it to `<data_dir>/keystore/keys.json`. Returns the
/// (public, unencrypted) pair for immediate use.
pub fn new_encryption_key_pair(
    data_dir: &Path,
    password: &str,
) -> Result<EncryptionKeyPair, WalletError> {
    fs::create_dir_all(crate::keystore::keystore_dir(data_dir))?;

    let pair = EncryptionKeyPair::generate();
    let secret_bytes: [u8; 32] = pair.secret.to_bytes();
    let blob = crypt::encrypt(password, &secret_bytes)?;
    let file = KeysFile {
        public: *pair.public.as_bytes(),
        crypt: blob,
    };

    let json = serde_json::to_vec_pretty(&file)?;
    fs::write(keys_file_path(data_dir), json)?;
    Ok(pair)
}

/// Returns the public half of the stored encryption key pair without
/// decrypting the secret half.
pub fn encryption_public_key(data_dir: &Path) -> Result<[u8; 32], WalletError> {
    let bytes = fs::read(keys_file_path(data_dir)).map_err(|_| WalletError::Corrupt)?;
    let file: KeysFile = serde_json::from_slice(&bytes)?;
    Ok(file.public)
}

/// Decrypts and returns the full encryption key pair
/// (`wallet.go`'s `GetEncryptionPublicKey`/`Decrypt` callers).
pub fn load_encryption_key_pair(
    data_dir: &Path,
    password: &str,
) -> Result<EncryptionKeyPair, WalletError> {
    let bytes = fs::read(keys_file_path(data_dir)).map_err(|_| WalletError::Corrupt)?;
    let file: KeysFile = serde_json::from_slice(&bytes)?;
    let secret = crypt::decrypt(password, &file.crypt)?;
    let mut secret_bytes = [0u8; 32];
    if secret.len() != 32 {
        return Err(WalletError::Corrupt);
    }
    secret_bytes.copy_from_slice(&secret);
    Ok(EncryptionKeyPair::from_secret_bytes(secret_bytes))
}
