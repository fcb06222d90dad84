//! Password-based encryption for keystore entries: `scrypt` key derivation
//! (grounded on `examples/original_source/wallet/wallet.go`'s use of
//! go-ethereum's `keystore.NewKeyStore(dir, keystore.StandardScryptN,
//! keystore.StandardScryptP)`) feeding an `aes-gcm` authenticated cipher
//! (replacing go-ethereum's AES-128-CTR + separate MAC with a single AEAD
//! construction, the pattern `examples/other_examples`'
//! `dataDistributor-layer0` manifest uses for its own wallet encryption).

use crate::error::WalletError;
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use rand_core::{OsRng, RngCore};
use scrypt::Params;
use serde::{Deserialize, Serialize};

/// Scrypt cost parameters. `log_n = 18` matches go-ethereum's
/// `StandardScryptN` (2^18); `r = 8`, `p = 1` are go-ethereum's standard
/// values too.
const SCRYPT_LOG_N: u8 = 18;
const SCRYPT_R: u32 = 8;
const SCRYPT_P: u32 = 1;
const KEY_LEN: usize = 32;
const SALT_LEN: usize = 32;
const NONCE_LEN: usize = 12;

/// An encrypted secret, as stored inside a keystore JSON file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncryptedBlob {
    #[serde(with = "hex_bytes")]
    pub salt: Vec<u8>,
    #[serde(with = "hex_bytes")]
    pub nonce: Vec<u8>,
    #[serde(with = "hex_bytes")]
    pub ciphertext: Vec<u8>,
    pub scrypt_log_n: u8,
    pub scrypt_r: u32,
    pub scrypt_p: u32,
}

mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(d)?;
        hex::decode(&s).map_err(serde::de::Error::custom)
    }
}

fn derive_key(password: &str, salt: &[u8], log_n: u8, r: u32, p: u32) -> Result<[u8; KEY_LEN], WalletError> {
    let params = Params::new(log_n, r, p, KEY_LEN).map_err(|_| WalletError::Corrupt)?;
    let mut key = [0u8; KEY_LEN];
    scrypt::scrypt(password.as_bytes(), salt, &params, &mut key).map_err(|_| WalletError::Corrupt)?;
    Ok(key)
}

/// Encrypts `plaintext` under `password`, generating a fresh random salt and
/// nonce.
pub fn encrypt(password: &str, plaintext: &[u8]) -> Result<EncryptedBlob, WalletError> {
    let mut salt = vec![0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);
    let mut nonce_bytes = vec![0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce_bytes);

    let key_bytes = derive_key(password, &salt, SCRYPT_LOG_N, SCRYPT_R, SCRYPT_P)?;
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key_bytes));
    let nonce = Nonce::from_slice(&nonce_bytes);
    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|_| obscura_core::error::CryptoError::AuthFailed)?;

    Ok(EncryptedBlob {
        salt,
        nonce: nonce_bytes,
        ciphertext,
        scrypt_log_n: SCRYPT_LOG_N,
        scrypt_r: SCRYPT_R,
        scrypt_p: SCRYPT_P,
    })
}

/// Decrypts `blob` under `password`. A wrong password surfaces as
/// [`obscura_core::error::CryptoError::KeystoreLocked`] (AEAD tag mismatch).
pub fn decrypt(password: &str, blob: &EncryptedBlob) -> Result<Vec<u8>, WalletError> {
    let key_bytes = derive_key(password, &blob.salt, blob.scrypt_log_n, blob.scrypt_r, blob.scrypt_p)?;
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key_bytes));
    let nonce = Nonce::from_slice(&blob.nonce);
    cipher
        .decrypt(nonce, blob.ciphertext.as_ref())
        .map_err(|_| WalletError::Crypto(obscura_core::error::CryptoError::KeystoreLocked))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encrypt_then_decrypt_round_trips() {
        let blob = encrypt("hunter2", b"top secret private key bytes").unwrap();
        let plaintext = decrypt("hunter2", &blob).unwrap();
        assert_eq!(plaintext, b"top secret private key bytes");
    }

    #[test]
    fn wrong_password_fails() {
        let blob = encrypt("hunter2", b"secret").unwrap();
        assert!(decrypt("wrong", &blob).is_err());
    }
}
