//! secp256k1 sign/recover and the Curve25519 sealed-box construction used for
//! private channel messages (`spec.md` §4.A).
//!
//! Grounded on `examples/original_source/state/tx.go` (`crypto.Sign`/
//! `crypto.SigToPub`) for the signature half, and
//! `examples/original_source/wallet/wallet.go` (`golang.org/x/crypto/nacl/box`)
//! for the authenticated-encryption half.

use crate::address::Address;
use crate::error::CryptoError;
use crate::hash::sha256;
use crypto_box::aead::{generic_array::GenericArray, Aead};
use crypto_box::{PublicKey as BoxPublicKey, SalsaBox, SecretKey as BoxSecretKey};
use k256::ecdsa::{RecoveryId, Signature as EcdsaSignature, SigningKey, VerifyingKey};
use rand_core::OsRng;

/// A 65-byte recoverable ECDSA signature: 64 bytes of `(r, s)` followed by a
/// single recovery byte in `0..=3`.
pub type RecoverableSig = [u8; 65];

/// secp256k1 private key, newtype to keep signing call sites explicit about
/// what they're holding.
pub struct PrivateKey(pub SigningKey);

impl PrivateKey {
    pub fn generate() -> Self {
        PrivateKey(SigningKey::random(&mut OsRng))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        SigningKey::from_slice(bytes)
            .map(PrivateKey)
            .map_err(|_| CryptoError::SignatureMalformed)
    }

    pub fn to_bytes(&self) -> [u8; 32] {
        self.0.to_bytes().into()
    }

    pub fn public_uncompressed(&self) -> [u8; 65] {
        let point = self.0.verifying_key().to_encoded_point(false);
        let mut out = [0u8; 65];
        out.copy_from_slice(point.as_bytes());
        out
    }

    pub fn address(&self) -> Address {
        Address::from_uncompressed_pubkey(&self.public_uncompressed())
    }
}

/// Signs `msg` by first hashing it with `sha256`, returning a 65-byte
/// recoverable signature.
pub fn sign(msg: &[u8], key: &PrivateKey) -> RecoverableSig {
    let digest = sha256(msg);
    let (sig, recid): (EcdsaSignature, RecoveryId) = key
        .0
        .sign_prehash_recoverable(digest.as_bytes())
        .expect("signing over a fixed-size digest cannot fail");
    let mut out = [0u8; 65];
    out[..64].copy_from_slice(&sig.to_bytes());
    out[64] = recid.to_byte();
    out
}

/// Recovers the signer's [`Address`] from `msg` and a 65-byte recoverable
/// signature produced by [`sign`].
pub fn recover(msg: &[u8], signature: &[u8]) -> Result<Address, CryptoError> {
    if signature.len() != 65 {
        return Err(CryptoError::SignatureMalformed);
    }
    let recid = RecoveryId::from_byte(signature[64]).ok_or(CryptoError::SignatureMalformed)?;
    let sig = EcdsaSignature::from_slice(&signature[..64])
        .map_err(|_| CryptoError::SignatureMalformed)?;
    let digest = sha256(msg);
    let verifying_key = VerifyingKey::recover_from_prehash(digest.as_bytes(), &sig, recid)
        .map_err(|_| CryptoError::SignatureMalformed)?;
    let point = verifying_key.to_encoded_point(false);
    Ok(Address::from_uncompressed_pubkey(point.as_bytes()))
}

/// Curve25519 key pair used for the sealed-box message channel.
pub struct EncryptionKeyPair {
    pub secret: BoxSecretKey,
    pub public: BoxPublicKey,
}

impl EncryptionKeyPair {
    pub fn generate() -> Self {
        let secret = BoxSecretKey::generate(&mut OsRng);
        let public = secret.public_key();
        EncryptionKeyPair { secret, public }
    }

    pub fn from_secret_bytes(bytes: [u8; 32]) -> Self {
        let secret = BoxSecretKey::from(bytes);
        let public = secret.public_key();
        EncryptionKeyPair { secret, public }
    }
}

/// Authenticated-encrypts `plaintext` from `sender_secret` to
/// `recipient_public`, under the given 24-byte `nonce`.
pub fn seal(
    sender_secret: &BoxSecretKey,
    recipient_public: &BoxPublicKey,
    nonce: &[u8; 24],
    plaintext: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    let sealed = SalsaBox::new(recipient_public, sender_secret);
    let nonce = GenericArray::clone_from_slice(nonce);
    sealed
        .encrypt(&nonce, plaintext)
        .map_err(|_| CryptoError::AuthFailed)
}

/// Opens a ciphertext produced by [`seal`], reversing sender/recipient roles.
pub fn open(
    recipient_secret: &BoxSecretKey,
    sender_public: &BoxPublicKey,
    nonce: &[u8; 24],
    ciphertext: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    let sealed = SalsaBox::new(sender_public, recipient_secret);
    let nonce = GenericArray::clone_from_slice(nonce);
    sealed
        .decrypt(&nonce, ciphertext)
        .map_err(|_| CryptoError::AuthFailed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_then_recover_matches_author() {
        let key = PrivateKey::generate();
        let addr = key.address();
        let msg = b"a canonical transaction encoding";
        let sig = sign(msg, &key);
        let recovered = recover(msg, &sig).unwrap();
        assert_eq!(recovered, addr);
    }

    #[test]
    fn forged_sender_does_not_recover_to_victim() {
        let hacker = PrivateKey::generate();
        let victim = PrivateKey::generate();
        let msg = b"claims to be from victim";
        let sig = sign(msg, &hacker);
        let recovered = recover(msg, &sig).unwrap();
        assert_ne!(recovered, victim.address());
    }

    #[test]
    fn malformed_recovery_byte_rejected() {
        let key = PrivateKey::generate();
        let msg = b"msg";
        let mut sig = sign(msg, &key);
        sig[64] = 200;
        assert!(matches!(
            recover(msg, &sig),
            Err(CryptoError::SignatureMalformed)
        ));
    }

    #[test]
    fn seal_then_open_round_trips() {
        let alice = EncryptionKeyPair::generate();
        let bob = EncryptionKeyPair::generate();
        let nonce = [7u8; 24];
        let ciphertext = seal(&alice.secret, &bob.public, &nonce, b"hello bob").unwrap();
        let plaintext = open(&bob.secret, &alice.public, &nonce, &ciphertext).unwrap();
        assert_eq!(plaintext, b"hello bob");
    }

    #[test]
    fn open_with_wrong_key_fails() {
        let alice = EncryptionKeyPair::generate();
        let bob = EncryptionKeyPair::generate();
        let mallory = EncryptionKeyPair::generate();
        let nonce = [3u8; 24];
        let ciphertext = seal(&alice.secret, &bob.public, &nonce, b"secret").unwrap();
        assert!(open(&mallory.secret, &alice.public, &nonce, &ciphertext).is_err());
    }
}
