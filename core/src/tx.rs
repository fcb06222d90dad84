//! Transaction model (`spec.md` §3, §4.B).

use crate::account::{AccountRecord, Catalogue, InboxEntry, NonceTable, SentEntry};
use crate::address::Address;
use crate::crypto::{self, PrivateKey};
use crate::error::ValidationError;
use crate::hash::{json_object, CanonicalJson, Hash};
use serde::{Deserialize, Serialize};

/// A peer known (or trusted) by an account, exchanged via [`TxPayload::TrustPeer`]
/// and over the sync fabric (`spec.md` §3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeerDescriptor {
    pub name: String,
    pub ip: String,
    pub port: u16,
    pub is_bootstrap: bool,
    pub address: Address,
    #[serde(default)]
    pub encryption_public_key: Option<String>,
    #[serde(default)]
    pub connected: bool,
}

/// The closed set of transaction payload variants (`spec.md` §3). Matching on
/// this type must stay exhaustive — the variant set is part of the
/// consensus contract, not an extension point.
///
/// Internally tagged on `kind` so the canonical encoding (§4.A) and the wire
/// encoding (§6) are the same `serde_json::to_value` call: with
/// `preserve_order` enabled the tag is emitted first, followed by each
/// variant's fields in declaration order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TxPayload {
    Publish {
        recipient: Address,
        content_id: String,
        gateway_hint: String,
        label: String,
        amount: f32,
    },
    Transfer {
        recipient: Address,
        amount: f32,
    },
    TrustPeer {
        peer: PeerDescriptor,
    },
    Channel {
        topic: String,
    },
}

impl TxPayload {
    /// The recipient account credited by this payload, if any.
    pub fn recipient(&self) -> Option<Address> {
        match self {
            TxPayload::Publish { recipient, .. } => Some(*recipient),
            TxPayload::Transfer { recipient, .. } => Some(*recipient),
            TxPayload::TrustPeer { .. } | TxPayload::Channel { .. } => None,
        }
    }

    /// The amount credited to the recipient, `0.0` for payloads with no
    /// value component.
    pub fn amount(&self) -> f32 {
        match self {
            TxPayload::Publish { amount, .. } => *amount,
            TxPayload::Transfer { amount, .. } => *amount,
            TxPayload::TrustPeer { .. } | TxPayload::Channel { .. } => 0.0,
        }
    }

    /// The balance cost charged to the author, checked against
    /// pending-balance in [`validate`] and debited in [`apply`].
    pub fn cost(&self) -> f32 {
        match self {
            TxPayload::Publish { .. } => 1.0,
            TxPayload::Transfer { amount, .. } => *amount,
            TxPayload::TrustPeer { .. } => 0.0,
            TxPayload::Channel { .. } => 1.0,
        }
    }

    /// The canonical JSON value for this payload: identical to its derived
    /// wire encoding (internally-tagged, `preserve_order`-stable).
    fn to_canonical_value(&self) -> serde_json::Value {
        serde_json::to_value(self).expect("TxPayload always serialises")
    }
}

/// Returns `true` if `cid` looks like a plausible content identifier: the
/// reasonable validity floor named in `spec.md` §4.B — non-empty and
/// starting with a CIDv0 (`Qm`) or CIDv1 (`bafy`) prefix over a
/// base58/base32-plausible charset.
pub fn is_plausible_cid(cid: &str) -> bool {
    if cid.is_empty() {
        return false;
    }
    let is_base58_or_base32 = |c: char| c.is_ascii_alphanumeric();
    if let Some(rest) = cid.strip_prefix("Qm") {
        return !rest.is_empty() && rest.chars().all(is_base58_or_base32);
    }
    if let Some(rest) = cid.strip_prefix("bafy") {
        return !rest.is_empty() && rest.chars().all(is_base58_or_base32);
    }
    false
}

/// An unsigned transaction (`spec.md` §3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub author: Address,
    pub nonce: u64,
    pub timestamp: u64,
    pub payload: TxPayload,
}

impl CanonicalJson for Transaction {
    fn to_canonical_value(&self) -> serde_json::Value {
        json_object(vec![
            ("author", serde_json::to_value(self.author).unwrap()),
            ("nonce", self.nonce.into()),
            ("timestamp", self.timestamp.into()),
            ("payload", self.payload.to_canonical_value()),
        ])
    }
}

impl Transaction {
    pub fn hash(&self) -> Hash {
        self.canonical_hash()
    }

    /// Signs this transaction with `key`, producing a [`SignedTransaction`].
    pub fn sign(self, key: &PrivateKey) -> SignedTransaction {
        let digest = self.to_canonical_bytes();
        let sig = crypto::sign(&digest, key);
        SignedTransaction { tx: self, sig }
    }
}

/// A transaction plus its detached 65-byte recoverable signature
/// (`spec.md` §3).
///
/// The *hash* of a `SignedTransaction` is computed over the unsigned
/// [`Transaction`] alone (`author`/`nonce`/`timestamp`/`payload`, `spec.md`
/// §4.A) — that canonical encoding is a separate concern from this struct's
/// *wire* encoding, which follows §6's flat `author`/`to`/`payload`/`nonce`/
/// `time`/`amount`/`signature` layout with `to`/`amount` hoisted out of
/// `payload` as reader convenience fields.
#[derive(Debug, Clone, PartialEq)]
pub struct SignedTransaction {
    pub tx: Transaction,
    pub sig: [u8; 65],
}

impl SignedTransaction {
    /// The transaction hash (identical to `self.tx.hash()`), used as the
    /// mempool/archive key.
    pub fn hash(&self) -> Hash {
        self.tx.hash()
    }

    /// Recovers the address that produced `self.sig` and compares it to the
    /// claimed author. `spec.md` §3's `SignedTransaction` invariant.
    pub fn recovered_author(&self) -> Result<Address, crate::error::CryptoError> {
        crypto::recover(&self.tx.to_canonical_bytes(), &self.sig)
    }

    pub fn is_authentic(&self) -> bool {
        matches!(self.recovered_author(), Ok(addr) if addr == self.tx.author)
    }
}

impl Serialize for SignedTransaction {
    /// Emits the §6 wire shape, key order `author, to, payload, nonce, time,
    /// amount, signature` — stable under `preserve_order`, not itself a
    /// canonicalisation target (only [`Transaction::to_canonical_value`] is).
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let value = json_object(vec![
            ("author", serde_json::to_value(self.tx.author).unwrap()),
            (
                "to",
                self.tx
                    .payload
                    .recipient()
                    .map(|a| serde_json::to_value(a).unwrap())
                    .unwrap_or(serde_json::Value::Null),
            ),
            ("payload", self.tx.payload.to_canonical_value()),
            ("nonce", self.tx.nonce.into()),
            ("time", self.tx.timestamp.into()),
            ("amount", self.tx.payload.amount().into()),
            ("signature", sig_base64::encode(&self.sig).into()),
        ]);
        value.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for SignedTransaction {
    /// Accepts the current tagged-`payload` shape on read. Also accepts the
    /// legacy flat `from`/`to`/`cid` layout named in `spec.md` §6's
    /// compatibility clause, rebuilding it as a `Publish` payload — older
    /// on-disk records never carried `gateway_hint`/`label`, so those come
    /// back empty.
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = serde_json::Value::deserialize(deserializer)?;
        let get_str = |key: &str| -> Option<String> {
            value.get(key).and_then(|v| v.as_str()).map(String::from)
        };
        let author: Address = get_str("author")
            .ok_or_else(|| serde::de::Error::missing_field("author"))?
            .parse()
            .map_err(serde::de::Error::custom)?;
        let nonce = value
            .get("nonce")
            .and_then(|v| v.as_u64())
            .ok_or_else(|| serde::de::Error::missing_field("nonce"))?;
        let timestamp = value
            .get("time")
            .and_then(|v| v.as_u64())
            .ok_or_else(|| serde::de::Error::missing_field("time"))?;
        let signature = get_str("signature")
            .ok_or_else(|| serde::de::Error::missing_field("signature"))?;
        let sig = sig_base64::decode(&signature).map_err(serde::de::Error::custom)?;

        let payload = if let Some(payload_value) = value.get("payload") {
            serde_json::from_value::<TxPayload>(payload_value.clone())
                .map_err(serde::de::Error::custom)?
        } else {
            let to: Address = get_str("to")
                .ok_or_else(|| serde::de::Error::missing_field("to"))?
                .parse()
                .map_err(serde::de::Error::custom)?;
            let amount = value.get("amount").and_then(|v| v.as_f64()).unwrap_or(0.0) as f32;
            match get_str("cid") {
                Some(cid) => TxPayload::Publish {
                    recipient: to,
                    content_id: cid,
                    gateway_hint: String::new(),
                    label: String::new(),
                    amount,
                },
                None => TxPayload::Transfer {
                    recipient: to,
                    amount,
                },
            }
        };

        Ok(SignedTransaction {
            tx: Transaction {
                author,
                nonce,
                timestamp,
                payload,
            },
            sig,
        })
    }
}

mod sig_base64 {
    use base64::{engine::general_purpose::STANDARD, Engine as _};

    pub fn encode(data: &[u8]) -> String {
        STANDARD.encode(data)
    }

    pub fn decode(s: &str) -> Result<[u8; 65], String> {
        let out = STANDARD
            .decode(s)
            .map_err(|e| format!("invalid base64 signature: {e}"))?;
        if out.len() != 65 {
            return Err("signature must be 65 bytes".to_string());
        }
        let mut sig = [0u8; 65];
        sig.copy_from_slice(&out);
        Ok(sig)
    }
}

/// Validates `signed` against the given committed nonce and the balance a
/// caller provides as the spendable baseline — callers pass
/// `catalogue[author].balance` from the state engine or the mempool's
/// shadow pending-balance, per `spec.md` §4.B / §4.G.
pub fn validate(
    signed: &SignedTransaction,
    committed_nonce: u64,
    spendable_balance: f32,
) -> Result<(), ValidationError> {
    if !signed.is_authentic() {
        return Err(ValidationError::ForgedSender);
    }
    let expected = committed_nonce + 1;
    if signed.tx.nonce != expected {
        return Err(ValidationError::NonceGap {
            expected,
            got: signed.tx.nonce,
        });
    }
    match &signed.tx.payload {
        TxPayload::Publish {
            content_id, amount, ..
        } => {
            if !is_plausible_cid(content_id) {
                return Err(ValidationError::InvalidContent);
            }
            if spendable_balance < 1.0f32.max(*amount) {
                return Err(ValidationError::InsufficientBalance);
            }
        }
        TxPayload::Transfer { amount, .. } => {
            if spendable_balance < *amount {
                return Err(ValidationError::InsufficientBalance);
            }
        }
        TxPayload::TrustPeer { .. } | TxPayload::Channel { .. } => {}
    }
    Ok(())
}

/// Applies `signed` to the committed catalogue/nonce table. Callers must
/// have already called [`validate`] — `apply` does not re-check
/// authenticity, nonce order or balance sufficiency.
pub fn apply(signed: &SignedTransaction, catalogue: &mut Catalogue, nonces: &mut NonceTable) {
    let tx = &signed.tx;
    let author = tx.author;
    let tx_hash = signed.hash();
    let cost = tx.payload.cost();

    if cost != 0.0 {
        let rec = catalogue.entry(author).or_default();
        rec.balance -= cost;
        rec.pending_balance -= cost;
    }

    match &tx.payload {
        TxPayload::Publish {
            recipient,
            content_id,
            amount,
            ..
        } => {
            let sender = catalogue.entry(author).or_default();
            sender.sent.push(SentEntry {
                counterparty: *recipient,
                content_id: Some(content_id.clone()),
                tx_hash,
                amount: *amount,
            });
            if !content_id.is_empty() {
                let recipient_rec = catalogue.entry(*recipient).or_default();
                recipient_rec.inbox.push(InboxEntry {
                    counterparty: author,
                    content_id: Some(content_id.clone()),
                    tx_hash,
                    amount: *amount,
                });
            }
            let recipient_rec = catalogue.entry(*recipient).or_default();
            recipient_rec.balance += amount;
            recipient_rec.pending_balance += amount;
        }
        TxPayload::Transfer { recipient, amount } => {
            let recipient_rec = catalogue.entry(*recipient).or_default();
            recipient_rec.balance += amount;
            recipient_rec.pending_balance += amount;
        }
        TxPayload::TrustPeer { peer } => {
            let sender = catalogue.entry(author).or_default();
            sender.trusted_peers.push(peer.clone());
        }
        TxPayload::Channel { topic } => {
            let sender = catalogue.entry(author).or_default();
            sender.owned_channels.insert(topic.clone());
        }
    }

    nonces.insert(author, tx.nonce);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signed_transfer(key: &PrivateKey, nonce: u64, recipient: Address, amount: f32) -> SignedTransaction {
        Transaction {
            author: key.address(),
            nonce,
            timestamp: 1,
            payload: TxPayload::Transfer { recipient, amount },
        }
        .sign(key)
    }

    #[test]
    fn authentic_signature_recovers_author() {
        let key = PrivateKey::generate();
        let tx = signed_transfer(&key, 1, Address([2u8; 20]), 5.0);
        assert!(tx.is_authentic());
    }

    #[test]
    fn forged_author_fails_validation() {
        let hacker = PrivateKey::generate();
        let victim = PrivateKey::generate();
        let mut tx = signed_transfer(&hacker, 1, Address([2u8; 20]), 5.0);
        tx.tx.author = victim.address();
        assert_eq!(validate(&tx, 0, 100.0), Err(ValidationError::ForgedSender));
    }

    #[test]
    fn nonce_gap_rejected() {
        let key = PrivateKey::generate();
        let tx = signed_transfer(&key, 5, Address([2u8; 20]), 1.0);
        assert_eq!(
            validate(&tx, 0, 100.0),
            Err(ValidationError::NonceGap { expected: 1, got: 5 })
        );
    }

    #[test]
    fn insufficient_balance_rejected() {
        let key = PrivateKey::generate();
        let tx = signed_transfer(&key, 1, Address([2u8; 20]), 50.0);
        assert_eq!(
            validate(&tx, 0, 10.0),
            Err(ValidationError::InsufficientBalance)
        );
    }

    #[test]
    fn transfer_apply_moves_balance() {
        let key = PrivateKey::generate();
        let author = key.address();
        let recipient = Address([9u8; 20]);
        let tx = signed_transfer(&key, 1, recipient, 5.0);

        let mut catalogue = Catalogue::new();
        catalogue.insert(author, AccountRecord::new_funded(100.0));
        let mut nonces = NonceTable::new();

        apply(&tx, &mut catalogue, &mut nonces);

        assert_eq!(catalogue[&author].balance, 95.0);
        assert_eq!(catalogue[&recipient].balance, 5.0);
        assert_eq!(nonces[&author], 1);
    }

    #[test]
    fn plausible_cid_floor() {
        assert!(is_plausible_cid("QmT78zSuBmuS4z925WZfrqQ1qHaJ56DQaTfyMUF7F8ff5o"));
        assert!(is_plausible_cid("bafybeigdyrzt5sfp7udm7hu76uh7y26nf3efuylqabf3oclgtqy55fbzdi"));
        assert!(!is_plausible_cid(""));
        assert!(!is_plausible_cid("not-a-cid"));
    }

    #[test]
    fn canonical_json_round_trip_is_stable() {
        let key = PrivateKey::generate();
        let tx = signed_transfer(&key, 1, Address([2u8; 20]), 5.0);
        let a = tx.tx.to_canonical_bytes();
        let b = tx.tx.to_canonical_bytes();
        assert_eq!(a, b);
    }

    #[test]
    fn wire_format_round_trips_and_stays_authentic() {
        let key = PrivateKey::generate();
        let recipient = Address([4u8; 20]);
        let tx = signed_transfer(&key, 1, recipient, 5.0);

        let json = serde_json::to_string(&tx).unwrap();
        assert!(json.starts_with("{\"author\":"));
        assert!(json.contains("\"to\":"));
        assert!(json.contains("\"signature\":"));

        let back: SignedTransaction = serde_json::from_str(&json).unwrap();
        assert_eq!(back, tx);
        assert!(back.is_authentic());
    }

    #[test]
    fn legacy_from_to_cid_layout_reads_as_publish() {
        let key = PrivateKey::generate();
        let recipient = Address([6u8; 20]);
        let legacy = serde_json::json!({
            "author": key.address().to_hex(),
            "to": recipient.to_hex(),
            "cid": "QmLegacyRecord1234567890",
            "nonce": 1,
            "time": 42,
            "amount": 0.0,
            "signature": sig_base64::encode(&[0u8; 65]),
        });
        let parsed: SignedTransaction = serde_json::from_value(legacy).unwrap();
        match parsed.tx.payload {
            TxPayload::Publish {
                recipient: r,
                content_id,
                ..
            } => {
                assert_eq!(r, recipient);
                assert_eq!(content_id, "QmLegacyRecord1234567890");
            }
            other => panic!("expected Publish, got {other:?}"),
        }
    }
}
