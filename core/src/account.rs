//! Per-account catalogue records (`spec.md` §3).

use crate::address::Address;
use crate::hash::Hash;
use crate::tx::PeerDescriptor;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// One outgoing transfer/publish recorded against the sender.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentEntry {
    pub counterparty: Address,
    pub content_id: Option<String>,
    pub tx_hash: Hash,
    pub amount: f32,
}

/// One incoming transfer/publish recorded against the recipient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboxEntry {
    pub counterparty: Address,
    pub content_id: Option<String>,
    pub tx_hash: Hash,
    pub amount: f32,
}

/// A single account's on-chain record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccountRecord {
    pub balance: f32,
    #[serde(rename = "pending_balance")]
    pub pending_balance: f32,
    #[serde(default)]
    pub sent: Vec<SentEntry>,
    #[serde(default)]
    pub inbox: Vec<InboxEntry>,
    #[serde(default)]
    pub trusted_peers: Vec<PeerDescriptor>,
    #[serde(default)]
    pub owned_channels: BTreeSet<String>,
}

impl AccountRecord {
    pub fn new_funded(balance: f32) -> Self {
        AccountRecord {
            balance,
            pending_balance: balance,
            ..Default::default()
        }
    }
}

/// The in-memory account table: `Address -> AccountRecord`.
pub type Catalogue = HashMap<Address, AccountRecord>;

/// `Address -> highest applied/admitted nonce`.
pub type NonceTable = HashMap<Address, u64>;
