//! Pending-transaction pool with shadow pending-balance admission
//! (`spec.md` §4.G). Grounded on
//! `examples/original_source/node/pending_tx_exchange.go`'s admission path.

use crate::account::{Catalogue, NonceTable};
use crate::address::Address;
use crate::error::ValidationError;
use crate::hash::Hash;
use crate::tx::{self, SignedTransaction};
use std::collections::HashMap;

/// Admitted-but-unmined and already-mined transaction tables, plus the
/// shadow nonce/balance view `admit_pending` validates new arrivals against.
pub struct Mempool {
    pending: HashMap<Hash, SignedTransaction>,
    archived: HashMap<Hash, SignedTransaction>,
    nonce_pending: NonceTable,
    pending_balance: HashMap<Address, f32>,
}

impl Mempool {
    pub fn new() -> Self {
        Mempool {
            pending: HashMap::new(),
            archived: HashMap::new(),
            nonce_pending: NonceTable::new(),
            pending_balance: HashMap::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn contains(&self, hash: &Hash) -> bool {
        self.pending.contains_key(hash) || self.archived.contains_key(hash)
    }

    /// Snapshot of currently pending transactions as an ordered list, the
    /// shape the mining tick hands to the miner (`spec.md` §4.G).
    pub fn snapshot_pending(&self) -> Vec<SignedTransaction> {
        self.pending.values().cloned().collect()
    }

    /// Seeds the shadow pending-balance table from the committed catalogue;
    /// called once at startup and whenever a block changes committed
    /// balances out from under the mempool.
    pub fn sync_committed(&mut self, catalogue: &Catalogue, nonces: &NonceTable) {
        self.pending_balance = catalogue
            .iter()
            .map(|(addr, rec)| (*addr, rec.pending_balance))
            .collect();
        self.nonce_pending = nonces.clone();
    }

    /// Admits `signed` into `pending` after validating it against the shadow
    /// pending-balance view (`spec.md` §4.G's `admit-pending`). Idempotent:
    /// a hash already in `pending` or `archived` is silently ignored.
    pub fn admit_pending(&mut self, signed: SignedTransaction) -> Result<(), ValidationError> {
        let hash = signed.hash();
        if self.contains(&hash) {
            return Ok(());
        }

        let author = signed.tx.author;
        let committed_nonce = *self.nonce_pending.get(&author).unwrap_or(&0);
        let spendable = *self.pending_balance.get(&author).unwrap_or(&0.0);
        tx::validate(&signed, committed_nonce, spendable)?;

        let cost = signed.tx.payload.cost();
        *self.pending_balance.entry(author).or_insert(0.0) -= cost;
        if let Some(recipient) = signed.tx.payload.recipient() {
            *self.pending_balance.entry(recipient).or_insert(0.0) += signed.tx.payload.amount();
        }
        self.nonce_pending.insert(author, signed.tx.nonce);
        self.pending.insert(hash, signed);
        Ok(())
    }

    /// Moves every transaction in `hashes` from `pending` to `archived`,
    /// called once their enclosing block has been accepted.
    pub fn archive(&mut self, hashes: impl IntoIterator<Item = Hash>) {
        for hash in hashes {
            if let Some(tx) = self.pending.remove(&hash) {
                self.archived.insert(hash, tx);
            }
        }
    }
}

impl Default for Mempool {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::AccountRecord;
    use crate::crypto::PrivateKey;
    use crate::tx::{Transaction, TxPayload};

    fn transfer(key: &PrivateKey, nonce: u64, recipient: Address, amount: f32) -> SignedTransaction {
        Transaction {
            author: key.address(),
            nonce,
            timestamp: nonce,
            payload: TxPayload::Transfer { recipient, amount },
        }
        .sign(key)
    }

    fn mempool_with_balance(author: Address, balance: f32) -> Mempool {
        let mut pool = Mempool::new();
        let mut catalogue = Catalogue::new();
        catalogue.insert(author, AccountRecord::new_funded(balance));
        pool.sync_committed(&catalogue, &NonceTable::new());
        pool
    }

    #[test]
    fn admits_valid_tx_and_updates_shadow_balance() {
        let key = PrivateKey::generate();
        let recipient = Address([2u8; 20]);
        let mut pool = mempool_with_balance(key.address(), 100.0);

        let tx = transfer(&key, 1, recipient, 10.0);
        pool.admit_pending(tx.clone()).unwrap();

        assert_eq!(pool.len(), 1);
        assert!(pool.contains(&tx.hash()));
    }

    #[test]
    fn admitting_same_tx_twice_is_idempotent() {
        let key = PrivateKey::generate();
        let recipient = Address([2u8; 20]);
        let mut pool = mempool_with_balance(key.address(), 100.0);

        let tx = transfer(&key, 1, recipient, 10.0);
        pool.admit_pending(tx.clone()).unwrap();
        pool.admit_pending(tx).unwrap();
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn second_tx_spends_against_shadow_balance_not_committed() {
        let key = PrivateKey::generate();
        let recipient = Address([2u8; 20]);
        let mut pool = mempool_with_balance(key.address(), 15.0);

        pool.admit_pending(transfer(&key, 1, recipient, 10.0))
            .unwrap();
        let result = pool.admit_pending(transfer(&key, 2, recipient, 10.0));
        assert_eq!(result, Err(ValidationError::InsufficientBalance));
    }

    #[test]
    fn archive_moves_entries_out_of_pending() {
        let key = PrivateKey::generate();
        let recipient = Address([2u8; 20]);
        let mut pool = mempool_with_balance(key.address(), 100.0);
        let tx = transfer(&key, 1, recipient, 10.0);
        let hash = tx.hash();
        pool.admit_pending(tx).unwrap();

        pool.archive(vec![hash]);
        assert_eq!(pool.len(), 0);
        assert!(pool.contains(&hash));
    }
}
