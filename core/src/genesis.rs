//! Genesis file parsing and data-directory initialisation (`spec.md` §4.D,
//! §6). Grounded on `examples/original_source/state/genesis.go`, resolving
//! its several incompatible on-disk shapes down to the single `catalogue`-
//! keyed shape §6 names as canonical.

use crate::account::{AccountRecord, Catalogue};
use crate::address::Address;
use crate::error::StorageError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// The `genesis.json` document seeding a chain's initial catalogue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Genesis {
    pub genesis_time: String,
    pub chain_id: String,
    pub catalogue: HashMap<Address, AccountRecord>,
}

impl Genesis {
    /// A minimal single-chain-id genesis with no funded accounts, useful for
    /// tests and for bootstrapping a brand-new chain with no pre-mine.
    pub fn empty(chain_id: impl Into<String>, genesis_time: impl Into<String>) -> Self {
        Genesis {
            genesis_time: genesis_time.into(),
            chain_id: chain_id.into(),
            catalogue: HashMap::new(),
        }
    }

    pub fn into_catalogue(self) -> Catalogue {
        self.catalogue
    }
}

/// Returns the chain's data directory, `data_dir/<chain_id>`.
pub fn chain_dir(data_dir: &Path, chain_id: &str) -> PathBuf {
    data_dir.join(chain_id)
}

/// Returns the path to the chain's genesis file.
pub fn genesis_path(data_dir: &Path, chain_id: &str) -> PathBuf {
    chain_dir(data_dir, chain_id).join("genesis.json")
}

/// Returns the path to the chain's append-only block log.
pub fn block_db_path(data_dir: &Path, chain_id: &str) -> PathBuf {
    chain_dir(data_dir, chain_id).join("block.db")
}

/// Creates `data_dir/<chain_id>/` if missing, writes `genesis.json` verbatim
/// if absent, and creates an empty `block.db` if absent (`spec.md` §4.D).
pub fn initialise(data_dir: &Path, chain_id: &str, genesis: &Genesis) -> Result<(), StorageError> {
    let dir = chain_dir(data_dir, chain_id);
    fs::create_dir_all(&dir).map_err(|_| StorageError::LogWriteFailed)?;

    let genesis_file = genesis_path(data_dir, chain_id);
    if !genesis_file.exists() {
        let json = serde_json::to_vec(genesis).map_err(|_| StorageError::LogWriteFailed)?;
        fs::write(&genesis_file, json).map_err(|_| StorageError::LogWriteFailed)?;
    }

    let block_db = block_db_path(data_dir, chain_id);
    if !block_db.exists() {
        fs::write(&block_db, b"").map_err(|_| StorageError::LogWriteFailed)?;
    }

    Ok(())
}

/// Parses the genesis file already present at `data_dir/<chain_id>/genesis.json`.
pub fn load(data_dir: &Path, chain_id: &str) -> Result<Genesis, StorageError> {
    let bytes = fs::read(genesis_path(data_dir, chain_id)).map_err(|_| StorageError::LogCorrupt(0))?;
    serde_json::from_slice(&bytes).map_err(|_| StorageError::LogCorrupt(0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initialise_creates_layout_once() {
        let dir = tempfile::tempdir().unwrap();
        let genesis = Genesis::empty("obscura-test", "2026-01-01T00:00:00Z");

        initialise(dir.path(), "obscura-test", &genesis).unwrap();
        assert!(genesis_path(dir.path(), "obscura-test").exists());
        assert!(block_db_path(dir.path(), "obscura-test").exists());

        // Writing a second time must not clobber an existing genesis file.
        let mut funded = genesis.clone();
        funded
            .catalogue
            .insert(Address([1u8; 20]), AccountRecord::new_funded(500.0));
        initialise(dir.path(), "obscura-test", &funded).unwrap();

        let loaded = load(dir.path(), "obscura-test").unwrap();
        assert!(loaded.catalogue.is_empty());
    }

    #[test]
    fn genesis_round_trips_catalogue() {
        let mut genesis = Genesis::empty("obscura-test", "2026-01-01T00:00:00Z");
        genesis
            .catalogue
            .insert(Address([3u8; 20]), AccountRecord::new_funded(100.0));

        let json = serde_json::to_vec(&genesis).unwrap();
        let back: Genesis = serde_json::from_slice(&json).unwrap();
        assert_eq!(back.catalogue[&Address([3u8; 20])].balance, 100.0);
    }
}
