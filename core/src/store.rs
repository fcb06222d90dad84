//! Append-only block log, one JSON [`BlockRecord`] per line (`spec.md`
//! §4.D, §4.E.orphan). Grounded on
//! `examples/original_source/state/state.go`'s `loadChainState`/`writeBlock`
//! and on `examples/original_source/node/util.go`'s rollback helper.

use crate::block::BlockRecord;
use crate::error::StorageError;
use crate::hash::Hash;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

/// Handle on the append-only block log for one chain.
pub struct BlockStore {
    path: PathBuf,
    writer: Option<File>,
}

impl BlockStore {
    /// Opens `block.db` at `path` for appending, creating it if absent.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();
        let writer = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|_| StorageError::LogWriteFailed)?;
        Ok(BlockStore {
            path,
            writer: Some(writer),
        })
    }

    /// Appends `record` as a single `\n`-terminated JSON line and flushes it
    /// to the OS (fsync is left to the platform's normal write-back; §9
    /// recommends but does not require per-record fsync).
    pub fn append(&mut self, record: &BlockRecord) -> Result<(), StorageError> {
        let writer = self.writer.as_mut().ok_or(StorageError::ReadOnly)?;
        let mut line = serde_json::to_vec(record).map_err(|_| StorageError::LogWriteFailed)?;
        line.push(b'\n');
        writer.write_all(&line).map_err(|_| StorageError::LogWriteFailed)?;
        writer.flush().map_err(|_| StorageError::LogWriteFailed)
    }

    /// Reads every record currently in the log, in file order. Used by
    /// [`crate::state::State::load`] to replay from genesis.
    pub fn read_all(&self) -> Result<Vec<BlockRecord>, StorageError> {
        read_records(&self.path)
    }

    /// Returns every block whose hash does not precede `start_hash` in file
    /// order (`spec.md` §4.D's `blocks-after`). The zero hash returns every
    /// block.
    pub fn blocks_after(&self, start_hash: &Hash) -> Result<Vec<BlockRecord>, StorageError> {
        let records = self.read_all()?;
        if start_hash.is_zero() {
            return Ok(records);
        }
        let pos = records.iter().position(|r| &r.key == start_hash);
        match pos {
            Some(i) => Ok(records.into_iter().skip(i + 1).collect()),
            None => Ok(Vec::new()),
        }
    }

    /// Drops the write handle so a rollback rename can proceed on platforms
    /// that refuse to rename an open file (`spec.md` §4.E.orphan step 1).
    pub fn close_writer(&mut self) {
        self.writer = None;
    }

    /// Reopens the writer after [`close_writer`](Self::close_writer), e.g.
    /// following a rollback rename (§4.E.orphan step 4).
    pub fn reopen_writer(&mut self) -> Result<(), StorageError> {
        let writer = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|_| StorageError::LogWriteFailed)?;
        self.writer = Some(writer);
        Ok(())
    }

    /// Rewrites `block.db` with its last record removed, via a temporary
    /// file and an atomic rename (`spec.md` §4.E.orphan steps 2-3). The
    /// writer must already be closed.
    pub fn rollback_latest(&mut self) -> Result<(), StorageError> {
        if self.writer.is_some() {
            return Err(StorageError::RollbackFailed);
        }
        let records = read_records(&self.path)?;
        if records.is_empty() {
            return Err(StorageError::RollbackFailed);
        }
        let tmp_path = tmp_path(&self.path);
        let mut tmp = File::create(&tmp_path).map_err(|_| StorageError::RollbackFailed)?;
        for record in &records[..records.len() - 1] {
            let mut line = serde_json::to_vec(record).map_err(|_| StorageError::RollbackFailed)?;
            line.push(b'\n');
            tmp.write_all(&line).map_err(|_| StorageError::RollbackFailed)?;
        }
        tmp.flush().map_err(|_| StorageError::RollbackFailed)?;
        drop(tmp);
        fs::rename(&tmp_path, &self.path).map_err(|_| StorageError::RollbackFailed)?;
        self.reopen_writer()
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    PathBuf::from(tmp)
}

fn read_records(path: &Path) -> Result<Vec<BlockRecord>, StorageError> {
    let file = File::open(path).map_err(|_| StorageError::LogWriteFailed)?;
    let reader = BufReader::new(file);
    let mut out = Vec::new();
    for (i, line) in reader.lines().enumerate() {
        let line = line.map_err(|_| StorageError::LogCorrupt(i))?;
        if line.trim().is_empty() {
            continue;
        }
        let record: BlockRecord =
            serde_json::from_str(&line).map_err(|_| StorageError::LogCorrupt(i))?;
        out.push(record);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::Address;
    use crate::block::{Block, BlockHeader};

    fn block(number: u64, parent: Hash) -> Block {
        Block {
            header: BlockHeader {
                parent,
                time: number,
                number,
                nonce: 0,
                miner: Address([1u8; 20]),
                pow: 1,
            },
            txs: vec![],
        }
    }

    #[test]
    fn append_then_read_all_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("block.db");
        let mut store = BlockStore::open(&db_path).unwrap();

        let b1 = block(1, Hash::ZERO);
        let r1 = BlockRecord::for_block(b1.clone());
        store.append(&r1).unwrap();

        let b2 = block(2, b1.hash());
        let r2 = BlockRecord::for_block(b2.clone());
        store.append(&r2).unwrap();

        let all = store.read_all().unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].key, r1.key);
        assert_eq!(all[1].key, r2.key);
    }

    #[test]
    fn blocks_after_zero_hash_returns_everything() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = BlockStore::open(dir.path().join("block.db")).unwrap();
        let b1 = block(1, Hash::ZERO);
        store.append(&BlockRecord::for_block(b1)).unwrap();

        let after = store.blocks_after(&Hash::ZERO).unwrap();
        assert_eq!(after.len(), 1);
    }

    #[test]
    fn blocks_after_skips_up_to_and_including_start_hash() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = BlockStore::open(dir.path().join("block.db")).unwrap();
        let b1 = block(1, Hash::ZERO);
        let b2 = block(2, b1.hash());
        store.append(&BlockRecord::for_block(b1.clone())).unwrap();
        store.append(&BlockRecord::for_block(b2.clone())).unwrap();

        let after = store.blocks_after(&b1.hash()).unwrap();
        assert_eq!(after.len(), 1);
        assert_eq!(after[0].key, b2.hash());
    }

    #[test]
    fn rollback_latest_drops_last_record_only() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = BlockStore::open(dir.path().join("block.db")).unwrap();
        let b1 = block(1, Hash::ZERO);
        let b2 = block(2, b1.hash());
        store.append(&BlockRecord::for_block(b1.clone())).unwrap();
        store.append(&BlockRecord::for_block(b2.clone())).unwrap();

        store.close_writer();
        store.rollback_latest().unwrap();

        let remaining = store.read_all().unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].key, b1.hash());

        // writer was reopened; further appends succeed.
        let b2_again = block(2, b1.hash());
        store.append(&BlockRecord::for_block(b2_again)).unwrap();
        assert_eq!(store.read_all().unwrap().len(), 2);
    }
}
