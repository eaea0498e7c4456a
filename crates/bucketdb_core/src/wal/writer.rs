//! Log writer.

use crate::error::{CoreError, CoreResult};
use crate::wal::record::WalRecord;
use bucketdb_storage::StorageBackend;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::warn;

/// Owns the storage backend of a database and appends to its log.
pub struct WalManager {
    backend: Mutex<Box<dyn StorageBackend>>,
    /// Whether to sync after each committed run.
    sync_on_commit: bool,
    /// Set when a failed run could not be cut back. The tail of the log is
    /// then unknown and nothing more may be appended after it.
    poisoned: AtomicBool,
}

impl WalManager {
    /// Creates a new log manager over `backend`.
    pub fn new(backend: Box<dyn StorageBackend>, sync_on_commit: bool) -> Self {
        Self {
            backend: Mutex::new(backend),
            sync_on_commit,
            poisoned: AtomicBool::new(false),
        }
    }

    /// Appends a transaction's records as one contiguous run and makes the
    /// run durable.
    ///
    /// Returns the offset of the first record. If the append, flush or sync
    /// fails, the log is cut back to its previous size so a later open
    /// cannot replay a run the caller was told had failed. If that cut-back
    /// fails too, every later append is refused.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding or any I/O step fails, or if an earlier
    /// failed run was left in the log.
    pub fn append_run(&self, records: &[WalRecord]) -> CoreResult<u64> {
        if self.is_poisoned() {
            return Err(CoreError::invalid_operation(
                "log holds a partially written commit; reopen the database",
            ));
        }

        let mut data = Vec::new();
        for record in records {
            data.extend_from_slice(&record.encode()?);
        }

        let mut backend = self.backend.lock();
        let start = backend.size()?;

        let result = backend.append(&data).and_then(|offset| {
            backend.flush()?;
            if self.sync_on_commit {
                backend.sync()?;
            }
            Ok(offset)
        });

        match result {
            Ok(offset) => Ok(offset),
            Err(err) => {
                // A failed write_all may have left bytes past the tracked size.
                if let Err(undo) = backend.truncate(start) {
                    self.poisoned.store(true, Ordering::Release);
                    warn!(
                        offset = start,
                        error = %undo,
                        "failed to cut back partially written commit; log is now read-only"
                    );
                }
                Err(err.into())
            }
        }
    }

    /// Returns true once a failed run could not be removed from the log.
    pub fn is_poisoned(&self) -> bool {
        self.poisoned.load(Ordering::Acquire)
    }

    /// Flushes pending writes to the operating system.
    pub fn flush(&self) -> CoreResult<()> {
        self.backend.lock().flush()?;
        Ok(())
    }

    /// Syncs the log to durable storage.
    pub fn sync(&self) -> CoreResult<()> {
        self.backend.lock().sync()?;
        Ok(())
    }

    /// Returns the current log size.
    pub fn size(&self) -> CoreResult<u64> {
        Ok(self.backend.lock().size()?)
    }

    /// Returns a streaming iterator over the records of the log.
    ///
    /// The iterator holds the backend lock until dropped.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be accessed.
    pub fn iter(&self) -> CoreResult<super::WalRecordIterator<'_>> {
        super::WalRecordIterator::new(self.backend.lock(), 0)
    }

    /// Truncates the log to `offset`.
    pub fn truncate(&self, offset: u64) -> CoreResult<()> {
        self.backend.lock().truncate(offset)?;
        Ok(())
    }
}

impl std::fmt::Debug for WalManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalManager")
            .field("sync_on_commit", &self.sync_on_commit)
            .field("poisoned", &self.is_poisoned())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{SequenceNumber, TransactionId};
    use bucketdb_storage::{InMemoryBackend, StorageError, StorageResult};

    fn run(txid: u64) -> Vec<WalRecord> {
        let txid = TransactionId::new(txid);
        vec![
            WalRecord::Begin { txid },
            WalRecord::Commit {
                txid,
                sequence: SequenceNumber::new(1),
            },
        ]
    }

    /// Appends succeed, flushes fail.
    struct FlushFails(InMemoryBackend);

    impl StorageBackend for FlushFails {
        fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
            self.0.read_at(offset, len)
        }
        fn append(&mut self, data: &[u8]) -> StorageResult<u64> {
            self.0.append(data)
        }
        fn flush(&mut self) -> StorageResult<()> {
            Err(StorageError::Io(std::io::Error::other("disk full")))
        }
        fn size(&self) -> StorageResult<u64> {
            self.0.size()
        }
        fn sync(&mut self) -> StorageResult<()> {
            Ok(())
        }
        fn truncate(&mut self, new_size: u64) -> StorageResult<()> {
            self.0.truncate(new_size)
        }
    }

    /// Writes half of each append before failing, and cannot truncate.
    struct TornAppend(InMemoryBackend);

    impl StorageBackend for TornAppend {
        fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
            self.0.read_at(offset, len)
        }
        fn append(&mut self, data: &[u8]) -> StorageResult<u64> {
            self.0.append(&data[..data.len() / 2])?;
            Err(StorageError::Io(std::io::Error::other("short write")))
        }
        fn flush(&mut self) -> StorageResult<()> {
            Ok(())
        }
        fn size(&self) -> StorageResult<u64> {
            self.0.size()
        }
        fn sync(&mut self) -> StorageResult<()> {
            Ok(())
        }
        fn truncate(&mut self, _new_size: u64) -> StorageResult<()> {
            Err(StorageError::Io(std::io::Error::other("read-only filesystem")))
        }
    }

    #[test]
    fn append_run_is_contiguous() {
        let backend = InMemoryBackend::new();
        let wal = WalManager::new(Box::new(backend.clone()), true);

        assert_eq!(wal.append_run(&run(1)).unwrap(), 0);
        let second = wal.append_run(&run(2)).unwrap();
        assert_eq!(second * 2, wal.size().unwrap());

        let records: Vec<_> = wal.iter().unwrap().map(|r| r.unwrap().1).collect();
        assert_eq!(records.len(), 4);
        assert_eq!(records[2].txid(), TransactionId::new(2));
        assert_eq!(backend.size().unwrap(), wal.size().unwrap());
    }

    #[test]
    fn failed_flush_cuts_run_back() {
        let inner = InMemoryBackend::new();
        let wal = WalManager::new(Box::new(FlushFails(inner.clone())), false);

        assert!(wal.append_run(&run(1)).is_err());
        assert_eq!(inner.size().unwrap(), 0);
    }

    #[test]
    fn failed_cut_back_refuses_later_runs() {
        let inner = InMemoryBackend::new();
        let wal = WalManager::new(Box::new(TornAppend(inner.clone())), false);

        assert!(wal.append_run(&run(1)).is_err());
        let torn = inner.size().unwrap();
        assert!(torn > 0);
        assert!(wal.is_poisoned());

        let err = wal.append_run(&run(2)).unwrap_err();
        assert!(matches!(err, CoreError::InvalidOperation { .. }));
        assert_eq!(inner.size().unwrap(), torn);
    }
}
