//! Database facade and recovery.

use crate::bucket::Snapshot;
use crate::config::Config;
use crate::error::{CoreError, CoreResult};
use crate::transaction::{ReadTransaction, TransactionManager, WriteTransaction};
use crate::types::{SequenceNumber, TransactionId};
use crate::wal::{WalManager, WalRecord};
use bucketdb_storage::{FileBackend, StorageBackend};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// The main database handle.
///
/// `Database` is the primary entry point for interacting with a bucketdb
/// file. It provides:
/// - View (read-only) and Update (read-write) transactions
/// - Bucket management
/// - Recovery from crashes
///
/// # Opening a Database
///
/// ```rust,ignore
/// use bucketdb_core::Database;
/// use std::path::Path;
///
/// // Open or create a database file
/// let db = Database::open(Path::new("my.db"))?;
///
/// db.update(|tx| {
///     tx.create_bucket_if_not_exists(b"widgets")?.put(b"foo", b"bar")
/// })?;
///
/// // Close gracefully
/// db.close()?;
/// ```
///
/// # In-Memory Databases
///
/// For testing, use `Database::open_in_memory()`:
///
/// ```rust,ignore
/// let db = Database::open_in_memory()?;
/// ```
pub struct Database {
    /// Configuration.
    config: Config,
    /// Database file path. None when opened over a caller-supplied backend.
    path: Option<PathBuf>,
    /// Transaction manager; owns the log.
    txn_manager: TransactionManager,
    /// Whether the database is open.
    is_open: RwLock<bool>,
}

/// State rebuilt from the log on open.
struct Recovered {
    snapshot: Snapshot,
    next_txid: u64,
    committed_seq: SequenceNumber,
}

impl Database {
    /// Opens a database file, creating it if it doesn't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Another process has the file locked (`DatabaseLocked`)
    /// - The file is not a bucketdb file (`InvalidFormat`) or its log is
    ///   damaged (`WalCorruption`, `ChecksumMismatch`)
    /// - I/O errors occur
    pub fn open(path: &Path) -> CoreResult<Self> {
        Self::open_with_config(path, Config::default())
    }

    /// Opens a database file with custom configuration.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// use bucketdb_core::{Config, Database};
    /// use std::path::Path;
    ///
    /// let config = Config::default().read_only(true);
    /// let db = Database::open_with_config(Path::new("my.db"), config)?;
    /// ```
    pub fn open_with_config(path: &Path, config: Config) -> CoreResult<Self> {
        let backend = FileBackend::open_with_options(path, config.file_options())?;
        if config.read_only {
            backend.try_lock_shared()?;
        } else {
            backend.try_lock_exclusive()?;
        }
        debug!(path = %path.display(), read_only = config.read_only, "opening database");

        let mut db = Self::open_with_backend(config, Box::new(backend))?;
        db.path = Some(path.to_path_buf());
        Ok(db)
    }

    /// Opens a database over the given backend.
    ///
    /// This is a lower-level constructor for pre-configured backends; no
    /// file lock is taken. For most use cases, prefer `Database::open()`.
    pub fn open_with_backend(config: Config, backend: Box<dyn StorageBackend>) -> CoreResult<Self> {
        let wal = WalManager::new(backend, config.sync_on_commit);
        let recovered = Self::recover(&wal, config.read_only)?;

        let txn_manager = TransactionManager::with_state(
            wal,
            recovered.snapshot,
            recovered.next_txid,
            recovered.committed_seq,
            config.read_only,
        );

        Ok(Self {
            config,
            path: None,
            txn_manager,
            is_open: RwLock::new(true),
        })
    }

    /// Opens a fresh in-memory database for testing.
    ///
    /// Data is lost when the database is dropped.
    pub fn open_in_memory() -> CoreResult<Self> {
        use bucketdb_storage::InMemoryBackend;
        Self::open_with_backend(Config::default(), Box::new(InMemoryBackend::new()))
    }

    /// Rebuilds the committed state by replaying the log.
    ///
    /// Records of transactions without a `Commit` are dropped. When the
    /// database is writable, anything after the last commit is cut off so
    /// later appends never follow a torn or abandoned run.
    fn recover(wal: &WalManager, read_only: bool) -> CoreResult<Recovered> {
        let mut snapshot = Snapshot::default();
        let mut pending: HashMap<TransactionId, Vec<WalRecord>> = HashMap::new();
        let mut max_txid = 0u64;
        let mut committed_seq = SequenceNumber::ZERO;
        let mut replayed = 0usize;
        let mut valid_end = 0u64;

        let total = wal.size()?;
        {
            let mut iter = wal.iter()?;
            while let Some(item) = iter.next() {
                let (_, record) = item?;
                let txid = record.txid();
                max_txid = max_txid.max(txid.as_u64());

                match record {
                    WalRecord::Begin { .. } => {
                        pending.insert(txid, Vec::new());
                    }
                    WalRecord::Commit { sequence, .. } => {
                        let ops = pending.remove(&txid).unwrap_or_default();
                        for op in &ops {
                            snapshot.apply(op)?;
                        }
                        committed_seq = committed_seq.max(sequence);
                        replayed += 1;
                        valid_end = iter.position();
                    }
                    op => {
                        if let Some(ops) = pending.get_mut(&txid) {
                            ops.push(op);
                        }
                    }
                }
            }
        }

        if valid_end < total {
            if read_only {
                debug!(
                    valid_end,
                    total, "ignoring uncommitted tail in read-only database"
                );
            } else {
                warn!(
                    valid_end,
                    discarded = total - valid_end,
                    "truncating uncommitted tail of database file"
                );
                wal.truncate(valid_end)?;
            }
        }

        debug!(
            transactions = replayed,
            buckets = snapshot.bucket_count(),
            sequence = %committed_seq,
            "recovery complete"
        );

        Ok(Recovered {
            snapshot,
            next_txid: max_txid + 1,
            committed_seq,
        })
    }

    /// Begins a View transaction.
    pub fn begin_read(&self) -> CoreResult<ReadTransaction> {
        self.ensure_open()?;
        Ok(self.txn_manager.begin_read())
    }

    /// Begins an Update transaction, waiting for any other writer to finish.
    pub fn begin_write(&self) -> CoreResult<WriteTransaction<'_>> {
        self.ensure_open()?;
        self.txn_manager.begin_write()
    }

    /// Runs `f` inside a View transaction.
    pub fn view<F, T, E>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&ReadTransaction) -> Result<T, E>,
        E: From<CoreError>,
    {
        let txn = self.begin_read()?;
        f(&txn)
    }

    /// Runs `f` inside an Update transaction.
    ///
    /// Commits if `f` returns `Ok`; otherwise rolls back and returns the
    /// closure's error unchanged.
    pub fn update<F, T, E>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut WriteTransaction<'_>) -> Result<T, E>,
        E: From<CoreError>,
    {
        let mut txn = self.begin_write()?;
        match f(&mut txn) {
            Ok(value) => {
                txn.commit()?;
                Ok(value)
            }
            Err(e) => {
                txn.rollback();
                Err(e)
            }
        }
    }

    /// Returns the current committed sequence number.
    #[must_use]
    pub fn committed_seq(&self) -> SequenceNumber {
        self.txn_manager.committed_seq()
    }

    /// Returns the number of buckets in the committed state.
    #[must_use]
    pub fn bucket_count(&self) -> usize {
        self.txn_manager.bucket_count()
    }

    /// Returns the database file path, if opened from one.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Closes the database, flushing and syncing the file.
    ///
    /// Calling `close` again is a no-op.
    pub fn close(&self) -> CoreResult<()> {
        let mut is_open = self.is_open.write();
        if !*is_open {
            return Ok(());
        }

        if !self.config.read_only {
            let wal = self.txn_manager.wal();
            wal.flush()?;
            wal.sync()?;
        }

        *is_open = false;
        debug!(sequence = %self.committed_seq(), "database closed");
        Ok(())
    }

    /// Checks if the database is open.
    #[must_use]
    pub fn is_open(&self) -> bool {
        *self.is_open.read()
    }

    fn ensure_open(&self) -> CoreResult<()> {
        if *self.is_open.read() {
            Ok(())
        } else {
            Err(CoreError::DatabaseClosed)
        }
    }

    /// Returns database configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("path", &self.path)
            .field("is_open", &self.is_open())
            .field("bucket_count", &self.bucket_count())
            .field("committed_seq", &self.committed_seq())
            .finish_non_exhaustive()
    }
}

impl Drop for Database {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!(error = %e, "failed to close database");
        }
    }
}


/// Persistence tests that require a real file system.
#[cfg(test)]
mod persistence_tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn buckets_persist_across_restarts() {
        let temp = tempdir().unwrap();
        let db_path = temp.path().join("persist.db");

        {
            let db = Database::open(&db_path).unwrap();
            db.update(|tx| {
                tx.create_bucket(b"users")?.put(b"alice", b"30")?;
                tx.create_bucket(b"empty").map(|_| ())
            })
            .unwrap();
            db.close().unwrap();
        }

        let db = Database::open(&db_path).unwrap();
        assert_eq!(db.path(), Some(db_path.as_path()));
        let (names, value) = db
            .view(|tx| {
                let names: Vec<Vec<u8>> = tx.bucket_names().map(<[u8]>::to_vec).collect();
                let value = tx
                    .bucket(b"users")
                    .and_then(|b| b.get(b"alice"))
                    .map(<[u8]>::to_vec);
                Ok::<_, CoreError>((names, value))
            })
            .unwrap();
        assert_eq!(names, vec![b"empty".to_vec(), b"users".to_vec()]);
        assert_eq!(value, Some(b"30".to_vec()));
    }

    #[test]
    fn recovery_without_close() {
        let temp = tempdir().unwrap();
        let db_path = temp.path().join("crash.db");

        {
            let db = Database::open(&db_path).unwrap();
            db.update(|tx| tx.create_bucket(b"b")?.put(b"k", b"v")).unwrap();
            // Leak the handle: no close, no drop.
            std::mem::forget(db);
        }

        // The leaked handle still holds the lock in this process, so read
        // the file through a plain backend instead.
        let data = std::fs::read(&db_path).unwrap();
        let db = Database::open_with_backend(
            Config::default(),
            Box::new(bucketdb_storage::InMemoryBackend::with_data(data)),
        )
        .unwrap();
        assert_eq!(db.bucket_count(), 1);
    }

    #[test]
    fn second_writer_is_locked_out() {
        let temp = tempdir().unwrap();
        let db_path = temp.path().join("locked.db");

        let _db = Database::open(&db_path).unwrap();
        assert!(matches!(
            Database::open(&db_path),
            Err(CoreError::DatabaseLocked { .. })
        ));
        assert!(matches!(
            Database::open_with_config(&db_path, Config::default().read_only(true)),
            Err(CoreError::DatabaseLocked { .. })
        ));
    }

    #[test]
    fn lock_released_on_drop() {
        let temp = tempdir().unwrap();
        let db_path = temp.path().join("relock.db");

        drop(Database::open(&db_path).unwrap());
        assert!(Database::open(&db_path).is_ok());
    }

    #[test]
    fn readers_share_the_file() {
        let temp = tempdir().unwrap();
        let db_path = temp.path().join("shared.db");
        drop(Database::open(&db_path).unwrap());

        let config = Config::default().read_only(true);
        let a = Database::open_with_config(&db_path, config.clone()).unwrap();
        let b = Database::open_with_config(&db_path, config).unwrap();
        assert_eq!(a.bucket_count(), b.bucket_count());
        assert!(matches!(
            Database::open(&db_path),
            Err(CoreError::DatabaseLocked { .. })
        ));
    }

    #[test]
    fn read_only_does_not_create() {
        let temp = tempdir().unwrap();
        let db_path = temp.path().join("missing.db");

        let result = Database::open_with_config(&db_path, Config::default().read_only(true));
        assert!(result.is_err());
        assert!(!db_path.exists());
    }

    #[test]
    fn foreign_file_is_not_overwritten() {
        let temp = tempdir().unwrap();
        let db_path = temp.path().join("notes.txt");
        std::fs::write(&db_path, b"shopping list").unwrap();

        assert!(matches!(
            Database::open(&db_path),
            Err(CoreError::InvalidFormat { .. })
        ));
        assert_eq!(std::fs::read(&db_path).unwrap(), b"shopping list");
    }
}
