//! Transaction manager.

use crate::bucket::Snapshot;
use crate::error::{CoreError, CoreResult};
use crate::transaction::state::{ReadTransaction, WriteTransaction};
use crate::types::{SequenceNumber, TransactionId};
use crate::wal::{WalManager, WalRecord};
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

/// The committed state and the sequence that produced it, swapped as one.
#[derive(Debug, Clone)]
struct Committed {
    seq: SequenceNumber,
    snapshot: Arc<Snapshot>,
}

/// Coordinates transactions over one log.
///
/// - Readers clone the `Arc` of the committed snapshot and never block
///   writers
/// - `begin_write()` takes the single writer lock for the transaction's
///   lifetime
/// - A commit appends the transaction's run to the log, then publishes the
///   new snapshot
pub struct TransactionManager {
    wal: WalManager,
    committed: RwLock<Committed>,
    next_txid: AtomicU64,
    write_lock: Mutex<()>,
    read_only: bool,
}

impl TransactionManager {
    /// Creates a manager initialized from recovery state.
    pub(crate) fn with_state(
        wal: WalManager,
        snapshot: Snapshot,
        next_txid: u64,
        committed_seq: SequenceNumber,
        read_only: bool,
    ) -> Self {
        Self {
            wal,
            committed: RwLock::new(Committed {
                seq: committed_seq,
                snapshot: Arc::new(snapshot),
            }),
            next_txid: AtomicU64::new(next_txid),
            write_lock: Mutex::new(()),
            read_only,
        }
    }

    fn allocate_txid(&self) -> TransactionId {
        TransactionId::new(self.next_txid.fetch_add(1, Ordering::SeqCst))
    }

    /// Begins a read-only transaction on the current committed snapshot.
    pub fn begin_read(&self) -> ReadTransaction {
        let committed = self.committed.read().clone();
        ReadTransaction::new(self.allocate_txid(), committed.seq, committed.snapshot)
    }

    /// Begins a write transaction, blocking while another one is live.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidOperation`] if the database was opened
    /// read-only.
    pub fn begin_write(&self) -> CoreResult<WriteTransaction<'_>> {
        if self.read_only {
            return Err(CoreError::invalid_operation(
                "database opened read-only; update transactions are not allowed",
            ));
        }

        let guard = self.write_lock.lock();
        let committed = self.committed.read().clone();
        let working = Snapshot::clone(&committed.snapshot);

        Ok(WriteTransaction::new(
            self,
            self.allocate_txid(),
            committed.seq,
            working,
            guard,
        ))
    }

    /// Makes a write transaction's changes durable and visible.
    ///
    /// Called by [`WriteTransaction::commit`] with the writer lock held.
    pub(crate) fn commit_write(
        &self,
        txid: TransactionId,
        working: Snapshot,
        ops: Vec<WalRecord>,
    ) -> CoreResult<SequenceNumber> {
        let current = self.committed_seq();
        if ops.is_empty() {
            debug!(%txid, "commit with no changes");
            return Ok(current);
        }

        let sequence = current.next();
        let op_count = ops.len();
        let mut run = Vec::with_capacity(op_count + 2);
        run.push(WalRecord::Begin { txid });
        run.extend(ops);
        run.push(WalRecord::Commit { txid, sequence });

        let offset = self.wal.append_run(&run)?;

        *self.committed.write() = Committed {
            seq: sequence,
            snapshot: Arc::new(working),
        };
        debug!(%txid, %sequence, ops = op_count, offset, "transaction committed");
        Ok(sequence)
    }

    /// Returns the current committed sequence number.
    #[must_use]
    pub fn committed_seq(&self) -> SequenceNumber {
        self.committed.read().seq
    }

    /// Returns the number of buckets in the committed state.
    #[must_use]
    pub fn bucket_count(&self) -> usize {
        self.committed.read().snapshot.bucket_count()
    }

    /// Returns the log this manager writes to.
    pub(crate) fn wal(&self) -> &WalManager {
        &self.wal
    }
}

impl std::fmt::Debug for TransactionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionManager")
            .field("committed_seq", &self.committed_seq())
            .field("read_only", &self.read_only)
            .finish_non_exhaustive()
    }
}
