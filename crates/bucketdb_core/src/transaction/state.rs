//! Read and write transaction handles.

use crate::bucket::{validate_bucket_name, Bucket, BucketMut, Snapshot};
use crate::error::{CoreError, CoreResult};
use crate::transaction::TransactionManager;
use crate::types::{SequenceNumber, TransactionId};
use crate::wal::WalRecord;
use parking_lot::MutexGuard;
use std::sync::Arc;
use tracing::debug;

/// State of a write transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    /// Transaction is active and can perform operations.
    Active,
    /// Transaction has been committed.
    Committed,
    /// Transaction has been rolled back.
    Aborted,
}

/// A read-only (View) transaction.
///
/// Holds the snapshot that was committed when it began. Commits that happen
/// while it is open are never visible through it.
#[derive(Debug)]
pub struct ReadTransaction {
    id: TransactionId,
    snapshot_seq: SequenceNumber,
    snapshot: Arc<Snapshot>,
}

impl ReadTransaction {
    pub(crate) fn new(
        id: TransactionId,
        snapshot_seq: SequenceNumber,
        snapshot: Arc<Snapshot>,
    ) -> Self {
        Self {
            id,
            snapshot_seq,
            snapshot,
        }
    }

    /// Returns the transaction ID.
    #[must_use]
    pub fn id(&self) -> TransactionId {
        self.id
    }

    /// Returns the sequence of the last commit this transaction can see.
    #[must_use]
    pub fn snapshot_seq(&self) -> SequenceNumber {
        self.snapshot_seq
    }

    /// Looks up a bucket by name.
    #[must_use]
    pub fn bucket(&self, name: &[u8]) -> Option<Bucket<'_>> {
        self.snapshot.bucket(name)
    }

    /// Iterates bucket names in ascending byte order.
    pub fn bucket_names(&self) -> impl Iterator<Item = &[u8]> + '_ {
        self.snapshot.bucket_names()
    }

    /// Calls `f` with every bucket name in ascending order, stopping at the
    /// first error.
    pub fn for_each_bucket<F>(&self, f: F) -> CoreResult<()>
    where
        F: FnMut(&[u8]) -> CoreResult<()>,
    {
        self.bucket_names().try_for_each(f)
    }
}

/// A read-write (Update) transaction.
///
/// Holds the database's single writer lock until it is committed, rolled
/// back or dropped. Changes go to a private copy of the committed state;
/// dropping the transaction without committing discards them.
pub struct WriteTransaction<'db> {
    manager: &'db TransactionManager,
    id: TransactionId,
    snapshot_seq: SequenceNumber,
    working: Snapshot,
    ops: Vec<WalRecord>,
    state: TransactionState,
    _guard: MutexGuard<'db, ()>,
}

impl<'db> WriteTransaction<'db> {
    pub(crate) fn new(
        manager: &'db TransactionManager,
        id: TransactionId,
        snapshot_seq: SequenceNumber,
        working: Snapshot,
        guard: MutexGuard<'db, ()>,
    ) -> Self {
        Self {
            manager,
            id,
            snapshot_seq,
            working,
            ops: Vec::new(),
            state: TransactionState::Active,
            _guard: guard,
        }
    }

    /// Returns the transaction ID.
    #[must_use]
    pub fn id(&self) -> TransactionId {
        self.id
    }

    /// Returns the sequence of the commit this transaction started from.
    #[must_use]
    pub fn snapshot_seq(&self) -> SequenceNumber {
        self.snapshot_seq
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> TransactionState {
        self.state
    }

    /// Number of log records the commit would write, excluding framing.
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.ops.len()
    }

    /// Looks up a bucket by name, including changes made in this
    /// transaction.
    #[must_use]
    pub fn bucket(&self, name: &[u8]) -> Option<Bucket<'_>> {
        self.working.bucket(name)
    }

    /// Iterates bucket names in ascending byte order.
    pub fn bucket_names(&self) -> impl Iterator<Item = &[u8]> + '_ {
        self.working.bucket_names()
    }

    /// Calls `f` with every bucket name in ascending order.
    pub fn for_each_bucket<F>(&self, f: F) -> CoreResult<()>
    where
        F: FnMut(&[u8]) -> CoreResult<()>,
    {
        self.bucket_names().try_for_each(f)
    }

    /// Looks up a bucket for writing.
    pub fn bucket_mut<'a>(&'a mut self, name: &'a [u8]) -> Option<BucketMut<'a>> {
        let entries = self.working.entries_mut(name)?;
        Some(BucketMut::new(self.id, name, entries, &mut self.ops))
    }

    /// Creates a new bucket.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::BucketExists`] if it already exists, or a
    /// validation error for an empty or oversized name.
    pub fn create_bucket<'a>(&'a mut self, name: &'a [u8]) -> CoreResult<BucketMut<'a>> {
        validate_bucket_name(name)?;
        if self.working.contains_bucket(name) {
            return Err(CoreError::bucket_exists(name));
        }
        self.create_bucket_if_not_exists(name)
    }

    /// Creates a bucket if it doesn't already exist and returns it.
    ///
    /// An existing bucket is returned untouched, entries included.
    ///
    /// # Errors
    ///
    /// Returns a validation error for an empty or oversized name.
    pub fn create_bucket_if_not_exists<'a>(
        &'a mut self,
        name: &'a [u8],
    ) -> CoreResult<BucketMut<'a>> {
        validate_bucket_name(name)?;
        if self.working.create_bucket(name) {
            self.ops.push(WalRecord::CreateBucket {
                txid: self.id,
                name: name.to_vec(),
            });
        }
        let entries = self
            .working
            .entries_mut(name)
            .ok_or_else(|| CoreError::bucket_not_found(name))?;
        Ok(BucketMut::new(self.id, name, entries, &mut self.ops))
    }

    /// Deletes a bucket and all of its entries.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::BucketNotFound`] if the bucket does not exist.
    pub fn delete_bucket(&mut self, name: &[u8]) -> CoreResult<()> {
        if !self.working.delete_bucket(name) {
            return Err(CoreError::bucket_not_found(name));
        }
        self.ops.push(WalRecord::DeleteBucket {
            txid: self.id,
            name: name.to_vec(),
        });
        Ok(())
    }

    /// Commits the transaction.
    ///
    /// After this returns `Ok`, the changes are durable and visible to
    /// every transaction that begins afterwards. On error nothing is
    /// published. Returns the sequence the database is now at.
    ///
    /// # Errors
    ///
    /// Returns an error if the log append or flush fails.
    pub fn commit(mut self) -> CoreResult<SequenceNumber> {
        let working = std::mem::take(&mut self.working);
        let ops = std::mem::take(&mut self.ops);
        let result = self.manager.commit_write(self.id, working, ops);
        self.state = if result.is_ok() {
            TransactionState::Committed
        } else {
            TransactionState::Aborted
        };
        result
    }

    /// Rolls the transaction back, discarding all of its changes.
    pub fn rollback(mut self) {
        self.abort();
    }

    fn abort(&mut self) {
        if self.state == TransactionState::Active {
            debug!(txid = %self.id, discarded = self.ops.len(), "transaction rolled back");
            self.state = TransactionState::Aborted;
        }
    }
}

impl Drop for WriteTransaction<'_> {
    fn drop(&mut self) {
        self.abort();
    }
}

impl std::fmt::Debug for WriteTransaction<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WriteTransaction")
            .field("id", &self.id)
            .field("snapshot_seq", &self.snapshot_seq)
            .field("state", &self.state)
            .field("write_count", &self.ops.len())
            .finish_non_exhaustive()
    }
}
