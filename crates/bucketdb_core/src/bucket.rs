//! Buckets and the committed state they live in.
//!
//! Committed state is a [`Snapshot`]: an ordered map from bucket name to
//! that bucket's ordered entries. Each bucket sits behind its own `Arc`, so
//! a write transaction copies only the buckets it modifies.

use crate::error::{CoreError, CoreResult};
use crate::types::TransactionId;
use crate::wal::WalRecord;
use std::collections::btree_map::{self, BTreeMap};
use std::sync::Arc;

/// Maximum key length in bytes.
pub const MAX_KEY_SIZE: usize = 32768;

/// Maximum value length in bytes.
pub const MAX_VALUE_SIZE: usize = (1 << 31) - 2;

pub(crate) type Entries = BTreeMap<Vec<u8>, Vec<u8>>;

/// All buckets as of one point in time.
#[derive(Debug, Clone, Default)]
pub(crate) struct Snapshot {
    buckets: BTreeMap<Vec<u8>, Arc<Entries>>,
}

impl Snapshot {
    pub(crate) fn bucket(&self, name: &[u8]) -> Option<Bucket<'_>> {
        self.buckets
            .get_key_value(name)
            .map(|(name, entries)| Bucket::new(name, entries))
    }

    pub(crate) fn bucket_names(&self) -> impl Iterator<Item = &[u8]> + '_ {
        self.buckets.keys().map(Vec::as_slice)
    }

    pub(crate) fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    pub(crate) fn contains_bucket(&self, name: &[u8]) -> bool {
        self.buckets.contains_key(name)
    }

    /// Returns true if the bucket was created.
    pub(crate) fn create_bucket(&mut self, name: &[u8]) -> bool {
        if self.buckets.contains_key(name) {
            return false;
        }
        self.buckets.insert(name.to_vec(), Arc::default());
        true
    }

    /// Returns true if the bucket existed.
    pub(crate) fn delete_bucket(&mut self, name: &[u8]) -> bool {
        self.buckets.remove(name).is_some()
    }

    pub(crate) fn entries_mut(&mut self, name: &[u8]) -> Option<&mut Entries> {
        self.buckets.get_mut(name).map(Arc::make_mut)
    }

    /// Replays one committed log record.
    ///
    /// Bucket creation and key deletion are idempotent; a write into a
    /// bucket the log never created is corruption.
    pub(crate) fn apply(&mut self, record: &WalRecord) -> CoreResult<()> {
        match record {
            WalRecord::CreateBucket { name, .. } => {
                self.create_bucket(name);
            }
            WalRecord::DeleteBucket { name, .. } => {
                self.delete_bucket(name);
            }
            WalRecord::Put {
                bucket, key, value, ..
            } => {
                self.replay_target(bucket)?
                    .insert(key.clone(), value.clone());
            }
            WalRecord::Delete { bucket, key, .. } => {
                self.replay_target(bucket)?.remove(key);
            }
            WalRecord::Begin { .. } | WalRecord::Commit { .. } => {}
        }
        Ok(())
    }

    fn replay_target(&mut self, bucket: &[u8]) -> CoreResult<&mut Entries> {
        self.entries_mut(bucket).ok_or_else(|| {
            CoreError::wal_corruption(format!(
                "write to unknown bucket {}",
                String::from_utf8_lossy(bucket)
            ))
        })
    }
}

/// Read access to one bucket inside a transaction.
#[derive(Debug, Clone, Copy)]
pub struct Bucket<'a> {
    name: &'a [u8],
    entries: &'a Entries,
}

impl<'a> Bucket<'a> {
    fn new(name: &'a [u8], entries: &'a Entries) -> Self {
        Self { name, entries }
    }

    /// Returns the bucket name.
    #[must_use]
    pub fn name(&self) -> &'a [u8] {
        self.name
    }

    /// Returns the value stored under `key`.
    #[must_use]
    pub fn get(&self, key: &[u8]) -> Option<&'a [u8]> {
        self.entries.get(key).map(Vec::as_slice)
    }

    /// Iterates entries in ascending key order.
    ///
    /// The iterator borrows the transaction's snapshot, so calling `iter`
    /// again restarts from the first key with the same contents.
    #[must_use]
    pub fn iter(&self) -> Iter<'a> {
        Iter {
            inner: self.entries.iter(),
        }
    }

    /// Iterates keys in ascending order.
    pub fn keys(&self) -> impl Iterator<Item = &'a [u8]> + 'a {
        self.entries.keys().map(Vec::as_slice)
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the bucket has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Calls `f` for every entry in ascending key order, stopping at the
    /// first error.
    pub fn for_each<F>(&self, mut f: F) -> CoreResult<()>
    where
        F: FnMut(&[u8], &[u8]) -> CoreResult<()>,
    {
        self.iter().try_for_each(|(k, v)| f(k, v))
    }
}

impl<'a> IntoIterator for Bucket<'a> {
    type Item = (&'a [u8], &'a [u8]);
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over a bucket's entries in ascending key order.
#[derive(Debug, Clone)]
pub struct Iter<'a> {
    inner: btree_map::Iter<'a, Vec<u8>, Vec<u8>>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = (&'a [u8], &'a [u8]);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(k, v)| (k.as_slice(), v.as_slice()))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

/// Write access to one bucket inside a write transaction.
///
/// Every change is applied to the transaction's private copy and recorded
/// for the log; nothing is visible outside the transaction until commit.
#[derive(Debug)]
pub struct BucketMut<'a> {
    txid: TransactionId,
    name: &'a [u8],
    entries: &'a mut Entries,
    ops: &'a mut Vec<WalRecord>,
}

impl<'a> BucketMut<'a> {
    pub(crate) fn new(
        txid: TransactionId,
        name: &'a [u8],
        entries: &'a mut Entries,
        ops: &'a mut Vec<WalRecord>,
    ) -> Self {
        Self {
            txid,
            name,
            entries,
            ops,
        }
    }

    /// Returns the bucket name.
    #[must_use]
    pub fn name(&self) -> &[u8] {
        self.name
    }

    /// Sets `key` to `value`, overwriting any previous value.
    ///
    /// # Errors
    ///
    /// Fails if the key is empty or too large, or the value is too large.
    pub fn put(&mut self, key: &[u8], value: &[u8]) -> CoreResult<()> {
        validate_key(key)?;
        if value.len() > MAX_VALUE_SIZE {
            return Err(CoreError::ValueTooLarge {
                size: value.len(),
                max: MAX_VALUE_SIZE,
            });
        }

        self.ops.push(WalRecord::Put {
            txid: self.txid,
            bucket: self.name.to_vec(),
            key: key.to_vec(),
            value: value.to_vec(),
        });
        self.entries.insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    /// Removes `key`. Removing an absent key succeeds and changes nothing.
    ///
    /// # Errors
    ///
    /// Fails if the key is empty or too large.
    pub fn delete(&mut self, key: &[u8]) -> CoreResult<()> {
        validate_key(key)?;
        if self.entries.remove(key).is_some() {
            self.ops.push(WalRecord::Delete {
                txid: self.txid,
                bucket: self.name.to_vec(),
                key: key.to_vec(),
            });
        }
        Ok(())
    }

    /// Returns the value stored under `key`, including uncommitted writes.
    #[must_use]
    pub fn get(&self, key: &[u8]) -> Option<&[u8]> {
        self.entries.get(key).map(Vec::as_slice)
    }

    /// Read-only view of the bucket as the transaction currently sees it.
    #[must_use]
    pub fn as_bucket(&self) -> Bucket<'_> {
        Bucket::new(self.name, self.entries)
    }
}

pub(crate) fn validate_bucket_name(name: &[u8]) -> CoreResult<()> {
    if name.is_empty() {
        return Err(CoreError::BucketNameRequired);
    }
    if name.len() > MAX_KEY_SIZE {
        return Err(CoreError::KeyTooLarge {
            size: name.len(),
            max: MAX_KEY_SIZE,
        });
    }
    Ok(())
}

fn validate_key(key: &[u8]) -> CoreResult<()> {
    if key.is_empty() {
        return Err(CoreError::KeyRequired);
    }
    if key.len() > MAX_KEY_SIZE {
        return Err(CoreError::KeyTooLarge {
            size: key.len(),
            max: MAX_KEY_SIZE,
        });
    }
    Ok(())
}
