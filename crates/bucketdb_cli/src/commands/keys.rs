//! Key-level commands.
//!
//! Every command resolves its bucket first and fails with a not-found
//! error instead of acting on an empty result.

use crate::error::CliResult;
use bucketdb_core::{Bucket, BucketMut, CoreError, ReadTransaction, WriteTransaction};
use std::io::Write;

fn bucket<'a>(tx: &'a ReadTransaction, name: &[u8]) -> CliResult<Bucket<'a>> {
    Ok(tx
        .bucket(name)
        .ok_or_else(|| CoreError::bucket_not_found(name))?)
}

fn bucket_mut<'a>(tx: &'a mut WriteTransaction<'_>, name: &'a [u8]) -> CliResult<BucketMut<'a>> {
    Ok(tx
        .bucket_mut(name)
        .ok_or_else(|| CoreError::bucket_not_found(name))?)
}

/// Prints every key in the bucket, one per line.
pub fn list<W: Write>(tx: &ReadTransaction, name: &[u8], out: &mut W) -> CliResult<()> {
    for key in bucket(tx, name)?.keys() {
        out.write_all(key)?;
        out.write_all(b"\n")?;
    }
    Ok(())
}

/// Prints `Key: <k>, Value: <v>` for every entry in the bucket.
pub fn read_all<W: Write>(tx: &ReadTransaction, name: &[u8], out: &mut W) -> CliResult<()> {
    for (key, value) in bucket(tx, name)? {
        out.write_all(b"Key: ")?;
        out.write_all(key)?;
        out.write_all(b", Value: ")?;
        out.write_all(value)?;
        out.write_all(b"\n")?;
    }
    Ok(())
}

/// Prints `Value: <v>` for one key.
pub fn read<W: Write>(tx: &ReadTransaction, name: &[u8], key: &[u8], out: &mut W) -> CliResult<()> {
    let value = bucket(tx, name)?
        .get(key)
        .ok_or_else(|| CoreError::key_not_found(name, key))?;
    out.write_all(b"Value: ")?;
    out.write_all(value)?;
    out.write_all(b"\n")?;
    Ok(())
}

/// Sets `key` to `value`. The bucket must already exist.
pub fn insert(
    tx: &mut WriteTransaction<'_>,
    name: &[u8],
    key: &[u8],
    value: &[u8],
) -> CliResult<()> {
    bucket_mut(tx, name)?.put(key, value)?;
    Ok(())
}

/// Removes `key` if present.
pub fn delete(tx: &mut WriteTransaction<'_>, name: &[u8], key: &[u8]) -> CliResult<()> {
    bucket_mut(tx, name)?.delete(key)?;
    Ok(())
}
