//! Bucket-level commands.

use crate::error::CliResult;
use bucketdb_core::{ReadTransaction, WriteTransaction};
use std::io::Write;

/// Prints every bucket name, one per line, in ascending byte order.
pub fn list<W: Write>(tx: &ReadTransaction, out: &mut W) -> CliResult<()> {
    for name in tx.bucket_names() {
        out.write_all(name)?;
        out.write_all(b"\n")?;
    }
    Ok(())
}

/// Creates a bucket; an existing bucket is left as it is.
pub fn create(tx: &mut WriteTransaction<'_>, name: &[u8]) -> CliResult<()> {
    tx.create_bucket_if_not_exists(name)?;
    Ok(())
}

/// Deletes a bucket and all of its entries.
pub fn delete(tx: &mut WriteTransaction<'_>, name: &[u8]) -> CliResult<()> {
    tx.delete_bucket(name)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CliError;
    use bucketdb_core::{CoreError, Database};

    fn listing(db: &Database) -> Vec<u8> {
        let mut out = Vec::new();
        db.view(|tx| list(tx, &mut out)).unwrap();
        out
    }

    #[test]
    fn lists_buckets_in_byte_order() {
        let db = Database::open_in_memory().unwrap();
        for name in [&b"zebra"[..], b"apple", b"Mango", b"\xffraw"] {
            db.update(|tx| create(tx, name)).unwrap();
        }
        assert_eq!(listing(&db), b"Mango\napple\nzebra\n\xffraw\n".to_vec());
    }

    #[test]
    fn empty_database_lists_nothing() {
        let db = Database::open_in_memory().unwrap();
        assert!(listing(&db).is_empty());
    }

    #[test]
    fn create_is_idempotent() {
        let db = Database::open_in_memory().unwrap();
        db.update(|tx| {
            create(tx, b"users")?;
            tx.bucket_mut(b"users")
                .ok_or_else(|| CoreError::bucket_not_found(b"users"))?
                .put(b"alice", b"30")?;
            Ok::<_, CliError>(())
        })
        .unwrap();
        let seq = db.committed_seq();

        db.update(|tx| create(tx, b"users")).unwrap();
        assert_eq!(db.committed_seq(), seq);
        let value = db
            .view(|tx| {
                Ok::<_, CoreError>(
                    tx.bucket(b"users")
                        .and_then(|b| b.get(b"alice"))
                        .map(<[u8]>::to_vec),
                )
            })
            .unwrap();
        assert_eq!(value, Some(b"30".to_vec()));
    }

    #[test]
    fn delete_missing_bucket_is_not_found() {
        let db = Database::open_in_memory().unwrap();
        let err = db.update(|tx| delete(tx, b"ghosts")).unwrap_err();
        assert!(matches!(err, CliError::NotFound(_)));
        assert_eq!(err.to_string(), "bucket ghosts not found");
    }

    #[test]
    fn empty_bucket_name_is_rejected() {
        let db = Database::open_in_memory().unwrap();
        let err = db.update(|tx| create(tx, b"")).unwrap_err();
        assert!(matches!(err, CliError::Store(CoreError::BucketNameRequired)));
    }
}
