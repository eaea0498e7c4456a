//! Error types for bucketdb core.

use bucketdb_storage::StorageError;
use std::io;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in bucketdb core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Storage backend error.
    #[error("storage error: {0}")]
    Storage(StorageError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The transaction log is corrupted or invalid.
    #[error("log corruption: {message}")]
    WalCorruption {
        /// Description of the corruption.
        message: String,
    },

    /// Checksum mismatch detected.
    #[error("checksum mismatch: expected {expected:08x}, got {actual:08x}")]
    ChecksumMismatch {
        /// Checksum stored in the record.
        expected: u32,
        /// Checksum computed over the record.
        actual: u32,
    },

    /// Bucket does not exist.
    #[error("bucket {name} not found")]
    BucketNotFound {
        /// Name of the bucket.
        name: String,
    },

    /// Key does not exist in the bucket.
    #[error("key {key} not found in bucket {bucket}")]
    KeyNotFound {
        /// Name of the bucket searched.
        bucket: String,
        /// The missing key.
        key: String,
    },

    /// Bucket already exists.
    #[error("bucket {name} already exists")]
    BucketExists {
        /// Name of the bucket.
        name: String,
    },

    /// An empty bucket name was supplied.
    #[error("bucket name required")]
    BucketNameRequired,

    /// An empty key was supplied.
    #[error("key required")]
    KeyRequired,

    /// Key exceeds the maximum key size.
    #[error("key too large: {size} bytes exceeds maximum of {max} bytes")]
    KeyTooLarge {
        /// Size of the rejected key.
        size: usize,
        /// Maximum allowed size.
        max: usize,
    },

    /// Value exceeds the maximum value size.
    #[error("value too large: {size} bytes exceeds maximum of {max} bytes")]
    ValueTooLarge {
        /// Size of the rejected value.
        size: usize,
        /// Maximum allowed size.
        max: usize,
    },

    /// Database file is locked by another process.
    #[error("database locked: another process has the file open")]
    DatabaseLocked {
        /// Path of the locked file.
        path: String,
    },

    /// Invalid database format.
    #[error("invalid database format: {message}")]
    InvalidFormat {
        /// Description of the format issue.
        message: String,
    },

    /// Operation not permitted in current state.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Description of why operation is invalid.
        message: String,
    },

    /// Database is closed.
    #[error("database is closed")]
    DatabaseClosed,
}

impl CoreError {
    /// Creates a log corruption error.
    pub fn wal_corruption(message: impl Into<String>) -> Self {
        Self::WalCorruption {
            message: message.into(),
        }
    }

    /// Creates an invalid format error.
    pub fn invalid_format(message: impl Into<String>) -> Self {
        Self::InvalidFormat {
            message: message.into(),
        }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }

    /// Creates a bucket-not-found error for a raw bucket name.
    pub fn bucket_not_found(name: &[u8]) -> Self {
        Self::BucketNotFound {
            name: String::from_utf8_lossy(name).into_owned(),
        }
    }

    /// Creates a key-not-found error for a raw bucket name and key.
    pub fn key_not_found(bucket: &[u8], key: &[u8]) -> Self {
        Self::KeyNotFound {
            bucket: String::from_utf8_lossy(bucket).into_owned(),
            key: String::from_utf8_lossy(key).into_owned(),
        }
    }

    /// Creates a bucket-exists error for a raw bucket name.
    pub fn bucket_exists(name: &[u8]) -> Self {
        Self::BucketExists {
            name: String::from_utf8_lossy(name).into_owned(),
        }
    }

    /// Returns true for a missing bucket or key.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::BucketNotFound { .. } | Self::KeyNotFound { .. })
    }
}

impl From<StorageError> for CoreError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Locked { path } => Self::DatabaseLocked { path },
            StorageError::Io(e) => Self::Io(e),
            other => Self::Storage(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_messages_name_bucket_and_key() {
        let err = CoreError::bucket_not_found(b"users");
        assert_eq!(err.to_string(), "bucket users not found");
        assert!(err.is_not_found());

        let err = CoreError::key_not_found(b"users", b"alice");
        assert_eq!(err.to_string(), "key alice not found in bucket users");
        assert!(err.is_not_found());
    }

    #[test]
    fn non_utf8_names_render_lossily() {
        let err = CoreError::bucket_not_found(&[b'a', 0xFF]);
        assert_eq!(err.to_string(), "bucket a\u{FFFD} not found");
    }

    #[test]
    fn storage_lock_maps_to_database_locked() {
        let err: CoreError = StorageError::Locked {
            path: "x.db".into(),
        }
        .into();
        assert!(matches!(err, CoreError::DatabaseLocked { ref path } if path == "x.db"));
        assert!(!err.is_not_found());
    }
}
