//! # bucketdb core
//!
//! A small transactional key-value engine organised into named buckets.
//!
//! - A database is a single file holding an append-only transaction log
//! - Buckets hold entries ordered by key bytes; bucket names are ordered
//!   the same way
//! - Read transactions see an immutable snapshot; any number may run at once
//! - One write transaction at a time; its changes become visible atomically
//!   on commit, after the log append is durable
//!
//! ```rust
//! use bucketdb_core::{CoreError, Database};
//!
//! let db = Database::open_in_memory().unwrap();
//! db.update(|tx| {
//!     tx.create_bucket_if_not_exists(b"users")?;
//!     tx.bucket_mut(b"users").unwrap().put(b"alice", b"30")
//! })
//! .unwrap();
//!
//! let value = db
//!     .view(|tx| {
//!         let users = tx.bucket(b"users");
//!         Ok::<_, CoreError>(users.and_then(|b| b.get(b"alice")).map(<[u8]>::to_vec))
//!     })
//!     .unwrap();
//! assert_eq!(value.as_deref(), Some(&b"30"[..]));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod bucket;
mod config;
mod database;
mod error;
mod transaction;
mod types;
mod wal;

pub use bucket::{Bucket, BucketMut, Iter, MAX_KEY_SIZE, MAX_VALUE_SIZE};
pub use config::Config;
pub use database::Database;
pub use error::{CoreError, CoreResult};
pub use transaction::{ReadTransaction, TransactionState, WriteTransaction};
pub use types::{SequenceNumber, TransactionId};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
