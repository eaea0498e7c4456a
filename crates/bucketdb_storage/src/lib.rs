//! # bucketdb storage
//!
//! Byte-store backends for bucketdb.
//!
//! A backend is an **opaque, append-only byte store**. It knows nothing
//! about records, buckets or transactions; `bucketdb_core` owns the file
//! format. Backends only read, append, flush, sync and truncate.
//!
//! ## Available Backends
//!
//! - [`FileBackend`] - the database file, with owner-only permissions and
//!   an advisory lock
//! - [`InMemoryBackend`] - for tests and throwaway stores
//!
//! ## Example
//!
//! ```rust
//! use bucketdb_storage::{InMemoryBackend, StorageBackend};
//!
//! let mut backend = InMemoryBackend::new();
//! let offset = backend.append(b"hello world").unwrap();
//! assert_eq!(backend.read_at(offset, 5).unwrap(), b"hello");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;
mod memory;

pub use backend::StorageBackend;
pub use error::{StorageError, StorageResult};
pub use file::{FileBackend, FileOptions, DEFAULT_FILE_MODE};
pub use memory::InMemoryBackend;
