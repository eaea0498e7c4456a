//! Transaction log: the on-disk format of a bucketdb file.
//!
//! The database file is nothing but a sequence of framed records. A write
//! transaction that changed something is appended as one contiguous run
//! `Begin, op*, Commit` and made durable before its changes are published.
//!
//! ## Record Format
//!
//! ```text
//! | magic "BKTW" (4) | version (2) | type (1) | length (4) | payload (N) | crc32 (4) |
//! ```
//!
//! ## Recovery Policy
//!
//! Tolerated (treated as clean end of log):
//!
//! - truncated header or payload at the tail, left by a crash mid-append
//!
//! Fatal (the database refuses to open):
//!
//! - CRC mismatch, bad magic, unknown record type, newer format version,
//!   malformed payload
//!
//! Only transactions whose `Commit` record made it to the file are replayed.

mod iterator;
mod record;
mod writer;

pub use iterator::WalRecordIterator;
pub use record::WalRecord;
pub use writer::WalManager;

/// Header size: magic (4) + version (2) + type (1) + length (4).
pub(crate) const HEADER_SIZE: usize = 11;

/// Trailing CRC size.
pub(crate) const CRC_SIZE: usize = 4;
