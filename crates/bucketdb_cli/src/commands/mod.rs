//! Command definitions and dispatch.
//!
//! Every command opens the database once, runs inside exactly one
//! transaction, and closes the database before returning.

pub mod buckets;
pub mod keys;

use crate::error::{CliError, CliResult};
use bucketdb_core::Database;
use clap::Subcommand;
use std::ffi::{OsStr, OsString};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Command summary printed on any usage error.
pub const USAGE: &str = "\
Usage:
  listbuckets <db file>                       - List all buckets
  createbucket <db file> <bucket name>        - Create a new bucket
  deletebucket <db file> <bucket name>        - Delete a bucket
  listkeys <db file> <bucket name>            - List all keys in a bucket
  readall <db file> <bucket name>             - Read all keys and values in a bucket
  readkey <db file> <bucket name> <key>       - Read a value for a specific key in a bucket
  insert <db file> <bucket name> <key> <value> - Insert a key-value pair into a bucket
  delete <db file> <bucket name> <key>        - Delete a key from a bucket
";

/// Transaction mode a command runs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxMode {
    /// Read-only transaction.
    View,
    /// Read-write transaction.
    Update,
}

/// The eight store operations.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// List all buckets
    #[command(name = "listbuckets")]
    #[command(disable_help_flag = true)]
    ListBuckets {
        /// Path to the database file
        #[arg(value_name = "DB_FILE")]
        db: PathBuf,
    },

    /// Create a new bucket
    #[command(name = "createbucket")]
    #[command(disable_help_flag = true)]
    CreateBucket {
        /// Path to the database file
        #[arg(value_name = "DB_FILE")]
        db: PathBuf,
        /// Bucket name
        #[arg(allow_hyphen_values = true)]
        bucket: OsString,
    },

    /// Delete a bucket
    #[command(name = "deletebucket")]
    #[command(disable_help_flag = true)]
    DeleteBucket {
        /// Path to the database file
        #[arg(value_name = "DB_FILE")]
        db: PathBuf,
        /// Bucket name
        #[arg(allow_hyphen_values = true)]
        bucket: OsString,
    },

    /// List all keys in a bucket
    #[command(name = "listkeys")]
    #[command(disable_help_flag = true)]
    ListKeys {
        /// Path to the database file
        #[arg(value_name = "DB_FILE")]
        db: PathBuf,
        /// Bucket name
        #[arg(allow_hyphen_values = true)]
        bucket: OsString,
    },

    /// Read all keys and values in a bucket
    #[command(name = "readall")]
    #[command(disable_help_flag = true)]
    ReadAll {
        /// Path to the database file
        #[arg(value_name = "DB_FILE")]
        db: PathBuf,
        /// Bucket name
        #[arg(allow_hyphen_values = true)]
        bucket: OsString,
    },

    /// Read a value for a specific key in a bucket
    #[command(name = "readkey")]
    #[command(disable_help_flag = true)]
    ReadKey {
        /// Path to the database file
        #[arg(value_name = "DB_FILE")]
        db: PathBuf,
        /// Bucket name
        #[arg(allow_hyphen_values = true)]
        bucket: OsString,
        /// Key to read
        #[arg(allow_hyphen_values = true)]
        key: OsString,
    },

    /// Insert a key-value pair into a bucket
    #[command(name = "insert")]
    #[command(disable_help_flag = true)]
    Insert {
        /// Path to the database file
        #[arg(value_name = "DB_FILE")]
        db: PathBuf,
        /// Bucket name
        #[arg(allow_hyphen_values = true)]
        bucket: OsString,
        /// Key to write
        #[arg(allow_hyphen_values = true)]
        key: OsString,
        /// Value to store
        #[arg(allow_hyphen_values = true)]
        value: OsString,
    },

    /// Delete a key from a bucket
    #[command(name = "delete")]
    #[command(disable_help_flag = true)]
    Delete {
        /// Path to the database file
        #[arg(value_name = "DB_FILE")]
        db: PathBuf,
        /// Bucket name
        #[arg(allow_hyphen_values = true)]
        bucket: OsString,
        /// Key to delete
        #[arg(allow_hyphen_values = true)]
        key: OsString,
    },
}

impl Command {
    /// Returns the transaction mode this command needs.
    #[must_use]
    pub fn mode(&self) -> TxMode {
        match self {
            Self::ListBuckets { .. }
            | Self::ListKeys { .. }
            | Self::ReadAll { .. }
            | Self::ReadKey { .. } => TxMode::View,
            Self::CreateBucket { .. }
            | Self::DeleteBucket { .. }
            | Self::Insert { .. }
            | Self::Delete { .. } => TxMode::Update,
        }
    }

    /// Returns the database file the command operates on.
    #[must_use]
    pub fn db_path(&self) -> &Path {
        match self {
            Self::ListBuckets { db }
            | Self::CreateBucket { db, .. }
            | Self::DeleteBucket { db, .. }
            | Self::ListKeys { db, .. }
            | Self::ReadAll { db, .. }
            | Self::ReadKey { db, .. }
            | Self::Insert { db, .. }
            | Self::Delete { db, .. } => db,
        }
    }

    /// Runs the command against an open database.
    pub fn execute<W: Write>(&self, db: &Database, out: &mut W) -> CliResult<()> {
        match self {
            Self::ListBuckets { .. } => db.view(|tx| buckets::list(tx, out)),
            Self::CreateBucket { bucket, .. } => {
                db.update(|tx| buckets::create(tx, bytes(bucket)))
            }
            Self::DeleteBucket { bucket, .. } => {
                db.update(|tx| buckets::delete(tx, bytes(bucket)))
            }
            Self::ListKeys { bucket, .. } => db.view(|tx| keys::list(tx, bytes(bucket), out)),
            Self::ReadAll { bucket, .. } => db.view(|tx| keys::read_all(tx, bytes(bucket), out)),
            Self::ReadKey { bucket, key, .. } => {
                db.view(|tx| keys::read(tx, bytes(bucket), bytes(key), out))
            }
            Self::Insert {
                bucket, key, value, ..
            } => db.update(|tx| keys::insert(tx, bytes(bucket), bytes(key), bytes(value))),
            Self::Delete { bucket, key, .. } => {
                db.update(|tx| keys::delete(tx, bytes(bucket), bytes(key)))
            }
        }
    }
}

/// Opens the database, runs `command` and closes the database again.
///
/// The database is closed on every path; an error from the command takes
/// precedence over an error from closing.
pub fn dispatch<W: Write>(command: &Command, out: &mut W) -> CliResult<()> {
    let path = command.db_path();
    let db = Database::open(path).map_err(|source| CliError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(path = %path.display(), mode = ?command.mode(), "running command");

    let result = command
        .execute(&db, out)
        .and_then(|()| out.flush().map_err(CliError::from));
    let closed = db.close();
    result?;
    closed?;
    Ok(())
}

/// Raw bytes of a command-line argument.
fn bytes(arg: &OsStr) -> &[u8] {
    arg.as_encoded_bytes()
}
