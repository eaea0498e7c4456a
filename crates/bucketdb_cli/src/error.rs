//! CLI error taxonomy.

use bucketdb_core::CoreError;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for CLI commands.
pub type CliResult<T> = Result<T, CliError>;

/// Errors a command invocation can end with.
#[derive(Debug, Error)]
pub enum CliError {
    /// Wrong arity, unknown command, or a help/version request.
    #[error("{0}")]
    Usage(#[from] clap::Error),

    /// The database file could not be opened.
    #[error("{}: {source}", path.display())]
    Open {
        /// Path given on the command line.
        path: PathBuf,
        /// Why opening failed.
        #[source]
        source: CoreError,
    },

    /// A bucket or key the command needs does not exist.
    #[error(transparent)]
    NotFound(CoreError),

    /// The store could not be opened, read, written or committed.
    #[error(transparent)]
    Store(CoreError),

    /// Writing command output failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        if err.is_not_found() {
            Self::NotFound(err)
        } else {
            Self::Store(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_core_errors() {
        let err = CliError::from(CoreError::bucket_not_found(b"ghosts"));
        assert!(matches!(err, CliError::NotFound(_)));
        assert_eq!(err.to_string(), "bucket ghosts not found");

        let err = CliError::from(CoreError::invalid_format("bad magic"));
        assert!(matches!(err, CliError::Store(_)));
    }

    #[test]
    fn open_errors_name_the_file() {
        let err = CliError::Open {
            path: PathBuf::from("/data/held.db"),
            source: CoreError::DatabaseLocked {
                path: "/data/held.db".into(),
            },
        };
        assert_eq!(
            err.to_string(),
            "/data/held.db: database locked: another process has the file open"
        );
    }
}
