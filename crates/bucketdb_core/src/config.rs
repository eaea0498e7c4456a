//! Database configuration.

use bucketdb_storage::{FileOptions, DEFAULT_FILE_MODE};

/// Configuration for opening a database.
#[derive(Debug, Clone)]
pub struct Config {
    /// Whether to create the database file if it doesn't exist.
    pub create_if_missing: bool,

    /// Open for reading only. Takes a shared lock and rejects update
    /// transactions.
    pub read_only: bool,

    /// Whether to fsync the file on every commit (safer but slower).
    pub sync_on_commit: bool,

    /// Unix permission bits for a newly created database file.
    pub file_mode: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            create_if_missing: true,
            read_only: false,
            sync_on_commit: true,
            file_mode: DEFAULT_FILE_MODE,
        }
    }
}

impl Config {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether to create the database file if missing.
    #[must_use]
    pub const fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    /// Sets read-only mode.
    #[must_use]
    pub const fn read_only(mut self, value: bool) -> Self {
        self.read_only = value;
        self
    }

    /// Sets whether to sync the file on every commit.
    #[must_use]
    pub const fn sync_on_commit(mut self, value: bool) -> Self {
        self.sync_on_commit = value;
        self
    }

    /// Sets the permission bits used when the file is created.
    #[must_use]
    pub const fn file_mode(mut self, mode: u32) -> Self {
        self.file_mode = mode;
        self
    }

    pub(crate) fn file_options(&self) -> FileOptions {
        FileOptions {
            create: self.create_if_missing && !self.read_only,
            read_only: self.read_only,
            mode: self.file_mode,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert!(config.create_if_missing);
        assert!(!config.read_only);
        assert!(config.sync_on_commit);
        assert_eq!(config.file_mode, 0o600);
    }

    #[test]
    fn builder_pattern() {
        let config = Config::new()
            .create_if_missing(false)
            .sync_on_commit(false)
            .file_mode(0o640);

        assert!(!config.create_if_missing);
        assert!(!config.sync_on_commit);
        assert_eq!(config.file_mode, 0o640);
    }

    #[test]
    fn read_only_never_creates() {
        let options = Config::new().read_only(true).file_options();
        assert!(options.read_only);
        assert!(!options.create);
    }
}
