//! File-based storage backend for persistent storage.

use crate::backend::StorageBackend;
use crate::error::{StorageError, StorageResult};
use fs2::FileExt;
use parking_lot::RwLock;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Permission bits for a newly created database file (owner read/write).
pub const DEFAULT_FILE_MODE: u32 = 0o600;

/// How to open a [`FileBackend`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileOptions {
    /// Create the file if it does not exist. Ignored for read-only opens.
    pub create: bool,
    /// Open without write access; `append` and `truncate` fail.
    pub read_only: bool,
    /// Unix permission bits applied when the file is created.
    pub mode: u32,
}

impl Default for FileOptions {
    fn default() -> Self {
        Self {
            create: true,
            read_only: false,
            mode: DEFAULT_FILE_MODE,
        }
    }
}

/// A file-based storage backend.
///
/// Holds the only handle bucketdb uses for a database file. Advisory locks
/// taken through [`FileBackend::try_lock_exclusive`] or
/// [`FileBackend::try_lock_shared`] live as long as the backend and are
/// released when it is dropped.
///
/// # Durability
///
/// - `flush()` calls `File::flush()` to push data to the OS
/// - `sync()` calls `File::sync_all()` to ensure data is on disk
///
/// # Example
///
/// ```no_run
/// use bucketdb_storage::{FileBackend, StorageBackend};
/// use std::path::Path;
///
/// let mut backend = FileBackend::open(Path::new("data.db")).unwrap();
/// backend.try_lock_exclusive().unwrap();
/// backend.append(b"persistent data").unwrap();
/// backend.sync().unwrap();
/// ```
#[derive(Debug)]
pub struct FileBackend {
    path: PathBuf,
    file: RwLock<File>,
    size: RwLock<u64>,
    read_only: bool,
}

impl FileBackend {
    /// Opens or creates a read-write file backend at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or created.
    pub fn open(path: &Path) -> StorageResult<Self> {
        Self::open_with_options(path, FileOptions::default())
    }

    /// Opens a file backend with explicit options.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened, or does not exist and
    /// `create` is false.
    pub fn open_with_options(path: &Path, options: FileOptions) -> StorageResult<Self> {
        let mut open = OpenOptions::new();
        open.read(true);
        if !options.read_only {
            open.write(true).create(options.create).truncate(false);
        }
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            open.mode(options.mode);
        }

        let file = open.open(path)?;
        let size = file.metadata()?.len();

        Ok(Self {
            path: path.to_path_buf(),
            file: RwLock::new(file),
            size: RwLock::new(size),
            read_only: options.read_only,
        })
    }

    /// Takes a non-blocking exclusive lock on the file.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Locked`] if another handle holds any lock on
    /// the file.
    pub fn try_lock_exclusive(&self) -> StorageResult<()> {
        let result = FileExt::try_lock_exclusive(&*self.file.read());
        result.map_err(|e| self.lock_error(e))
    }

    /// Takes a non-blocking shared lock on the file.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Locked`] if another handle holds an
    /// exclusive lock on the file.
    pub fn try_lock_shared(&self) -> StorageResult<()> {
        let result = FileExt::try_lock_shared(&*self.file.read());
        result.map_err(|e| self.lock_error(e))
    }

    /// Returns the path to the underlying file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns true if the backend was opened without write access.
    #[must_use]
    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    fn lock_error(&self, err: io::Error) -> StorageError {
        if err.kind() == fs2::lock_contended_error().kind() {
            StorageError::Locked {
                path: self.path.display().to_string(),
            }
        } else {
            StorageError::Io(err)
        }
    }
}

impl StorageBackend for FileBackend {
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
        let size = *self.size.read();
        let end = offset.saturating_add(len as u64);

        if offset > size || end > size {
            return Err(StorageError::ReadPastEnd { offset, len, size });
        }

        if len == 0 {
            return Ok(Vec::new());
        }

        let mut file = self.file.write();
        file.seek(SeekFrom::Start(offset))?;

        let mut buffer = vec![0u8; len];
        file.read_exact(&mut buffer)?;

        Ok(buffer)
    }

    fn append(&mut self, data: &[u8]) -> StorageResult<u64> {
        if self.read_only {
            return Err(StorageError::ReadOnly);
        }
        if data.is_empty() {
            return Ok(*self.size.read());
        }

        let mut file = self.file.write();
        let mut size = self.size.write();

        let offset = *size;
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(data)?;
        *size += data.len() as u64;

        Ok(offset)
    }

    fn flush(&mut self) -> StorageResult<()> {
        self.file.write().flush()?;
        Ok(())
    }

    fn size(&self) -> StorageResult<u64> {
        Ok(*self.size.read())
    }

    fn sync(&mut self) -> StorageResult<()> {
        if self.read_only {
            return Ok(());
        }
        self.file.write().sync_all()?;
        Ok(())
    }

    fn truncate(&mut self, new_size: u64) -> StorageResult<()> {
        if self.read_only {
            return Err(StorageError::ReadOnly);
        }

        let file = self.file.write();
        let mut size = self.size.write();

        if new_size > *size {
            return Err(StorageError::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "cannot truncate to size {} which is greater than current size {}",
                    new_size, *size
                ),
            )));
        }

        file.set_len(new_size)?;
        file.sync_all()?;
        *size = new_size;

        Ok(())
    }
}
