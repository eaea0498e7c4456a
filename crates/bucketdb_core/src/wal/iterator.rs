//! Streaming log record iterator.

use crate::error::{CoreError, CoreResult};
use crate::wal::record::{compute_crc32, WalRecord, WalRecordType, WAL_MAGIC, WAL_VERSION};
use crate::wal::{CRC_SIZE, HEADER_SIZE};
use bucketdb_storage::StorageBackend;
use parking_lot::MutexGuard;

/// Iterator over the records of a log, reading one record at a time.
///
/// Yields `(offset, record)` pairs. A truncated record at the tail ends the
/// iteration cleanly; corruption yields one error and then ends.
pub struct WalRecordIterator<'a> {
    backend: MutexGuard<'a, Box<dyn StorageBackend>>,
    total_size: u64,
    offset: u64,
    finished: bool,
}

impl<'a> WalRecordIterator<'a> {
    /// Creates an iterator starting at `start_offset`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend size cannot be determined.
    pub fn new(
        backend: MutexGuard<'a, Box<dyn StorageBackend>>,
        start_offset: u64,
    ) -> CoreResult<Self> {
        let total_size = backend.size()?;
        Ok(Self {
            backend,
            total_size,
            offset: start_offset,
            finished: false,
        })
    }

    /// Offset just past the last record returned.
    #[must_use]
    pub fn position(&self) -> u64 {
        self.offset
    }

    fn remaining(&self) -> u64 {
        self.total_size.saturating_sub(self.offset)
    }

    fn read_next_record(&mut self) -> CoreResult<Option<(u64, WalRecord)>> {
        let start = self.offset;

        if self.remaining() == 0 {
            return Ok(None);
        }
        if self.remaining() < HEADER_SIZE as u64 {
            // A torn header must still start like one.
            let tail = self.backend.read_at(start, self.remaining() as usize)?;
            let n = tail.len().min(WAL_MAGIC.len());
            if tail[..n] != WAL_MAGIC[..n] {
                return Err(bad_magic(start));
            }
            return Ok(None);
        }
        let header = self.backend.read_at(start, HEADER_SIZE)?;

        if header[0..4] != WAL_MAGIC {
            return Err(bad_magic(start));
        }

        let version = u16::from_le_bytes([header[4], header[5]]);
        if version > WAL_VERSION {
            return Err(CoreError::wal_corruption(format!(
                "unsupported version {version} at offset {start}"
            )));
        }

        let type_byte = header[6];
        let record_type = WalRecordType::from_byte(type_byte).ok_or_else(|| {
            CoreError::wal_corruption(format!(
                "unknown record type {type_byte} at offset {start}"
            ))
        })?;

        let payload_len = u32::from_le_bytes([header[7], header[8], header[9], header[10]]);
        let total_len = HEADER_SIZE as u64 + u64::from(payload_len) + CRC_SIZE as u64;
        if self.remaining() < total_len {
            return Ok(None);
        }

        let body = self.backend.read_at(
            start + HEADER_SIZE as u64,
            payload_len as usize + CRC_SIZE,
        )?;
        let (payload, crc_bytes) = body.split_at(payload_len as usize);
        let stored_crc =
            u32::from_le_bytes([crc_bytes[0], crc_bytes[1], crc_bytes[2], crc_bytes[3]]);

        let mut framed = header;
        framed.extend_from_slice(payload);
        let computed_crc = compute_crc32(&framed);
        if stored_crc != computed_crc {
            return Err(CoreError::ChecksumMismatch {
                expected: stored_crc,
                actual: computed_crc,
            });
        }

        let record = WalRecord::decode_payload(record_type, payload)?;
        self.offset = start + total_len;
        Ok(Some((start, record)))
    }
}

fn bad_magic(offset: u64) -> CoreError {
    if offset == 0 {
        CoreError::invalid_format("not a bucketdb database file")
    } else {
        CoreError::wal_corruption(format!("invalid magic at offset {offset}"))
    }
}

impl Iterator for WalRecordIterator<'_> {
    type Item = CoreResult<(u64, WalRecord)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.read_next_record() {
            Ok(Some(item)) => Some(Ok(item)),
            Ok(None) => {
                self.finished = true;
                None
            }
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}
