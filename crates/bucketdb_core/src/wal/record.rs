//! Log record types and serialization.

use crate::error::{CoreError, CoreResult};
use crate::types::{SequenceNumber, TransactionId};
use crate::wal::{CRC_SIZE, HEADER_SIZE};

/// Magic bytes identifying a log record.
pub const WAL_MAGIC: [u8; 4] = *b"BKTW";

/// Current log format version.
pub const WAL_VERSION: u16 = 1;

/// Type of log record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WalRecordType {
    /// Start of a committed transaction's run.
    Begin = 1,
    /// Create a bucket.
    CreateBucket = 2,
    /// Delete a bucket and everything in it.
    DeleteBucket = 3,
    /// Set a key in a bucket.
    Put = 4,
    /// Remove a key from a bucket.
    Delete = 5,
    /// End of a transaction's run; the transaction is durable once this is.
    Commit = 6,
}

impl WalRecordType {
    /// Converts a byte to a record type.
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            1 => Some(Self::Begin),
            2 => Some(Self::CreateBucket),
            3 => Some(Self::DeleteBucket),
            4 => Some(Self::Put),
            5 => Some(Self::Delete),
            6 => Some(Self::Commit),
            _ => None,
        }
    }

    /// Converts the record type to a byte.
    #[must_use]
    pub const fn as_byte(self) -> u8 {
        self as u8
    }
}

/// A log record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalRecord {
    /// Start of a transaction.
    Begin {
        /// Transaction ID.
        txid: TransactionId,
    },

    /// Create a bucket.
    CreateBucket {
        /// Transaction ID.
        txid: TransactionId,
        /// Bucket name.
        name: Vec<u8>,
    },

    /// Delete a bucket with all its entries.
    DeleteBucket {
        /// Transaction ID.
        txid: TransactionId,
        /// Bucket name.
        name: Vec<u8>,
    },

    /// Insert or overwrite a key.
    Put {
        /// Transaction ID.
        txid: TransactionId,
        /// Bucket name.
        bucket: Vec<u8>,
        /// Entry key.
        key: Vec<u8>,
        /// Entry value.
        value: Vec<u8>,
    },

    /// Remove a key.
    Delete {
        /// Transaction ID.
        txid: TransactionId,
        /// Bucket name.
        bucket: Vec<u8>,
        /// Entry key.
        key: Vec<u8>,
    },

    /// Commit a transaction.
    Commit {
        /// Transaction ID.
        txid: TransactionId,
        /// Sequence number assigned to this commit.
        sequence: SequenceNumber,
    },
}

impl WalRecord {
    /// Returns the record type.
    #[must_use]
    pub fn record_type(&self) -> WalRecordType {
        match self {
            Self::Begin { .. } => WalRecordType::Begin,
            Self::CreateBucket { .. } => WalRecordType::CreateBucket,
            Self::DeleteBucket { .. } => WalRecordType::DeleteBucket,
            Self::Put { .. } => WalRecordType::Put,
            Self::Delete { .. } => WalRecordType::Delete,
            Self::Commit { .. } => WalRecordType::Commit,
        }
    }

    /// Returns the transaction this record belongs to.
    #[must_use]
    pub fn txid(&self) -> TransactionId {
        match self {
            Self::Begin { txid }
            | Self::CreateBucket { txid, .. }
            | Self::DeleteBucket { txid, .. }
            | Self::Put { txid, .. }
            | Self::Delete { txid, .. }
            | Self::Commit { txid, .. } => *txid,
        }
    }

    /// Serializes the record payload (without envelope).
    ///
    /// # Errors
    ///
    /// Returns an error if a byte string does not fit a 4-byte length.
    pub fn encode_payload(&self) -> CoreResult<Vec<u8>> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&self.txid().as_u64().to_le_bytes());

        match self {
            Self::Begin { .. } => {}
            Self::CreateBucket { name, .. } | Self::DeleteBucket { name, .. } => {
                put_bytes(&mut buf, name)?;
            }
            Self::Put {
                bucket, key, value, ..
            } => {
                put_bytes(&mut buf, bucket)?;
                put_bytes(&mut buf, key)?;
                put_bytes(&mut buf, value)?;
            }
            Self::Delete { bucket, key, .. } => {
                put_bytes(&mut buf, bucket)?;
                put_bytes(&mut buf, key)?;
            }
            Self::Commit { sequence, .. } => {
                buf.extend_from_slice(&sequence.as_u64().to_le_bytes());
            }
        }

        Ok(buf)
    }

    /// Serializes the full framed record: header, payload and CRC.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload is too large to frame.
    pub fn encode(&self) -> CoreResult<Vec<u8>> {
        let payload = self.encode_payload()?;
        let len = u32::try_from(payload.len())
            .map_err(|_| CoreError::invalid_operation("log record payload too large"))?;

        let mut data = Vec::with_capacity(HEADER_SIZE + payload.len() + CRC_SIZE);
        data.extend_from_slice(&WAL_MAGIC);
        data.extend_from_slice(&WAL_VERSION.to_le_bytes());
        data.push(self.record_type().as_byte());
        data.extend_from_slice(&len.to_le_bytes());
        data.extend_from_slice(&payload);

        let crc = compute_crc32(&data);
        data.extend_from_slice(&crc.to_le_bytes());
        Ok(data)
    }

    /// Deserializes a record from its type and payload.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::WalCorruption`] if the payload is short or has
    /// trailing bytes.
    pub fn decode_payload(record_type: WalRecordType, payload: &[u8]) -> CoreResult<Self> {
        let mut reader = PayloadReader::new(payload);
        let txid = TransactionId::new(reader.u64()?);

        let record = match record_type {
            WalRecordType::Begin => Self::Begin { txid },
            WalRecordType::CreateBucket => Self::CreateBucket {
                txid,
                name: reader.bytes()?,
            },
            WalRecordType::DeleteBucket => Self::DeleteBucket {
                txid,
                name: reader.bytes()?,
            },
            WalRecordType::Put => Self::Put {
                txid,
                bucket: reader.bytes()?,
                key: reader.bytes()?,
                value: reader.bytes()?,
            },
            WalRecordType::Delete => Self::Delete {
                txid,
                bucket: reader.bytes()?,
                key: reader.bytes()?,
            },
            WalRecordType::Commit => Self::Commit {
                txid,
                sequence: SequenceNumber::new(reader.u64()?),
            },
        };

        reader.finish(record_type)?;
        Ok(record)
    }
}

fn put_bytes(buf: &mut Vec<u8>, bytes: &[u8]) -> CoreResult<()> {
    let len = u32::try_from(bytes.len()).map_err(|_| {
        CoreError::invalid_operation(format!("byte string of {} bytes too large", bytes.len()))
    })?;
    buf.extend_from_slice(&len.to_le_bytes());
    buf.extend_from_slice(bytes);
    Ok(())
}

struct PayloadReader<'a> {
    payload: &'a [u8],
    cursor: usize,
}

impl<'a> PayloadReader<'a> {
    fn new(payload: &'a [u8]) -> Self {
        Self { payload, cursor: 0 }
    }

    fn take(&mut self, len: usize) -> CoreResult<&'a [u8]> {
        let end = self
            .cursor
            .checked_add(len)
            .filter(|&end| end <= self.payload.len())
            .ok_or_else(|| CoreError::wal_corruption("unexpected end of payload"))?;
        let slice = &self.payload[self.cursor..end];
        self.cursor = end;
        Ok(slice)
    }

    fn u32(&mut self) -> CoreResult<u32> {
        let bytes: [u8; 4] = self
            .take(4)?
            .try_into()
            .map_err(|_| CoreError::wal_corruption("invalid u32"))?;
        Ok(u32::from_le_bytes(bytes))
    }

    fn u64(&mut self) -> CoreResult<u64> {
        let bytes: [u8; 8] = self
            .take(8)?
            .try_into()
            .map_err(|_| CoreError::wal_corruption("invalid u64"))?;
        Ok(u64::from_le_bytes(bytes))
    }

    fn bytes(&mut self) -> CoreResult<Vec<u8>> {
        let len = self.u32()? as usize;
        Ok(self.take(len)?.to_vec())
    }

    fn finish(&self, record_type: WalRecordType) -> CoreResult<()> {
        if self.cursor != self.payload.len() {
            return Err(CoreError::wal_corruption(format!(
                "trailing bytes in {:?} record: expected {} bytes, got {}",
                record_type,
                self.cursor,
                self.payload.len()
            )));
        }
        Ok(())
    }
}

/// Computes the CRC32 (IEEE) checksum of `data`.
pub fn compute_crc32(data: &[u8]) -> u32 {
    const CRC32_TABLE: [u32; 256] = {
        let mut table = [0u32; 256];
        let mut i = 0;
        while i < 256 {
            let mut crc = i as u32;
            let mut j = 0;
            while j < 8 {
                if crc & 1 != 0 {
                    crc = (crc >> 1) ^ 0xEDB8_8320;
                } else {
                    crc >>= 1;
                }
                j += 1;
            }
            table[i] = crc;
            i += 1;
        }
        table
    };

    let mut crc = 0xFFFF_FFFF_u32;
    for &byte in data {
        let index = ((crc ^ u32::from(byte)) & 0xFF) as usize;
        crc = (crc >> 8) ^ CRC32_TABLE[index];
    }
    !crc
}
