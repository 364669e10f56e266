//! Log records
//!
//! One record per committed mutation, framed with a length and a CRC32 of the payload.

use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::storage::EntryTable;

use super::{MAX_RECORD_SIZE, RECORD_HEADER_SIZE};

/// A committed mutation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Record {
    /// Store a string value
    Set {
        namespace: String,
        key: String,
        value: String,
    },

    /// Remove a key
    Erase { namespace: String, key: String },
}

impl Record {
    /// Frame the record: [len (4)][crc (4)][payload]
    pub fn encode(&self) -> Result<Vec<u8>, EngineError> {
        let payload =
            bincode::serialize(self).map_err(|e| EngineError::Serialization(e.to_string()))?;

        let mut frame = Vec::with_capacity(RECORD_HEADER_SIZE + payload.len());
        frame.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        frame.extend_from_slice(&crc32fast::hash(&payload).to_le_bytes());
        frame.extend_from_slice(&payload);
        Ok(frame)
    }

    /// Decode one framed record from the front of `bytes`
    ///
    /// Returns:
    /// - `Ok(Some((record, consumed)))`: a complete, valid record
    /// - `Ok(None)`: not enough bytes for a whole record (torn write)
    /// - `Err(Corrupted)`: checksum mismatch or undecodable payload
    pub fn decode(bytes: &[u8]) -> Result<Option<(Record, usize)>, EngineError> {
        if bytes.len() < RECORD_HEADER_SIZE {
            return Ok(None);
        }

        let len = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize;
        let crc = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);

        if len > MAX_RECORD_SIZE {
            return Err(EngineError::Corrupted(format!(
                "record length {} exceeds {}",
                len, MAX_RECORD_SIZE
            )));
        }

        let total = RECORD_HEADER_SIZE + len;
        if bytes.len() < total {
            return Ok(None);
        }

        let payload = &bytes[RECORD_HEADER_SIZE..total];
        let actual = crc32fast::hash(payload);
        if actual != crc {
            return Err(EngineError::Corrupted(format!(
                "record CRC mismatch: stored {:08x}, computed {:08x}",
                crc, actual
            )));
        }

        let record: Record = bincode::deserialize(payload)
            .map_err(|e| EngineError::Corrupted(format!("undecodable record: {}", e)))?;

        Ok(Some((record, total)))
    }

    /// Replay the record onto a table
    pub fn apply(&self, table: &mut EntryTable) {
        match self {
            Record::Set {
                namespace,
                key,
                value,
            } => {
                table.set(namespace, key, value);
            }
            Record::Erase { namespace, key } => {
                table.remove(namespace, key);
            }
        }
    }
}
