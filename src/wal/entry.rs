//! WAL Entry definitions
//!
//! Defines the structure of individual WAL log entries and the frame format
//! batches are stored in.

use bytes::{BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};

use crate::error::{Result, TideError};

/// Frame header: payload length (4) + CRC32 of payload (4)
pub const FRAME_HEADER_SIZE: usize = 8;

/// Mutating commands that can be logged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryCommand {
    Set,
    Del,
}

impl EntryCommand {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryCommand::Set => "SET",
            EntryCommand::Del => "DEL",
        }
    }
}

/// A single mutation in the WAL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub command: EntryCommand,

    /// `[key, value]` for SET, `[key]` for DEL
    pub arguments: Vec<String>,
}

/// Borrowed, validated view of an entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation<'a> {
    Set { key: &'a str, value: &'a str },
    Del { key: &'a str },
}

impl Entry {
    pub fn new(command: EntryCommand, arguments: Vec<String>) -> Self {
        Self { command, arguments }
    }

    pub fn set(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(EntryCommand::Set, vec![key.into(), value.into()])
    }

    pub fn del(key: impl Into<String>) -> Self {
        Self::new(EntryCommand::Del, vec![key.into()])
    }

    /// Check the argument count and borrow the operation out
    pub fn operation(&self) -> Result<Operation<'_>> {
        match (self.command, self.arguments.as_slice()) {
            (EntryCommand::Set, [key, value]) => Ok(Operation::Set { key, value }),
            (EntryCommand::Del, [key]) => Ok(Operation::Del { key }),
            (command, args) => Err(TideError::WalCorruption(format!(
                "{} entry with {} arguments",
                command.as_str(),
                args.len()
            ))),
        }
    }
}

/// Encode one batch as a single frame
///
/// ```text
/// ┌──────────┬──────────┬──────────────────────────┐
/// │ Len (4)  │ CRC (4)  │ bincode(Vec<Entry>)      │
/// └──────────┴──────────┴──────────────────────────┘
/// ```
pub fn encode_batch(entries: &[Entry]) -> Result<Bytes> {
    let payload = bincode::serialize(entries)?;
    let len = u32::try_from(payload.len()).map_err(|_| {
        TideError::Serialization(format!("batch of {} bytes is too large", payload.len()))
    })?;

    let mut frame = BytesMut::with_capacity(FRAME_HEADER_SIZE + payload.len());
    frame.put_u32_le(len);
    frame.put_u32_le(crc32fast::hash(&payload));
    frame.put_slice(&payload);

    Ok(frame.freeze())
}

/// Decode every frame in `data`, in order
pub fn decode_batches(data: &[u8]) -> Result<Vec<Vec<Entry>>> {
    BatchIter::new(data).collect()
}

/// Iterates the frames of an in-memory segment image
///
/// Stops after the first error.
pub struct BatchIter<'a> {
    data: &'a [u8],
    position: usize,
    failed: bool,
}

impl<'a> BatchIter<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            position: 0,
            failed: false,
        }
    }

    /// Byte offset of the next undecoded frame
    pub fn position(&self) -> usize {
        self.position
    }

    fn decode_next(&mut self) -> Result<Vec<Entry>> {
        let rest = &self.data[self.position..];
        if rest.len() < FRAME_HEADER_SIZE {
            return Err(TideError::WalCorruption(format!(
                "truncated frame header at offset {}",
                self.position
            )));
        }

        let len = u32::from_le_bytes([rest[0], rest[1], rest[2], rest[3]]) as usize;
        let crc = u32::from_le_bytes([rest[4], rest[5], rest[6], rest[7]]);

        let payload = rest
            .get(FRAME_HEADER_SIZE..FRAME_HEADER_SIZE + len)
            .ok_or_else(|| {
                TideError::WalCorruption(format!(
                    "truncated frame at offset {}: expected {} payload bytes",
                    self.position, len
                ))
            })?;

        if crc32fast::hash(payload) != crc {
            return Err(TideError::WalCorruption(format!(
                "checksum mismatch at offset {}",
                self.position
            )));
        }

        let entries: Vec<Entry> = bincode::deserialize(payload)
            .map_err(|e| TideError::WalCorruption(format!("undecodable batch: {}", e)))?;

        self.position += FRAME_HEADER_SIZE + len;
        Ok(entries)
    }
}

impl Iterator for BatchIter<'_> {
    type Item = Result<Vec<Entry>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.position >= self.data.len() {
            return None;
        }
        let item = self.decode_next();
        self.failed = item.is_err();
        Some(item)
    }
}
