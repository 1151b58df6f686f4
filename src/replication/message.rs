//! Replication wire messages
//!
//! Every message travels as one frame:
//! ```text
//! ┌──────────┬──────────────────────────┐
//! │ Len (4)  │ bincode(message)         │
//! └──────────┴──────────────────────────┘
//! ```

use std::io::{Read, Write};

use bytes::{BufMut, BytesMut};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TideError};

/// Length prefix size
pub const LEN_PREFIX_SIZE: usize = 4;

/// Slave → master: "what comes after this segment?"
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentRequest {
    /// Last segment fully received; empty when the slave has none
    pub last_name: String,
}

/// Master → slave
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentResponse {
    pub name: String,

    /// Whole segment content. `None` means there is nothing to ship this
    /// round (slave at the tip, or the master failed to read the file);
    /// `Some` may legitimately be empty for a fully-deleted compacted segment.
    pub data: Option<Vec<u8>>,
}

impl SegmentResponse {
    /// Acknowledge without shipping anything
    pub fn unchanged(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data: None,
        }
    }
}

/// Encode and write one frame, then flush
pub fn write_frame<W: Write, T: Serialize>(writer: &mut W, message: &T) -> Result<()> {
    let payload = bincode::serialize(message)?;
    let len = u32::try_from(payload.len())
        .map_err(|_| TideError::Protocol(format!("frame of {} bytes is too large", payload.len())))?;

    let mut frame = BytesMut::with_capacity(LEN_PREFIX_SIZE + payload.len());
    frame.put_u32_le(len);
    frame.put_slice(&payload);

    writer.write_all(&frame)?;
    writer.flush()?;
    Ok(())
}

/// Read and decode one frame of at most `max_size` payload bytes
pub fn read_frame<R: Read, T: DeserializeOwned>(reader: &mut R, max_size: usize) -> Result<T> {
    let mut prefix = [0u8; LEN_PREFIX_SIZE];
    reader.read_exact(&mut prefix)?;

    let len = u32::from_le_bytes(prefix) as usize;
    if len > max_size {
        return Err(TideError::Protocol(format!(
            "frame too large: {} bytes (max {})",
            len, max_size
        )));
    }

    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload)?;

    Ok(bincode::deserialize(&payload)?)
}
