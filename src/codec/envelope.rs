//! Envelope framing
//!
//! Wraps an encoded body with magic, version, type identity and a CRC.

use bytes::{Buf, BufMut, BytesMut};
use serde::{Deserialize, Serialize};

use crate::error::{Result, ShelfError};

use super::{FORMAT_VERSION, MAGIC, MAX_HEADER_SIZE, PREFIX_SIZE};

/// How the body bytes were produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BodyFormat {
    /// Field-tagged MessagePack written by the default structural encoder
    Structural,

    /// Bytes produced by a registered `TypeSerializer`
    Custom,
}

/// Metadata stored in front of every body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvelopeHeader {
    pub format_version: u16,

    /// `std::any::type_name` of the value at write time (informational)
    pub type_name: String,

    pub body_format: BodyFormat,

    pub body_len: u32,

    pub body_crc: u32,
}

impl EnvelopeHeader {
    /// Build a header describing `body`
    pub fn describe(type_name: &str, body_format: BodyFormat, body: &[u8]) -> Self {
        Self {
            format_version: FORMAT_VERSION,
            type_name: type_name.to_string(),
            body_format,
            body_len: body.len() as u32,
            body_crc: crc32fast::hash(body),
        }
    }
}

/// Frame a body into envelope bytes
///
/// Format: magic (4) + header_len (4, LE) + header + body
pub fn seal_envelope(type_name: &str, body_format: BodyFormat, body: &[u8]) -> Result<Vec<u8>> {
    if body.len() > u32::MAX as usize {
        return Err(ShelfError::Serialization(format!(
            "Body too large: {} bytes",
            body.len()
        )));
    }

    let header = EnvelopeHeader::describe(type_name, body_format, body);
    let header_bytes = bincode::serialize(&header)
        .map_err(|e| ShelfError::Serialization(format!("Failed to encode header: {}", e)))?;

    if header_bytes.len() > MAX_HEADER_SIZE {
        return Err(ShelfError::Serialization(format!(
            "Envelope header too large: {} bytes (max {})",
            header_bytes.len(),
            MAX_HEADER_SIZE
        )));
    }

    let mut buf = BytesMut::with_capacity(PREFIX_SIZE + header_bytes.len() + body.len());
    buf.put_slice(MAGIC);
    buf.put_u32_le(header_bytes.len() as u32);
    buf.put_slice(&header_bytes);
    buf.put_slice(body);

    Ok(buf.to_vec())
}

/// Validate framing and split envelope bytes into header and body
pub fn open_envelope(bytes: &[u8]) -> Result<(EnvelopeHeader, &[u8])> {
    if bytes.len() < PREFIX_SIZE {
        return Err(ShelfError::CorruptData(format!(
            "Truncated envelope: expected at least {} bytes, got {}",
            PREFIX_SIZE,
            bytes.len()
        )));
    }

    if &bytes[..4] != MAGIC {
        return Err(ShelfError::CorruptData("Bad envelope magic".to_string()));
    }

    let mut cursor = &bytes[4..];
    let header_len = cursor.get_u32_le() as usize;

    if header_len > MAX_HEADER_SIZE {
        return Err(ShelfError::CorruptData(format!(
            "Header length {} exceeds max {}",
            header_len, MAX_HEADER_SIZE
        )));
    }
    if cursor.len() < header_len {
        return Err(ShelfError::CorruptData(format!(
            "Truncated header: expected {} bytes, got {}",
            header_len,
            cursor.len()
        )));
    }

    let header: EnvelopeHeader = bincode::deserialize(&cursor[..header_len])
        .map_err(|e| ShelfError::CorruptData(format!("Unreadable header: {}", e)))?;

    if header.format_version != FORMAT_VERSION {
        return Err(ShelfError::CorruptData(format!(
            "Unsupported envelope version {}",
            header.format_version
        )));
    }

    let body = &cursor[header_len..];
    if body.len() != header.body_len as usize {
        return Err(ShelfError::CorruptData(format!(
            "Body length mismatch: header says {}, found {}",
            header.body_len,
            body.len()
        )));
    }

    let actual_crc = crc32fast::hash(body);
    if actual_crc != header.body_crc {
        return Err(ShelfError::CorruptData(format!(
            "Body checksum mismatch: expected {:08x}, got {:08x}",
            header.body_crc, actual_crc
        )));
    }

    Ok((header, body))
}
