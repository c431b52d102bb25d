//! Wire format header and enum code tables.
//!
//! Implements the fixed 5-byte header:
//! ```text
//! ┌───────┬─────────┬──────────┬─────────────┬───────────────┐
//! │ Magic │ Version │ Msg type │ Compression │ Serialization │
//! │ 1 byte│ 1 byte  │ 1 byte   │ 1 byte      │ 1 byte        │
//! └───────┴─────────┴──────────┴─────────────┴───────────────┘
//! ```
//!
//! The header is followed by the message body, see [`super::Message`].

use serde::{Deserialize, Serialize};

use crate::error::{RpcError, Result};

/// Header size in bytes (fixed, exactly 5).
pub const HEADER_SIZE: usize = 5;

/// First byte of every frame.
pub const MAGIC_NUMBER: u8 = 0xFF;

/// Protocol version written by default.
pub const PROTOCOL_VERSION: u8 = 0x01;

/// Size of every length prefix in the body.
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Size of the sequence number.
pub const SEQ_SIZE: usize = 8;

/// Default upper bound for the variable section of a frame (64 MiB).
pub const DEFAULT_MAX_FRAME_LEN: u32 = 64 * 1024 * 1024;

/// Message type carried in header byte 2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageType {
    Request = 0,
    Response = 1,
}

impl TryFrom<u8> for MessageType {
    type Error = RpcError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(MessageType::Request),
            1 => Ok(MessageType::Response),
            other => Err(RpcError::Protocol(format!("Unknown message type {other}"))),
        }
    }
}

/// Compression code carried in header byte 3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum Compression {
    None = 0,
    Gzip = 1,
    Snappy = 2,
    #[default]
    Zlib = 3,
    Lz4 = 4,
}

impl TryFrom<u8> for Compression {
    type Error = RpcError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(Compression::None),
            1 => Ok(Compression::Gzip),
            2 => Ok(Compression::Snappy),
            3 => Ok(Compression::Zlib),
            4 => Ok(Compression::Lz4),
            other => Err(RpcError::Protocol(format!(
                "Unknown compression type {other}"
            ))),
        }
    }
}

/// Serialization code carried in header byte 4.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum Serialization {
    /// Self-describing binary encoding (MessagePack).
    #[default]
    MsgPack = 0,
    Json = 1,
}

impl TryFrom<u8> for Serialization {
    type Error = RpcError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(Serialization::MsgPack),
            1 => Ok(Serialization::Json),
            other => Err(RpcError::Protocol(format!(
                "Unknown serialization type {other}"
            ))),
        }
    }
}

/// Decoded frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Protocol version byte (opaque, echoed back by the server).
    pub version: u8,
    pub msg_type: MessageType,
    pub compression: Compression,
    pub serialization: Serialization,
}

impl Header {
    /// Create a header with the current protocol version.
    pub fn new(msg_type: MessageType, compression: Compression, serialization: Serialization) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            msg_type,
            compression,
            serialization,
        }
    }

    /// Builder-style version override.
    pub fn with_version(mut self, version: u8) -> Self {
        self.version = version;
        self
    }

    /// Encode header to bytes.
    ///
    /// # Example
    ///
    /// ```
    /// use wirecall::protocol::{Compression, Header, MessageType, Serialization};
    ///
    /// let header = Header::new(MessageType::Request, Compression::Zlib, Serialization::Json);
    /// assert_eq!(header.encode(), [0xFF, 0x01, 0x00, 0x03, 0x01]);
    /// ```
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        [
            MAGIC_NUMBER,
            self.version,
            self.msg_type as u8,
            self.compression as u8,
            self.serialization as u8,
        ]
    }

    /// Decode and validate a header.
    ///
    /// Fails with a protocol error on a bad magic number or an unknown
    /// enum code.
    pub fn decode(buf: &[u8; HEADER_SIZE]) -> Result<Self> {
        if buf[0] != MAGIC_NUMBER {
            return Err(RpcError::Protocol(format!(
                "Bad magic number 0x{:02X}",
                buf[0]
            )));
        }

        Ok(Self {
            version: buf[1],
            msg_type: MessageType::try_from(buf[2])?,
            compression: Compression::try_from(buf[3])?,
            serialization: Serialization::try_from(buf[4])?,
        })
    }

    #[inline]
    pub fn is_request(&self) -> bool {
        self.msg_type == MessageType::Request
    }

    #[inline]
    pub fn is_response(&self) -> bool {
        self.msg_type == MessageType::Response
    }
}
