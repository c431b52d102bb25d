//! Protocol module - header, enum code tables and message framing.
//!
//! This module implements the binary protocol shared by client and server:
//! - 5-byte header encoding/decoding with magic number validation
//! - Message envelope with length-prefixed object name, method name and payload
//! - Async read/write of complete frames

mod message;
mod wire_format;

pub use message::{Message, PREAMBLE_SIZE};
pub use wire_format::{
    Compression, Header, MessageType, Serialization, DEFAULT_MAX_FRAME_LEN, HEADER_SIZE,
    LENGTH_PREFIX_SIZE, MAGIC_NUMBER, PROTOCOL_VERSION, SEQ_SIZE,
};
