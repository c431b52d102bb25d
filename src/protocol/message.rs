//! Message envelope and framing.
//!
//! ```text
//! ┌────────┬──────────┬───────────┬──────────────────┬──────────────────┬──────────────────┐
//! │ Header │ Seq      │ Total len │ Object name      │ Method name      │ Payload          │
//! │ 5 bytes│ i64 BE   │ u32 BE    │ u32 BE len + raw │ u32 BE len + raw │ u32 BE len + raw │
//! └────────┴──────────┴───────────┴──────────────────┴──────────────────┴──────────────────┘
//! ```
//!
//! The total length covers exactly the three length-prefixed fields, so a
//! reader needs three reads per frame regardless of payload size.

use bytes::{BufMut, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use super::wire_format::{
    Header, MessageType, DEFAULT_MAX_FRAME_LEN, HEADER_SIZE, LENGTH_PREFIX_SIZE, SEQ_SIZE,
};
use crate::error::{RpcError, Result};

/// Bytes preceding the variable section (header + seq + total length).
pub const PREAMBLE_SIZE: usize = HEADER_SIZE + SEQ_SIZE + LENGTH_PREFIX_SIZE;

/// One complete frame: header plus body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub header: Header,
    /// Call sequence number, echoed back on the response.
    pub seq: i64,
    /// Target object/service name (empty on responses).
    pub object: String,
    /// Target method name (empty on responses).
    pub method: String,
    /// Serialized and compressed payload.
    pub payload: Bytes,
}

impl Message {
    /// Create a request message.
    pub fn request(
        header: Header,
        seq: i64,
        object: impl Into<String>,
        method: impl Into<String>,
        payload: impl Into<Bytes>,
    ) -> Self {
        Self {
            header: Header {
                msg_type: MessageType::Request,
                ..header
            },
            seq,
            object: object.into(),
            method: method.into(),
            payload: payload.into(),
        }
    }

    /// Create a response message. Names are left empty.
    pub fn response(header: Header, seq: i64, payload: impl Into<Bytes>) -> Self {
        Self {
            header: Header {
                msg_type: MessageType::Response,
                ..header
            },
            seq,
            object: String::new(),
            method: String::new(),
            payload: payload.into(),
        }
    }

    /// Length of the variable section as written in the total-length prefix.
    pub fn body_len(&self) -> Result<u32> {
        let len = 3 * LENGTH_PREFIX_SIZE + self.object.len() + self.method.len() + self.payload.len();
        u32::try_from(len)
            .map_err(|_| RpcError::Protocol(format!("Frame body of {len} bytes is too large")))
    }

    /// Encode the whole frame into one contiguous buffer.
    ///
    /// # Example
    ///
    /// ```
    /// use wirecall::protocol::{Compression, Header, Message, MessageType, Serialization};
    ///
    /// let header = Header::new(MessageType::Request, Compression::None, Serialization::Json);
    /// let msg = Message::request(header, 7, "User", "SayHello", &b"[]"[..]);
    /// let bytes = msg.encode().unwrap();
    /// assert_eq!(bytes.len(), 5 + 8 + 4 + (4 + 4) + (4 + 8) + (4 + 2));
    /// ```
    pub fn encode(&self) -> Result<Bytes> {
        let body_len = self.body_len()?;
        let mut buf = BytesMut::with_capacity(PREAMBLE_SIZE + body_len as usize);

        buf.put_slice(&self.header.encode());
        buf.put_u64(self.seq as u64);
        buf.put_u32(body_len);
        put_field(&mut buf, self.object.as_bytes());
        put_field(&mut buf, self.method.as_bytes());
        put_field(&mut buf, &self.payload);

        Ok(buf.freeze())
    }

    /// Write the frame with a single `write_all`.
    ///
    /// A failure leaves the stream in an unknown state; the caller must
    /// close it.
    pub async fn write_to<W>(&self, writer: &mut W) -> Result<()>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        let bytes = self.encode()?;
        writer.write_all(&bytes).await?;
        writer.flush().await?;
        Ok(())
    }

    /// Read one frame using the default frame length limit.
    pub async fn read_from<R>(reader: &mut R) -> Result<Self>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        Self::read_from_limited(reader, DEFAULT_MAX_FRAME_LEN).await
    }

    /// Read one frame, rejecting variable sections larger than `max_frame_len`.
    ///
    /// Short reads surface as [`RpcError::Io`] with `UnexpectedEof`; corrupt
    /// framing surfaces as [`RpcError::Protocol`].
    pub async fn read_from_limited<R>(reader: &mut R, max_frame_len: u32) -> Result<Self>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        let mut header_buf = [0u8; HEADER_SIZE];
        reader.read_exact(&mut header_buf).await?;
        let header = Header::decode(&header_buf)?;

        let seq = reader.read_u64().await? as i64;
        let body_len = reader.read_u32().await?;
        if body_len > max_frame_len {
            return Err(RpcError::Protocol(format!(
                "Frame body of {body_len} bytes exceeds maximum {max_frame_len}"
            )));
        }

        let mut block = BytesMut::zeroed(body_len as usize);
        reader.read_exact(&mut block).await?;

        let (object, method, payload) = parse_body(block.freeze())?;
        Ok(Self {
            header,
            seq,
            object,
            method,
            payload,
        })
    }
}

fn put_field(buf: &mut BytesMut, field: &[u8]) {
    buf.put_u32(field.len() as u32);
    buf.put_slice(field);
}

/// Split the variable section into object name, method name and payload.
///
/// The block must contain exactly the three length-prefixed fields.
fn parse_body(block: Bytes) -> Result<(String, String, Bytes)> {
    let mut cursor = 0usize;

    let object = take_field(&block, &mut cursor, "object name")?;
    let method = take_field(&block, &mut cursor, "method name")?;
    let payload = take_field(&block, &mut cursor, "payload")?;

    if cursor != block.len() {
        return Err(RpcError::Protocol(format!(
            "Declared total length {} does not match fields ({} bytes)",
            block.len(),
            cursor
        )));
    }

    Ok((into_name(object, "object name")?, into_name(method, "method name")?, payload))
}

fn take_field(block: &Bytes, cursor: &mut usize, what: &str) -> Result<Bytes> {
    let prefix_end = *cursor + LENGTH_PREFIX_SIZE;
    if prefix_end > block.len() {
        return Err(RpcError::Protocol(format!(
            "Truncated {what} length prefix at offset {cursor}"
        )));
    }

    let mut prefix = [0u8; LENGTH_PREFIX_SIZE];
    prefix.copy_from_slice(&block[*cursor..prefix_end]);
    let len = u32::from_be_bytes(prefix) as usize;

    let end = prefix_end
        .checked_add(len)
        .filter(|end| *end <= block.len())
        .ok_or_else(|| {
            RpcError::Protocol(format!(
                "{what} length {len} overruns frame of {} bytes",
                block.len()
            ))
        })?;

    *cursor = end;
    Ok(block.slice(prefix_end..end))
}

fn into_name(bytes: Bytes, what: &str) -> Result<String> {
    String::from_utf8(bytes.to_vec())
        .map_err(|_| RpcError::Protocol(format!("{what} is not valid UTF-8")))
}
