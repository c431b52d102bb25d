//! LZ4 compressor backed by `lz4_flex`.
//!
//! Uses the block format with the uncompressed size prepended as a
//! little-endian u32, so decompression knows the output size up front.

use super::{check_decompressed_len, Compressor};
use crate::error::{RpcError, Result};

/// LZ4 compressor (code 4).
pub struct Lz4Compressor;

impl Compressor for Lz4Compressor {
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        Ok(lz4_flex::compress_prepend_size(data))
    }

    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>> {
        let prefix: [u8; 4] = data
            .get(..4)
            .and_then(|p| p.try_into().ok())
            .ok_or_else(|| RpcError::Compression("LZ4 size prefix missing".to_string()))?;
        check_decompressed_len(u32::from_le_bytes(prefix) as usize)?;

        lz4_flex::decompress_size_prepended(data).map_err(|e| RpcError::Compression(e.to_string()))
    }
}
