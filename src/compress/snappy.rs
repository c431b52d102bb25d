//! Snappy compressor backed by `snap` (raw block format).

use super::{check_decompressed_len, Compressor};
use crate::error::{RpcError, Result};

/// Snappy compressor (code 2).
pub struct SnappyCompressor;

impl Compressor for SnappyCompressor {
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        snap::raw::Encoder::new()
            .compress_vec(data)
            .map_err(|e| RpcError::Compression(e.to_string()))
    }

    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>> {
        let len = snap::raw::decompress_len(data).map_err(|e| RpcError::Compression(e.to_string()))?;
        check_decompressed_len(len)?;
        snap::raw::Decoder::new()
            .decompress_vec(data)
            .map_err(|e| RpcError::Compression(e.to_string()))
    }
}
