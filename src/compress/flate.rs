//! Gzip and zlib compressors backed by `flate2`.

use std::io::{Read, Write};

use flate2::read::{GzDecoder, ZlibDecoder};
use flate2::write::{GzEncoder, ZlibEncoder};

use super::{check_decompressed_len, Compressor, MAX_DECOMPRESSED_LEN};
use crate::error::{RpcError, Result};

fn compression_err(e: std::io::Error) -> RpcError {
    RpcError::Compression(e.to_string())
}

fn read_bounded<R: Read>(decoder: R) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    decoder
        .take(MAX_DECOMPRESSED_LEN as u64 + 1)
        .read_to_end(&mut out)
        .map_err(compression_err)?;
    check_decompressed_len(out.len())?;
    Ok(out)
}

/// Gzip compressor (code 1).
pub struct GzipCompressor;

impl Compressor for GzipCompressor {
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        let mut encoder = GzEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(data).map_err(compression_err)?;
        encoder.finish().map_err(compression_err)
    }

    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>> {
        read_bounded(GzDecoder::new(data))
    }
}

/// Zlib compressor (code 3), the client default.
pub struct ZlibCompressor;

impl Compressor for ZlibCompressor {
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        let mut encoder = ZlibEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(data).map_err(compression_err)?;
        encoder.finish().map_err(compression_err)
    }

    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>> {
        read_bounded(ZlibDecoder::new(data))
    }
}
