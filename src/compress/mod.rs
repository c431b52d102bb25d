//! Compression module - payload compressors keyed by header code.
//!
//! - [`NoCompression`] - identity (code 0)
//! - [`GzipCompressor`] - gzip via `flate2` (code 1)
//! - [`SnappyCompressor`] - raw snappy via `snap` (code 2)
//! - [`ZlibCompressor`] - zlib via `flate2` (code 3)
//! - [`Lz4Compressor`] - size-prepended LZ4 block via `lz4_flex` (code 4)

mod flate;
mod lz4;
mod snappy;

pub use flate::{GzipCompressor, ZlibCompressor};
pub use lz4::Lz4Compressor;
pub use snappy::SnappyCompressor;

use crate::error::{RpcError, Result};
use crate::protocol::Compression;

/// Upper bound on decompressed payload size (256 MiB).
pub const MAX_DECOMPRESSED_LEN: usize = 256 * 1024 * 1024;

fn check_decompressed_len(len: usize) -> Result<()> {
    if len > MAX_DECOMPRESSED_LEN {
        return Err(RpcError::Compression(format!(
            "Decompressed size {len} exceeds maximum {MAX_DECOMPRESSED_LEN}"
        )));
    }
    Ok(())
}

/// Byte-level compressor. `decompress` must invert `compress` exactly.
pub trait Compressor: Send + Sync + 'static {
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>>;

    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>>;
}

/// Pass-through compressor.
pub struct NoCompression;

impl Compressor for NoCompression {
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        Ok(data.to_vec())
    }

    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>> {
        Ok(data.to_vec())
    }
}

static NONE: NoCompression = NoCompression;
static GZIP: GzipCompressor = GzipCompressor;
static SNAPPY: SnappyCompressor = SnappyCompressor;
static ZLIB: ZlibCompressor = ZlibCompressor;
static LZ4: Lz4Compressor = Lz4Compressor;

/// Resolve the compressor registered for a compression code.
pub fn compressor_for(compression: Compression) -> &'static dyn Compressor {
    match compression {
        Compression::None => &NONE,
        Compression::Gzip => &GZIP,
        Compression::Snappy => &SNAPPY,
        Compression::Zlib => &ZLIB,
        Compression::Lz4 => &LZ4,
    }
}
