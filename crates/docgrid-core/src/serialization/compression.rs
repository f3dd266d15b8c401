//! Struct payload compression

use serde::{Deserialize, Serialize};

use crate::types::error::{DecodeError, DecodeResult};

/// Compression applied to a struct's field data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionType {
    /// Stored as is
    #[default]
    None,
    /// LZ4 block format
    Lz4,
}

impl CompressionType {
    /// Wire code
    pub fn code(self) -> u8 {
        match self {
            CompressionType::None => 0,
            CompressionType::Lz4 => 6,
        }
    }

    /// Compression type for a wire code
    pub fn from_code(code: u8) -> DecodeResult<Self> {
        match code {
            0 => Ok(CompressionType::None),
            6 => Ok(CompressionType::Lz4),
            other => Err(DecodeError::UnknownCompression(other)),
        }
    }
}

/// Compress `data`, returning `None` unless the result is strictly smaller
pub fn compress(kind: CompressionType, data: &[u8]) -> Option<Vec<u8>> {
    match kind {
        CompressionType::None => None,
        CompressionType::Lz4 => {
            let compressed = lz4_flex::block::compress(data);
            (compressed.len() < data.len()).then_some(compressed)
        }
    }
}

/// Largest output an lz4 block of `compressed_len` bytes can expand to
pub fn max_lz4_output(compressed_len: usize) -> usize {
    compressed_len.saturating_mul(LZ4_MAX_RATIO).saturating_add(16)
}

const LZ4_MAX_RATIO: usize = 255;

/// Decompress `data`, which must expand to exactly `uncompressed_size` bytes.
///
/// A declared size the input could never expand to is rejected before any
/// output buffer is allocated.
pub fn decompress(kind: CompressionType, data: &[u8], uncompressed_size: usize) -> DecodeResult<Vec<u8>> {
    if kind == CompressionType::Lz4 && uncompressed_size > max_lz4_output(data.len()) {
        return Err(DecodeError::Decompression(format!(
            "declared size {} exceeds what {} compressed bytes can hold",
            uncompressed_size,
            data.len()
        )));
    }
    let out = match kind {
        CompressionType::None => data.to_vec(),
        CompressionType::Lz4 => lz4_flex::block::decompress(data, uncompressed_size)
            .map_err(|e| DecodeError::Decompression(e.to_string()))?,
    };
    if out.len() != uncompressed_size {
        return Err(DecodeError::length_mismatch("decompressed struct", uncompressed_size, out.len()));
    }
    Ok(out)
}
