//! Gzip compression stage.

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use savelite_core::{CompressionMethod, Error, Result};
use std::io::{Read, Write};

/// Compress `data` with the given method
///
/// Empty input yields empty output without touching the encoder.
pub fn compress(method: CompressionMethod, data: &[u8]) -> Result<Vec<u8>> {
    if data.is_empty() {
        return Ok(Vec::new());
    }

    match method {
        CompressionMethod::None => Ok(data.to_vec()),
        CompressionMethod::GZip => {
            let mut encoder =
                GzEncoder::new(Vec::with_capacity(data.len() / 2), Compression::default());
            encoder
                .write_all(data)
                .map_err(|e| Error::Codec(format!("gzip compression failed: {}", e)))?;
            encoder
                .finish()
                .map_err(|e| Error::Codec(format!("gzip compression failed: {}", e)))
        }
    }
}

/// Reverse [`compress`]
pub fn decompress(method: CompressionMethod, data: &[u8]) -> Result<Vec<u8>> {
    if data.is_empty() {
        return Ok(Vec::new());
    }

    match method {
        CompressionMethod::None => Ok(data.to_vec()),
        CompressionMethod::GZip => {
            let mut decoder = GzDecoder::new(data);
            let mut out = Vec::with_capacity(data.len() * 2);
            decoder
                .read_to_end(&mut out)
                .map_err(|e| Error::Codec(format!("gzip decompression failed: {}", e)))?;
            Ok(out)
        }
    }
}
