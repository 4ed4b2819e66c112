// /////////////////////////////////////////////////////////////////////////////
// cpm
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Gzip compression codec (C3)
//!
//! Streams through a 10 KiB working buffer per §4.3, growing the output
//! buffer by that increment on each `read` call until the stream ends.
//! `flate2`'s `GzEncoder`/`GzDecoder` already implement the gzip container
//! (magic bytes `1f 8b`) so this adapter only has to pick a level and drive
//! the `Read` loop.

use std::io::Read;

use flate2::read::{GzDecoder, GzEncoder};
use flate2::Compression;

use cpm_domain::error::CpmError;
use cpm_domain::services::compression::{CompressionCodec, CompressionLevel};

/// Working-buffer increment for streaming compress/decompress (§4.3).
const STREAM_CHUNK: usize = 10 * 1024;

#[derive(Debug, Default)]
pub struct GzipCodec;

impl GzipCodec {
    pub fn new() -> Self {
        Self
    }
}

impl CompressionCodec for GzipCodec {
    fn compress(&self, plain: &[u8], level: CompressionLevel) -> Result<Vec<u8>, CpmError> {
        let mut encoder = GzEncoder::new(plain, Compression::new(level.value() as u32));
        let mut out = Vec::with_capacity(plain.len() / 2 + STREAM_CHUNK);
        read_to_end_streaming(&mut encoder, &mut out)
            .map_err(|e| CpmError::Compression(format!("gzip compress failed: {e}")))?;
        Ok(out)
    }

    fn decompress(&self, compressed: &[u8]) -> Result<Vec<u8>, CpmError> {
        let mut decoder = GzDecoder::new(compressed);
        let mut out = Vec::with_capacity(compressed.len() * 2 + STREAM_CHUNK);
        read_to_end_streaming(&mut decoder, &mut out)
            .map_err(|e| CpmError::Compression(format!("gzip decompress failed: {e}")))?;
        Ok(out)
    }
}

fn read_to_end_streaming<R: Read>(reader: &mut R, out: &mut Vec<u8>) -> std::io::Result<()> {
    let mut buf = [0u8; STREAM_CHUNK];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        out.extend_from_slice(&buf[..n]);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_arbitrary_bytes() {
        let codec = GzipCodec::new();
        let plain = b"the quick brown fox jumps over the lazy dog".repeat(200);
        let compressed = codec.compress(&plain, CompressionLevel::BEST).unwrap();
        assert!(cpm_domain::services::compression::looks_compressed(&compressed));
        let round_tripped = codec.decompress(&compressed).unwrap();
        assert_eq!(round_tripped, plain);
    }

    #[test]
    fn round_trips_at_every_level() {
        let codec = GzipCodec::new();
        let plain = b"small payload".to_vec();
        for level in 1..=6u8 {
            let compressed = codec.compress(&plain, CompressionLevel::Level(level)).unwrap();
            assert_eq!(codec.decompress(&compressed).unwrap(), plain);
        }
    }

    #[test]
    fn empty_input_round_trips() {
        let codec = GzipCodec::new();
        let compressed = codec.compress(&[], CompressionLevel::BEST).unwrap();
        assert_eq!(codec.decompress(&compressed).unwrap(), Vec::<u8>::new());
    }
}
