// SPDX-License-Identifier: MIT OR Apache-2.0
//! Adaptive compression: try every codec that is worth the file's size, keep
//! whichever shrinks it the most, and fall back to storing the bytes
//! unmodified when nothing clears the 10% savings bar.

use core::convert::TryFrom;
use std::io::Read;

use bzip2::read::{BzDecoder, BzEncoder};
use bzip2::Compression as BzCompression;
use flate2::read::{ZlibDecoder, ZlibEncoder};
use flate2::Compression as ZlibCompression;
use liblzma::read::{XzDecoder, XzEncoder};
use strum_macros::EnumIter;

use crate::error::{Result, XferError};

/// Below this size, compression overhead isn't worth paying for.
const MIN_COMPRESS_SIZE: usize = 512;
/// bz2 is only tried above this size (it's slower than zlib).
const BZ2_THRESHOLD: usize = 5000;
/// lzma is only tried above this size (it's the slowest of the three).
const LZMA_THRESHOLD: usize = 10_000;
/// A candidate must beat this ratio to be preferred over storing raw bytes.
const WORTHWHILE_RATIO: f64 = 0.90;

const ZLIB_LEVEL: u32 = 6;
const BZ2_LEVEL: u32 = 5;
const LZMA_PRESET: u32 = 3;

#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumIter)]
pub enum CompressMode {
    None = 0,
    Zlib = 1,
    Bz2 = 2,
    Lzma = 3,
}

impl TryFrom<u8> for CompressMode {
    type Error = XferError;

    fn try_from(value: u8) -> Result<Self> {
        use strum::IntoEnumIterator;
        CompressMode::iter()
            .find(|m| *m as u8 == value)
            .ok_or(XferError::UnknownCompressionMode(value))
    }
}

struct Candidate {
    blob: Vec<u8>,
    mode: CompressMode,
    ratio: f64,
}

fn try_zlib(data: &[u8]) -> Option<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(data, ZlibCompression::new(ZLIB_LEVEL));
    let mut out = Vec::new();
    encoder.read_to_end(&mut out).ok()?;
    Some(out)
}

fn try_bz2(data: &[u8]) -> Option<Vec<u8>> {
    let mut encoder = BzEncoder::new(data, BzCompression::new(BZ2_LEVEL));
    let mut out = Vec::new();
    encoder.read_to_end(&mut out).ok()?;
    Some(out)
}

fn try_lzma(data: &[u8]) -> Option<Vec<u8>> {
    let mut encoder = XzEncoder::new(data, LZMA_PRESET);
    let mut out = Vec::new();
    encoder.read_to_end(&mut out).ok()?;
    Some(out)
}

/// Picks the best codec for `data`, returning `(blob, mode, ratio)`.
///
/// Codecs that fail during the trial are silently skipped — only "no
/// compression" is guaranteed to succeed.
#[must_use]
pub fn adaptive_compress(data: &[u8]) -> (Vec<u8>, CompressMode, f64) {
    if data.len() < MIN_COMPRESS_SIZE || data.is_empty() {
        return (data.to_vec(), CompressMode::None, 1.0);
    }

    let mut candidates = Vec::new();

    if let Some(blob) = try_zlib(data) {
        let ratio = blob.len() as f64 / data.len() as f64;
        candidates.push(Candidate { blob, mode: CompressMode::Zlib, ratio });
    } else {
        log::debug!("zlib compression trial failed, skipping");
    }

    if data.len() > BZ2_THRESHOLD {
        if let Some(blob) = try_bz2(data) {
            let ratio = blob.len() as f64 / data.len() as f64;
            candidates.push(Candidate { blob, mode: CompressMode::Bz2, ratio });
        } else {
            log::debug!("bz2 compression trial failed, skipping");
        }
    }

    if data.len() > LZMA_THRESHOLD {
        if let Some(blob) = try_lzma(data) {
            let ratio = blob.len() as f64 / data.len() as f64;
            candidates.push(Candidate { blob, mode: CompressMode::Lzma, ratio });
        } else {
            log::debug!("lzma compression trial failed, skipping");
        }
    }

    candidates.push(Candidate {
        blob: data.to_vec(),
        mode: CompressMode::None,
        ratio: 1.0,
    });

    let best = candidates
        .into_iter()
        .min_by(|a, b| a.ratio.partial_cmp(&b.ratio).unwrap())
        .expect("the None candidate always exists");

    if best.ratio < WORTHWHILE_RATIO {
        log::info!(
            "compression: {:?}, {} -> {} bytes (ratio {:.2}%)",
            best.mode,
            data.len(),
            best.blob.len(),
            best.ratio * 100.0
        );
        (best.blob, best.mode, best.ratio)
    } else {
        log::info!("no compression worthwhile (best ratio {:.2}%)", best.ratio * 100.0);
        (data.to_vec(), CompressMode::None, 1.0)
    }
}

/// Decompresses `data` according to `mode`.
///
/// # Errors
///
/// Returns `Err(XferError::Decompress)` if the payload is corrupt for the
/// declared codec, or the mode byte doesn't map to a known `CompressMode`.
pub fn adaptive_decompress(data: &[u8], mode: CompressMode) -> Result<Vec<u8>> {
    match mode {
        CompressMode::None => Ok(data.to_vec()),
        CompressMode::Zlib => {
            let mut decoder = ZlibDecoder::new(data);
            let mut out = Vec::new();
            decoder
                .read_to_end(&mut out)
                .map_err(|e| XferError::Decompress(e.to_string()))?;
            Ok(out)
        }
        CompressMode::Bz2 => {
            let mut decoder = BzDecoder::new(data);
            let mut out = Vec::new();
            decoder
                .read_to_end(&mut out)
                .map_err(|e| XferError::Decompress(e.to_string()))?;
            Ok(out)
        }
        CompressMode::Lzma => {
            let mut decoder = XzDecoder::new(data);
            let mut out = Vec::new();
            decoder
                .read_to_end(&mut out)
                .map_err(|e| XferError::Decompress(e.to_string()))?;
            Ok(out)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[rstest::rstest]
    #[case(vec![0u8; 100])]
    #[case(vec![])]
    pub fn test_small_input_never_compressed(#[case] data: Vec<u8>) {
        let (blob, mode, ratio) = adaptive_compress(&data);
        assert_eq!(mode, CompressMode::None);
        assert_eq!(blob, data);
        assert_eq!(ratio, 1.0);
    }

    #[test]
    fn test_just_under_threshold_is_none() {
        let data = vec![7u8; MIN_COMPRESS_SIZE - 1];
        let (blob, mode, _) = adaptive_compress(&data);
        assert_eq!(mode, CompressMode::None);
        assert_eq!(blob, data);
    }

    #[test]
    fn test_highly_compressible_picks_a_codec() {
        let data = vec![b'A'; 50_000];
        let (blob, mode, ratio) = adaptive_compress(&data);
        assert_ne!(mode, CompressMode::None);
        assert!(ratio < WORTHWHILE_RATIO);
        let restored = adaptive_decompress(&blob, mode).unwrap();
        assert_eq!(restored, data);
    }

    #[test]
    fn test_random_bytes_round_trip() {
        use rand::RngCore;
        let mut data = vec![0u8; 10_000];
        rand::thread_rng().fill_bytes(&mut data);
        let (blob, mode, _) = adaptive_compress(&data);
        let restored = adaptive_decompress(&blob, mode).unwrap();
        assert_eq!(restored, data);
    }

    #[test]
    fn test_none_mode_is_identity() {
        let data = vec![1, 2, 3, 4, 5];
        let (blob, mode, _) = adaptive_compress(&data);
        assert_eq!(mode, CompressMode::None);
        assert_eq!(blob, data);
    }

    #[test]
    fn test_unknown_mode_rejected() {
        assert!(CompressMode::try_from(9).is_err());
    }
}
