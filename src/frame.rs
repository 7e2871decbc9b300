// SPDX-License-Identifier: MIT OR Apache-2.0
//! Builds and parses the 32-byte on-wire frame and the 6-byte ACK payload
//! piggybacked on the hardware ACK.

use core::convert::TryFrom;
use std::collections::BTreeMap;
use tinyvec::{array_vec, ArrayVec};

use crate::compress::CompressMode;
use crate::constants::{
    max_data, ACK_FLAG_COMPLETE, ACK_NONE_MISSING, ACK_NO_FILE, FLAG_COMPRESSED, FLAG_FEC,
    FLAG_LAST, FRAME_SIZE, HEADER_SIZE, IDLE_ACK_PAYLOAD,
};
use crate::error::{Result, XferError};
use crate::fec::{decode_fec, encode_fec};

/// A decoded inbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedFrame {
    pub file_id: u16,
    pub seq_id: u16,
    pub data: Vec<u8>,
    pub is_last: bool,
    pub compress_mode: u8,
    pub errors_corrected: i32,
}

/// Builds a 32-byte frame.
///
/// # Errors
///
/// Returns `Err(XferError::DataTooLarge)` if `data` exceeds `max_data` for
/// the requested FEC setting.
pub fn build_frame(
    file_id: u16,
    seq_id: u16,
    data: &[u8],
    is_last: bool,
    compress_mode: u8,
    use_fec: bool,
) -> Result<ArrayVec<[u8; FRAME_SIZE]>> {
    let limit = max_data(use_fec);
    if data.len() > limit {
        return Err(XferError::DataTooLarge { len: data.len(), max: limit });
    }

    let mut flags = 0u8;
    if is_last {
        flags |= FLAG_LAST;
    }
    if compress_mode > 0 {
        flags |= FLAG_COMPRESSED;
        flags |= compress_mode << 4;
    }
    if use_fec {
        flags |= FLAG_FEC;
    }

    let mut header = array_vec!([u8; HEADER_SIZE]);
    header.extend_from_slice(&file_id.to_be_bytes());
    header.extend_from_slice(&seq_id.to_be_bytes());
    header.push(data.len() as u8);
    header.push(flags);

    let mut padded_data = Vec::with_capacity(limit);
    padded_data.extend_from_slice(data);
    padded_data.resize(limit, 0);

    let mut out = array_vec!([u8; FRAME_SIZE]);
    if use_fec {
        let mut block = Vec::with_capacity(HEADER_SIZE + limit);
        block.extend_from_slice(&header);
        block.extend_from_slice(&padded_data);
        let encoded = encode_fec(&block);
        debug_assert_eq!(encoded.len(), FRAME_SIZE);
        out.extend_from_slice(&encoded);
    } else {
        out.extend_from_slice(&header);
        out.extend_from_slice(&padded_data);
    }

    debug_assert_eq!(out.len(), FRAME_SIZE);
    Ok(out)
}

/// Parses a 32-byte inbound frame, attempting FEC decode first.
///
/// Returns `None` on malformed input (wrong length, or `data_len` exceeding
/// `max_data` for the flags actually present); never panics.
#[must_use]
pub fn parse_frame(pkt: &[u8]) -> Option<ParsedFrame> {
    if pkt.len() != FRAME_SIZE {
        return None;
    }

    let (raw, errors_corrected): (Vec<u8>, i32) = {
        let (decoded, errors) = decode_fec(pkt);
        if errors >= 0 && decoded.len() >= HEADER_SIZE {
            (decoded, errors)
        } else {
            (pkt.to_vec(), 0)
        }
    };

    if raw.len() < HEADER_SIZE {
        return None;
    }

    let file_id = u16::from_be_bytes([raw[0], raw[1]]);
    let seq_id = u16::from_be_bytes([raw[2], raw[3]]);
    let data_len = raw[4] as usize;
    let flags = raw[5];

    let has_fec = flags & FLAG_FEC != 0;
    let limit = max_data(has_fec);
    if data_len > limit {
        return None;
    }

    let data_start = HEADER_SIZE;
    let data_end = (data_start + limit).min(raw.len());
    if data_start > raw.len() {
        return None;
    }
    let available = &raw[data_start..data_end];
    if data_len > available.len() {
        return None;
    }

    let is_last = flags & FLAG_LAST != 0;
    let is_compressed = flags & FLAG_COMPRESSED != 0;
    let compress_mode = if is_compressed { (flags >> 4) & 0x0F } else { 0 };

    Some(ParsedFrame {
        file_id,
        seq_id,
        data: available[..data_len].to_vec(),
        is_last,
        compress_mode,
        errors_corrected,
    })
}

/// Builds the 6-byte ACK payload reflecting the receiver's current state.
///
/// `file_id = None` always yields the literal idle ACK, regardless of
/// `chunks`/`last_seq` — see the open question in the design notes about this
/// branch overlap.
#[must_use]
pub fn build_ack_payload(
    file_id: Option<u16>,
    chunks: &BTreeMap<u16, Vec<u8>>,
    last_seq: Option<u16>,
    last_seen: bool,
    compress_mode: u8,
) -> [u8; 6] {
    let Some(file_id) = file_id else {
        return IDLE_ACK_PAYLOAD;
    };

    let (missing_seq, flags) = match last_seq {
        None => (ACK_NO_FILE, 0u8),
        Some(last_seq) => {
            let missing = (0..=last_seq).find(|seq| !chunks.contains_key(seq));
            match missing {
                Some(seq) => (seq, 0u8),
                None => (ACK_NONE_MISSING, if last_seen { ACK_FLAG_COMPLETE } else { 0 }),
            }
        }
    };

    let mut out = [0u8; 6];
    out[0..2].copy_from_slice(&file_id.to_be_bytes());
    out[2..4].copy_from_slice(&missing_seq.to_be_bytes());
    out[4] = flags;
    out[5] = compress_mode;
    out
}

/// A decoded ACK payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedAck {
    pub file_id: u16,
    pub missing_seq: Option<u16>,
    pub is_complete: bool,
    pub compress_mode: u8,
}

/// Parses a (possibly truncated) ACK payload.
///
/// Returns `None` if fewer than 5 bytes are present.
#[must_use]
pub fn parse_ack(ack: &[u8]) -> Option<ParsedAck> {
    if ack.len() < 5 {
        return None;
    }

    let file_id = u16::from_be_bytes([ack[0], ack[1]]);
    let missing_seq = u16::from_be_bytes([ack[2], ack[3]]);
    let flags = ack[4];
    let compress_mode = if ack.len() > 5 { ack[5] } else { 0 };

    let missing_seq = match missing_seq {
        ACK_NONE_MISSING | ACK_NO_FILE => None,
        seq => Some(seq),
    };

    Some(ParsedAck {
        file_id,
        missing_seq,
        is_complete: flags & ACK_FLAG_COMPLETE != 0,
        compress_mode,
    })
}

impl TryFrom<&ParsedFrame> for CompressMode {
    type Error = XferError;

    fn try_from(frame: &ParsedFrame) -> Result<Self> {
        CompressMode::try_from(frame.compress_mode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[rstest::rstest]
    #[case(0, 0, &[], false, 0, false)]
    #[case(1234, 5, &[1, 2, 3], true, 0, false)]
    #[case(65535, 65535, &[0u8; 26], false, 2, false)]
    #[case(42, 7, &[9u8; 22], true, 3, true)]
    #[case(0, 0, &[], false, 0, true)]
    pub fn test_build_parse_round_trip(
        #[case] file_id: u16,
        #[case] seq_id: u16,
        #[case] data: &[u8],
        #[case] is_last: bool,
        #[case] compress_mode: u8,
        #[case] use_fec: bool,
    ) {
        let frame = build_frame(file_id, seq_id, data, is_last, compress_mode, use_fec).unwrap();
        assert_eq!(frame.len(), FRAME_SIZE);
        let parsed = parse_frame(&frame).unwrap();
        assert_eq!(parsed.file_id, file_id);
        assert_eq!(parsed.seq_id, seq_id);
        assert_eq!(parsed.data, data);
        assert_eq!(parsed.is_last, is_last);
        assert_eq!(parsed.compress_mode, compress_mode);
        assert_eq!(parsed.errors_corrected, 0);
    }

    #[test]
    fn test_data_too_large_rejected() {
        let oversized = vec![0u8; 27];
        assert!(build_frame(0, 0, &oversized, false, 0, false).is_err());
        let oversized_fec = vec![0u8; 23];
        assert!(build_frame(0, 0, &oversized_fec, false, 0, true).is_err());
    }

    #[test]
    fn test_parse_wrong_length_rejected() {
        assert!(parse_frame(&[0u8; 31]).is_none());
        assert!(parse_frame(&[0u8; 33]).is_none());
    }

    #[test]
    fn test_ack_idle_payload() {
        let chunks = BTreeMap::new();
        let ack = build_ack_payload(None, &chunks, None, false, 0);
        assert_eq!(ack, IDLE_ACK_PAYLOAD);
    }

    #[test]
    fn test_ack_no_last_seen_yet() {
        let chunks = BTreeMap::new();
        let ack = build_ack_payload(Some(7), &chunks, None, false, 0);
        let parsed = parse_ack(&ack).unwrap();
        assert_eq!(parsed.file_id, 7);
        assert_eq!(parsed.missing_seq, None);
        assert!(!parsed.is_complete);
    }

    #[test]
    fn test_ack_reports_lowest_missing() {
        let mut chunks = BTreeMap::new();
        chunks.insert(0, vec![]);
        chunks.insert(1, vec![]);
        chunks.insert(3, vec![]);
        let ack = build_ack_payload(Some(7), &chunks, Some(3), true, 1);
        let parsed = parse_ack(&ack).unwrap();
        assert_eq!(parsed.missing_seq, Some(2));
        assert!(!parsed.is_complete);
    }

    #[test]
    fn test_ack_complete_when_nothing_missing() {
        let mut chunks = BTreeMap::new();
        for s in 0..=3u16 {
            chunks.insert(s, vec![]);
        }
        let ack = build_ack_payload(Some(7), &chunks, Some(3), true, 2);
        let parsed = parse_ack(&ack).unwrap();
        assert_eq!(parsed.missing_seq, None);
        assert!(parsed.is_complete);
        assert_eq!(parsed.compress_mode, 2);
    }

    #[test]
    fn test_parse_ack_truncated_payload() {
        let ack = [0u8, 0, 0xFF, 0xFF, 0x01];
        let parsed = parse_ack(&ack).unwrap();
        assert_eq!(parsed.compress_mode, 0);
        assert!(parsed.is_complete);
    }

    #[test]
    fn test_parse_ack_too_short_rejected() {
        assert!(parse_ack(&[0, 0, 0, 0]).is_none());
    }
}
