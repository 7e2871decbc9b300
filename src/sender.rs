// SPDX-License-Identifier: MIT OR Apache-2.0
//! Transmitter FSM: prepares a file, chunks it, and drives the
//! burst/selective-repeat loop against a [`Radio`].

use std::collections::BTreeSet;
use std::time::Instant;

use rand::Rng;
use sha2::{Digest, Sha256};

use crate::compress::adaptive_compress;
use crate::constants::{
    max_data, ADDR_A, ADDR_B, BURST_SIZE, MAX_ROUNDS, PING_DELAY, PROGRESS_INTERVAL,
    RADIO_RETRIES,
};
use crate::error::{Result, XferError};
use crate::frame::{build_frame, parse_ack, ParsedAck};
use crate::radio::{require_radio_init, Radio};

/// Outcome of a successful transfer, for logging/verification hooks.
#[derive(Debug, Clone)]
pub struct TransferReport {
    pub file_id: u16,
    pub original_size: usize,
    pub compressed_size: usize,
    pub packets_sent: usize,
    pub total_packets: usize,
    pub elapsed: std::time::Duration,
    /// 4-byte truncated SHA-256 of the original file. Computed for logging
    /// and verification hooks only — never placed on the wire.
    pub integrity_tag: [u8; 4],
}

fn truncated_sha256(data: &[u8]) -> [u8; 4] {
    let digest = Sha256::digest(data);
    let mut tag = [0u8; 4];
    tag.copy_from_slice(&digest[..4]);
    tag
}

/// Splits `data` into `chunk_size`-byte pieces (the last may be shorter, and
/// an empty file still yields exactly one empty chunk so LAST has somewhere
/// to land).
fn split_into_chunks(data: &[u8], chunk_size: usize) -> Vec<Vec<u8>> {
    if data.is_empty() {
        return vec![Vec::new()];
    }
    data.chunks(chunk_size).map(<[u8]>::to_vec).collect()
}

/// Polls for an ACK payload delivered on the hardware ACK of the last
/// `write()`, and parses it if present.
fn poll_ack<R: Radio>(radio: &mut R) -> Option<ParsedAck> {
    let _pipe = radio.available_pipe()?;
    let len = radio.get_dynamic_payload_size();
    let bytes = radio.read(len);
    parse_ack(&bytes)
}

/// Sends `data` over `radio`, returning once every chunk is acknowledged or
/// `MAX_ROUNDS` is exhausted.
///
/// # Errors
///
/// Returns `Err(XferError::Incomplete)` if packets remain unacknowledged
/// after `MAX_ROUNDS`.
pub fn send_file<R: Radio>(radio: &mut R, data: &[u8], use_fec: bool) -> Result<TransferReport> {
    require_radio_init(radio)?;
    radio.open_rx_pipe(1, ADDR_B);
    radio.stop_listening();
    radio.open_tx_pipe(ADDR_A);
    radio.set_retries(RADIO_RETRIES.0, RADIO_RETRIES.1);

    let integrity_tag = truncated_sha256(data);
    let (compressed, compress_mode, _ratio) = adaptive_compress(data);
    let chunk_size = max_data(use_fec);
    let chunks = split_into_chunks(&compressed, chunk_size);
    let total_packets = chunks.len();

    let file_id: u16 = rand::thread_rng().gen_range(0..=65535);
    log::info!(
        "tx: file_id={file_id} packets={total_packets} compress={:?} fec={use_fec} hash={}",
        compress_mode,
        hex::encode(integrity_tag)
    );

    let mut pending: BTreeSet<u16> = (0..total_packets as u16).collect();
    let mut sent_count = 0usize;
    let start_time = Instant::now();

    'rounds: for round in 0..MAX_ROUNDS {
        if pending.is_empty() {
            break;
        }
        log::debug!("tx: round {} pending={}", round + 1, pending.len());

        let pending_list: Vec<u16> = pending.iter().copied().collect();
        for burst in pending_list.chunks(BURST_SIZE) {
            for &seq_id in burst {
                let is_last = seq_id as usize == total_packets - 1;
                let frame = build_frame(
                    file_id,
                    seq_id,
                    &chunks[seq_id as usize],
                    is_last,
                    compress_mode as u8,
                    use_fec,
                )?;

                if radio.write(&frame) {
                    sent_count += 1;
                    pending.remove(&seq_id);

                    if let Some(parsed) = poll_ack(radio) {
                        if parsed.is_complete {
                            pending.clear();
                            break 'rounds;
                        }
                    }

                    if sent_count % PROGRESS_INTERVAL == 0 || is_last {
                        let elapsed = start_time.elapsed().as_secs_f64().max(1e-9);
                        let throughput = (sent_count * chunk_size) as f64 / elapsed / 1024.0;
                        log::info!(
                            "tx: {}/{} sent, {:.1} KiB/s",
                            sent_count,
                            total_packets,
                            throughput
                        );
                    }
                }
            }
            if pending.is_empty() {
                break;
            }
        }

        if !pending.is_empty() {
            std::thread::sleep(PING_DELAY);
            let last_seq = (total_packets - 1) as u16;
            let frame = build_frame(
                file_id,
                last_seq,
                &chunks[last_seq as usize],
                true,
                compress_mode as u8,
                use_fec,
            )?;
            if radio.write(&frame) {
                if let Some(parsed) = poll_ack(radio) {
                    if parsed.is_complete {
                        log::info!("tx: receiver confirms complete");
                        pending.clear();
                        break;
                    } else if let Some(missing) = parsed.missing_seq {
                        pending.retain(|&s| s >= missing);
                    }
                }
            }
        }
    }

    let elapsed = start_time.elapsed();
    if pending.is_empty() {
        log::info!("tx: transfer complete in {elapsed:?}");
        Ok(TransferReport {
            file_id,
            original_size: data.len(),
            compressed_size: compressed.len(),
            packets_sent: sent_count,
            total_packets,
            elapsed,
            integrity_tag,
        })
    } else {
        log::warn!("tx: incomplete, {} packet(s) missing", pending.len());
        Err(XferError::Incomplete { missing: pending.len() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_empty_file_yields_one_chunk() {
        let chunks = split_into_chunks(&[], 22);
        assert_eq!(chunks, vec![Vec::<u8>::new()]);
    }

    #[test]
    fn test_split_exact_boundary() {
        let data = vec![1u8; 22];
        let chunks = split_into_chunks(&data, 22);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].len(), 22);
    }

    #[test]
    fn test_split_one_over_boundary() {
        let data = vec![1u8; 23];
        let chunks = split_into_chunks(&data, 22);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[1].len(), 1);
    }
}
