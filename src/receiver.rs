// SPDX-License-Identifier: MIT OR Apache-2.0
//! Receiver FSM: reassembles chunks as frames arrive, publishes an ACK
//! payload reflecting current state after every frame, and decides when a
//! transfer is complete or has timed out.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::compress::{adaptive_decompress, CompressMode};
use crate::constants::{
    ACK_PIPE, ADDR_A, ADDR_B, FRAME_SIZE, GLOBAL_TIMEOUT, IDLE_TIMEOUT, RECEIVE_POLL_INTERVAL,
};
use crate::error::{Result, TimeoutKind, XferError};
use crate::frame::{build_ack_payload, parse_frame};
use crate::radio::{require_radio_init, Radio};

/// Outcome of a receive attempt, whether or not every packet arrived.
#[derive(Debug, Clone)]
pub struct ReceiveReport {
    pub file_id: Option<u16>,
    pub dest_path: PathBuf,
    pub bytes_written: usize,
    pub packets_received: usize,
    pub total_packets: usize,
    pub missing: Vec<u16>,
    pub errors_corrected: u32,
    pub elapsed: std::time::Duration,
}

impl ReceiveReport {
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }
}

/// Drives the receiver side of the link until a transfer finishes, times
/// out, or the link falls idle past `IDLE_TIMEOUT` with no LAST ever seen.
///
/// # Errors
///
/// Returns `Err(XferError::Timeout)` if `GLOBAL_TIMEOUT`/`IDLE_TIMEOUT`
/// elapses, `Err(XferError::NoData)` if nothing was ever received, or a
/// decompression error if the reassembled stream doesn't match the declared
/// codec.
pub fn receive_file<R: Radio>(radio: &mut R, dest_dir: &Path) -> Result<ReceiveReport> {
    require_radio_init(radio)?;
    radio.open_rx_pipe(1, ADDR_A);
    radio.open_tx_pipe(ADDR_B);
    radio.start_listening();

    let mut file_id_seen: Option<u16> = None;
    let mut chunks: BTreeMap<u16, Vec<u8>> = BTreeMap::new();
    let mut last_seq: Option<u16> = None;
    let mut last_seen = false;
    let mut compress_mode = CompressMode::None;
    let mut start_time: Option<Instant> = None;
    let mut last_packet_time: Option<Instant> = None;
    let mut packets_received = 0usize;
    let mut total_errors_corrected = 0u32;

    let first_ack = build_ack_payload(None, &chunks, None, false, 0);
    radio.write_ack_payload(ACK_PIPE, &first_ack);

    loop {
        let now = Instant::now();

        if let Some(start) = start_time {
            if now.duration_since(start) > GLOBAL_TIMEOUT {
                radio.stop_listening();
                return Err(XferError::Timeout(TimeoutKind::Global));
            }
        }

        if last_seen {
            if let Some(last_packet) = last_packet_time {
                if now.duration_since(last_packet) > IDLE_TIMEOUT {
                    radio.stop_listening();
                    return Err(XferError::Timeout(TimeoutKind::Idle));
                }
            }
        }

        let Some(_pipe) = radio.available_pipe() else {
            std::thread::sleep(RECEIVE_POLL_INTERVAL);
            continue;
        };

        let payload_size = radio.get_dynamic_payload_size();
        if payload_size == 0 || payload_size > FRAME_SIZE {
            let _ = radio.read(if payload_size > 0 { payload_size } else { FRAME_SIZE });
            let ack = build_ack_payload(file_id_seen, &chunks, last_seq, last_seen, compress_mode as u8);
            radio.write_ack_payload(ACK_PIPE, &ack);
            continue;
        }

        let mut raw = radio.read(payload_size);
        if raw.len() < FRAME_SIZE {
            raw.resize(FRAME_SIZE, 0);
        }

        let Some(parsed) = parse_frame(&raw) else {
            let ack = build_ack_payload(file_id_seen, &chunks, last_seq, last_seen, compress_mode as u8);
            radio.write_ack_payload(ACK_PIPE, &ack);
            continue;
        };

        last_packet_time = Some(now);
        packets_received += 1;
        if start_time.is_none() {
            start_time = Some(now);
        }
        if parsed.errors_corrected > 0 {
            total_errors_corrected += parsed.errors_corrected as u32;
        }

        if file_id_seen.is_none() {
            file_id_seen = Some(parsed.file_id);
            compress_mode = CompressMode::try_from(&parsed).unwrap_or(CompressMode::None);
            log::info!("rx: file_id={} compress={:?}", parsed.file_id, compress_mode);
        }

        if Some(parsed.file_id) != file_id_seen {
            let ack = build_ack_payload(file_id_seen, &chunks, last_seq, last_seen, compress_mode as u8);
            radio.write_ack_payload(ACK_PIPE, &ack);
            continue;
        }

        if let std::collections::btree_map::Entry::Vacant(slot) = chunks.entry(parsed.seq_id) {
            slot.insert(parsed.data.clone());
            if packets_received % crate::constants::PROGRESS_INTERVAL == 0 || parsed.is_last {
                let elapsed = start_time.unwrap().elapsed().as_secs_f64().max(1e-9);
                let throughput = (chunks.len() * parsed.data.len()) as f64 / elapsed / 1024.0;
                log::info!(
                    "rx: {} packets, {:.1} KiB/s, {} FEC error(s) corrected",
                    chunks.len(),
                    throughput,
                    total_errors_corrected
                );
            }
        }

        if parsed.is_last {
            last_seq = Some(parsed.seq_id);
            last_seen = true;
            log::info!("rx: LAST seen at seq {}, {} of {} so far", parsed.seq_id, chunks.len(), parsed.seq_id + 1);
        }

        if let Some(last) = last_seq {
            if last_seen && chunks.len() == last as usize + 1 {
                log::info!("rx: transfer complete");
                break;
            }
        }

        let ack = build_ack_payload(file_id_seen, &chunks, last_seq, last_seen, compress_mode as u8);
        radio.write_ack_payload(ACK_PIPE, &ack);
    }

    radio.stop_listening();
    let elapsed = start_time.map_or(std::time::Duration::ZERO, |s| s.elapsed());

    if chunks.is_empty() {
        return Err(XferError::NoData);
    }

    let max_seq = *chunks.keys().last().expect("chunks is non-empty");
    let mut reconstructed = Vec::new();
    let mut missing = Vec::new();
    for seq in 0..=max_seq {
        match chunks.get(&seq) {
            Some(data) => reconstructed.extend_from_slice(data),
            None => missing.push(seq),
        }
    }
    if !missing.is_empty() {
        log::warn!("rx: {} packet(s) missing", missing.len());
    }

    if compress_mode != CompressMode::None {
        reconstructed = adaptive_decompress(&reconstructed, compress_mode)?;
    }

    let timestamp = crate::config::unix_timestamp();
    let filename = match file_id_seen {
        Some(id) => format!("file_{id}_{timestamp}.bin"),
        None => format!("file_{timestamp}.bin"),
    };
    let dest_path = dest_dir.join(filename);
    std::fs::write(&dest_path, &reconstructed)?;

    Ok(ReceiveReport {
        file_id: file_id_seen,
        dest_path,
        bytes_written: reconstructed.len(),
        packets_received: chunks.len(),
        total_packets: max_seq as usize + 1,
        missing,
        errors_corrected: total_errors_corrected,
        elapsed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::build_frame;
    use crate::radio::SimRadio;

    #[test]
    fn test_single_small_file_end_to_end() {
        let (mut tx, mut rx) = SimRadio::pair();
        let data = b"hello nrf-xfer".to_vec();

        let frame = build_frame(42, 0, &data, true, 0, false).unwrap();
        tx.write(&frame);

        let dir = tempfile::tempdir().unwrap();
        let report = receive_file(&mut rx, dir.path()).unwrap();
        assert!(report.is_complete());
        assert_eq!(report.bytes_written, data.len());
        assert_eq!(std::fs::read(&report.dest_path).unwrap(), data);
    }

    #[test]
    fn test_duplicate_packet_ignored() {
        let (mut tx, mut rx) = SimRadio::pair();
        let first = build_frame(1, 0, b"abc", false, 0, false).unwrap();
        let last = build_frame(1, 1, b"def", true, 0, false).unwrap();
        tx.write(&first);
        tx.write(&first);
        tx.write(&last);

        let dir = tempfile::tempdir().unwrap();
        let report = receive_file(&mut rx, dir.path()).unwrap();
        assert_eq!(report.packets_received, 2);
        assert_eq!(std::fs::read(&report.dest_path).unwrap(), b"abcdef");
    }
}
