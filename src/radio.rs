// SPDX-License-Identifier: MIT OR Apache-2.0
//! The radio adapter boundary. `Radio` declares the capability set this
//! crate needs from an nRF24L01+-style transceiver; no physical driver is
//! implemented here (that's explicitly out of scope). [`SimRadio`] is an
//! in-memory half-duplex pair used by tests and by the CLI's dry-run mode.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rand::Rng;

use crate::constants::{FRAME_SIZE, RADIO_CHANNEL, RADIO_RETRIES};
use crate::error::{Result, XferError};

/// Capability set required of a radio driver.
///
/// Mirrors the nRF24L01+ API the original firmware calls directly:
/// `begin`, `set_retries`, pipe management, `write`/`read`, and the
/// ACK-payload piggyback channel. A caller drives exactly one of PTX or PRX
/// mode at a time; switching roles means reopening pipes.
///
/// `available_pipe`/`get_dynamic_payload_size`/`read` serve double duty, as
/// they do on real nRF24L01+ hardware: on a PRX node they surface inbound
/// data frames, while on a PTX node, immediately after a successful
/// [`Radio::write`], they surface whatever ACK payload the peer queued via
/// [`Radio::write_ack_payload`].
pub trait Radio {
    /// Initializes the chip. Returns `Err` if hardware init fails.
    fn begin(&mut self) -> Result<()>;

    fn set_retries(&mut self, delay: u8, count: u8);

    fn open_tx_pipe(&mut self, addr: [u8; 5]);

    fn open_rx_pipe(&mut self, pipe: u8, addr: [u8; 5]);

    fn start_listening(&mut self);

    fn stop_listening(&mut self);

    /// Writes a frame and blocks for the hardware's auto-retry window.
    /// Returns `true` iff a hardware ACK was received within the retry
    /// budget.
    fn write(&mut self, frame: &[u8]) -> bool;

    /// Non-blocking poll: `Some(pipe)` if a payload is queued.
    fn available_pipe(&mut self) -> Option<u8>;

    fn get_dynamic_payload_size(&mut self) -> usize;

    /// Reads up to `len` bytes of the queued payload.
    fn read(&mut self, len: usize) -> Vec<u8>;

    /// Queues `bytes` to piggyback on the next hardware ACK sent on `pipe`.
    fn write_ack_payload(&mut self, pipe: u8, bytes: &[u8]);
}

/// Injected impairments for exercising the FSMs against a lossy link.
#[derive(Debug, Clone, Default)]
pub struct LinkConditions {
    /// Frame indices (0-based, per direction) to silently drop.
    pub drop_frames: Vec<usize>,
    /// Byte offset within each frame to XOR-flip on every transmission, if
    /// any (simulates a noisy channel).
    pub flip_byte_at: Option<usize>,
    /// Probability in `[0, 1]` that any given frame is dropped, independent
    /// of `drop_frames`.
    pub drop_probability: f64,
    /// Probability in `[0, 1]` that a random byte in the frame is flipped,
    /// independent of `flip_byte_at`.
    pub bit_flip_probability: f64,
    /// Fixed delay applied before a frame reaches the peer's inbox, standing
    /// in for propagation/processing jitter on a real link.
    pub jitter: Option<Duration>,
}

#[derive(Default)]
struct Endpoint {
    /// Whatever this endpoint would currently read from hardware: inbound
    /// data frames while listening, or a delivered ACK payload right after
    /// this endpoint's own `write()` call.
    inbox: VecDeque<Vec<u8>>,
    /// Staged via `write_ack_payload`, delivered to the peer's inbox on the
    /// peer's next successful `write()`.
    staged_ack: Option<Vec<u8>>,
    listening: bool,
    conditions: LinkConditions,
    sent_count: usize,
}

/// One end of an in-memory half-duplex link. Construct a connected pair with
/// [`SimRadio::pair`]. Backed by `Arc<Mutex<_>>` rather than `Rc<RefCell<_>>`
/// so a pair can be driven from two threads, matching how the CLI runs a
/// sender and receiver concurrently against the same simulated link.
pub struct SimRadio {
    local: Arc<Mutex<Endpoint>>,
    peer: Arc<Mutex<Endpoint>>,
}

impl SimRadio {
    /// Builds a connected transmitter/receiver pair sharing no impairments.
    #[must_use]
    pub fn pair() -> (Self, Self) {
        Self::pair_with_conditions(LinkConditions::default(), LinkConditions::default())
    }

    /// Builds a connected pair where `tx_conditions` apply to frames sent by
    /// the first radio and `rx_conditions` to frames sent by the second.
    #[must_use]
    pub fn pair_with_conditions(tx_conditions: LinkConditions, rx_conditions: LinkConditions) -> (Self, Self) {
        let a = Arc::new(Mutex::new(Endpoint { conditions: tx_conditions, ..Endpoint::default() }));
        let b = Arc::new(Mutex::new(Endpoint { conditions: rx_conditions, ..Endpoint::default() }));
        (
            SimRadio { local: a.clone(), peer: b.clone() },
            SimRadio { local: b, peer: a },
        )
    }
}

impl Radio for SimRadio {
    fn begin(&mut self) -> Result<()> {
        Ok(())
    }

    fn set_retries(&mut self, _delay: u8, _count: u8) {
        let _ = RADIO_RETRIES;
    }

    fn open_tx_pipe(&mut self, _addr: [u8; 5]) {}

    fn open_rx_pipe(&mut self, _pipe: u8, _addr: [u8; 5]) {
        let _ = RADIO_CHANNEL;
    }

    fn start_listening(&mut self) {
        self.local.lock().unwrap().listening = true;
    }

    fn stop_listening(&mut self) {
        self.local.lock().unwrap().listening = false;
    }

    fn write(&mut self, frame: &[u8]) -> bool {
        let (idx, conditions) = {
            let mut local = self.local.lock().unwrap();
            let idx = local.sent_count;
            local.sent_count += 1;
            (idx, local.conditions.clone())
        };

        if conditions.drop_frames.contains(&idx) {
            return false;
        }
        if conditions.drop_probability > 0.0
            && rand::thread_rng().gen_bool(conditions.drop_probability.min(1.0))
        {
            return false;
        }

        if let Some(delay) = conditions.jitter {
            std::thread::sleep(delay);
        }

        let mut out = frame.to_vec();
        if let Some(offset) = conditions.flip_byte_at {
            if offset < out.len() {
                out[offset] ^= 0xFF;
            }
        }
        if conditions.bit_flip_probability > 0.0 && !out.is_empty() {
            let mut rng = rand::thread_rng();
            if rng.gen_bool(conditions.bit_flip_probability.min(1.0)) {
                let offset = rng.gen_range(0..out.len());
                out[offset] ^= 0xFF;
            }
        }

        self.peer.lock().unwrap().inbox.push_back(out);

        if let Some(ack) = self.peer.lock().unwrap().staged_ack.take() {
            self.local.lock().unwrap().inbox.push_back(ack);
        }
        true
    }

    fn available_pipe(&mut self) -> Option<u8> {
        if self.local.lock().unwrap().inbox.is_empty() {
            None
        } else {
            Some(1)
        }
    }

    fn get_dynamic_payload_size(&mut self) -> usize {
        self.local.lock().unwrap().inbox.front().map_or(0, Vec::len)
    }

    fn read(&mut self, len: usize) -> Vec<u8> {
        match self.local.lock().unwrap().inbox.pop_front() {
            Some(mut frame) => {
                frame.truncate(len.min(FRAME_SIZE));
                frame
            }
            None => Vec::new(),
        }
    }

    fn write_ack_payload(&mut self, _pipe: u8, bytes: &[u8]) {
        self.peer.lock().unwrap().staged_ack = Some(bytes.to_vec());
    }
}

/// Surfaces radio init failure as a fatal error rather than entering an FSM.
pub fn require_radio_init<R: Radio>(radio: &mut R) -> Result<()> {
    radio.begin().map_err(|e| XferError::RadioInit(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_delivers_frame_to_peer() {
        let (mut tx, mut rx) = SimRadio::pair();
        assert!(tx.write(&[1u8; 32]));
        assert_eq!(rx.available_pipe(), Some(1));
        assert_eq!(rx.read(32), vec![1u8; 32]);
    }

    #[test]
    fn test_ack_payload_delivered_on_next_write() {
        let (mut tx, mut rx) = SimRadio::pair();
        rx.write_ack_payload(1, &[9u8; 6]);
        assert!(tx.write(&[0u8; 32]));
        assert_eq!(tx.available_pipe(), Some(1));
        assert_eq!(tx.read(6), vec![9u8; 6]);
    }

    #[test]
    fn test_dropped_frame_reports_failure() {
        let (mut tx, mut rx) = SimRadio::pair_with_conditions(
            LinkConditions { drop_frames: vec![0], ..LinkConditions::default() },
            LinkConditions::default(),
        );
        assert!(!tx.write(&[1u8; 32]));
        assert_eq!(rx.available_pipe(), None);
    }

    #[test]
    fn test_drop_probability_one_always_drops() {
        let (mut tx, mut rx) = SimRadio::pair_with_conditions(
            LinkConditions { drop_probability: 1.0, ..LinkConditions::default() },
            LinkConditions::default(),
        );
        assert!(!tx.write(&[1u8; 32]));
        assert_eq!(rx.available_pipe(), None);
    }

    #[test]
    fn test_bit_flip_probability_one_always_flips() {
        let (mut tx, mut rx) = SimRadio::pair_with_conditions(
            LinkConditions { bit_flip_probability: 1.0, ..LinkConditions::default() },
            LinkConditions::default(),
        );
        assert!(tx.write(&[0u8; 32]));
        let frame = rx.read(32);
        assert!(frame.iter().any(|&b| b != 0));
    }

    #[test]
    fn test_jitter_delays_delivery() {
        let (mut tx, _rx) = SimRadio::pair_with_conditions(
            LinkConditions { jitter: Some(std::time::Duration::from_millis(5)), ..LinkConditions::default() },
            LinkConditions::default(),
        );
        let start = std::time::Instant::now();
        assert!(tx.write(&[1u8; 32]));
        assert!(start.elapsed() >= std::time::Duration::from_millis(5));
    }
}
