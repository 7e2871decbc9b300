// SPDX-License-Identifier: MIT OR Apache-2.0
//! Byte-exact geometry and timing constants for the link. Every number here
//! must match on both ends of the radio; changing one without the other
//! desyncs the frame layout.

use core::time::Duration;

/// Size of every frame on the wire, FEC on or off.
pub const FRAME_SIZE: usize = 32;

/// Size of the frame header (`file_id`, `seq_id`, `data_len`, `flags`).
pub const HEADER_SIZE: usize = 6;

/// Maximum data bytes per frame with FEC disabled.
pub const DATA_BYTES: usize = 26;

/// Maximum data bytes per frame with FEC enabled (4 bytes go to parity).
pub const EFFECTIVE_DATA_BYTES: usize = 22;

/// Reed-Solomon parity symbol count.
pub const FEC_SYMBOLS: usize = 4;

/// Frames sent per burst before checking for completion.
pub const BURST_SIZE: usize = 15;

/// Sender-side round budget before giving up on a transfer.
pub const MAX_ROUNDS: usize = 20;

/// Delay between the end-of-round ping and the retransmission of LAST.
pub const PING_DELAY: Duration = Duration::from_millis(300);

/// Idle poll interval while the receiver waits for a frame.
pub const RECEIVE_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Hard cutoff from the first valid frame of a transfer.
pub const GLOBAL_TIMEOUT: Duration = Duration::from_secs(120);

/// Cutoff with no packet arrivals once the LAST frame has been seen.
pub const IDLE_TIMEOUT: Duration = Duration::from_secs(10);

/// Progress is logged every this many packets, in addition to on LAST.
pub const PROGRESS_INTERVAL: usize = 25;

pub const FLAG_LAST: u8 = 0x01;
pub const FLAG_COMPRESSED: u8 = 0x02;
pub const FLAG_FEC: u8 = 0x08;

/// Radio channel, chosen to sit above the common 2.4 GHz Wi-Fi spectrum.
pub const RADIO_CHANNEL: u8 = 90;

/// Hardware auto-retry parameters: (delay, count).
pub const RADIO_RETRIES: (u8, u8) = (5, 5);

/// Pipe address used by the transmitter's TX pipe / receiver's RX pipe.
pub const ADDR_A: [u8; 5] = [0xE7, 0xE7, 0xE7, 0xE7, 0xE7];

/// Pipe address used by the receiver's TX pipe / transmitter's RX pipe.
pub const ADDR_B: [u8; 5] = [0xD7, 0xD7, 0xD7, 0xD7, 0xD7];

/// ACK pipe the receiver publishes feedback on.
pub const ACK_PIPE: u8 = 1;

/// Sentinel `missing_seq` meaning "no active file".
pub const ACK_NO_FILE: u16 = 0xFFFE;

/// Sentinel `missing_seq` meaning "nothing missing".
pub const ACK_NONE_MISSING: u16 = 0xFFFF;

pub const ACK_FLAG_COMPLETE: u8 = 0x01;

/// The literal idle ACK payload, published before any transfer starts.
pub const IDLE_ACK_PAYLOAD: [u8; 6] = [0x00, 0x00, 0xFF, 0xFE, 0x00, 0x00];

/// `max_data` for the given FEC setting.
#[must_use]
pub const fn max_data(use_fec: bool) -> usize {
    if use_fec {
        EFFECTIVE_DATA_BYTES
    } else {
        DATA_BYTES
    }
}
