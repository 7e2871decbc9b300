// SPDX-License-Identifier: MIT OR Apache-2.0
//! Error hierarchy for the transfer core, the radio adapter, and configuration
//! loading. Nothing in this crate panics on malformed input or a failed
//! transfer; every failure path lands here.

use thiserror::Error;

/// Which timeout tripped while the receiver was waiting on a transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutKind {
    /// `GLOBAL_TIMEOUT` elapsed since the first valid frame.
    Global,
    /// `IDLE_TIMEOUT` elapsed with no packets after LAST was seen.
    Idle,
}

#[derive(Debug, Error)]
pub enum XferError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("decompression failed: {0}")]
    Decompress(String),

    #[error("unknown compression mode: {0}")]
    UnknownCompressionMode(u8),

    #[error("data exceeds max_data for this frame (len={len}, max={max})")]
    DataTooLarge { len: usize, max: usize },

    #[error("transfer incomplete: {missing} packet(s) unacknowledged")]
    Incomplete { missing: usize },

    #[error("radio initialization failed: {0}")]
    RadioInit(String),

    #[error("transfer timed out ({0:?})")]
    Timeout(TimeoutKind),

    #[error("no data received")]
    NoData,

    #[error("configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, XferError>;
