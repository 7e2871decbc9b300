// SPDX-License-Identifier: MIT OR Apache-2.0
//! File transfer protocol for a 32-byte fixed-payload half-duplex radio
//! link, such as an nRF24L01+ driven with hardware auto-ACK and dynamic
//! payloads. `nrf_xfer::sender::send_file` and `nrf_xfer::receiver::receive_file`
//! drive the two ends of a transfer against anything implementing the
//! [`radio::Radio`] trait; [`radio::SimRadio`] provides an in-memory link for
//! testing without hardware.
//!
//! The usage can be described in the high-level with the following flow:
//!
//! 1. Open a [`radio::Radio`] (a driver for real hardware, or
//!    [`radio::SimRadio::pair`] for testing).
//! 2. Call [`sender::send_file`] on one end and [`receiver::receive_file`] on
//!    the other.
//! 3. Inspect the returned [`sender::TransferReport`] or
//!    [`receiver::ReceiveReport`] for completeness and throughput.
//!
//! Every frame is exactly [`constants::FRAME_SIZE`] bytes; [`compress`]
//! shrinks the payload before chunking, and [`fec`] optionally trades some of
//! that payload for Reed-Solomon parity tolerant of a couple of flipped
//! bytes per frame.

#![deny(clippy::all)]

pub mod compress;
pub mod config;
pub mod constants;
pub mod error;
pub mod fec;
pub mod frame;
pub mod radio;
pub mod receiver;
pub mod sender;
pub mod status;

pub use error::{Result, XferError};
pub use receiver::{receive_file, ReceiveReport};
pub use sender::{send_file, TransferReport};
