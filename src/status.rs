// SPDX-License-Identifier: MIT OR Apache-2.0
//! The status-reporting seam between a transfer and whatever physical
//! indicators (LEDs, a button) an outer daemon wires up. No GPIO driver is
//! implemented here; that integration is explicitly out of scope.

/// High-level state the outer daemon cycles through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemState {
    Idle,
    Sending,
    Receiving,
    Completed,
    Error,
}

/// Receives `SystemState` transitions. A real daemon implements this against
/// GPIO; this crate ships only [`LogStatusSink`].
pub trait StatusSink {
    fn set_state(&mut self, state: SystemState);
}

/// Logs every transition at `info` instead of driving any hardware.
#[derive(Debug, Default)]
pub struct LogStatusSink;

impl StatusSink for LogStatusSink {
    fn set_state(&mut self, state: SystemState) {
        log::info!("status: {state:?}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_status_sink_accepts_every_state() {
        let mut sink = LogStatusSink;
        sink.set_state(SystemState::Idle);
        sink.set_state(SystemState::Sending);
        sink.set_state(SystemState::Receiving);
        sink.set_state(SystemState::Completed);
        sink.set_state(SystemState::Error);
    }
}
