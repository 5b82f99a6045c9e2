//! Transfer state machine states, error taxonomy, and descriptors
//!
//! The transfer engine in the firmware crate drives these types; they live
//! here so the recovery policy and the host tests share one vocabulary.

use heapless::Vec;

use crate::config::FRAME_CAPACITY;

/// Lifecycle of one asynchronous transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransferState {
    Idle,
    InProgress,
    Completed,
    TimedOut,
    NakReceived,
    ArbitrationLost,
    BusFailure,
}

impl TransferState {
    /// True once the transfer can no longer change state on its own.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TransferState::Idle | TransferState::InProgress)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransferState::Idle => "idle",
            TransferState::InProgress => "in-progress",
            TransferState::Completed => "completed",
            TransferState::TimedOut => "timed-out",
            TransferState::NakReceived => "nak-received",
            TransferState::ArbitrationLost => "arbitration-lost",
            TransferState::BusFailure => "bus-failure",
        }
    }
}

/// Outcome taxonomy for every adapter and engine operation.
///
/// Errors are values; nothing in the pipeline panics on a bus fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ErrorKind {
    Success,
    /// A transfer is already in flight on this engine.
    Busy,
    Timeout,
    /// Slave did not acknowledge.
    Nak,
    /// Lost bus arbitration to another master.
    Arbitration,
    BusError,
    /// Malformed request; programmer error.
    InvalidArg,
    /// Operation attempted before `initialize` succeeded.
    Uninitialized,
}

impl ErrorKind {
    /// Terminal transfer state corresponding to this error.
    pub fn terminal_state(&self) -> TransferState {
        match self {
            ErrorKind::Success => TransferState::Completed,
            ErrorKind::Timeout => TransferState::TimedOut,
            ErrorKind::Nak => TransferState::NakReceived,
            ErrorKind::Arbitration => TransferState::ArbitrationLost,
            ErrorKind::Busy
            | ErrorKind::BusError
            | ErrorKind::InvalidArg
            | ErrorKind::Uninitialized => TransferState::BusFailure,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Success => "success",
            ErrorKind::Busy => "busy",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Nak => "nak",
            ErrorKind::Arbitration => "arbitration",
            ErrorKind::BusError => "bus-error",
            ErrorKind::InvalidArg => "invalid-arg",
            ErrorKind::Uninitialized => "uninitialized",
        }
    }
}

/// Direction of a transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Direction {
    Write,
    /// Write the register byte, repeated-start, read `read_len` bytes.
    Read { read_len: usize },
}

/// One transfer request handed to the engine.
///
/// Write frames prepend `register` as the first wire byte when it is
/// non-zero; a zero register means the payload already carries its own
/// register framing (batched DAC writes).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferDescriptor {
    /// 7-bit slave address; zero means the engine's configured default.
    pub address: u8,
    pub register: u8,
    pub payload: Vec<u8, FRAME_CAPACITY>,
    pub direction: Direction,
}

impl TransferDescriptor {
    /// Write descriptor. Fails with `InvalidArg` when the payload exceeds
    /// the frame capacity.
    pub fn write(address: u8, register: u8, payload: &[u8]) -> Result<Self, ErrorKind> {
        let payload = Vec::from_slice(payload).map_err(|_| ErrorKind::InvalidArg)?;
        Ok(Self {
            address,
            register,
            payload,
            direction: Direction::Write,
        })
    }

    /// Register-read descriptor.
    pub fn read(address: u8, register: u8, read_len: usize) -> Self {
        Self {
            address,
            register,
            payload: Vec::new(),
            direction: Direction::Read { read_len },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states() {
        assert!(!TransferState::Idle.is_terminal());
        assert!(!TransferState::InProgress.is_terminal());
        assert!(TransferState::Completed.is_terminal());
        assert!(TransferState::TimedOut.is_terminal());
        assert!(TransferState::BusFailure.is_terminal());
    }

    #[test]
    fn error_to_state_mapping() {
        assert_eq!(ErrorKind::Success.terminal_state(), TransferState::Completed);
        assert_eq!(ErrorKind::Timeout.terminal_state(), TransferState::TimedOut);
        assert_eq!(ErrorKind::Nak.terminal_state(), TransferState::NakReceived);
        assert_eq!(
            ErrorKind::Arbitration.terminal_state(),
            TransferState::ArbitrationLost
        );
        assert_eq!(ErrorKind::BusError.terminal_state(), TransferState::BusFailure);
    }

    #[test]
    fn oversized_write_is_rejected() {
        let too_big = [0u8; FRAME_CAPACITY + 1];
        assert_eq!(
            TransferDescriptor::write(0x10, 0, &too_big).unwrap_err(),
            ErrorKind::InvalidArg
        );
    }

    #[test]
    fn write_descriptor_carries_payload() {
        let desc = TransferDescriptor::write(0x10, 0x15, &[0xAB, 0xCD]).unwrap();
        assert_eq!(desc.register, 0x15);
        assert_eq!(desc.payload.as_slice(), &[0xAB, 0xCD]);
        assert_eq!(desc.direction, Direction::Write);
    }
}
