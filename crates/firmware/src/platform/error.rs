//! Platform error types
//!
//! Bus implementations map their HAL-specific errors to [`I2cBusError`];
//! the transfer engine maps those into the pipeline-wide
//! [`pico_cv_core::transfer::ErrorKind`] taxonomy.

use core::fmt;

use pico_cv_core::transfer::ErrorKind;

/// I2C bus faults as reported by a platform bus implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum I2cBusError {
    /// No acknowledgment received
    Nack,
    /// Arbitration lost to another master
    ArbitrationLost,
    /// Bus-level fault (stuck lines, protocol violation, overrun)
    BusError,
    /// The bus itself reported a timeout
    Timeout,
}

impl fmt::Display for I2cBusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            I2cBusError::Nack => write!(f, "no acknowledge"),
            I2cBusError::ArbitrationLost => write!(f, "arbitration lost"),
            I2cBusError::BusError => write!(f, "bus error"),
            I2cBusError::Timeout => write!(f, "bus timeout"),
        }
    }
}

impl From<I2cBusError> for ErrorKind {
    fn from(error: I2cBusError) -> Self {
        match error {
            I2cBusError::Nack => ErrorKind::Nak,
            I2cBusError::ArbitrationLost => ErrorKind::Arbitration,
            I2cBusError::BusError => ErrorKind::BusError,
            I2cBusError::Timeout => ErrorKind::Timeout,
        }
    }
}

impl From<embedded_hal::i2c::ErrorKind> for I2cBusError {
    fn from(kind: embedded_hal::i2c::ErrorKind) -> Self {
        use embedded_hal::i2c::ErrorKind as Hal;
        match kind {
            Hal::NoAcknowledge(_) => I2cBusError::Nack,
            Hal::ArbitrationLoss => I2cBusError::ArbitrationLost,
            Hal::Bus | Hal::Overrun => I2cBusError::BusError,
            _ => I2cBusError::BusError,
        }
    }
}
