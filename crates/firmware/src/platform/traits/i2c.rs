//! I2C bus interface trait
//!
//! Platform implementations provide this interface for I2C master access.
//! Each bus instance has exactly one owner (its transfer engine); there is
//! never concurrent access to the same bus from multiple contexts.

use crate::platform::error::I2cBusError;

/// I2C master interface.
///
/// # Safety Invariants
///
/// - The peripheral is initialized before the first transaction
/// - One owner per bus instance; the transfer engine serializes access
/// - Addresses are 7-bit
pub trait CvI2cBus {
    /// Complete write transaction: START - ADDR(W) - DATA - STOP.
    ///
    /// An empty `bytes` slice performs an address-only ack probe.
    async fn write(&mut self, addr: u8, bytes: &[u8]) -> Result<(), I2cBusError>;

    /// Combined write-read with a repeated START:
    /// START - ADDR(W) - WR - REPEATED_START - ADDR(R) - RD - STOP.
    ///
    /// Used to select a register and read it back in one transaction.
    async fn write_read(
        &mut self,
        addr: u8,
        wr: &[u8],
        rd: &mut [u8],
    ) -> Result<(), I2cBusError>;

    /// Recover the bus after a fault: deinitialize and reinitialize the
    /// peripheral. Implementations without a true reinit path may settle
    /// for a bus-idle wait.
    async fn reset(&mut self) -> Result<(), I2cBusError>;
}

