//! RP2350 platform implementations
//!
//! Wraps the embassy-rp async I2C driver and GPIO outputs into the bridge
//! platform traits. Bus faults are collapsed through the embedded-hal
//! error taxonomy.

use embassy_rp::gpio::Output;
use embassy_rp::i2c::{Async, I2c, Instance};
use embassy_time::Timer;
use embedded_hal::i2c::Error as _;
use embedded_hal_async::i2c::I2c as _;

use crate::platform::error::I2cBusError;
use crate::platform::traits::{CvI2cBus, LatchPin};

/// One RP2350 I2C controller in async (interrupt-driven) mode.
pub struct RpI2cBus<'d, T: Instance> {
    i2c: I2c<'d, T, Async>,
}

impl<'d, T: Instance> RpI2cBus<'d, T> {
    pub fn new(i2c: I2c<'d, T, Async>) -> Self {
        Self { i2c }
    }
}

impl<T: Instance> CvI2cBus for RpI2cBus<'_, T> {
    async fn write(&mut self, addr: u8, bytes: &[u8]) -> Result<(), I2cBusError> {
        self.i2c
            .write(addr, bytes)
            .await
            .map_err(|e| I2cBusError::from(e.kind()))
    }

    async fn write_read(
        &mut self,
        addr: u8,
        wr: &[u8],
        rd: &mut [u8],
    ) -> Result<(), I2cBusError> {
        self.i2c
            .write_read(addr, wr, rd)
            .await
            .map_err(|e| I2cBusError::from(e.kind()))
    }

    async fn reset(&mut self) -> Result<(), I2cBusError> {
        // The RP2350 I2C block re-arms on the next START after an abort;
        // give the bus one quiet millisecond to settle.
        Timer::after_millis(1).await;
        Ok(())
    }
}

impl LatchPin for Output<'_> {
    fn set_high(&mut self) {
        Output::set_high(self);
    }

    fn set_low(&mut self) {
        Output::set_low(self);
    }
}
