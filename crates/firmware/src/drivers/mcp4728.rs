//! MCP4728 adapter
//!
//! Four-channel 12-bit DAC on I2C. All channels go out in a single
//! fast-write transaction: four big-endian value pairs with the command
//! bits clear, no register byte. Synchronous path only; the worker keeps
//! this chip on direct transfers.
//!
//! The adapter accepts the full per-DAC value bank and drives its four
//! outputs from the first four entries.

use embassy_time::Timer;

use pico_cv_core::channels::ChannelValue;
use pico_cv_core::config::{CHANNELS_PER_DAC, PROBE_ATTEMPTS, PROBE_SPACING_MS};
use pico_cv_core::time::TimeSource;
use pico_cv_core::transfer::{ErrorKind, TransferDescriptor};

use crate::drivers::{rescale, DacDriver};
use crate::platform::traits::{CvI2cBus, LatchPin};
use crate::transfer::TransferEngine;

/// Default 7-bit address (factory address bits 000).
pub const DEFAULT_ADDRESS: u8 = 0x60;

/// Chip full scale (12 bit).
const CHIP_MAX: u16 = 0x0FFF;

/// Physical channels on the chip.
const CHIP_CHANNELS: usize = 4;

/// MCP4728 behind a transfer engine and an LDAC latch pin.
pub struct Mcp4728<'e, B, C, P> {
    engine: &'e TransferEngine<B, C>,
    ldac: P,
    address: u8,
    initialized: bool,
}

impl<'e, B, C, P> Mcp4728<'e, B, C, P>
where
    B: CvI2cBus,
    C: TimeSource,
    P: LatchPin,
{
    pub fn new(engine: &'e TransferEngine<B, C>, ldac: P, address: u8) -> Self {
        Self {
            engine,
            ldac,
            address,
            initialized: false,
        }
    }

    /// Fast-write frame: `[hi, lo]` per channel, command bits 00.
    fn fast_write_frame(values: &[ChannelValue; CHANNELS_PER_DAC]) -> [u8; CHIP_CHANNELS * 2] {
        let mut frame = [0u8; CHIP_CHANNELS * 2];
        for channel in 0..CHIP_CHANNELS {
            let code = rescale(values[channel], CHIP_MAX);
            frame[channel * 2] = (code >> 8) as u8;
            frame[channel * 2 + 1] = (code & 0xFF) as u8;
        }
        frame
    }
}

impl<B, C, P> DacDriver for Mcp4728<'_, B, C, P>
where
    B: CvI2cBus,
    C: TimeSource,
    P: LatchPin,
{
    async fn initialize(&mut self) -> Result<(), ErrorKind> {
        self.ldac.set_low();

        // Probe with the zeroing fast-write itself: the first acknowledged
        // attempt also leaves all four outputs at zero.
        let zeros = [0u16; CHANNELS_PER_DAC];
        let frame = Self::fast_write_frame(&zeros);
        let mut attempt = 0;
        loop {
            match self
                .engine
                .transfer_sync(TransferDescriptor::write(self.address, 0, &frame)?)
                .await
            {
                Ok(()) => break,
                Err(_) if attempt < PROBE_ATTEMPTS => {
                    attempt += 1;
                    Timer::after_millis(PROBE_SPACING_MS).await;
                }
                Err(_) => return Err(ErrorKind::Uninitialized),
            }
        }

        self.initialized = true;
        Ok(())
    }

    fn enable(&mut self) {
        self.ldac.set_high();
    }

    fn disable(&mut self) {
        self.ldac.set_low();
    }

    async fn set_values(
        &mut self,
        values: &[ChannelValue; CHANNELS_PER_DAC],
    ) -> Result<(), ErrorKind> {
        if !self.initialized {
            return Err(ErrorKind::Uninitialized);
        }
        let frame = Self::fast_write_frame(values);
        self.engine
            .transfer_sync(TransferDescriptor::write(self.address, 0, &frame)?)
            .await
    }

    async fn reset_bus(&mut self) -> Result<(), ErrorKind> {
        self.engine.reset_bus().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::mock::{MockI2cBus, MockLatchPin, Transaction};
    use crate::time::EmbassyClock;
    use pico_cv_core::config::TransferConfig;

    fn engine() -> TransferEngine<MockI2cBus, EmbassyClock> {
        TransferEngine::new(MockI2cBus::new(), EmbassyClock, TransferConfig::new(DEFAULT_ADDRESS))
    }

    #[tokio::test]
    async fn fast_write_carries_four_channels() {
        let e = engine();
        let mut dac = Mcp4728::new(&e, MockLatchPin::new(), DEFAULT_ADDRESS);
        dac.initialize().await.unwrap();
        e.with_bus(|bus| bus.clear_transactions()).await;

        let mut values = [0u16; CHANNELS_PER_DAC];
        values[0] = 0x8000;
        values[3] = 0xFFFF;
        // Entries beyond the chip's four channels are ignored.
        values[4] = 0xAAAA;
        dac.set_values(&values).await.unwrap();

        e.with_bus(|bus| {
            let t = bus.transactions();
            assert_eq!(t.len(), 1);
            assert_eq!(
                t[0],
                Transaction::Write {
                    addr: DEFAULT_ADDRESS,
                    bytes: heapless::Vec::from_slice(&[
                        0x08, 0x00, // 0x8000 -> 0x800
                        0x00, 0x00,
                        0x00, 0x00,
                        0x0F, 0xFF, // full scale
                    ])
                    .unwrap(),
                }
            );
        })
        .await;
    }

    #[tokio::test]
    async fn no_async_support() {
        let e = engine();
        let mut dac = Mcp4728::new(&e, MockLatchPin::new(), DEFAULT_ADDRESS);
        assert!(!dac.supports_async());
        let values = [0u16; CHANNELS_PER_DAC];
        assert_eq!(dac.start_values_async(&values), Err(ErrorKind::InvalidArg));
        assert_eq!(dac.poll_async(), None);
    }
}
