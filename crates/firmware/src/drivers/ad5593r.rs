//! AD5593R adapter
//!
//! Eight-channel 12-bit DAC on I2C. The DAC write pointer is
//! `0x10 | channel` followed by two big-endian data bytes; the adapter
//! batches all eight channels into a single frame on the asynchronous
//! path and falls back to per-channel register writes on the synchronous
//! path.

use embassy_time::Timer;

use pico_cv_core::channels::ChannelValue;
use pico_cv_core::config::{CHANNELS_PER_DAC, PROBE_ATTEMPTS, PROBE_SPACING_MS};
use pico_cv_core::time::TimeSource;
use pico_cv_core::transfer::{ErrorKind, TransferDescriptor};

use crate::drivers::{rescale, DacDriver};
use crate::platform::traits::{CvI2cBus, LatchPin};
use crate::transfer::TransferEngine;

/// Default 7-bit address with A0 low.
pub const DEFAULT_ADDRESS: u8 = 0x10;

/// Chip full scale (12 bit).
const CHIP_MAX: u16 = 0x0FFF;

/// DAC write pointer base; `0x10 | channel` selects the channel register.
const REG_DAC_WRITE: u8 = 0x10;

/// Pin configuration register: which pins act as DAC outputs.
const REG_DAC_PIN_CONFIG: u8 = 0x05;

/// Readback pointer for the general-purpose control register; used as the
/// presence probe because the chip answers it from power-on defaults.
const REG_READBACK_GP_CTRL: u8 = 0x73;

/// AD5593R behind a transfer engine and an LDAC latch pin.
pub struct Ad5593r<'e, B, C, P> {
    engine: &'e TransferEngine<B, C>,
    ldac: P,
    address: u8,
    initialized: bool,
}

impl<'e, B, C, P> Ad5593r<'e, B, C, P>
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

    fn value_frame(value: ChannelValue) -> [u8; 2] {
        rescale(value, CHIP_MAX).to_be_bytes()
    }

    async fn write_register(&self, register: u8, payload: &[u8]) -> Result<(), ErrorKind> {
        let descriptor = TransferDescriptor::write(self.address, register, payload)?;
        self.engine.transfer_sync(descriptor).await
    }
}

impl<B, C, P> DacDriver for Ad5593r<'_, B, C, P>
where
    B: CvI2cBus,
    C: TimeSource,
    P: LatchPin,
{
    async fn initialize(&mut self) -> Result<(), ErrorKind> {
        self.ldac.set_low();

        // Probe a readback register until the chip acknowledges.
        let mut attempt = 0;
        let mut readback = [0u8; 2];
        loop {
            match self
                .engine
                .read_register(self.address, REG_READBACK_GP_CTRL, &mut readback)
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

        // All eight pins as DAC outputs.
        self.write_register(REG_DAC_PIN_CONFIG, &[0x00, 0xFF]).await?;

        // Zero every channel before the latch first releases.
        for channel in 0..CHANNELS_PER_DAC {
            self.write_register(REG_DAC_WRITE | channel as u8, &[0x00, 0x00])
                .await?;
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
        for (channel, &value) in values.iter().enumerate() {
            let bytes = Self::value_frame(value);
            self.write_register(REG_DAC_WRITE | channel as u8, &bytes)
                .await?;
        }
        Ok(())
    }

    fn supports_async(&self) -> bool {
        true
    }

    fn start_values_async(
        &mut self,
        values: &[ChannelValue; CHANNELS_PER_DAC],
    ) -> Result<(), ErrorKind> {
        if !self.initialized {
            return Err(ErrorKind::Uninitialized);
        }
        // One batched frame: [pointer, hi, lo] per channel. The zero
        // descriptor register means the payload carries its own framing.
        let mut frame = [0u8; CHANNELS_PER_DAC * 3];
        for (channel, &value) in values.iter().enumerate() {
            let bytes = Self::value_frame(value);
            frame[channel * 3] = REG_DAC_WRITE | channel as u8;
            frame[channel * 3 + 1] = bytes[0];
            frame[channel * 3 + 2] = bytes[1];
        }
        self.engine
            .submit(TransferDescriptor::write(self.address, 0, &frame)?)
    }

    fn poll_async(&mut self) -> Option<Result<(), ErrorKind>> {
        self.engine.poll_completion()
    }

    async fn reset_bus(&mut self) -> Result<(), ErrorKind> {
        self.engine.reset_bus().await
    }
}
