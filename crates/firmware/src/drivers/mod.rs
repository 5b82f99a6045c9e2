//! DAC driver adapters
//!
//! Each adapter translates a full bank of 16-bit channel values into the
//! chip's register frames and issues them through its transfer engine.
//! `set_values` is the only hot-path operation; everything else is setup
//! or the LDAC bracket.

pub mod ad5593r;
pub mod mcp4728;
pub mod mock;

pub use ad5593r::Ad5593r;
pub use mcp4728::Mcp4728;
pub use mock::MockDacDriver;

use pico_cv_core::channels::ChannelValue;
use pico_cv_core::config::CHANNELS_PER_DAC;
use pico_cv_core::transfer::ErrorKind;

/// One physical multi-channel DAC behind an LDAC latch.
///
/// The worker brackets every transfer with `enable`/`disable`; between
/// the two, all channels of the chip update simultaneously when the latch
/// releases. Drivers with DMA-capable buses additionally expose the
/// asynchronous path; the worker selects it at runtime unless the DAC is
/// in sync fallback.
pub trait DacDriver {
    /// Bind to the hardware. Probes the chip (bounded retries with
    /// spacing), configures all channels for DAC operation, and zeroes
    /// them. Returns `Uninitialized` when the chip never answers.
    async fn initialize(&mut self) -> Result<(), ErrorKind>;

    /// Drive the LDAC line high: hold analog outputs while registers load.
    fn enable(&mut self);

    /// Drive the LDAC line low: release the latch, outputs update.
    fn disable(&mut self);

    /// Write all channels synchronously. Blocks (cooperatively) until the
    /// wire traffic finishes.
    async fn set_values(
        &mut self,
        values: &[ChannelValue; CHANNELS_PER_DAC],
    ) -> Result<(), ErrorKind>;

    /// Whether the asynchronous path is available at all.
    fn supports_async(&self) -> bool {
        false
    }

    /// Start an asynchronous all-channel write. `Busy` while one is in
    /// flight; `InvalidArg` when the driver has no async support.
    fn start_values_async(
        &mut self,
        _values: &[ChannelValue; CHANNELS_PER_DAC],
    ) -> Result<(), ErrorKind> {
        Err(ErrorKind::InvalidArg)
    }

    /// Completion status of the asynchronous write, consumed once.
    fn poll_async(&mut self) -> Option<Result<(), ErrorKind>> {
        None
    }

    /// Reset the underlying bus (RecoveryAction::ResetPeripheral).
    async fn reset_bus(&mut self) -> Result<(), ErrorKind>;
}

/// Exact 16-bit to chip-resolution rescale. 32-bit multiply-shift, no
/// floating point: half scale lands exactly on the chip's half scale
/// (`0x8000` -> `0x800` at 12 bits).
pub(crate) fn rescale(value: ChannelValue, chip_max: u16) -> u16 {
    ((value as u32 * (chip_max as u32 + 1)) >> 16) as u16
}
