//! Transfer timeout watchdog
//!
//! Subordinate task that bounds the lifetime of in-flight transfers. The
//! engine's own wire operations already run under a timeout; this task
//! catches the cases where the wire future itself never resolves and the
//! worker would otherwise poll forever.

use embassy_time::Timer;

use pico_cv_core::config::TIMEOUT_CHECK_DIVISOR;
use pico_cv_core::time::TimeSource;

use crate::platform::traits::CvI2cBus;
use crate::transfer::TransferEngine;

/// Watch one engine for stale transfers.
///
/// Checks at `timeout / TIMEOUT_CHECK_DIVISOR` intervals, so a stuck
/// transfer is force-completed no later than 1.2x the configured timeout.
pub async fn run<B, C>(engine: &TransferEngine<B, C>) -> !
where
    B: CvI2cBus,
    C: TimeSource,
{
    let interval_ms = (engine.config().timeout_ms / TIMEOUT_CHECK_DIVISOR).max(1);
    loop {
        if engine.check_timeout() {
            crate::log_warn!("i2c transfer exceeded timeout; forcing completion");
        }
        Timer::after_millis(interval_ms).await;
    }
}
