//! Embassy-backed time source
//!
//! Implements `pico_cv_core::time::TimeSource` over the Embassy time
//! driver so core logic stamps events with real time on target and in the
//! host test suite (std time driver).

use pico_cv_core::time::TimeSource;

/// Time source reading `embassy_time::Instant`.
#[derive(Clone, Copy, Default)]
pub struct EmbassyClock;

impl TimeSource for EmbassyClock {
    fn now_ms(&self) -> u64 {
        embassy_time::Instant::now().as_millis()
    }

    fn now_us(&self) -> u64 {
        embassy_time::Instant::now().as_micros()
    }
}
