//! Refresh watchdog task
//!
//! Republishes every DAC on a fixed period regardless of MIDI traffic.
//! This bounds output staleness, recovers lost wakeups, and guarantees
//! forward progress after any transient bus fault.

use embassy_time::Timer;

use pico_cv_core::config::FORCE_REFRESH_EVERY_MS;

use crate::bridge::Bridge;

pub async fn run(bridge: &Bridge) -> ! {
    crate::log_info!("refresh watchdog started");
    loop {
        bridge.request_refresh_all();
        Timer::after_millis(FORCE_REFRESH_EVERY_MS).await;
    }
}
