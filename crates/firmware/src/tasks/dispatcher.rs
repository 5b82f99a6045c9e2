//! Dispatcher task
//!
//! Continuously moves fresh input values into the per-DAC output slices
//! and publishes update sequences. The dispatcher never blocks on a
//! worker and never touches a driver or the transfer engine.

use embassy_futures::yield_now;

use crate::bridge::Bridge;

pub async fn run(bridge: &Bridge) -> ! {
    crate::log_info!("dispatcher task started");
    loop {
        bridge.dispatch().await;
        yield_now().await;
    }
}
