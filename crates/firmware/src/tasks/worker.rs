//! Per-DAC worker task
//!
//! The worker is the only task that issues transfers for its DAC. One
//! iteration: observe the update sequence under the state mutex, snapshot
//! the output slice under the channel lock, bracket the transfer with the
//! LDAC latch, then commit the observed sequence only if the transfer
//! succeeded. A failure leaves the sequence pending, so the next pass
//! retries with the newest published values.
//!
//! Failed attempts run through the recovery policy. The retry loop issues
//! at most `max_retry_attempts + 1` attempts per update before the policy
//! degrades the DAC to sync fallback or resets the peripheral.

use embassy_futures::yield_now;
use embassy_time::Timer;

use pico_cv_core::channels::ChannelValue;
use pico_cv_core::config::{CHANNELS_PER_DAC, FORCE_REFRESH_EVERY_MS};
use pico_cv_core::recovery::RecoveryAction;
use pico_cv_core::time::TimeSource;
use pico_cv_core::transfer::ErrorKind;

use crate::bridge::Bridge;
use crate::drivers::DacDriver;

pub async fn run<D, C>(bridge: &Bridge, dac_index: usize, mut driver: D, clock: C) -> !
where
    D: DacDriver,
    C: TimeSource,
{
    crate::log_info!("dac worker {} started", dac_index);
    loop {
        let Some(observed) = bridge.begin_update(dac_index) else {
            yield_now().await;
            continue;
        };

        let snapshot = bridge.snapshot(dac_index).await;
        let success = transfer_with_recovery(bridge, dac_index, &mut driver, &clock, &snapshot).await;
        bridge.finish_update(dac_index, observed, success);

        yield_now().await;
    }
}

/// One update: transfer the snapshot, driving the recovery policy on
/// failures until the attempt succeeds or the policy degrades.
async fn transfer_with_recovery<D, C>(
    bridge: &Bridge,
    dac_index: usize,
    driver: &mut D,
    clock: &C,
    values: &[ChannelValue; CHANNELS_PER_DAC],
) -> bool
where
    D: DacDriver,
    C: TimeSource,
{
    let mut retry_count: u8 = 0;
    loop {
        let in_fallback = bridge.fallback_mode(dac_index);
        let use_async = driver.supports_async() && !in_fallback;

        driver.enable();
        let result = if use_async {
            match driver.start_values_async(values) {
                Ok(()) => await_async_completion(driver).await,
                Err(kind) => Err(kind),
            }
        } else {
            driver.set_values(values).await
        };
        driver.disable();

        bridge.record_operation();

        let kind = match result {
            Ok(()) => {
                if bridge.notify_success(dac_index, in_fallback) {
                    crate::log_info!("dac {} recovered, async path re-enabled", dac_index);
                }
                return true;
            }
            Err(kind) => kind,
        };

        let (severity, action) = bridge.handle_error(dac_index, kind, retry_count, clock.now_us());
        crate::log_warn!(
            "dac {} transfer failed: {} (retry {}, severity {:?}, action {:?})",
            dac_index,
            kind.as_str(),
            retry_count,
            severity,
            action
        );

        match action {
            RecoveryAction::RetryNow => {
                retry_count += 1;
            }
            RecoveryAction::RetryWithBackoff => {
                let delay_ms = bridge.backoff_delay_ms(retry_count);
                retry_count += 1;
                Timer::after_millis(delay_ms as u64).await;
            }
            RecoveryAction::FallbackSync => {
                bridge.enter_fallback(dac_index);
                crate::log_warn!("dac {} degraded to sync fallback", dac_index);
                return false;
            }
            RecoveryAction::ResetPeripheral => {
                if driver.reset_bus().await.is_err() {
                    crate::log_error!("dac {} bus reset failed", dac_index);
                }
                bridge.note_reset(dac_index);
                bridge.enter_fallback(dac_index);
                crate::log_warn!("dac {} peripheral reset", dac_index);
                return false;
            }
            RecoveryAction::Escalate => {
                crate::log_error!(
                    "dac {} unrecoverable error: {}; parking for one refresh period",
                    dac_index,
                    kind.as_str()
                );
                Timer::after_millis(FORCE_REFRESH_EVERY_MS).await;
                return false;
            }
            RecoveryAction::None => return false,
        }
    }
}

/// Poll the driver's asynchronous completion with explicit yields.
async fn await_async_completion<D: DacDriver>(driver: &mut D) -> Result<(), ErrorKind> {
    loop {
        if let Some(result) = driver.poll_async() {
            return result;
        }
        yield_now().await;
    }
}
