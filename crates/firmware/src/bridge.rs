//! The bridge singleton
//!
//! One [`Bridge`] value owns the whole pipeline state: the input channel
//! bank written by ingress, one output value slice plus update state per
//! DAC, and the shared recovery policy. Tasks borrow it through a shared
//! reference; all interior locking follows the documented discipline:
//!
//! - `input`: blocking mutex, written by ingress, read by the dispatcher
//! - per-DAC `values`: async mutex; the dispatcher only ever `try_lock`s
//!   (it never blocks on a worker), the worker takes a bounded `lock`
//! - per-DAC `state`: blocking mutex around the update-sequence machine
//! - `recovery`: blocking mutex; workers never hold it together with a
//!   state lock

use core::cell::RefCell;

use embassy_futures::yield_now;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex as BlockingMutex;
use embassy_sync::mutex::Mutex;

use pico_cv_core::channels::{slice_differs, ChannelBank, ChannelValue};
use pico_cv_core::config::{RecoveryConfig, CHANNELS_PER_DAC, DAC_COUNT};
use pico_cv_core::dac::DacUpdateState;
use pico_cv_core::recovery::{ErrorSeverity, RecoveryAction, RecoveryPolicy};
use pico_cv_core::transfer::ErrorKind;

/// Shared state for one DAC.
pub struct DacShared {
    /// Published output values for this DAC's channel span.
    values: Mutex<CriticalSectionRawMutex, [ChannelValue; CHANNELS_PER_DAC]>,
    /// Update-sequence handshake between dispatcher/watchdog and worker.
    state: BlockingMutex<CriticalSectionRawMutex, RefCell<DacUpdateState>>,
}

impl DacShared {
    const fn new() -> Self {
        Self {
            values: Mutex::new([0; CHANNELS_PER_DAC]),
            state: BlockingMutex::new(RefCell::new(DacUpdateState::new())),
        }
    }
}

/// Top-level pipeline state, constructed once at boot.
pub struct Bridge {
    input: BlockingMutex<CriticalSectionRawMutex, RefCell<ChannelBank>>,
    dacs: [DacShared; DAC_COUNT],
    recovery: BlockingMutex<CriticalSectionRawMutex, RefCell<RecoveryPolicy>>,
}

impl Bridge {
    pub const fn new() -> Self {
        Self {
            input: BlockingMutex::new(RefCell::new(ChannelBank::new())),
            dacs: [const { DacShared::new() }; DAC_COUNT],
            recovery: BlockingMutex::new(RefCell::new(RecoveryPolicy::new(
                RecoveryConfig::defaults(),
            ))),
        }
    }

    // ------------------------------------------------------------------
    // Ingress side
    // ------------------------------------------------------------------

    /// Store a scaled channel value into the input bank.
    pub fn write_input(&self, index: usize, value: ChannelValue) {
        self.input.lock(|bank| bank.borrow_mut().write(index, value));
    }

    /// Read back an input cell (tests, telemetry).
    pub fn read_input(&self, index: usize) -> ChannelValue {
        self.input.lock(|bank| bank.borrow().read(index))
    }

    // ------------------------------------------------------------------
    // Dispatcher side
    // ------------------------------------------------------------------

    /// One dispatch round: for every DAC, try to move fresh input values
    /// into its output slice and publish an update.
    ///
    /// Never blocks: a slice whose worker currently holds the lock is
    /// skipped this round; the next round or the refresh watchdog covers
    /// it. A slice equal to the current output is not republished.
    pub async fn dispatch(&self) {
        for dac_index in 0..DAC_COUNT {
            if let Ok(mut output) = self.dacs[dac_index].values.try_lock() {
                let fresh = self.input.lock(|bank| bank.borrow().dac_values(dac_index));
                if slice_differs(&fresh, &output) {
                    *output = fresh;
                    drop(output);
                    self.request_update(dac_index);
                }
            }
            yield_now().await;
        }
    }

    /// Publish an update request for one DAC.
    pub fn request_update(&self, dac_index: usize) {
        self.dacs[dac_index]
            .state
            .lock(|state| state.borrow_mut().request_update());
    }

    /// Refresh watchdog entry point: republish every DAC unconditionally.
    pub fn request_refresh_all(&self) {
        for dac_index in 0..DAC_COUNT {
            self.request_update(dac_index);
        }
    }

    // ------------------------------------------------------------------
    // Worker side
    // ------------------------------------------------------------------

    /// Observe pending work for a DAC; marks the iteration in progress.
    pub fn begin_update(&self, dac_index: usize) -> Option<u32> {
        self.dacs[dac_index]
            .state
            .lock(|state| state.borrow_mut().begin_update())
    }

    /// Commit or abandon an observed sequence.
    pub fn finish_update(&self, dac_index: usize, observed_sequence: u32, success: bool) {
        self.dacs[dac_index].state.lock(|state| {
            state
                .borrow_mut()
                .finish_update(observed_sequence, success)
        });
    }

    /// Snapshot the DAC's output slice under its lock.
    pub async fn snapshot(&self, dac_index: usize) -> [ChannelValue; CHANNELS_PER_DAC] {
        *self.dacs[dac_index].values.lock().await
    }

    pub fn fallback_mode(&self, dac_index: usize) -> bool {
        self.dacs[dac_index]
            .state
            .lock(|state| state.borrow().fallback_mode())
    }

    /// Enter sync fallback for a DAC and account for it.
    pub fn enter_fallback(&self, dac_index: usize) {
        self.dacs[dac_index]
            .state
            .lock(|state| state.borrow_mut().enter_fallback());
        self.recovery
            .lock(|policy| policy.borrow_mut().note_fallback());
    }

    // ------------------------------------------------------------------
    // Recovery plumbing
    // ------------------------------------------------------------------

    /// Count one completed transfer attempt.
    pub fn record_operation(&self) {
        self.recovery
            .lock(|policy| policy.borrow_mut().record_operation());
    }

    /// Success notification. Clears the DAC's fallback flag (and reports
    /// `true`) once the recovery streak is reached.
    pub fn notify_success(&self, dac_index: usize, in_fallback: bool) -> bool {
        let clear = self
            .recovery
            .lock(|policy| policy.borrow_mut().notify_success(dac_index, in_fallback));
        if clear {
            self.dacs[dac_index]
                .state
                .lock(|state| state.borrow_mut().leave_fallback());
        }
        clear
    }

    /// Classify a failed transfer; returns severity and the action to
    /// execute.
    pub fn handle_error(
        &self,
        dac_index: usize,
        kind: ErrorKind,
        retry_count: u8,
        now_us: u64,
    ) -> (ErrorSeverity, RecoveryAction) {
        self.recovery.lock(|policy| {
            policy
                .borrow_mut()
                .handle_error(dac_index, kind, retry_count, now_us)
        })
    }

    pub fn backoff_delay_ms(&self, retry_count: u8) -> u32 {
        self.recovery
            .lock(|policy| policy.borrow_mut().backoff_delay_ms(retry_count))
    }

    /// Account a completed peripheral reset.
    pub fn note_reset(&self, dac_index: usize) {
        self.recovery
            .lock(|policy| policy.borrow_mut().note_reset(dac_index));
    }

    /// Run a closure against the recovery policy (telemetry, tests).
    pub fn with_recovery<R>(&self, f: impl FnOnce(&RecoveryPolicy) -> R) -> R {
        self.recovery.lock(|policy| f(&policy.borrow()))
    }

    /// Sequence numbers for one DAC (telemetry, tests).
    pub fn sequences(&self, dac_index: usize) -> (u32, u32) {
        self.dacs[dac_index].state.lock(|state| {
            let state = state.borrow();
            (state.update_sequence(), state.last_processed_sequence())
        })
    }
}

impl Default for Bridge {
    fn default() -> Self {
        Self::new()
    }
}
