//! Transfer engine state machine
//!
//! The engine owns its bus exclusively. An asynchronous transfer moves
//! Idle -> InProgress -> {Completed, TimedOut, NakReceived,
//! ArbitrationLost, BusFailure}; the submitting worker observes the
//! outcome through [`TransferEngine::poll_completion`] rather than a
//! callback on its own stack. At most one transfer is in flight per
//! engine; a second submit fails with `Busy`.
//!
//! The engine never retries. Retry, fallback, and reset are recovery
//! policy decisions made by the worker.

use core::cell::RefCell;

use embassy_futures::yield_now;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex as BlockingMutex;
use embassy_sync::mutex::Mutex;
use embassy_sync::signal::Signal;
use embassy_time::{with_timeout, Duration};
use heapless::Vec;

use pico_cv_core::config::{TransferConfig, WIRE_FRAME_CAPACITY};
use pico_cv_core::time::TimeSource;
use pico_cv_core::transfer::{Direction, ErrorKind, TransferDescriptor, TransferState};

struct EngineInner {
    state: TransferState,
    last_error: ErrorKind,
    started_us: u64,
    /// Sequence of the accepted submit; guards against a stale wire
    /// operation completing a newer transfer after a forced timeout.
    submit_seq: u32,
    pending: Option<(u32, TransferDescriptor)>,
    completion: Option<Result<(), ErrorKind>>,
}

/// Asynchronous transfer engine for one I2C bus.
pub struct TransferEngine<B, C> {
    bus: Mutex<CriticalSectionRawMutex, B>,
    inner: BlockingMutex<CriticalSectionRawMutex, RefCell<EngineInner>>,
    doorbell: Signal<CriticalSectionRawMutex, ()>,
    clock: C,
    config: TransferConfig,
}

impl<B, C> TransferEngine<B, C>
where
    B: crate::platform::traits::CvI2cBus,
    C: TimeSource,
{
    pub const fn new(bus: B, clock: C, config: TransferConfig) -> Self {
        Self {
            bus: Mutex::new(bus),
            inner: BlockingMutex::new(RefCell::new(EngineInner {
                state: TransferState::Idle,
                last_error: ErrorKind::Success,
                started_us: 0,
                submit_seq: 0,
                pending: None,
                completion: None,
            })),
            doorbell: Signal::new(),
            clock,
            config,
        }
    }

    pub fn config(&self) -> &TransferConfig {
        &self.config
    }

    /// The clock this engine stamps and ages transfers with.
    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Submit an asynchronous transfer.
    ///
    /// Fails with `Busy` while another transfer is in flight. On success
    /// the state latches to `InProgress` and the service loop picks the
    /// frame up; the caller observes the outcome via
    /// [`Self::poll_completion`]. A zero descriptor address selects the
    /// engine's configured default.
    pub fn submit(&self, mut descriptor: TransferDescriptor) -> Result<(), ErrorKind> {
        if descriptor.address == 0 {
            descriptor.address = self.config.address;
        }
        let now = self.clock.now_us();
        self.inner.lock(|inner| {
            let mut inner = inner.borrow_mut();
            if inner.state == TransferState::InProgress {
                return Err(ErrorKind::Busy);
            }
            inner.submit_seq = inner.submit_seq.wrapping_add(1);
            inner.state = TransferState::InProgress;
            inner.last_error = ErrorKind::Success;
            inner.started_us = now;
            inner.completion = None;
            inner.pending = Some((inner.submit_seq, descriptor));
            Ok(())
        })?;
        self.doorbell.signal(());
        Ok(())
    }

    /// The engine service loop. Runs for the lifetime of the bus; spawned
    /// as a task on target and driven under `select` in host tests.
    pub async fn run(&self) -> ! {
        loop {
            self.doorbell.wait().await;
            let Some((seq, descriptor)) =
                self.inner.lock(|inner| inner.borrow_mut().pending.take())
            else {
                continue;
            };
            let result = self.perform(&descriptor).await;
            self.complete(seq, result);
        }
    }

    /// Perform one wire operation under the configured timeout.
    async fn perform(&self, descriptor: &TransferDescriptor) -> Result<(), ErrorKind> {
        let timeout = Duration::from_millis(self.config.timeout_ms);
        let mut bus = self.bus.lock().await;
        let op = async {
            match descriptor.direction {
                Direction::Write => {
                    let mut frame: Vec<u8, WIRE_FRAME_CAPACITY> = Vec::new();
                    if descriptor.register != 0 {
                        frame.push(descriptor.register).map_err(|_| ErrorKind::InvalidArg)?;
                    }
                    frame
                        .extend_from_slice(&descriptor.payload)
                        .map_err(|_| ErrorKind::InvalidArg)?;
                    bus.write(descriptor.address, &frame)
                        .await
                        .map_err(ErrorKind::from)
                }
                Direction::Read { read_len } => {
                    let mut scratch = [0u8; WIRE_FRAME_CAPACITY];
                    let len = read_len.min(WIRE_FRAME_CAPACITY);
                    bus.write_read(descriptor.address, &[descriptor.register], &mut scratch[..len])
                        .await
                        .map_err(ErrorKind::from)
                }
            }
        };
        match with_timeout(timeout, op).await {
            Ok(result) => result,
            Err(_) => Err(ErrorKind::Timeout),
        }
    }

    /// Publish a completion, unless the transfer was already force-
    /// completed (timeout watchdog, abort) or superseded.
    fn complete(&self, seq: u32, result: Result<(), ErrorKind>) {
        self.inner.lock(|inner| {
            let mut inner = inner.borrow_mut();
            if inner.submit_seq != seq || inner.state != TransferState::InProgress {
                return;
            }
            match result {
                Ok(()) => {
                    inner.state = TransferState::Completed;
                    inner.last_error = ErrorKind::Success;
                    inner.completion = Some(Ok(()));
                }
                Err(kind) => {
                    inner.state = kind.terminal_state();
                    inner.last_error = kind;
                    inner.completion = Some(Err(kind));
                }
            }
        });
    }

    /// Consume the completion of the current transfer, if it has one.
    pub fn poll_completion(&self) -> Option<Result<(), ErrorKind>> {
        self.inner.lock(|inner| inner.borrow_mut().completion.take())
    }

    /// Cooperatively wait for the in-flight transfer to complete.
    ///
    /// Polls with explicit yields; intended for tests and init paths.
    pub async fn wait_for_completion(&self, timeout_ms: u64) -> Result<(), ErrorKind> {
        let start = self.clock.now_us();
        loop {
            if let Some(result) = self.poll_completion() {
                return result;
            }
            if self.clock.elapsed_since(start) > timeout_ms * 1000 {
                return Err(ErrorKind::Timeout);
            }
            yield_now().await;
        }
    }

    /// Force-fail the in-flight transfer with a bus failure.
    pub fn abort(&self) {
        self.inner.lock(|inner| {
            let mut inner = inner.borrow_mut();
            if inner.state == TransferState::InProgress {
                inner.pending = None;
                inner.state = TransferState::BusFailure;
                inner.last_error = ErrorKind::BusError;
                inner.completion = Some(Err(ErrorKind::BusError));
            }
        });
    }

    /// Timeout check, called by the watchdog task. Force-completes the
    /// in-flight transfer with `Timeout` once its age exceeds the
    /// configured bound. Returns true when it fired.
    pub fn check_timeout(&self) -> bool {
        let now = self.clock.now_us();
        self.inner.lock(|inner| {
            let mut inner = inner.borrow_mut();
            if inner.state == TransferState::InProgress
                && now.saturating_sub(inner.started_us) > self.config.timeout_ms * 1000
            {
                inner.pending = None;
                inner.state = TransferState::TimedOut;
                inner.last_error = ErrorKind::Timeout;
                inner.completion = Some(Err(ErrorKind::Timeout));
                true
            } else {
                false
            }
        })
    }

    /// Synchronous transfer path: performs the wire operation inline,
    /// bypassing the submit/poll handshake. Fails with `Busy` while an
    /// asynchronous transfer is in flight so the bus stays exclusive.
    pub async fn transfer_sync(&self, mut descriptor: TransferDescriptor) -> Result<(), ErrorKind> {
        if descriptor.address == 0 {
            descriptor.address = self.config.address;
        }
        if self.is_in_flight() {
            return Err(ErrorKind::Busy);
        }
        self.perform(&descriptor).await
    }

    /// Register read on the synchronous path (driver probe and setup).
    pub async fn read_register(
        &self,
        address: u8,
        register: u8,
        buffer: &mut [u8],
    ) -> Result<(), ErrorKind> {
        if self.is_in_flight() {
            return Err(ErrorKind::Busy);
        }
        let timeout = Duration::from_millis(self.config.timeout_ms);
        let address = if address == 0 { self.config.address } else { address };
        let mut bus = self.bus.lock().await;
        match with_timeout(timeout, bus.write_read(address, &[register], buffer)).await {
            Ok(result) => result.map_err(ErrorKind::from),
            Err(_) => Err(ErrorKind::Timeout),
        }
    }

    /// Deinitialize and reinitialize the bus (RecoveryAction::ResetPeripheral).
    pub async fn reset_bus(&self) -> Result<(), ErrorKind> {
        self.abort();
        let mut bus = self.bus.lock().await;
        bus.reset().await.map_err(ErrorKind::from)
    }

    pub fn state(&self) -> TransferState {
        self.inner.lock(|inner| inner.borrow().state)
    }

    pub fn last_error(&self) -> ErrorKind {
        self.inner.lock(|inner| inner.borrow().last_error)
    }

    pub fn is_complete(&self) -> bool {
        self.state().is_terminal()
    }

    pub fn is_in_flight(&self) -> bool {
        self.state() == TransferState::InProgress
    }

    /// Age of the in-flight transfer in microseconds, if any.
    pub fn in_flight_age_us(&self) -> Option<u64> {
        let now = self.clock.now_us();
        self.inner.lock(|inner| {
            let inner = inner.borrow();
            (inner.state == TransferState::InProgress)
                .then(|| now.saturating_sub(inner.started_us))
        })
    }

    /// Run a closure against the bus. Test hook; waits for the bus to be
    /// free of wire operations.
    pub async fn with_bus<R>(&self, f: impl FnOnce(&mut B) -> R) -> R {
        let mut bus = self.bus.lock().await;
        f(&mut bus)
    }
}
