//! Mock DAC driver for testing
//!
//! Scriptable driver implementing [`DacDriver`] without any bus behind
//! it. Records the latch bracket and every transferred value bank so the
//! worker's retry, fallback, and commit behavior is testable in
//! isolation.

use heapless::{Deque, Vec};

use pico_cv_core::channels::ChannelValue;
use pico_cv_core::config::CHANNELS_PER_DAC;
use pico_cv_core::transfer::ErrorKind;

use crate::drivers::DacDriver;

/// Outcome for one transfer attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverOutcome {
    Ok,
    Error(ErrorKind),
}

/// One recorded transfer attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverCall {
    pub values: [ChannelValue; CHANNELS_PER_DAC],
    /// True when issued through the asynchronous path.
    pub via_async: bool,
}

/// Scriptable [`DacDriver`] double.
pub struct MockDacDriver {
    script: Deque<DriverOutcome, 32>,
    default_outcome: DriverOutcome,
    calls: Vec<DriverCall, 64>,
    async_pending: Option<Result<(), ErrorKind>>,
    supports_async: bool,
    latch_high: bool,
    latch_edges: u32,
    bus_resets: u32,
}

impl MockDacDriver {
    pub fn new() -> Self {
        Self {
            script: Deque::new(),
            default_outcome: DriverOutcome::Ok,
            calls: Vec::new(),
            async_pending: None,
            supports_async: true,
            latch_high: false,
            latch_edges: 0,
            bus_resets: 0,
        }
    }

    /// Synchronous-only variant.
    pub fn sync_only() -> Self {
        Self {
            supports_async: false,
            ..Self::new()
        }
    }

    pub fn script(&mut self, outcome: DriverOutcome) {
        let _ = self.script.push_back(outcome);
    }

    pub fn script_n(&mut self, outcome: DriverOutcome, n: usize) {
        for _ in 0..n {
            self.script(outcome);
        }
    }

    pub fn set_default_outcome(&mut self, outcome: DriverOutcome) {
        self.default_outcome = outcome;
    }

    pub fn calls(&self) -> &[DriverCall] {
        &self.calls
    }

    pub fn bus_resets(&self) -> u32 {
        self.bus_resets
    }

    pub fn latch_edges(&self) -> u32 {
        self.latch_edges
    }

    fn next_outcome(&mut self) -> Result<(), ErrorKind> {
        match self.script.pop_front().unwrap_or(self.default_outcome) {
            DriverOutcome::Ok => Ok(()),
            DriverOutcome::Error(kind) => Err(kind),
        }
    }

    fn record(&mut self, values: &[ChannelValue; CHANNELS_PER_DAC], via_async: bool) {
        let _ = self.calls.push(DriverCall {
            values: *values,
            via_async,
        });
    }
}

impl Default for MockDacDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl DacDriver for MockDacDriver {
    async fn initialize(&mut self) -> Result<(), ErrorKind> {
        Ok(())
    }

    fn enable(&mut self) {
        if !self.latch_high {
            self.latch_edges += 1;
        }
        self.latch_high = true;
    }

    fn disable(&mut self) {
        self.latch_high = false;
    }

    async fn set_values(
        &mut self,
        values: &[ChannelValue; CHANNELS_PER_DAC],
    ) -> Result<(), ErrorKind> {
        self.record(values, false);
        self.next_outcome()
    }

    fn supports_async(&self) -> bool {
        self.supports_async
    }

    fn start_values_async(
        &mut self,
        values: &[ChannelValue; CHANNELS_PER_DAC],
    ) -> Result<(), ErrorKind> {
        if !self.supports_async {
            return Err(ErrorKind::InvalidArg);
        }
        if self.async_pending.is_some() {
            return Err(ErrorKind::Busy);
        }
        self.record(values, true);
        self.async_pending = Some(self.next_outcome());
        Ok(())
    }

    fn poll_async(&mut self) -> Option<Result<(), ErrorKind>> {
        self.async_pending.take()
    }

    async fn reset_bus(&mut self) -> Result<(), ErrorKind> {
        self.bus_resets += 1;
        Ok(())
    }
}
