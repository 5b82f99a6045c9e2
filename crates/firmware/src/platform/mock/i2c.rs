//! Mock I2C bus for testing
//!
//! Records all transactions for test verification and replays scripted
//! outcomes. When the script runs dry the configurable default outcome
//! applies, which makes "permanent" fault modes (e.g. a stalled bus until
//! reset) a one-liner.

use embassy_time::Timer;
use heapless::{Deque, Vec};

use crate::platform::error::I2cBusError;
use crate::platform::traits::CvI2cBus;

/// Transaction log capacity. Old entries are dropped once full.
const LOG_CAPACITY: usize = 128;

/// Scripted outcome for one transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockOutcome {
    Ok,
    /// Complete after the given delay; models a slow bus so coalescing
    /// behavior becomes observable.
    OkAfterMs(u16),
    Error(I2cBusError),
    /// Never complete. The engine's timeout machinery must intervene.
    Stall,
}

/// I2C transaction as seen on the mock bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transaction {
    Write {
        addr: u8,
        bytes: Vec<u8, 40>,
    },
    WriteRead {
        addr: u8,
        wr: Vec<u8, 8>,
        read_len: usize,
    },
}

/// Mock I2C bus.
pub struct MockI2cBus {
    transactions: Vec<Transaction, LOG_CAPACITY>,
    script: Deque<MockOutcome, 64>,
    default_outcome: MockOutcome,
    resets: u32,
}

impl MockI2cBus {
    pub fn new() -> Self {
        Self {
            transactions: Vec::new(),
            script: Deque::new(),
            default_outcome: MockOutcome::Ok,
            resets: 0,
        }
    }

    /// Queue an outcome for the next unscripted transaction.
    pub fn script(&mut self, outcome: MockOutcome) {
        let _ = self.script.push_back(outcome);
    }

    /// Queue the same outcome `n` times.
    pub fn script_n(&mut self, outcome: MockOutcome, n: usize) {
        for _ in 0..n {
            self.script(outcome);
        }
    }

    /// Outcome applied once the script is exhausted.
    pub fn set_default_outcome(&mut self, outcome: MockOutcome) {
        self.default_outcome = outcome;
    }

    /// Transaction log so far (for test verification).
    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    pub fn write_count(&self) -> usize {
        self.transactions
            .iter()
            .filter(|t| matches!(t, Transaction::Write { .. }))
            .count()
    }

    /// Payload of the most recent write transaction.
    pub fn last_write(&self) -> Option<&Transaction> {
        self.transactions
            .iter()
            .rev()
            .find(|t| matches!(t, Transaction::Write { .. }))
    }

    pub fn clear_transactions(&mut self) {
        self.transactions.clear();
    }

    /// Number of bus resets requested through the recovery path.
    pub fn resets(&self) -> u32 {
        self.resets
    }

    fn record(&mut self, transaction: Transaction) {
        let _ = self.transactions.push(transaction);
    }

    async fn outcome(&mut self) -> Result<(), I2cBusError> {
        let outcome = self.script.pop_front().unwrap_or(self.default_outcome);
        match outcome {
            MockOutcome::Ok => Ok(()),
            MockOutcome::OkAfterMs(ms) => {
                Timer::after_millis(ms as u64).await;
                Ok(())
            }
            MockOutcome::Error(e) => Err(e),
            MockOutcome::Stall => core::future::pending().await,
        }
    }
}

impl Default for MockI2cBus {
    fn default() -> Self {
        Self::new()
    }
}

impl CvI2cBus for MockI2cBus {
    async fn write(&mut self, addr: u8, bytes: &[u8]) -> Result<(), I2cBusError> {
        self.record(Transaction::Write {
            addr,
            bytes: Vec::from_slice(bytes).unwrap_or_default(),
        });
        self.outcome().await
    }

    async fn write_read(
        &mut self,
        addr: u8,
        wr: &[u8],
        rd: &mut [u8],
    ) -> Result<(), I2cBusError> {
        self.record(Transaction::WriteRead {
            addr,
            wr: Vec::from_slice(wr).unwrap_or_default(),
            read_len: rd.len(),
        });
        rd.fill(0);
        self.outcome().await
    }

    async fn reset(&mut self) -> Result<(), I2cBusError> {
        self.resets += 1;
        // A reset clears any persistent fault mode: the bus is healthy
        // again from the caller's perspective.
        self.script.clear();
        self.default_outcome = MockOutcome::Ok;
        Ok(())
    }
}
