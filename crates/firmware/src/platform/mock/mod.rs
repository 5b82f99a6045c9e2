//! Mock platform implementations for host testing
//!
//! The mock bus records every transaction for verification and replays a
//! scripted sequence of outcomes (success, fault, stall, delay) so tests
//! can exercise the retry, fallback, and reset paths without hardware.

pub mod gpio;
pub mod i2c;

pub use gpio::MockLatchPin;
pub use i2c::{MockI2cBus, MockOutcome, Transaction};
