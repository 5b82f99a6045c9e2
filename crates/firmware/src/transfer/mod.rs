//! Asynchronous I2C transfer engine
//!
//! One [`engine::TransferEngine`] per physical bus. Workers submit write
//! frames without blocking; the engine's service loop performs the wire
//! operation and publishes exactly one completion per accepted submit.
//! The [`watchdog`] task bounds how long any transfer can stay in flight.

pub mod engine;
pub mod watchdog;

pub use engine::TransferEngine;
