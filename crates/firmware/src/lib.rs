#![cfg_attr(not(test), no_std)]
#![allow(async_fn_in_trait)]

//! pico_cv_firmware - Embassy firmware for the pico_cv MIDI-to-CV bridge
//!
//! This crate wires the pure logic from `pico_cv_core` to hardware: the
//! platform abstraction (I2C buses, LDAC latch pins), the asynchronous
//! transfer engine, the DAC driver adapters, and the lifetime tasks that
//! form the pipeline (MIDI ingress, dispatcher, per-DAC workers, refresh
//! watchdog, transfer timeout watchdog).
//!
//! # Design Principles
//!
//! - **Embassy tasks**: the cooperative scheduler; every task loop ends in
//!   an await point or an explicit yield
//! - **Platform isolation**: hardware access only through the traits in
//!   [`platform::traits`]; the mock platform drives the host test suite
//! - **Generic task bodies**: task logic is written as generic async fns,
//!   instantiated by thin `#[embassy_executor::task]` wrappers in the
//!   binary (feature `rp2350`)

// Platform abstraction layer: bus/pin traits, mock and RP2350 impls
pub mod platform;

// Asynchronous I2C transfer engine and its timeout watchdog
pub mod transfer;

// DAC driver adapters (AD5593R, MCP4728) behind the DacDriver trait
pub mod drivers;

// The boot-time singleton: channel banks, per-DAC shared state, recovery
pub mod bridge;

// MIDI event sources (queue-backed ingress seam, optional LFO self-test)
pub mod midi;

// Lifetime tasks: ingress, dispatcher, worker, refresh watchdog
pub mod tasks;

// Embassy-backed clock implementing pico_cv_core::time::TimeSource
pub mod time;

// Note: logging macros (log_info!, log_warn!, log_error!, log_debug!) are
// exported at crate root via #[macro_export] in `logging`
pub mod logging;
