//! pico_cv_core - Pure no_std pipeline logic for the pico_cv MIDI-to-CV bridge
//!
//! This crate contains the platform-agnostic data model and policy logic of
//! the bridge: channel value buffers, MIDI pitch-bend scaling, the per-DAC
//! update-sequence state machine, the I2C transfer taxonomy, and the error
//! recovery policy. Everything here is testable on host with plain
//! `cargo test`.
//!
//! # Design Principles
//!
//! - **Zero cfg**: No `#[cfg(feature = ...)]` directives in logic paths
//! - **Pure no_std**: No std library dependencies, no allocation
//! - **Trait abstractions**: Time injected via [`time::TimeSource`]
//!
//! # Modules
//!
//! - [`config`]: Compile-time tunables and init-time config structs
//! - [`channels`]: Fixed-size channel value buffers and per-DAC slice math
//! - [`midi`]: Pitch-bend event type and 14-bit to 16-bit scaling
//! - [`dac`]: Per-DAC update-sequence state machine
//! - [`transfer`]: Transfer states, error taxonomy, transfer descriptors
//! - [`recovery`]: Error severity/recovery policy, event log, statistics
//! - [`time`]: Time source abstraction with a controllable mock

#![no_std]

pub mod channels;
pub mod config;
pub mod dac;
pub mod midi;
pub mod recovery;
pub mod time;
pub mod transfer;
