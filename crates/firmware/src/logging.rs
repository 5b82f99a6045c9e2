//! Logging macros
//!
//! `log_info!` and friends route to `defmt` when the `defmt` feature is
//! enabled (always the case on target) and to the `log` facade otherwise,
//! so host tests and tools get plain env-logger-style output. Format
//! strings stick to `{}` / `{:?}`, which both backends accept.

/// Log at info level.
#[cfg(feature = "defmt")]
#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => { ::defmt::info!($($arg)*) };
}

/// Log at info level.
#[cfg(not(feature = "defmt"))]
#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => { ::log::info!($($arg)*) };
}

/// Log at warn level.
#[cfg(feature = "defmt")]
#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => { ::defmt::warn!($($arg)*) };
}

/// Log at warn level.
#[cfg(not(feature = "defmt"))]
#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => { ::log::warn!($($arg)*) };
}

/// Log at error level.
#[cfg(feature = "defmt")]
#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => { ::defmt::error!($($arg)*) };
}

/// Log at error level.
#[cfg(not(feature = "defmt"))]
#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => { ::log::error!($($arg)*) };
}

/// Log at debug level.
#[cfg(feature = "defmt")]
#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => { ::defmt::debug!($($arg)*) };
}

/// Log at debug level.
#[cfg(not(feature = "defmt"))]
#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => { ::log::debug!($($arg)*) };
}
