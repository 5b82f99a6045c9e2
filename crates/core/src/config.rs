//! Compile-time tunables for the bridge pipeline
//!
//! All hot-path sizing is fixed at compile time; the two structs at the
//! bottom carry the init-time knobs for the transfer engine and the
//! recovery policy, with defaults matching the deployed hardware.

/// Number of physical DACs on the board.
pub const DAC_COUNT: usize = 2;

/// Channels per physical DAC.
pub const CHANNELS_PER_DAC: usize = 8;

/// Total CV channels driven by the bridge.
pub const TOTAL_CHANNELS: usize = DAC_COUNT * CHANNELS_PER_DAC;

/// Full-scale channel value (unit-less 16-bit).
pub const VALUE_MAX: u16 = u16::MAX;

/// Maximum continuous work per task iteration before an explicit yield,
/// in microseconds. Documented contract for every lifetime task.
pub const THREAD_SLICE_MICROS: u32 = 10;

/// Refresh watchdog period. Every DAC is republished at least this often,
/// regardless of MIDI traffic.
pub const FORCE_REFRESH_EVERY_MS: u64 = 100;

/// I2C bus clock.
pub const I2C_CLOCK_HZ: u32 = 400_000;

/// Per-transfer timeout.
pub const I2C_TIMEOUT_MS: u64 = 100;

/// The timeout watchdog inspects in-flight transfers at
/// `I2C_TIMEOUT_MS / TIMEOUT_CHECK_DIVISOR` intervals.
pub const TIMEOUT_CHECK_DIVISOR: u64 = 5;

/// Largest transfer frame the engine accepts. Sized for a batched
/// all-channel DAC write (3 bytes per channel) with headroom.
pub const FRAME_CAPACITY: usize = 32;

/// On-wire frame capacity: payload plus the optional register prefix.
pub const WIRE_FRAME_CAPACITY: usize = FRAME_CAPACITY + 8;

/// Retained error events for telemetry.
pub const ERROR_LOG_ENTRIES: usize = 32;

/// Retry budget before a failing async transfer degrades to sync fallback.
pub const MAX_RETRY_ATTEMPTS: u8 = 3;

/// Exponential backoff base delay.
pub const RETRY_BASE_MS: u32 = 1;

/// Exponential backoff ceiling.
pub const RETRY_MAX_MS: u32 = 100;

/// Error-rate health threshold, in basis points (5.00% = 500 bp).
pub const ERROR_RATE_THRESHOLD_BP: u32 = 500;

/// Consecutive successes required to leave sync fallback mode.
pub const FALLBACK_RECOVERY_SUCCESSES: u8 = 10;

/// Consecutive-error count at which a peripheral reset is considered.
pub const PERIPHERAL_RESET_THRESHOLD: u8 = 10;

/// DAC probe attempts during driver initialization.
pub const PROBE_ATTEMPTS: u32 = 100;

/// Spacing between DAC probe attempts.
pub const PROBE_SPACING_MS: u64 = 10;

/// MIDI pitch-bend zero offset: values below this bend negative.
pub const MIDI_PITCH_ZERO_OFFSET: i32 = 0x2000;

/// Largest 14-bit pitch-bend magnitude after offsetting.
pub const MIDI_PITCH_14BIT_MAX: i32 = 0x3FFF;

/// Scale factor from offset 14-bit pitch to the 16-bit channel domain.
pub const MIDI_TO_VALUE_SCALE: u16 = 4;

/// Init-time configuration for one I2C transfer engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TransferConfig {
    /// Default 7-bit slave address for this engine.
    pub address: u8,
    /// Bus clock in Hz.
    pub clock_hz: u32,
    /// Per-transfer timeout in milliseconds.
    pub timeout_ms: u64,
}

impl TransferConfig {
    /// Default configuration as a `const` so engines can live in statics.
    pub const fn new(address: u8) -> Self {
        Self {
            address,
            clock_hz: I2C_CLOCK_HZ,
            timeout_ms: I2C_TIMEOUT_MS,
        }
    }
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self::new(0x10)
    }
}

/// Init-time configuration for the recovery policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RecoveryConfig {
    /// Retry budget for a single update before degrading.
    pub max_retry_attempts: u8,
    /// Backoff base delay in milliseconds.
    pub retry_base_ms: u32,
    /// Backoff ceiling in milliseconds.
    pub retry_max_ms: u32,
    /// Error-rate health threshold in basis points.
    pub error_rate_threshold_bp: u32,
    /// Whether peripheral reset is permitted at all.
    pub enable_peripheral_reset: bool,
    /// Whether sync fallback is permitted at all.
    pub enable_sync_fallback: bool,
    /// Consecutive successes required to leave fallback mode.
    pub fallback_recovery_successes: u8,
    /// Consecutive-error gate for peripheral reset.
    pub peripheral_reset_threshold: u8,
}

impl RecoveryConfig {
    pub const fn defaults() -> Self {
        Self {
            max_retry_attempts: MAX_RETRY_ATTEMPTS,
            retry_base_ms: RETRY_BASE_MS,
            retry_max_ms: RETRY_MAX_MS,
            error_rate_threshold_bp: ERROR_RATE_THRESHOLD_BP,
            enable_peripheral_reset: true,
            enable_sync_fallback: true,
            fallback_recovery_successes: FALLBACK_RECOVERY_SUCCESSES,
            peripheral_reset_threshold: PERIPHERAL_RESET_THRESHOLD,
        }
    }
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self::defaults()
    }
}
