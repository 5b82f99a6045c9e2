//! Error severity assessment, recovery actions, and failure accounting
//!
//! Every transfer completion funnels through [`RecoveryPolicy`]: successes
//! clear per-DAC error counters and may lift sync fallback after a streak;
//! failures are classified, logged into a bounded telemetry ring, and
//! answered with a recovery action the worker executes. The policy decides,
//! the worker acts; the engine itself never retries.

use heapless::Deque;

use crate::config::{DAC_COUNT, ERROR_LOG_ENTRIES, RecoveryConfig};
use crate::transfer::ErrorKind;

/// Telemetry routing severity. Does not influence the chosen action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ErrorSeverity {
    Info,
    Warning,
    Error,
    Critical,
    Fatal,
}

/// What the worker should do about a failed transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RecoveryAction {
    None,
    RetryNow,
    RetryWithBackoff,
    FallbackSync,
    ResetPeripheral,
    Escalate,
}

/// One logged failure, retained for telemetry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ErrorEvent {
    pub timestamp_us: u64,
    pub kind: ErrorKind,
    pub severity: ErrorSeverity,
    pub action: RecoveryAction,
    pub dac_index: u8,
    pub retry_count: u8,
}

/// Running counters over all completions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RecoveryStats {
    pub total_operations: u32,
    pub total_errors: u32,
    pub timeout_errors: u32,
    pub nak_errors: u32,
    pub bus_errors: u32,
    pub arbitration_errors: u32,
    pub busy_errors: u32,
    pub fallback_entries: u32,
    pub peripheral_resets: u32,
}

impl RecoveryStats {
    /// Error rate in basis points (1% = 100 bp) over all recorded
    /// operations. Integer math; zero when nothing has run yet.
    pub fn error_rate_bp(&self) -> u32 {
        if self.total_operations == 0 {
            return 0;
        }
        ((self.total_errors as u64 * 10_000) / self.total_operations as u64) as u32
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct DacAccounting {
    consecutive_errors: u8,
    success_streak: u8,
    last_error_time_us: u64,
}

/// Central recovery policy shared by every DAC worker.
///
/// Holds the per-DAC failure accounting, the bounded error-event ring, and
/// the statistics counters. Lives behind its own mutex in the firmware
/// crate; all methods are cheap and non-blocking.
pub struct RecoveryPolicy {
    config: RecoveryConfig,
    dacs: [DacAccounting; DAC_COUNT],
    log: Deque<ErrorEvent, ERROR_LOG_ENTRIES>,
    stats: RecoveryStats,
    worst_severity: ErrorSeverity,
    jitter_state: u32,
}

impl RecoveryPolicy {
    pub const fn new(config: RecoveryConfig) -> Self {
        Self {
            config,
            dacs: [DacAccounting {
                consecutive_errors: 0,
                success_streak: 0,
                last_error_time_us: 0,
            }; DAC_COUNT],
            log: Deque::new(),
            stats: RecoveryStats {
                total_operations: 0,
                total_errors: 0,
                timeout_errors: 0,
                nak_errors: 0,
                bus_errors: 0,
                arbitration_errors: 0,
                busy_errors: 0,
                fallback_entries: 0,
                peripheral_resets: 0,
            },
            worst_severity: ErrorSeverity::Info,
            jitter_state: 0x2F6E_2B1D,
        }
    }

    pub fn config(&self) -> &RecoveryConfig {
        &self.config
    }

    /// Record one completed transfer attempt (success or failure) for the
    /// error-rate denominator.
    pub fn record_operation(&mut self) {
        self.stats.total_operations = self.stats.total_operations.wrapping_add(1);
    }

    /// Success notification. Zeroes the DAC's consecutive-error count.
    ///
    /// When the DAC is in sync fallback, counts the success streak and
    /// returns `true` once the configured streak is reached: the caller
    /// then clears the DAC's fallback flag. Outside fallback the streak
    /// stays zeroed.
    pub fn notify_success(&mut self, dac_index: usize, in_fallback: bool) -> bool {
        let dac = &mut self.dacs[dac_index];
        dac.consecutive_errors = 0;

        if !in_fallback {
            dac.success_streak = 0;
            return false;
        }

        dac.success_streak = dac.success_streak.saturating_add(1);
        if dac.success_streak >= self.config.fallback_recovery_successes {
            dac.success_streak = 0;
            true
        } else {
            false
        }
    }

    /// Classify a failed transfer and choose the recovery action.
    ///
    /// Increments the DAC's consecutive-error count exactly once per failed
    /// transfer, stamps the failure time, and appends a telemetry event.
    pub fn handle_error(
        &mut self,
        dac_index: usize,
        kind: ErrorKind,
        retry_count: u8,
        now_us: u64,
    ) -> (ErrorSeverity, RecoveryAction) {
        let dac = &mut self.dacs[dac_index];
        dac.consecutive_errors = dac.consecutive_errors.saturating_add(1);
        dac.last_error_time_us = now_us;
        let consecutive = dac.consecutive_errors;

        let severity = Self::assess_severity(kind, retry_count);
        let action = self.determine_action(kind, retry_count, consecutive);

        self.count_error(kind);
        if severity > self.worst_severity {
            self.worst_severity = severity;
        }

        let event = ErrorEvent {
            timestamp_us: now_us,
            kind,
            severity,
            action,
            dac_index: dac_index as u8,
            retry_count,
        };
        if self.log.is_full() {
            self.log.pop_front();
        }
        // Cannot fail: a slot was just freed if the ring was full.
        let _ = self.log.push_back(event);

        (severity, action)
    }

    fn assess_severity(kind: ErrorKind, retry_count: u8) -> ErrorSeverity {
        match kind {
            ErrorKind::Success => ErrorSeverity::Info,
            ErrorKind::Uninitialized | ErrorKind::InvalidArg => ErrorSeverity::Fatal,
            ErrorKind::BusError => {
                if retry_count >= 2 {
                    ErrorSeverity::Critical
                } else {
                    ErrorSeverity::Error
                }
            }
            ErrorKind::Timeout | ErrorKind::Nak => {
                if retry_count >= 3 {
                    ErrorSeverity::Error
                } else {
                    ErrorSeverity::Warning
                }
            }
            ErrorKind::Arbitration | ErrorKind::Busy => ErrorSeverity::Warning,
        }
    }

    fn determine_action(&self, kind: ErrorKind, retry_count: u8, consecutive: u8) -> RecoveryAction {
        let action = match kind {
            ErrorKind::Success => RecoveryAction::None,
            ErrorKind::Busy => {
                if retry_count < 2 {
                    RecoveryAction::RetryWithBackoff
                } else {
                    RecoveryAction::FallbackSync
                }
            }
            ErrorKind::Timeout => {
                if retry_count < self.config.max_retry_attempts {
                    RecoveryAction::RetryWithBackoff
                } else if consecutive > 5 {
                    // Persistent stall: fallback alone cannot help, the
                    // peripheral itself needs a reset.
                    RecoveryAction::ResetPeripheral
                } else {
                    RecoveryAction::FallbackSync
                }
            }
            ErrorKind::Nak => {
                if retry_count < 3 {
                    RecoveryAction::RetryNow
                } else {
                    RecoveryAction::FallbackSync
                }
            }
            ErrorKind::Arbitration => RecoveryAction::RetryWithBackoff,
            ErrorKind::BusError => {
                if retry_count == 0 {
                    RecoveryAction::RetryNow
                } else if consecutive > 5 {
                    RecoveryAction::ResetPeripheral
                } else {
                    RecoveryAction::FallbackSync
                }
            }
            ErrorKind::Uninitialized | ErrorKind::InvalidArg => RecoveryAction::Escalate,
        };

        // Config gates: a disabled degradation path falls through to the
        // next-strongest permitted action.
        match action {
            RecoveryAction::ResetPeripheral if !self.config.enable_peripheral_reset => {
                RecoveryAction::FallbackSync
            }
            RecoveryAction::FallbackSync if !self.config.enable_sync_fallback => {
                RecoveryAction::RetryWithBackoff
            }
            other => other,
        }
    }

    fn count_error(&mut self, kind: ErrorKind) {
        self.stats.total_errors = self.stats.total_errors.wrapping_add(1);
        match kind {
            ErrorKind::Timeout => self.stats.timeout_errors += 1,
            ErrorKind::Nak => self.stats.nak_errors += 1,
            ErrorKind::BusError => self.stats.bus_errors += 1,
            ErrorKind::Arbitration => self.stats.arbitration_errors += 1,
            ErrorKind::Busy => self.stats.busy_errors += 1,
            _ => {}
        }
    }

    /// Backoff delay for the given retry: `min(base << retry, max)` plus
    /// up to 10% deterministic jitter. Integer math only.
    pub fn backoff_delay_ms(&mut self, retry_count: u8) -> u32 {
        let shift = retry_count.min(16) as u32;
        let base = self
            .config
            .retry_base_ms
            .saturating_mul(1u32.checked_shl(shift).unwrap_or(u32::MAX))
            .min(self.config.retry_max_ms);

        // xorshift32 keeps backoff spread without an RNG dependency.
        let mut x = self.jitter_state;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.jitter_state = x;

        let jitter_percent = x % 11; // 0..=10
        base + base * jitter_percent / 100
    }

    /// Note that a DAC entered sync fallback.
    pub fn note_fallback(&mut self) {
        self.stats.fallback_entries += 1;
    }

    /// Note a completed peripheral reset: the consecutive-error count
    /// restarts, the DAC stays in fallback until the success streak clears
    /// it.
    pub fn note_reset(&mut self, dac_index: usize) {
        self.stats.peripheral_resets += 1;
        self.dacs[dac_index].consecutive_errors = 0;
    }

    pub fn consecutive_errors(&self, dac_index: usize) -> u8 {
        self.dacs[dac_index].consecutive_errors
    }

    pub fn time_since_last_error_us(&self, dac_index: usize, now_us: u64) -> u64 {
        now_us.saturating_sub(self.dacs[dac_index].last_error_time_us)
    }

    pub fn stats(&self) -> &RecoveryStats {
        &self.stats
    }

    /// Iterate retained error events, oldest first.
    pub fn error_log(&self) -> impl Iterator<Item = &ErrorEvent> {
        self.log.iter()
    }

    pub fn error_log_len(&self) -> usize {
        self.log.len()
    }

    /// Healthy when nothing Critical/Fatal has been seen, the error rate
    /// is under the configured threshold, and no DAC sits at the reset
    /// threshold.
    pub fn is_healthy(&self) -> bool {
        self.worst_severity < ErrorSeverity::Critical
            && self.stats.error_rate_bp() <= self.config.error_rate_threshold_bp
            && self
                .dacs
                .iter()
                .all(|d| d.consecutive_errors < self.config.peripheral_reset_threshold)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> RecoveryPolicy {
        RecoveryPolicy::new(RecoveryConfig::defaults())
    }

    #[test]
    fn fatal_kinds() {
        let mut p = policy();
        let (sev, action) = p.handle_error(0, ErrorKind::Uninitialized, 0, 0);
        assert_eq!(sev, ErrorSeverity::Fatal);
        assert_eq!(action, RecoveryAction::Escalate);

        let (sev, action) = p.handle_error(0, ErrorKind::InvalidArg, 0, 0);
        assert_eq!(sev, ErrorSeverity::Fatal);
        assert_eq!(action, RecoveryAction::Escalate);
    }

    #[test]
    fn bus_error_severity_escalates_with_retries() {
        let mut p = policy();
        assert_eq!(p.handle_error(0, ErrorKind::BusError, 0, 0).0, ErrorSeverity::Error);
        assert_eq!(p.handle_error(0, ErrorKind::BusError, 2, 0).0, ErrorSeverity::Critical);
    }

    #[test]
    fn timeout_and_nak_severity() {
        let mut p = policy();
        assert_eq!(p.handle_error(0, ErrorKind::Timeout, 0, 0).0, ErrorSeverity::Warning);
        assert_eq!(p.handle_error(0, ErrorKind::Timeout, 3, 0).0, ErrorSeverity::Error);
        assert_eq!(p.handle_error(0, ErrorKind::Nak, 2, 0).0, ErrorSeverity::Warning);
        assert_eq!(p.handle_error(0, ErrorKind::Nak, 4, 0).0, ErrorSeverity::Error);
    }

    #[test]
    fn nak_retries_then_falls_back() {
        let mut p = policy();
        assert_eq!(p.handle_error(1, ErrorKind::Nak, 0, 0).1, RecoveryAction::RetryNow);
        assert_eq!(p.handle_error(1, ErrorKind::Nak, 1, 0).1, RecoveryAction::RetryNow);
        assert_eq!(p.handle_error(1, ErrorKind::Nak, 2, 0).1, RecoveryAction::RetryNow);
        assert_eq!(p.handle_error(1, ErrorKind::Nak, 3, 0).1, RecoveryAction::FallbackSync);
    }

    #[test]
    fn timeout_backs_off_until_budget_exhausted() {
        let mut p = policy();
        let budget = p.config().max_retry_attempts;
        for retry in 0..budget {
            assert_eq!(
                p.handle_error(0, ErrorKind::Timeout, retry, 0).1,
                RecoveryAction::RetryWithBackoff
            );
        }
        assert_eq!(
            p.handle_error(0, ErrorKind::Timeout, budget, 0).1,
            RecoveryAction::FallbackSync
        );
    }

    #[test]
    fn busy_falls_back_after_two_attempts() {
        let mut p = policy();
        assert_eq!(p.handle_error(0, ErrorKind::Busy, 0, 0).1, RecoveryAction::RetryWithBackoff);
        assert_eq!(p.handle_error(0, ErrorKind::Busy, 1, 0).1, RecoveryAction::RetryWithBackoff);
        assert_eq!(p.handle_error(0, ErrorKind::Busy, 2, 0).1, RecoveryAction::FallbackSync);
    }

    #[test]
    fn arbitration_always_backs_off() {
        let mut p = policy();
        for retry in 0..6 {
            assert_eq!(
                p.handle_error(0, ErrorKind::Arbitration, retry, 0).1,
                RecoveryAction::RetryWithBackoff
            );
        }
    }

    #[test]
    fn bus_error_resets_peripheral_after_consecutive_failures() {
        let mut p = policy();
        // First failure retries immediately.
        assert_eq!(p.handle_error(0, ErrorKind::BusError, 0, 0).1, RecoveryAction::RetryNow);
        // Until the consecutive count crosses 5, degrade to sync.
        for _ in 0..4 {
            assert_eq!(
                p.handle_error(0, ErrorKind::BusError, 1, 0).1,
                RecoveryAction::FallbackSync
            );
        }
        // Sixth consecutive error: reset the peripheral.
        assert_eq!(
            p.handle_error(0, ErrorKind::BusError, 1, 0).1,
            RecoveryAction::ResetPeripheral
        );
    }

    #[test]
    fn persistent_timeout_escalates_to_reset() {
        let mut p = policy();
        let budget = p.config().max_retry_attempts;

        // First round: budget exhausted with few consecutive errors
        // degrades to sync fallback.
        for retry in 0..budget {
            p.handle_error(0, ErrorKind::Timeout, retry, 0);
        }
        assert_eq!(
            p.handle_error(0, ErrorKind::Timeout, budget, 0).1,
            RecoveryAction::FallbackSync
        );

        // Second round: the stall persists through fallback, so the
        // exhausted-budget action becomes a peripheral reset.
        for retry in 0..budget {
            p.handle_error(0, ErrorKind::Timeout, retry, 0);
        }
        assert_eq!(
            p.handle_error(0, ErrorKind::Timeout, budget, 0).1,
            RecoveryAction::ResetPeripheral
        );
    }

    #[test]
    fn success_clears_consecutive_errors() {
        let mut p = policy();
        p.handle_error(0, ErrorKind::Nak, 0, 0);
        p.handle_error(0, ErrorKind::Nak, 1, 0);
        assert_eq!(p.consecutive_errors(0), 2);

        p.notify_success(0, false);
        assert_eq!(p.consecutive_errors(0), 0);
    }

    #[test]
    fn fallback_clears_after_success_streak() {
        let mut p = policy();
        let k = p.config().fallback_recovery_successes;

        for _ in 0..k - 1 {
            assert!(!p.notify_success(0, true));
        }
        assert!(p.notify_success(0, true));

        // Streak restarts after clearing.
        assert!(!p.notify_success(0, true));
    }

    #[test]
    fn streak_does_not_accumulate_outside_fallback() {
        let mut p = policy();
        for _ in 0..50 {
            assert!(!p.notify_success(0, false));
        }
        // Entering fallback now still needs the full streak.
        let k = p.config().fallback_recovery_successes;
        for _ in 0..k - 1 {
            assert!(!p.notify_success(0, true));
        }
        assert!(p.notify_success(0, true));
    }

    #[test]
    fn reset_keeps_fallback_accounting() {
        let mut p = policy();
        for _ in 0..7 {
            p.handle_error(1, ErrorKind::BusError, 1, 0);
        }
        p.note_reset(1);
        assert_eq!(p.consecutive_errors(1), 0);
        assert_eq!(p.stats().peripheral_resets, 1);
    }

    #[test]
    fn backoff_is_exponential_and_capped() {
        let mut p = policy();
        let d0 = p.backoff_delay_ms(0);
        let d3 = p.backoff_delay_ms(3);
        let d20 = p.backoff_delay_ms(20);

        // base 1ms: retry 0 in [1, 1.1], retry 3 in [8, 8.8], capped at
        // 100ms + 10%.
        assert!((1..=2).contains(&d0));
        assert!((8..=9).contains(&d3));
        assert!((100..=110).contains(&d20));
    }

    #[test]
    fn error_log_is_bounded_and_ordered() {
        let mut p = policy();
        for i in 0..40u64 {
            p.handle_error(0, ErrorKind::Nak, 0, i);
        }
        assert_eq!(p.error_log_len(), ERROR_LOG_ENTRIES);

        // Oldest entries were evicted; the ring holds the last 32.
        let first = p.error_log().next().unwrap();
        assert_eq!(first.timestamp_us, 40 - ERROR_LOG_ENTRIES as u64);
        let last = p.error_log().last().unwrap();
        assert_eq!(last.timestamp_us, 39);
    }

    #[test]
    fn event_fields_are_recorded() {
        let mut p = policy();
        p.handle_error(1, ErrorKind::Timeout, 2, 1234);
        let event = p.error_log().next().unwrap();
        assert_eq!(event.kind, ErrorKind::Timeout);
        assert_eq!(event.dac_index, 1);
        assert_eq!(event.retry_count, 2);
        assert_eq!(event.timestamp_us, 1234);
        assert_eq!(event.action, RecoveryAction::RetryWithBackoff);
    }

    #[test]
    fn error_rate_in_basis_points() {
        let mut p = policy();
        for _ in 0..100 {
            p.record_operation();
        }
        for _ in 0..5 {
            p.handle_error(0, ErrorKind::Nak, 0, 0);
        }
        assert_eq!(p.stats().error_rate_bp(), 500);
    }

    #[test]
    fn health_degrades_on_critical() {
        let mut p = policy();
        for _ in 0..1000 {
            p.record_operation();
        }
        assert!(p.is_healthy());

        p.handle_error(0, ErrorKind::BusError, 2, 0); // Critical
        assert!(!p.is_healthy());
    }

    #[test]
    fn disabled_fallback_degrades_to_backoff() {
        let mut config = RecoveryConfig::defaults();
        config.enable_sync_fallback = false;
        let mut p = RecoveryPolicy::new(config);
        assert_eq!(
            p.handle_error(0, ErrorKind::Nak, 3, 0).1,
            RecoveryAction::RetryWithBackoff
        );
    }

    #[test]
    fn disabled_reset_degrades_to_fallback() {
        let mut config = RecoveryConfig::defaults();
        config.enable_peripheral_reset = false;
        let mut p = RecoveryPolicy::new(config);
        for _ in 0..10 {
            let (_, action) = p.handle_error(0, ErrorKind::BusError, 1, 0);
            assert_ne!(action, RecoveryAction::ResetPeripheral);
        }
    }
}
