//! Per-DAC update-sequence state machine
//!
//! The dispatcher and refresh watchdog publish work to a DAC worker by
//! incrementing a sequence number; the worker observes the sequence,
//! performs the transfer, and commits the observed value only on success.
//! A failed transfer leaves the sequence uncommitted, so the worker
//! re-observes the same (or a newer) sequence on its next pass and retries
//! without the dispatcher republishing.
//!
//! The counter wraps; all comparisons are inequality, not ordering.

/// Worker-visible update state for one DAC.
///
/// Lives behind the DAC's state mutex in the firmware crate. Holders never
/// suspend while the mutex is taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DacUpdateState {
    update_sequence: u32,
    last_processed_sequence: u32,
    update_in_progress: bool,
    fallback_mode: bool,
}

impl DacUpdateState {
    /// A fresh state with one update already requested, so every DAC is
    /// written once at boot before any MIDI arrives.
    pub const fn new() -> Self {
        Self {
            update_sequence: 1,
            last_processed_sequence: 0,
            update_in_progress: false,
            fallback_mode: false,
        }
    }

    /// Publish: request that the worker push the current output slice.
    ///
    /// Called by the dispatcher after copying new values and by the
    /// refresh watchdog unconditionally.
    pub fn request_update(&mut self) {
        self.update_sequence = self.update_sequence.wrapping_add(1);
    }

    /// Worker-side observation. Returns the sequence to process when work
    /// is pending and no iteration is already in flight; marks the
    /// iteration in progress.
    pub fn begin_update(&mut self) -> Option<u32> {
        if self.update_sequence != self.last_processed_sequence && !self.update_in_progress {
            self.update_in_progress = true;
            Some(self.update_sequence)
        } else {
            None
        }
    }

    /// Worker-side commit. The observed sequence is recorded only on
    /// success; either way the in-progress flag clears so the next
    /// iteration may begin.
    pub fn finish_update(&mut self, observed_sequence: u32, success: bool) {
        if success {
            self.last_processed_sequence = observed_sequence;
        }
        self.update_in_progress = false;
    }

    /// True when a published sequence has not been committed yet.
    pub fn has_pending(&self) -> bool {
        self.update_sequence != self.last_processed_sequence
    }

    pub fn in_progress(&self) -> bool {
        self.update_in_progress
    }

    pub fn update_sequence(&self) -> u32 {
        self.update_sequence
    }

    pub fn last_processed_sequence(&self) -> u32 {
        self.last_processed_sequence
    }

    /// Force synchronous transfers for this DAC.
    pub fn enter_fallback(&mut self) {
        self.fallback_mode = true;
    }

    /// Re-enable the async path. Only the recovery policy's success-streak
    /// accounting may trigger this.
    pub fn leave_fallback(&mut self) {
        self.fallback_mode = false;
    }

    pub fn fallback_mode(&self) -> bool {
        self.fallback_mode
    }
}

impl Default for DacUpdateState {
    fn default() -> Self {
        Self::new()
    }
}
