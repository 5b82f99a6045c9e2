//! Time abstraction for platform-agnostic timing
//!
//! The recovery policy and transfer engine stamp and age events through
//! [`TimeSource`] so their logic runs on host against [`MockTime`] and on
//! target against the firmware crate's Embassy-backed clock.

use core::cell::Cell;

/// Platform-agnostic monotonic time source.
pub trait TimeSource: Clone {
    /// Milliseconds since system start.
    fn now_ms(&self) -> u64;

    /// Microseconds since system start.
    fn now_us(&self) -> u64;

    /// Elapsed microseconds since a reference point, saturating.
    fn elapsed_since(&self, reference_us: u64) -> u64 {
        self.now_us().saturating_sub(reference_us)
    }
}

/// Controllable time source for deterministic tests.
#[derive(Clone, Default)]
pub struct MockTime {
    current_us: Cell<u64>,
}

impl MockTime {
    pub fn new() -> Self {
        Self {
            current_us: Cell::new(0),
        }
    }

    pub fn with_initial(us: u64) -> Self {
        Self {
            current_us: Cell::new(us),
        }
    }

    /// Set the current time to an absolute value.
    pub fn set(&self, us: u64) {
        self.current_us.set(us);
    }

    /// Advance the current time.
    pub fn advance(&self, us: u64) {
        self.current_us.set(self.current_us.get() + us);
    }
}

impl TimeSource for MockTime {
    fn now_ms(&self) -> u64 {
        self.current_us.get() / 1000
    }

    fn now_us(&self) -> u64 {
        self.current_us.get()
    }
}
