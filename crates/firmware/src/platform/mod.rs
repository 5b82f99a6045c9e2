//! Platform abstraction layer
//!
//! Hardware access for the bridge goes through the traits in [`traits`];
//! the mock implementations back the host test suite and the RP2350
//! implementations (feature `rp2350`) back the real board. All
//! platform-specific code is isolated to this module.

pub mod error;
pub mod mock;
pub mod traits;

#[cfg(feature = "rp2350")]
pub mod rp2350;

// Re-export commonly used types
pub use error::I2cBusError;
pub use traits::{CvI2cBus, LatchPin};
