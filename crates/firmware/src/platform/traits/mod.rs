//! Platform abstraction traits
//!
//! The bridge touches hardware through exactly two seams: an I2C bus
//! ([`i2c::CvI2cBus`]) and the DAC's LDAC latch line ([`gpio::LatchPin`]).

pub mod gpio;
pub mod i2c;

pub use gpio::LatchPin;
pub use i2c::CvI2cBus;
