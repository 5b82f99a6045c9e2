//! Pipeline lifetime tasks
//!
//! Each task body is a generic async fn over the platform traits, so the
//! host test suite drives them against mocks and the RP2350 binary wraps
//! them in `#[embassy_executor::task]` functions. Every loop iteration
//! ends in an await point: a blocking receive, a sleep, or an explicit
//! yield.

pub mod dispatcher;
pub mod ingress;
pub mod refresh;
pub mod worker;
