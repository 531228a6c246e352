//! Logging and metrics setup shared by the signer binary and its tests.

pub mod metrics;
pub mod tracing;
