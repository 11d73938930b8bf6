//! Core infrastructure
//!
//! Logging macros and the platform-agnostic time and shared-state traits the
//! odometer is built on.

pub mod logging;
pub mod traits;
