//! Platform abstraction layer
//!
//! This module provides hardware abstraction for the non-volatile memory the
//! odometer persists into. Platform-specific Flash drivers implement
//! [`FlashInterface`]; the mock implementation backs host tests.

pub mod error;
pub mod traits;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

// Re-export commonly used types
pub use error::{FlashError, PlatformError, Result};
pub use traits::FlashInterface;
