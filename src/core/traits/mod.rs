//! Core traits for platform-agnostic odometer functionality.
//!
//! This module provides trait abstractions that decouple the ledger from
//! platform-specific implementations (Embassy, std, mock).
//!
//! # Features
//!
//! - **`embassy`**: Enables Embassy implementations (`EmbassyTime`, `EmbassyState<T>`)
//! - **`std`**: Enables `StdTime`
//! - Mock implementations are always available for host testing

pub mod sync;
pub mod time;

// Re-export traits and mock implementations (always available)
pub use sync::{MockState, SharedState};
pub use time::{MockTime, TimeSource};

#[cfg(feature = "embassy")]
pub use sync::EmbassyState;

#[cfg(feature = "embassy")]
pub use time::EmbassyTime;

#[cfg(feature = "std")]
pub use time::StdTime;
