//! Millisecond clock abstraction for the save debounce.
//!
//! The ledger only asks "how long since the last flush", so the clock is a
//! monotonic millisecond counter. Embassy, std and mock sources implement it;
//! the mock lets host tests step through the five-minute save interval
//! without waiting.

use core::cell::Cell;

/// Monotonic millisecond clock.
///
/// - `EmbassyTime` on target, backed by the Embassy time driver
/// - `StdTime` on host builds with `std`
/// - `MockTime` for tests, advanced by hand
///
/// A shared reference to a clock is itself a clock, so a test can lend its
/// clock to the ledger and keep advancing it.
///
/// # Example
///
/// ```
/// use pico_odometer::core::traits::{MockTime, TimeSource};
///
/// let time = MockTime::new();
/// time.advance_ms(300_000);
/// assert_eq!(time.elapsed_ms_since(0), 300_000);
/// ```
pub trait TimeSource {
    /// Milliseconds since an arbitrary fixed origin (usually boot).
    fn now_ms(&self) -> u64;

    /// Milliseconds elapsed since `reference_ms`.
    ///
    /// Saturates to 0 if `reference_ms` lies in the future.
    fn elapsed_ms_since(&self, reference_ms: u64) -> u64 {
        self.now_ms().saturating_sub(reference_ms)
    }
}

impl<T: TimeSource + ?Sized> TimeSource for &T {
    fn now_ms(&self) -> u64 {
        (**self).now_ms()
    }
}

// ============================================================================
// Embassy Implementation
// ============================================================================

/// Clock backed by the Embassy time driver.
#[cfg(feature = "embassy")]
#[derive(Clone, Copy, Default)]
pub struct EmbassyTime;

#[cfg(feature = "embassy")]
impl TimeSource for EmbassyTime {
    fn now_ms(&self) -> u64 {
        embassy_time::Instant::now().as_millis()
    }
}

// ============================================================================
// std Implementation
// ============================================================================

/// Host clock measuring from its own creation.
#[cfg(feature = "std")]
#[derive(Clone, Copy)]
pub struct StdTime {
    origin: std::time::Instant,
}

#[cfg(feature = "std")]
impl StdTime {
    /// Creates a clock whose zero is now.
    pub fn new() -> Self {
        Self {
            origin: std::time::Instant::now(),
        }
    }
}

#[cfg(feature = "std")]
impl Default for StdTime {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "std")]
impl TimeSource for StdTime {
    fn now_ms(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }
}

// ============================================================================
// Mock Implementation
// ============================================================================

/// Hand-advanced clock for tests, starting at 0 ms.
#[derive(Clone, Default)]
pub struct MockTime {
    now_ms: Cell<u64>,
}

impl MockTime {
    /// Creates a clock at 0 ms.
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves the clock forward.
    pub fn advance_ms(&self, ms: u64) {
        self.now_ms.set(self.now_ms.get() + ms);
    }
}

impl TimeSource for MockTime {
    fn now_ms(&self) -> u64 {
        self.now_ms.get()
    }
}
