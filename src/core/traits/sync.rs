//! Shared access to state reached from more than one task.
//!
//! Each `with`/`with_mut` call runs its closure as one critical section, so a
//! read-compare-write sequence inside the closure cannot interleave with
//! another task. On target the lock is Embassy's critical-section mutex; host
//! tests use a plain `RefCell`.

use core::cell::RefCell;

/// State behind a lock.
///
/// # Example
///
/// ```ignore
/// fn bump<S: SharedState<u32>>(state: &S) -> u32 {
///     state.with_mut(|count| {
///         *count += 1;
///         *count
///     })
/// }
/// ```
pub trait SharedState<T> {
    /// Run `f` with shared access.
    fn with<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&T) -> R;

    /// Run `f` with exclusive access.
    fn with_mut<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut T) -> R;
}

// ============================================================================
// Embassy Implementation
// ============================================================================

#[cfg(feature = "embassy")]
use embassy_sync::blocking_mutex::{raw::CriticalSectionRawMutex, Mutex};

/// State guarded by Embassy's critical-section mutex.
///
/// `new` is `const`, so the guarded value can live in a `static`.
#[cfg(feature = "embassy")]
pub struct EmbassyState<T> {
    lock: Mutex<CriticalSectionRawMutex, RefCell<T>>,
}

#[cfg(feature = "embassy")]
impl<T> EmbassyState<T> {
    /// Guard `value`.
    pub const fn new(value: T) -> Self {
        Self {
            lock: Mutex::new(RefCell::new(value)),
        }
    }
}

#[cfg(feature = "embassy")]
impl<T> SharedState<T> for EmbassyState<T> {
    fn with<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&T) -> R,
    {
        self.lock.lock(|cell| f(&cell.borrow()))
    }

    fn with_mut<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut T) -> R,
    {
        self.lock.lock(|cell| f(&mut cell.borrow_mut()))
    }
}

// ============================================================================
// Mock Implementation
// ============================================================================

/// Single-threaded stand-in for [`EmbassyState`] in host tests.
///
/// A nested `with_mut` inside `with` panics, which flags a re-entrant
/// access bug in the code under test.
pub struct MockState<T> {
    cell: RefCell<T>,
}

impl<T> MockState<T> {
    /// Guard `value`.
    pub fn new(value: T) -> Self {
        Self {
            cell: RefCell::new(value),
        }
    }

    /// Release the guarded value.
    pub fn into_inner(self) -> T {
        self.cell.into_inner()
    }
}

impl<T> SharedState<T> for MockState<T> {
    fn with<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&T) -> R,
    {
        f(&self.cell.borrow())
    }

    fn with_mut<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut T) -> R,
    {
        f(&mut self.cell.borrow_mut())
    }
}
