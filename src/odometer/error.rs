//! Ledger error types

use core::fmt;

/// Errors from ledger operations
///
/// None of these are fatal: the ledger keeps its in-memory total in every case.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LedgerError {
    /// Storage namespace could not be opened; running memory-only
    StorageUnavailable,
    /// Value is negative or not finite
    InvalidArgument,
    /// Storage was never opened, or the ledger was shut down
    NotInitialized,
    /// At least one slot write failed; memory state was kept
    WriteFailed,
}

impl fmt::Display for LedgerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LedgerError::StorageUnavailable => write!(f, "odometer storage unavailable"),
            LedgerError::InvalidArgument => write!(f, "invalid odometer value"),
            LedgerError::NotInitialized => write!(f, "odometer storage not initialized"),
            LedgerError::WriteFailed => write!(f, "odometer slot write failed"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for LedgerError {}
