//! Ledger observability hook
//!
//! The ledger never logs on its own; it reports every recovery, flush and
//! failure to a [`LedgerObserver`]. [`NoopObserver`] discards everything,
//! [`LogObserver`] forwards to the crate's log macros.

use crate::storage::StorageError;

/// Receiver of ledger events
///
/// Every method has an empty default body, so implementors only override the
/// events they care about.
pub trait LedgerObserver {
    /// Storage opened and both slots read
    fn recovered(&mut self, primary: f32, backup: f32, total: f32) {
        let _ = (primary, backup, total);
    }

    /// Storage namespace could not be opened
    fn storage_unavailable(&mut self, error: StorageError) {
        let _ = error;
    }

    /// Both slots written with `total`
    fn flushed(&mut self, total: f32) {
        let _ = total;
    }

    /// A slot write failed; memory state is kept
    fn write_failed(&mut self, key: &str, value: f32, error: StorageError) {
        let _ = (key, value, error);
    }

    /// An administrative value was refused
    fn rejected(&mut self, value: f32) {
        let _ = value;
    }

    /// Storage released while progress was still unsaved
    fn released_unsaved(&mut self, unsaved_km: f32) {
        let _ = unsaved_km;
    }
}

/// Observer that ignores every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl LedgerObserver for NoopObserver {}

/// Observer that forwards events to the log macros
#[derive(Debug, Default, Clone, Copy)]
pub struct LogObserver;

impl LedgerObserver for LogObserver {
    fn recovered(&mut self, primary: f32, backup: f32, total: f32) {
        if primary != backup {
            crate::log_warn!(
                "Odometer slots disagree (primary {} km, backup {} km)",
                primary,
                backup
            );
        }
        crate::log_info!("Odometer recovered at {} km", total);
    }

    fn storage_unavailable(&mut self, _error: StorageError) {
        crate::log_error!("Odometer storage unavailable, running memory-only");
    }

    fn flushed(&mut self, total: f32) {
        crate::log_debug!("Odometer saved at {} km", total);
    }

    fn write_failed(&mut self, key: &str, value: f32, _error: StorageError) {
        crate::log_error!("Odometer write of {} = {} km failed", key, value);
    }

    fn rejected(&mut self, value: f32) {
        crate::log_warn!("Rejected odometer value {} km", value);
    }

    fn released_unsaved(&mut self, unsaved_km: f32) {
        crate::log_warn!("Odometer released with {} km unsaved", unsaved_km);
    }
}
