//! Ledger shared between tasks
//!
//! The encoder task offers totals, the display task reads them and the
//! service menu recalibrates, all against one ledger. [`SharedLedger`] gives
//! each of them a one-call API over any [`SharedState`] holding the ledger,
//! so the ratchet compare and the flush it may trigger run inside a single
//! critical section.
//!
//! # Example
//!
//! ```ignore
//! static ODOMETER: EmbassyLedger<FlashStore<Rp2350Flash>, EmbassyTime> =
//!     EmbassyState::new(DistanceLedger::new(FlashStore::new(FLASH), EmbassyTime));
//!
//! // encoder task
//! ODOMETER.record_km(wheel.total_km());
//!
//! // display task
//! let km = ODOMETER.total_km();
//! ```

use super::error::LedgerError;
use super::ledger::DistanceLedger;
use super::observer::LedgerObserver;
use crate::core::traits::{SharedState, TimeSource};
use crate::storage::KeyValueStore;

#[cfg(feature = "embassy")]
use super::observer::NoopObserver;
#[cfg(feature = "embassy")]
use crate::core::traits::EmbassyState;

/// Ledger guarded by Embassy's critical-section mutex
#[cfg(feature = "embassy")]
pub type EmbassyLedger<S, T, O = NoopObserver> = EmbassyState<DistanceLedger<S, T, O>>;

/// Ledger operations through a lock
pub trait SharedLedger<S, T, O>: SharedState<DistanceLedger<S, T, O>>
where
    S: KeyValueStore,
    T: TimeSource,
    O: LedgerObserver,
{
    /// Open storage and recover the total
    fn initialize(&self) -> Result<(), LedgerError> {
        self.with_mut(|ledger| ledger.initialize())
    }

    /// Offer a new cumulative distance (km)
    fn record_km(&self, km: f32) {
        self.with_mut(|ledger| ledger.update_total(km))
    }

    /// Current cumulative distance (km)
    fn total_km(&self) -> f32 {
        self.with(|ledger| ledger.total())
    }

    /// Distance since the last trip reset (km)
    fn trip_km(&self) -> f32 {
        self.with(|ledger| ledger.trip_km())
    }

    /// Overwrite the total and flush now
    fn calibrate(&self, km: f32) -> Result<(), LedgerError> {
        self.with_mut(|ledger| ledger.set_initial_value(km))
    }

    /// Start a new trip and flush now
    fn reset_trip(&self) -> Result<(), LedgerError> {
        self.with_mut(|ledger| ledger.reset_trip())
    }

    /// Final flush, then release storage
    fn shutdown(&self) -> Result<(), LedgerError> {
        self.with_mut(|ledger| ledger.shutdown())
    }
}

impl<M, S, T, O> SharedLedger<S, T, O> for M
where
    M: SharedState<DistanceLedger<S, T, O>>,
    S: KeyValueStore,
    T: TimeSource,
    O: LedgerObserver,
{
}
