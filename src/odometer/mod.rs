//! Odometer ledger
//!
//! [`DistanceLedger`] keeps the vehicle's cumulative distance across power
//! cycles. It sits between the wheel-encoder pipeline, which offers new totals
//! through [`DistanceLedger::update_total`], and a [`KeyValueStore`] holding a
//! primary and a backup copy of the total.
//!
//! ```text
//!  encoder task ──update_total──►┌────────────────┐
//!  display task ◄──total──────── │ DistanceLedger  │──put_f32──► KeyValueStore
//!  service menu ──set_initial──► └────────────────┘
//! ```
//!
//! Tasks that share one ledger reach it through [`SharedLedger`].
//!
//! [`KeyValueStore`]: crate::storage::KeyValueStore

pub mod config;
pub mod error;
pub mod ledger;
pub mod observer;
pub mod shared;

pub use config::{LedgerConfig, SlotKeys};
pub use error::LedgerError;
pub use ledger::{DistanceLedger, LedgerState};
pub use observer::{LedgerObserver, LogObserver, NoopObserver};
pub use shared::SharedLedger;

#[cfg(feature = "embassy")]
pub use shared::EmbassyLedger;
