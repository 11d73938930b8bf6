//! Distance ledger
//!
//! Owns the cumulative distance, decides when it is worth writing to
//! non-volatile storage, and recovers the best value at boot.
//!
//! # Redundancy
//!
//! Every flush writes the same total to two keys, backup first and primary
//! second. Power loss can interrupt at most one of the two writes, so at boot
//! one slot holds the newest value and the other holds either the same value or
//! the previous one. Taking the larger of the two always recovers the newest
//! value that reached storage.
//!
//! # Debounce
//!
//! `update_total` only flushes when at least `min_distance_km` is unsaved
//! **and** `min_save_interval_ms` has passed since the last flush. Worst-case
//! loss on power failure is bounded by the unsaved distance, and Flash sees at
//! most one flush per interval, none while the vehicle stands still.
//!
//! # State Machine
//!
//! ```text
//!                 initialize() ok
//! Uninitialized ───────────────────► Initialized ◄──┐ update_total / set_initial_value
//!      ▲  │ initialize() err               │  └─────┘ reset_trip / flush
//!      │  └──► (memory-only, total 0)      │ shutdown()
//!      │                                   ▼
//!      └──────────── initialize() ◄──── ShutDown
//! ```

use super::config::{LedgerConfig, SlotKeys};
use super::error::LedgerError;
use super::observer::{LedgerObserver, NoopObserver};
use crate::core::traits::TimeSource;
use crate::storage::{KeyValueStore, NamespaceHandle};

/// Ledger lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LedgerState {
    /// Storage not opened (never, or the last attempt failed)
    Uninitialized,
    /// Storage open, totals tracked and flushed
    Initialized,
    /// Final flush done, storage released
    ShutDown,
}

/// Cumulative distance with redundant, debounced persistence
///
/// # Example
///
/// ```no_run
/// use pico_odometer::core::traits::MockTime;
/// use pico_odometer::odometer::DistanceLedger;
/// use pico_odometer::platform::mock::MockFlash;
/// use pico_odometer::storage::FlashStore;
///
/// let time = MockTime::new();
/// let mut ledger = DistanceLedger::new(FlashStore::new(MockFlash::new()), &time);
/// ledger.initialize().unwrap();
///
/// ledger.update_total(0.35);
/// assert_eq!(ledger.total(), 0.35);
///
/// ledger.shutdown().unwrap();
/// ```
pub struct DistanceLedger<S, T, O = NoopObserver>
where
    S: KeyValueStore,
    T: TimeSource,
    O: LedgerObserver,
{
    store: S,
    time: T,
    observer: O,
    config: LedgerConfig,
    /// Open namespace; `Some` exactly while `Initialized`
    handle: Option<NamespaceHandle>,
    state: LedgerState,
    current_total: f32,
    last_saved_total: f32,
    last_save_ms: u64,
    /// Total at the last trip reset
    trip_origin: f32,
    saved_trip_origin: f32,
}

impl<S, T> DistanceLedger<S, T, NoopObserver>
where
    S: KeyValueStore,
    T: TimeSource,
{
    /// Create a ledger with the default configuration and no observer
    ///
    /// Storage is not touched until [`initialize`](Self::initialize).
    pub fn new(store: S, time: T) -> Self {
        Self::with_observer(store, time, LedgerConfig::default(), NoopObserver)
    }

    /// Create a ledger with a custom configuration and no observer
    pub fn with_config(store: S, time: T, config: LedgerConfig) -> Self {
        Self::with_observer(store, time, config, NoopObserver)
    }
}

impl<S, T, O> DistanceLedger<S, T, O>
where
    S: KeyValueStore,
    T: TimeSource,
    O: LedgerObserver,
{
    /// Create a ledger reporting to `observer`
    pub fn with_observer(store: S, time: T, config: LedgerConfig, observer: O) -> Self {
        Self {
            store,
            time,
            observer,
            config,
            handle: None,
            state: LedgerState::Uninitialized,
            current_total: 0.0,
            last_saved_total: 0.0,
            last_save_ms: 0,
            trip_origin: 0.0,
            saved_trip_origin: 0.0,
        }
    }

    /// Open storage and recover the total
    ///
    /// The recovered total is the larger of the primary and backup slots;
    /// absent or unusable slots count as 0. A no-op when already initialized.
    ///
    /// # Errors
    ///
    /// `LedgerError::StorageUnavailable` if the namespace cannot be opened.
    /// The ledger then stays memory-only until a later call succeeds.
    pub fn initialize(&mut self) -> Result<(), LedgerError> {
        if self.state == LedgerState::Initialized {
            return Ok(());
        }

        let handle = match self.store.open(self.config.namespace) {
            Ok(handle) => handle,
            Err(e) => {
                self.state = LedgerState::Uninitialized;
                self.observer.storage_unavailable(e);
                return Err(LedgerError::StorageUnavailable);
            }
        };

        let (primary, backup) = read_pair(&mut self.store, &handle, self.config.total_keys);
        let recovered = primary.max(backup);

        let (trip_primary, trip_backup) =
            read_pair(&mut self.store, &handle, self.config.trip_keys);
        let trip_origin = trip_primary.max(trip_backup).min(recovered);

        // A re-open after shutdown never moves the total backward
        self.current_total = self.current_total.max(recovered);
        self.last_saved_total = recovered;
        self.last_save_ms = self.time.now_ms();
        self.trip_origin = trip_origin;
        self.saved_trip_origin = trip_origin;
        self.handle = Some(handle);
        self.state = LedgerState::Initialized;

        self.observer.recovered(primary, backup, self.current_total);
        Ok(())
    }

    /// Current cumulative distance (km)
    pub fn total(&self) -> f32 {
        self.current_total
    }

    /// Offer a freshly measured cumulative distance (km)
    ///
    /// Accepted only if it is finite and greater than the current total;
    /// anything else, or any call while not initialized, is ignored. An
    /// accepted value flushes to storage when the debounce thresholds are met.
    pub fn update_total(&mut self, new_value: f32) {
        if self.state != LedgerState::Initialized {
            return;
        }
        if !new_value.is_finite() || new_value <= self.current_total {
            return;
        }

        self.current_total = new_value;

        if self.flush_due() {
            // Failures already went to the observer; retried on the next update
            let _ = self.flush();
        }
    }

    /// Overwrite the total (factory setup or manual correction) and flush now
    ///
    /// Bypasses both the ratchet and the debounce. The trip origin is clamped
    /// so the trip distance never exceeds the new total.
    ///
    /// # Errors
    ///
    /// - `LedgerError::InvalidArgument` if `value` is negative or not finite;
    ///   nothing changes
    /// - `LedgerError::NotInitialized` if storage is not open
    /// - `LedgerError::WriteFailed` if a total slot write failed; the new total is
    ///   kept in memory regardless
    pub fn set_initial_value(&mut self, value: f32) -> Result<(), LedgerError> {
        if !value.is_finite() || value < 0.0 {
            self.observer.rejected(value);
            return Err(LedgerError::InvalidArgument);
        }
        if self.state != LedgerState::Initialized {
            return Err(LedgerError::NotInitialized);
        }

        self.current_total = value;
        self.last_saved_total = value;
        self.trip_origin = self.trip_origin.min(value);

        self.flush()
    }

    /// Start a new trip at the current total and flush now
    ///
    /// # Errors
    ///
    /// `LedgerError::NotInitialized` if storage is not open,
    /// `LedgerError::WriteFailed` if a total or trip slot write failed.
    pub fn reset_trip(&mut self) -> Result<(), LedgerError> {
        if self.state != LedgerState::Initialized {
            return Err(LedgerError::NotInitialized);
        }

        self.trip_origin = self.current_total;
        let outcome = self.write_slots()?;
        if outcome.total_saved && outcome.trip_saved {
            Ok(())
        } else {
            Err(LedgerError::WriteFailed)
        }
    }

    /// Distance since the last trip reset (km)
    pub fn trip_km(&self) -> f32 {
        (self.current_total - self.trip_origin).max(0.0)
    }

    /// Write both total slots now, ignoring the debounce thresholds
    ///
    /// Trip slots are only rewritten when the trip origin changed since they
    /// were last saved; a failed trip write is reported to the observer and
    /// retried on the next flush without failing this one. Every slot is
    /// attempted even if an earlier one fails.
    ///
    /// # Errors
    ///
    /// `LedgerError::NotInitialized` if storage is not open,
    /// `LedgerError::WriteFailed` if a total slot write failed.
    pub fn flush(&mut self) -> Result<(), LedgerError> {
        let outcome = self.write_slots()?;
        if outcome.total_saved {
            Ok(())
        } else {
            Err(LedgerError::WriteFailed)
        }
    }

    /// Final flush, then release storage
    ///
    /// The handle is released even when the flush fails.
    ///
    /// # Errors
    ///
    /// `LedgerError::NotInitialized` if storage is not open,
    /// `LedgerError::WriteFailed` if the final flush failed.
    pub fn shutdown(&mut self) -> Result<(), LedgerError> {
        if self.state != LedgerState::Initialized {
            return Err(LedgerError::NotInitialized);
        }

        let result = self.flush();

        if let Some(handle) = self.handle.take() {
            self.store.close(handle);
        }
        self.state = LedgerState::ShutDown;

        result
    }

    /// Whether storage is open
    pub fn is_initialized(&self) -> bool {
        self.state == LedgerState::Initialized
    }

    /// Lifecycle state
    pub fn state(&self) -> LedgerState {
        self.state
    }

    /// Distance not yet written to storage (km)
    pub fn unsaved_km(&self) -> f32 {
        self.current_total - self.last_saved_total
    }

    /// Total as of the last successful flush (km)
    pub fn last_saved_total(&self) -> f32 {
        self.last_saved_total
    }

    /// Clock reading at the last successful flush (ms)
    pub fn last_save_ms(&self) -> u64 {
        self.last_save_ms
    }

    /// Configuration in use
    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// Borrow the storage backend
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Borrow the observer
    pub fn observer(&self) -> &O {
        &self.observer
    }

    /// Mutably borrow the observer
    pub fn observer_mut(&mut self) -> &mut O {
        &mut self.observer
    }

    fn write_slots(&mut self) -> Result<FlushOutcome, LedgerError> {
        let handle = self.handle.as_ref().ok_or(LedgerError::NotInitialized)?;

        let total = self.current_total;
        let trip_origin = self.trip_origin;

        let total_saved = write_pair(
            &mut self.store,
            &mut self.observer,
            handle,
            self.config.total_keys,
            total,
        );

        let trip_saved = trip_origin == self.saved_trip_origin
            || write_pair(
                &mut self.store,
                &mut self.observer,
                handle,
                self.config.trip_keys,
                trip_origin,
            );
        if trip_saved {
            self.saved_trip_origin = trip_origin;
        }

        if total_saved {
            self.last_saved_total = total;
            self.last_save_ms = self.time.now_ms();
            self.observer.flushed(total);
        }

        Ok(FlushOutcome {
            total_saved,
            trip_saved,
        })
    }

    fn flush_due(&self) -> bool {
        let unsaved = self.current_total - self.last_saved_total;
        let elapsed = self.time.elapsed_ms_since(self.last_save_ms);
        unsaved >= self.config.min_distance_km && elapsed >= self.config.min_save_interval_ms
    }
}

impl<S, T, O> Drop for DistanceLedger<S, T, O>
where
    S: KeyValueStore,
    T: TimeSource,
    O: LedgerObserver,
{
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            let unsaved = self.current_total - self.last_saved_total;
            if unsaved > 0.0 {
                self.observer.released_unsaved(unsaved);
            }
            self.store.close(handle);
        }
    }
}

/// Which slot pairs reached storage in one flush
#[derive(Debug, Clone, Copy)]
struct FlushOutcome {
    total_saved: bool,
    trip_saved: bool,
}

/// Read a slot pair, treating unusable values as absent
fn read_pair<S: KeyValueStore>(store: &mut S, handle: &NamespaceHandle, keys: SlotKeys) -> (f32, f32) {
    let primary = sanitize(store.get_f32(handle, keys.primary, 0.0));
    let backup = sanitize(store.get_f32(handle, keys.backup, 0.0));
    (primary, backup)
}

/// Write a slot pair, backup first; returns whether both writes succeeded
fn write_pair<S: KeyValueStore, O: LedgerObserver>(
    store: &mut S,
    observer: &mut O,
    handle: &NamespaceHandle,
    keys: SlotKeys,
    value: f32,
) -> bool {
    let mut ok = true;
    for key in [keys.backup, keys.primary] {
        if let Err(e) = store.put_f32(handle, key, value) {
            observer.write_failed(key, value, e);
            ok = false;
        }
    }
    ok
}

fn sanitize(value: f32) -> f32 {
    if value.is_finite() && value >= 0.0 {
        value
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::traits::MockTime;
    use crate::storage::{hash_name, StorageError};
    use std::collections::BTreeMap;
    use std::string::{String, ToString};
    use std::vec::Vec;

    /// In-memory store with failure knobs
    #[derive(Default)]
    struct MemoryStore {
        values: BTreeMap<String, f32>,
        unavailable: bool,
        failing_keys: Vec<&'static str>,
        puts: Vec<(String, f32)>,
        open: bool,
    }

    impl MemoryStore {
        fn with_slots(primary: f32, backup: f32) -> Self {
            let mut store = Self::default();
            store.values.insert("total".to_string(), primary);
            store.values.insert("total_bak".to_string(), backup);
            store
        }
    }

    impl KeyValueStore for MemoryStore {
        fn open(&mut self, namespace: &str) -> Result<NamespaceHandle, StorageError> {
            if self.unavailable {
                return Err(StorageError::Unavailable);
            }
            if self.open {
                return Err(StorageError::AlreadyOpen);
            }
            self.open = true;
            Ok(NamespaceHandle::new(hash_name(namespace)))
        }

        fn get_f32(&mut self, _handle: &NamespaceHandle, key: &str, default: f32) -> f32 {
            self.values.get(key).copied().unwrap_or(default)
        }

        fn put_f32(
            &mut self,
            _handle: &NamespaceHandle,
            key: &str,
            value: f32,
        ) -> Result<(), StorageError> {
            if self.failing_keys.contains(&key) {
                return Err(StorageError::Unavailable);
            }
            self.values.insert(key.to_string(), value);
            self.puts.push((key.to_string(), value));
            Ok(())
        }

        fn close(&mut self, _handle: NamespaceHandle) {
            self.open = false;
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    enum Event {
        Recovered(f32, f32, f32),
        Unavailable,
        Flushed(f32),
        WriteFailed(String),
        Rejected(f32),
        ReleasedUnsaved,
    }

    #[derive(Default)]
    struct Recorder {
        events: Vec<Event>,
    }

    impl Recorder {
        fn flushes(&self) -> usize {
            self.events
                .iter()
                .filter(|e| matches!(e, Event::Flushed(_)))
                .count()
        }
    }

    impl LedgerObserver for Recorder {
        fn recovered(&mut self, primary: f32, backup: f32, total: f32) {
            self.events.push(Event::Recovered(primary, backup, total));
        }
        fn storage_unavailable(&mut self, _error: StorageError) {
            self.events.push(Event::Unavailable);
        }
        fn flushed(&mut self, total: f32) {
            self.events.push(Event::Flushed(total));
        }
        fn write_failed(&mut self, key: &str, _value: f32, _error: StorageError) {
            self.events.push(Event::WriteFailed(key.to_string()));
        }
        fn rejected(&mut self, value: f32) {
            self.events.push(Event::Rejected(value));
        }
        fn released_unsaved(&mut self, _unsaved_km: f32) {
            self.events.push(Event::ReleasedUnsaved);
        }
    }

    type TestLedger<'a> = DistanceLedger<MemoryStore, &'a MockTime, Recorder>;

    fn ledger(store: MemoryStore, time: &MockTime) -> TestLedger<'_> {
        DistanceLedger::with_observer(store, time, LedgerConfig::default(), Recorder::default())
    }

    /// Ledger at 10.0 km with a flush at t=0
    fn ledger_at_ten(time: &MockTime) -> TestLedger<'_> {
        let mut ledger = ledger(MemoryStore::default(), time);
        ledger.initialize().unwrap();
        ledger.set_initial_value(10.0).unwrap();
        ledger.observer_mut().events.clear();
        ledger
    }

    #[test]
    fn test_recovery_takes_larger_primary() {
        let time = MockTime::new();
        let mut ledger = ledger(MemoryStore::with_slots(5.2, 5.0), &time);
        ledger.initialize().unwrap();

        assert_eq!(ledger.total(), 5.2);
        assert_eq!(ledger.last_saved_total(), 5.2);
        assert_eq!(
            ledger.observer().events,
            vec![Event::Recovered(5.2, 5.0, 5.2)]
        );
    }

    #[test]
    fn test_recovery_takes_larger_backup() {
        let time = MockTime::new();
        let mut ledger = ledger(MemoryStore::with_slots(3.0, 7.5), &time);
        ledger.initialize().unwrap();
        assert_eq!(ledger.total(), 7.5);
    }

    #[test]
    fn test_recovery_defaults_absent_slots_to_zero() {
        let time = MockTime::new();
        let mut ledger = ledger(MemoryStore::default(), &time);
        ledger.initialize().unwrap();

        assert_eq!(ledger.total(), 0.0);
        assert!(ledger.is_initialized());
        assert_eq!(ledger.state(), LedgerState::Initialized);
    }

    #[test]
    fn test_recovery_ignores_unusable_slot_values() {
        let time = MockTime::new();
        let mut ledger = ledger(MemoryStore::with_slots(f32::NAN, 4.0), &time);
        ledger.initialize().unwrap();
        assert_eq!(ledger.total(), 4.0);

        let mut ledger = self::ledger(MemoryStore::with_slots(-3.0, f32::INFINITY), &time);
        ledger.initialize().unwrap();
        assert_eq!(ledger.total(), 0.0);
    }

    #[test]
    fn test_storage_unavailable_runs_memory_only() {
        let time = MockTime::new();
        let store = MemoryStore {
            unavailable: true,
            ..Default::default()
        };
        let mut ledger = ledger(store, &time);

        assert_eq!(ledger.initialize(), Err(LedgerError::StorageUnavailable));
        assert_eq!(ledger.state(), LedgerState::Uninitialized);
        assert_eq!(ledger.observer().events, vec![Event::Unavailable]);

        ledger.update_total(3.0);
        assert_eq!(ledger.total(), 0.0);
        assert_eq!(ledger.set_initial_value(3.0), Err(LedgerError::NotInitialized));
        assert_eq!(ledger.reset_trip(), Err(LedgerError::NotInitialized));
        assert_eq!(ledger.shutdown(), Err(LedgerError::NotInitialized));
        assert_eq!(ledger.total(), 0.0);
    }

    #[test]
    fn test_initialize_retry_after_unavailable() {
        let time = MockTime::new();
        let store = MemoryStore {
            unavailable: true,
            ..MemoryStore::with_slots(2.0, 2.0)
        };
        let mut ledger = ledger(store, &time);
        assert!(ledger.initialize().is_err());

        // Storage comes back
        ledger.store.unavailable = false;
        ledger.initialize().unwrap();
        assert_eq!(ledger.total(), 2.0);
    }

    #[test]
    fn test_initialize_is_idempotent() {
        let time = MockTime::new();
        let mut ledger = ledger(MemoryStore::with_slots(1.0, 1.0), &time);
        ledger.initialize().unwrap();
        ledger.update_total(1.05);
        ledger.initialize().unwrap();

        assert_eq!(ledger.total(), 1.05);
        assert_eq!(ledger.observer().events.len(), 1);
    }

    #[test]
    fn test_update_is_monotonic() {
        let time = MockTime::new();
        let mut ledger = ledger(MemoryStore::default(), &time);
        ledger.initialize().unwrap();

        let readings = [0.5, 0.4, 0.5, 1.2, 0.0, 1.1, 2.0, 1.999];
        let mut previous = ledger.total();
        for reading in readings {
            ledger.update_total(reading);
            assert!(ledger.total() >= previous);
            previous = ledger.total();
        }
        assert_eq!(ledger.total(), 2.0);
    }

    #[test]
    fn test_update_ignores_non_finite() {
        let time = MockTime::new();
        let mut ledger = ledger(MemoryStore::with_slots(1.0, 1.0), &time);
        ledger.initialize().unwrap();

        ledger.update_total(f32::NAN);
        ledger.update_total(f32::INFINITY);
        assert_eq!(ledger.total(), 1.0);
    }

    #[test]
    fn test_update_equal_or_lower_leaves_state() {
        let time = MockTime::new();
        let mut ledger = ledger_at_ten(&time);
        time.advance_ms(400_000);

        ledger.update_total(10.0);
        ledger.update_total(9.0);
        assert_eq!(ledger.total(), 10.0);
        assert_eq!(ledger.last_save_ms(), 0);
        assert_eq!(ledger.observer().flushes(), 0);
    }

    #[test]
    fn test_debounce_distance_threshold_unmet() {
        let time = MockTime::new();
        let mut ledger = ledger_at_ten(&time);

        time.advance_ms(1_000);
        ledger.update_total(10.05);
        assert_eq!(ledger.observer().flushes(), 0);
        assert_eq!(ledger.last_saved_total(), 10.0);
    }

    #[test]
    fn test_debounce_time_threshold_unmet() {
        let time = MockTime::new();
        let mut ledger = ledger_at_ten(&time);

        time.advance_ms(1_000);
        ledger.update_total(10.2);
        assert_eq!(ledger.observer().flushes(), 0);
        assert_eq!(ledger.unsaved_km(), 10.2 - 10.0);
    }

    #[test]
    fn test_debounce_both_thresholds_met() {
        let time = MockTime::new();
        let mut ledger = ledger_at_ten(&time);

        time.advance_ms(301_000);
        ledger.update_total(10.2);
        assert_eq!(ledger.observer().events, vec![Event::Flushed(10.2)]);
        assert_eq!(ledger.last_saved_total(), 10.2);
        assert_eq!(ledger.last_save_ms(), 301_000);
        assert_eq!(ledger.store().values.get("total"), Some(&10.2));
        assert_eq!(ledger.store().values.get("total_bak"), Some(&10.2));
    }

    #[test]
    fn test_debounce_waits_for_distance_after_interval() {
        let time = MockTime::new();
        let mut ledger = ledger_at_ten(&time);

        time.advance_ms(600_000);
        ledger.update_total(10.05);
        assert_eq!(ledger.observer().flushes(), 0);
        ledger.update_total(10.15);
        assert_eq!(ledger.observer().flushes(), 1);
    }

    #[test]
    fn test_debounce_sequence_on_one_ledger() {
        let time = MockTime::new();
        let mut ledger = ledger_at_ten(&time);

        // Distance short
        time.advance_ms(1_000);
        ledger.update_total(10.05);
        assert_eq!(ledger.observer().flushes(), 0);

        // Time short
        ledger.update_total(10.2);
        assert_eq!(ledger.observer().flushes(), 0);
        assert_eq!(ledger.last_saved_total(), 10.0);

        // Both met; equal value is not an update, a higher one flushes
        time.advance_ms(300_000);
        ledger.update_total(10.2);
        assert_eq!(ledger.observer().flushes(), 0);
        ledger.update_total(10.21);
        assert_eq!(ledger.observer().events, vec![Event::Flushed(10.21)]);
        assert_eq!(ledger.last_save_ms(), 301_000);
    }

    #[test]
    fn test_flush_writes_backup_before_primary() {
        let time = MockTime::new();
        let mut ledger = ledger(MemoryStore::default(), &time);
        ledger.initialize().unwrap();
        ledger.set_initial_value(3.0).unwrap();

        let keys: Vec<&str> = ledger.store().puts.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["total_bak", "total"]);
    }

    #[test]
    fn test_failed_flush_retried_on_next_update() {
        let time = MockTime::new();
        let mut ledger = ledger_at_ten(&time);

        ledger.store.failing_keys.push("total");
        time.advance_ms(301_000);
        ledger.update_total(10.2);
        assert_eq!(ledger.last_saved_total(), 10.0);
        assert_eq!(
            ledger.observer().events,
            vec![Event::WriteFailed("total".to_string())]
        );

        ledger.store.failing_keys.clear();
        ledger.update_total(10.25);
        assert_eq!(ledger.last_saved_total(), 10.25);
        assert_eq!(ledger.observer().flushes(), 1);
    }

    #[test]
    fn test_set_initial_value_rejects_negative() {
        let time = MockTime::new();
        let mut ledger = ledger_at_ten(&time);

        assert_eq!(ledger.set_initial_value(-1.0), Err(LedgerError::InvalidArgument));
        assert_eq!(ledger.total(), 10.0);
        assert_eq!(ledger.observer().events, vec![Event::Rejected(-1.0)]);
    }

    #[test]
    fn test_set_initial_value_rejects_non_finite() {
        let time = MockTime::new();
        let mut ledger = ledger_at_ten(&time);

        assert_eq!(
            ledger.set_initial_value(f32::INFINITY),
            Err(LedgerError::InvalidArgument)
        );
        assert_eq!(ledger.set_initial_value(f32::NAN), Err(LedgerError::InvalidArgument));
        assert_eq!(ledger.total(), 10.0);
    }

    #[test]
    fn test_set_initial_value_can_lower_total() {
        let time = MockTime::new();
        let mut ledger = ledger_at_ten(&time);

        ledger.set_initial_value(4.0).unwrap();
        assert_eq!(ledger.total(), 4.0);
        assert_eq!(ledger.store().values.get("total"), Some(&4.0));
        assert_eq!(ledger.store().values.get("total_bak"), Some(&4.0));
    }

    #[test]
    fn test_set_initial_value_write_failure_keeps_memory() {
        let time = MockTime::new();
        let mut ledger = ledger_at_ten(&time);
        ledger.store.failing_keys.push("total_bak");

        assert_eq!(ledger.set_initial_value(20.0), Err(LedgerError::WriteFailed));
        assert_eq!(ledger.total(), 20.0);
        assert_eq!(ledger.last_saved_total(), 20.0);
        // Primary still attempted and written
        assert_eq!(ledger.store().values.get("total"), Some(&20.0));
        assert_eq!(
            ledger.observer().events,
            vec![Event::WriteFailed("total_bak".to_string())]
        );
    }

    #[test]
    fn test_shutdown_flushes_unsaved_progress() {
        let time = MockTime::new();
        let mut ledger = ledger_at_ten(&time);

        time.advance_ms(1_000);
        ledger.update_total(10.03);
        assert_eq!(ledger.observer().flushes(), 0);

        ledger.shutdown().unwrap();
        assert_eq!(ledger.store().values.get("total"), Some(&10.03));
        assert_eq!(ledger.store().values.get("total_bak"), Some(&10.03));
        assert_eq!(ledger.state(), LedgerState::ShutDown);
        assert!(!ledger.store().open);
    }

    #[test]
    fn test_calls_after_shutdown() {
        let time = MockTime::new();
        let mut ledger = ledger_at_ten(&time);
        ledger.shutdown().unwrap();

        ledger.update_total(50.0);
        assert_eq!(ledger.total(), 10.0);
        assert_eq!(ledger.set_initial_value(1.0), Err(LedgerError::NotInitialized));
        assert_eq!(ledger.shutdown(), Err(LedgerError::NotInitialized));
        assert_eq!(ledger.flush(), Err(LedgerError::NotInitialized));
    }

    #[test]
    fn test_shutdown_releases_handle_on_write_failure() {
        let time = MockTime::new();
        let mut ledger = ledger_at_ten(&time);
        ledger.update_total(10.01);
        ledger.store.failing_keys.push("total");

        assert_eq!(ledger.shutdown(), Err(LedgerError::WriteFailed));
        assert!(!ledger.store().open);
        assert_eq!(ledger.state(), LedgerState::ShutDown);
    }

    #[test]
    fn test_reinitialize_after_shutdown_never_decreases() {
        let time = MockTime::new();
        let mut ledger = ledger_at_ten(&time);
        ledger.update_total(10.01);
        ledger.store.failing_keys.extend(["total", "total_bak"]);
        assert!(ledger.shutdown().is_err());

        ledger.store.failing_keys.clear();
        ledger.initialize().unwrap();
        assert_eq!(ledger.total(), 10.01);
        assert_eq!(ledger.last_saved_total(), 10.0);
    }

    #[test]
    fn test_failed_reinitialize_after_shutdown_is_uninitialized() {
        let time = MockTime::new();
        let mut ledger = ledger_at_ten(&time);
        ledger.shutdown().unwrap();
        ledger.store.unavailable = true;

        assert_eq!(ledger.initialize(), Err(LedgerError::StorageUnavailable));
        assert_eq!(ledger.state(), LedgerState::Uninitialized);
        assert_eq!(ledger.total(), 10.0);
    }

    #[test]
    fn test_drop_reports_unsaved_to_observer() {
        struct Flag<'a>(&'a core::cell::Cell<bool>);
        impl LedgerObserver for Flag<'_> {
            fn released_unsaved(&mut self, _unsaved_km: f32) {
                self.0.set(true);
            }
        }

        let time = MockTime::new();
        let released = core::cell::Cell::new(false);
        let mut ledger = DistanceLedger::with_observer(
            MemoryStore::default(),
            &time,
            LedgerConfig::default(),
            Flag(&released),
        );
        ledger.initialize().unwrap();
        ledger.update_total(0.05);
        drop(ledger);

        assert!(released.get());
    }

    #[test]
    fn test_trip_tracks_distance_since_reset() {
        let time = MockTime::new();
        let mut ledger = ledger_at_ten(&time);
        assert_eq!(ledger.trip_km(), 10.0);

        ledger.reset_trip().unwrap();
        assert_eq!(ledger.trip_km(), 0.0);
        assert_eq!(ledger.store().values.get("trip"), Some(&10.0));
        assert_eq!(ledger.store().values.get("trip_bak"), Some(&10.0));

        ledger.update_total(12.5);
        assert_eq!(ledger.trip_km(), 2.5);
    }

    #[test]
    fn test_trip_slots_written_only_when_origin_changes() {
        let time = MockTime::new();
        let mut ledger = ledger_at_ten(&time);
        ledger.store.puts.clear();

        time.advance_ms(301_000);
        ledger.update_total(11.0);
        let keys: Vec<&str> = ledger.store().puts.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["total_bak", "total"]);
    }

    #[test]
    fn test_trip_write_failure_does_not_fail_total_flush() {
        let time = MockTime::new();
        let mut ledger = ledger_at_ten(&time);
        ledger.reset_trip().unwrap();
        ledger.store.failing_keys.push("trip_bak");
        ledger.observer_mut().events.clear();

        assert_eq!(ledger.set_initial_value(5.0), Ok(()));
        assert_eq!(ledger.store().values.get("total"), Some(&5.0));
        assert_eq!(ledger.store().values.get("total_bak"), Some(&5.0));
        assert_eq!(
            ledger.observer().events,
            vec![Event::WriteFailed("trip_bak".to_string()), Event::Flushed(5.0)]
        );

        // Trip origin stays pending and is written on the next flush
        ledger.store.failing_keys.clear();
        ledger.store.puts.clear();
        ledger.flush().unwrap();
        let keys: Vec<&str> = ledger.store().puts.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["total_bak", "total", "trip_bak", "trip"]);
        assert_eq!(ledger.store().values.get("trip_bak"), Some(&5.0));
    }

    #[test]
    fn test_reset_trip_reports_trip_write_failure() {
        let time = MockTime::new();
        let mut ledger = ledger_at_ten(&time);
        ledger.store.failing_keys.push("trip");

        assert_eq!(ledger.reset_trip(), Err(LedgerError::WriteFailed));
        assert_eq!(ledger.trip_km(), 0.0);
        assert_eq!(ledger.observer().flushes(), 1);
    }

    #[test]
    fn test_trip_origin_recovered_and_clamped() {
        let time = MockTime::new();
        let mut store = MemoryStore::with_slots(8.0, 8.0);
        store.values.insert("trip".to_string(), 9.5);
        store.values.insert("trip_bak".to_string(), 6.0);

        let mut ledger = ledger(store, &time);
        ledger.initialize().unwrap();
        // Origin can never sit above the total
        assert_eq!(ledger.trip_km(), 0.0);

        let mut store = MemoryStore::with_slots(8.0, 8.0);
        store.values.insert("trip".to_string(), 5.0);
        store.values.insert("trip_bak".to_string(), 6.0);
        let mut ledger = self::ledger(store, &time);
        ledger.initialize().unwrap();
        assert_eq!(ledger.trip_km(), 2.0);
    }

    #[test]
    fn test_recalibration_clamps_trip_origin() {
        let time = MockTime::new();
        let mut ledger = ledger_at_ten(&time);
        ledger.reset_trip().unwrap();
        ledger.update_total(11.0);

        ledger.set_initial_value(5.0).unwrap();
        assert_eq!(ledger.trip_km(), 0.0);
        assert_eq!(ledger.store().values.get("trip"), Some(&5.0));
    }

    #[test]
    fn test_custom_thresholds() {
        let time = MockTime::new();
        let config = LedgerConfig::default()
            .with_min_distance_km(1.0)
            .with_min_save_interval_ms(10_000);
        let mut ledger =
            DistanceLedger::with_observer(MemoryStore::default(), &time, config, Recorder::default());
        ledger.initialize().unwrap();

        time.advance_ms(10_000);
        ledger.update_total(0.5);
        assert_eq!(ledger.observer().flushes(), 0);
        ledger.update_total(1.0);
        assert_eq!(ledger.observer().flushes(), 1);
    }
}
