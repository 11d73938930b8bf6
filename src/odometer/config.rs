//! Ledger configuration
//!
//! # Defaults
//!
//! - Namespace `odometer`
//! - Total slots `total` (primary) and `total_bak` (backup)
//! - Trip origin slots `trip` (primary) and `trip_bak` (backup)
//! - Flush once at least 0.1 km (100 m) is unsaved **and** 5 minutes have
//!   passed since the last flush

/// Default storage namespace
pub const DEFAULT_NAMESPACE: &str = "odometer";

/// Default primary total key
pub const DEFAULT_PRIMARY_KEY: &str = "total";

/// Default backup total key
pub const DEFAULT_BACKUP_KEY: &str = "total_bak";

/// Default primary trip origin key
pub const DEFAULT_TRIP_PRIMARY_KEY: &str = "trip";

/// Default backup trip origin key
pub const DEFAULT_TRIP_BACKUP_KEY: &str = "trip_bak";

/// Minimum unsaved distance before a debounced flush (km)
pub const DEFAULT_MIN_DISTANCE_KM: f32 = 0.1; // 100 m

/// Minimum time between debounced flushes (ms)
pub const DEFAULT_MIN_SAVE_INTERVAL_MS: u64 = 300_000; // 5 min

/// Redundant pair of keys holding one logical value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotKeys {
    /// Written last
    pub primary: &'static str,
    /// Written first
    pub backup: &'static str,
}

/// Ledger configuration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LedgerConfig {
    /// Storage namespace
    pub namespace: &'static str,
    /// Keys holding the cumulative total
    pub total_keys: SlotKeys,
    /// Keys holding the trip origin
    pub trip_keys: SlotKeys,
    /// Unsaved distance required before a debounced flush (km)
    pub min_distance_km: f32,
    /// Time required since the last flush before a debounced flush (ms)
    pub min_save_interval_ms: u64,
}

impl LedgerConfig {
    /// Use a different storage namespace
    pub fn with_namespace(mut self, namespace: &'static str) -> Self {
        self.namespace = namespace;
        self
    }

    /// Override the distance threshold
    pub fn with_min_distance_km(mut self, km: f32) -> Self {
        self.min_distance_km = km;
        self
    }

    /// Override the time threshold
    pub fn with_min_save_interval_ms(mut self, ms: u64) -> Self {
        self.min_save_interval_ms = ms;
        self
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE,
            total_keys: SlotKeys {
                primary: DEFAULT_PRIMARY_KEY,
                backup: DEFAULT_BACKUP_KEY,
            },
            trip_keys: SlotKeys {
                primary: DEFAULT_TRIP_PRIMARY_KEY,
                backup: DEFAULT_TRIP_BACKUP_KEY,
            },
            min_distance_km: DEFAULT_MIN_DISTANCE_KM,
            min_save_interval_ms: DEFAULT_MIN_SAVE_INTERVAL_MS,
        }
    }
}
