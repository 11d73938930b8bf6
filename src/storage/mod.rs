//! Durable key-value storage
//!
//! The odometer persists into an opaque namespace of named `f32` values, the
//! same shape as the ESP32 `Preferences` API: open a namespace, read and write
//! floats by key, close it again. Two backends are provided:
//!
//! - [`FlashStore`]: one Flash erase block per key, CRC-protected records, so
//!   a torn write only ever damages the key being written
//! - [`FileStore`] (`std` feature): one JSON object per namespace, replaced by
//!   atomic rename on every write
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────┐
//! │          DistanceLedger                 │
//! │  (primary/backup slots, debounce)       │
//! └──────────────┬─────────────────────────┘
//!                │ KeyValueStore
//!                ▼
//! ┌──────────────────────┐  ┌──────────────────────┐
//! │ FlashStore<F>         │  │ FileStore (std)       │
//! │  slot per key + CRC   │  │  JSON + atomic rename │
//! └──────────┬───────────┘  └──────────────────────┘
//!            ▼
//! ┌────────────────────────────────────────┐
//! │         FlashInterface                  │
//! └────────────────────────────────────────┘
//! ```

pub mod error;
#[cfg(feature = "std")]
pub mod file;
pub mod flash;
pub mod record;

pub use error::StorageError;
#[cfg(feature = "std")]
pub use file::FileStore;
pub use flash::{FlashLayout, FlashStore};
pub use record::{hash_name, SlotRecord};

use heapless::String;

/// Maximum namespace or key length (matches the ESP32 NVS limit)
pub const MAX_NAME_LEN: usize = 15;

/// Bounded namespace or key name
pub type Name = String<MAX_NAME_LEN>;

/// Validate a namespace or key name
///
/// Names must be non-empty and at most [`MAX_NAME_LEN`] bytes.
pub fn validate_name(name: &str) -> Result<Name, StorageError> {
    if name.is_empty() {
        return Err(StorageError::InvalidName);
    }
    let mut bounded = Name::new();
    bounded
        .push_str(name)
        .map_err(|_| StorageError::InvalidName)?;
    Ok(bounded)
}

/// Proof that a namespace is open on a store
///
/// Only the store that issued it can redeem it. Closing consumes the handle,
/// so a closed namespace cannot be used by accident.
#[derive(Debug, PartialEq, Eq)]
pub struct NamespaceHandle {
    id: u32,
}

impl NamespaceHandle {
    /// Create a handle (for store implementations)
    pub fn new(id: u32) -> Self {
        Self { id }
    }

    /// Identifier the issuing store uses to recognize the handle
    pub fn id(&self) -> u32 {
        self.id
    }
}

/// Durable namespace of `f32` values
///
/// At most one namespace handle is outstanding per store at a time.
pub trait KeyValueStore {
    /// Open `namespace` for reading and writing.
    ///
    /// # Errors
    ///
    /// - `StorageError::InvalidName` if the name is empty or too long
    /// - `StorageError::AlreadyOpen` if a handle is outstanding
    /// - `StorageError::Unavailable` if the medium cannot be used
    fn open(&mut self, namespace: &str) -> Result<NamespaceHandle, StorageError>;

    /// Read `key`, returning `default` when it is absent or unreadable.
    fn get_f32(&mut self, handle: &NamespaceHandle, key: &str, default: f32) -> f32;

    /// Durably write `key`.
    ///
    /// Returns only after the value reached the medium.
    fn put_f32(&mut self, handle: &NamespaceHandle, key: &str, value: f32)
        -> Result<(), StorageError>;

    /// Release the namespace.
    fn close(&mut self, handle: NamespaceHandle);
}
