//! Flash-backed key-value store
//!
//! Each key occupies one erase block inside a fixed region. Writing a key
//! erases and rewrites only that key's block, so power loss in the middle of a
//! write can corrupt at most the key being written; every other key, including
//! the redundant copy of the same counter, stays intact.
//!
//! # Flash Layout
//!
//! ```text
//! [Slot 0]  base + 0 * block_size   - first key written
//! [Slot 1]  base + 1 * block_size   - second key written
//! ...
//! [Slot N]  base + N * block_size
//! ```
//!
//! Slots are claimed on first write and located by (namespace hash, key hash)
//! on later reads; see [`record`](super::record) for the on-Flash format.
//!
//! # Example
//!
//! ```no_run
//! use pico_odometer::platform::mock::MockFlash;
//! use pico_odometer::storage::{FlashStore, KeyValueStore};
//!
//! let mut store = FlashStore::new(MockFlash::new());
//! let ns = store.open("odometer").unwrap();
//! store.put_f32(&ns, "total", 12.5).unwrap();
//! assert_eq!(store.get_f32(&ns, "total", 0.0), 12.5);
//! store.close(ns);
//! ```

use super::record::{hash_name, SlotRecord, RECORD_SIZE};
use super::{validate_name, KeyValueStore, NamespaceHandle, StorageError};
use crate::platform::traits::FlashInterface;

/// Default slot region base address (Flash offset)
pub const DEFAULT_SLOT_BASE: u32 = 0x040000; // 256 KB

/// Default number of slots
pub const DEFAULT_SLOT_COUNT: u32 = 8;

/// Slot region placement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlashLayout {
    /// First slot address (must be block-aligned)
    pub base: u32,
    /// Number of slots, one erase block each
    pub slot_count: u32,
}

impl Default for FlashLayout {
    fn default() -> Self {
        Self {
            base: DEFAULT_SLOT_BASE,
            slot_count: DEFAULT_SLOT_COUNT,
        }
    }
}

/// A located record and the slot it lives in
#[derive(Debug, Clone, Copy)]
struct Located {
    slot: u32,
    record: SlotRecord,
}

/// Key-value store on raw Flash
pub struct FlashStore<F: FlashInterface> {
    flash: F,
    layout: FlashLayout,
    /// Hash of the namespace currently open
    open: Option<u32>,
    /// Highest sequence number seen or written
    sequence: u32,
}

impl<F: FlashInterface> FlashStore<F> {
    /// Create a store over the default slot region
    pub fn new(flash: F) -> Self {
        Self::with_layout(flash, FlashLayout::default())
    }

    /// Create a store over a custom slot region
    pub fn with_layout(flash: F, layout: FlashLayout) -> Self {
        Self {
            flash,
            layout,
            open: None,
            sequence: 0,
        }
    }

    /// Slot region in use
    pub fn layout(&self) -> FlashLayout {
        self.layout
    }

    /// Borrow the Flash device
    pub fn flash(&self) -> &F {
        &self.flash
    }

    /// Consume the store and return the Flash device
    pub fn into_flash(self) -> F {
        self.flash
    }

    /// Check the region fits the device and is block-aligned
    fn layout_is_usable(&self) -> bool {
        let block = self.flash.block_size();
        if block == 0 || self.layout.slot_count == 0 {
            return false;
        }
        if !self.layout.base.is_multiple_of(block) {
            return false;
        }
        match self
            .layout
            .slot_count
            .checked_mul(block)
            .and_then(|len| len.checked_add(self.layout.base))
        {
            Some(end) => end <= self.flash.capacity(),
            None => false,
        }
    }

    fn slot_address(&self, slot: u32) -> u32 {
        self.layout.base + slot * self.flash.block_size()
    }

    /// Read and validate the record in `slot`
    fn read_slot(&mut self, slot: u32) -> Result<Option<SlotRecord>, StorageError> {
        let mut buf = [0u8; RECORD_SIZE];
        self.flash.read(self.slot_address(slot), &mut buf)?;
        Ok(SlotRecord::from_bytes(&buf))
    }

    /// Find the newest valid record for a key, and the first slot free for reuse
    fn scan(
        &mut self,
        namespace_hash: u32,
        key_hash: u32,
    ) -> Result<(Option<Located>, Option<u32>), StorageError> {
        let mut found: Option<Located> = None;
        let mut free = None;

        for slot in 0..self.layout.slot_count {
            match self.read_slot(slot)? {
                Some(record) if record.matches(namespace_hash, key_hash) => {
                    if found.is_none_or(|f| record.sequence > f.record.sequence) {
                        found = Some(Located { slot, record });
                    }
                }
                Some(_) => {}
                None => {
                    if free.is_none() {
                        free = Some(slot);
                    }
                }
            }
        }

        Ok((found, free))
    }

    fn check_handle(&self, handle: &NamespaceHandle) -> Result<u32, StorageError> {
        match self.open {
            Some(id) if id == handle.id() => Ok(id),
            _ => Err(StorageError::NotOpen),
        }
    }

    fn try_get(&mut self, handle: &NamespaceHandle, key: &str) -> Result<Option<f32>, StorageError> {
        let namespace_hash = self.check_handle(handle)?;
        let key = validate_name(key)?;
        let (found, _) = self.scan(namespace_hash, hash_name(&key))?;
        Ok(found.and_then(|located| located.record.as_f32()))
    }
}

impl<F: FlashInterface> KeyValueStore for FlashStore<F> {
    fn open(&mut self, namespace: &str) -> Result<NamespaceHandle, StorageError> {
        let namespace = validate_name(namespace)?;

        if self.open.is_some() {
            return Err(StorageError::AlreadyOpen);
        }

        if !self.layout_is_usable() {
            crate::log_error!("Odometer slot region unusable");
            return Err(StorageError::Unavailable);
        }

        // Continue the sequence from whatever is already on Flash
        let mut sequence = 0;
        for slot in 0..self.layout.slot_count {
            match self.read_slot(slot) {
                Ok(Some(record)) => sequence = sequence.max(record.sequence),
                Ok(None) => {}
                Err(_) => {
                    crate::log_error!("Flash read failed at slot {}", slot);
                    return Err(StorageError::Unavailable);
                }
            }
        }
        self.sequence = sequence;

        let id = hash_name(&namespace);
        self.open = Some(id);
        Ok(NamespaceHandle::new(id))
    }

    fn get_f32(&mut self, handle: &NamespaceHandle, key: &str, default: f32) -> f32 {
        match self.try_get(handle, key) {
            Ok(Some(value)) => value,
            Ok(None) => default,
            Err(_) => {
                crate::log_warn!("Read of {} failed, using default", key);
                default
            }
        }
    }

    fn put_f32(
        &mut self,
        handle: &NamespaceHandle,
        key: &str,
        value: f32,
    ) -> Result<(), StorageError> {
        let namespace_hash = self.check_handle(handle)?;
        let key_hash = hash_name(&validate_name(key)?);

        let slot = match self.scan(namespace_hash, key_hash)? {
            (Some(located), _) => located.slot,
            (None, Some(free)) => free,
            (None, None) => return Err(StorageError::Full),
        };

        let sequence = self.sequence.wrapping_add(1);
        let record = SlotRecord::new_f32(namespace_hash, key_hash, value, sequence);
        let address = self.slot_address(slot);
        let block = self.flash.block_size();

        self.flash.erase(address, block)?;
        self.flash.write(address, &record.to_bytes())?;
        self.sequence = sequence;

        Ok(())
    }

    fn close(&mut self, handle: NamespaceHandle) {
        if self.open == Some(handle.id()) {
            self.open = None;
        }
    }
}
