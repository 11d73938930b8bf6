//! Slot record format for Flash storage
//!
//! Every key lives in its own erase block and is stored as one fixed-size
//! record at the start of that block. A record that fails magic, version or
//! CRC validation (erased block, torn write, bit rot) reads as absent.
//!
//! ```text
//! ┌───────────────────────────────────────────────┐
//! │ Magic: [u8; 4] = b"ODOK"                     │  Offset: 0
//! │ Version: u16 = 1                              │  Offset: 4
//! │ Flags: u16                                    │  Offset: 6
//! │ Namespace hash: u32 (FNV-1a)                  │  Offset: 8
//! │ Key hash: u32 (FNV-1a)                        │  Offset: 12
//! │ Value: f32 bits                               │  Offset: 16
//! │ Sequence: u32                                 │  Offset: 20
//! │ CRC32: u32 (ISO-HDLC over bytes 0..24)        │  Offset: 24
//! └───────────────────────────────────────────────┘
//! ```

use bitflags::bitflags;
use crc::{Crc, CRC_32_ISO_HDLC};

/// Record magic ("ODOK")
pub const RECORD_MAGIC: [u8; 4] = *b"ODOK";

/// Record format version
pub const RECORD_VERSION: u16 = 1;

/// Encoded record size in bytes
pub const RECORD_SIZE: usize = 28;

const CRC_OFFSET: usize = RECORD_SIZE - 4;

const CRC32: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

bitflags! {
    /// Record type and status flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct RecordFlags: u16 {
        /// Value is an f32
        const TYPE_F32 = 0b0001;
    }
}

/// One persisted key/value pair
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SlotRecord {
    /// Hash of the namespace the key belongs to
    pub namespace_hash: u32,
    /// Hash of the key name
    pub key_hash: u32,
    /// Stored value
    pub value: f32,
    /// Store-wide write counter at the time of the write
    pub sequence: u32,
    /// Type flags
    pub flags: RecordFlags,
}

impl SlotRecord {
    /// Create an f32 record
    pub fn new_f32(namespace_hash: u32, key_hash: u32, value: f32, sequence: u32) -> Self {
        Self {
            namespace_hash,
            key_hash,
            value,
            sequence,
            flags: RecordFlags::TYPE_F32,
        }
    }

    /// Value as f32, if the record holds one
    pub fn as_f32(&self) -> Option<f32> {
        if self.flags.contains(RecordFlags::TYPE_F32) {
            Some(self.value)
        } else {
            None
        }
    }

    /// Whether the record belongs to `namespace_hash`/`key_hash`
    pub fn matches(&self, namespace_hash: u32, key_hash: u32) -> bool {
        self.namespace_hash == namespace_hash && self.key_hash == key_hash
    }

    /// Serialize record to bytes (little-endian, CRC appended)
    pub fn to_bytes(&self) -> [u8; RECORD_SIZE] {
        let mut buf = [0u8; RECORD_SIZE];
        buf[0..4].copy_from_slice(&RECORD_MAGIC);
        buf[4..6].copy_from_slice(&RECORD_VERSION.to_le_bytes());
        buf[6..8].copy_from_slice(&self.flags.bits().to_le_bytes());
        buf[8..12].copy_from_slice(&self.namespace_hash.to_le_bytes());
        buf[12..16].copy_from_slice(&self.key_hash.to_le_bytes());
        buf[16..20].copy_from_slice(&self.value.to_bits().to_le_bytes());
        buf[20..24].copy_from_slice(&self.sequence.to_le_bytes());

        let crc = CRC32.checksum(&buf[..CRC_OFFSET]);
        buf[CRC_OFFSET..].copy_from_slice(&crc.to_le_bytes());
        buf
    }

    /// Deserialize and validate a record
    ///
    /// Returns `None` for erased, torn or corrupted records.
    pub fn from_bytes(buf: &[u8]) -> Option<Self> {
        if buf.len() < RECORD_SIZE {
            return None;
        }

        if buf[0..4] != RECORD_MAGIC {
            return None;
        }

        let version = u16::from_le_bytes([buf[4], buf[5]]);
        if version != RECORD_VERSION {
            return None;
        }

        let stored_crc = u32::from_le_bytes([
            buf[CRC_OFFSET],
            buf[CRC_OFFSET + 1],
            buf[CRC_OFFSET + 2],
            buf[CRC_OFFSET + 3],
        ]);
        if stored_crc != CRC32.checksum(&buf[..CRC_OFFSET]) {
            return None;
        }

        let flags = RecordFlags::from_bits_truncate(u16::from_le_bytes([buf[6], buf[7]]));
        let namespace_hash = u32::from_le_bytes([buf[8], buf[9], buf[10], buf[11]]);
        let key_hash = u32::from_le_bytes([buf[12], buf[13], buf[14], buf[15]]);
        let value = f32::from_bits(u32::from_le_bytes([buf[16], buf[17], buf[18], buf[19]]));
        let sequence = u32::from_le_bytes([buf[20], buf[21], buf[22], buf[23]]);

        Some(Self {
            namespace_hash,
            key_hash,
            value,
            sequence,
            flags,
        })
    }
}

/// Calculate FNV-1a hash of a namespace or key name
pub fn hash_name(name: &str) -> u32 {
    const FNV_OFFSET_BASIS: u32 = 2166136261;
    const FNV_PRIME: u32 = 16777619;

    let mut hash = FNV_OFFSET_BASIS;
    for byte in name.bytes() {
        hash ^= byte as u32;
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}
