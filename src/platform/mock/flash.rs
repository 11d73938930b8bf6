//! Mock Flash implementation for testing
//!
//! Provides in-memory Flash simulation for unit tests.

use crate::platform::{error::FlashError, traits::FlashInterface, Result};
use std::cell::RefCell;
use std::rc::Rc;
use std::vec::Vec;

/// Flash block size (4 KB)
const BLOCK_SIZE: u32 = 4096;

/// Flash capacity (4 MB, same as Pico 2 W)
const FLASH_CAPACITY: u32 = 4 * 1024 * 1024;

/// Minimum firmware size (protect first 256 KB)
const FIRMWARE_SIZE: u32 = 0x40000;

#[derive(Debug)]
struct FlashCell {
    /// Flash storage (initialized to 0xFF - erased state)
    storage: Vec<u8>,
    /// Erase count per block (for wear validation)
    erase_counts: Vec<u32>,
    /// Completed write operations
    write_count: u32,
    /// Writes allowed to complete before the simulated power loss
    power_loss_after: Option<u32>,
    /// Power lost; every operation fails until `power_cycle`
    powered_off: bool,
    /// Remaining writes that fail outright without touching storage
    failing_writes: u32,
}

/// Mock Flash implementation
///
/// Simulates Flash storage in memory for testing. Supports:
/// - Read/write/erase operations with 1→0 write semantics
/// - Corruption injection for testing error handling
/// - Erase count tracking for wear validation
/// - Power-loss simulation (torn writes) for reliability testing
///
/// Clones share the same backing memory, so a test can hand one clone to the
/// code under test and keep another to inspect the chip or "reboot" onto it.
///
/// # Example
///
/// ```
/// use pico_odometer::platform::mock::MockFlash;
/// use pico_odometer::platform::traits::FlashInterface;
///
/// let mut flash = MockFlash::new();
/// flash.erase(0x040000, 4096).unwrap();
/// flash.write(0x040000, b"ODOK").unwrap();
///
/// let mut buf = [0u8; 4];
/// flash.read(0x040000, &mut buf).unwrap();
/// assert_eq!(&buf, b"ODOK");
/// assert_eq!(flash.get_erase_count(0x040000), 1);
/// ```
#[derive(Debug, Clone)]
pub struct MockFlash {
    inner: Rc<RefCell<FlashCell>>,
}

impl MockFlash {
    /// Create a new mock Flash instance
    pub fn new() -> Self {
        let block_count = (FLASH_CAPACITY / BLOCK_SIZE) as usize;

        Self {
            inner: Rc::new(RefCell::new(FlashCell {
                storage: vec![0xFF; FLASH_CAPACITY as usize],
                erase_counts: vec![0; block_count],
                write_count: 0,
                power_loss_after: None,
                powered_off: false,
                failing_writes: 0,
            })),
        }
    }

    /// Get Flash contents (for test verification)
    pub fn get_contents(&self, address: u32, len: usize) -> Vec<u8> {
        let cell = self.inner.borrow();
        cell.storage[address as usize..(address as usize + len)].to_vec()
    }

    /// Inject corruption at address (for testing error recovery)
    pub fn inject_corruption(&self, address: u32, len: usize) {
        let mut cell = self.inner.borrow_mut();
        for byte in &mut cell.storage[address as usize..address as usize + len] {
            *byte = 0xAA; // Corrupt pattern
        }
    }

    /// Get erase count for the block containing `address`
    pub fn get_erase_count(&self, address: u32) -> u32 {
        let block_id = (address / BLOCK_SIZE) as usize;
        self.inner.borrow().erase_counts[block_id]
    }

    /// Get total erase count across all blocks
    pub fn get_total_erase_count(&self) -> u32 {
        self.inner.borrow().erase_counts.iter().sum()
    }

    /// Number of write operations that reached the array (including torn ones)
    pub fn get_write_count(&self) -> u32 {
        self.inner.borrow().write_count
    }

    /// Simulate power loss during the next write operation
    ///
    /// The next write only partially completes; the chip then stays
    /// unpowered until [`MockFlash::power_cycle`].
    pub fn simulate_power_loss(&self) {
        self.simulate_power_loss_after(0);
    }

    /// Let `writes` more writes complete, then tear the following one
    pub fn simulate_power_loss_after(&self, writes: u32) {
        self.inner.borrow_mut().power_loss_after = Some(writes);
    }

    /// Restore power after a simulated power loss
    pub fn power_cycle(&self) {
        let mut cell = self.inner.borrow_mut();
        cell.powered_off = false;
        cell.power_loss_after = None;
    }

    /// Make the next `count` writes fail without modifying storage
    pub fn fail_next_writes(&self, count: u32) {
        self.inner.borrow_mut().failing_writes = count;
    }

    /// Check if address is in writable region
    fn is_writable(address: u32) -> bool {
        (FIRMWARE_SIZE..FLASH_CAPACITY).contains(&address)
    }

    /// Check if address is block-aligned
    fn is_block_aligned(address: u32) -> bool {
        address.is_multiple_of(BLOCK_SIZE)
    }
}

impl Default for MockFlash {
    fn default() -> Self {
        Self::new()
    }
}

impl FlashInterface for MockFlash {
    fn read(&mut self, address: u32, buf: &mut [u8]) -> Result<()> {
        if address as usize + buf.len() > FLASH_CAPACITY as usize {
            return Err(FlashError::InvalidAddress.into());
        }

        let cell = self.inner.borrow();
        if cell.powered_off {
            return Err(FlashError::ReadFailed.into());
        }
        buf.copy_from_slice(&cell.storage[address as usize..(address as usize + buf.len())]);

        Ok(())
    }

    fn write(&mut self, address: u32, data: &[u8]) -> Result<()> {
        if !Self::is_writable(address) {
            return Err(FlashError::InvalidAddress.into());
        }

        if address as usize + data.len() > FLASH_CAPACITY as usize {
            return Err(FlashError::InvalidAddress.into());
        }

        let mut cell = self.inner.borrow_mut();
        if cell.powered_off {
            return Err(FlashError::WriteFailed.into());
        }

        if cell.failing_writes > 0 {
            cell.failing_writes -= 1;
            return Err(FlashError::WriteFailed.into());
        }

        // Simulate power loss (partial write)
        let write_len = match cell.power_loss_after {
            Some(0) => {
                cell.power_loss_after = None;
                cell.powered_off = true;
                data.len() / 2
            }
            Some(remaining) => {
                cell.power_loss_after = Some(remaining - 1);
                data.len()
            }
            None => data.len(),
        };

        // Flash can only change bits from 1→0
        let start = address as usize;
        for (i, byte) in data.iter().take(write_len).enumerate() {
            cell.storage[start + i] &= *byte;
        }
        cell.write_count += 1;

        if cell.powered_off {
            return Err(FlashError::WriteFailed.into());
        }

        Ok(())
    }

    fn erase(&mut self, address: u32, size: u32) -> Result<()> {
        if !Self::is_writable(address) {
            return Err(FlashError::InvalidAddress.into());
        }

        if !Self::is_block_aligned(address) || !size.is_multiple_of(BLOCK_SIZE) {
            return Err(FlashError::InvalidAddress.into());
        }

        if address + size > FLASH_CAPACITY {
            return Err(FlashError::InvalidAddress.into());
        }

        let mut cell = self.inner.borrow_mut();
        if cell.powered_off {
            return Err(FlashError::EraseFailed.into());
        }

        for byte in &mut cell.storage[address as usize..(address + size) as usize] {
            *byte = 0xFF;
        }

        let start_block = (address / BLOCK_SIZE) as usize;
        for i in 0..(size / BLOCK_SIZE) as usize {
            cell.erase_counts[start_block + i] += 1;
        }

        Ok(())
    }

    fn block_size(&self) -> u32 {
        BLOCK_SIZE
    }

    fn capacity(&self) -> u32 {
        FLASH_CAPACITY
    }
}
