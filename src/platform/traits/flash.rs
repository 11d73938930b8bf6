//! Flash interface trait
//!
//! This module defines the Flash storage interface that platform implementations must provide.
//! Flash backs the odometer's key-value slots.

use crate::platform::Result;

/// Flash interface trait
///
/// Platform implementations must provide this interface for Flash read/write/erase operations.
///
/// # Flash Characteristics
///
/// - Flash is organized in blocks (typically 4 KB on RP2040/RP2350)
/// - Erase operations set all bytes to 0xFF
/// - Write operations can only change bits from 1→0 (must erase first to reset to 1)
/// - A write interrupted by power loss leaves the tail of the target range erased
///
/// # Safety Invariants
///
/// - Flash peripheral must be initialized before use
/// - Only one owner per Flash instance (no concurrent access)
/// - Must not erase/write firmware region (implementations must validate addresses)
///
/// # Memory Layout (RP2040/RP2350)
///
/// ```text
/// [Firmware]           0x000000 - 0x040000 (256 KB) - DO NOT WRITE
/// [Odometer Slots]     0x040000 - 0x048000 (8 x 4 KB)
/// ```
pub trait FlashInterface {
    /// Read `buf.len()` bytes starting at `address`.
    ///
    /// # Errors
    ///
    /// Returns `PlatformError::Flash(FlashError::InvalidAddress)` if address is out of bounds.
    /// Returns `PlatformError::Flash(FlashError::ReadFailed)` if the read operation fails.
    fn read(&mut self, address: u32, buf: &mut [u8]) -> Result<()>;

    /// Write `data` starting at `address`.
    ///
    /// The target range must have been erased first.
    ///
    /// # Errors
    ///
    /// Returns `PlatformError::Flash(FlashError::InvalidAddress)` if address is in firmware region.
    /// Returns `PlatformError::Flash(FlashError::WriteFailed)` if the write operation fails.
    fn write(&mut self, address: u32, data: &[u8]) -> Result<()>;

    /// Erase `size` bytes starting at `address`, setting them to 0xFF.
    ///
    /// Address and size must be aligned to [`FlashInterface::block_size`].
    ///
    /// # Errors
    ///
    /// Returns `PlatformError::Flash(FlashError::InvalidAddress)` if the range is misaligned,
    /// out of bounds or in the firmware region.
    /// Returns `PlatformError::Flash(FlashError::EraseFailed)` if the erase operation fails.
    fn erase(&mut self, address: u32, size: u32) -> Result<()>;

    /// Minimum erasable unit size in bytes.
    fn block_size(&self) -> u32;

    /// Total Flash capacity in bytes.
    fn capacity(&self) -> u32;
}
