//! Platform error types
//!
//! This module defines error types for platform operations.

use core::fmt;

/// Result type for platform operations
pub type Result<T> = core::result::Result<T, PlatformError>;

/// Platform-level errors
///
/// Flash drivers map their HAL-specific errors to these variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PlatformError {
    /// Flash operation failed
    Flash(FlashError),
}

/// Flash-specific errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FlashError {
    /// Erase operation failed
    EraseFailed,
    /// Write operation failed
    WriteFailed,
    /// Read operation failed
    ReadFailed,
    /// Invalid address (out of bounds, firmware region or misaligned)
    InvalidAddress,
}

impl fmt::Display for PlatformError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlatformError::Flash(e) => write!(f, "Flash error: {}", e),
        }
    }
}

impl fmt::Display for FlashError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlashError::EraseFailed => write!(f, "erase failed"),
            FlashError::WriteFailed => write!(f, "write failed"),
            FlashError::ReadFailed => write!(f, "read failed"),
            FlashError::InvalidAddress => write!(f, "invalid address"),
        }
    }
}

impl From<FlashError> for PlatformError {
    fn from(error: FlashError) -> Self {
        PlatformError::Flash(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flash_error_conversion() {
        let err: PlatformError = FlashError::WriteFailed.into();
        assert_eq!(err, PlatformError::Flash(FlashError::WriteFailed));
    }

    #[test]
    fn test_display() {
        let err = PlatformError::Flash(FlashError::InvalidAddress);
        assert_eq!(format!("{}", err), "Flash error: invalid address");
    }
}
