//! Storage error types

use crate::platform::PlatformError;
use core::fmt;

/// Errors from key-value store operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StorageError {
    /// Backing medium cannot be used (bad layout, missing device, I/O refusal)
    Unavailable,
    /// A namespace handle is already outstanding on this store
    AlreadyOpen,
    /// Handle does not refer to the namespace currently open
    NotOpen,
    /// Namespace or key name is empty or too long
    InvalidName,
    /// No free slot left for a new key
    Full,
    /// Underlying Flash operation failed
    Platform(PlatformError),
    /// Host filesystem operation failed
    #[cfg(feature = "std")]
    Io(#[cfg_attr(feature = "defmt", defmt(Debug2Format))] std::io::ErrorKind),
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::Unavailable => write!(f, "storage unavailable"),
            StorageError::AlreadyOpen => write!(f, "namespace already open"),
            StorageError::NotOpen => write!(f, "namespace not open"),
            StorageError::InvalidName => write!(f, "invalid namespace or key name"),
            StorageError::Full => write!(f, "no free storage slot"),
            StorageError::Platform(e) => write!(f, "platform error: {}", e),
            #[cfg(feature = "std")]
            StorageError::Io(kind) => write!(f, "I/O error: {}", kind),
        }
    }
}

impl From<PlatformError> for StorageError {
    fn from(error: PlatformError) -> Self {
        StorageError::Platform(error)
    }
}

#[cfg(feature = "std")]
impl From<std::io::Error> for StorageError {
    fn from(error: std::io::Error) -> Self {
        StorageError::Io(error.kind())
    }
}

#[cfg(feature = "std")]
impl std::error::Error for StorageError {}
