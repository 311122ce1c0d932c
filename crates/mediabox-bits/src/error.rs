//! Error types for mediabox-bits.

use thiserror::Error;

/// Result type for mediabox-bits operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for mediabox-bits operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Value does not fit the encoding.
    #[error("Value {value:#x} exceeds maximum {max:#x}")]
    ValueOutOfRange { value: u64, max: u64 },

    /// Bit range is empty, reversed or wider than the integer.
    #[error("Invalid bit range {start}..={end}")]
    InvalidBitRange { start: u32, end: u32 },
}
