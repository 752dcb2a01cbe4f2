//! Common error types for storage operations

use core::fmt;

/// A common error type for storage operations.
///
/// Covers both device-level faults and the record store's own failures.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Error {
    /// An operation was attempted on an address that is out of bounds.
    OutOfBounds,
    /// An error occurred during a write operation.
    WriteError,
    /// An error occurred during a read operation.
    ReadError,
    /// An operation was attempted on a device that was not initialized.
    NotInitialized,
    /// The device is smaller than the record slot.
    CapacityTooSmall,
    /// The requested record is not in the store.
    NotFound,
    /// The caller's buffer cannot hold the value.
    BufferTooSmall,
    /// The value does not fit the record's reserved capacity.
    ValueTooLarge,
    /// The record cannot be used this way.
    BadParam,
    /// Stored data was inconsistent and has been reset to blank records.
    DataCorruption,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Error::OutOfBounds => "out of bounds",
            Error::WriteError => "write failed",
            Error::ReadError => "read failed",
            Error::NotInitialized => "not initialized",
            Error::CapacityTooSmall => "storage smaller than record slot",
            Error::NotFound => "record not found",
            Error::BufferTooSmall => "buffer too small",
            Error::ValueTooLarge => "value too large for record",
            Error::BadParam => "bad parameter",
            Error::DataCorruption => "stored data corrupt, reset to blank",
        };
        f.write_str(s)
    }
}

impl core::error::Error for Error {}

#[cfg(feature = "defmt")]
impl defmt::Format for Error {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Error::OutOfBounds => defmt::write!(f, "OutOfBounds"),
            Error::WriteError => defmt::write!(f, "WriteError"),
            Error::ReadError => defmt::write!(f, "ReadError"),
            Error::NotInitialized => defmt::write!(f, "NotInitialized"),
            Error::CapacityTooSmall => defmt::write!(f, "CapacityTooSmall"),
            Error::NotFound => defmt::write!(f, "NotFound"),
            Error::BufferTooSmall => defmt::write!(f, "BufferTooSmall"),
            Error::ValueTooLarge => defmt::write!(f, "ValueTooLarge"),
            Error::BadParam => defmt::write!(f, "BadParam"),
            Error::DataCorruption => defmt::write!(f, "DataCorruption"),
        }
    }
}
