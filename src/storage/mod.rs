//! # Storage for device identity
//!
//! The secure element on IoTConnect boards doubles as the device's only
//! tamper-resistant non-volatile store. This module models it in two layers:
//!
//! - [`ReadStorage`] / [`Storage`]: a byte-addressed zone (one data slot of
//!   the secure element, or any stand-in such as a flash page in tests).
//! - [`SecureElement`]: the identity extras the crypto coprocessor offers on
//!   top of its data zone, its serial number and the device certificate.
//!
//! On top of these sits the [`provision::RecordStore`], the linked-record
//! format that keeps platform, CPID, environment and DUID in a single slot.
//!
//! ```text
//! ┌─────────────────────────────┐
//! │   iotconnect::ClientConfig  │
//! └──────────────┬──────────────┘
//!                ▼
//! ┌─────────────────────────────┐   ┌─────────────────────────────┐
//! │   provision::RecordStore    │   │  certificate::encode_pem    │
//! └──────────────┬──────────────┘   └──────────────┬──────────────┘
//!                ▼                                 ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │              Storage  /  SecureElement  (data slot)             │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

#![allow(missing_docs)]
#![deny(unsafe_code)]

/// Common error types for storage operations
pub mod error;

/// Linked-record identity store
pub mod provision;

/// Device certificate rendering
pub mod certificate;


/// Re-exports of common traits for convenient importing
pub mod prelude {
    pub use super::{ReadStorage, SecureElement, Storage};
}

/// Trait for reading data from storage devices.
///
/// # Examples
///
/// ```rust,no_run
/// use iotconnect::storage::ReadStorage;
///
/// fn read_header<S: ReadStorage>(storage: &mut S) -> Result<u16, S::Error> {
///     let mut bytes = [0u8; 2];
///     storage.read(0, &mut bytes)?;
///     Ok(u16::from_le_bytes(bytes))
/// }
/// ```
pub trait ReadStorage {
    /// Associated error type for read operations
    type Error: core::fmt::Debug;

    /// Read `bytes.len()` bytes starting at `offset`.
    ///
    /// # Errors
    ///
    /// - `OutOfBounds` if offset + buffer length exceeds device capacity
    /// - `ReadError` if the hardware read fails
    /// - `NotInitialized` if the device was not brought up
    fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error>;

    /// Total capacity of the zone in bytes.
    fn capacity(&self) -> usize;
}

/// Trait for storage devices that support both reading and writing.
pub trait Storage: ReadStorage {
    /// Write `bytes` starting at `offset`.
    ///
    /// Secure-element data zones wear out; callers batch changes and write
    /// once rather than byte by byte.
    fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Self::Error>;
}

/// Identity services of a secure element beyond its data zone.
pub trait SecureElement: Storage {
    /// The chip's 9-byte serial number.
    fn serial_number(&mut self) -> Result<[u8; 9], Self::Error>;

    /// Read the DER-encoded device certificate into `out`, returning its length.
    fn device_certificate(&mut self, out: &mut [u8]) -> Result<usize, Self::Error>;
}

impl<S: ReadStorage + ?Sized> ReadStorage for &mut S {
    type Error = S::Error;

    fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
        (**self).read(offset, bytes)
    }

    fn capacity(&self) -> usize {
        (**self).capacity()
    }
}

impl<S: Storage + ?Sized> Storage for &mut S {
    fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Self::Error> {
        (**self).write(offset, bytes)
    }
}
