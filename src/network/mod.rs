//! A network abstraction layer for cellular IoT devices
//!
//! This module provides the byte-stream traits the socket clients are written
//! against, the AT-command capability of the modem, and the application-level
//! HTTP and MQTT layers consumed by the IoTConnect resolver and session.
//!

#![allow(missing_docs)]
#![deny(unsafe_code)]

/// Common error types for network operations
pub mod error;

/// Modem AT-command capability
pub mod modem;

/// Application-layer protocols (HTTP, MQTT)
pub mod application;

/// Re-exports of common traits
pub mod prelude {
    pub use super::modem::AtCommand;
    pub use super::{Close, Connect, Connection, Read, Write};
}

// Core synchronous traits
pub trait Read {
    /// Associated error type
    type Error: core::fmt::Debug;
    /// Read data from the connection
    ///
    /// `Ok(0)` for a non-empty `buf` means the peer closed the connection.
    /// A reset or any other link failure is an `Err`.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error>;

    /// Whether a [`read`](Self::read) would return without waiting, either
    /// with data or with end of stream.
    ///
    /// Polling clients check this before reading. The default suits
    /// blocking connections: it always reports ready.
    fn read_ready(&mut self) -> Result<bool, Self::Error> {
        Ok(true)
    }
}

pub trait Write {
    /// Associated error type
    type Error: core::fmt::Debug;
    /// Write data to the connection
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error>;
    /// Flush the write buffer
    fn flush(&mut self) -> Result<(), Self::Error>;
}

pub trait Close {
    /// Associated error type
    type Error: core::fmt::Debug;
    /// Close the connection
    fn close(self) -> Result<(), Self::Error>;
}

/// A synchronous connection
pub trait Connection: Read + Write + Close {}

/// A synchronous connector (client)
///
/// `remote` is `host:port`. When `tls` is set the connector is expected to run
/// the session through the modem's TLS engine using the secure element for the
/// client identity.
pub trait Connect {
    /// Associated connection type
    type Connection: Connection;
    /// Associated error type
    type Error: core::fmt::Debug;
    /// Open a connection
    fn connect(&mut self, remote: &str, tls: bool) -> Result<Self::Connection, Self::Error>;
}

/// Writes the whole buffer, retrying short writes.
pub(crate) fn write_all<W: Write>(w: &mut W, mut buf: &[u8]) -> Result<(), error::Error> {
    while !buf.is_empty() {
        match w.write(buf) {
            Ok(0) => return Err(error::Error::WriteError),
            Ok(n) => buf = &buf[n..],
            Err(_) => return Err(error::Error::WriteError),
        }
    }
    Ok(())
}

/// Fills the whole buffer, failing if the peer closes first.
pub(crate) fn read_exact<R: Read>(r: &mut R, buf: &mut [u8]) -> Result<(), error::Error> {
    let mut total = 0;
    while total < buf.len() {
        match r.read(&mut buf[total..]) {
            Ok(0) => return Err(error::Error::ConnectionClosed),
            Ok(n) => total += n,
            Err(_) => return Err(error::Error::ReadError),
        }
    }
    Ok(())
}
