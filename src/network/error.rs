//! Common error types for network operations

use core::fmt;

/// A common error type for network operations.
///
/// Covers both the byte-stream layer (sockets, modem links) and the bounded
/// HTTP/MQTT helpers built on top of it. Kept `Copy` so it can be carried
/// inside higher-level errors without allocation.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Error {
    /// An operation was attempted on a connection that is not open.
    NotOpen,
    /// An error occurred during a write operation.
    WriteError,
    /// An error occurred during a read operation.
    ReadError,
    /// A connection attempt was refused.
    ConnectionRefused,
    /// A timeout occurred.
    Timeout,
    /// The connection was closed.
    ConnectionClosed,
    /// An invalid address was provided.
    InvalidAddress,
    /// A protocol-specific error occurred.
    ProtocolError,
    /// The request did not produce an HTTP status (status code 0).
    HttpStatus,
    /// A response or packet did not fit the fixed receive buffer.
    Overflow,
    /// The server answered with an empty body.
    EmptyResponse,
    /// The body is not the expected JSON document.
    InvalidResponse,
    /// The MQTT session is not connected.
    NotConnected,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Error::NotOpen => "connection not open",
            Error::WriteError => "write failed",
            Error::ReadError => "read failed",
            Error::ConnectionRefused => "connection refused",
            Error::Timeout => "timed out",
            Error::ConnectionClosed => "connection closed",
            Error::InvalidAddress => "invalid address",
            Error::ProtocolError => "protocol error",
            Error::HttpStatus => "no HTTP status",
            Error::Overflow => "response exceeds buffer",
            Error::EmptyResponse => "empty response",
            Error::InvalidResponse => "response is not a JSON object",
            Error::NotConnected => "not connected",
        };
        f.write_str(s)
    }
}

impl core::error::Error for Error {}

#[cfg(feature = "defmt")]
impl defmt::Format for Error {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Error::NotOpen => defmt::write!(f, "NotOpen"),
            Error::WriteError => defmt::write!(f, "WriteError"),
            Error::ReadError => defmt::write!(f, "ReadError"),
            Error::ConnectionRefused => defmt::write!(f, "ConnectionRefused"),
            Error::Timeout => defmt::write!(f, "Timeout"),
            Error::ConnectionClosed => defmt::write!(f, "ConnectionClosed"),
            Error::InvalidAddress => defmt::write!(f, "InvalidAddress"),
            Error::ProtocolError => defmt::write!(f, "ProtocolError"),
            Error::HttpStatus => defmt::write!(f, "HttpStatus"),
            Error::Overflow => defmt::write!(f, "Overflow"),
            Error::EmptyResponse => defmt::write!(f, "EmptyResponse"),
            Error::InvalidResponse => defmt::write!(f, "InvalidResponse"),
            Error::NotConnected => defmt::write!(f, "NotConnected"),
        }
    }
}
