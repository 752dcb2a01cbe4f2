//! Errors surfaced by the IoTConnect client.

use crate::{network, storage};
use core::fmt;

/// Device status reported by the identity or sync service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
    DeviceNotRegistered,
    /// Not registered; the template allows auto-registration.
    AutoRegister,
    DeviceNotFound,
    DeviceInactive,
    DeviceMoved,
    CpidNotFound,
    Unknown(u8),
}

impl SyncStatus {
    /// `None` for code 0, which means success.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => None,
            1 => Some(SyncStatus::DeviceNotRegistered),
            2 => Some(SyncStatus::AutoRegister),
            3 => Some(SyncStatus::DeviceNotFound),
            4 => Some(SyncStatus::DeviceInactive),
            5 => Some(SyncStatus::DeviceMoved),
            6 => Some(SyncStatus::CpidNotFound),
            other => Some(SyncStatus::Unknown(other)),
        }
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncStatus::DeviceNotRegistered => f.write_str("device not registered"),
            SyncStatus::AutoRegister => f.write_str("device not registered (auto-register)"),
            SyncStatus::DeviceNotFound => f.write_str("device not found"),
            SyncStatus::DeviceInactive => f.write_str("device inactive"),
            SyncStatus::DeviceMoved => f.write_str("device moved"),
            SyncStatus::CpidNotFound => f.write_str("CPID not found"),
            SyncStatus::Unknown(code) => write!(f, "unknown status {}", code),
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for SyncStatus {
    fn format(&self, f: defmt::Formatter) {
        match self {
            SyncStatus::DeviceNotRegistered => defmt::write!(f, "DeviceNotRegistered"),
            SyncStatus::AutoRegister => defmt::write!(f, "AutoRegister"),
            SyncStatus::DeviceNotFound => defmt::write!(f, "DeviceNotFound"),
            SyncStatus::DeviceInactive => defmt::write!(f, "DeviceInactive"),
            SyncStatus::DeviceMoved => defmt::write!(f, "DeviceMoved"),
            SyncStatus::CpidNotFound => defmt::write!(f, "CpidNotFound"),
            SyncStatus::Unknown(code) => defmt::write!(f, "Unknown({})", code),
        }
    }
}

/// Top-level error type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// CPID, environment or DUID missing or too long.
    ConfigInvalid,
    /// No usable connection type configured.
    BadConnectionType,
    /// HTTP or MQTT transport failure.
    Network(network::error::Error),
    /// A server response could not be understood.
    Parsing,
    /// The service refused the device.
    ServerRejected(SyncStatus),
    /// Secure-element storage failure.
    Storage(storage::error::Error),
    /// A response or value exceeded its fixed buffer.
    Overflow,
    /// A bounded wait ran out.
    Timeout,
    /// A URL or configuration string did not fit its buffer.
    Allocation,
    /// The session is not connected.
    NotConnected,
}

impl From<network::error::Error> for Error {
    fn from(e: network::error::Error) -> Self {
        use network::error::Error as N;
        match e {
            N::Overflow => Error::Overflow,
            N::Timeout => Error::Timeout,
            N::InvalidResponse => Error::Parsing,
            N::NotConnected => Error::NotConnected,
            other => Error::Network(other),
        }
    }
}

impl From<storage::error::Error> for Error {
    fn from(e: storage::error::Error) -> Self {
        Error::Storage(e)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::ConfigInvalid => f.write_str("CPID, environment and DUID are required"),
            Error::BadConnectionType => f.write_str("connection type is required"),
            Error::Network(e) => write!(f, "network: {}", e),
            Error::Parsing => f.write_str("malformed server response"),
            Error::ServerRejected(status) => write!(f, "rejected by server: {}", status),
            Error::Storage(e) => write!(f, "storage: {}", e),
            Error::Overflow => f.write_str("buffer overflow"),
            Error::Timeout => f.write_str("timed out"),
            Error::Allocation => f.write_str("value exceeds fixed capacity"),
            Error::NotConnected => f.write_str("not connected"),
        }
    }
}

impl core::error::Error for Error {}

#[cfg(feature = "defmt")]
impl defmt::Format for Error {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Error::ConfigInvalid => defmt::write!(f, "ConfigInvalid"),
            Error::BadConnectionType => defmt::write!(f, "BadConnectionType"),
            Error::Network(e) => defmt::write!(f, "Network({})", e),
            Error::Parsing => defmt::write!(f, "Parsing"),
            Error::ServerRejected(s) => defmt::write!(f, "ServerRejected({})", s),
            Error::Storage(e) => defmt::write!(f, "Storage({})", e),
            Error::Overflow => defmt::write!(f, "Overflow"),
            Error::Timeout => defmt::write!(f, "Timeout"),
            Error::Allocation => defmt::write!(f, "Allocation"),
            Error::NotConnected => defmt::write!(f, "NotConnected"),
        }
    }
}
