//! Wall-clock time for devices without a battery-backed RTC.
//!
//! A [`TimeSource`] is queried once (network time over HTTP, or the modem's
//! own clock), and the [`Clock`] records the wall-clock time at uptime zero.
//! Later reads only need the monotonic [`Uptime`] counter.

#![allow(missing_docs)]
#![deny(unsafe_code)]

use crate::network;
use core::fmt;

pub mod calendar;
pub mod http;
pub mod modem;

pub use calendar::DateTime;
pub use http::HttpTime;
pub use modem::ModemTime;

/// Errors from a time lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The source has no valid time yet.
    NotReady,
    /// The response could not be parsed.
    InvalidResponse,
    /// The HTTP lookup failed.
    Network(network::error::Error),
    /// The modem did not answer the clock query.
    Modem,
}

impl From<network::error::Error> for Error {
    fn from(e: network::error::Error) -> Self {
        Error::Network(e)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::NotReady => f.write_str("clock not ready"),
            Error::InvalidResponse => f.write_str("invalid time response"),
            Error::Network(e) => write!(f, "time lookup failed: {}", e),
            Error::Modem => f.write_str("modem clock query failed"),
        }
    }
}

impl core::error::Error for Error {}

#[cfg(feature = "defmt")]
impl defmt::Format for Error {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Error::NotReady => defmt::write!(f, "NotReady"),
            Error::InvalidResponse => defmt::write!(f, "InvalidResponse"),
            Error::Network(e) => defmt::write!(f, "Network({})", e),
            Error::Modem => defmt::write!(f, "Modem"),
        }
    }
}

/// Monotonic milliseconds since boot.
pub trait Uptime {
    fn uptime_ms(&self) -> u64;
}

impl<U: Uptime + ?Sized> Uptime for &U {
    fn uptime_ms(&self) -> u64 {
        (**self).uptime_ms()
    }
}

/// Something that can tell the current Unix time.
pub trait TimeSource {
    fn fetch(&mut self) -> Result<u64, Error>;
}

/// Wall clock derived from one successful lookup and the uptime counter.
#[derive(Debug)]
pub struct Clock<U> {
    uptime: U,
    /// Unix time in milliseconds at uptime zero.
    start_ms: Option<u64>,
}

impl<U: Uptime> Clock<U> {
    pub fn new(uptime: U) -> Self {
        Self {
            uptime,
            start_ms: None,
        }
    }

    /// Query `source` up to `max_tries` times.
    ///
    /// Returns the current Unix time, or 0 if every attempt failed. A failed
    /// sync keeps any earlier reference.
    pub fn sync<S: TimeSource>(&mut self, source: &mut S, max_tries: u32) -> u64 {
        for attempt in 1..=max_tries {
            match source.fetch() {
                Ok(0) => warn!("Time source returned 0 (attempt {})", attempt),
                Ok(unix) => {
                    self.set(unix);
                    info!("Time synchronized: {}", unix);
                    return self.now();
                }
                Err(e) => warn!("Time lookup failed (attempt {}): {}", attempt, e),
            }
        }
        error!("Unable to obtain time after {} attempts", max_tries);
        0
    }

    /// Set the current Unix time.
    pub fn set(&mut self, unix: u64) {
        let uptime_ms = self.uptime.uptime_ms();
        self.start_ms = Some(unix.saturating_mul(1000).saturating_sub(uptime_ms));
    }

    /// Current Unix time, 0 before the first sync.
    pub fn now(&self) -> u64 {
        match self.start_ms {
            Some(start) => (start + self.uptime.uptime_ms()) / 1000,
            None => 0,
        }
    }

    pub fn is_synced(&self) -> bool {
        self.start_ms.is_some()
    }

    /// Current UTC date and time, if synced.
    pub fn datetime(&self) -> Option<DateTime> {
        self.is_synced().then(|| calendar::unix_to_datetime(self.now()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::cell::Cell;

    struct ManualUptime(Cell<u64>);

    impl Uptime for ManualUptime {
        fn uptime_ms(&self) -> u64 {
            self.0.get()
        }
    }

    struct Flaky {
        failures: u32,
        calls: u32,
    }

    impl TimeSource for Flaky {
        fn fetch(&mut self) -> Result<u64, Error> {
            self.calls += 1;
            if self.calls <= self.failures {
                Err(Error::NotReady)
            } else {
                Ok(1_700_000_000)
            }
        }
    }

    #[test]
    fn test_now_advances_with_uptime() {
        let uptime = ManualUptime(Cell::new(12_345));
        let mut clock = Clock::new(&uptime);
        assert_eq!(clock.now(), 0);

        clock.set(1_700_000_000);
        assert_eq!(clock.now(), 1_700_000_000);

        uptime.0.set(12_345 + 90_000);
        assert_eq!(clock.now(), 1_700_000_090);
    }

    #[test]
    fn test_sync_retries_then_gives_up() {
        let uptime = ManualUptime(Cell::new(0));
        let mut clock = Clock::new(&uptime);

        let mut source = Flaky {
            failures: 5,
            calls: 0,
        };
        assert_eq!(clock.sync(&mut source, 3), 0);
        assert_eq!(source.calls, 3);
        assert!(!clock.is_synced());

        let mut source = Flaky {
            failures: 2,
            calls: 0,
        };
        assert_eq!(clock.sync(&mut source, 3), 1_700_000_000);
        assert!(clock.is_synced());
    }
}
