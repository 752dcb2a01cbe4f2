//! Time from the modem's network-synchronized clock (`AT+CCLK?`).

use super::calendar::{DateTime, datetime_to_unix};
use super::{Error, TimeSource};
use crate::network::modem::AtCommand;

const CLOCK_QUERY: &str = "AT+CCLK?";
/// The modem reports this year until it has network time.
const YEAR_NOT_READY: u16 = 70;
/// Seconds per timezone unit (quarter hour).
const TZ_UNIT_SECS: i64 = 900;

#[derive(Debug)]
pub struct ModemTime<M> {
    modem: M,
}

impl<M: AtCommand> ModemTime<M> {
    pub fn new(modem: M) -> Self {
        Self { modem }
    }

    pub fn into_inner(self) -> M {
        self.modem
    }
}

impl<M: AtCommand> TimeSource for ModemTime<M> {
    fn fetch(&mut self) -> Result<u64, Error> {
        let mut response = [0u8; 64];
        let len = self
            .modem
            .command(CLOCK_QUERY, &mut response)
            .map_err(|_| Error::Modem)?;
        let text = core::str::from_utf8(&response[..len.min(response.len())])
            .map_err(|_| Error::InvalidResponse)?;
        parse_cclk(text)
    }
}

/// Parse `+CCLK: "YY/MM/DD,hh:mm:ss±TZ"` into Unix time (UTC).
///
/// `TZ` counts quarter hours of the local offset.
pub fn parse_cclk(response: &str) -> Result<u64, Error> {
    let start = response.find('"').ok_or(Error::InvalidResponse)? + 1;
    let rest = &response[start..];
    let end = rest.find('"').ok_or(Error::InvalidResponse)?;
    let stamp = rest[..end].as_bytes();

    // YY/MM/DD,hh:mm:ss±ZZ
    if stamp.len() < 18 || stamp[2] != b'/' || stamp[5] != b'/' || stamp[8] != b',' {
        return Err(Error::InvalidResponse);
    }
    let yy = two_digits(stamp, 0)?;
    if u16::from(yy) == YEAR_NOT_READY {
        return Err(Error::NotReady);
    }

    let local = DateTime {
        year: 2000 + u16::from(yy),
        month: two_digits(stamp, 3)?,
        day: two_digits(stamp, 6)?,
        hour: two_digits(stamp, 9)?,
        minute: two_digits(stamp, 12)?,
        second: two_digits(stamp, 15)?,
    };
    if !local.is_valid() {
        return Err(Error::InvalidResponse);
    }

    let sign: i64 = match stamp[17] {
        b'+' => 1,
        b'-' => -1,
        _ => return Err(Error::InvalidResponse),
    };
    let tz: i64 = core::str::from_utf8(&stamp[18..])
        .map_err(|_| Error::InvalidResponse)?
        .parse()
        .map_err(|_| Error::InvalidResponse)?;

    let utc = datetime_to_unix(&local) as i64 - sign * TZ_UNIT_SECS * tz;
    u64::try_from(utc).map_err(|_| Error::InvalidResponse)
}

fn two_digits(bytes: &[u8], at: usize) -> Result<u8, Error> {
    let hi = bytes[at];
    let lo = bytes[at + 1];
    if !hi.is_ascii_digit() || !lo.is_ascii_digit() {
        return Err(Error::InvalidResponse);
    }
    Ok((hi - b'0') * 10 + (lo - b'0'))
}
