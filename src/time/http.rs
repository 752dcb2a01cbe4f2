//! Network time from the worldtimeapi.org plain-text endpoint.

use super::{Error, TimeSource};
use crate::network::application::http::{Endpoint, HttpTransport, fetch_bounded};

pub const TIME_HOST: &str = "worldtimeapi.org";
pub const TIME_PATH: &str = "/api/timezone/Europe/Oslo.txt";
/// The plain-text response is a few hundred bytes.
const MAX_TIME_RESPONSE: usize = 512;

#[derive(Debug)]
pub struct HttpTime<T> {
    transport: T,
}

impl<T: HttpTransport> HttpTime<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    pub fn into_inner(self) -> T {
        self.transport
    }
}

impl<T: HttpTransport> TimeSource for HttpTime<T> {
    fn fetch(&mut self) -> Result<u64, Error> {
        let response = fetch_bounded(
            &mut self.transport,
            Endpoint::http(TIME_HOST),
            TIME_PATH,
            None,
            MAX_TIME_RESPONSE,
        )?;
        parse_unixtime(response.as_str().map_err(|_| Error::InvalidResponse)?)
    }
}

/// Extract the `unixtime: <digits>` field.
pub fn parse_unixtime(body: &str) -> Result<u64, Error> {
    const KEY: &str = "unixtime: ";
    let start = body.find(KEY).ok_or(Error::InvalidResponse)? + KEY.len();
    let rest = &body[start..];
    let end = rest
        .find(|c: char| c == ',' || c == '\r' || c == '\n')
        .unwrap_or(rest.len());
    rest[..end]
        .trim()
        .parse::<u64>()
        .map_err(|_| Error::InvalidResponse)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_unixtime() {
        let body = "abbreviation: CET\nclient_ip: 1.2.3.4\nunixtime: 1700000000\nutc_offset: +01:00\n";
        assert_eq!(parse_unixtime(body), Ok(1_700_000_000));
        assert_eq!(parse_unixtime("unixtime: 42,"), Ok(42));
        assert_eq!(parse_unixtime("unixtime: x"), Err(Error::InvalidResponse));
        assert_eq!(parse_unixtime("nothing"), Err(Error::InvalidResponse));
    }
}
