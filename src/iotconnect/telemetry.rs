//! Telemetry documents.

use super::Error;
use crate::time::calendar::DateTime;
use core::fmt::Write as _;
use heapless::String;

/// Largest rendered telemetry document.
pub const MAX_TELEMETRY_LEN: usize = 768;
const MAX_FIELDS_LEN: usize = MAX_TELEMETRY_LEN - 64;
const MAX_QUOTED_LEN: usize = 256;

/// Builds `{"d":[{"dt":<time>,"d":{<key>:<value>,...}}]}`.
///
/// A field that does not fit is rejected with `Overflow` and the document is
/// left as it was.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Telemetry {
    fields: String<MAX_FIELDS_LEN>,
    timestamp: Option<DateTime>,
}

impl Telemetry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stamp the document with the time of measurement.
    pub fn with_timestamp(mut self, timestamp: DateTime) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn set_timestamp(&mut self, timestamp: Option<DateTime>) {
        self.timestamp = timestamp;
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn add_str(&mut self, key: &str, value: &str) -> Result<&mut Self, Error> {
        self.field(key, |fields| push_quoted(fields, value))
    }

    pub fn add_int(&mut self, key: &str, value: i64) -> Result<&mut Self, Error> {
        self.field(key, |fields| write!(fields, "{}", value).map_err(|_| Error::Overflow))
    }

    /// Non-finite values are written as `null`.
    pub fn add_float(&mut self, key: &str, value: f64) -> Result<&mut Self, Error> {
        self.field(key, |fields| {
            if value.is_finite() {
                write!(fields, "{}", value)
            } else {
                fields.write_str("null")
            }
            .map_err(|_| Error::Overflow)
        })
    }

    pub fn add_bool(&mut self, key: &str, value: bool) -> Result<&mut Self, Error> {
        self.field(key, |fields| {
            fields
                .push_str(if value { "true" } else { "false" })
                .map_err(|_| Error::Overflow)
        })
    }

    fn field<F>(&mut self, key: &str, value: F) -> Result<&mut Self, Error>
    where
        F: FnOnce(&mut String<MAX_FIELDS_LEN>) -> Result<(), Error>,
    {
        let mark = self.fields.len();
        let result = self.push_key(key).and_then(|_| value(&mut self.fields));
        if let Err(e) = result {
            warn!("Telemetry field {} dropped", key);
            self.fields.truncate(mark);
            return Err(e);
        }
        Ok(self)
    }

    fn push_key(&mut self, key: &str) -> Result<(), Error> {
        if !self.fields.is_empty() {
            self.fields.push(',').map_err(|_| Error::Overflow)?;
        }
        push_quoted(&mut self.fields, key)?;
        self.fields.push(':').map_err(|_| Error::Overflow)
    }

    /// The complete document.
    pub fn render(&self) -> Result<String<MAX_TELEMETRY_LEN>, Error> {
        let mut out = String::new();
        out.push_str("{\"d\":[{").map_err(|_| Error::Overflow)?;
        if let Some(timestamp) = &self.timestamp {
            write!(out, "\"dt\":\"{}\",", timestamp).map_err(|_| Error::Overflow)?;
        }
        write!(out, "\"d\":{{{}}}}}]}}", self.fields).map_err(|_| Error::Overflow)?;
        Ok(out)
    }
}

fn push_quoted<const N: usize>(out: &mut String<N>, value: &str) -> Result<(), Error> {
    let quoted: String<MAX_QUOTED_LEN> =
        serde_json_core::to_string(&value).map_err(|_| Error::Overflow)?;
    out.push_str(&quoted).map_err(|_| Error::Overflow)
}
