//! AT-command access to the cellular modem.
//!
//! Only the request/response exchange is modelled. Framing, echo suppression
//! and URC filtering belong to the modem driver.

/// Issue one AT command and collect its response.
pub trait AtCommand {
    /// Associated error type
    type Error: core::fmt::Debug;

    /// Sends `command` (without the trailing `\r`) and writes the response
    /// text, minus the final `OK`, into `response`. Returns the number of bytes
    /// written.
    fn command(&mut self, command: &str, response: &mut [u8]) -> Result<usize, Self::Error>;
}
