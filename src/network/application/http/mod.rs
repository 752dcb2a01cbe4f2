//! HTTP for discovery, identity and time lookups.
//!
//! [`HttpTransport`] is the capability the rest of the crate consumes. It
//! mirrors what cellular modems with an on-chip HTTP engine expose: select an
//! endpoint, send one request, then pull the body in pieces.

use crate::network::error::Error;

pub mod client;
pub mod request;

pub use client::Client;
pub use request::{
    BUFFER_SIZE, CHUNK_SIZE, Endpoint, HttpResponse, MAX_RESPONSE_SIZE, fetch, fetch_bounded,
    request,
};

/// Request method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

impl Method {
    pub(crate) fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
        }
    }
}

/// Status line and framing information of a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseHead {
    /// HTTP status, `0` when the transport got no response at all.
    pub status_code: u16,
    /// Value of `Content-Length`, absent for streamed bodies.
    pub content_length: Option<usize>,
}

/// One request/response exchange at a time against a configurable endpoint.
pub trait HttpTransport {
    /// Select host, port and whether the exchange runs over TLS.
    fn configure(&mut self, host: &str, port: u16, tls: bool) -> Result<(), Error>;

    /// Send a request. A body implies a JSON payload.
    fn send(
        &mut self,
        method: Method,
        path: &str,
        body: Option<&[u8]>,
    ) -> Result<ResponseHead, Error>;

    /// Read the next part of the body into `buf`.
    ///
    /// `Ok(0)` and `Err(Error::Timeout)` both mean no more data.
    fn read_body(&mut self, buf: &mut [u8]) -> Result<usize, Error>;
}

impl<T: HttpTransport + ?Sized> HttpTransport for &mut T {
    fn configure(&mut self, host: &str, port: u16, tls: bool) -> Result<(), Error> {
        (**self).configure(host, port, tls)
    }

    fn send(
        &mut self,
        method: Method,
        path: &str,
        body: Option<&[u8]>,
    ) -> Result<ResponseHead, Error> {
        (**self).send(method, path, body)
    }

    fn read_body(&mut self, buf: &mut [u8]) -> Result<usize, Error> {
        (**self).read_body(buf)
    }
}

/// Finds the first occurrence of a slice in another slice and returns its starting position.
pub(crate) fn find_slice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}
