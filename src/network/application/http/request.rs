//! Bounded request helper.
//!
//! Reads a whole response body into one fixed buffer. Bodies framed by
//! `Content-Length` are read to their length; streamed bodies are read in
//! chunks of half the usable buffer until a short read. A body that does not
//! fit is an [`Error::Overflow`], never a silent truncation.

use super::{HttpTransport, Method};
use crate::fmt::printable;
use crate::network::error::Error;
use heapless::Vec;

/// Receive buffer size.
pub const BUFFER_SIZE: usize = 2000;
/// Part of the buffer kept free for transport bookkeeping.
const HEADER_SLACK: usize = 64;
/// Largest body accepted.
pub const MAX_RESPONSE_SIZE: usize = BUFFER_SIZE - HEADER_SLACK;
/// Size of each read when the body length is unknown.
pub const CHUNK_SIZE: usize = MAX_RESPONSE_SIZE / 2;

const HTTPS_PORT: u16 = 443;
const HTTP_PORT: u16 = 80;

/// Where a request goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Endpoint<'a> {
    pub host: &'a str,
    pub port: u16,
    pub tls: bool,
}

impl<'a> Endpoint<'a> {
    pub const fn https(host: &'a str) -> Self {
        Self {
            host,
            port: HTTPS_PORT,
            tls: true,
        }
    }

    pub const fn http(host: &'a str) -> Self {
        Self {
            host,
            port: HTTP_PORT,
            tls: false,
        }
    }
}

/// A fully received response. Dropping it releases the buffer.
#[derive(Debug)]
pub struct HttpResponse {
    status_code: u16,
    data: Vec<u8, BUFFER_SIZE>,
    start: usize,
}

impl HttpResponse {
    pub fn status_code(&self) -> u16 {
        self.status_code
    }

    pub fn body(&self) -> &[u8] {
        &self.data[self.start..]
    }

    /// Body as text. Fails if the body is not UTF-8.
    pub fn as_str(&self) -> Result<&str, Error> {
        core::str::from_utf8(self.body()).map_err(|_| Error::InvalidResponse)
    }

    pub fn len(&self) -> usize {
        self.data.len() - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Check the body holds a JSON object at or near its start.
    ///
    /// Leading bytes before the opening brace are skipped with a warning.
    fn validate_json(&mut self) -> Result<(), Error> {
        match self.data.iter().position(|&b| b == b'{') {
            None => {
                error!("Response is not a JSON object");
                error!("Raw response: {}", printable(&self.data));
                Err(Error::InvalidResponse)
            }
            Some(0) => Ok(()),
            Some(pos) => {
                warn!("JSON object starts at offset {}", pos);
                warn!("Raw response: {}", printable(&self.data));
                self.start = pos;
                Ok(())
            }
        }
    }
}

/// Issue a request and collect the body, up to [`MAX_RESPONSE_SIZE`] bytes.
///
/// `GET` without a body, `POST` with a JSON body otherwise.
pub fn fetch<T: HttpTransport>(
    transport: &mut T,
    endpoint: Endpoint<'_>,
    path: &str,
    body: Option<&[u8]>,
) -> Result<HttpResponse, Error> {
    fetch_bounded(transport, endpoint, path, body, MAX_RESPONSE_SIZE)
}

/// Like [`fetch`] with a smaller body ceiling.
pub fn fetch_bounded<T: HttpTransport>(
    transport: &mut T,
    endpoint: Endpoint<'_>,
    path: &str,
    body: Option<&[u8]>,
    max_size: usize,
) -> Result<HttpResponse, Error> {
    let max_size = max_size.min(MAX_RESPONSE_SIZE);
    let body = body.filter(|b| !b.is_empty());
    let method = if body.is_some() {
        Method::Post
    } else {
        Method::Get
    };

    transport.configure(endpoint.host, endpoint.port, endpoint.tls)?;
    let head = transport.send(method, path, body).inspect_err(|e| {
        error!("{} {}{} failed: {}", method.as_str(), endpoint.host, path, e);
    })?;

    if head.status_code == 0 {
        error!("No response from {}{}", endpoint.host, path);
        return Err(Error::HttpStatus);
    }
    if head.status_code != 200 {
        warn!("{}{} returned status {}", endpoint.host, path, head.status_code);
    }

    let mut data: Vec<u8, BUFFER_SIZE> = Vec::new();
    match head.content_length {
        Some(len) if len > max_size => {
            error!("Response of {} bytes exceeds limit of {}", len, max_size);
            return Err(Error::Overflow);
        }
        Some(len) => read_length(transport, &mut data, len)?,
        None => read_chunked(transport, &mut data, max_size)?,
    }

    if data.is_empty() {
        error!("Empty response from {}{}", endpoint.host, path);
        return Err(Error::EmptyResponse);
    }

    Ok(HttpResponse {
        status_code: head.status_code,
        data,
        start: 0,
    })
}

/// Secure request against the IoTConnect services.
///
/// Uses HTTPS and requires the body to be a JSON object.
pub fn request<T: HttpTransport>(
    transport: &mut T,
    host: &str,
    path: &str,
    body: Option<&[u8]>,
) -> Result<HttpResponse, Error> {
    let mut response = fetch(transport, Endpoint::https(host), path, body)?;
    response.validate_json()?;
    Ok(response)
}

/// Treats a timed-out read as the end of the body.
fn read_some<T: HttpTransport>(transport: &mut T, buf: &mut [u8]) -> Result<usize, Error> {
    match transport.read_body(buf) {
        Err(Error::Timeout) => Ok(0),
        other => other,
    }
}

fn read_length<T: HttpTransport>(
    transport: &mut T,
    data: &mut Vec<u8, BUFFER_SIZE>,
    len: usize,
) -> Result<(), Error> {
    data.resize(len, 0).map_err(|_| Error::Overflow)?;
    let mut filled = 0;
    while filled < len {
        let n = read_some(transport, &mut data[filled..])?;
        if n == 0 {
            warn!("Body ended after {} of {} bytes", filled, len);
            break;
        }
        filled += n;
    }
    data.truncate(filled);
    Ok(())
}

fn read_chunked<T: HttpTransport>(
    transport: &mut T,
    data: &mut Vec<u8, BUFFER_SIZE>,
    max_size: usize,
) -> Result<(), Error> {
    let chunk_size = CHUNK_SIZE.min(max_size);
    loop {
        let want = chunk_size.min(max_size - data.len());
        if want == 0 {
            // Buffer full after a full chunk: anything left means it did not fit.
            let mut extra = [0u8; 1];
            if read_some(transport, &mut extra)? > 0 {
                error!("Streamed response exceeds limit of {}", max_size);
                return Err(Error::Overflow);
            }
            return Ok(());
        }

        let start = data.len();
        data.resize(start + want, 0).map_err(|_| Error::Overflow)?;
        let n = read_some(transport, &mut data[start..])?;
        data.truncate(start + n);
        trace!("Read chunk of {} bytes", n);
        if n < want {
            return Ok(());
        }
    }
}
