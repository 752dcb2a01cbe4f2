use super::{HttpTransport, Method, ResponseHead, find_slice};
use crate::network::error::Error;
use crate::network::{Close, Connect, Read, Write, write_all};
use core::fmt::Write as _;
use heapless::{String, Vec};

const MAX_HOST_LEN: usize = 128;
const MAX_HEAD_LEN: usize = 1024;
const MAX_REQUEST_LEN: usize = 2048;
const MAX_REMOTE_LEN: usize = MAX_HOST_LEN + 6;

/// HTTP/1.0 client over a socket connector.
///
/// Requests are sent with `Connection: close` so the body is either framed by
/// `Content-Length` or ends when the server closes the socket. Any body bytes
/// that arrive together with the response head are kept and handed out first
/// by [`HttpTransport::read_body`].
pub struct Client<C: Connect> {
    connector: C,
    host: String<MAX_HOST_LEN>,
    port: u16,
    tls: bool,
    connection: Option<C::Connection>,
    pending: Vec<u8, MAX_HEAD_LEN>,
    pending_pos: usize,
    remaining: Option<usize>,
}

impl<C: Connect> core::fmt::Debug for Client<C> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Client")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("tls", &self.tls)
            .field("open", &self.connection.is_some())
            .finish()
    }
}

impl<C: Connect> Client<C> {
    pub fn new(connector: C) -> Self {
        Self {
            connector,
            host: String::new(),
            port: 80,
            tls: false,
            connection: None,
            pending: Vec::new(),
            pending_pos: 0,
            remaining: None,
        }
    }

    /// Gives the connector back, closing any open exchange.
    pub fn release(mut self) -> C {
        self.finish();
        self.connector
    }

    fn finish(&mut self) {
        if let Some(connection) = self.connection.take() {
            let _ = connection.close();
        }
        self.pending.clear();
        self.pending_pos = 0;
        self.remaining = None;
    }

    fn build_request(
        &self,
        method: Method,
        path: &str,
        body: Option<&[u8]>,
    ) -> Result<Vec<u8, MAX_REQUEST_LEN>, Error> {
        let mut head: String<MAX_REQUEST_LEN> = String::new();
        write!(
            head,
            "{} {} HTTP/1.0\r\nHost: {}\r\nConnection: close\r\nUser-Agent: iotconnect\r\n",
            method.as_str(),
            path,
            self.host
        )
        .map_err(|_| Error::Overflow)?;

        if let Some(body) = body {
            write!(
                head,
                "Content-Type: application/json\r\nContent-Length: {}\r\n",
                body.len()
            )
            .map_err(|_| Error::Overflow)?;
        }
        head.push_str("\r\n").map_err(|_| Error::Overflow)?;

        let mut request: Vec<u8, MAX_REQUEST_LEN> = Vec::new();
        request
            .extend_from_slice(head.as_bytes())
            .map_err(|_| Error::Overflow)?;
        if let Some(body) = body {
            request.extend_from_slice(body).map_err(|_| Error::Overflow)?;
        }
        Ok(request)
    }

    fn read_head(&mut self) -> Result<ResponseHead, Error> {
        let connection = self.connection.as_mut().ok_or(Error::NotOpen)?;

        let mut head_buf = [0u8; MAX_HEAD_LEN];
        let mut total_read = 0;
        let header_end = loop {
            if total_read == head_buf.len() {
                return Err(Error::Overflow);
            }
            match connection.read(&mut head_buf[total_read..]) {
                Ok(0) => return Err(Error::ConnectionClosed),
                Ok(n) => total_read += n,
                Err(_) => return Err(Error::ReadError),
            }
            if let Some(pos) = find_slice(&head_buf[..total_read], b"\r\n\r\n") {
                break pos;
            }
        };

        let header_str =
            core::str::from_utf8(&head_buf[..header_end]).map_err(|_| Error::ProtocolError)?;
        let mut lines = header_str.lines();

        // Status line
        let status_line = lines.next().ok_or(Error::ProtocolError)?;
        let mut status_parts = status_line.splitn(3, ' ');
        status_parts.next();
        let status_code = status_parts
            .next()
            .ok_or(Error::ProtocolError)?
            .parse::<u16>()
            .map_err(|_| Error::ProtocolError)?;

        let mut content_length = None;
        for line in lines {
            let Some((name, value)) = line.split_once(':') else {
                continue;
            };
            if name.trim().eq_ignore_ascii_case("Content-Length") {
                content_length = value.trim().parse::<usize>().ok();
            }
        }

        self.pending.clear();
        self.pending
            .extend_from_slice(&head_buf[header_end + 4..total_read])
            .map_err(|_| Error::Overflow)?;
        self.pending_pos = 0;
        self.remaining = content_length;

        Ok(ResponseHead {
            status_code,
            content_length,
        })
    }
}

impl<C: Connect> HttpTransport for Client<C> {
    fn configure(&mut self, host: &str, port: u16, tls: bool) -> Result<(), Error> {
        self.finish();
        self.host = String::try_from(host).map_err(|_| Error::InvalidAddress)?;
        self.port = port;
        self.tls = tls;
        Ok(())
    }

    fn send(
        &mut self,
        method: Method,
        path: &str,
        body: Option<&[u8]>,
    ) -> Result<ResponseHead, Error> {
        self.finish();
        if self.host.is_empty() {
            return Err(Error::InvalidAddress);
        }

        let request = self.build_request(method, path, body)?;

        let mut remote: String<MAX_REMOTE_LEN> = String::new();
        write!(remote, "{}:{}", self.host, self.port).map_err(|_| Error::InvalidAddress)?;
        let connection = self
            .connector
            .connect(&remote, self.tls)
            .map_err(|_| Error::ConnectionRefused)?;
        let connection = self.connection.insert(connection);

        write_all(connection, &request)?;
        connection.flush().map_err(|_| Error::WriteError)?;

        match self.read_head() {
            Ok(head) => Ok(head),
            Err(e) => {
                self.finish();
                Err(e)
            }
        }
    }

    fn read_body(&mut self, buf: &mut [u8]) -> Result<usize, Error> {
        let limit = match self.remaining {
            Some(0) => {
                self.finish();
                return Ok(0);
            }
            Some(left) => buf.len().min(left),
            None => buf.len(),
        };

        let n = if self.pending_pos < self.pending.len() {
            let available = &self.pending[self.pending_pos..];
            let n = available.len().min(limit);
            buf[..n].copy_from_slice(&available[..n]);
            self.pending_pos += n;
            n
        } else {
            let Some(connection) = self.connection.as_mut() else {
                return Ok(0);
            };
            match connection.read(&mut buf[..limit]) {
                Ok(0) => {
                    self.finish();
                    return Ok(0);
                }
                Ok(n) => n,
                Err(_) => {
                    self.finish();
                    return Err(Error::ReadError);
                }
            }
        };

        if let Some(left) = self.remaining.as_mut() {
            *left -= n;
        }
        Ok(n)
    }
}
