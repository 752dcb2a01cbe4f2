//! Scripted collaborators shared by the integration tests.

#![allow(dead_code)]

use embedded_hal::delay::DelayNs;
use iotconnect::iotconnect::{AckStatus, Command, EventHandler, OtaUpdate};
use iotconnect::network::application::http::{HttpTransport, Method, ResponseHead};
use iotconnect::network::application::mqtt::{
    ConnectParams, ConnectionStatus, Message, MqttTransport, Notification, QoS, SessionEvents,
};
use iotconnect::network::error::Error;
use std::collections::VecDeque;

/// A response queued on [`MockHttp`].
#[derive(Debug, Clone)]
pub struct Canned {
    pub status: u16,
    pub body: Vec<u8>,
    /// Send `Content-Length`; otherwise the body is streamed.
    pub framed: bool,
    /// Largest piece handed out per read.
    pub chunk: usize,
}

/// A request seen by [`MockHttp`].
#[derive(Debug, Clone, PartialEq)]
pub struct Sent {
    pub host: String,
    pub port: u16,
    pub tls: bool,
    pub method: Method,
    pub path: String,
    pub body: Option<String>,
}

#[derive(Debug, Default)]
pub struct MockHttp {
    responses: VecDeque<Canned>,
    pub requests: Vec<Sent>,
    endpoint: Option<(String, u16, bool)>,
    body: Vec<u8>,
    pos: usize,
    chunk: usize,
}

impl MockHttp {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(self, body: &str) -> Self {
        self.respond_with(Canned {
            status: 200,
            body: body.as_bytes().to_vec(),
            framed: true,
            chunk: usize::MAX,
        })
    }

    pub fn respond_with(mut self, canned: Canned) -> Self {
        self.responses.push_back(canned);
        self
    }
}

impl HttpTransport for MockHttp {
    fn configure(&mut self, host: &str, port: u16, tls: bool) -> Result<(), Error> {
        self.endpoint = Some((host.to_string(), port, tls));
        Ok(())
    }

    fn send(
        &mut self,
        method: Method,
        path: &str,
        body: Option<&[u8]>,
    ) -> Result<ResponseHead, Error> {
        let (host, port, tls) = self.endpoint.clone().ok_or(Error::InvalidAddress)?;
        self.requests.push(Sent {
            host,
            port,
            tls,
            method,
            path: path.to_string(),
            body: body.map(|b| String::from_utf8_lossy(b).into_owned()),
        });

        let canned = self.responses.pop_front().ok_or(Error::ConnectionRefused)?;
        self.pos = 0;
        self.chunk = canned.chunk;
        self.body = canned.body;
        Ok(ResponseHead {
            status_code: canned.status,
            content_length: canned.framed.then_some(self.body.len()),
        })
    }

    fn read_body(&mut self, buf: &mut [u8]) -> Result<usize, Error> {
        let left = &self.body[self.pos..];
        let n = left.len().min(buf.len()).min(self.chunk);
        buf[..n].copy_from_slice(&left[..n]);
        self.pos += n;
        Ok(n)
    }
}

/// Broker stand-in. Connect outcomes are scripted per attempt; once the
/// script runs out every attempt succeeds.
#[derive(Debug)]
pub struct MockMqtt {
    pub begin_results: VecDeque<Result<(), Error>>,
    /// Whether a successful `begin` completes the connection immediately.
    pub accept: bool,
    pub subscribe_result: Result<(), Error>,
    pub connected: bool,
    pub begins: usize,
    pub ends: usize,
    pub last_params: Option<(String, String, Option<String>)>,
    pub subscribed: Vec<String>,
    pub published: Vec<(String, Vec<u8>, QoS)>,
    pub inbound: VecDeque<Vec<u8>>,
}

impl Default for MockMqtt {
    fn default() -> Self {
        Self {
            begin_results: VecDeque::new(),
            accept: true,
            subscribe_result: Ok(()),
            connected: false,
            begins: 0,
            ends: 0,
            last_params: None,
            subscribed: Vec::new(),
            published: Vec::new(),
            inbound: VecDeque::new(),
        }
    }
}

impl MockMqtt {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(results: &[Error]) -> Self {
        Self {
            begin_results: results.iter().map(|e| Err(*e)).collect(),
            ..Self::default()
        }
    }

    pub fn published_text(&self) -> Vec<(String, String)> {
        self.published
            .iter()
            .map(|(t, p, _)| (t.clone(), String::from_utf8_lossy(p).into_owned()))
            .collect()
    }
}

impl MqttTransport for MockMqtt {
    fn begin(&mut self, params: &ConnectParams<'_>) -> Result<(), Error> {
        self.begins += 1;
        self.last_params = Some((
            params.host.to_string(),
            params.client_id.to_string(),
            params.username.map(str::to_string),
        ));
        self.begin_results.pop_front().unwrap_or(Ok(()))?;
        self.connected = self.accept;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn subscribe(&mut self, topic: &str, _qos: QoS) -> Result<(), Error> {
        self.subscribe_result?;
        self.subscribed.push(topic.to_string());
        Ok(())
    }

    fn publish(&mut self, topic: &str, payload: &[u8], qos: QoS) -> Result<(), Error> {
        if !self.connected {
            return Err(Error::NotConnected);
        }
        self.published.push((topic.to_string(), payload.to_vec(), qos));
        Ok(())
    }

    fn read_message(
        &mut self,
        _notification: &Notification,
        buf: &mut [u8],
    ) -> Result<usize, Error> {
        let payload = self.inbound.pop_front().unwrap_or_default();
        if payload.len() > buf.len() {
            return Err(Error::Overflow);
        }
        buf[..payload.len()].copy_from_slice(&payload);
        Ok(payload.len())
    }

    fn end(&mut self) {
        self.ends += 1;
        self.connected = false;
    }
}

/// Records every millisecond delay instead of sleeping.
#[derive(Debug, Default)]
pub struct MockDelay {
    pub delays: Vec<u32>,
}

impl DelayNs for MockDelay {
    fn delay_ns(&mut self, _ns: u32) {}

    fn delay_ms(&mut self, ms: u32) {
        self.delays.push(ms);
    }
}

/// Records session and application events.
#[derive(Debug, Default)]
pub struct Recorder {
    pub statuses: Vec<ConnectionStatus>,
    pub messages: Vec<(String, Vec<u8>, Option<u16>)>,
    pub commands: Vec<String>,
    pub updates: Vec<String>,
    pub command_status: Option<AckStatus>,
}

impl Recorder {
    fn status(&mut self, status: ConnectionStatus) {
        self.statuses.push(status);
    }

    fn message(&mut self, message: &Message<'_>) {
        self.messages.push((
            message.topic.to_string(),
            message.payload.to_vec(),
            message.message_id,
        ));
    }
}

impl SessionEvents for Recorder {
    fn on_status(&mut self, status: ConnectionStatus) {
        self.status(status);
    }

    fn on_message(&mut self, message: &Message<'_>) {
        self.message(message);
    }
}

impl EventHandler for Recorder {
    fn on_status(&mut self, status: ConnectionStatus) {
        self.status(status);
    }

    fn on_message(&mut self, message: &Message<'_>) {
        self.message(message);
    }

    fn on_command(&mut self, command: &Command) -> AckStatus {
        self.commands.push(command.command.to_string());
        self.command_status.unwrap_or(AckStatus::Success)
    }

    fn on_ota(&mut self, update: &OtaUpdate) -> AckStatus {
        self.updates.push(update.version.to_string());
        AckStatus::Failure("OTA disabled")
    }
}

pub const DISCOVERY_RESPONSE: &str = r#"{"d":{"bu":"abc.cloud","ep":"/xyz"}}"#;
pub const IDENTITY_RESPONSE: &str = r#"{"d":{"ct":1,"cpId":"ACME","dtg":"tmpl1","broker":{"h":"mqtt.acme.io","cN":"ACME-dev1","un":"user1"}}}"#;
