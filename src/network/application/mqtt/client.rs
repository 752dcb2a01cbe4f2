//! MQTT 3.1.1 client over a socket connector.
//!
//! Implements [`MqttTransport`] for modems that only expose TCP/TLS sockets.
//! Only what the IoTConnect session needs is supported: CONNECT with
//! username/password, SUBSCRIBE with SUBACK check, PUBLISH at QoS 0/1
//! (QoS 1 is fire-and-forget, PUBACKs are consumed by [`service`]), inbound
//! PUBLISH at QoS 0/1 with PUBACK, keep-alive PINGREQ/PINGRESP and DISCONNECT.
//!
//! [`service`] is one tick of the client. It reads at most one packet, and
//! once the keep-alive period has passed without an outbound packet it sends
//! a PINGREQ. No PINGRESP within another period, a read error or end of
//! stream drops the link.
//!
//! [`service`]: MqttTransport::service

use super::{
    ConnectParams, MAX_MESSAGE_LEN, MAX_TOPIC_LEN, Mailbox, MqttTransport, Notification, QoS,
};
use crate::network::error::Error;
use crate::network::{Close, Connect, Read, Write, read_exact, write_all};
use core::fmt::Write as _;
use heapless::{String, Vec};

// MQTT Control Packet types - these are the fixed header packet type values
const CONNECT: u8 = 0x10;
const CONNACK: u8 = 0x20;
const PUBLISH: u8 = 0x30;
const PUBACK: u8 = 0x40;
const SUBSCRIBE: u8 = 0x82;
const SUBACK: u8 = 0x90;
const PINGREQ: u8 = 0xC0;
const PINGRESP: u8 = 0xD0;
const DISCONNECT: u8 = 0xE0;

// Protocol constants defined by MQTT 3.1.1 specification
const PROTOCOL_NAME: &[u8] = b"MQTT";
const PROTOCOL_LEVEL: u8 = 4;

const FLAG_USERNAME: u8 = 0x80;
const FLAG_PASSWORD: u8 = 0x40;
const FLAG_CLEAN_SESSION: u8 = 0x02;

const MAX_PACKET_LEN: usize = MAX_TOPIC_LEN + MAX_MESSAGE_LEN + 8;
const MAX_SUBSCRIBE_LEN: usize = MAX_TOPIC_LEN + 5;
const MAX_REMOTE_LEN: usize = 134;
const MAX_CONNECT_LEN: usize = 640;
/// Packets accepted while waiting for a SUBACK.
const MAX_PACKETS_BEFORE_SUBACK: usize = 8;

/// Default interval between [`MqttTransport::service`] calls.
pub const DEFAULT_TICK_MS: u32 = 500;

/// What one read of the socket produced.
enum Inbound {
    Nothing,
    /// An oversized packet was discarded. Carries the id to acknowledge for
    /// a QoS 1 PUBLISH.
    Skipped(Option<u16>),
    Packet(u8),
}

/// A received PUBLISH held until the session reads it.
#[derive(Debug)]
struct Held {
    topic: String<MAX_TOPIC_LEN>,
    payload: Vec<u8, MAX_MESSAGE_LEN>,
    message_id: u16,
    announced: bool,
}

pub struct Client<C: Connect> {
    connector: C,
    connection: Option<C::Connection>,
    is_connected: bool,
    next_packet_id: u16,
    held: Option<Held>,
    tick_ms: u32,
    keep_alive_ticks: u32,
    idle_ticks: u32,
    /// Ticks spent waiting for a PINGRESP.
    ping_ticks: Option<u32>,
}

impl<C: Connect> core::fmt::Debug for Client<C> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Client")
            .field("is_connected", &self.is_connected)
            .field("next_packet_id", &self.next_packet_id)
            .field("held", &self.held.is_some())
            .field("keep_alive_ticks", &self.keep_alive_ticks)
            .field("idle_ticks", &self.idle_ticks)
            .field("ping_ticks", &self.ping_ticks)
            .finish()
    }
}

impl<C: Connect> Client<C> {
    pub fn new(connector: C) -> Self {
        Self {
            connector,
            connection: None,
            is_connected: false,
            next_packet_id: 1,
            held: None,
            tick_ms: DEFAULT_TICK_MS,
            keep_alive_ticks: 0,
            idle_ticks: 0,
            ping_ticks: None,
        }
    }

    /// Interval at which the caller services the client, used to count down
    /// the keep-alive period. Takes effect on the next connection.
    pub fn with_tick_ms(mut self, tick_ms: u32) -> Self {
        self.tick_ms = tick_ms.max(1);
        self
    }

    /// Send a PINGREQ and start waiting for the PINGRESP.
    pub fn ping(&mut self) -> Result<(), Error> {
        self.send_packet(PINGREQ, &[])?;
        self.ping_ticks = Some(0);
        Ok(())
    }

    /// Whether a PINGREQ is waiting for its response.
    pub fn is_ping_outstanding(&self) -> bool {
        self.ping_ticks.is_some()
    }

    fn packet_id(&mut self) -> u16 {
        let id = self.next_packet_id;
        self.next_packet_id = self.next_packet_id.checked_add(1).unwrap_or(1);
        id
    }

    fn send_packet(&mut self, header: u8, body: &[u8]) -> Result<(), Error> {
        let connection = self.connection.as_mut().ok_or(Error::NotOpen)?;

        let mut fixed_header: Vec<u8, 5> = Vec::new();
        fixed_header.push(header).map_err(|_| Error::ProtocolError)?;
        encode_remaining_length(&mut fixed_header, body.len())?;

        let sent = transmit(connection, &fixed_header, body);
        match sent {
            Ok(()) => self.idle_ticks = 0,
            Err(_) => self.drop_connection(),
        }
        sent
    }

    /// Read one packet.
    ///
    /// Without `wait`, returns `Inbound::Nothing` when the connection has
    /// nothing to read. End of stream is `ConnectionClosed`.
    fn read_packet(
        &mut self,
        body: &mut Vec<u8, MAX_PACKET_LEN>,
        wait: bool,
    ) -> Result<Inbound, Error> {
        let connection = self.connection.as_mut().ok_or(Error::NotOpen)?;

        if !wait && !connection.read_ready().map_err(|_| Error::ReadError)? {
            return Ok(Inbound::Nothing);
        }

        let mut header_buf = [0u8; 1];
        read_exact(connection, &mut header_buf)?;
        let header = header_buf[0];

        let mut remaining_len = 0usize;
        let mut multiplier = 1usize;
        for i in 0..4 {
            let mut byte = [0u8; 1];
            read_exact(connection, &mut byte)?;
            remaining_len += (byte[0] as usize & 127) * multiplier;
            if byte[0] & 0x80 == 0 {
                break;
            }
            if i == 3 {
                return Err(Error::ProtocolError);
            }
            multiplier *= 128;
        }

        body.clear();
        if remaining_len > body.capacity() {
            warn!("Skipping {} byte packet", remaining_len);
            let ack = if header & 0xF0 == PUBLISH {
                skip_publish(connection, header, remaining_len)?
            } else {
                discard(connection, remaining_len)?;
                None
            };
            return Ok(Inbound::Skipped(ack));
        }
        body.resize(remaining_len, 0).map_err(|_| Error::Overflow)?;
        read_exact(connection, body)?;
        Ok(Inbound::Packet(header))
    }

    fn drop_connection(&mut self) {
        self.is_connected = false;
        self.held = None;
        self.ping_ticks = None;
        self.idle_ticks = 0;
        if let Some(connection) = self.connection.take() {
            let _ = connection.close();
        }
    }

    /// Handle a packet other than the one a caller is waiting for.
    fn handle(&mut self, header: u8, body: &[u8]) -> Result<(), Error> {
        match header & 0xF0 {
            PUBLISH => self.handle_publish(header, body),
            PINGRESP => {
                self.ping_ticks = None;
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn acknowledge(&mut self, message_id: Option<u16>) -> Result<(), Error> {
        match message_id {
            Some(id) => self.send_packet(PUBACK, &id.to_be_bytes()),
            None => Ok(()),
        }
    }

    fn handle_publish(&mut self, header: u8, body: &[u8]) -> Result<(), Error> {
        let qos = QoS::from_bits((header >> 1) & 0x03).ok_or(Error::ProtocolError)?;
        if body.len() < 2 {
            return Err(Error::ProtocolError);
        }
        let topic_len = u16::from_be_bytes([body[0], body[1]]) as usize;
        let mut pos = 2 + topic_len;
        if body.len() < pos {
            return Err(Error::ProtocolError);
        }
        let topic = core::str::from_utf8(&body[2..pos]).map_err(|_| Error::ProtocolError)?;

        let packet_id = if qos == QoS::AtMostOnce {
            0
        } else {
            if body.len() < pos + 2 {
                return Err(Error::ProtocolError);
            }
            let id = u16::from_be_bytes([body[pos], body[pos + 1]]);
            pos += 2;
            id
        };
        let payload = &body[pos..];

        if self.held.is_some() {
            warn!("Message on {} dropped, previous message not read", topic);
        } else {
            match (String::try_from(topic), Vec::from_slice(payload)) {
                (Ok(topic), Ok(payload)) => {
                    self.held = Some(Held {
                        topic,
                        payload,
                        message_id: packet_id,
                        announced: false,
                    })
                }
                _ => warn!("Inbound message on {} too large, dropped", topic),
            }
        }

        if qos == QoS::AtLeastOnce {
            self.acknowledge(Some(packet_id))?;
        }
        Ok(())
    }

    /// Post the held message to the mailbox once.
    fn announce(&mut self, mailbox: &Mailbox) {
        let Some(held) = self.held.as_mut() else {
            return;
        };
        if held.announced {
            return;
        }
        if mailbox.notify(&held.topic, held.payload.len(), held.message_id) {
            held.announced = true;
        } else {
            self.held = None;
        }
    }

    /// Count one tick toward the keep-alive deadline.
    fn keep_alive(&mut self) -> Result<(), Error> {
        if self.keep_alive_ticks == 0 || !self.is_connected {
            return Ok(());
        }
        if let Some(waited) = self.ping_ticks.as_mut() {
            *waited += 1;
            if *waited > self.keep_alive_ticks {
                error!("No PINGRESP after {} ticks", *waited);
                return Err(Error::Timeout);
            }
            return Ok(());
        }
        self.idle_ticks += 1;
        if self.idle_ticks >= self.keep_alive_ticks {
            trace!("Keep-alive ping");
            self.ping()?;
        }
        Ok(())
    }

    fn poll(&mut self) -> Result<(), Error> {
        let mut body: Vec<u8, MAX_PACKET_LEN> = Vec::new();
        match self.read_packet(&mut body, false)? {
            Inbound::Packet(header) => self.handle(header, &body)?,
            Inbound::Skipped(ack) => self.acknowledge(ack)?,
            Inbound::Nothing => {}
        }
        self.keep_alive()
    }
}

impl<C: Connect> MqttTransport for Client<C> {
    fn begin(&mut self, params: &ConnectParams<'_>) -> Result<(), Error> {
        self.drop_connection();

        let mut remote: String<MAX_REMOTE_LEN> = String::new();
        write!(remote, "{}:{}", params.host, params.port).map_err(|_| Error::InvalidAddress)?;
        let connection = self
            .connector
            .connect(&remote, params.tls)
            .map_err(|_| Error::ConnectionRefused)?;
        self.connection = Some(connection);

        // --- Variable Header ---
        let mut packet: Vec<u8, MAX_CONNECT_LEN> = Vec::new();
        push_str(&mut packet, PROTOCOL_NAME)?;
        packet.push(PROTOCOL_LEVEL).map_err(|_| Error::ProtocolError)?;

        let mut connect_flags = 0;
        if params.clean_session {
            connect_flags |= FLAG_CLEAN_SESSION;
        }
        if params.username.is_some() {
            connect_flags |= FLAG_USERNAME;
            if !params.password.is_empty() {
                connect_flags |= FLAG_PASSWORD;
            }
        }
        packet.push(connect_flags).map_err(|_| Error::ProtocolError)?;
        packet
            .extend_from_slice(&params.keep_alive_seconds.to_be_bytes())
            .map_err(|_| Error::ProtocolError)?;

        // --- Payload ---
        push_str(&mut packet, params.client_id.as_bytes())?;
        if let Some(username) = params.username {
            push_str(&mut packet, username.as_bytes())?;
            if !params.password.is_empty() {
                push_str(&mut packet, params.password.as_bytes())?;
            }
        }

        self.send_packet(CONNECT, &packet)?;

        // Wait for and parse CONNACK
        let connection = self.connection.as_mut().ok_or(Error::NotOpen)?;
        let mut connack_buf = [0u8; 4];
        if let Err(e) = read_exact(connection, &mut connack_buf) {
            self.drop_connection();
            return Err(e);
        }

        if connack_buf[0] != CONNACK || connack_buf[1] != 2 {
            self.drop_connection();
            return Err(Error::ProtocolError);
        }

        match connack_buf[3] {
            0 => {
                self.is_connected = true;
                self.keep_alive_ticks = match params.keep_alive_seconds {
                    0 => 0,
                    secs => (u32::from(secs) * 1000 / self.tick_ms).max(1),
                };
                Ok(())
            }
            code => {
                warn!("Broker refused connection, code {}", code);
                self.drop_connection();
                Err(Error::ConnectionRefused)
            }
        }
    }

    fn is_connected(&self) -> bool {
        self.is_connected
    }

    fn subscribe(&mut self, topic: &str, qos: QoS) -> Result<(), Error> {
        if !self.is_connected {
            return Err(Error::NotConnected);
        }
        let packet_id = self.packet_id();

        let mut packet: Vec<u8, MAX_SUBSCRIBE_LEN> = Vec::new();
        packet
            .extend_from_slice(&packet_id.to_be_bytes())
            .map_err(|_| Error::Overflow)?;
        push_str(&mut packet, topic.as_bytes())?;
        packet.push(qos as u8).map_err(|_| Error::Overflow)?;

        self.send_packet(SUBSCRIBE, &packet)?;

        // Wait for SUBACK, holding any PUBLISH that arrives first
        let mut body: Vec<u8, MAX_PACKET_LEN> = Vec::new();
        for _ in 0..MAX_PACKETS_BEFORE_SUBACK {
            let header = match self.read_packet(&mut body, true) {
                Ok(Inbound::Packet(header)) => header,
                Ok(Inbound::Skipped(ack)) => {
                    self.acknowledge(ack)?;
                    continue;
                }
                Ok(Inbound::Nothing) => continue,
                Err(e) => {
                    self.drop_connection();
                    return Err(e);
                }
            };
            if header != SUBACK {
                self.handle(header, &body)?;
                continue;
            }
            if body.len() < 3 || u16::from_be_bytes([body[0], body[1]]) != packet_id {
                return Err(Error::ProtocolError);
            }
            if body[2] == 0x80 {
                return Err(Error::ConnectionRefused);
            }
            return Ok(());
        }
        warn!("No SUBACK for packet {}", packet_id);
        Err(Error::ProtocolError)
    }

    fn publish(&mut self, topic: &str, payload: &[u8], qos: QoS) -> Result<(), Error> {
        if !self.is_connected {
            return Err(Error::NotConnected);
        }

        let mut packet: Vec<u8, MAX_PACKET_LEN> = Vec::new();
        push_str(&mut packet, topic.as_bytes())?;
        if qos != QoS::AtMostOnce {
            let packet_id = self.packet_id();
            packet
                .extend_from_slice(&packet_id.to_be_bytes())
                .map_err(|_| Error::Overflow)?;
        }
        packet.extend_from_slice(payload).map_err(|_| Error::Overflow)?;

        self.send_packet(PUBLISH | ((qos as u8) << 1), &packet)
    }

    fn read_message(
        &mut self,
        notification: &Notification,
        buf: &mut [u8],
    ) -> Result<usize, Error> {
        let Some(held) = self.held.take() else {
            return Ok(0);
        };
        if held.topic != notification.topic {
            warn!("Held message is for {}, not {}", held.topic, notification.topic);
        }
        if held.payload.len() > buf.len() {
            return Err(Error::Overflow);
        }
        buf[..held.payload.len()].copy_from_slice(&held.payload);
        Ok(held.payload.len())
    }

    fn end(&mut self) {
        if self.is_connected {
            let _ = self.send_packet(DISCONNECT, &[]);
        }
        self.drop_connection();
    }

    fn service(&mut self, mailbox: &Mailbox) -> Result<(), Error> {
        if self.connection.is_none() {
            return Ok(());
        }
        if let Err(e) = self.poll() {
            warn!("MQTT link lost: {}", e);
            self.drop_connection();
            return Err(e);
        }
        self.announce(mailbox);
        Ok(())
    }
}

fn transmit<W: Write>(w: &mut W, header: &[u8], body: &[u8]) -> Result<(), Error> {
    write_all(w, header)?;
    write_all(w, body)?;
    w.flush().map_err(|_| Error::WriteError)
}

fn discard<R: Read>(r: &mut R, mut left: usize) -> Result<(), Error> {
    let mut scratch = [0u8; 64];
    while left > 0 {
        let n = left.min(scratch.len());
        read_exact(r, &mut scratch[..n])?;
        left -= n;
    }
    Ok(())
}

/// Discard an oversized PUBLISH, returning the id to acknowledge if it was
/// sent at QoS 1.
fn skip_publish<R: Read>(r: &mut R, header: u8, remaining_len: usize) -> Result<Option<u16>, Error> {
    let qos = QoS::from_bits((header >> 1) & 0x03).ok_or(Error::ProtocolError)?;
    let mut len_buf = [0u8; 2];
    read_exact(r, &mut len_buf)?;
    let topic_len = u16::from_be_bytes(len_buf) as usize;
    let id_len = if qos == QoS::AtMostOnce { 0 } else { 2 };
    let left = remaining_len
        .checked_sub(2 + topic_len + id_len)
        .ok_or(Error::ProtocolError)?;
    discard(r, topic_len)?;

    let message_id = if qos == QoS::AtMostOnce {
        None
    } else {
        let mut id_buf = [0u8; 2];
        read_exact(r, &mut id_buf)?;
        Some(u16::from_be_bytes(id_buf))
    };
    discard(r, left)?;

    Ok(message_id.filter(|_| qos == QoS::AtLeastOnce))
}

fn push_str<const N: usize>(buf: &mut Vec<u8, N>, s: &[u8]) -> Result<(), Error> {
    buf.extend_from_slice(&(s.len() as u16).to_be_bytes())
        .map_err(|_| Error::Overflow)?;
    buf.extend_from_slice(s).map_err(|_| Error::Overflow)
}

fn encode_remaining_length(buf: &mut Vec<u8, 5>, mut len: usize) -> Result<(), Error> {
    loop {
        let mut byte = (len % 128) as u8;
        len /= 128;
        if len > 0 {
            byte |= 0x80;
        }
        buf.push(byte).map_err(|_| Error::ProtocolError)?;
        if len == 0 {
            break;
        }
    }
    Ok(())
}
