//! MQTT for the IoTConnect telemetry and cloud-to-device session.
//!
//! The session layer is written against [`MqttTransport`], the capability a
//! cellular modem's MQTT engine offers: begin a connection, subscribe,
//! publish, and hand over inbound messages that were announced by a receive
//! notification. [`Client`] implements the same capability in software over a
//! TLS socket for modems that only provide sockets.
//!
//! # Inbound flow
//!
//! ```text
//!  modem IRQ / Client::service ──notify──▶ Mailbox (1 slot) ──take──▶ Session::pump
//!                                                                        │
//!                                             MqttTransport::read_message ◀┘
//! ```
//!
//! The mailbox holds at most one announced message. A second announcement
//! before [`Session::pump`] drains the first is dropped and logged.

use crate::network::error::Error;

pub mod client;
pub mod mailbox;
pub mod session;

pub use client::Client;
pub use mailbox::{Mailbox, Notification};
pub use session::{
    ConnectionStatus, Message, MqttSessionConfig, RetryPolicy, Session, SessionEvents,
    SessionState,
};

/// Longest topic name carried through the mailbox.
pub const MAX_TOPIC_LEN: usize = 256;
/// Largest inbound message the session will buffer.
pub const MAX_MESSAGE_LEN: usize = 1024;

/// Quality of Service levels for MQTT messages.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum QoS {
    /// Fire and forget.
    AtMostOnce = 0,
    /// Acknowledged delivery, possibly duplicated.
    AtLeastOnce = 1,
    /// Assured single delivery.
    ExactlyOnce = 2,
}

impl QoS {
    pub(crate) fn from_bits(bits: u8) -> Option<Self> {
        match bits {
            0 => Some(QoS::AtMostOnce),
            1 => Some(QoS::AtLeastOnce),
            2 => Some(QoS::ExactlyOnce),
            _ => None,
        }
    }
}

/// Parameters of one connection attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectParams<'a> {
    pub host: &'a str,
    pub port: u16,
    pub tls: bool,
    pub client_id: &'a str,
    pub username: Option<&'a str>,
    pub password: &'a str,
    pub keep_alive_seconds: u16,
    pub clean_session: bool,
}

/// The MQTT capability consumed by [`Session`].
pub trait MqttTransport {
    /// Start connecting. Completion is observed through [`is_connected`](Self::is_connected).
    fn begin(&mut self, params: &ConnectParams<'_>) -> Result<(), Error>;

    fn is_connected(&self) -> bool;

    fn subscribe(&mut self, topic: &str, qos: QoS) -> Result<(), Error>;

    fn publish(&mut self, topic: &str, payload: &[u8], qos: QoS) -> Result<(), Error>;

    /// Copy the message announced by `notification` into `buf`.
    ///
    /// Fails with [`Error::Overflow`] if it does not fit; the message is
    /// discarded either way.
    fn read_message(&mut self, notification: &Notification, buf: &mut [u8])
    -> Result<usize, Error>;

    /// Close the session and release transport resources.
    fn end(&mut self);

    /// Drive the protocol from the main loop.
    ///
    /// Transports whose receive path runs in an interrupt leave this empty.
    /// An error means the link is gone.
    fn service(&mut self, _mailbox: &Mailbox) -> Result<(), Error> {
        Ok(())
    }
}

impl<T: MqttTransport + ?Sized> MqttTransport for &mut T {
    fn begin(&mut self, params: &ConnectParams<'_>) -> Result<(), Error> {
        (**self).begin(params)
    }

    fn is_connected(&self) -> bool {
        (**self).is_connected()
    }

    fn subscribe(&mut self, topic: &str, qos: QoS) -> Result<(), Error> {
        (**self).subscribe(topic, qos)
    }

    fn publish(&mut self, topic: &str, payload: &[u8], qos: QoS) -> Result<(), Error> {
        (**self).publish(topic, payload, qos)
    }

    fn read_message(
        &mut self,
        notification: &Notification,
        buf: &mut [u8],
    ) -> Result<usize, Error> {
        (**self).read_message(notification, buf)
    }

    fn end(&mut self) {
        (**self).end()
    }

    fn service(&mut self, mailbox: &Mailbox) -> Result<(), Error> {
        (**self).service(mailbox)
    }
}
