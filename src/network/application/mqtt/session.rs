//! MQTT session manager.
//!
//! Owns one broker session end to end: bounded connect retries with jittered
//! backoff, the connect wait loop, subscription to the inbound topic, publish,
//! and the [`pump`](Session::pump) loop that detects link loss and delivers at
//! most one inbound message per call.
//!
//! Timeouts are counted in fixed polling ticks rather than wall-clock time so
//! they work before the device has a valid clock.

use super::{ConnectParams, MAX_MESSAGE_LEN, Mailbox, MqttTransport, QoS};
use crate::network::error::Error;
use embedded_hal::delay::DelayNs;
use heapless::String;
use rand_core::RngCore;

/// Secure MQTT port.
pub const MQTT_SECURE_PORT: u16 = 8883;
/// Default keep-alive in seconds.
pub const DEFAULT_KEEP_ALIVE: u16 = 60;

pub const MAX_HOST_LEN: usize = 128;
pub const MAX_CLIENT_ID_LEN: usize = 128;
pub const MAX_USERNAME_LEN: usize = 192;
pub const MAX_PASSWORD_LEN: usize = 256;
pub const MAX_SESSION_TOPIC_LEN: usize = 256;

/// Connection status reported to [`SessionEvents::on_status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Connected,
    Disconnected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Connected,
    Disconnecting,
}

/// An inbound message handed to [`SessionEvents::on_message`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Message<'a> {
    pub topic: &'a str,
    pub payload: &'a [u8],
    pub message_id: Option<u16>,
}

impl Message<'_> {
    /// Payload as text, if it is UTF-8.
    pub fn text(&self) -> Option<&str> {
        core::str::from_utf8(self.payload).ok()
    }
}

/// Session callbacks. Both default to doing nothing.
pub trait SessionEvents {
    fn on_status(&mut self, _status: ConnectionStatus) {}
    fn on_message(&mut self, _message: &Message<'_>) {}
}

impl SessionEvents for () {}

/// Connect retry and wait budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Connection attempts before giving up.
    pub attempts: u8,
    /// Shortest delay between attempts.
    pub backoff_floor_ms: u32,
    /// Random extra delay is drawn from `[0, backoff_window_ms)`.
    pub backoff_window_ms: u32,
    /// Length of one connect wait tick.
    pub tick_ms: u32,
    /// Ticks to wait for the broker to accept a connection.
    pub connect_ticks: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            backoff_floor_ms: 1000,
            backoff_window_ms: 5000,
            tick_ms: 500,
            connect_ticks: 120,
        }
    }
}

/// Everything needed to open a session against a resolved broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MqttSessionConfig {
    pub host: String<MAX_HOST_LEN>,
    pub port: u16,
    pub tls: bool,
    pub client_id: String<MAX_CLIENT_ID_LEN>,
    pub username: Option<String<MAX_USERNAME_LEN>>,
    /// Empty when the secure element provides the client identity.
    pub password: String<MAX_PASSWORD_LEN>,
    pub keep_alive_seconds: u16,
    pub clean_session: bool,
    pub subscribe_topic: String<MAX_SESSION_TOPIC_LEN>,
    pub publish_topic: String<MAX_SESSION_TOPIC_LEN>,
}

impl Default for MqttSessionConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: MQTT_SECURE_PORT,
            tls: true,
            client_id: String::new(),
            username: None,
            password: String::new(),
            keep_alive_seconds: DEFAULT_KEEP_ALIVE,
            clean_session: true,
            subscribe_topic: String::new(),
            publish_topic: String::new(),
        }
    }
}

impl MqttSessionConfig {
    fn params(&self) -> ConnectParams<'_> {
        ConnectParams {
            host: &self.host,
            port: self.port,
            tls: self.tls,
            client_id: &self.client_id,
            username: self.username.as_deref(),
            password: &self.password,
            keep_alive_seconds: self.keep_alive_seconds,
            clean_session: self.clean_session,
        }
    }
}

pub struct Session<'m, T, D, R> {
    transport: T,
    mailbox: &'m Mailbox,
    delay: D,
    rng: R,
    policy: RetryPolicy,
    state: SessionState,
    config: Option<MqttSessionConfig>,
}

impl<T, D, R> core::fmt::Debug for Session<'_, T, D, R> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Session")
            .field("state", &self.state)
            .field("policy", &self.policy)
            .field("config", &self.config)
            .finish()
    }
}

impl<'m, T, D, R> Session<'m, T, D, R>
where
    T: MqttTransport,
    D: DelayNs,
    R: RngCore,
{
    pub fn new(transport: T, mailbox: &'m Mailbox, delay: D, rng: R) -> Self {
        Self {
            transport,
            mailbox,
            delay,
            rng,
            policy: RetryPolicy::default(),
            state: SessionState::Disconnected,
            config: None,
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn config(&self) -> Option<&MqttSessionConfig> {
        self.config.as_ref()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn is_connected(&self) -> bool {
        self.state == SessionState::Connected && self.transport.is_connected()
    }

    /// Open a session, replacing any previous configuration.
    ///
    /// Makes up to [`RetryPolicy::attempts`] attempts. `Connected` is reported
    /// only once the inbound topic is subscribed. After the last failed
    /// attempt the transport is ended and the last error returned.
    pub fn connect<E: SessionEvents>(
        &mut self,
        config: MqttSessionConfig,
        events: &mut E,
    ) -> Result<(), Error> {
        if self.state != SessionState::Disconnected {
            self.transport.end();
        }
        self.mailbox.clear();
        let config = self.config.insert(config);
        self.state = SessionState::Connecting;

        let mut last_error = Error::ConnectionRefused;
        for attempt in 1..=self.policy.attempts {
            if attempt > 1 {
                let backoff = backoff_ms(&self.policy, &mut self.rng);
                info!("Retrying MQTT connection in {} ms", backoff);
                self.delay.delay_ms(backoff);
            }

            info!(
                "Connecting to {} as {} (attempt {}/{})",
                config.host, config.client_id, attempt, self.policy.attempts
            );
            match attempt_connect(
                &mut self.transport,
                self.mailbox,
                &mut self.delay,
                &self.policy,
                config,
            ) {
                Ok(()) => {
                    self.state = SessionState::Connected;
                    info!("MQTT connected");
                    events.on_status(ConnectionStatus::Connected);
                    return Ok(());
                }
                Err(e) => {
                    warn!("MQTT connect attempt {} failed: {}", attempt, e);
                    self.transport.end();
                    last_error = e;
                }
            }
        }

        error!(
            "Failed to connect to MQTT using host: {}, client id: {}",
            config.host, config.client_id
        );
        self.state = SessionState::Disconnected;
        Err(last_error)
    }

    /// Publish to the session's publish topic.
    pub fn publish(&mut self, payload: &[u8]) -> Result<(), Error> {
        let config = self.config.as_ref().ok_or(Error::NotConnected)?;
        if !self.is_connected() {
            return Err(Error::NotConnected);
        }
        self.transport
            .publish(&config.publish_topic, payload, QoS::AtLeastOnce)
    }

    /// Publish to an explicit topic.
    pub fn publish_to(&mut self, topic: &str, payload: &[u8]) -> Result<(), Error> {
        if !self.is_connected() {
            return Err(Error::NotConnected);
        }
        self.transport.publish(topic, payload, QoS::AtLeastOnce)
    }

    /// Service the session once.
    ///
    /// Reports `Disconnected` the first time a dropped link is seen, then
    /// delivers at most one pending inbound message. The mailbox slot is freed
    /// before the callback runs. Returns whether a message was delivered.
    pub fn pump<E: SessionEvents>(&mut self, events: &mut E) -> Result<bool, Error> {
        if self.config.is_none() {
            error!("pump() called before the session was configured");
            return Err(Error::NotConnected);
        }

        if self.state == SessionState::Connected {
            if let Err(e) = self.transport.service(self.mailbox) {
                debug!("Transport service failed: {}", e);
            }
        }

        if !self.transport.is_connected() {
            if self.state == SessionState::Connected {
                warn!("MQTT connection lost");
                self.state = SessionState::Disconnected;
                events.on_status(ConnectionStatus::Disconnected);
            }
            return Ok(false);
        }

        let Some(notification) = self.mailbox.take() else {
            return Ok(false);
        };

        let mut buf = [0u8; MAX_MESSAGE_LEN];
        let len = match self.transport.read_message(&notification, &mut buf) {
            Ok(len) => len,
            Err(e) => {
                warn!(
                    "Dropping {} byte message on {}: {}",
                    notification.length, notification.topic, e
                );
                return Ok(false);
            }
        };

        debug!("Message on {} ({} bytes)", notification.topic, len);
        events.on_message(&Message {
            topic: &notification.topic,
            payload: &buf[..len],
            message_id: notification.message_id,
        });
        Ok(true)
    }

    /// Close the session and report `Disconnected`.
    pub fn disconnect<E: SessionEvents>(&mut self, events: &mut E) {
        info!("Closing the MQTT connection");
        self.state = SessionState::Disconnecting;
        self.transport.end();
        self.mailbox.clear();
        self.state = SessionState::Disconnected;
        events.on_status(ConnectionStatus::Disconnected);
    }
}

/// Random delay in `[floor, floor + window)`.
pub fn backoff_ms<R: RngCore>(policy: &RetryPolicy, rng: &mut R) -> u32 {
    let jitter = match policy.backoff_window_ms {
        0 => 0,
        window => rng.next_u32() % window,
    };
    policy.backoff_floor_ms.saturating_add(jitter)
}

fn attempt_connect<T: MqttTransport, D: DelayNs>(
    transport: &mut T,
    mailbox: &Mailbox,
    delay: &mut D,
    policy: &RetryPolicy,
    config: &MqttSessionConfig,
) -> Result<(), Error> {
    transport.begin(&config.params())?;

    let mut ticks = 0;
    loop {
        if transport.service(mailbox).is_err() {
            error!("Received a disconnect while connecting to {}", config.host);
            return Err(Error::ConnectionClosed);
        }
        if transport.is_connected() {
            break;
        }
        if ticks >= policy.connect_ticks {
            error!("Timed out while connecting to {}", config.host);
            return Err(Error::Timeout);
        }
        delay.delay_ms(policy.tick_ms);
        ticks += 1;
    }

    transport
        .subscribe(&config.subscribe_topic, QoS::AtLeastOnce)
        .inspect_err(|_| {
            error!(
                "Unable to subscribe for C2D messages on {}",
                config.subscribe_topic
            );
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_backoff_bounds() {
        let policy = RetryPolicy::default();
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..1000 {
            let d = backoff_ms(&policy, &mut rng);
            assert!((1000..6000).contains(&d));
        }
    }

    #[test]
    fn test_zero_window_is_floor() {
        let policy = RetryPolicy {
            backoff_window_ms: 0,
            ..RetryPolicy::default()
        };
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(backoff_ms(&policy, &mut rng), 1000);
    }
}
