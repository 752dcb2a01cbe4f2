//! IoTConnect device client.
//!
//! [`Client`] ties the pieces together: it resolves the broker for the
//! configured identity over HTTPS, opens the MQTT session, and turns inbound
//! cloud-to-device traffic into [`EventHandler`] calls.
//!
//! ```ignore
//! static MAILBOX: Mailbox = Mailbox::new();
//!
//! let config = ClientConfig::from_record_store(&records)?;
//! let session = Session::new(modem_mqtt, &MAILBOX, delay, rng);
//! let mut client = Client::new(config, modem_http, session);
//! client.init(&mut app)?;
//! loop {
//!     client.pump(&mut app)?;
//! }
//! ```

#![allow(missing_docs)]

use crate::network::application::{
    http::HttpTransport,
    mqtt::{ConnectionStatus, Message, MqttTransport, Session, SessionEvents},
};
use embedded_hal::delay::DelayNs;
use heapless::String;
use rand_core::RngCore;

pub mod c2d;
pub mod config;
pub mod discovery;
pub mod error;
pub mod telemetry;

pub use c2d::{AckStatus, C2dEvent, Command, OtaUpdate};
pub use config::{ClientConfig, ConnectionType, Protocol};
pub use discovery::{ResolveState, Resolver, SyncResult};
pub use error::{Error, SyncStatus};
pub use telemetry::Telemetry;

/// Application callbacks. Every method has a default.
///
/// Commands and OTA requests go to their own methods and the returned status
/// is acknowledged to the cloud when the request carries an ack id. Anything
/// else arrives at [`on_message`](EventHandler::on_message).
pub trait EventHandler {
    fn on_status(&mut self, _status: ConnectionStatus) {}

    fn on_message(&mut self, _message: &Message<'_>) {}

    fn on_command(&mut self, _command: &Command) -> AckStatus {
        AckStatus::Failure("Not supported")
    }

    fn on_ota(&mut self, _update: &OtaUpdate) -> AckStatus {
        AckStatus::Failure("Not supported")
    }
}

impl EventHandler for () {}

struct PendingAck {
    id: String<{ c2d::MAX_ACK_ID_LEN }>,
    kind: u8,
    status: AckStatus,
}

/// Routes session events to an [`EventHandler`] and remembers the
/// acknowledgement owed for the last command.
struct Dispatcher<'h, E> {
    handler: &'h mut E,
    verbose: bool,
    ack: Option<PendingAck>,
}

impl<'h, E: EventHandler> Dispatcher<'h, E> {
    fn new(handler: &'h mut E, verbose: bool) -> Self {
        Self {
            handler,
            verbose,
            ack: None,
        }
    }
}

impl<E: EventHandler> SessionEvents for Dispatcher<'_, E> {
    fn on_status(&mut self, status: ConnectionStatus) {
        self.handler.on_status(status);
    }

    fn on_message(&mut self, message: &Message<'_>) {
        if self.verbose {
            info!(
                "<<< {}: {}",
                message.topic,
                crate::fmt::printable(message.payload)
            );
        }
        let event = message.text().map(C2dEvent::parse);
        let status = match &event {
            Some(Ok(C2dEvent::Command(command))) => {
                debug!("Command: {}", command.command.as_str());
                self.handler.on_command(command)
            }
            Some(Ok(C2dEvent::Ota(update))) => {
                info!("OTA request for version {}", update.version.as_str());
                self.handler.on_ota(update)
            }
            _ => {
                self.handler.on_message(message);
                return;
            }
        };
        if let Some(Ok(event)) = &event {
            self.ack = event.ack_target().and_then(|(id, kind)| {
                Some(PendingAck {
                    id: String::try_from(id).ok()?,
                    kind,
                    status,
                })
            });
        }
    }
}

/// An IoTConnect device connection.
pub struct Client<'m, H, T, D, R> {
    config: ClientConfig,
    http: H,
    session: Session<'m, T, D, R>,
}

impl<H, T, D, R> core::fmt::Debug for Client<'_, H, T, D, R> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Client")
            .field("config", &self.config)
            .field("session", &self.session)
            .finish()
    }
}

impl<'m, H, T, D, R> Client<'m, H, T, D, R>
where
    H: HttpTransport,
    T: MqttTransport,
    D: DelayNs,
    R: RngCore,
{
    pub fn new(config: ClientConfig, http: H, session: Session<'m, T, D, R>) -> Self {
        Self {
            config,
            http,
            session,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn session(&self) -> &Session<'m, T, D, R> {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session<'m, T, D, R> {
        &mut self.session
    }

    /// Resolve the broker and connect.
    ///
    /// Resolution is attempted once; MQTT connection is retried according to
    /// the session's [`RetryPolicy`](crate::network::application::mqtt::RetryPolicy).
    pub fn init<E: EventHandler>(&mut self, handler: &mut E) -> Result<(), Error> {
        self.config.validate()?;
        let resolved = Resolver::new(&self.config).resolve(&mut self.http)?;
        let mut dispatcher = Dispatcher::new(handler, self.config.verbose);
        self.session
            .connect(resolved.into_session_config(), &mut dispatcher)?;
        Ok(())
    }

    /// Service the connection once and dispatch at most one inbound message.
    ///
    /// Returns whether a message was delivered.
    pub fn pump<E: EventHandler>(&mut self, handler: &mut E) -> Result<bool, Error> {
        let mut dispatcher = Dispatcher::new(handler, self.config.verbose);
        let delivered = self.session.pump(&mut dispatcher)?;
        if let Some(ack) = dispatcher.ack.take() {
            self.acknowledge(&ack);
        }
        Ok(delivered)
    }

    fn acknowledge(&mut self, ack: &PendingAck) {
        let document = match c2d::ack_json(&ack.id, ack.kind, ack.status) {
            Ok(document) => document,
            Err(e) => {
                error!("Unable to build ack for {}: {}", ack.id.as_str(), e);
                return;
            }
        };
        if let Err(e) = self.send(&document) {
            warn!("Ack for {} not sent: {}", ack.id.as_str(), e);
        }
    }

    /// Publish a JSON document on the telemetry topic.
    pub fn send(&mut self, json: &str) -> Result<(), Error> {
        if self.config.verbose {
            info!(">>> {}", json);
        }
        self.session.publish(json.as_bytes())?;
        Ok(())
    }

    pub fn send_telemetry(&mut self, telemetry: &Telemetry) -> Result<(), Error> {
        let document = telemetry.render()?;
        self.send(&document)
    }

    pub fn is_connected(&self) -> bool {
        self.session.is_connected()
    }

    pub fn disconnect<E: EventHandler>(&mut self, handler: &mut E) {
        let mut dispatcher = Dispatcher::new(handler, self.config.verbose);
        self.session.disconnect(&mut dispatcher);
    }

    /// Drop the current session and run [`init`](Self::init) again.
    pub fn reconnect<E: EventHandler>(&mut self, handler: &mut E) -> Result<(), Error> {
        if self.session.is_connected() {
            self.disconnect(handler);
        }
        self.init(handler)
    }
}
