//! # Application Layer Network Protocols
//!
//! The two protocols an IoTConnect device speaks over its modem link:
//!
//! - **[`http`]**: discovery, identity and time lookups. The resolver only
//!   needs [`http::HttpTransport`]; [`http::Client`] implements it over any
//!   socket [`Connect`](crate::network::Connect)or, and modem firmware with a
//!   built-in HTTP engine can implement it directly.
//! - **[`mqtt`]**: the telemetry and cloud-to-device session. Again a small
//!   capability trait, [`mqtt::MqttTransport`], sits between the
//!   [`mqtt::Session`] manager and either the bundled MQTT 3.1.1
//!   [`mqtt::Client`] or a modem's native MQTT stack.
//!
//! ## Design Principles
//!
//! - **Transport Agnostic**: the resolver and session are written against
//!   capability traits, never against a concrete modem.
//! - **No-std Compatible**: fixed-size `heapless` buffers, no allocator.
//! - **Bounded**: every receive path has a hard ceiling and reports
//!   [`Overflow`](crate::network::error::Error::Overflow) instead of truncating.

/// HTTP transport, socket client and bounded request helper.
pub mod http;

/// MQTT transport, socket client, receive mailbox and session manager.
pub mod mqtt;
