//! # iotconnect - IoTConnect device SDK
//!
//! Connects constrained, cellular-attached devices to the IoTConnect cloud.
//! The crate is `no_std`, allocation-free and written against small
//! capability traits so it can sit on top of whatever modem driver the board
//! provides.
//!
//! ## Layers
//!
//! - [`storage`]: the linked-record identity store kept in a secure-element
//!   slot, plus PEM rendering of the device certificate.
//! - [`network`]: byte-stream and AT-command traits, a bounded HTTP request
//!   helper and an MQTT session manager with a single-slot inbound mailbox.
//! - [`time`]: wall-clock time from an HTTP time service or the modem clock,
//!   cached against the uptime counter.
//! - [`iotconnect`]: discovery and identity resolution, cloud-to-device
//!   commands, telemetry and the [`iotconnect::Client`] that ties it together.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use iotconnect::iotconnect::{Client, ClientConfig, EventHandler};
//! use iotconnect::network::application::mqtt::{Mailbox, Session};
//! use iotconnect::storage::provision::RecordStore;
//!
//! static MAILBOX: Mailbox = Mailbox::new();
//!
//! let mut records = RecordStore::new(secure_element);
//! records.init()?;
//! let config = ClientConfig::from_record_store(&records)?;
//!
//! let session = Session::new(modem_mqtt, &MAILBOX, delay, rng);
//! let mut client = Client::new(config, modem_http, session);
//! client.init(&mut app)?;
//! loop {
//!     client.pump(&mut app)?;
//! }
//! ```
//!
//! ## Optional Features
//!
//! - `std`: link the standard library (default: disabled)
//! - `defmt`: emit log output through `defmt`

#![cfg_attr(not(any(test, feature = "std")), no_std)]
#![deny(missing_docs)]
#![warn(missing_debug_implementations)]

#[macro_use]
mod fmt;

/// Byte-stream, modem and application-layer protocol support.
pub mod network;

/// Secure-element identity records and device certificate helpers.
pub mod storage;

/// Wall-clock time sources.
pub mod time;

/// IoTConnect discovery, messaging and the device client.
pub mod iotconnect;
