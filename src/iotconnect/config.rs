//! Device identity and client options.

use super::Error;
use crate::storage::{
    Storage,
    provision::{CPID_CAPACITY, DUID_CAPACITY, ENV_CAPACITY, Platform, RecordStore, RecordType},
};
use heapless::String;

pub const MAX_CPID_LEN: usize = CPID_CAPACITY - 1;
pub const MAX_DUID_LEN: usize = DUID_CAPACITY - 1;
pub const MAX_ENV_LEN: usize = ENV_CAPACITY - 1;

const THING_NAME_PREFIX: &str = "avr-";
const THING_NAME_SUFFIX_LEN: usize = 20;

/// Cloud backend hosting the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConnectionType {
    Aws,
    Azure,
}

impl From<Platform> for ConnectionType {
    fn from(platform: Platform) -> Self {
        match platform {
            Platform::Aws => ConnectionType::Aws,
            Platform::Azure => ConnectionType::Azure,
        }
    }
}

impl From<ConnectionType> for Platform {
    fn from(ct: ConnectionType) -> Self {
        match ct {
            ConnectionType::Aws => Platform::Aws,
            ConnectionType::Azure => Platform::Azure,
        }
    }
}

/// Which service resolves the broker identity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Protocol {
    /// Discovery followed by an identity GET (protocol 2.1).
    #[default]
    Identity,
    /// Discovery followed by a sync POST (protocol 2.0).
    Sync,
}

/// Client configuration.
///
/// `cpid`, `env` and `duid` are required and a connection type must be chosen
/// before [`Client::init`](super::Client::init).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub cpid: String<MAX_CPID_LEN>,
    pub env: String<MAX_ENV_LEN>,
    pub duid: String<MAX_DUID_LEN>,
    pub connection_type: Option<ConnectionType>,
    pub protocol: Protocol,
    /// Log every inbound and outbound message.
    pub verbose: bool,
    /// Subscribe to the property-filtered cloud-to-device topic.
    pub filtered_c2d: bool,
}

impl ClientConfig {
    pub fn new(cpid: &str, env: &str, duid: &str) -> Result<Self, Error> {
        Ok(Self {
            cpid: String::try_from(cpid).map_err(|_| Error::ConfigInvalid)?,
            env: String::try_from(env).map_err(|_| Error::ConfigInvalid)?,
            duid: String::try_from(duid).map_err(|_| Error::ConfigInvalid)?,
            connection_type: None,
            protocol: Protocol::default(),
            verbose: false,
            filtered_c2d: false,
        })
    }

    pub fn with_connection_type(mut self, connection_type: ConnectionType) -> Self {
        self.connection_type = Some(connection_type);
        self
    }

    pub fn with_protocol(mut self, protocol: Protocol) -> Self {
        self.protocol = protocol;
        self
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn filtered_c2d(mut self, filtered: bool) -> Self {
        self.filtered_c2d = filtered;
        self
    }

    /// Check the required fields and return the connection type.
    pub fn validate(&self) -> Result<ConnectionType, Error> {
        if self.cpid.is_empty() || self.env.is_empty() || self.duid.is_empty() {
            error!("CPID, environment and DUID must all be set");
            return Err(Error::ConfigInvalid);
        }
        self.connection_type.ok_or_else(|| {
            error!("Connection type is not set");
            Error::BadConnectionType
        })
    }

    /// Build a configuration from the secure-element records.
    ///
    /// The store must already have been loaded with
    /// [`RecordStore::init`].
    pub fn from_record_store<S: Storage>(store: &RecordStore<S>) -> Result<Self, Error> {
        let cpid = store.get(RecordType::Cpid)?;
        let env = store.get(RecordType::Env)?;
        let duid = store.get(RecordType::Duid)?;
        let platform = store.platform()?;
        Ok(Self::new(cpid, env, duid)?.with_connection_type(platform.into()))
    }

    /// Write this identity into the record cache and persist it.
    pub fn provision<S: Storage>(&self, store: &mut RecordStore<S>) -> Result<(), Error> {
        let ct = self.validate()?;
        store.set(RecordType::Cpid, &self.cpid)?;
        store.set(RecordType::Env, &self.env)?;
        store.set(RecordType::Duid, &self.duid)?;
        store.set_platform(ct.into())?;
        store.commit()?;
        info!("Provisioned {} in {}", self.duid.as_str(), self.env.as_str());
        Ok(())
    }
}

/// Derive a DUID from an AWS thing name: `avr-` plus its last 20 characters.
pub fn duid_from_thing_name(thing_name: &str) -> Result<String<MAX_DUID_LEN>, Error> {
    if thing_name.len() < THING_NAME_SUFFIX_LEN || !thing_name.is_ascii() {
        return Err(Error::ConfigInvalid);
    }
    let mut duid = String::new();
    let suffix = &thing_name[thing_name.len() - THING_NAME_SUFFIX_LEN..];
    duid.push_str(THING_NAME_PREFIX).map_err(|_| Error::Allocation)?;
    duid.push_str(suffix).map_err(|_| Error::Allocation)?;
    Ok(duid)
}
