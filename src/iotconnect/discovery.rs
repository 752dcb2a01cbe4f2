//! Discovery and identity resolution.
//!
//! Resolution runs in two HTTPS round trips. The first asks a discovery
//! service where the device's environment lives; the second asks that
//! service for the broker parameters of this particular device. Two protocol
//! generations are supported as alternate branches of the same sequence:
//!
//! * [`Protocol::Identity`]: platform-specific discovery, then a GET on the
//!   returned identity URL.
//! * [`Protocol::Sync`]: common discovery, then a POST of the CPID and DUID to
//!   the returned sync service.
//!
//! Nothing is retried here. A failed resolution leaves the resolver in
//! [`ResolveState::Failed`] and the caller decides when to try again.

use super::{
    Error, SyncStatus,
    config::{ClientConfig, ConnectionType, Protocol},
};
use crate::network::application::{
    http::{HttpTransport, request},
    mqtt::{
        MqttSessionConfig,
        session::{
            MAX_CLIENT_ID_LEN, MAX_HOST_LEN, MAX_PASSWORD_LEN, MAX_SESSION_TOPIC_LEN,
            MAX_USERNAME_LEN,
        },
    },
};
use core::fmt::Write as _;
use heapless::String;
use serde::{Deserialize, Serialize, de::DeserializeOwned};

pub const AWS_DISCOVERY_HOST: &str = "discoveryconsole.iotconnect.io";
pub const AWS_POC_DISCOVERY_HOST: &str = "awsdiscovery.iotconnect.io";
pub const AZURE_DISCOVERY_HOST: &str = "discovery.iotconnect.io";
pub const SYNC_DISCOVERY_HOST: &str = "discovery.iotconnect.io";

/// Environment served by the proof-of-concept AWS discovery host.
const POC_ENV: &str = "poc";

pub const MAX_URL_HOST_LEN: usize = 128;
pub const MAX_URL_PATH_LEN: usize = 256;
pub const MAX_DTG_LEN: usize = 64;

const SYNC_BODY_LEN: usize = 256;
/// Scratch space for unescaping JSON strings.
const ESCAPE_BUFFER_LEN: usize = 512;

/// Where the resolver is in the current resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ResolveState {
    BuildDiscoveryUrl,
    HttpDiscovery,
    ParseDiscovery,
    BuildIdentityUrl,
    HttpIdentity,
    ParseIdentity,
    Done,
    Failed(Error),
}

/// A host and absolute path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Url {
    pub host: String<MAX_URL_HOST_LEN>,
    pub path: String<MAX_URL_PATH_LEN>,
}

impl Url {
    /// Split `[scheme://]host[/path]`.
    pub fn parse(url: &str) -> Result<Self, Error> {
        let rest = url
            .strip_prefix("https://")
            .or_else(|| url.strip_prefix("http://"))
            .unwrap_or(url);
        let (host, path) = match rest.find('/') {
            Some(i) => rest.split_at(i),
            None => (rest, ""),
        };
        if host.is_empty() {
            return Err(Error::Parsing);
        }
        Ok(Self {
            host: String::try_from(host).map_err(|_| Error::Allocation)?,
            path: String::try_from(path).map_err(|_| Error::Allocation)?,
        })
    }

    fn push(&mut self, segment: &str) -> Result<(), Error> {
        self.path.push_str(segment).map_err(|_| Error::Allocation)
    }
}

/// Broker parameters returned by the identity or sync service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncResult {
    pub host: String<MAX_HOST_LEN>,
    /// Broker port, when the service names one.
    pub port: Option<u16>,
    pub client_id: String<MAX_CLIENT_ID_LEN>,
    pub username: Option<String<MAX_USERNAME_LEN>>,
    pub password: String<MAX_PASSWORD_LEN>,
    pub publish_topic: String<MAX_SESSION_TOPIC_LEN>,
    pub subscribe_topic: String<MAX_SESSION_TOPIC_LEN>,
    /// Device template group.
    pub dtg: String<MAX_DTG_LEN>,
}

impl SyncResult {
    /// Session parameters for this broker, with secure defaults for anything
    /// the service did not specify.
    pub fn into_session_config(self) -> MqttSessionConfig {
        let mut config = MqttSessionConfig {
            host: self.host,
            client_id: self.client_id,
            username: self.username,
            password: self.password,
            subscribe_topic: self.subscribe_topic,
            publish_topic: self.publish_topic,
            ..MqttSessionConfig::default()
        };
        if let Some(port) = self.port {
            config.port = port;
        }
        config
    }
}

/// Drives one resolution for a client configuration.
#[derive(Debug)]
pub struct Resolver<'c> {
    config: &'c ClientConfig,
    state: ResolveState,
}

impl<'c> Resolver<'c> {
    pub fn new(config: &'c ClientConfig) -> Self {
        Self {
            config,
            state: ResolveState::BuildDiscoveryUrl,
        }
    }

    pub fn state(&self) -> ResolveState {
        self.state
    }

    /// Run discovery and identity against `transport`.
    pub fn resolve<T: HttpTransport>(&mut self, transport: &mut T) -> Result<SyncResult, Error> {
        let result = self.run(transport);
        self.state = match &result {
            Ok(_) => ResolveState::Done,
            Err(e) => {
                error!("Resolution failed in {:?}: {}", self.state, e);
                ResolveState::Failed(*e)
            }
        };
        result
    }

    fn run<T: HttpTransport>(&mut self, transport: &mut T) -> Result<SyncResult, Error> {
        let config = self.config;
        self.state = ResolveState::BuildDiscoveryUrl;
        let connection_type = config.validate()?;
        let discovery = discovery_url(config, connection_type)?;
        debug!("Discovery: https://{}{}", discovery.host.as_str(), discovery.path.as_str());

        self.state = ResolveState::HttpDiscovery;
        let response = request(transport, &discovery.host, &discovery.path, None)?;

        self.state = ResolveState::ParseDiscovery;
        let mut target = parse_discovery(response.as_str()?)?;
        drop(response);

        self.state = ResolveState::BuildIdentityUrl;
        let body: Option<String<SYNC_BODY_LEN>> = match config.protocol {
            Protocol::Identity => {
                target.push("/uid/")?;
                target.push(&config.duid)?;
                None
            }
            Protocol::Sync => {
                if !target.path.ends_with('/') {
                    target.push("/")?;
                }
                target.push("sync?")?;
                Some(sync_body(config)?)
            }
        };
        debug!("Identity: https://{}{}", target.host.as_str(), target.path.as_str());

        self.state = ResolveState::HttpIdentity;
        let body = body.as_ref().map(|b| b.as_bytes());
        let response = request(transport, &target.host, &target.path, body)?;

        self.state = ResolveState::ParseIdentity;
        let result = match config.protocol {
            Protocol::Identity => parse_identity(response.as_str()?, config, connection_type),
            Protocol::Sync => parse_sync(response.as_str()?, config, connection_type),
        }?;
        info!(
            "Resolved broker {} for client {}",
            result.host.as_str(),
            result.client_id.as_str()
        );
        Ok(result)
    }
}

/// Discovery host for a connection type and environment.
pub fn discovery_host(connection_type: ConnectionType, env: &str) -> &'static str {
    match connection_type {
        ConnectionType::Aws if env.eq_ignore_ascii_case(POC_ENV) => AWS_POC_DISCOVERY_HOST,
        ConnectionType::Aws => AWS_DISCOVERY_HOST,
        ConnectionType::Azure => AZURE_DISCOVERY_HOST,
    }
}

/// First request of a resolution.
pub fn discovery_url(config: &ClientConfig, connection_type: ConnectionType) -> Result<Url, Error> {
    let (host, path) = match config.protocol {
        Protocol::Identity => (
            discovery_host(connection_type, &config.env),
            format_path(format_args!(
                "/api/v2.1/dsdk/cpId/{}/env/{}",
                config.cpid, config.env
            ))?,
        ),
        Protocol::Sync => (
            SYNC_DISCOVERY_HOST,
            format_path(format_args!(
                "/api/sdk/cpid/{}/lang/M_C/ver/2.0/env/{}",
                config.cpid, config.env
            ))?,
        ),
    };
    Ok(Url {
        host: String::try_from(host).map_err(|_| Error::Allocation)?,
        path,
    })
}

fn format_path(args: core::fmt::Arguments<'_>) -> Result<String<MAX_URL_PATH_LEN>, Error> {
    let mut path = String::new();
    path.write_fmt(args).map_err(|_| Error::Allocation)?;
    Ok(path)
}

#[derive(Deserialize)]
struct DiscoveryResponse {
    d: Option<DiscoveryData>,
    #[serde(rename = "baseUrl")]
    base_url: Option<String<MAX_URL_PATH_LEN>>,
}

#[derive(Deserialize)]
struct DiscoveryData {
    ec: Option<u8>,
    bu: Option<String<MAX_URL_PATH_LEN>>,
    ep: Option<String<MAX_URL_PATH_LEN>>,
}

/// Extract the identity or sync service URL from a discovery response.
pub fn parse_discovery(body: &str) -> Result<Url, Error> {
    let response: DiscoveryResponse = from_json(body)?;
    let (base, endpoint) = match response.d {
        Some(d) => {
            if let Some(status) = d.ec.and_then(SyncStatus::from_code) {
                error!("Discovery rejected: {}", status);
                return Err(Error::ServerRejected(status));
            }
            (d.bu.or(response.base_url), d.ep)
        }
        None => (response.base_url, None),
    };
    let Some(base) = base else {
        error!("Discovery response has no base URL");
        return Err(Error::Parsing);
    };
    let mut url = Url::parse(&base)?;
    if let Some(endpoint) = endpoint {
        url.push(&endpoint)?;
    }
    Ok(url)
}

#[derive(Deserialize)]
struct IdentityResponse {
    d: Option<IdentityData>,
}

#[derive(Deserialize)]
struct IdentityData {
    ec: Option<u8>,
    rc: Option<u8>,
    dtg: Option<String<MAX_DTG_LEN>>,
    #[serde(alias = "p")]
    broker: Option<BrokerData>,
}

#[derive(Deserialize)]
struct BrokerData {
    h: Option<String<MAX_HOST_LEN>>,
    #[serde(rename = "cN", alias = "id")]
    client_id: Option<String<MAX_CLIENT_ID_LEN>>,
    un: Option<String<MAX_USERNAME_LEN>>,
    pwd: Option<String<MAX_PASSWORD_LEN>>,
    p: Option<u16>,
    #[serde(rename = "pub")]
    publish: Option<String<MAX_SESSION_TOPIC_LEN>>,
    sub: Option<String<MAX_SESSION_TOPIC_LEN>>,
    topics: Option<BrokerTopics>,
}

#[derive(Deserialize)]
struct BrokerTopics {
    rpt: Option<String<MAX_SESSION_TOPIC_LEN>>,
    c2d: Option<String<MAX_SESSION_TOPIC_LEN>>,
}

/// Broker parameters from an identity response.
///
/// Topics come from `topics.rpt`/`topics.c2d`, then the older `pub`/`sub`
/// fields, then the Azure templates.
pub fn parse_identity(
    body: &str,
    config: &ClientConfig,
    connection_type: ConnectionType,
) -> Result<SyncResult, Error> {
    let response: IdentityResponse = from_json(body)?;
    let Some(data) = response.d else {
        error!("Identity response has no data object");
        return Err(Error::Parsing);
    };
    let code = data.ec.or(data.rc).unwrap_or(0);
    if let Some(status) = SyncStatus::from_code(code) {
        error!("Identity rejected: {}", status);
        return Err(Error::ServerRejected(status));
    }
    let Some(broker) = data.broker else {
        error!("Identity response has no broker");
        return Err(Error::Parsing);
    };
    let (Some(host), Some(client_id)) = (broker.h, broker.client_id) else {
        error!("Broker host or client id missing");
        return Err(Error::Parsing);
    };
    if host.is_empty() || client_id.is_empty() {
        return Err(Error::Parsing);
    }

    let username = match connection_type {
        ConnectionType::Aws => {
            if broker.un.is_some() {
                debug!("Ignoring username supplied for AWS");
            }
            None
        }
        ConnectionType::Azure => broker.un,
    };
    let (rpt, c2d) = match broker.topics {
        Some(topics) => (topics.rpt, topics.c2d),
        None => (None, None),
    };
    let publish_topic = match rpt.or(broker.publish) {
        Some(topic) => topic,
        None => default_topic(connection_type, || publish_topic(&client_id))?,
    };
    let subscribe_topic = match c2d.or(broker.sub) {
        Some(topic) => topic,
        None => default_topic(connection_type, || {
            subscribe_topic(&client_id, config.filtered_c2d)
        })?,
    };

    Ok(SyncResult {
        host,
        port: broker.p,
        client_id,
        username,
        password: broker.pwd.unwrap_or_default(),
        publish_topic,
        subscribe_topic,
        dtg: data.dtg.unwrap_or_default(),
    })
}

/// Broker parameters from a sync response.
///
/// The sync service answers with the same broker object as the identity
/// service, keyed under `p` and with its status in `rc`.
pub fn parse_sync(
    body: &str,
    config: &ClientConfig,
    connection_type: ConnectionType,
) -> Result<SyncResult, Error> {
    parse_identity(body, config, connection_type)
}

/// Topic template for a platform when the service names none.
///
/// Only the Azure hub has fixed per-device topics; an AWS identity must
/// carry its topics.
fn default_topic<F>(
    connection_type: ConnectionType,
    template: F,
) -> Result<String<MAX_SESSION_TOPIC_LEN>, Error>
where
    F: FnOnce() -> Result<String<MAX_SESSION_TOPIC_LEN>, Error>,
{
    match connection_type {
        ConnectionType::Azure => template(),
        ConnectionType::Aws => {
            error!("AWS identity response has no topics");
            Err(Error::Parsing)
        }
    }
}

/// `devices/<client_id>/messages/events/`
pub fn publish_topic(client_id: &str) -> Result<String<MAX_SESSION_TOPIC_LEN>, Error> {
    let mut topic = String::new();
    write!(topic, "devices/{}/messages/events/", client_id).map_err(|_| Error::Allocation)?;
    Ok(topic)
}

/// `devices/<client_id>/messages/devicebound/#`, or the variant filtered on
/// the `$.to` property.
pub fn subscribe_topic(
    client_id: &str,
    filtered: bool,
) -> Result<String<MAX_SESSION_TOPIC_LEN>, Error> {
    let mut topic = String::new();
    if filtered {
        write!(
            topic,
            "devices/{0}/messages/devicebound/%24.to=%2Fdevices%2F{0}%2Fmessages%2FdeviceBound/#",
            client_id
        )
    } else {
        write!(topic, "devices/{}/messages/devicebound/#", client_id)
    }
    .map_err(|_| Error::Allocation)?;
    Ok(topic)
}

#[derive(Serialize)]
struct SyncRequest<'a> {
    #[serde(rename = "cpId")]
    cpid: &'a str,
    #[serde(rename = "uniqueId")]
    unique_id: &'a str,
    option: SyncOptions,
}

#[derive(Serialize)]
struct SyncOptions {
    attribute: bool,
    setting: bool,
    protocol: bool,
    device: bool,
    #[serde(rename = "sdkConfig")]
    sdk_config: bool,
    rule: bool,
}

fn sync_body(config: &ClientConfig) -> Result<String<SYNC_BODY_LEN>, Error> {
    let request = SyncRequest {
        cpid: &config.cpid,
        unique_id: &config.duid,
        option: SyncOptions {
            attribute: false,
            setting: false,
            protocol: true,
            device: false,
            sdk_config: false,
            rule: false,
        },
    };
    serde_json_core::to_string(&request).map_err(|_| Error::Allocation)
}

pub(crate) fn from_json<T: DeserializeOwned>(body: &str) -> Result<T, Error> {
    let mut scratch = [0u8; ESCAPE_BUFFER_LEN];
    match serde_json_core::from_str_escaped::<T>(body, &mut scratch) {
        Ok((value, _)) => Ok(value),
        Err(_e) => {
            error!("Unparseable response: {}", body);
            Err(Error::Parsing)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn azure() -> ClientConfig {
        ClientConfig::new("ACME", "prod", "dev1")
            .unwrap()
            .with_connection_type(ConnectionType::Azure)
    }

    #[test]
    fn url_parse_variants() {
        let url = Url::parse("https://abc.cloud/api/v2.1/dsdk").unwrap();
        assert_eq!(url.host.as_str(), "abc.cloud");
        assert_eq!(url.path.as_str(), "/api/v2.1/dsdk");

        let url = Url::parse("abc.cloud").unwrap();
        assert_eq!(url.host.as_str(), "abc.cloud");
        assert_eq!(url.path.as_str(), "");

        assert_eq!(Url::parse("https:///x"), Err(Error::Parsing));
    }

    #[test]
    fn poc_environment_matches_any_case() {
        assert_eq!(discovery_host(ConnectionType::Aws, "POC"), AWS_POC_DISCOVERY_HOST);
        assert_eq!(discovery_host(ConnectionType::Aws, "poc"), AWS_POC_DISCOVERY_HOST);
        assert_eq!(discovery_host(ConnectionType::Aws, "Prod"), AWS_DISCOVERY_HOST);
        assert_eq!(discovery_host(ConnectionType::Azure, "POC"), AZURE_DISCOVERY_HOST);
    }

    #[test]
    fn discovery_paths() {
        let config = azure();
        let url = discovery_url(&config, ConnectionType::Azure).unwrap();
        assert_eq!(url.path.as_str(), "/api/v2.1/dsdk/cpId/ACME/env/prod");

        let config = config.with_protocol(Protocol::Sync);
        let url = discovery_url(&config, ConnectionType::Azure).unwrap();
        assert_eq!(url.host.as_str(), SYNC_DISCOVERY_HOST);
        assert_eq!(url.path.as_str(), "/api/sdk/cpid/ACME/lang/M_C/ver/2.0/env/prod");
    }

    #[test]
    fn discovery_joins_base_and_endpoint() {
        let url = parse_discovery(r#"{"d":{"bu":"abc.cloud","ep":"/xyz"}}"#).unwrap();
        assert_eq!(url.host.as_str(), "abc.cloud");
        assert_eq!(url.path.as_str(), "/xyz");

        let url = parse_discovery(
            r#"{"d":{"ec":0,"bu":"https://awsdiscovery.iotconnect.io/api/v2.1/dsdk","pf":"aws"},"status":200}"#,
        )
        .unwrap();
        assert_eq!(url.host.as_str(), "awsdiscovery.iotconnect.io");
        assert_eq!(url.path.as_str(), "/api/v2.1/dsdk");
    }

    #[test]
    fn discovery_base_url_form() {
        let url = parse_discovery(r#"{"baseUrl":"https://sync.example.net/api/2.0/agent/"}"#)
            .unwrap();
        assert_eq!(url.host.as_str(), "sync.example.net");
        assert_eq!(url.path.as_str(), "/api/2.0/agent/");
    }

    #[test]
    fn discovery_errors() {
        assert_eq!(parse_discovery(r#"{"d":{}}"#), Err(Error::Parsing));
        assert_eq!(parse_discovery("not json"), Err(Error::Parsing));
        assert_eq!(
            parse_discovery(r#"{"d":{"ec":6}}"#),
            Err(Error::ServerRejected(SyncStatus::CpidNotFound))
        );
    }

    #[test]
    fn identity_defaults_topics() {
        let config = azure();
        let body = r#"{"d":{"ct":1,"cpId":"ACME","dtg":"tmpl1","broker":{"h":"mqtt.acme.io","cN":"ACME-dev1","un":"user1"}}}"#;
        let result = parse_identity(body, &config, ConnectionType::Azure).unwrap();
        assert_eq!(result.host.as_str(), "mqtt.acme.io");
        assert_eq!(result.client_id.as_str(), "ACME-dev1");
        assert_eq!(result.username.as_deref(), Some("user1"));
        assert_eq!(result.publish_topic.as_str(), "devices/ACME-dev1/messages/events/");
        assert_eq!(result.subscribe_topic.as_str(), "devices/ACME-dev1/messages/devicebound/#");
        assert_eq!(result.dtg.as_str(), "tmpl1");
        assert_eq!(result.port, None);
    }

    #[test]
    fn identity_filtered_subscription() {
        let config = azure().filtered_c2d(true);
        let body = r#"{"d":{"p":{"h":"h.io","id":"cid"}}}"#;
        let result = parse_identity(body, &config, ConnectionType::Azure).unwrap();
        assert_eq!(
            result.subscribe_topic.as_str(),
            "devices/cid/messages/devicebound/%24.to=%2Fdevices%2Fcid%2Fmessages%2FdeviceBound/#"
        );
    }

    #[test]
    fn identity_broker_topics_win() {
        let body = r#"{"d":{"ec":0,"p":{"h":"h.io","id":"cid","p":8883,"pub":"up/cid","sub":"down/cid"}}}"#;
        let result = parse_identity(body, &azure(), ConnectionType::Azure).unwrap();
        assert_eq!(result.publish_topic.as_str(), "up/cid");
        assert_eq!(result.subscribe_topic.as_str(), "down/cid");
        assert_eq!(result.port, Some(8883));
    }

    #[test]
    fn aws_username_is_dropped() {
        let body = r#"{"d":{"broker":{"h":"h.io","cN":"cid","un":"bogus","topics":{"rpt":"r/cid","c2d":"iot/cid/cmd"}}}}"#;
        let result = parse_identity(body, &azure(), ConnectionType::Aws).unwrap();
        assert_eq!(result.username, None);
    }

    #[test]
    fn server_topics_win_on_azure() {
        let body = r#"{"d":{"p":{"h":"h.io","id":"cid","pub":"legacy/up","topics":{"rpt":"a/b","c2d":"c/d"}}}}"#;
        let result = parse_identity(body, &azure(), ConnectionType::Azure).unwrap();
        assert_eq!(result.publish_topic.as_str(), "a/b");
        assert_eq!(result.subscribe_topic.as_str(), "c/d");
    }

    #[test]
    fn azure_fills_missing_topic_from_template() {
        let body = r#"{"d":{"p":{"h":"h.io","id":"cid","topics":{"rpt":"a/b"}}}}"#;
        let result = parse_identity(body, &azure(), ConnectionType::Azure).unwrap();
        assert_eq!(result.publish_topic.as_str(), "a/b");
        assert_eq!(result.subscribe_topic.as_str(), "devices/cid/messages/devicebound/#");
    }

    #[test]
    fn aws_uses_server_topics() {
        let body = r#"{"d":{"ec":0,"ct":200,"p":{"n":"mqtt","h":"a1-ats.iot.us-east-1.amazonaws.com","p":8883,"id":"dev1","topics":{"rpt":"$aws/rules/msg_d2c_rpt/dev1/cd/2.1/0","c2d":"iot/dev1/cmd"}}}}"#;
        let result = parse_identity(body, &azure(), ConnectionType::Aws).unwrap();
        assert_eq!(result.publish_topic.as_str(), "$aws/rules/msg_d2c_rpt/dev1/cd/2.1/0");
        assert_eq!(result.subscribe_topic.as_str(), "iot/dev1/cmd");
    }

    #[test]
    fn aws_without_topics_is_rejected() {
        let body = r#"{"d":{"p":{"h":"h.io","id":"dev1"}}}"#;
        assert_eq!(
            parse_identity(body, &azure(), ConnectionType::Aws),
            Err(Error::Parsing)
        );
        let body = r#"{"d":{"p":{"h":"h.io","id":"dev1","topics":{"rpt":"r"}}}}"#;
        assert_eq!(
            parse_identity(body, &azure(), ConnectionType::Aws),
            Err(Error::Parsing)
        );
    }

    #[test]
    fn identity_status_codes() {
        let config = azure();
        for (code, status) in [
            (1, SyncStatus::DeviceNotRegistered),
            (2, SyncStatus::AutoRegister),
            (3, SyncStatus::DeviceNotFound),
            (4, SyncStatus::DeviceInactive),
            (5, SyncStatus::DeviceMoved),
            (6, SyncStatus::CpidNotFound),
            (9, SyncStatus::Unknown(9)),
        ] {
            let body = std::format!(r#"{{"d":{{"rc":{}}}}}"#, code);
            assert_eq!(
                parse_sync(&body, &config, ConnectionType::Azure),
                Err(Error::ServerRejected(status))
            );
        }
    }

    #[test]
    fn identity_missing_client_id() {
        let body = r#"{"d":{"broker":{"h":"h.io"}}}"#;
        assert_eq!(
            parse_identity(body, &azure(), ConnectionType::Azure),
            Err(Error::Parsing)
        );
    }

    #[test]
    fn sync_request_body() {
        let body = sync_body(&azure()).unwrap();
        assert_eq!(
            body.as_str(),
            r#"{"cpId":"ACME","uniqueId":"dev1","option":{"attribute":false,"setting":false,"protocol":true,"device":false,"sdkConfig":false,"rule":false}}"#
        );
    }

    #[test]
    fn session_config_keeps_secure_defaults() {
        let body = r#"{"d":{"broker":{"h":"mqtt.acme.io","cN":"ACME-dev1"}}}"#;
        let config = parse_identity(body, &azure(), ConnectionType::Azure)
            .unwrap()
            .into_session_config();
        assert_eq!(config.port, 8883);
        assert!(config.tls);
        assert!(config.password.is_empty());
    }
}
