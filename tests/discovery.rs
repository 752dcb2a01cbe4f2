mod common;

use common::{Canned, DISCOVERY_RESPONSE, IDENTITY_RESPONSE, MockHttp};
use iotconnect::iotconnect::{
    ClientConfig, ConnectionType, Error, Protocol, ResolveState, Resolver, SyncStatus,
};
use iotconnect::network::application::http::Method;
use iotconnect::network::error::Error as NetworkError;

fn azure() -> ClientConfig {
    ClientConfig::new("ACME", "prod", "dev1")
        .unwrap()
        .with_connection_type(ConnectionType::Azure)
}

#[test]
fn test_identity_resolution_end_to_end() {
    let mut http = MockHttp::new()
        .respond(DISCOVERY_RESPONSE)
        .respond(IDENTITY_RESPONSE);
    let config = azure();
    let mut resolver = Resolver::new(&config);

    let result = resolver.resolve(&mut http).unwrap();
    assert_eq!(resolver.state(), ResolveState::Done);

    let session = result.into_session_config();
    assert_eq!(session.host.as_str(), "mqtt.acme.io");
    assert_eq!(session.client_id.as_str(), "ACME-dev1");
    assert_eq!(session.username.as_deref(), Some("user1"));
    assert_eq!(session.publish_topic.as_str(), "devices/ACME-dev1/messages/events/");
    assert_eq!(
        session.subscribe_topic.as_str(),
        "devices/ACME-dev1/messages/devicebound/#"
    );

    assert_eq!(http.requests.len(), 2);
    let discovery = &http.requests[0];
    assert_eq!(discovery.host, "discovery.iotconnect.io");
    assert_eq!(discovery.path, "/api/v2.1/dsdk/cpId/ACME/env/prod");
    assert_eq!(discovery.method, Method::Get);
    assert_eq!((discovery.port, discovery.tls), (443, true));

    let identity = &http.requests[1];
    assert_eq!(identity.host, "abc.cloud");
    assert_eq!(identity.path, "/xyz/uid/dev1");
    assert_eq!(identity.method, Method::Get);
    assert_eq!(identity.body, None);
}

#[test]
fn test_aws_uses_console_host_and_drops_username() {
    let mut http = MockHttp::new()
        .respond(r#"{"d":{"ec":0,"bu":"https://awsdiscovery.iotconnect.io/api/v2.1/dsdk","pf":"aws"},"status":200}"#)
        .respond(r#"{"d":{"ec":0,"ct":200,"p":{"n":"mqtt","h":"a1b2.iot.us-east-1.amazonaws.com","p":8883,"id":"dev1","un":"spurious","topics":{"rpt":"$aws/rules/msg_d2c_rpt/dev1/XG4E/2.1/0","c2d":"iot/dev1/cmd","ack":"$aws/rules/msg_d2c_ack/dev1/XG4E/2.1/6"}}},"status":200}"#);
    let config = ClientConfig::new("ACME", "prod", "dev1")
        .unwrap()
        .with_connection_type(ConnectionType::Aws);

    let result = Resolver::new(&config).resolve(&mut http).unwrap();
    assert_eq!(result.username, None);
    assert_eq!(result.host.as_str(), "a1b2.iot.us-east-1.amazonaws.com");
    assert_eq!(
        result.publish_topic.as_str(),
        "$aws/rules/msg_d2c_rpt/dev1/XG4E/2.1/0"
    );
    assert_eq!(result.subscribe_topic.as_str(), "iot/dev1/cmd");
    assert_eq!(http.requests[0].host, "discoveryconsole.iotconnect.io");
    assert_eq!(http.requests[1].host, "awsdiscovery.iotconnect.io");
    assert_eq!(http.requests[1].path, "/api/v2.1/dsdk/uid/dev1");
}

#[test]
fn test_aws_poc_environment_any_case() {
    for env in ["poc", "POC", "Poc"] {
        let mut http = MockHttp::new();
        let config = ClientConfig::new("ACME", env, "dev1")
            .unwrap()
            .with_connection_type(ConnectionType::Aws);
        let _ = Resolver::new(&config).resolve(&mut http);
        assert_eq!(http.requests[0].host, "awsdiscovery.iotconnect.io");
    }
}

#[test]
fn test_sync_resolution_posts_device() {
    let mut http = MockHttp::new()
        .respond(r#"{"baseUrl":"https://agent.iotconnect.io/api/2.0/agent/"}"#)
        .respond(r#"{"d":{"rc":0,"ee":0,"dtg":"grp","p":{"n":"mqtt","h":"hub.azure-devices.net","p":8883,"id":"ACME-dev1","un":"hub.azure-devices.net/ACME-dev1/?api-version=2018-06-30","pwd":"SharedAccessSignature sr=abc&sig=def","pub":"devices/ACME-dev1/messages/events/","sub":"devices/ACME-dev1/messages/devicebound/#"}}}"#);
    let config = azure().with_protocol(Protocol::Sync);

    let result = Resolver::new(&config).resolve(&mut http).unwrap();
    assert_eq!(result.host.as_str(), "hub.azure-devices.net");
    assert_eq!(result.password.as_str(), "SharedAccessSignature sr=abc&sig=def");
    assert_eq!(result.dtg.as_str(), "grp");
    assert_eq!(result.port, Some(8883));

    let discovery = &http.requests[0];
    assert_eq!(discovery.host, "discovery.iotconnect.io");
    assert_eq!(discovery.path, "/api/sdk/cpid/ACME/lang/M_C/ver/2.0/env/prod");

    let sync = &http.requests[1];
    assert_eq!(sync.method, Method::Post);
    assert_eq!(sync.host, "agent.iotconnect.io");
    assert_eq!(sync.path, "/api/2.0/agent/sync?");
    let body = sync.body.as_deref().unwrap();
    assert!(body.starts_with(r#"{"cpId":"ACME","uniqueId":"dev1","option":{"#));
    assert!(body.contains(r#""protocol":true"#));
}

#[test]
fn test_server_rejection_is_not_retried() {
    let mut http = MockHttp::new()
        .respond(DISCOVERY_RESPONSE)
        .respond(r#"{"d":{"ec":3}}"#)
        .respond(IDENTITY_RESPONSE);
    let config = azure();
    let mut resolver = Resolver::new(&config);

    let err = resolver.resolve(&mut http).unwrap_err();
    assert_eq!(err, Error::ServerRejected(SyncStatus::DeviceNotFound));
    assert_eq!(resolver.state(), ResolveState::Failed(err));
    assert_eq!(http.requests.len(), 2);
}

#[test]
fn test_http_failure_during_discovery() {
    let mut http = MockHttp::new();
    let config = azure();
    let mut resolver = Resolver::new(&config);

    assert_eq!(
        resolver.resolve(&mut http),
        Err(Error::Network(NetworkError::ConnectionRefused))
    );
    assert!(matches!(resolver.state(), ResolveState::Failed(_)));
}

#[test]
fn test_html_discovery_response_is_parsing_error() {
    let mut http = MockHttp::new().respond("<html>Service Unavailable</html>");
    let config = azure();
    assert_eq!(
        Resolver::new(&config).resolve(&mut http),
        Err(Error::Parsing)
    );
}

#[test]
fn test_identity_without_broker_host() {
    let mut http = MockHttp::new()
        .respond(DISCOVERY_RESPONSE)
        .respond(r#"{"d":{"broker":{"cN":"ACME-dev1"}}}"#);
    let config = azure();
    assert_eq!(
        Resolver::new(&config).resolve(&mut http),
        Err(Error::Parsing)
    );
}

#[test]
fn test_streamed_identity_response() {
    let mut http = MockHttp::new()
        .respond(DISCOVERY_RESPONSE)
        .respond_with(Canned {
            status: 200,
            body: IDENTITY_RESPONSE.as_bytes().to_vec(),
            framed: false,
            chunk: usize::MAX,
        });
    let config = azure();
    let result = Resolver::new(&config).resolve(&mut http).unwrap();
    assert_eq!(result.client_id.as_str(), "ACME-dev1");
}

#[test]
fn test_missing_connection_type_sends_nothing() {
    let mut http = MockHttp::new().respond(DISCOVERY_RESPONSE);
    let config = ClientConfig::new("ACME", "prod", "dev1").unwrap();
    assert_eq!(
        Resolver::new(&config).resolve(&mut http),
        Err(Error::BadConnectionType)
    );
    assert!(http.requests.is_empty());
}
