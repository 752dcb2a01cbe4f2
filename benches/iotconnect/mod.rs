use criterion::{Criterion, Throughput};
use iotconnect::iotconnect::discovery::parse_identity;
use iotconnect::iotconnect::{ClientConfig, ConnectionType, Telemetry};
use std::hint::black_box;

const IDENTITY: &str = r#"{"d":{"ec":0,"ct":200,"meta":{"at":1,"df":60,"cd":"XG4EoAEAAAAAAAAAAAAA","v":2.1},"has":{"d":0,"attr":1,"set":0,"r":0,"ota":0},"p":{"n":"mqtt","h":"a1b2c3-ats.iot.us-east-1.amazonaws.com","p":8883,"id":"ACME-dev1","un":"ignored","topics":{"rpt":"$aws/rules/msg_d2c_rpt/ACME-dev1/XG4EoAEAAAAAAAAAAAAA/2.1/0","c2d":"iot/ACME-dev1/cmd"}}},"status":200,"message":"Device info loaded successfully."}"#;

pub fn bench_parse_identity(c: &mut Criterion) {
    let config = ClientConfig::new("ACME", "prod", "dev1")
        .unwrap()
        .with_connection_type(ConnectionType::Aws);
    let mut group = c.benchmark_group("discovery");
    group.throughput(Throughput::Bytes(IDENTITY.len() as u64));
    group.bench_function("parse_identity", |b| {
        b.iter(|| parse_identity(black_box(IDENTITY), &config, ConnectionType::Aws).unwrap())
    });
    group.finish();
}

pub fn bench_telemetry_render(c: &mut Criterion) {
    c.bench_function("telemetry_render", |b| {
        b.iter(|| {
            let mut telemetry = Telemetry::new();
            telemetry
                .add_float("temperature", black_box(21.5))
                .unwrap()
                .add_int("rssi", black_box(-71))
                .unwrap()
                .add_str("fw", "1.0.3")
                .unwrap();
            telemetry.render().unwrap()
        })
    });
}
