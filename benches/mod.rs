use criterion::{criterion_group, criterion_main};

mod iotconnect;
mod storage;

criterion_group!(
    benches,
    storage::bench_init_provisioned,
    storage::bench_set_and_commit,
    iotconnect::bench_parse_identity,
    iotconnect::bench_telemetry_render
);
criterion_main!(benches);
