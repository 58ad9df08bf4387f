use criterion::{black_box, criterion_group, criterion_main, Criterion};
use ivmon_core::{AlarmArbitrator, AlarmInputs};

fn bench_arbitrate(c: &mut Criterion) {
    let inputs = AlarmInputs {
        sensor_fault: false,
        bubble_active: false,
        ms_since_last_drop: 12_000,
        no_flow_timeout_ms: 30_000,
        remaining_ml: 250.0,
        low_volume_ml: 200.0,
        percent: 62.5,
        elapsed_ms: 1_800_000,
        duration_ms: 3_600_000,
    };
    c.bench_function("arbitrate_quiet_cycle", |b| {
        let mut arbitrator = AlarmArbitrator::new();
        b.iter(|| arbitrator.evaluate(black_box(&inputs)));
    });
}

criterion_group!(benches, bench_arbitrate);
criterion_main!(benches);
