use criterion::{criterion_group, criterion_main, Criterion};
use mlchf_lib::{run_sweep, ChfModels, PhysicalConditions, TemperatureSweep};
use once_cell::sync::Lazy;
use std::hint::black_box;
use std::path::PathBuf;

fn models_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../docs/fixtures/models")
}

static MODELS: Lazy<ChfModels> = Lazy::new(|| {
    let dir = models_dir();
    ChfModels::load(
        &dir.join("CF_Z_0/trained_model.txt"),
        &dir.join("HF_Z_0/trained_model.txt"),
    )
    .expect("fixture models load")
});

fn benchmark_predict(c: &mut Criterion) {
    let models = &*MODELS;
    let conditions = PhysicalConditions::default();

    c.bench_function("chf_single_point", |b| {
        b.iter(|| {
            let rates = models.evaluate(black_box(&conditions)).expect("valid point");
            black_box((rates.cooling, rates.heating))
        });
    });

    c.bench_function("chf_default_sweep", |b| {
        let sweep = TemperatureSweep::default();
        b.iter(|| {
            let rows = run_sweep(models, &conditions, &sweep).expect("sweep succeeds");
            black_box(rows.len())
        });
    });
}

criterion_group!(benches, benchmark_predict);
criterion_main!(benches);
