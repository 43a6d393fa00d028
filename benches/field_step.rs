use criterion::{criterion_group, criterion_main, Criterion};
use pulse_field::audio::{AudioFrame, EnergyExtractor};
use pulse_field::config::{EnergyConfig, FieldConfig};
use pulse_field::graphics::Renderer;
use pulse_field::simulation::ParticleField;
use std::hint::black_box;

fn bench_field(c: &mut Criterion) {
    let config = FieldConfig::default();
    let field = ParticleField::new(800, 600, &config);

    c.benchmark_group("field")
        .bench_function("step_100x10", |b| {
            let mut state = field.initial_state(&config);
            b.iter(|| field.step(black_box(&mut state), black_box(1.5)));
        })
        .bench_function("render_100x10", |b| {
            let state = field.initial_state(&config);
            let renderer = Renderer::new(800, 600, &config);
            b.iter(|| black_box(renderer.render(&state, renderer.bounds())));
        });
}

fn bench_energy(c: &mut Criterion) {
    let mut extractor = EnergyExtractor::new(1024, &EnergyConfig::default());
    let frame = AudioFrame::new((0..1024).map(|i| (i as f32 * 0.05).sin()).collect());

    c.bench_function("pull_factor_1024", |b| {
        b.iter(|| black_box(extractor.pull_factor(black_box(&frame))));
    });
}

criterion_group!(benches, bench_field, bench_energy);
criterion_main!(benches);
