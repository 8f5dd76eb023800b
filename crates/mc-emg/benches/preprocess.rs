use criterion::{Criterion, black_box, criterion_group, criterion_main};
use mc_core::config::PreprocessMode;
use mc_emg::preprocess::EmgPreprocessor;
use ndarray::Array2;

fn bench_preprocess(c: &mut Criterion) {
    let pre = EmgPreprocessor::new(4, 5.0, 160.0, 1e-4).expect("filtre par défaut");
    let mut rng = fastrand::Rng::with_seed(13_696_641);
    let readings = Array2::from_shape_simple_fn((1600, 8), || rng.f32() * 2.0 - 1.0);

    c.bench_function("filtered_1600x8", |b| {
        b.iter(|| pre.preprocess(PreprocessMode::Filtered, black_box(readings.view())));
    });
    c.bench_function("rectified_sum_1600x8", |b| {
        b.iter(|| pre.preprocess(PreprocessMode::RectifiedSum, black_box(readings.view())));
    });
}

criterion_group!(benches, bench_preprocess);
criterion_main!(benches);
