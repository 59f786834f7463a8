use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use handsoff::classifier::{ClassifierOptions, Embedding, ExampleStore, Label, Weighting};
use handsoff::embedding::{DEFAULT_GRID, FeatureExtractor, ThumbnailExtractor};
use image::{Rgb, RgbImage};

const DIM: usize = (DEFAULT_GRID * DEFAULT_GRID * 3) as usize;

fn unit_vec(dim: usize, idx: usize) -> Vec<f32> {
    let mut vec = vec![0.01; dim];
    vec[idx % dim] = 1.0;
    vec
}

fn seeded_store(per_label: usize, weighting: Weighting) -> ExampleStore {
    let store = ExampleStore::new(ClassifierOptions {
        weighting,
        ..ClassifierOptions::default()
    });
    for i in 0..per_label {
        store
            .add_example(Embedding::new(unit_vec(DIM, i)), Label::NotTouched)
            .expect("seed not touched");
        store
            .add_example(Embedding::new(unit_vec(DIM, DIM - 1 - i)), Label::Touched)
            .expect("seed touched");
    }
    store
}

fn bench_predict(c: &mut Criterion) {
    let query = Embedding::new(unit_vec(DIM, 7));
    for per_label in [50, 500] {
        for weighting in [Weighting::Uniform, Weighting::Similarity] {
            let store = seeded_store(per_label, weighting);
            c.bench_with_input(
                BenchmarkId::new(format!("predict_{weighting:?}"), per_label * 2),
                &query,
                |b, query| b.iter(|| store.predict(black_box(query)).expect("predict")),
            );
        }
    }
}

fn bench_thumbnail(c: &mut Criterion) {
    let extractor = ThumbnailExtractor::default();
    let frame = RgbImage::from_fn(640, 480, |x, y| Rgb([(x % 256) as u8, (y % 256) as u8, 128]));
    c.bench_function("thumbnail_extract_640x480", |b| {
        b.iter(|| extractor.extract(black_box(&frame)).expect("extract"))
    });
}

criterion_group!(benches, bench_predict, bench_thumbnail);
criterion_main!(benches);
