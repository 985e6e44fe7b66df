//! Benchmarks for the prediction pipeline.
//!
//! Run with: cargo bench --bench attribution_bench

use burn::prelude::*;
use burn_autodiff::Autodiff;
use burn_ndarray::NdArray;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use image::{Rgb, RgbImage};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

use dfd::prelude::*;

type InferBackend = Autodiff<NdArray>;

fn synthetic_image(size: u32) -> RgbImage {
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    RgbImage::from_fn(size, size, |_, _| Rgb([rng.gen(), rng.gen(), rng.gen()]))
}

fn model_config(img_size: usize) -> ForgeryNetConfig {
    ForgeryNetConfig::new(img_size)
        .with_backbone_channels(vec![16, 32, 64])
        .with_hidden_dims([64, 32])
        .with_max_tokens(16)
}

fn bench_grad_cam(c: &mut Criterion) {
    let mut group = c.benchmark_group("grad_cam");
    group.sample_size(10);

    let device = <InferBackend as Backend>::Device::default();

    for img_size in [64usize, 128].iter() {
        let config = model_config(*img_size);
        Seed::new(42).seed_backend::<InferBackend>();
        let model = config.init::<InferBackend>(&device);
        let prepared = Preprocessor::new(*img_size, config.max_tokens)
            .prepare(&synthetic_image(*img_size as u32))
            .unwrap();

        for layer in [FeatureStage::Backbone, FeatureStage::Attention] {
            let engine = GradCam::new(layer);
            group.bench_with_input(
                BenchmarkId::new(format!("{:?}", layer), img_size),
                &prepared,
                |b, prepared| {
                    b.iter(|| {
                        let inputs = ModelInputs::<InferBackend>::from_prepared(prepared, &device);
                        let (adapter, image) = MultiInputAdapter::split(&model, inputs);
                        black_box(engine.explain(&adapter, image, None).unwrap())
                    })
                },
            );
        }
    }

    group.finish();
}

fn bench_service_predict(c: &mut Criterion) {
    let mut group = c.benchmark_group("service_predict");
    group.sample_size(10);

    let device = <InferBackend as Backend>::Device::default();
    let config = ServiceConfig::default().with_model(model_config(128));
    Seed::new(42).seed_backend::<InferBackend>();
    let model = config.model.init::<InferBackend>(&device);
    let service = ForgeryService::<InferBackend, _>::from_model(config, model, device);

    for size in [256u32, 512].iter() {
        let image = synthetic_image(*size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &image, |b, image| {
            b.iter(|| black_box(service.predict_image("bench.png", image).unwrap()))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_grad_cam, bench_service_predict);
criterion_main!(benches);
