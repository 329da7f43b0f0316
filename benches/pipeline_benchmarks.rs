use bgremove_api::{
    config::OutputFormat,
    models::PreprocessingConfig,
    types::SegmentationMask,
    ImagePreprocessor, OutputFormatHandler, RemovalPipeline, SizePolicy,
};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use image::{Rgb, RgbImage};

const SIZES: &[(u32, u32)] = &[(640, 480), (1920, 1080), (4000, 3000)];

fn gradient_image(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
    })
}

fn soft_mask(width: u32, height: u32) -> SegmentationMask {
    let data = (0..height)
        .flat_map(|_| (0..width).map(move |x| ((x * 255) / width.max(1)) as u8))
        .collect();
    SegmentationMask::new(data, (width, height))
}

fn bench_size_policy(c: &mut Criterion) {
    let tokens = ["preview", "medium", "hd", "50mp", "full", "banana"];
    c.bench_function("compute_target_size", |b| {
        b.iter(|| {
            for token in tokens {
                black_box(SizePolicy::compute_target_size(
                    black_box((6000, 4000)),
                    Some(token),
                ));
            }
        });
    });
}

fn bench_preprocessing(c: &mut Criterion) {
    let mut group = c.benchmark_group("preprocess_for_inference");
    group.sample_size(20);
    let config = PreprocessingConfig::default();

    for &(width, height) in SIZES {
        let image = gradient_image(width, height);
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{width}x{height}")),
            &image,
            |b, image| {
                b.iter(|| ImagePreprocessor::preprocess_for_inference(black_box(image), &config));
            },
        );
    }
    group.finish();
}

fn bench_composite(c: &mut Criterion) {
    let mut group = c.benchmark_group("composite");

    for &(width, height) in SIZES {
        let image = gradient_image(width, height);
        let mask = soft_mask(width, height);
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{width}x{height}")),
            &(image, mask),
            |b, (image, mask)| {
                b.iter(|| RemovalPipeline::composite(black_box(image), black_box(mask)));
            },
        );
    }
    group.finish();
}

fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode");
    group.sample_size(10);

    let image = gradient_image(1920, 1080);
    let rgba = RemovalPipeline::composite(&image, &soft_mask(1920, 1080)).unwrap();

    for format in [OutputFormat::Png, OutputFormat::Jpeg] {
        group.bench_with_input(
            BenchmarkId::from_parameter(format.token()),
            &format,
            |b, &format| {
                b.iter(|| OutputFormatHandler::encode(rgba.clone(), format, 90));
            },
        );
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_size_policy,
    bench_preprocessing,
    bench_composite,
    bench_encode
);
criterion_main!(benches);
