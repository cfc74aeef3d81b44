use criterion::{black_box, criterion_group, criterion_main, Criterion};

use chart_judge::chart::{render_chart, ChartPlacement, RenderOptions};
use chart_judge::color::PatchSampler;
use chart_judge::detection::ChartLocator;
use chart_judge::image_loader::Image;
use chart_judge::judgment::JudgmentEngine;
use chart_judge::{ChartJudge, ChartSpec};

fn synthetic_chart(spec: &ChartSpec, width: u32, height: u32, rotation_deg: f64) -> Image {
    let placement = ChartPlacement::centered([width, height], width as f64 * 0.6, spec.aspect_ratio())
        .rotated(rotation_deg);
    let options = RenderOptions::new(width, height, placement.homography().unwrap());
    Image::from_rgb(render_chart(spec, &options).unwrap())
}

fn bench_locate(c: &mut Criterion) {
    let spec = ChartSpec::color_checker_classic();
    let locator = ChartLocator::new();
    let small = synthetic_chart(&spec, 800, 600, 0.0);
    let large = synthetic_chart(&spec, 1920, 1080, 4.0);

    c.bench_function("locate_800x600", |b| {
        b.iter(|| black_box(locator.locate(black_box(&small), &spec).unwrap()))
    });

    c.bench_function("locate_1920x1080_rotated", |b| {
        b.iter(|| black_box(locator.locate(black_box(&large), &spec).unwrap()))
    });

    // Overexposed: the nominal frame pass finds nothing, the observed one does
    let mut lifted = small.pixels().clone();
    for p in lifted.pixels_mut() {
        p.0 = p.0.map(|c| c.saturating_add(25));
    }
    let lifted = Image::from_rgb(lifted);
    c.bench_function("locate_800x600_lifted", |b| {
        b.iter(|| black_box(locator.locate(black_box(&lifted), &spec).unwrap()))
    });
}

fn bench_sample_and_judge(c: &mut Criterion) {
    let spec = ChartSpec::color_checker_classic();
    let image = synthetic_chart(&spec, 800, 600, 0.0);
    let instance = ChartLocator::new().locate(&image, &spec).unwrap();
    let sampler = PatchSampler::new();
    let engine = JudgmentEngine::new();

    c.bench_function("sample_24_patches", |b| {
        b.iter(|| black_box(sampler.sample(black_box(&image), &instance, &spec).unwrap()))
    });

    let samples = sampler.sample(&image, &instance, &spec).unwrap();
    c.bench_function("judge_24_patches", |b| {
        b.iter(|| black_box(engine.judge(black_box(&samples), &spec).unwrap()))
    });
}

fn bench_pipeline(c: &mut Criterion) {
    let judge = ChartJudge::default();
    let image = synthetic_chart(judge.spec(), 800, 600, 0.0);

    c.bench_function("judge_image_800x600", |b| {
        b.iter(|| black_box(judge.judge_image(black_box(&image)).unwrap()))
    });
}

criterion_group!(benches, bench_locate, bench_sample_and_judge, bench_pipeline);
criterion_main!(benches);
