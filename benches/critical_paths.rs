//! Criterion benchmarks for Layermint critical paths
//!
//! Benchmarks the core performance-critical operations:
//! - Blend: per-pixel blend modes
//! - Sampler: weighted draws and combination keys
//! - Compositor: flattening layer stacks from disk

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use image::{Rgba, RgbaImage};
use layermint::composition::{blend_images, BlendMode, Compositor, LayerDescriptor};
use layermint::models::{Contributor, LayerOption};
use layermint::sampler::{Sampler, WeightedSampler};
use tempfile::TempDir;

// =============================================================================
// Test Data Generators
// =============================================================================

/// Gradient image so blends don't hit trivial fast paths
fn make_image(size: u32, seed: u8) -> RgbaImage {
    RgbaImage::from_fn(size, size, |x, y| {
        Rgba([(x as u8).wrapping_add(seed), (y as u8).wrapping_mul(3), seed, ((x + y) % 256) as u8])
    })
}

/// Roster of `contributors`, each with `layers` options of varying weight
fn make_roster(contributors: usize, layers: usize) -> Vec<Contributor> {
    (0..contributors)
        .map(|c| {
            let mut contributor = Contributor::new(format!("artist_{}", c), c as i64 + 1);
            for l in 0..layers {
                let layer = LayerOption::new(format!("/layers/artist_{}/trait_{}.png", c, l), c as i64 + 1)
                    .with_rarity((l % 5 + 1) as f64);
                contributor.layers.push(layer);
            }
            contributor
        })
        .collect()
}

/// Write `count` layer PNGs to a temp dir and describe them
fn make_layer_files(count: usize, size: u32) -> (TempDir, Vec<LayerDescriptor>) {
    let dir = TempDir::new().unwrap();
    let layers = (0..count)
        .map(|i| {
            let path = dir.path().join(format!("layer_{}.png", i));
            make_image(size, i as u8 * 40).save(&path).unwrap();
            LayerDescriptor::new(format!("artist_{}", i), path, format!("Layer {}", i), i as i64)
        })
        .collect();
    (dir, layers)
}

// =============================================================================
// Blend Benchmarks
// =============================================================================

fn bench_blend(c: &mut Criterion) {
    let mut group = c.benchmark_group("blend");

    for size in [64u32, 256, 512].iter() {
        let background = make_image(*size, 10);
        let foreground = make_image(*size, 200);
        group.throughput(Throughput::Elements((*size * *size) as u64));

        for mode in [BlendMode::Normal, BlendMode::Multiply, BlendMode::Screen, BlendMode::Overlay] {
            group.bench_with_input(
                BenchmarkId::new(mode.as_str(), size),
                &(&background, &foreground),
                |b, (bg, fg)| b.iter(|| blend_images(black_box(bg), black_box(fg), mode)),
            );
        }
    }

    group.finish();
}

// =============================================================================
// Sampler Benchmarks
// =============================================================================

fn bench_sampler(c: &mut Criterion) {
    let mut group = c.benchmark_group("sampler");

    for contributors in [4usize, 16, 64].iter() {
        let roster = make_roster(*contributors, 20);
        group.throughput(Throughput::Elements(*contributors as u64));
        group.bench_with_input(BenchmarkId::new("sample", contributors), &roster, |b, roster| {
            let mut sampler = WeightedSampler::seeded(42);
            b.iter(|| sampler.sample(black_box(roster)).unwrap())
        });
    }

    let roster = make_roster(16, 20);
    let mut sampler = WeightedSampler::seeded(7);
    let combination = sampler.sample(&roster).unwrap();
    group.bench_function("combination_key_16", |b| b.iter(|| black_box(&combination).key()));

    group.finish();
}

// =============================================================================
// Compositor Benchmarks
// =============================================================================

fn bench_compositor(c: &mut Criterion) {
    let mut group = c.benchmark_group("compositor");
    group.sample_size(20);

    for count in [2usize, 5, 10].iter() {
        let (_dir, layers) = make_layer_files(*count, 256);
        let compositor = Compositor::new().with_canvas(256, 256);
        group.throughput(Throughput::Elements(*count as u64));
        group.bench_with_input(BenchmarkId::new("compose_static_256", count), &layers, |b, layers| {
            b.iter(|| compositor.compose_static(black_box(layers)).unwrap())
        });
    }

    let (_dir, layers) = make_layer_files(3, 128);
    let compositor = Compositor::new().with_canvas(512, 512);
    group.bench_function("compose_static_upscale_3", |b| {
        b.iter(|| compositor.compose_static(black_box(&layers)).unwrap())
    });

    group.finish();
}

criterion_group!(benches, bench_blend, bench_sampler, bench_compositor);
criterion_main!(benches);
