//! Benchmarks for the routing steps of a benefit calculation

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use wetland_algorithms::hydrology::{flow_accumulation, flow_direction, FlowDirectionParams};
use wetland_algorithms::terrain::{slope, SlopeParams};
use wetland_core::{GeoTransform, Raster};

/// Valley draining south: a V across columns on top of a southward tilt,
/// with a terraced band so flat resolution has work to do
fn create_valley_dem(size: usize) -> Raster<f64> {
    let mut dem = Raster::new(size, size);
    dem.set_transform(GeoTransform::new(0.0, size as f64 * 10.0, 10.0, -10.0));
    let center = size as f64 / 2.0;
    for row in 0..size {
        for col in 0..size {
            let across = (col as f64 - center).abs() * 0.5;
            let along = (size - row) as f64 * 0.2;
            let terraced = if row % 32 < 4 { (along / 2.0).floor() * 2.0 } else { along };
            dem.set(row, col, across + terraced).unwrap();
        }
    }
    dem
}

fn bench_slope(c: &mut Criterion) {
    let mut group = c.benchmark_group("terrain/slope");
    for size in [256, 512, 1024] {
        let dem = create_valley_dem(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| slope(black_box(&dem), SlopeParams::default()).unwrap())
        });
    }
    group.finish();
}

fn bench_flow_direction(c: &mut Criterion) {
    let mut group = c.benchmark_group("hydrology/flow_direction");
    for size in [256, 512, 1024] {
        let dem = create_valley_dem(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| flow_direction(black_box(&dem), FlowDirectionParams::default()).unwrap())
        });
    }
    group.finish();
}

fn bench_flow_accumulation(c: &mut Criterion) {
    let mut group = c.benchmark_group("hydrology/flow_accumulation");
    for size in [256, 512, 1024] {
        let dem = create_valley_dem(size);
        let fdir = flow_direction(&dem, FlowDirectionParams::default()).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| flow_accumulation(black_box(&fdir)).unwrap())
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_slope,
    bench_flow_direction,
    bench_flow_accumulation,
);
criterion_main!(benches);
