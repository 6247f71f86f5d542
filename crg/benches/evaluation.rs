use criterion::{black_box, criterion_group, criterion_main, Criterion};

use crg::{DataSet, GridStore};

const WHEEL_BASE: f64 = 2.5;
const TRACK_WIDTH: f64 = 1.45;
const PATCH_SIZE: f64 = 0.1;
const PATCH_POINTS: usize = 10;

/// Winding 500 m road with 5 cm stations and a 4 m wide grid.
fn road() -> DataSet {
    let n = 10_001;
    let du = 0.05;
    let curvatures: Vec<f64> = (0..n)
        .map(|i| 0.02 * (i as f64 * du / 40.0).sin())
        .collect();
    let offsets: Vec<f64> = (0..=40).map(|j| -2.0 + 0.1 * j as f64).collect();

    let store = GridStore::builder(du, n)
        .lateral_offsets(offsets)
        .elevation_fn(|u, v| 0.005 * (u * 7.0).sin() * (v * 3.0).cos())
        .curvatures(0.0, 0.0, 0.0, curvatures)
        .build()
        .unwrap();
    DataSet::new(store)
}

/// World positions under the four contact patches of a car driving along
/// the reference line, one step of `step` per car position.
fn wheel_points(data_set: &DataSet, step: f64, patch_points: usize) -> Vec<(f64, f64)> {
    let mut cp = data_set.contact_point();
    let (u_min, u_max) = data_set.u_range();
    let wheels = [
        (0.0, 0.5 * TRACK_WIDTH),
        (0.0, -0.5 * TRACK_WIDTH),
        (WHEEL_BASE, 0.5 * TRACK_WIDTH),
        (WHEEL_BASE, -0.5 * TRACK_WIDTH),
    ];
    let (half, spacing) = if patch_points > 1 {
        (0.5 * PATCH_SIZE, PATCH_SIZE / (patch_points - 1) as f64)
    } else {
        (0.0, 0.0)
    };

    let mut points = Vec::new();
    let mut u = u_min;
    while u < u_max {
        let (x, y) = cp.to_world(u, 0.0).unwrap();
        let (phi, _) = cp.heading_and_curvature(u, 0.0).unwrap();
        let (sin, cos) = phi.sin_cos();

        for (dx, dy) in wheels {
            for j in 0..patch_points {
                let wx = dx - half + spacing * j as f64;
                for k in 0..patch_points {
                    let wy = dy - half + spacing * k as f64;
                    points.push((x + wx * cos - wy * sin, y + wx * sin + wy * cos));
                }
            }
        }
        u += step;
    }
    points
}

fn bench_world_to_elevation(c: &mut Criterion) {
    let data_set = road();
    let points = wheel_points(&data_set, 1.0, PATCH_POINTS);
    let mut cp = data_set.contact_point();

    c.bench_function("four_wheel_patches_1m", |b| {
        b.iter(|| {
            for &(x, y) in &points {
                black_box(cp.world_to_elevation(black_box(x), black_box(y)).unwrap());
            }
        });
    });
}

fn bench_single_wheel_path(c: &mut Criterion) {
    let data_set = road();
    let points = wheel_points(&data_set, 0.01, 1);
    let mut cp = data_set.contact_point();

    c.bench_function("wheel_centres_1cm", |b| {
        b.iter(|| {
            for &(x, y) in &points {
                black_box(cp.world_to_elevation(black_box(x), black_box(y)).unwrap());
            }
        });
    });
}

fn bench_uv_queries(c: &mut Criterion) {
    let data_set = road();
    let mut cp = data_set.contact_point();

    c.bench_function("elevation_at", |b| {
        b.iter(|| {
            black_box(cp.elevation_at(black_box(123.456), black_box(0.789)).unwrap());
        });
    });

    c.bench_function("to_world", |b| {
        b.iter(|| {
            black_box(cp.to_world(black_box(123.456), black_box(0.789)).unwrap());
        });
    });
}

fn bench_cold_inverse(c: &mut Criterion) {
    let data_set = road();
    let mut cp = data_set.contact_point();
    let near = cp.to_world(20.0, 1.0).unwrap();
    let far = cp.to_world(480.0, -1.0).unwrap();

    // Alternating far apart points defeats the cache.
    c.bench_function("to_local_alternating", |b| {
        b.iter(|| {
            black_box(cp.to_local(black_box(near.0), black_box(near.1)).unwrap());
            black_box(cp.to_local(black_box(far.0), black_box(far.1)).unwrap());
        });
    });
}

criterion_group!(
    benches,
    bench_world_to_elevation,
    bench_single_wheel_path,
    bench_uv_queries,
    bench_cold_inverse
);
criterion_main!(benches);
