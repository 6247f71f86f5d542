//! Synthetic road presets.

use clap::ValueEnum;
use crg::{GridStore, Result};
use std::f64::consts::PI;

/// Built-in road shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RoadKind {
    /// Straight road with a constant grade
    Straight,
    /// Constant radius bend with banking
    Arc,
    /// Closed circular track
    Loop,
    /// Alternating bends with a pothole patch of void samples
    Slalom,
}

/// Build the raw data for a preset.
pub fn build(kind: RoadKind, length: f64, width: f64, increment: f64) -> Result<GridStore> {
    let station_count = (length / increment).round().max(1.0) as usize + 1;
    // Close the loop exactly regardless of rounding.
    let du = length / (station_count - 1) as f64;
    let half = 0.5 * width;
    let offsets: Vec<f64> = [-1.0, -0.6, -0.25, 0.0, 0.25, 0.6, 1.0]
        .iter()
        .map(|f| f * half)
        .collect();

    let builder = GridStore::builder(du, station_count).lateral_offsets(offsets);
    let grade = |u: f64| 0.01 * u;

    let builder = match kind {
        RoadKind::Straight => builder
            .elevation_fn(|u, v| surface(u, v, half))
            .reference_elevation(stations(station_count, du, grade))
            .headings(0.0, 0.0, vec![0.0; station_count]),
        RoadKind::Arc => {
            let curvature = 1.0 / length.max(4.0 * width);
            builder
                .elevation_fn(|u, v| surface(u, v, half))
                .reference_elevation(stations(station_count, du, grade))
                .bank(vec![0.03; station_count])
                .curvatures(0.0, 0.0, 0.0, vec![curvature; station_count])
        }
        RoadKind::Loop => {
            let radius = length / (2.0 * PI);
            builder
                .elevation_fn(|u, v| surface(u, v, half) + 0.2 * (2.0 * PI * u / length).sin())
                .curvatures(radius, 0.0, 0.5 * PI, vec![1.0 / radius; station_count])
        }
        RoadKind::Slalom => {
            let amplitude = 0.03;
            let wavelength = 50.0;
            let pothole = (0.4 * length, 0.41 * length);
            builder
                .elevation_fn(|u, v| {
                    if u >= pothole.0 && u <= pothole.1 && v > 0.5 * half {
                        f64::NAN
                    } else {
                        surface(u, v, half)
                    }
                })
                .reference_elevation(stations(station_count, du, grade))
                .curvatures(
                    0.0,
                    0.0,
                    0.0,
                    stations(station_count, du, |u| {
                        amplitude * (2.0 * PI * u / wavelength).sin()
                    }),
                )
        }
    };

    builder.build()
}

/// Crowned surface with short wave unevenness, relative to the reference line.
fn surface(u: f64, v: f64, half: f64) -> f64 {
    let crown = -0.02 * v.abs() / half.max(f64::EPSILON);
    let waves = 0.005 * (2.0 * PI * u / 3.7).sin() * (1.0 + 0.5 * (2.0 * PI * v / 1.3).cos());
    crown + waves
}

fn stations(count: usize, du: f64, f: impl Fn(f64) -> f64) -> Vec<f64> {
    (0..count).map(|i| f(i as f64 * du)).collect()
}
