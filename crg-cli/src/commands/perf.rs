use anyhow::{bail, Context, Result};
use std::time::{Duration, Instant};

use super::Session;
use crate::RoadArgs;

const WHEEL_BASE: f64 = 2.5;
const TRACK_WIDTH: f64 = 1.45;
const PATCH_SIZE: f64 = 0.1;

pub fn run(road: &RoadArgs, step: f64, patch_points: usize) -> Result<()> {
    if !(step.is_finite() && step > 0.0) {
        bail!("Step must be positive, got {}", step);
    }
    if patch_points == 0 {
        bail!("Patch needs at least one point per side");
    }

    let session = Session::open(road)?;
    let mut cp = session.contact_point()?;
    let (u_min, u_max) = cp.geometry().u_range();

    // Rear axle at the reference position, front axle one wheel base ahead.
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

    cp.reset_perf_stats();
    cp.enable_perf_stats();

    let mut positions = 0usize;
    let mut queries = 0usize;
    let mut failures = 0usize;
    let mut checksum = 0.0;
    let mut elapsed = Duration::ZERO;
    let mut points = Vec::with_capacity(wheels.len() * patch_points * patch_points);

    let mut u = u_min;
    while u <= u_max - WHEEL_BASE {
        let (x, y) = cp.to_world(u, 0.0).context("Failed to place car")?;
        let (phi, _) = cp.heading_and_curvature(u, 0.0)?;
        let (sin, cos) = phi.sin_cos();

        points.clear();
        for (dx, dy) in wheels {
            for j in 0..patch_points {
                let wx = dx - half + spacing * j as f64;
                for k in 0..patch_points {
                    let wy = dy - half + spacing * k as f64;
                    points.push((x + wx * cos - wy * sin, y + wy * cos + wx * sin));
                }
            }
        }

        let start = Instant::now();
        for &(x, y) in &points {
            match cp.world_to_elevation(x, y) {
                Ok(z) if z.is_finite() => checksum += z,
                Ok(_) => {}
                Err(_) => failures += 1,
            }
        }
        elapsed += start.elapsed();

        queries += points.len();
        positions += 1;
        u += step;
    }

    println!("Car positions: {}", positions);
    println!("Queries: {} ({} failed)", queries, failures);
    println!("Total time: {:.3} s", elapsed.as_secs_f64());
    if queries > 0 {
        println!(
            "Time per query: {:.3} us",
            elapsed.as_secs_f64() * 1e6 / queries as f64
        );
    }
    println!("Elevation checksum: {:.6}", checksum);
    println!();
    println!("{}", cp.perf_stats());

    Ok(())
}
