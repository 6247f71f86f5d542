//! Basic example: build a curved road, apply modifiers and query it.
//!
//! Run with: cargo run --example simple

use crg::{CrgError, DataSetRegistry, GridStore, Modifiers, ReferencePoint};

fn main() -> Result<(), CrgError> {
    // 200 m left-hand bend with a slight crown, 10 cm stations
    let n = 2001;
    let store = GridStore::builder(0.1, n)
        .lateral_offsets(vec![-4.0, -2.0, -0.5, 0.0, 0.5, 2.0, 4.0])
        .elevation_fn(|_, v| -0.02 * v.abs())
        .reference_elevation((0..n).map(|i| 0.001 * i as f64).collect())
        .curvatures(0.0, 0.0, 0.0, vec![0.005; n])
        .build()?;

    let registry = DataSetRegistry::new();
    let id = registry.insert(store)?;

    // Place the start of the road at a survey point
    registry.apply_modifiers(
        id,
        Modifiers {
            reference_point: Some(ReferencePoint {
                u: 0.0,
                v: 0.0,
                x: 1000.0,
                y: 2000.0,
                z: 50.0,
                heading: Some(0.5),
            }),
            ..Modifiers::default()
        },
    )?;

    let mut cp = registry.create_contact_point(id)?;
    cp.enable_perf_stats();

    println!("Queries along the right lane:");
    println!("{:-<60}", "");

    for u in [0.0, 50.0, 100.0, 150.0, 200.0] {
        let v = -1.5;
        let (x, y) = cp.to_world(u, v)?;
        let z = cp.world_to_elevation(x, y)?;
        let (phi, kappa) = cp.heading_and_curvature(u, v)?;
        println!(
            "u/v = {:7.2} / {:5.2}  x/y = {:9.3} / {:9.3}  z = {:7.3}  phi = {:6.3}  kappa = {:.5}",
            u, v, x, y, z, phi, kappa
        );
    }

    match cp.elevation_at(250.0, 0.0) {
        Ok(z) => println!("\nBeyond the end (kept): z = {:.3}", z),
        Err(e) => println!("\nBeyond the end: {}", e),
    }

    println!("\nContact point statistics:");
    println!("{}", cp.perf_stats());

    let stats = registry.stats();
    println!(
        "\nRegistry: {} data set(s), {:.1}% lookup hit rate",
        stats.entry_count,
        stats.hit_rate() * 100.0
    );

    registry.release_all();
    Ok(())
}
