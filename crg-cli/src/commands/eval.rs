use anyhow::{Context, Result};
use serde::Serialize;

use super::Session;
use crate::RoadArgs;

#[derive(Serialize)]
struct EvalResult {
    u: f64,
    v: f64,
    x: f64,
    y: f64,
    z: f64,
    heading: f64,
    curvature: f64,
    /// Elevation looked up through the world position.
    z_xy: f64,
}

pub fn run(road: &RoadArgs, u: f64, v: f64, json: bool) -> Result<()> {
    let session = Session::open(road)?;
    let mut cp = session.contact_point()?;

    let z = cp.elevation_at(u, v).context("Failed to evaluate elevation")?;
    let (x, y) = cp.to_world(u, v).context("Failed to convert to world position")?;
    let (heading, curvature) = cp
        .heading_and_curvature(u, v)
        .context("Failed to evaluate heading")?;
    let z_xy = cp
        .world_to_elevation(x, y)
        .context("Failed to evaluate elevation at world position")?;

    let result = EvalResult {
        u,
        v,
        x,
        y,
        z,
        heading,
        curvature,
        z_xy,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!("u/v: {:.6} / {:.6}", u, v);
        println!("x/y: {:.6} / {:.6}", x, y);
        println!("z: {:.6} m (via x/y: {:.6} m)", z, z_xy);
        println!(
            "Heading: {:.6} rad ({:.3} deg)",
            heading,
            heading.to_degrees()
        );
        println!("Curvature: {:.6} 1/m", curvature);
    }

    Ok(())
}
