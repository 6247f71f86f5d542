use anyhow::Result;

use super::Session;
use crate::RoadArgs;

pub fn run(road: &RoadArgs) -> Result<()> {
    let session = Session::open(road)?;
    let data_set = session.data_set()?;
    let geometry = data_set.effective();

    let (u_min, u_max) = geometry.u_range();
    let (v_min, v_max) = geometry.v_range();
    let poses = geometry.poses();

    let (mut x_min, mut x_max) = (f64::INFINITY, f64::NEG_INFINITY);
    let (mut y_min, mut y_max) = (f64::INFINITY, f64::NEG_INFINITY);
    for pose in poses {
        x_min = x_min.min(pose.x);
        x_max = x_max.max(pose.x);
        y_min = y_min.min(pose.y);
        y_max = y_max.max(pose.y);
    }

    // Void samples and elevation span over the whole grid.
    let mut voids = 0usize;
    let (mut z_min, mut z_max) = (f64::INFINITY, f64::NEG_INFINITY);
    for (line, &v) in geometry.lines().iter().zip(geometry.lateral_offsets()) {
        for station in 0..line.len() {
            let z = line.value(station);
            if z.is_nan() {
                voids += 1;
                continue;
            }
            let base = geometry.reference_elevation()[station] + geometry.bank()[station] * v;
            z_min = z_min.min(base + z);
            z_max = z_max.max(base + z);
        }
    }

    let (first, last) = match (poses.first(), poses.last()) {
        (Some(first), Some(last)) => (*first, *last),
        _ => anyhow::bail!("Data set has no stations"),
    };

    println!("Data set: {}", data_set.id());
    println!("Road: {:?}", road.road);
    println!();
    println!(
        "Stations: {} (increment {:.4} m)",
        geometry.station_count(),
        geometry.u_increment()
    );
    println!(
        "Lateral lines: {} {:?}",
        geometry.lateral_offsets().len(),
        geometry.lateral_offsets()
    );
    println!("u range: {:.3} .. {:.3} m", u_min, u_max);
    println!("v range: {:.3} .. {:.3} m", v_min, v_max);
    println!("Track length: {:.3} m", geometry.track_length());
    println!();
    println!("Start: ({:.3}, {:.3}) heading {:.4} rad", first.x, first.y, first.heading);
    println!("End: ({:.3}, {:.3}) heading {:.4} rad", last.x, last.y, last.heading);
    println!(
        "Bounding box: x {:.3} .. {:.3}, y {:.3} .. {:.3}",
        x_min, x_max, y_min, y_max
    );
    if z_min <= z_max {
        println!("Elevation: {:.3} .. {:.3} m", z_min, z_max);
    }
    println!("Void samples: {}", voids);
    println!();
    println!("Modifiers: {}", data_set.modifiers());
    println!("Options:");
    println!("{}", session.options);

    Ok(())
}
