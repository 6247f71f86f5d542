use anyhow::{bail, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use super::Session;
use crate::RoadArgs;

pub fn run(
    road: &RoadArgs,
    output: Option<PathBuf>,
    resolution: usize,
    range: Option<Vec<f64>>,
    uv: bool,
) -> Result<()> {
    if resolution < 2 {
        bail!("Resolution must be at least 2, got {}", resolution);
    }

    let session = Session::open(road)?;
    let mut cp = session.contact_point()?;

    let (x_min, y_min, x_max, y_max) = match range.as_deref() {
        Some(&[x_min, y_min, x_max, y_max]) => (x_min, y_min, x_max, y_max),
        Some(other) => bail!("Range needs 4 values, got {}", other.len()),
        None => road_bounds(&cp),
    };
    if !(x_max > x_min && y_max > y_min) {
        bail!(
            "Empty scan window x {}..{}, y {}..{}",
            x_min,
            x_max,
            y_min,
            y_max
        );
    }

    let sink: Box<dyn Write> = match &output {
        Some(path) => Box::new(File::create(path).context("Failed to create output file")?),
        None => Box::new(io::stdout().lock()),
    };
    let mut writer = csv::Writer::from_writer(BufWriter::new(sink));

    if uv {
        writer.write_record(["x", "y", "u", "v", "z"])?;
    } else {
        writer.write_record(["x", "y", "z"])?;
    }

    // Only draw progress when stdout is free for it.
    let pb = if output.is_some() {
        let pb = ProgressBar::new(resolution as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template(
                    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})",
                )?
                .progress_chars("#>-"),
        );
        pb
    } else {
        ProgressBar::hidden()
    };

    let dx = (x_max - x_min) / (resolution - 1) as f64;
    let dy = (y_max - y_min) / (resolution - 1) as f64;
    let mut voids = 0usize;

    for i in 0..resolution {
        let y = y_min + i as f64 * dy;
        for j in 0..resolution {
            let x = x_min + j as f64 * dx;
            let z = cp.world_to_elevation(x, y).unwrap_or(f64::NAN);
            if z.is_nan() {
                voids += 1;
            }

            let mut record = vec![x.to_string(), y.to_string()];
            if uv {
                let (u, v) = cp.to_local(x, y).unwrap_or((f64::NAN, f64::NAN));
                record.push(u.to_string());
                record.push(v.to_string());
            }
            record.push(z.to_string());
            writer.write_record(&record)?;
        }
        pb.inc(1);
    }

    pb.finish_with_message("done");
    writer.flush()?;

    if let Some(path) = output {
        println!(
            "{} points ({} without elevation) written to: {}",
            resolution * resolution,
            voids,
            path.display()
        );
    }
    Ok(())
}

/// Bounding box of the reference line grown by half the road width.
fn road_bounds(cp: &crg::ContactPoint) -> (f64, f64, f64, f64) {
    let geometry = cp.geometry();
    let (v_min, v_max) = geometry.v_range();
    let margin = 0.5 * (v_max - v_min);

    let (mut x_min, mut y_min) = (f64::INFINITY, f64::INFINITY);
    let (mut x_max, mut y_max) = (f64::NEG_INFINITY, f64::NEG_INFINITY);
    for pose in geometry.poses() {
        x_min = x_min.min(pose.x);
        x_max = x_max.max(pose.x);
        y_min = y_min.min(pose.y);
        y_max = y_max.max(pose.y);
    }

    (x_min - margin, y_min - margin, x_max + margin, y_max + margin)
}
