use anyhow::{bail, Context, Result};
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

use super::Session;
use crate::RoadArgs;

pub fn run(road: &RoadArgs, input: PathBuf, tolerance: f64) -> Result<()> {
    let session = Session::open(road)?;
    let mut cp = session.contact_point()?;

    let file = File::open(&input).context("Failed to open input file")?;
    let mut reader = csv::Reader::from_reader(BufReader::new(file));

    let headers = reader.headers()?.clone();
    let column = |name: &str| headers.iter().position(|h| h.trim() == name);
    let x_idx = column("x").context("Column 'x' not found in CSV")?;
    let y_idx = column("y").context("Column 'y' not found in CSV")?;
    let z_idx = column("z").context("Column 'z' not found in CSV")?;
    let uv_idx = column("u").zip(column("v"));

    let mut checked = 0usize;
    let mut errors = 0usize;
    let mut failures = 0usize;
    let (mut min_err, mut max_err, mut sum_err) = (f64::INFINITY, 0.0f64, 0.0);

    for (line, record) in reader.records().enumerate() {
        let record = record?;
        let field = |idx: usize, name: &str| -> Result<f64> {
            record
                .get(idx)
                .with_context(|| format!("Row {}: missing {}", line + 1, name))?
                .trim()
                .parse::<f64>()
                .with_context(|| format!("Row {}: invalid {}", line + 1, name))
        };
        let x = field(x_idx, "x")?;
        let y = field(y_idx, "y")?;
        let z_ref = field(z_idx, "z")?;

        let z = match cp.world_to_elevation(x, y) {
            Ok(z) => z,
            Err(e) => {
                // Reference voids are expected to fail.
                if !z_ref.is_nan() {
                    failures += 1;
                    tracing::warn!(row = line + 1, x, y, error = %e, "evaluation failed");
                }
                continue;
            }
        };
        if z.is_nan() && z_ref.is_nan() {
            continue;
        }

        checked += 1;
        let err = (z - z_ref).abs();
        if err.is_nan() || err > tolerance {
            errors += 1;
            match uv_idx {
                Some((u_idx, v_idx)) => {
                    let (u, v) = (field(u_idx, "u")?, field(v_idx, "v")?);
                    println!(
                        "row {:>6}: x/y {:.4} {:.4}  u/v {:.4} {:.4}  z {:.6} ref {:.6}",
                        line + 1,
                        x,
                        y,
                        u,
                        v,
                        z,
                        z_ref
                    );
                }
                None => println!(
                    "row {:>6}: x/y {:.4} {:.4}  z {:.6} ref {:.6}",
                    line + 1,
                    x,
                    y,
                    z,
                    z_ref
                ),
            }
        }
        if err.is_finite() {
            min_err = min_err.min(err);
            max_err = max_err.max(err);
            sum_err += err;
        }
    }

    println!("Checked points: {}", checked);
    println!("Evaluation failures: {}", failures);
    println!("Above tolerance {:.1e}: {}", tolerance, errors);
    if checked > 0 && min_err.is_finite() {
        println!(
            "Error min/max/mean: {:.3e} / {:.3e} / {:.3e} m",
            min_err,
            max_err,
            sum_err / checked as f64
        );
    }

    if errors > 0 || failures > 0 {
        bail!(
            "Verification failed: {} points above tolerance, {} evaluation failures",
            errors,
            failures
        );
    }
    Ok(())
}
