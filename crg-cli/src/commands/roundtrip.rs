use anyhow::{bail, Result};

use super::Session;
use crate::RoadArgs;

#[derive(Debug, Default)]
struct PassReport {
    points: usize,
    failures: usize,
    outside: usize,
    max_du: f64,
    max_dv: f64,
    inverse_queries: u64,
    hit_rate: f64,
}

pub fn run(
    road: &RoadArgs,
    steps: (usize, usize),
    border: (usize, usize),
    tolerance: f64,
    repeat: usize,
) -> Result<()> {
    if steps.0 == 0 || steps.1 == 0 {
        bail!("Step counts must be positive");
    }
    if repeat == 0 {
        bail!("Repeat count must be positive");
    }

    // Every pass builds, modifies, queries and releases its data set.
    let mut outside = 0usize;
    for pass in 1..=repeat {
        let session = Session::open(road)?;
        let report = run_pass(&session, steps, border, tolerance)?;

        session.registry.release_all();
        let remaining = session.registry.stats().entry_count;
        if remaining != 0 || session.registry.contains(session.id) {
            bail!("Pass {}: {} data sets left after release", pass, remaining);
        }

        if repeat > 1 {
            println!("Pass {}/{}", pass, repeat);
        }
        println!("Points: {}", report.points);
        println!("Failed conversions: {}", report.failures);
        println!("Outside tolerance {:.1e}: {}", tolerance, report.outside);
        println!(
            "Max deviation: du {:.3e} m, dv {:.3e} m",
            report.max_du, report.max_dv
        );
        println!(
            "Inverse queries: {} ({:.1}% answered from cache)",
            report.inverse_queries,
            report.hit_rate * 100.0
        );
        outside += report.outside;
    }

    if outside > 0 {
        bail!("{} points exceed the tolerance", outside);
    }
    Ok(())
}

fn run_pass(
    session: &Session,
    (steps_u, steps_v): (usize, usize),
    (border_u, border_v): (usize, usize),
    tolerance: f64,
) -> Result<PassReport> {
    let mut cp = session.contact_point()?;

    let (u_min, u_max) = cp.geometry().u_range();
    let (v_min, v_max) = cp.geometry().v_range();
    let du = (u_max - u_min) / steps_u as f64;
    let dv = (v_max - v_min) / steps_v as f64;

    let mut report = PassReport::default();

    for i in 0..=steps_u + 2 * border_u {
        let u = u_min + (i as f64 - border_u as f64) * du;
        for j in 0..=steps_v + 2 * border_v {
            let v = v_min + (j as f64 - border_v as f64) * dv;
            report.points += 1;

            let result = cp.to_world(u, v).and_then(|(x, y)| cp.to_local(x, y));
            let (u2, v2) = match result {
                Ok(uv) => uv,
                Err(e) => {
                    tracing::debug!(u, v, error = %e, "round trip failed");
                    report.failures += 1;
                    continue;
                }
            };

            let (eu, ev) = ((u2 - u).abs(), (v2 - v).abs());
            report.max_du = report.max_du.max(eu);
            report.max_dv = report.max_dv.max(ev);
            if eu > tolerance || ev > tolerance {
                report.outside += 1;
                println!(
                    "u/v {:>12.6} {:>10.6} -> {:>12.6} {:>10.6}  (du {:.2e}, dv {:.2e})",
                    u, v, u2, v2, eu, ev
                );
            }
        }
    }

    let stats = cp.perf_stats();
    report.inverse_queries = stats.inverse_queries;
    report.hit_rate = stats.hit_rate();
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roads::RoadKind;

    fn straight_road() -> RoadArgs {
        RoadArgs {
            road: RoadKind::Straight,
            length: 50.0,
            width: 6.0,
            increment: 0.5,
            modifiers: None,
            options: None,
        }
    }

    #[test]
    fn test_repeated_passes_release_everything() {
        assert!(run(&straight_road(), (10, 6), (0, 0), 1e-5, 3).is_ok());
    }

    #[test]
    fn test_zero_repeat_rejected() {
        assert!(run(&straight_road(), (10, 6), (0, 0), 1e-5, 0).is_err());
    }
}
