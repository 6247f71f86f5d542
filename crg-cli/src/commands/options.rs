use anyhow::{bail, Context, Result};
use crg::{
    BorderMode, CurvatureMode, Modifiers, NanMode, Options, RefLineContinuation, RefLineOffset,
    ReferencePoint,
};
use serde::Serialize;

use super::Session;
use crate::RoadArgs;

const LAST_CASE: i32 = 28;
const STEPS_U: usize = 22;
const STEPS_V: usize = 6;
const EXCESS_STEPS_U: usize = 50;
const EXCESS_STEPS_V: usize = 10;
const TOLERANCE: f64 = 1e-4;

struct Scenario {
    name: &'static str,
    options: Options,
    modifiers: Modifiers,
}

#[derive(Serialize)]
struct CaseReport {
    case: i32,
    name: &'static str,
    points: usize,
    /// Points where the uv evaluation returned an error.
    rejected: usize,
    /// Points where the uv and xy elevations disagree.
    mismatches: usize,
    max_deviation: f64,
}

pub fn run(road: &RoadArgs, case: Option<i32>, json: bool) -> Result<()> {
    let session = Session::open(road)?;

    let cases: Vec<i32> = match case {
        Some(case) if (-1..=LAST_CASE).contains(&case) => vec![case],
        Some(case) => bail!("Unknown case {}, expected -1..={}", case, LAST_CASE),
        None => (0..=LAST_CASE).collect(),
    };

    let mut reports = Vec::with_capacity(cases.len());
    for case in cases {
        let scenario = scenario(&session, case);
        session
            .registry
            .apply_modifiers(session.id, scenario.modifiers.clone())
            .with_context(|| format!("Case {}: failed to apply modifiers", case))?;

        let mut cp = session.registry.create_contact_point(session.id)?;
        cp.set_options(scenario.options)
            .with_context(|| format!("Case {}: invalid options", case))?;

        let report = evaluate(&mut cp, case, scenario.name);
        if !json {
            println!(
                "{:>3}  {:<34} points {:>5}  rejected {:>5}  mismatches {:>4}  max dz {:.2e}",
                report.case,
                report.name,
                report.points,
                report.rejected,
                report.mismatches,
                report.max_deviation
            );
        }
        reports.push(report);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else {
        let mismatches: usize = reports.iter().map(|r| r.mismatches).sum();
        println!();
        println!("{} cases, {} mismatching points", reports.len(), mismatches);
    }

    Ok(())
}

/// Compare uv -> z with uv -> xy -> z over a grid reaching well beyond the data.
fn evaluate(cp: &mut crg::ContactPoint, case: i32, name: &'static str) -> CaseReport {
    let geometry = cp.geometry().clone();
    let (u_min, u_max) = geometry.u_range();
    let (v_min, v_max) = geometry.v_range();
    let du = (u_max - u_min) / STEPS_U as f64;
    let dv = (v_max - v_min) / STEPS_V as f64;

    let mut report = CaseReport {
        case,
        name,
        points: 0,
        rejected: 0,
        mismatches: 0,
        max_deviation: 0.0,
    };

    for i in 0..=STEPS_U + 2 * EXCESS_STEPS_U {
        let u = u_min + (i as f64 - EXCESS_STEPS_U as f64) * du;
        for j in 0..=STEPS_V + 2 * EXCESS_STEPS_V {
            let v = v_min + (j as f64 - EXCESS_STEPS_V as f64) * dv;
            report.points += 1;

            let direct = cp.elevation_at(u, v);
            let world = cp.to_world(u, v);
            let (z, (x, y)) = match (direct, world) {
                (Ok(z), Ok(xy)) => (z, xy),
                _ => {
                    report.rejected += 1;
                    continue;
                }
            };

            let deviation = match cp.world_to_elevation(x, y) {
                Ok(z_xy) if z.is_nan() && z_xy.is_nan() => 0.0,
                Ok(z_xy) => (z - z_xy).abs(),
                Err(_) => f64::INFINITY,
            };
            if deviation.is_nan() || deviation > TOLERANCE {
                report.mismatches += 1;
                tracing::debug!(case, u, v, x, y, z, "uv and xy elevations differ");
            }
            if deviation.is_finite() {
                report.max_deviation = report.max_deviation.max(deviation);
            }
        }
    }

    report
}

fn scenario(session: &Session, case: i32) -> Scenario {
    let base = *session.registry.default_options();
    let file_modifiers = session.modifiers.clone();
    let keep_last = |modifiers: Modifiers| Modifiers {
        nan_mode: NanMode::KeepLast,
        ..modifiers
    };

    let (name, options, modifiers) = match case {
        -1 => ("command line", session.options, file_modifiers),
        1 => (
            "curvature of reference line",
            Options {
                curvature_mode: CurvatureMode::RefLine,
                ..base
            },
            file_modifiers,
        ),
        2 => ("u border none", border_u(base, BorderMode::None), file_modifiers),
        3 => (
            "u offset -1, u/v border zero",
            Options {
                border_mode_u: BorderMode::ExZero,
                border_mode_v: BorderMode::ExZero,
                border_offset_u: -1.0,
                ..base
            },
            file_modifiers,
        ),
        4 => ("u border keep", border_u(base, BorderMode::ExKeep), file_modifiers),
        5 => ("u border repeat", border_u(base, BorderMode::Repeat), file_modifiers),
        6 => ("u border reflect", border_u(base, BorderMode::Reflect), file_modifiers),
        7 => (
            "u border repeat, offset 1",
            Options {
                border_offset_u: 1.0,
                ..border_u(base, BorderMode::Repeat)
            },
            file_modifiers,
        ),
        8 => ("v border none", border_v(base, BorderMode::None), file_modifiers),
        9 => ("v border zero", border_v(base, BorderMode::ExZero), file_modifiers),
        10 => ("v border keep", border_v(base, BorderMode::ExKeep), file_modifiers),
        11 => ("v border repeat", border_v(base, BorderMode::Repeat), file_modifiers),
        12 => ("v border reflect", border_v(base, BorderMode::Reflect), file_modifiers),
        13 => (
            "v border repeat, offset 1",
            Options {
                border_offset_v: 1.0,
                ..border_v(base, BorderMode::Repeat)
            },
            file_modifiers,
        ),
        14 => (
            "u border zero, smooth begin 10",
            Options {
                smooth_u_begin: 10.0,
                ..border_u(base, BorderMode::ExZero)
            },
            file_modifiers,
        ),
        15 => (
            "smooth end 10",
            Options {
                smooth_u_end: 10.0,
                ..base
            },
            file_modifiers,
        ),
        16 => (
            "u/v keep, extrapolated line",
            Options {
                border_mode_u: BorderMode::ExKeep,
                border_mode_v: BorderMode::ExKeep,
                ref_line_continuation: RefLineContinuation::Extrapolate,
                ..base
            },
            file_modifiers,
        ),
        17 => (
            "u keep, v none, closed track",
            Options {
                border_mode_u: BorderMode::ExKeep,
                border_mode_v: BorderMode::None,
                ref_line_continuation: RefLineContinuation::CloseTrack,
                ..base
            },
            file_modifiers,
        ),
        18 => (
            "scale z 2",
            base,
            keep_last(Modifiers {
                scale_z: 2.0,
                ..Modifiers::default()
            }),
        ),
        19 => (
            "scale slope 10",
            base,
            keep_last(Modifiers {
                scale_slope: 10.0,
                ..Modifiers::default()
            }),
        ),
        20 => (
            "scale bank 10",
            base,
            keep_last(Modifiers {
                scale_bank: 10.0,
                ..Modifiers::default()
            }),
        ),
        21 => (
            "scale length 2",
            base,
            keep_last(Modifiers {
                scale_length: 2.0,
                ..Modifiers::default()
            }),
        ),
        22 => (
            "scale width 2",
            base,
            keep_last(Modifiers {
                scale_width: 2.0,
                ..Modifiers::default()
            }),
        ),
        23 => (
            "scale curvature 0.5",
            base,
            keep_last(Modifiers {
                scale_curvature: 0.5,
                ..Modifiers::default()
            }),
        ),
        24 => (
            "scale curvature 0",
            base,
            keep_last(Modifiers {
                scale_curvature: 0.0,
                ..Modifiers::default()
            }),
        ),
        25 => (
            "reference point, u/v border none",
            Options {
                border_mode_u: BorderMode::None,
                border_mode_v: BorderMode::None,
                ..base
            },
            keep_last(Modifiers {
                reference_point: Some(ReferencePoint {
                    u: 5.0,
                    v: 1.5,
                    x: 100.0,
                    y: 200.0,
                    z: 10.0,
                    heading: None,
                }),
                ..Modifiers::default()
            }),
        ),
        26 => (
            "offset 100/200/10",
            base,
            keep_last(Modifiers {
                ref_line_offset: Some(RefLineOffset {
                    dx: 100.0,
                    dy: 200.0,
                    dz: 10.0,
                    ..RefLineOffset::default()
                }),
                ..Modifiers::default()
            }),
        ),
        27 => (
            "rotate 1.57 about origin, offset 100",
            base,
            keep_last(Modifiers {
                ref_line_offset: Some(RefLineOffset {
                    dx: 100.0,
                    dy: 100.0,
                    dz: 100.0,
                    dphi: 1.57,
                    center_x: 0.0,
                    center_y: 0.0,
                }),
                ..Modifiers::default()
            }),
        ),
        28 => (
            "rotate -40 deg, u/v border zero",
            Options {
                border_mode_u: BorderMode::ExZero,
                border_mode_v: BorderMode::ExZero,
                ..base
            },
            keep_last(Modifiers {
                ref_line_offset: Some(RefLineOffset {
                    dphi: -0.6981317,
                    ..RefLineOffset::default()
                }),
                ..Modifiers::default()
            }),
        ),
        _ => ("defaults", base, file_modifiers),
    };

    Scenario {
        name,
        options,
        modifiers,
    }
}

fn border_u(base: Options, mode: BorderMode) -> Options {
    Options {
        border_mode_u: mode,
        ..base
    }
}

fn border_v(base: Options, mode: BorderMode) -> Options {
    Options {
        border_mode_v: mode,
        ..base
    }
}
