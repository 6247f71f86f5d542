//! End-to-end behaviour of data sets and contact points.

use std::f64::consts::PI;
use std::sync::Arc;

use crg::{
    BorderMode, CrgError, CurvatureMode, DataSet, DataSetRegistry, GridStore, Modifiers, Options,
    RefLineContinuation, RefLineOffset, ReferencePoint,
};

/// Winding road with banking and an uneven lateral grid.
fn winding_road() -> GridStore {
    let n = 401;
    let du = 0.25;
    let curvatures: Vec<f64> = (0..n)
        .map(|i| 0.04 * (2.0 * PI * i as f64 / 160.0).sin())
        .collect();

    GridStore::builder(du, n)
        .lateral_offsets(vec![-3.5, -1.75, -0.5, 0.0, 0.5, 1.75, 3.5])
        .elevation_fn(|u, v| 0.01 * (u * 1.3).sin() * (1.0 + 0.2 * v) + 0.004 * v * v)
        .reference_elevation((0..n).map(|i| 250.0 + 0.02 * i as f64 * du).collect())
        .bank((0..n).map(|i| 0.03 * (i as f64 / 50.0).cos()).collect())
        .curvatures(-20.0, 35.0, 0.7, curvatures)
        .build()
        .unwrap()
}

fn sample_points() -> Vec<(f64, f64)> {
    let mut points = Vec::new();
    for i in 1..60 {
        let u = 0.05 + i as f64 * 1.6583;
        for v in [-3.4, -2.0, -0.3, 0.0, 0.9, 2.2, 3.4] {
            points.push((u, v));
        }
    }
    points
}

#[test]
fn round_trip_reproduces_local_coordinates() {
    let data_set = DataSet::new(winding_road());
    let mut cp = data_set.contact_point();

    for (u, v) in sample_points() {
        let (x, y) = cp.to_world(u, v).unwrap();
        let (u2, v2) = cp.to_local(x, y).unwrap();
        assert!((u2 - u).abs() < 1e-5, "u: {} vs {}", u, u2);
        assert!((v2 - v).abs() < 1e-5, "v: {} vs {}", v, v2);
    }
}

#[test]
fn round_trip_without_cache_locality() {
    let data_set = DataSet::new(winding_road());
    let mut cp = data_set.contact_point();

    // Alternate between both ends so that the cached guess is always far away.
    let points = sample_points();
    let (front, back) = points.split_at(points.len() / 2);
    for (a, b) in front.iter().zip(back.iter().rev()) {
        for &(u, v) in [a, b] {
            let (x, y) = cp.to_world(u, v).unwrap();
            let (u2, v2) = cp.to_local(x, y).unwrap();
            assert!((u2 - u).abs() < 1e-5);
            assert!((v2 - v).abs() < 1e-5);
        }
    }
}

#[test]
fn world_elevation_matches_direct_elevation() {
    let data_set = DataSet::new(winding_road());
    let mut cp = data_set.contact_point();

    for (u, v) in sample_points() {
        let direct = cp.elevation_at(u, v).unwrap();
        let (x, y) = cp.to_world(u, v).unwrap();
        let via_world = cp.world_to_elevation(x, y).unwrap();
        assert!((direct - via_world).abs() < 1e-4);
    }
}

#[test]
fn border_modes_at_end_of_data() {
    let store = GridStore::builder(0.5, 41)
        .lateral_offsets(vec![-1.0, 1.0])
        .elevation_fn(|u, v| (u * 0.7).sin() + 0.1 * v)
        .build()
        .unwrap();
    let data_set = DataSet::new(store);
    let (u_min, u_max) = data_set.u_range();
    let length = u_max - u_min;
    let eps = 0.3;
    let u = u_max + eps;
    let v = 0.4;

    let mut cp = data_set.contact_point();
    let at = |cp: &mut crg::ContactPoint, u: f64| {
        cp.set_options(Options::default()).unwrap();
        cp.elevation_at(u, v).unwrap()
    };
    let edge = at(&mut cp, u_max);
    let wrapped = at(&mut cp, u - length);
    let mirrored = at(&mut cp, 2.0 * u_max - u);

    let mut with_mode = |mode: BorderMode| {
        cp.set_options(Options {
            border_mode_u: mode,
            ..Options::default()
        })
        .unwrap();
        cp.elevation_at(u, v)
    };

    assert!(matches!(
        with_mode(BorderMode::None),
        Err(CrgError::OutOfDomain { .. })
    ));
    assert!((with_mode(BorderMode::ExKeep).unwrap() - edge).abs() < 1e-9);
    assert!((with_mode(BorderMode::Repeat).unwrap() - wrapped).abs() < 1e-6);
    assert!((with_mode(BorderMode::Reflect).unwrap() - mirrored).abs() < 1e-6);
}

#[test]
fn reapplying_modifiers_starts_from_raw_data() {
    let a = Modifiers {
        scale_z: 5.0,
        scale_curvature: 0.3,
        scale_width: 2.0,
        ..Modifiers::default()
    };
    let b = Modifiers {
        scale_slope: 0.5,
        ref_line_offset: Some(RefLineOffset {
            dx: 10.0,
            dy: -3.0,
            dz: 1.0,
            dphi: 0.4,
            center_x: 5.0,
            center_y: 5.0,
        }),
        ..Modifiers::default()
    };

    let mut sequential = DataSet::new(winding_road());
    sequential.apply_modifiers(a.clone()).unwrap();
    sequential.apply_modifiers(b.clone()).unwrap();

    let direct = DataSet::with_modifiers(winding_road(), b).unwrap();
    assert_eq!(**sequential.effective(), **direct.effective());

    let mut twice = DataSet::new(winding_road());
    twice.apply_modifiers(a.clone()).unwrap();
    let once = Arc::clone(twice.effective());
    twice.apply_modifiers(a).unwrap();
    assert_eq!(**twice.effective(), *once);
}

#[test]
fn zero_curvature_scale_gives_straight_line_of_same_length() {
    let data_set = DataSet::with_modifiers(
        winding_road(),
        Modifiers {
            scale_curvature: 0.0,
            ..Modifiers::default()
        },
    )
    .unwrap();

    let mut cp = data_set.contact_point();
    cp.set_options(Options {
        curvature_mode: CurvatureMode::RefLine,
        ..Options::default()
    })
    .unwrap();

    let (u_min, u_max) = data_set.u_range();
    let start = cp.to_world(u_min, 0.0).unwrap();
    let end = cp.to_world(u_max, 0.0).unwrap();
    let chord = ((end.0 - start.0).powi(2) + (end.1 - start.1).powi(2)).sqrt();
    assert!((chord - (u_max - u_min)).abs() < 1e-9);

    for k in 0..10 {
        let (_, curvature) = cp.heading_and_curvature(k as f64 * 9.0, 1.0).unwrap();
        assert_eq!(curvature, 0.0);
    }
}

#[test]
fn elevation_scale_doubles_every_sample() {
    let raw = DataSet::new(winding_road());
    let scaled = DataSet::with_modifiers(
        winding_road(),
        Modifiers {
            scale_z: 2.0,
            ..Modifiers::default()
        },
    )
    .unwrap();

    let mut cp_raw = raw.contact_point();
    let mut cp_scaled = scaled.contact_point();
    let store = raw.raw();
    let (u_first, du) = (store.u_first(), store.u_increment());

    for station in (0..store.station_count()).step_by(7) {
        for &v in store.lateral_offsets() {
            let u = u_first + station as f64 * du;
            let z = cp_raw.elevation_at(u, v).unwrap();
            let z2 = cp_scaled.elevation_at(u, v).unwrap();
            assert!((z2 - 2.0 * z).abs() < 1e-4, "{} vs {}", z2, z);

            assert_eq!(cp_raw.to_world(u, v).unwrap(), cp_scaled.to_world(u, v).unwrap());
        }
    }
}

#[test]
fn reference_point_repositions_road() {
    let raw = DataSet::new(winding_road());
    let moved = DataSet::with_modifiers(
        winding_road(),
        Modifiers {
            reference_point: Some(ReferencePoint {
                u: 5.0,
                v: 1.5,
                x: 100.0,
                y: 200.0,
                z: 10.0,
                heading: None,
            }),
            ..Modifiers::default()
        },
    )
    .unwrap();

    let mut cp = moved.contact_point();
    let (x, y) = cp.to_world(5.0, 1.5).unwrap();
    assert!((x - 100.0).abs() < 1e-9);
    assert!((y - 200.0).abs() < 1e-9);

    // Surface relative to the reference line elevation is unchanged.
    let mut cp_raw = raw.contact_point();
    let relative = cp_raw.elevation_at(5.0, 1.5).unwrap() - raw.effective().reference_elevation()[20];
    let z = cp.elevation_at(5.0, 1.5).unwrap();
    assert!((z - (10.0 + relative)).abs() < 1e-4);

    let (u, v) = cp.to_local(100.0, 200.0).unwrap();
    assert!((u - 5.0).abs() < 1e-6);
    assert!((v - 1.5).abs() < 1e-6);
}

#[test]
fn cache_hits_grow_along_advancing_path() {
    let data_set = DataSet::new(winding_road());
    let mut cp = data_set.contact_point();
    let points: Vec<_> = (0..200)
        .map(|i| cp.to_world(2.0 + i as f64 * 0.45, -0.8).unwrap())
        .collect();

    let mut last_u = f64::NEG_INFINITY;
    let mut last_hits = 0;
    for (i, (x, y)) in points.into_iter().enumerate() {
        let (u, _) = cp.to_local(x, y).unwrap();
        assert!(u >= last_u);
        last_u = u;

        let hits = cp.perf_stats().cache_hits;
        if i > 0 {
            assert!(hits > last_hits);
        }
        last_hits = hits;
    }
}

#[test]
fn closed_track_wraps_around() {
    // Full circle of radius 30.
    let n = 361;
    let radius = 30.0;
    let du = 2.0 * PI * radius / (n - 1) as f64;
    let store = GridStore::builder(du, n)
        .lateral_offsets(vec![-2.0, 2.0])
        .elevation_fn(|u, _| (u / radius).sin())
        .curvatures(radius, 0.0, PI / 2.0, vec![1.0 / radius; n])
        .build()
        .unwrap();
    let data_set = DataSet::new(store);
    let (_, u_max) = data_set.u_range();

    let mut cp = data_set
        .contact_point_with(Options {
            ref_line_continuation: RefLineContinuation::CloseTrack,
            ..Options::default()
        })
        .unwrap();

    let a = cp.to_world(10.0, 1.0).unwrap();
    let b = cp.to_world(u_max + 10.0, 1.0).unwrap();
    assert!((a.0 - b.0).abs() < 1e-6 && (a.1 - b.1).abs() < 1e-6);

    let z = cp.elevation_at(u_max + 10.0, 1.0).unwrap();
    let z0 = cp.elevation_at(10.0, 1.0).unwrap();
    assert!((z - z0).abs() < 1e-6);

    // Walk once around the loop and past the seam.
    for i in 0..80 {
        let u = i as f64 * 3.0;
        let (x, y) = cp.to_world(u, -1.0).unwrap();
        let (u2, v2) = cp.to_local(x, y).unwrap();
        let expected = u.rem_euclid(u_max);
        let diff = (u2 - expected).abs();
        assert!(diff < 1e-5 || (diff - u_max).abs() < 1e-5, "{} vs {}", u2, expected);
        assert!((v2 + 1.0).abs() < 1e-5);
    }
}

#[test]
fn unknown_handles_fail_without_side_effects() {
    let registry = DataSetRegistry::new();
    let id = registry.insert(winding_road()).unwrap();
    registry.release(id).unwrap();

    assert!(matches!(
        registry.create_contact_point(id),
        Err(CrgError::UnknownDataSet { .. })
    ));
    assert!(registry
        .apply_modifiers(id, Modifiers::default())
        .is_err());
    assert_eq!(registry.stats().entry_count, 0);
}

/// 50 m straight, half turn of radius 10, 50 m straight back. The two legs
/// are 20 m apart and carry different elevations.
fn hairpin() -> DataSet {
    let du = 0.25;
    let radius = 10.0;
    let bend = PI * radius;
    let length = 100.0 + bend;
    let n = (length / du).round() as usize + 1;
    let headings: Vec<f64> = (0..n)
        .map(|i| ((i as f64 * du - 50.0) / radius).clamp(0.0, PI))
        .collect();

    let store = GridStore::builder(du, n)
        .lateral_offsets(vec![-2.0, 0.0, 2.0])
        .elevation_fn(|u, _| if u < 0.5 * length { 1.0 } else { 5.0 })
        .headings(0.0, 0.0, headings)
        .build()
        .unwrap();
    DataSet::new(store)
}

#[test]
fn cached_solution_on_other_leg_is_not_trusted() {
    let data_set = hairpin();
    let (_, u_max) = data_set.u_range();
    let mut cp = data_set.contact_point();

    let (x, y) = cp.to_world(20.0, 1.0).unwrap();
    let (bx, by) = cp.to_world(u_max - 20.0, 0.5).unwrap();

    // Leave the cache on the return leg, right across from (x, y).
    cp.to_local(bx, by).unwrap();
    let (u, v) = cp.to_local(x, y).unwrap();
    assert!((u - 20.0).abs() < 1e-5, "u = {}", u);
    assert!((v - 1.0).abs() < 1e-5, "v = {}", v);

    cp.to_local(bx, by).unwrap();
    let direct = cp.elevation_at(20.0, 1.0).unwrap();
    let via_world = cp.world_to_elevation(x, y).unwrap();
    assert!((direct - 1.0).abs() < 1e-6);
    assert!((via_world - direct).abs() < 1e-4);

    // Same answer as a contact point without history.
    let mut fresh = data_set.contact_point();
    let (u2, v2) = fresh.to_local(x, y).unwrap();
    assert!((u2 - u).abs() < 1e-9 && (v2 - v).abs() < 1e-9);
}

#[test]
fn cache_still_serves_nearby_queries_on_hairpin() {
    let data_set = hairpin();
    let (_, u_max) = data_set.u_range();
    let mut cp = data_set.contact_point();

    let mut u = 1.0;
    while u < u_max - 1.0 {
        let (x, y) = cp.to_world(u, -1.5).unwrap();
        let (u2, v2) = cp.to_local(x, y).unwrap();
        assert!((u2 - u).abs() < 1e-5 && (v2 + 1.5).abs() < 1e-5);
        u += 0.7;
    }
    let stats = cp.perf_stats();
    assert_eq!(stats.scan_fallbacks, 1);
    assert_eq!(stats.cache_hits, stats.inverse_queries - 1);
}
