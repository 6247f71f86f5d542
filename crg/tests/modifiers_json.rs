//! Modifier and option sets loaded from JSON.

use crg::{BorderMode, Modifiers, NanMode, Options, RefLineContinuation};

#[test]
fn partial_modifier_set_uses_defaults() {
    let json = r#"{
        "scale_z": 1.5,
        "nan_mode": "keep-last",
        "reference_point": { "u": 5.0, "v": 1.5, "x": 100.0, "y": 200.0, "z": 10.0 },
        "ref_line_offset": { "dphi": 0.25 }
    }"#;

    let modifiers: Modifiers = serde_json::from_str(json).unwrap();
    assert_eq!(modifiers.scale_z, 1.5);
    assert_eq!(modifiers.scale_width, 1.0);
    assert_eq!(modifiers.nan_mode, NanMode::KeepLast);

    let point = modifiers.reference_point.unwrap();
    assert_eq!(point.heading, None);
    assert_eq!((point.x, point.y), (100.0, 200.0));

    let offset = modifiers.ref_line_offset.unwrap();
    assert_eq!(offset.dphi, 0.25);
    assert_eq!(offset.center_x, 0.0);
}

#[test]
fn options_round_trip() {
    let options = Options {
        border_mode_u: BorderMode::Reflect,
        smooth_u_end: 2.0,
        ref_line_continuation: RefLineContinuation::CloseTrack,
        ..Options::default()
    };

    let json = serde_json::to_string(&options).unwrap();
    assert!(json.contains("\"reflect\""));
    assert!(json.contains("\"close-track\""));

    let parsed: Options = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, options);
}
