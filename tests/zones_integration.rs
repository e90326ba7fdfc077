// Integration tests for zone files and time-in-zone analysis on the sample recording

use std::path::{Path, PathBuf};

use pawtrack::{
    PawtrackError,
    analysis::TimeSeries,
    discontinuity::{self, RepairSettings},
    tracking::load_tracking_json,
    writer::write_zone_occupancy,
    zones::{DEFAULT_CIRCLE_RESOLUTION, ZoneSet, zone_occupancy},
};
use tempfile::TempDir;

fn data_path(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/data").join(name)
}

fn arena() -> ZoneSet {
    ZoneSet::from_file(&data_path("arena_zones.txt"), DEFAULT_CIRCLE_RESOLUTION)
        .expect("Failed to parse arena zones")
}

#[test]
fn test_arena_file_measurements() {
    let zones = arena();
    assert_eq!(
        zones.names(),
        vec!["left_half", "right_half", "nest", "open_field"]
    );

    assert!((zones.area("left_half").unwrap() - 15_000.).abs() < 1e-6);
    assert!((zones.perimeter("left_half").unwrap() - 550.).abs() < 1e-6);

    let nest = zones.area("nest").unwrap();
    assert!((nest - std::f64::consts::PI * 900.).abs() < 5.);

    let open_field = zones.area("open_field").unwrap();
    assert!((open_field - (97_500. - nest)).abs() < 1.);

    let (min_x, min_y, max_x, max_y) = zones.bounds("open_field").unwrap();
    assert!((min_x - 75.).abs() < 1e-6);
    assert!(min_y.abs() < 1e-6);
    assert!((max_x - 400.).abs() < 1e-6);
    assert!((max_y - 300.).abs() < 1e-6);

    assert!(zones.contains("nest", (300., 225.)).unwrap());
    assert!(!zones.contains("open_field", (300., 225.)).unwrap());
    assert!(zones.contains("open_field", (100., 50.)).unwrap());
}

#[test]
fn test_time_in_zones_after_repair() {
    let tracking = load_tracking_json(&data_path("sample_tracking.json")).unwrap();
    let (processed, _) = discontinuity::repair(&tracking, &RepairSettings::default());
    let zones = arena();

    let nose = TimeSeries::extract(&processed, 0, 0);
    let result = zone_occupancy(&nose, &zones);
    assert_eq!(result.len(), 4);

    let left = &result[0];
    assert_eq!(left.zone, "left_half");
    assert_eq!(left.frames_inside, 7);
    assert_eq!(left.entries, 1);
    assert!((left.seconds_inside - 7. / 30.).abs() < 1e-9);
    assert!((left.fraction_inside - 0.7).abs() < 1e-9);

    let right = &result[1];
    assert_eq!(right.frames_inside, 3);
    assert_eq!(right.entries, 1);
    assert_eq!(result[2].frames_inside, 0);
    assert_eq!(result[2].entries, 0);

    // the second animal sits in the nest the whole time
    let resting = TimeSeries::extract(&processed, 1, 0);
    let result = zone_occupancy(&resting, &zones);
    assert_eq!(result[2].frames_inside, 10);
    assert_eq!(result[2].fraction_inside, 1.);
    assert_eq!(result[3].frames_inside, 0);
}

#[test]
fn test_missing_frames_do_not_count_as_visits() {
    let tracking = load_tracking_json(&data_path("sample_tracking.json")).unwrap();
    let nose = TimeSeries::extract(&tracking, 0, 0);
    let result = zone_occupancy(&nose, &arena());

    assert_eq!(result[0].frames_inside, 5);
    assert_eq!(result[0].entries, 1);
    assert!((result[0].fraction_inside - 5. / 8.).abs() < 1e-9);
}

#[test]
fn test_zone_occupancy_csv() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("zones.csv");
    let tracking = load_tracking_json(&data_path("sample_tracking.json")).unwrap();
    let nose = TimeSeries::extract(&tracking, 0, 0);

    write_zone_occupancy(&path, &zone_occupancy(&nose, &arena())).unwrap();
    let written = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = written.lines().collect();
    assert_eq!(
        lines[0],
        "zone,frames_inside,seconds_inside,entries,fraction_inside"
    );
    assert_eq!(lines.len(), 5);
    assert!(lines[1].starts_with("left_half,5,"));
}

#[test]
fn test_zone_file_errors() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("broken.txt");
    std::fs::write(&path, "arena = [(0,0),(10,0),(10,10)]\nboth = arena U pen\n").unwrap();

    let error = ZoneSet::from_file(&path, DEFAULT_CIRCLE_RESOLUTION).unwrap_err();
    assert!(matches!(error, PawtrackError::UnknownZoneReference { .. }));
    assert!(error.to_string().contains("pen"));

    assert!(matches!(
        ZoneSet::from_file(&temp_dir.path().join("absent.txt"), DEFAULT_CIRCLE_RESOLUTION),
        Err(PawtrackError::ZoneFileError { .. })
    ));
    assert!(matches!(
        arena().get("kitchen"),
        Err(PawtrackError::UnknownZone { .. })
    ));
}
