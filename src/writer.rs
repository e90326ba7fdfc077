use std::{
    fmt,
    fs::File,
    io::{BufWriter, Write},
    path::Path,
    str::FromStr,
};

use chrono::{DateTime, Local};
use log::info;
use serde::Serialize;

use crate::{
    PawtrackError,
    analysis::{OccupancyGrid, TimeSeries},
    discontinuity::normalize_interpolated,
    tracking::TrackingFile,
    zones::ZoneOccupancy,
};

/// File name for a processed-data export, e.g. `processed_data_20250628_134600.json`.
pub fn timestamped_file_name(prefix: &str, extension: &str, at: DateTime<Local>) -> String {
    format!("{}_{}.{}", prefix, at.format("%Y%m%d_%H%M%S"), extension)
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ExportFormat {
    #[default]
    Csv,
    Jsonl,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Jsonl => "jsonl",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.extension())
    }
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "jsonl" | "jsonlines" => Ok(ExportFormat::Jsonl),
            other => Err(format!("unknown export format '{other}', expected 'csv' or 'jsonl'")),
        }
    }
}

/// Writes the wrapped `{data, metadata}` form. With `normalize`, interpolated
/// keypoints are written with full confidence.
pub fn write_tracking_json(
    path: &Path,
    tracking: &TrackingFile,
    normalize: bool,
) -> Result<(), PawtrackError> {
    let file = File::create(path).map_err(|e| PawtrackError::WriterError { source: e })?;
    let mut writer = BufWriter::new(file);
    let written = if normalize {
        serde_json::to_writer_pretty(&mut writer, &normalize_interpolated(tracking))
    } else {
        serde_json::to_writer_pretty(&mut writer, tracking)
    };
    written.map_err(|e| PawtrackError::ExportSerializeError { source: e })?;
    writer
        .flush()
        .map_err(|e| PawtrackError::WriterError { source: e })?;
    info!("Wrote {} frames to {:?}", tracking.num_frames(), path);
    Ok(())
}

/// Export row with missing coordinates left empty.
#[derive(Serialize)]
struct ExportRow {
    frame: usize,
    x: Option<f64>,
    y: Option<f64>,
    seconds: f64,
    minutes: f64,
}

fn export_rows(series: &TimeSeries) -> impl Iterator<Item = ExportRow> + '_ {
    let present = |value: f64| value.is_finite().then_some(value);
    series.rows.iter().map(move |row| ExportRow {
        frame: row.frame,
        x: present(row.x),
        y: present(row.y),
        seconds: row.seconds,
        minutes: row.minutes,
    })
}

pub fn write_time_series(
    path: &Path,
    series: &TimeSeries,
    format: ExportFormat,
) -> Result<(), PawtrackError> {
    match format {
        ExportFormat::Csv => write_csv(path, export_rows(series))?,
        ExportFormat::Jsonl => serde_jsonlines::write_json_lines(path, export_rows(series))
            .map_err(|e| PawtrackError::WriterError { source: e })?,
    }
    info!(
        "Exported {} rows of animal {} bodypart {} to {:?}",
        series.rows.len(),
        series.animal,
        series.bodypart,
        path
    );
    Ok(())
}

#[derive(Serialize)]
struct OccupancyCell {
    x: f64,
    y: f64,
    density: f64,
}

/// One `x,y,density` row per grid point.
pub fn write_occupancy(path: &Path, grid: &OccupancyGrid) -> Result<(), PawtrackError> {
    let cells = grid.ys.iter().zip(grid.density.iter()).flat_map(|(y, row)| {
        grid.xs.iter().zip(row.iter()).map(|(x, density)| OccupancyCell {
            x: *x,
            y: *y,
            density: *density,
        })
    });
    write_csv(path, cells)
}

pub fn write_zone_occupancy(path: &Path, occupancy: &[ZoneOccupancy]) -> Result<(), PawtrackError> {
    write_csv(path, occupancy.iter())
}

fn write_csv<T: Serialize>(
    path: &Path,
    records: impl IntoIterator<Item = T>,
) -> Result<(), PawtrackError> {
    let mut writer =
        csv::Writer::from_path(path).map_err(|e| PawtrackError::CsvExportError { source: e })?;
    for record in records {
        writer
            .serialize(record)
            .map_err(|e| PawtrackError::CsvExportError { source: e })?;
    }
    writer
        .flush()
        .map_err(|e| PawtrackError::WriterError { source: e })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracking::{load_tracking_json, test_support::single_track};
    use chrono::TimeZone;
    use tempfile::TempDir;

    #[test]
    fn test_timestamped_file_name() {
        let at = Local.with_ymd_and_hms(2025, 6, 28, 13, 46, 5).unwrap();
        assert_eq!(
            timestamped_file_name("processed_data", "json", at),
            "processed_data_20250628_134605.json"
        );
    }

    #[test]
    fn test_time_series_csv_leaves_missing_values_empty() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("series.csv");
        let tracking = single_track(&[(1.5, 2., 0.9), (f64::NAN, f64::NAN, 0.)]);
        let series = TimeSeries::extract(&tracking, 0, 0);

        write_time_series(&path, &series, ExportFormat::Csv).unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = written.lines().collect();
        assert_eq!(lines[0], "frame,x,y,seconds,minutes");
        assert_eq!(lines[1], "0,1.5,2.0,0.0,0.0");
        assert!(lines[2].starts_with("1,,,"));
    }

    #[test]
    fn test_time_series_jsonl() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("series.jsonl");
        let tracking = single_track(&[(1., 2., 0.9), (f64::NAN, 4., 0.)]);
        let series = TimeSeries::extract(&tracking, 0, 0);

        write_time_series(&path, &series, ExportFormat::Jsonl).unwrap();
        let rows: Vec<serde_json::Value> = serde_jsonlines::json_lines(&path)
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["x"], 1.);
        assert!(rows[1]["x"].is_null());
        assert_eq!(rows[1]["y"], 4.);
    }

    #[test]
    fn test_tracking_json_normalizes_interpolated_points() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("processed.json");
        let mut tracking = single_track(&[(1., 1., 0.51), (2., 2., 0.7)]);
        tracking.metadata.interp_confidence = Some(0.51);

        write_tracking_json(&path, &tracking, true).unwrap();
        let loaded = load_tracking_json(&path).unwrap();
        assert_eq!(loaded.keypoint(0, 0, 0).unwrap().confidence, 1.);
        assert_eq!(loaded.keypoint(1, 0, 0).unwrap().confidence, 0.7);
        assert_eq!(loaded.metadata.interp_confidence, Some(0.51));
    }

    #[test]
    fn test_occupancy_rows() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("occupancy.csv");
        let grid = OccupancyGrid {
            xs: vec![0., 1.],
            ys: vec![10., 20.],
            density: vec![vec![0.1, 0.2], vec![0.3, 0.4]],
        };
        write_occupancy(&path, &grid).unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            written.lines().collect::<Vec<_>>(),
            vec!["x,y,density", "0.0,10.0,0.1", "1.0,10.0,0.2", "0.0,20.0,0.3", "1.0,20.0,0.4"]
        );
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!("CSV".parse::<ExportFormat>(), Ok(ExportFormat::Csv));
        assert_eq!("jsonl".parse::<ExportFormat>(), Ok(ExportFormat::Jsonl));
        assert!("xlsx".parse::<ExportFormat>().is_err());
    }
}
