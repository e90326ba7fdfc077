// Error types for pawtrack

use snafu::Snafu;
use std::io;

#[derive(Debug, Snafu)]
pub enum PawtrackError {
    // Tracking data import errors
    #[snafu(display("Tracking file not found: {path}"))]
    TrackingFileNotFound { path: String },
    #[snafu(display("Error reading tracking file"))]
    TrackingLoaderError { source: io::Error },
    #[snafu(display("Invalid tracking data: {source}"))]
    InvalidTrackingData { source: serde_json::Error },
    #[snafu(display("No {what} with index {index} in the tracking data"))]
    IndexOutOfRange { what: String, index: usize },

    // Export errors
    #[snafu(display("Error writing export file"))]
    WriterError { source: io::Error },
    #[snafu(display("Error serializing export data"))]
    ExportSerializeError { source: serde_json::Error },
    #[snafu(display("Error writing CSV export"))]
    CsvExportError { source: csv::Error },

    // Config management errors
    #[snafu(display("Could not find application data directory to save config file"))]
    NoConfigDir,
    #[snafu(display("Error reading or writing config file"))]
    ConfigIOError { source: io::Error },
    #[snafu(display("Error parsing config file"))]
    ConfigSerializeError { source: serde_json::Error },

    // Analysis errors
    #[snafu(display("Not enough valid data points: need at least {required}, found {found}"))]
    NotEnoughData { required: usize, found: usize },
    #[snafu(display("Data points are degenerate ({reason}), density cannot be estimated"))]
    DegenerateData { reason: String },

    // Zone DSL errors
    #[snafu(display("Syntax error on line {line}: {text:?}"))]
    ZoneSyntax { line: usize, text: String },
    #[snafu(display("Invalid expression for '{name}' on line {line}: {expr:?}"))]
    ZoneExpression {
        name: String,
        line: usize,
        expr: String,
    },
    #[snafu(display("Invalid coords for '{name}' on line {line}: {reason}"))]
    ZoneCoordinates {
        name: String,
        line: usize,
        reason: String,
    },
    #[snafu(display("Polygon '{name}' is invalid on line {line}: {reason}"))]
    InvalidPolygon {
        name: String,
        line: usize,
        reason: String,
    },
    #[snafu(display("Invalid circle '{name}' on line {line}: {reason}"))]
    InvalidCircle {
        name: String,
        line: usize,
        reason: String,
    },
    #[snafu(display("Unknown zone '{zone}' referenced on line {line}"))]
    UnknownZoneReference { zone: String, line: usize },
    #[snafu(display("Resulting zone '{name}' is empty on line {line}"))]
    EmptyZone { name: String, line: usize },
    #[snafu(display("Zone '{name}' not found"))]
    UnknownZone { name: String },
    #[snafu(display("Error reading zone definition file"))]
    ZoneFileError { source: io::Error },

    // Viewer errors
    #[snafu(display("Could not start the viewer: {message}"))]
    ViewerError { message: String },

    // User input validation errors
    #[snafu(display("Invalid user input: {field} - {reason}"))]
    InvalidUserInput { field: String, reason: String },
}
