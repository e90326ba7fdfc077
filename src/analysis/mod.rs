// Position time series and the statistics built on top of them

pub mod distribution;
pub mod occupancy;

use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use uom::si::f64::Time;
use uom::si::time::{minute, second};

use crate::PawtrackError;
use crate::tracking::TrackingFile;

pub use distribution::{Distribution, HistogramBin, distribution};
pub use occupancy::{OccupancyGrid, occupancy};

/// One coordinate axis of the position data.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum Axis {
    X,
    Y,
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Axis::X => write!(f, "x"),
            Axis::Y => write!(f, "y"),
        }
    }
}

impl FromStr for Axis {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "x" => Ok(Axis::X),
            "y" => Ok(Axis::Y),
            other => Err(format!("unknown axis '{other}', expected 'x' or 'y'")),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct TimeSeriesRow {
    pub frame: usize,
    pub x: f64,
    pub y: f64,
    pub seconds: f64,
    pub minutes: f64,
}

impl TimeSeriesRow {
    pub fn is_valid(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    pub fn value(&self, axis: Axis) -> f64 {
        match axis {
            Axis::X => self.x,
            Axis::Y => self.y,
        }
    }
}

/// Positions of one bodypart of one animal over time.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TimeSeries {
    pub animal: usize,
    pub bodypart: usize,
    pub fps: f64,
    pub rows: Vec<TimeSeriesRow>,
}

impl TimeSeries {
    /// One row per frame that has the keypoint, missing coordinates included.
    /// Frame times use the fps stored in the metadata.
    pub fn extract(tracking: &TrackingFile, animal: usize, bodypart: usize) -> Self {
        let fps = tracking.fps();
        let rows = tracking
            .frames
            .iter()
            .enumerate()
            .filter_map(|(frame, data)| {
                let keypoint = data.keypoint(animal, bodypart)?;
                let time = Time::new::<second>(frame as f64 / fps);
                Some(TimeSeriesRow {
                    frame,
                    x: keypoint.x,
                    y: keypoint.y,
                    seconds: time.get::<second>(),
                    minutes: time.get::<minute>(),
                })
            })
            .collect();

        Self {
            animal,
            bodypart,
            fps,
            rows,
        }
    }

    /// Like [`TimeSeries::extract`], but rejects indices the data doesn't have.
    pub fn try_extract(
        tracking: &TrackingFile,
        animal: usize,
        bodypart: usize,
    ) -> Result<Self, PawtrackError> {
        let summary = tracking.summary();
        if animal >= summary.num_animals {
            return Err(PawtrackError::IndexOutOfRange {
                what: "animal".to_string(),
                index: animal,
            });
        }
        if bodypart >= summary.num_bodyparts {
            return Err(PawtrackError::IndexOutOfRange {
                what: "bodypart".to_string(),
                index: bodypart,
            });
        }
        Ok(Self::extract(tracking, animal, bodypart))
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows with both coordinates present, i.e. the trajectory.
    pub fn valid_points(&self) -> impl Iterator<Item = &TimeSeriesRow> {
        self.rows.iter().filter(|row| row.is_valid())
    }

    pub fn valid_count(&self) -> usize {
        self.valid_points().count()
    }

    /// Plot series `[seconds, value]` for one axis, missing values skipped.
    pub fn axis_over_time(&self, axis: Axis) -> Vec<[f64; 2]> {
        self.rows
            .iter()
            .map(|row| [row.seconds, row.value(axis)])
            .filter(|[_, value]| value.is_finite())
            .collect()
    }
}

/// `count` evenly spaced values from `start` to `end` inclusive.
pub(crate) fn linspace(start: f64, end: f64, count: usize) -> Vec<f64> {
    match count {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (end - start) / (count - 1) as f64;
            (0..count)
                .map(|i| if i == count - 1 { end } else { start + step * i as f64 })
                .collect()
        }
    }
}
