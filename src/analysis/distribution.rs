use std::f64::consts::PI;

use serde::Serialize;

use super::{Axis, TimeSeries, linspace};
use crate::PawtrackError;

pub const DEFAULT_BINS: usize = 50;
/// The density curve is only drawn above this many samples.
const MIN_KDE_SAMPLES: usize = 5;
const KDE_SAMPLES: usize = 1000;

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct HistogramBin {
    pub start: f64,
    pub end: f64,
    pub count: usize,
    /// Count normalised so the histogram area is one
    pub density: f64,
}

/// Value distribution of one coordinate axis.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Distribution {
    pub axis: Axis,
    pub samples: usize,
    pub bins: Vec<HistogramBin>,
    /// Smoothed density as `[value, density]` pairs
    pub kde: Option<Vec<[f64; 2]>>,
}

pub fn distribution(
    series: &TimeSeries,
    axis: Axis,
    bins: usize,
) -> Result<Distribution, PawtrackError> {
    if bins == 0 {
        return Err(PawtrackError::InvalidUserInput {
            field: "bins".to_string(),
            reason: "must be at least 1".to_string(),
        });
    }

    let values: Vec<f64> = series
        .rows
        .iter()
        .map(|row| row.value(axis))
        .filter(|value| value.is_finite())
        .collect();
    if values.is_empty() {
        return Err(PawtrackError::NotEnoughData {
            required: 1,
            found: 0,
        });
    }

    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    // a single repeated value still gets a unit-wide bin around it
    let (start, width) = if max > min {
        (min, (max - min) / bins as f64)
    } else {
        (min - 0.5, 1.0 / bins as f64)
    };

    let mut counts = vec![0usize; bins];
    for value in &values {
        let index = (((value - start) / width) as usize).min(bins - 1);
        counts[index] += 1;
    }
    let total = values.len() as f64;
    let histogram = counts
        .into_iter()
        .enumerate()
        .map(|(i, count)| HistogramBin {
            start: start + width * i as f64,
            end: start + width * (i + 1) as f64,
            count,
            density: count as f64 / (total * width),
        })
        .collect();

    Ok(Distribution {
        axis,
        samples: values.len(),
        bins: histogram,
        kde: density_curve(&values, min, max),
    })
}

/// Gaussian KDE with Scott's bandwidth (`n^(-1/5)` in one dimension).
fn density_curve(values: &[f64], min: f64, max: f64) -> Option<Vec<[f64; 2]>> {
    let n = values.len();
    if n <= MIN_KDE_SAMPLES || max <= min {
        return None;
    }
    let count = n as f64;
    let mean = values.iter().sum::<f64>() / count;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (count - 1.0);
    let bandwidth = variance.sqrt() * count.powf(-1.0 / 5.0);
    if bandwidth <= 0.0 || !bandwidth.is_finite() {
        return None;
    }

    let norm = 1.0 / (count * bandwidth * (2.0 * PI).sqrt());
    Some(
        linspace(min, max, KDE_SAMPLES)
            .into_iter()
            .map(|x| {
                let sum: f64 = values
                    .iter()
                    .map(|v| (-0.5 * ((x - v) / bandwidth).powi(2)).exp())
                    .sum();
                [x, sum * norm]
            })
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracking::test_support::single_track;

    fn series_of(xs: &[f64]) -> TimeSeries {
        let points: Vec<(f64, f64, f64)> = xs.iter().map(|x| (*x, 0., 0.9)).collect();
        TimeSeries::extract(&single_track(&points), 0, 0)
    }

    #[test]
    fn test_histogram_is_a_density() {
        let dist = distribution(&series_of(&[0., 1., 1., 2., 3., 4., 4., 4.]), Axis::X, 4).unwrap();
        assert_eq!(dist.samples, 8);
        assert_eq!(dist.bins.len(), 4);
        assert_eq!(
            dist.bins.iter().map(|b| b.count).collect::<Vec<_>>(),
            vec![1, 2, 1, 4]
        );
        let area: f64 = dist.bins.iter().map(|b| b.density * (b.end - b.start)).sum();
        assert!((area - 1.).abs() < 1e-12);
        assert_eq!(dist.bins[3].end, 4.);
    }

    #[test]
    fn test_kde_needs_more_than_five_samples() {
        let few = distribution(&series_of(&[0., 1., 2., 3., 4.]), Axis::X, 5).unwrap();
        assert!(few.kde.is_none());

        let many = distribution(&series_of(&[0., 1., 2., 3., 4., 5.]), Axis::X, 5).unwrap();
        let curve = many.kde.unwrap();
        assert_eq!(curve.len(), KDE_SAMPLES);
        assert_eq!(curve[0][0], 0.);
        assert_eq!(curve[KDE_SAMPLES - 1][0], 5.);
        assert!(curve.iter().all(|[_, d]| *d > 0.));
    }

    #[test]
    fn test_constant_values_get_one_filled_bin() {
        let dist = distribution(&series_of(&[2.; 10]), Axis::X, 3).unwrap();
        assert_eq!(dist.bins.iter().map(|b| b.count).sum::<usize>(), 10);
        assert!(dist.kde.is_none());
    }

    #[test]
    fn test_missing_values_are_ignored() {
        let dist = distribution(&series_of(&[f64::NAN, 1., f64::NAN]), Axis::X, 2).unwrap();
        assert_eq!(dist.samples, 1);

        assert!(matches!(
            distribution(&series_of(&[f64::NAN]), Axis::X, 2),
            Err(PawtrackError::NotEnoughData { .. })
        ));
        assert!(matches!(
            distribution(&series_of(&[1.]), Axis::Y, 0),
            Err(PawtrackError::InvalidUserInput { .. })
        ));
    }
}
