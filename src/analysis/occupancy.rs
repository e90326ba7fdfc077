use std::f64::consts::PI;

use log::debug;
use serde::Serialize;

use super::{TimeSeries, linspace};
use crate::PawtrackError;

pub const DEFAULT_GRID_SIZE: usize = 100;
/// Share of the larger coordinate range added around the data on every side.
const GRID_MARGIN: f64 = 0.05;

/// Kernel density of positions evaluated on a regular grid.
///
/// `density[row][col]` is the value at `(xs[col], ys[row])`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct OccupancyGrid {
    pub xs: Vec<f64>,
    pub ys: Vec<f64>,
    pub density: Vec<Vec<f64>>,
}

impl OccupancyGrid {
    pub fn max_density(&self) -> f64 {
        self.density
            .iter()
            .flatten()
            .copied()
            .fold(0.0, f64::max)
    }

    /// Width and height of one grid cell.
    pub fn cell_size(&self) -> (f64, f64) {
        let step = |values: &[f64]| match values {
            [first, second, ..] => second - first,
            _ => 0.0,
        };
        (step(&self.xs), step(&self.ys))
    }

    /// The grid point holding the highest density, as `(x, y, density)`.
    pub fn peak(&self) -> Option<(f64, f64, f64)> {
        self.density
            .iter()
            .enumerate()
            .flat_map(|(row, values)| values.iter().enumerate().map(move |(col, d)| (row, col, *d)))
            .max_by(|a, b| a.2.total_cmp(&b.2))
            .map(|(row, col, density)| (self.xs[col], self.ys[row], density))
    }
}

/// Gaussian kernel density estimate of the valid positions of `series`.
///
/// The bandwidth follows Scott's rule (`n^(-1/6)` in two dimensions) applied
/// to the sample covariance of the points.
pub fn occupancy(series: &TimeSeries, grid_size: usize) -> Result<OccupancyGrid, PawtrackError> {
    if grid_size < 2 {
        return Err(PawtrackError::InvalidUserInput {
            field: "grid size".to_string(),
            reason: format!("must be at least 2, got {grid_size}"),
        });
    }

    let points: Vec<(f64, f64)> = series.valid_points().map(|row| (row.x, row.y)).collect();
    let n = points.len();
    if n < 2 {
        return Err(PawtrackError::NotEnoughData {
            required: 2,
            found: n,
        });
    }

    let count = n as f64;
    let mean_x = points.iter().map(|p| p.0).sum::<f64>() / count;
    let mean_y = points.iter().map(|p| p.1).sum::<f64>() / count;
    let (mut sxx, mut syy, mut sxy) = (0.0, 0.0, 0.0);
    for (x, y) in &points {
        let (dx, dy) = (x - mean_x, y - mean_y);
        sxx += dx * dx;
        syy += dy * dy;
        sxy += dx * dy;
    }
    let denominator = count - 1.0;
    let factor_squared = count.powf(-1.0 / 6.0).powi(2);
    let a = sxx / denominator * factor_squared;
    let d = syy / denominator * factor_squared;
    let b = sxy / denominator * factor_squared;

    let determinant = a * d - b * b;
    if !determinant.is_finite() || determinant <= f64::EPSILON * (a * d).max(f64::MIN_POSITIVE) {
        return Err(PawtrackError::DegenerateData {
            reason: "points lie on a line or a single spot".to_string(),
        });
    }
    let (inv_a, inv_b, inv_d) = (d / determinant, -b / determinant, a / determinant);
    let norm = 1.0 / (count * 2.0 * PI * determinant.sqrt());

    let (min_x, max_x) = bounds(points.iter().map(|p| p.0));
    let (min_y, max_y) = bounds(points.iter().map(|p| p.1));
    let margin = GRID_MARGIN * (max_x - min_x).max(max_y - min_y);
    let xs = linspace(min_x - margin, max_x + margin, grid_size);
    let ys = linspace(min_y - margin, max_y + margin, grid_size);

    let density = ys
        .iter()
        .map(|gy| {
            xs.iter()
                .map(|gx| {
                    let sum: f64 = points
                        .iter()
                        .map(|(px, py)| {
                            let (dx, dy) = (gx - px, gy - py);
                            let q = inv_a * dx * dx + 2.0 * inv_b * dx * dy + inv_d * dy * dy;
                            (-0.5 * q).exp()
                        })
                        .sum();
                    sum * norm
                })
                .collect()
        })
        .collect();

    debug!(
        "Estimated occupancy from {} points on a {}x{} grid",
        n, grid_size, grid_size
    );
    Ok(OccupancyGrid { xs, ys, density })
}

fn bounds(values: impl Iterator<Item = f64>) -> (f64, f64) {
    values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::TimeSeriesRow;

    fn series(points: &[(f64, f64)]) -> TimeSeries {
        TimeSeries {
            animal: 0,
            bodypart: 0,
            fps: 1.,
            rows: points
                .iter()
                .enumerate()
                .map(|(frame, (x, y))| TimeSeriesRow {
                    frame,
                    x: *x,
                    y: *y,
                    seconds: frame as f64,
                    minutes: frame as f64 / 60.,
                })
                .collect(),
        }
    }

    fn scattered() -> TimeSeries {
        series(&[
            (0., 0.),
            (1., 0.5),
            (2., 2.),
            (0.5, 1.5),
            (1.5, 1.),
            (f64::NAN, 3.),
            (1., 1.),
        ])
    }

    #[test]
    fn test_grid_shape_and_margins() {
        let grid = occupancy(&scattered(), 20).unwrap();
        assert_eq!(grid.xs.len(), 20);
        assert_eq!(grid.ys.len(), 20);
        assert_eq!(grid.density.len(), 20);
        assert!(grid.density.iter().all(|row| row.len() == 20));

        // both ranges are 2, so the margin is 0.1 on each side
        assert!((grid.xs[0] + 0.1).abs() < 1e-12);
        assert!((grid.xs[19] - 2.1).abs() < 1e-12);
        assert!((grid.ys[0] + 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_density_integrates_to_about_one() {
        let grid = occupancy(&scattered(), DEFAULT_GRID_SIZE).unwrap();
        let (dx, dy) = grid.cell_size();
        let total: f64 = grid.density.iter().flatten().sum::<f64>() * dx * dy;
        // the grid cuts off the tails of the kernels, so the mass is below one
        assert!(total > 0.2 && total < 1.01, "total mass {total}");
        assert!(grid.density.iter().flatten().all(|d| *d >= 0.));
    }

    #[test]
    fn test_peak_is_inside_the_data() {
        let grid = occupancy(&scattered(), 50).unwrap();
        let (x, y, density) = grid.peak().unwrap();
        assert!((0.0..=2.0).contains(&x));
        assert!((0.0..=2.0).contains(&y));
        assert_eq!(density, grid.max_density());
    }

    #[test]
    fn test_not_enough_points() {
        let result = occupancy(&series(&[(1., 1.), (f64::NAN, f64::NAN)]), 10);
        assert!(matches!(
            result,
            Err(PawtrackError::NotEnoughData {
                required: 2,
                found: 1
            })
        ));
    }

    #[test]
    fn test_collinear_points_are_degenerate() {
        let result = occupancy(&series(&[(0., 0.), (1., 1.), (2., 2.), (3., 3.)]), 10);
        assert!(matches!(result, Err(PawtrackError::DegenerateData { .. })));

        let result = occupancy(&series(&[(5., 5.), (5., 5.), (5., 5.)]), 10);
        assert!(matches!(result, Err(PawtrackError::DegenerateData { .. })));
    }

    #[test]
    fn test_grid_size_is_validated() {
        assert!(matches!(
            occupancy(&scattered(), 1),
            Err(PawtrackError::InvalidUserInput { .. })
        ));
    }
}
