use egui::{Color32, Rgba, Stroke, Ui};
use egui_plot::{Legend, Line, MarkerShape, Plot, PlotPoints, Points, Polygon};

use pawtrack::{
    analysis::{Axis, OccupancyGrid, TimeSeries},
    zones::Zone,
};

use super::{PALETTE_MAROON, PALETTE_ORANGE};

const HEAT_LEVELS: usize = 12;
const HEAT_COLD: Color32 = Color32::from_rgb(20, 24, 82);
const HEAT_HOT: Color32 = Color32::from_rgb(250, 230, 60);

/// X and Y coordinates over time, stacked.
pub(crate) fn coordinates_over_time(ui: &mut Ui, series: &TimeSeries) {
    let height = (ui.available_height() / 2.0 - 8.0).max(120.0);
    for (axis, color) in [(Axis::X, PALETTE_ORANGE), (Axis::Y, PALETTE_MAROON)] {
        Plot::new(format!("{axis}_over_time"))
            .height(height)
            .legend(Legend::default())
            .x_axis_label("Time (s)")
            .y_axis_label(format!("{} position", axis.to_string().to_uppercase()))
            .show(ui, |plot_ui| {
                plot_ui.line(
                    Line::new(
                        format!("{} position", axis.to_string().to_uppercase()),
                        PlotPoints::new(series.axis_over_time(axis)),
                    )
                    .color(color),
                );
            });
    }
}

/// Positions against frame index, with the repaired points drawn over the
/// original ones. `fixed` holds `(frame, x, y)`.
pub(crate) fn repair_preview(ui: &mut Ui, original: &TimeSeries, fixed: &[(usize, f64, f64)]) {
    let height = (ui.available_height() / 2.0 - 8.0).max(120.0);
    for axis in [Axis::X, Axis::Y] {
        let label = axis.to_string().to_uppercase();
        let original_points: Vec<[f64; 2]> = original
            .valid_points()
            .map(|row| [row.frame as f64, row.value(axis)])
            .collect();
        let fixed_points: Vec<[f64; 2]> = fixed
            .iter()
            .map(|&(frame, x, y)| {
                let value = match axis {
                    Axis::X => x,
                    Axis::Y => y,
                };
                [frame as f64, value]
            })
            .collect();

        Plot::new(format!("repair_preview_{axis}"))
            .height(height)
            .legend(Legend::default())
            .x_axis_label("Frame")
            .y_axis_label(format!("{label} position"))
            .show(ui, |plot_ui| {
                plot_ui.points(
                    Points::new(format!("Original {label}"), PlotPoints::new(original_points))
                        .color(Color32::LIGHT_BLUE)
                        .radius(2.0),
                );
                plot_ui.points(
                    Points::new(format!("Interpolated {label}"), PlotPoints::new(fixed_points))
                        .shape(MarkerShape::Diamond)
                        .filled(true)
                        .color(Color32::RED)
                        .radius(4.0),
                );
            });
    }
}

/// Path of the valid points, start and end marked.
pub(crate) fn trajectory(ui: &mut Ui, series: &TimeSeries, zone: Option<&Zone>) {
    let path: Vec<[f64; 2]> = series.valid_points().map(|row| [row.x, row.y]).collect();

    Plot::new("trajectory")
        .data_aspect(1.0)
        .legend(Legend::default())
        .show(ui, |plot_ui| {
            if let Some(zone) = zone {
                for polygon in zone_outlines(zone) {
                    plot_ui.polygon(polygon);
                }
            }
            if let (Some(first), Some(last)) = (path.first(), path.last()) {
                plot_ui.points(
                    Points::new("Start", PlotPoints::new(vec![*first]))
                        .color(Color32::GREEN)
                        .radius(5.0),
                );
                plot_ui.points(
                    Points::new("End", PlotPoints::new(vec![*last]))
                        .color(Color32::RED)
                        .radius(5.0),
                );
            }
            plot_ui.line(Line::new("Trajectory", PlotPoints::new(path)).color(PALETTE_ORANGE));
        });
}

/// Density grid drawn as square markers, bucketed into color levels.
pub(crate) fn occupancy_heatmap(ui: &mut Ui, grid: &OccupancyGrid) {
    let max = grid.max_density();
    let mut levels: Vec<Vec<[f64; 2]>> = vec![Vec::new(); HEAT_LEVELS];
    if max > 0.0 {
        for (y, row) in grid.ys.iter().zip(grid.density.iter()) {
            for (x, density) in grid.xs.iter().zip(row.iter()) {
                let level = ((density / max) * (HEAT_LEVELS - 1) as f64).round() as usize;
                // skip the near-empty background
                if level > 0 {
                    levels[level.min(HEAT_LEVELS - 1)].push([*x, *y]);
                }
            }
        }
    }

    Plot::new("occupancy")
        .data_aspect(1.0)
        .show(ui, |plot_ui| {
            for (level, cells) in levels.into_iter().enumerate() {
                if cells.is_empty() {
                    continue;
                }
                plot_ui.points(
                    Points::new(format!("level {level}"), PlotPoints::new(cells))
                        .shape(MarkerShape::Square)
                        .filled(true)
                        .radius(3.0)
                        .color(heat_color(level as f32 / (HEAT_LEVELS - 1) as f32)),
                );
            }
        });
}

/// Zone outline preview.
pub(crate) fn zone_preview(ui: &mut Ui, zone: &Zone) {
    Plot::new("zone_preview")
        .data_aspect(1.0)
        .legend(Legend::default())
        .show(ui, |plot_ui| {
            for polygon in zone_outlines(zone) {
                plot_ui.polygon(polygon);
            }
        });
}

fn zone_outlines(zone: &Zone) -> Vec<Polygon<'static>> {
    zone.shape
        .0
        .iter()
        .flat_map(|polygon| std::iter::once(polygon.exterior()).chain(polygon.interiors()))
        .map(|ring| {
            let points: Vec<[f64; 2]> = ring.coords().map(|c| [c.x, c.y]).collect();
            Polygon::new(zone.name.clone(), PlotPoints::new(points))
                .fill_color(PALETTE_MAROON.gamma_multiply(0.3))
                .stroke(Stroke::new(1.5, PALETTE_ORANGE))
        })
        .collect()
}

fn heat_color(t: f32) -> Color32 {
    Color32::from(egui::lerp(Rgba::from(HEAT_COLD)..=Rgba::from(HEAT_HOT), t))
}
