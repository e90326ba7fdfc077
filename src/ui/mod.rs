use std::path::{Path, PathBuf};

use egui::{Color32, ComboBox, Frame, Margin, RichText, Ui, Visuals, style::Widgets};
use log::{error, info};

use pawtrack::{
    analysis::{OccupancyGrid, TimeSeries, occupancy},
    config::AppConfig,
    discontinuity::{count_fixed_points, fixed_points},
    filter::{FilterConfig, config::FILTER_CONFIG_FILE_NAME},
    session::{AnalysisSession, Stage},
    tracking::load_tracking_json,
    writer::{timestamped_file_name, write_tracking_json},
};

pub(crate) mod plots;
pub(crate) mod settings_panel;
pub(crate) mod zone_editor;

use settings_panel::{PanelAction, SettingsPanel};
use zone_editor::ZoneEditor;

pub(crate) const PALETTE_BLACK: Color32 = Color32::from_rgb(12, 12, 12);
pub(crate) const PALETTE_BROWN: Color32 = Color32::from_rgb(72, 30, 20);
pub(crate) const PALETTE_MAROON: Color32 = Color32::from_rgb(155, 57, 34);
pub(crate) const PALETTE_ORANGE: Color32 = Color32::from_rgb(242, 97, 63);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum View {
    Coordinates,
    Trajectory,
    Occupancy,
    RepairPreview,
    Zones,
}

impl View {
    const ALL: [View; 5] = [
        View::Coordinates,
        View::Trajectory,
        View::Occupancy,
        View::RepairPreview,
        View::Zones,
    ];

    fn label(&self) -> &'static str {
        match self {
            View::Coordinates => "X/Y over time",
            View::Trajectory => "Trajectory",
            View::Occupancy => "Occupancy",
            View::RepairPreview => "Repair preview",
            View::Zones => "Zones",
        }
    }
}

/// Analysis results for the current selection, rebuilt when it changes.
struct CachedAnalysis {
    key: (Stage, usize, usize, u64),
    series: TimeSeries,
    occupancy: Option<Result<OccupancyGrid, String>>,
    /// Raw positions and the `(frame, x, y)` points the repair filled in
    repair_preview: Option<(TimeSeries, Vec<(usize, f64, f64)>)>,
}

pub(crate) struct PoseViewerApp {
    source_file: Option<PathBuf>,
    session: Option<AnalysisSession>,
    config: AppConfig,
    status: Option<String>,
    error: Option<String>,
    animal: usize,
    bodypart: usize,
    view: View,
    /// Bumped whenever the session data changes
    generation: u64,
    cache: Option<CachedAnalysis>,
    settings: SettingsPanel,
    zone_editor: ZoneEditor,
}

impl PoseViewerApp {
    pub(crate) fn new(config: AppConfig, cc: &eframe::CreationContext<'_>) -> Self {
        cc.egui_ctx.set_visuals(Visuals {
            dark_mode: true,
            hyperlink_color: PALETTE_MAROON,
            faint_bg_color: PALETTE_BLACK,
            extreme_bg_color: PALETTE_BROWN,
            panel_fill: PALETTE_BLACK,
            widgets: Widgets::dark(),
            striped: false,
            ..Default::default()
        });

        Self {
            source_file: None,
            session: None,
            settings: SettingsPanel::new(config.repair.clone()),
            zone_editor: ZoneEditor::new(config.circle_resolution),
            config,
            status: None,
            error: None,
            animal: 0,
            bodypart: 0,
            view: View::Coordinates,
            generation: 0,
            cache: None,
        }
    }

    pub(crate) fn from_file(path: &Path, config: AppConfig, cc: &eframe::CreationContext<'_>) -> Self {
        let mut app = Self::new(config, cc);
        app.load_file(path);
        app
    }

    fn load_file(&mut self, path: &Path) {
        match load_tracking_json(path) {
            Ok(mut tracking) => {
                info!("Viewing {:?}", path);
                if tracking.metadata.fps.is_none() {
                    tracking.metadata.fps = Some(self.config.default_fps);
                }
                self.settings.reset_filter(&tracking);
                self.session = Some(AnalysisSession::new(tracking));
                self.source_file = Some(path.to_path_buf());
                self.animal = 0;
                self.bodypart = 0;
                self.error = None;
                self.status = Some(format!("Loaded {}", path.display()));
                self.data_changed();
            }
            Err(e) => {
                error!("Could not load {:?}: {}", path, e);
                self.error = Some(format!("Could not load {}: {}", path.display(), e));
            }
        }
    }

    fn data_changed(&mut self) {
        self.generation += 1;
        self.cache = None;
    }

    fn show_top_bar(&mut self, ui: &mut Ui) {
        if ui.button("📂 Load Tracking").clicked()
            && let Some(path) = rfd::FileDialog::new()
                .add_filter("tracking data", &["json"])
                .pick_file()
        {
            self.load_file(&path);
        }
    }

    fn handle_action(&mut self, action: PanelAction) {
        match action {
            PanelAction::Repair => self.repair(),
            PanelAction::Filter => {
                let Some(session) = self.session.as_mut() else {
                    return;
                };
                let filtered = session.filter(&self.settings.filter);
                self.status = Some(format!(
                    "Filtered to {} animals",
                    filtered.summary().num_animals
                ));
                self.data_changed();
            }
            PanelAction::LoadFilterConfig => {
                let Some(path) = rfd::FileDialog::new()
                    .add_filter("filter config", &["json"])
                    .pick_file()
                else {
                    return;
                };
                match FilterConfig::load(&path) {
                    Ok(config) => {
                        self.settings.filter = self.settings.filter.clone().with_config(&config);
                        self.status = Some(format!("Loaded {}", path.display()));
                    }
                    Err(e) => {
                        error!("Could not load filter config {:?}: {}", path, e);
                        self.status = Some(format!("Could not load filter config: {e}"));
                    }
                }
            }
            PanelAction::SaveFilterConfig => {
                if let Some(path) = rfd::FileDialog::new()
                    .set_file_name(FILTER_CONFIG_FILE_NAME)
                    .save_file()
                {
                    self.status = Some(match self.settings.filter.to_config().save(&path) {
                        Ok(()) => format!("Saved {}", path.display()),
                        Err(e) => format!("Could not save filter config: {e}"),
                    });
                }
            }
            PanelAction::ExportProcessed => self.export_stage(Stage::Processed),
            PanelAction::ExportFiltered => self.export_stage(Stage::Filtered),
        }
    }

    fn repair(&mut self) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let (fixed, found) = {
            let report = session.repair(&self.settings.repair);
            (report.fixed_discontinuities, report.discontinuities.len())
        };
        let points = session
            .processed()
            .map_or(0, |processed| count_fixed_points(session.raw(), processed));
        info!("Repaired {fixed} of {found} discontinuities, {points} points changed");
        self.status = Some(format!(
            "Fixed {fixed} of {found} discontinuities ({points} points)"
        ));
        self.view = View::RepairPreview;
        self.data_changed();
    }

    /// Processed data is written with interpolated confidences normalized.
    fn export_stage(&mut self, stage: Stage) {
        let Some(data) = self.session.as_ref().and_then(|session| session.stage(stage)) else {
            return;
        };
        let (prefix, normalize) = match stage {
            Stage::Filtered => ("filtered_data", false),
            _ => ("processed_data", true),
        };
        if let Some(path) = rfd::FileDialog::new()
            .set_file_name(timestamped_file_name(prefix, "json", chrono::Local::now()))
            .save_file()
        {
            self.status = Some(match write_tracking_json(&path, data, normalize) {
                Ok(()) => format!("Saved {}", path.display()),
                Err(e) => format!("Export failed: {e}"),
            });
        }
    }

    fn show_selectors(&mut self, ui: &mut Ui) {
        let Some(session) = self.session.as_ref() else {
            return;
        };
        let (stage, data) = session.latest();
        let num_animals = data.summary().num_animals;
        let bodyparts = data.available_bodyparts();

        ui.horizontal(|ui| {
            ui.label(RichText::new(format!("{stage:?} data")).color(PALETTE_ORANGE));
            ui.separator();

            ComboBox::from_label("Animal")
                .selected_text(format!("Animal {}", self.animal + 1))
                .show_ui(ui, |ui| {
                    for animal in 0..num_animals {
                        ui.selectable_value(&mut self.animal, animal, format!("Animal {}", animal + 1));
                    }
                });

            let selected_name = bodyparts
                .iter()
                .find(|(index, _)| *index == self.bodypart)
                .map(|(_, name)| name.clone())
                .unwrap_or_else(|| data.bodypart_name(self.bodypart));
            ComboBox::from_label("Bodypart")
                .selected_text(selected_name)
                .show_ui(ui, |ui| {
                    for (index, name) in &bodyparts {
                        ui.selectable_value(&mut self.bodypart, *index, name.as_str());
                    }
                });

            ui.separator();
            for view in View::ALL {
                ui.selectable_value(&mut self.view, view, view.label());
            }
        });
    }

    fn refresh_cache(&mut self) {
        let Some(session) = self.session.as_ref() else {
            self.cache = None;
            return;
        };
        let (stage, data) = session.latest();
        let key = (stage, self.animal, self.bodypart, self.generation);

        if self.cache.as_ref().is_none_or(|cache| cache.key != key) {
            self.cache = Some(CachedAnalysis {
                key,
                series: TimeSeries::extract(data, self.animal, self.bodypart),
                occupancy: None,
                repair_preview: None,
            });
        }

        if self.view == View::RepairPreview
            && let Some(cache) = self.cache.as_mut()
            && cache.repair_preview.is_none()
        {
            cache.repair_preview = repair_preview_data(session, self.animal, self.bodypart);
        }

        if self.view == View::Occupancy
            && let Some(cache) = self.cache.as_mut()
            && cache.occupancy.is_none()
        {
            cache.occupancy = Some(
                occupancy(&cache.series, self.config.occupancy_grid_size).map_err(|e| e.to_string()),
            );
        }
    }

    fn show_view(&mut self, ui: &mut Ui) {
        let series = self.cache.as_ref().map(|cache| &cache.series);
        match self.view {
            View::Zones => self.zone_editor.show(ui, series),
            View::RepairPreview => match self.cache.as_ref().and_then(|cache| cache.repair_preview.as_ref()) {
                Some((original, fixed)) => {
                    ui.label(format!(
                        "{} points interpolated for this animal and bodypart",
                        fixed.len()
                    ));
                    plots::repair_preview(ui, original, fixed);
                }
                None => {
                    ui.label(RichText::new("Repair gaps to preview the interpolated points").color(Color32::GRAY));
                }
            },
            _ if series.is_none_or(TimeSeries::is_empty) => {
                ui.label(RichText::new("No data for this animal and bodypart").color(Color32::GRAY));
            }
            View::Coordinates => {
                if let Some(series) = series {
                    plots::coordinates_over_time(ui, series);
                }
            }
            View::Trajectory => {
                if let Some(series) = series {
                    plots::trajectory(ui, series, None);
                }
            }
            View::Occupancy => match self.cache.as_ref().and_then(|cache| cache.occupancy.as_ref()) {
                Some(Ok(grid)) => plots::occupancy_heatmap(ui, grid),
                Some(Err(message)) => {
                    ui.colored_label(Color32::RED, message);
                }
                None => {
                    ui.spinner();
                }
            },
        }
    }
}

/// Raw positions of one keypoint and the points the last repair filled in,
/// or `None` before any repair.
fn repair_preview_data(
    session: &AnalysisSession,
    animal: usize,
    bodypart: usize,
) -> Option<(TimeSeries, Vec<(usize, f64, f64)>)> {
    let processed = session.processed()?;
    Some((
        TimeSeries::extract(session.raw(), animal, bodypart),
        fixed_points(session.raw(), processed, animal, bodypart),
    ))
}

impl eframe::App for PoseViewerApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        egui::TopBottomPanel::top("top_bar")
            .frame(Frame::new().inner_margin(Margin::same(4)))
            .show(ctx, |ui| {
                self.show_top_bar(ui);
                self.show_selectors(ui);
            });

        egui::TopBottomPanel::bottom("status_bar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                if let Some(path) = &self.source_file {
                    ui.label(RichText::new(path.display().to_string()).color(Color32::GRAY));
                }
                if let Some(status) = &self.status {
                    ui.separator();
                    ui.label(status);
                }
            });
        });

        if let Some(session) = self.session.as_ref() {
            let mut action = None;
            egui::SidePanel::left("ProcessingSettings")
                .frame(
                    Frame::default()
                        .fill(Color32::TRANSPARENT)
                        .inner_margin(Margin::same(5)),
                )
                .resizable(true)
                .min_width(250.0)
                .max_width(400.0)
                .show(ctx, |ui| {
                    egui::ScrollArea::vertical().show(ui, |ui| {
                        action = self.settings.show(ui, session);
                    });
                });
            if let Some(action) = action {
                self.handle_action(action);
            }
        }

        self.refresh_cache();

        egui::CentralPanel::default().show(ctx, |ui| {
            if let Some(message) = &self.error {
                ui.heading(RichText::new(message).color(Color32::RED).strong());
            }
            if self.session.is_none() && self.view != View::Zones {
                ui.label("Load a tracking file to start, or open the zone editor.");
                ui.selectable_value(&mut self.view, View::Zones, View::Zones.label());
                return;
            }
            self.show_view(ui);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pawtrack::{
        discontinuity::RepairSettings,
        tracking::{Frame, Keypoint, TrackingFile},
    };

    fn gap_session() -> AnalysisSession {
        let frames = [0., f64::NAN, f64::NAN, 3.]
            .into_iter()
            .map(|x| Frame::with_bodyparts(vec![vec![Keypoint::new(x, x, 0.9)]]))
            .collect();
        AnalysisSession::new(TrackingFile::new(frames))
    }

    #[test]
    fn test_repair_preview_shows_interpolated_points() {
        let mut session = gap_session();
        assert!(repair_preview_data(&session, 0, 0).is_none());

        session.repair(&RepairSettings::default());
        let (original, fixed) = repair_preview_data(&session, 0, 0).unwrap();
        assert_eq!(original.valid_points().count(), 2);
        assert_eq!(fixed.len(), 2);
        assert_eq!(fixed[0].0, 1);
        assert!((fixed[0].1 - 1.).abs() < 1e-9);
        assert!((fixed[1].2 - 2.).abs() < 1e-9);

        let processed = session.processed().unwrap();
        assert_eq!(count_fixed_points(session.raw(), processed), fixed.len());
    }
}
