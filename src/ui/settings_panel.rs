use egui::{Color32, ComboBox, DragValue, RichText, Slider, TextEdit, Ui};

use pawtrack::{
    discontinuity::{InterpolationMethod, RepairSettings},
    filter::FilterSettings,
    session::AnalysisSession,
    tracking::TrackingFile,
};

const MAX_GAP_LIMIT: usize = 100;

/// What the user asked the panel to do this frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum PanelAction {
    Repair,
    Filter,
    LoadFilterConfig,
    SaveFilterConfig,
    ExportProcessed,
    ExportFiltered,
}

/// Settings of the repair and filter steps, edited in the side panel.
pub(crate) struct SettingsPanel {
    pub(crate) repair: RepairSettings,
    pub(crate) filter: FilterSettings,
}

impl SettingsPanel {
    pub(crate) fn new(repair: RepairSettings) -> Self {
        Self {
            repair,
            filter: FilterSettings::default(),
        }
    }

    /// Starts the filter settings over from the bodyparts and fps of `data`.
    pub(crate) fn reset_filter(&mut self, data: &TrackingFile) {
        self.filter = FilterSettings::for_data(data);
        self.repair.selected_animals.clear();
    }

    pub(crate) fn show(&mut self, ui: &mut Ui, session: &AnalysisSession) -> Option<PanelAction> {
        let mut action = None;

        egui::CollapsingHeader::new(
            RichText::new("Discontinuities").color(Color32::WHITE).strong(),
        )
        .default_open(true)
        .show(ui, |ui| {
            self.show_repair_settings(ui, session.raw().summary().num_animals);
            if ui.button("🩹 Repair gaps").clicked() {
                action = Some(PanelAction::Repair);
            }
            if let Some(report) = session.last_report() {
                ui.label(RichText::new(report.to_string()).color(Color32::GRAY).small());
            }
            if session.processed().is_some() && ui.button("💾 Export processed").clicked() {
                action = Some(PanelAction::ExportProcessed);
            }
        });

        ui.add_space(5.0);

        egui::CollapsingHeader::new(RichText::new("Filter").color(Color32::WHITE).strong())
            .default_open(true)
            .show(ui, |ui| {
                let (stage, input) = session.filter_input();
                ui.label(RichText::new(format!("Input: {stage:?} data")).color(Color32::GRAY));
                self.show_filter_settings(ui, input.summary().num_animals);

                ui.horizontal(|ui| {
                    if ui.button("📂 Load config").clicked() {
                        action = Some(PanelAction::LoadFilterConfig);
                    }
                    if ui.button("💾 Save config").clicked() {
                        action = Some(PanelAction::SaveFilterConfig);
                    }
                });
                if ui.button("🔍 Apply filter").clicked() {
                    action = Some(PanelAction::Filter);
                }
                if session.filtered().is_some() && ui.button("💾 Export filtered").clicked() {
                    action = Some(PanelAction::ExportFiltered);
                }
            });

        action
    }

    fn show_repair_settings(&mut self, ui: &mut Ui, num_animals: usize) {
        ComboBox::from_label("Interpolation")
            .selected_text(self.repair.method.to_string())
            .show_ui(ui, |ui| {
                for method in [InterpolationMethod::Linear, InterpolationMethod::Nearest] {
                    ui.selectable_value(&mut self.repair.method, method, method.to_string());
                }
            });
        ui.add(Slider::new(&mut self.repair.max_gap, 1..=MAX_GAP_LIMIT).text("Max gap (frames)"));
        ui.add(
            Slider::new(&mut self.repair.interp_confidence, 0.0..=1.0)
                .text("Interpolated confidence"),
        );

        ui.label("Animals");
        ui.horizontal_wrapped(|ui| {
            for animal in 0..num_animals {
                let mut selected = self.repair.is_animal_selected(animal);
                if ui
                    .checkbox(&mut selected, format!("Animal {}", animal + 1))
                    .changed()
                {
                    self.repair.set_animal_selected(animal, selected, num_animals);
                }
            }
        });
    }

    fn show_filter_settings(&mut self, ui: &mut Ui, num_animals: usize) {
        ui.add(Slider::new(&mut self.filter.num_animals, 1..=num_animals.max(1)).text("Animals"));
        ui.add(
            Slider::new(&mut self.filter.confidence_threshold, 0.0..=1.0)
                .text("Confidence threshold"),
        );
        ui.horizontal(|ui| {
            ui.label("Frame rate");
            ui.add(
                DragValue::new(&mut self.filter.fps)
                    .range(1.0..=1000.0)
                    .suffix(" fps"),
            );
        });

        ui.label("Bodyparts");
        for (index, setting) in self.filter.bodyparts.iter_mut() {
            ui.horizontal(|ui| {
                ui.checkbox(&mut setting.include, "");
                ui.add(TextEdit::singleline(&mut setting.name).desired_width(140.0));
                ui.label(RichText::new(format!("#{index}")).color(Color32::GRAY));
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pawtrack::tracking::{Frame, Keypoint};

    #[test]
    fn test_reset_filter_lists_the_data_bodyparts() {
        let tracking = TrackingFile::new(vec![Frame::with_bodyparts(vec![
            vec![Keypoint::new(1., 1., 0.9); 3],
            vec![Keypoint::new(2., 2., 0.9); 3],
        ])]);
        let mut panel = SettingsPanel::new(RepairSettings {
            selected_animals: vec![1],
            ..Default::default()
        });

        panel.reset_filter(&tracking);
        assert_eq!(panel.filter.bodyparts.len(), 3);
        assert!(panel.filter.bodyparts.values().all(|setting| setting.include));
        assert!(panel.repair.selected_animals.is_empty());
    }
}
