use egui::{Color32, ComboBox, RichText, TextEdit, Ui};

use pawtrack::{
    analysis::TimeSeries,
    zones::{Zone, ZoneSet, zone_occupancy},
};

use super::plots;

const EXAMPLE_ZONES: &str = "\
# one statement per line
arena = [(0,0),(640,0),(640,480),(0,480)]
center = (320,240,100)
outer = arena - center
";

pub(crate) struct ZoneEditor {
    source: String,
    circle_resolution: usize,
    zones: ZoneSet,
    error: Option<String>,
    selected: Option<String>,
}

impl ZoneEditor {
    pub(crate) fn new(circle_resolution: usize) -> Self {
        let mut editor = Self {
            source: EXAMPLE_ZONES.to_string(),
            circle_resolution,
            zones: ZoneSet::default(),
            error: None,
            selected: None,
        };
        editor.update_zones();
        editor
    }

    /// Re-parses the source. On error the previous zones stay in place.
    fn update_zones(&mut self) {
        match ZoneSet::parse(&self.source, self.circle_resolution) {
            Ok(zones) => {
                let still_defined = self
                    .selected
                    .as_deref()
                    .is_some_and(|name| zones.names().contains(&name));
                if !still_defined {
                    self.selected = zones.names().first().map(|name| name.to_string());
                }
                self.zones = zones;
                self.error = None;
            }
            Err(e) => self.error = Some(e.to_string()),
        }
    }

    pub(crate) fn selected_zone(&self) -> Option<&Zone> {
        self.zones.get(self.selected.as_deref()?).ok()
    }

    pub(crate) fn show(&mut self, ui: &mut Ui, series: Option<&TimeSeries>) {
        ui.horizontal(|ui| {
            ui.vertical(|ui| {
                ui.set_max_width(360.0);
                ui.label(RichText::new("Zone definitions").color(Color32::WHITE).strong());
                ui.add(
                    TextEdit::multiline(&mut self.source)
                        .code_editor()
                        .desired_rows(12)
                        .desired_width(f32::INFINITY),
                );
                if ui.button("Update zones").clicked() {
                    self.update_zones();
                }
                if let Some(error) = &self.error {
                    ui.colored_label(Color32::RED, error);
                }

                ui.separator();
                let selected_text = self.selected.clone().unwrap_or_default();
                ComboBox::from_label("Zone")
                    .selected_text(selected_text)
                    .show_ui(ui, |ui| {
                        for name in self.zones.names() {
                            ui.selectable_value(&mut self.selected, Some(name.to_string()), name);
                        }
                    });

                if let Some(zone) = self.selected_zone() {
                    let (min_x, min_y, max_x, max_y) = zone.bounds();
                    ui.label(format!("Area: {:.2}", zone.area()));
                    ui.label(format!("Perimeter: {:.2}", zone.perimeter()));
                    ui.label(format!(
                        "Bounds: ({min_x:.1}, {min_y:.1}) - ({max_x:.1}, {max_y:.1})"
                    ));
                }

                if let Some(series) = series {
                    ui.separator();
                    ui.label(RichText::new("Time in zones").color(Color32::WHITE).strong());
                    for occupancy in zone_occupancy(series, &self.zones) {
                        ui.label(format!(
                            "{}: {:.1} s ({:.0}%), {} entries",
                            occupancy.zone,
                            occupancy.seconds_inside,
                            occupancy.fraction_inside * 100.0,
                            occupancy.entries
                        ));
                    }
                }
            });

            ui.vertical(|ui| match (self.selected_zone(), series) {
                (Some(zone), Some(series)) => plots::trajectory(ui, series, Some(zone)),
                (Some(zone), None) => plots::zone_preview(ui, zone),
                (None, _) => {
                    ui.label("No zone selected");
                }
            });
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pawtrack::zones::DEFAULT_CIRCLE_RESOLUTION;

    #[test]
    fn test_example_zones_parse() {
        let editor = ZoneEditor::new(DEFAULT_CIRCLE_RESOLUTION);
        assert!(editor.error.is_none());
        assert_eq!(editor.zones.names(), vec!["arena", "center", "outer"]);
        assert_eq!(editor.selected.as_deref(), Some("arena"));
    }

    #[test]
    fn test_errors_keep_previous_zones() {
        let mut editor = ZoneEditor::new(DEFAULT_CIRCLE_RESOLUTION);
        editor.selected = Some("center".to_string());
        editor.source.push_str("broken = center U nowhere\n");
        editor.update_zones();

        assert!(editor.error.as_deref().unwrap().contains("nowhere"));
        assert_eq!(editor.zones.len(), 3);
        assert_eq!(editor.selected_zone().unwrap().name, "center");
    }
}
