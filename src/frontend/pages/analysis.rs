//! Analysis page: pick up to five sensors from the station tree, choose a
//! time range and plot the merged readings. The merged table can be
//! exported to CSV.

use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use egui::{Context, Ui};
use rust_i18n::t;

use super::Page;
use crate::aggregator::{ReadingAggregator, TimeWindow};
use crate::catalog::CatalogSnapshot;
use crate::config::settings::RuntimeSettings;
use crate::frontend::plot::{build_series, ChartView};
use crate::frontend::state::{AppAction, SharedState};
use crate::frontend::widgets::ColorSwatch;
use crate::selection::{line_color, NavigationState, MAX_SELECTED_SENSORS};

/// Format of the start/end inputs, in local time
pub const RANGE_INPUT_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Quick range buttons, in hours
const QUICK_RANGES: [i64; 4] = [1, 6, 24, 168];

/// Parse a `YYYY-MM-DD HH:MM` local time
pub fn parse_local_minute(input: &str) -> Option<DateTime<Utc>> {
    let naive = NaiveDateTime::parse_from_str(input.trim(), RANGE_INPUT_FORMAT).ok()?;
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|local| local.with_timezone(&Utc))
}

pub fn format_local_minute(ts: DateTime<Utc>) -> String {
    ts.with_timezone(&Local).format(RANGE_INPUT_FORMAT).to_string()
}

#[derive(Debug, Default)]
pub struct AnalysisPageState {
    pub aggregator: ReadingAggregator,
    pub navigation: NavigationState,
    pub start_input: String,
    pub end_input: String,
    /// Window the inputs were last filled from
    synced_window: Option<TimeWindow>,
    pub invalid_range: bool,
    pub chart: ChartView,
    /// Outcome of the last export
    pub export_status: Option<String>,
}

impl AnalysisPageState {
    /// Refill the inputs when the window changed elsewhere
    fn sync_inputs(&mut self, window: TimeWindow) {
        if self.synced_window != Some(window) {
            self.start_input = format_local_minute(window.start);
            self.end_input = format_local_minute(window.end);
            self.synced_window = Some(window);
            self.invalid_range = false;
        }
    }

    /// Parse the inputs into a window; `None` for unparsable or reversed input
    pub fn parse_inputs(&self) -> Option<TimeWindow> {
        let start = parse_local_minute(&self.start_input)?;
        let end = parse_local_minute(&self.end_input)?;
        let window = TimeWindow::new(start, end);
        window.is_valid().then_some(window)
    }
}

pub struct AnalysisPage;

impl Page for AnalysisPage {
    type State = AnalysisPageState;

    fn render(
        state: &mut Self::State,
        shared: &mut SharedState<'_>,
        ctx: &Context,
    ) -> Vec<AppAction> {
        let mut actions = Vec::new();
        let catalog = shared.catalog;
        state.sync_inputs(shared.settings.analysis_window);

        egui::SidePanel::left("analysis_sensor_tree")
            .resizable(true)
            .default_width(240.0)
            .show(ctx, |ui| {
                ui.heading(t!("analysis.sensors"));
                ui.label(t!(
                    "analysis.selected",
                    count = state.aggregator.selection().len(),
                    max = MAX_SELECTED_SENSORS
                ));
                ui.separator();
                egui::ScrollArea::vertical().show(ui, |ui| {
                    render_sensor_tree(ui, state, catalog, &mut actions);
                });
            });

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.heading(t!("analysis.title"));
            render_range_controls(ui, state, shared.settings, &mut actions);
            ui.separator();
            render_chart_controls(ui, state, shared.settings, &mut actions);
            ui.separator();

            if state.aggregator.selection().is_empty() {
                ui.centered_and_justified(|ui| {
                    ui.label(t!("analysis.no_selection"));
                });
            } else if state.aggregator.is_loading() {
                ui.horizontal(|ui| {
                    ui.spinner();
                    ui.label(t!("common.loading"));
                });
            } else {
                let series = build_series(
                    state.aggregator.table(),
                    state.aggregator.selected(),
                    catalog,
                );
                let window = shared.settings.analysis_window;
                state.chart.update_from_settings(shared.settings);
                state.chart.render(
                    ui,
                    "analysis_plot",
                    &series,
                    Some((window.start.timestamp() as f64, window.end.timestamp() as f64)),
                );
                shared.settings.autoscale_x = state.chart.auto_scale_x;
            }
        });

        actions
    }
}

fn render_sensor_tree(
    ui: &mut Ui,
    state: &mut AnalysisPageState,
    catalog: &CatalogSnapshot,
    actions: &mut Vec<AppAction>,
) {
    let full = state.aggregator.selection().is_full();

    for station in &catalog.stations {
        let expanded = state.navigation.is_station_expanded(&station.id);
        let arrow = if expanded { "▼" } else { "▶" };
        if ui.selectable_label(false, format!("{} {}", arrow, station.name)).clicked() {
            state.navigation.toggle_station(&station.id);
        }
        if !expanded {
            continue;
        }

        ui.indent(("analysis_station", &station.id), |ui| {
            for group in catalog.groups_of(&station.id) {
                let expanded = state.navigation.is_group_expanded(&group.id);
                let arrow = if expanded { "▼" } else { "▶" };
                if ui.selectable_label(false, format!("{} {}", arrow, group.name)).clicked() {
                    state.navigation.toggle_group(&group.id);
                }
                if !expanded {
                    continue;
                }

                ui.indent(("analysis_group", &group.id), |ui| {
                    for sensor in catalog.sensors_of(&group.id) {
                        let index = state.aggregator.selection().index_of(&sensor.id);
                        let mut checked = index.is_some();
                        ui.horizontal(|ui| {
                            let enabled = checked || !full;
                            let response =
                                ui.add_enabled(enabled, egui::Checkbox::new(&mut checked, &sensor.name));
                            if response.changed() {
                                actions.push(AppAction::ToggleSensor(sensor.id.clone()));
                            }
                            if let Some(index) = index {
                                ui.add(ColorSwatch::new(line_color(index)));
                            }
                        });
                    }
                });
            }
        });
    }
}

fn render_range_controls(
    ui: &mut Ui,
    state: &mut AnalysisPageState,
    settings: &RuntimeSettings,
    actions: &mut Vec<AppAction>,
) {
    ui.horizontal(|ui| {
        for hours in QUICK_RANGES {
            if ui.button(t!("analysis.last_hours", hours = hours)).clicked() {
                actions.push(AppAction::SetAnalysisWindow(TimeWindow::last_hours(
                    hours,
                    Utc::now(),
                )));
            }
        }
    });

    ui.horizontal(|ui| {
        ui.label(t!("analysis.start"));
        ui.add(egui::TextEdit::singleline(&mut state.start_input).desired_width(130.0));
        ui.label(t!("analysis.end"));
        ui.add(egui::TextEdit::singleline(&mut state.end_input).desired_width(130.0));

        if ui.button(t!("analysis.apply")).clicked() {
            match state.parse_inputs() {
                Some(window) => {
                    state.invalid_range = false;
                    if window != settings.analysis_window {
                        actions.push(AppAction::SetAnalysisWindow(window));
                    }
                }
                None => state.invalid_range = true,
            }
        }
        if state.invalid_range {
            ui.colored_label(egui::Color32::RED, t!("analysis.invalid_window"));
        }
    });
}

fn render_chart_controls(
    ui: &mut Ui,
    state: &mut AnalysisPageState,
    settings: &mut RuntimeSettings,
    actions: &mut Vec<AppAction>,
) {
    ui.horizontal(|ui| {
        if ui.selectable_label(settings.lock_x, t!("analysis.lock_x")).clicked() {
            settings.toggle_lock_x();
        }
        if ui.selectable_label(settings.lock_y, t!("analysis.lock_y")).clicked() {
            settings.toggle_lock_y();
        }
        if ui.button(t!("analysis.reset_view")).clicked() {
            settings.reset_view();
        }
        ui.checkbox(&mut settings.show_points, t!("analysis.show_points"));
        ui.checkbox(&mut settings.show_legend, t!("analysis.legend"));

        ui.separator();
        let can_export = !state.aggregator.selection().is_empty();
        if ui
            .add_enabled(can_export, egui::Button::new(t!("analysis.export")))
            .clicked()
        {
            actions.push(AppAction::ExportCsv);
        }
        if let Some(status) = &state.export_status {
            ui.weak(status);
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_local_minute() {
        let ts = parse_local_minute("2024-03-01 10:05").unwrap();
        let local = ts.with_timezone(&Local);
        assert_eq!(local.format("%Y-%m-%d %H:%M").to_string(), "2024-03-01 10:05");
        assert_eq!(format_local_minute(ts), "2024-03-01 10:05");

        assert!(parse_local_minute(" 2024-03-01 10:05 ").is_some());
        assert!(parse_local_minute("2024-03-01").is_none());
        assert!(parse_local_minute("01/03/2024 10:05").is_none());
    }

    #[test]
    fn test_reversed_range_is_rejected() {
        let state = AnalysisPageState {
            start_input: "2024-03-02 00:00".into(),
            end_input: "2024-03-01 00:00".into(),
            ..Default::default()
        };
        assert_eq!(state.parse_inputs(), None);

        let state = AnalysisPageState {
            start_input: "2024-03-01 00:00".into(),
            end_input: "2024-03-01 00:00".into(),
            ..Default::default()
        };
        let window = state.parse_inputs().unwrap();
        assert_eq!(window.start, window.end);
    }

    #[test]
    fn test_inputs_follow_window_changes() {
        let mut state = AnalysisPageState::default();
        let window = TimeWindow::last_hours(6, Utc::now());
        state.sync_inputs(window);
        assert_eq!(state.start_input, format_local_minute(window.start));

        // Edits survive while the window is unchanged
        state.start_input = "typing".into();
        state.sync_inputs(window);
        assert_eq!(state.start_input, "typing");
    }
}
