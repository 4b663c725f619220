//! Overview page: every station with its groups and a card per sensor
//! showing the latest reading. Clicking a card opens the history modal.

use chrono::{DateTime, Local, Utc};
use egui::{Context, Ui};
use rust_i18n::t;

use super::Page;
use crate::catalog::CatalogSnapshot;
use crate::frontend::dialogs::{show_dialog, HistoryAction, HistoryContext, HistoryDialog};
use crate::frontend::state::{AppAction, SharedState};
use crate::frontend::widgets::{Sparkline, ValueDisplay};
use crate::history::{HistoryModalState, RecentReadings, SensorKind};
use crate::types::Sensor;

/// Readings drawn in a card's sparkline
const SPARKLINE_POINTS: usize = 30;
const CARD_WIDTH: f32 = 220.0;

#[derive(Debug, Default)]
pub struct OverviewPageState {
    pub recent: RecentReadings,
    /// The initial batch of recent readings arrived
    pub loaded: bool,
    pub history_open: bool,
    pub history: HistoryModalState,
}

impl OverviewPageState {
    /// Replace the recent readings with a freshly loaded batch
    pub fn load(&mut self, recent: RecentReadings) {
        self.recent = recent;
        self.loaded = true;
    }

    /// Show the history modal for a sensor, dropping any previous data
    pub fn open_history(&mut self, history: HistoryModalState) {
        self.history = history;
        self.history_open = true;
    }

    pub fn close_history(&mut self) {
        self.history_open = false;
        self.history = HistoryModalState::default();
    }
}

/// Date and time lines of a card, in local time
pub fn card_timestamp(ts: DateTime<Utc>) -> (String, String) {
    let local = ts.with_timezone(&Local);
    (
        local.format("%d/%m/%Y").to_string(),
        local.format("%H:%M:%S").to_string(),
    )
}

pub struct OverviewPage;

impl Page for OverviewPage {
    type State = OverviewPageState;

    fn render(
        state: &mut Self::State,
        shared: &mut SharedState<'_>,
        ctx: &Context,
    ) -> Vec<AppAction> {
        let mut actions = Vec::new();
        let catalog = shared.catalog;

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.heading(t!("overview.title"));
                if !state.loaded {
                    ui.spinner();
                }
            });
            ui.separator();

            if catalog.stations.is_empty() {
                ui.label(t!("overview.empty"));
                return;
            }

            egui::ScrollArea::vertical().show(ui, |ui| {
                for station in &catalog.stations {
                    egui::CollapsingHeader::new(egui::RichText::new(&station.name).heading())
                        .id_salt(("overview_station", &station.id))
                        .default_open(true)
                        .show(ui, |ui| {
                            for group in catalog.groups_of(&station.id) {
                                ui.strong(&group.name);
                                ui.horizontal_wrapped(|ui| {
                                    for sensor in catalog.sensors_of(&group.id) {
                                        if sensor_card(ui, sensor, catalog, &state.recent) {
                                            actions.push(AppAction::OpenHistory(sensor.id.clone()));
                                        }
                                    }
                                });
                                ui.add_space(6.0);
                            }
                        });
                }
            });
        });

        if state.history_open {
            let was_open = state.history_open;
            let action = show_dialog::<HistoryDialog>(
                ctx,
                &mut state.history_open,
                &mut state.history,
                HistoryContext { catalog },
            );
            if let Some(HistoryAction::SetWindow(window)) = action {
                actions.push(AppAction::SetHistoryWindow(window));
            }
            if was_open && !state.history_open {
                actions.push(AppAction::CloseHistory);
            }
        }

        actions
    }
}

/// Draw one sensor card; returns true when it was clicked
fn sensor_card(ui: &mut Ui, sensor: &Sensor, catalog: &CatalogSnapshot, recent: &RecentReadings) -> bool {
    let kind = SensorKind::from_type_id(&sensor.sensor_type_id);

    let frame = egui::Frame::group(ui.style()).inner_margin(8.0);
    let response = frame
        .show(ui, |ui| {
            ui.set_width(CARD_WIDTH);
            ui.horizontal(|ui| {
                ui.colored_label(kind.color(), kind.icon());
                ui.strong(&sensor.name);
            });

            match recent.latest(&sensor.id) {
                Some(reading) => {
                    ui.add(
                        ValueDisplay::from_f64(t!("analysis.value"), reading.value, 2)
                            .with_unit(catalog.unit_symbol_of(sensor))
                            .with_color(kind.color()),
                    );
                    let (date, time) = card_timestamp(reading.timestamp);
                    ui.weak(format!("{} {}", date, time));
                    ui.add(
                        Sparkline::new(recent.recent_values(&sensor.id, SPARKLINE_POINTS))
                            .with_size(CARD_WIDTH - 16.0, 24.0)
                            .with_color(kind.color()),
                    );
                }
                None => {
                    ui.weak(t!("overview.no_readings"));
                }
            }
        })
        .response
        .interact(egui::Sense::click())
        .on_hover_text(t!("overview.open_history"));

    response.clicked()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::HistoryWindow;
    use chrono::TimeZone;

    #[test]
    fn test_card_timestamp_format() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 1, 10, 5, 9).unwrap();
        let (date, time) = card_timestamp(ts);
        let local = ts.with_timezone(&Local);
        assert_eq!(date, local.format("%d/%m/%Y").to_string());
        assert_eq!(time.len(), 8);
        assert!(time.ends_with(":09"));
    }

    #[test]
    fn test_closing_history_drops_readings() {
        let mut state = OverviewPageState::default();
        let mut modal = HistoryModalState::open("S1", HistoryWindow::Week);
        modal.accept(
            "S1",
            HistoryWindow::Week,
            vec![crate::types::Reading::new("S1", Utc::now(), 1.0)],
        );
        state.open_history(modal);
        assert!(state.history_open);
        assert_eq!(state.history.readings.len(), 1);

        state.close_history();
        assert!(!state.history_open);
        assert!(state.history.readings.is_empty());
    }
}
