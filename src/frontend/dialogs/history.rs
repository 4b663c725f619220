//! History dialog
//!
//! Shows the readings of one sensor over a relative window (1 h to 30 d).
//! Picking another window asks the app to refetch; the data is replaced
//! when the result arrives.

use egui::Ui;
use rust_i18n::t;

use crate::catalog::CatalogSnapshot;
use crate::frontend::dialogs::{Dialog, DialogAction, DialogState, DialogWindowConfig};
use crate::frontend::plot::{ChartSeries, ChartView};
use crate::history::{HistoryModalState, HistoryWindow, SensorKind};
use crate::i18n::tr;

impl DialogState for HistoryModalState {}

/// Actions produced by the history dialog
#[derive(Debug, Clone, PartialEq)]
pub enum HistoryAction {
    /// Refetch with another window
    SetWindow(HistoryWindow),
}

/// Context for rendering
pub struct HistoryContext<'a> {
    pub catalog: &'a CatalogSnapshot,
}

/// The history dialog
pub struct HistoryDialog;

impl Dialog for HistoryDialog {
    type State = HistoryModalState;
    type Action = HistoryAction;
    type Context<'a> = HistoryContext<'a>;

    fn title(state: &Self::State) -> String {
        t!("history.title", sensor = state.sensor_id).into_owned()
    }

    fn window_config() -> DialogWindowConfig {
        DialogWindowConfig {
            default_height: Some(420.0),
            ..DialogWindowConfig::centered_modal(720.0)
        }
    }

    fn render(
        state: &mut Self::State,
        ctx: Self::Context<'_>,
        ui: &mut Ui,
    ) -> DialogAction<Self::Action> {
        let mut action = DialogAction::None;

        let sensor = ctx.catalog.sensor(&state.sensor_id);
        let kind = sensor
            .map(|s| SensorKind::from_type_id(&s.sensor_type_id))
            .unwrap_or(SensorKind::Other);
        let unit = sensor.map(|s| ctx.catalog.unit_symbol_of(s)).unwrap_or("");

        ui.horizontal(|ui| {
            ui.colored_label(kind.color(), kind.icon());
            ui.strong(ctx.catalog.sensor_display_name(&state.sensor_id));
            if !unit.is_empty() {
                ui.label(format!("({})", unit));
            }
        });

        ui.horizontal(|ui| {
            for window in HistoryWindow::all() {
                if ui
                    .selectable_label(state.window == *window, tr(window.label_key()))
                    .clicked()
                    && state.window != *window
                {
                    action = DialogAction::Action(HistoryAction::SetWindow(*window));
                }
            }
        });

        ui.separator();

        if state.loading {
            ui.horizontal(|ui| {
                ui.spinner();
                ui.label(t!("common.loading"));
            });
        } else if state.readings.is_empty() {
            ui.label(t!("history.empty"));
        } else {
            let series = [ChartSeries {
                name: ctx.catalog.sensor_display_name(&state.sensor_id),
                color: kind.color(),
                points: state.points(),
            }];
            let mut view = ChartView {
                show_legend: false,
                time_format: state.window.axis_format(),
                ..ChartView::default()
            };
            let end = chrono::Utc::now();
            let range = (
                state.window.start(end).timestamp() as f64,
                end.timestamp() as f64,
            );
            view.render(ui, "history_plot", &series, Some(range));
        }

        ui.separator();
        if ui.button(t!("common.close")).clicked() {
            return DialogAction::Close;
        }

        action
    }
}
