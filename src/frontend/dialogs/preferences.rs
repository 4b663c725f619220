//! Preferences dialog
//!
//! App-wide settings: font scale, dark mode, language, chart and export
//! defaults.

use egui::Ui;
use rust_i18n::t;

use crate::config::settings::{ExportTimeZone, RuntimeSettings};
use crate::config::UiPreferences;
use crate::frontend::dialogs::{Dialog, DialogAction, DialogState, DialogWindowConfig};
use crate::i18n::Language;

/// State for the preferences dialog
#[derive(Debug, Clone, PartialEq)]
pub struct PreferencesState {
    // App-wide (from UiPreferences)
    pub dark_mode: bool,
    pub font_scale: f32,
    pub language: Language,

    // Chart and export (from RuntimeSettings)
    pub show_legend: bool,
    pub show_points: bool,
    pub export_time_zone: ExportTimeZone,
}

impl Default for PreferencesState {
    fn default() -> Self {
        Self::from_config(&UiPreferences::default(), &RuntimeSettings::default())
    }
}

impl PreferencesState {
    /// Create from current preferences and settings
    pub fn from_config(ui_prefs: &UiPreferences, settings: &RuntimeSettings) -> Self {
        Self {
            dark_mode: ui_prefs.dark_mode,
            font_scale: ui_prefs.font_scale,
            language: ui_prefs.language,
            show_legend: settings.show_legend,
            show_points: settings.show_points,
            export_time_zone: settings.export.time_zone,
        }
    }

    /// Write the edited values back
    pub fn apply_to(&self, ui_prefs: &mut UiPreferences, settings: &mut RuntimeSettings) {
        ui_prefs.dark_mode = self.dark_mode;
        ui_prefs.font_scale = self.font_scale;
        ui_prefs.language = self.language;
        settings.show_legend = self.show_legend;
        settings.show_points = self.show_points;
        settings.export.time_zone = self.export_time_zone;
    }
}

impl DialogState for PreferencesState {}

/// Actions produced by the preferences dialog
#[derive(Debug, Clone)]
pub enum PreferencesAction {
    /// Apply preferences
    Apply(PreferencesState),
}

/// Context for rendering
pub struct PreferencesContext;

/// The preferences dialog
pub struct PreferencesDialog;

impl Dialog for PreferencesDialog {
    type State = PreferencesState;
    type Action = PreferencesAction;
    type Context<'a> = PreferencesContext;

    fn title(_state: &Self::State) -> String {
        t!("prefs.title").into_owned()
    }

    fn window_config() -> DialogWindowConfig {
        DialogWindowConfig {
            default_width: 400.0,
            ..Default::default()
        }
    }

    fn render(
        state: &mut Self::State,
        _ctx: Self::Context<'_>,
        ui: &mut Ui,
    ) -> DialogAction<Self::Action> {
        // === Appearance ===
        ui.heading(t!("prefs.appearance"));
        ui.add_space(4.0);

        egui::Grid::new("prefs_appearance_grid")
            .num_columns(2)
            .spacing([10.0, 8.0])
            .show(ui, |ui| {
                ui.label(format!("{}:", t!("nav.language")));
                egui::ComboBox::from_id_salt("language_selector")
                    .selected_text(state.language.display_name())
                    .show_ui(ui, |ui| {
                        for lang in Language::all() {
                            ui.selectable_value(&mut state.language, *lang, lang.display_name());
                        }
                    });
                ui.end_row();

                ui.label(format!("{}:", t!("nav.dark_mode")));
                ui.checkbox(&mut state.dark_mode, "");
                ui.end_row();

                ui.label(format!("{}:", t!("prefs.font_scale")));
                ui.add(egui::Slider::new(&mut state.font_scale, 0.5..=2.0).step_by(0.1));
                ui.end_row();
            });

        ui.add_space(8.0);

        // === Chart & export ===
        ui.heading(t!("prefs.chart"));
        ui.add_space(4.0);

        egui::Grid::new("prefs_chart_grid")
            .num_columns(2)
            .spacing([10.0, 8.0])
            .show(ui, |ui| {
                ui.label(format!("{}:", t!("analysis.legend")));
                ui.checkbox(&mut state.show_legend, "");
                ui.end_row();

                ui.label(format!("{}:", t!("analysis.show_points")));
                ui.checkbox(&mut state.show_points, "");
                ui.end_row();

                ui.label(format!("{}:", t!("analysis.export_zone")));
                egui::ComboBox::from_id_salt("export_zone_selector")
                    .selected_text(state.export_time_zone.to_string())
                    .show_ui(ui, |ui| {
                        for zone in [ExportTimeZone::Local, ExportTimeZone::Utc] {
                            ui.selectable_value(
                                &mut state.export_time_zone,
                                zone,
                                zone.to_string(),
                            );
                        }
                    });
                ui.end_row();
            });

        ui.add_space(8.0);
        ui.separator();
        ui.horizontal(|ui| {
            if ui.button(t!("common.apply")).clicked() {
                return DialogAction::CloseWithAction(PreferencesAction::Apply(state.clone()));
            }
            if ui.button(t!("common.cancel")).clicked() {
                return DialogAction::Close;
            }
            DialogAction::None
        })
        .inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preferences_round_trip() {
        let mut prefs = UiPreferences::default();
        let mut settings = RuntimeSettings::default();

        let mut state = PreferencesState::from_config(&prefs, &settings);
        state.language = Language::Spanish;
        state.show_points = true;
        state.export_time_zone = ExportTimeZone::Utc;
        state.apply_to(&mut prefs, &mut settings);

        assert_eq!(prefs.language, Language::Spanish);
        assert!(settings.show_points);
        assert_eq!(settings.export.time_zone, ExportTimeZone::Utc);
        assert_eq!(PreferencesState::from_config(&prefs, &settings), state);
    }
}
