//! Configuration page: create forms for the five catalog entity types and
//! a list of the existing entries of the active tab.

use egui::{Context, Ui};
use rust_i18n::t;

use super::Page;
use crate::catalog::CatalogSnapshot;
use crate::forms::{ConfigForms, ConfigTab};
use crate::frontend::state::{AppAction, SharedState};
use crate::i18n::tr;

#[derive(Debug, Default)]
pub struct ConfigurationPageState {
    pub forms: ConfigForms,
}

pub struct ConfigurationPage;

impl Page for ConfigurationPage {
    type State = ConfigurationPageState;

    fn render(
        state: &mut Self::State,
        shared: &mut SharedState<'_>,
        ctx: &Context,
    ) -> Vec<AppAction> {
        let mut actions = Vec::new();
        let catalog = shared.catalog;
        let forms = &mut state.forms;

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.heading(t!("config.title"));
            ui.horizontal(|ui| {
                for tab in ConfigTab::all() {
                    ui.selectable_value(&mut forms.tab, *tab, tr(tab.label_key()));
                }
            });
            ui.separator();

            ui.columns(2, |columns| {
                columns[0].strong(t!("config.create"));
                egui::Grid::new("config_form_grid")
                    .num_columns(2)
                    .spacing([10.0, 6.0])
                    .show(&mut columns[0], |ui| render_form(ui, forms, catalog));

                columns[0].add_space(8.0);
                if columns[0].button(t!("config.create")).clicked() {
                    // Incomplete forms are not submitted
                    match forms.validate_active() {
                        Ok(entity) => actions.push(AppAction::Create(entity)),
                        Err(e) => tracing::debug!("Create form incomplete: {}", e),
                    }
                }

                columns[1].strong(t!("config.existing"));
                egui::ScrollArea::vertical()
                    .id_salt("config_existing")
                    .show(&mut columns[1], |ui| render_existing(ui, forms.tab, catalog));
            });
        });

        actions
    }
}

fn text_row(ui: &mut Ui, label_key: &str, value: &mut String) {
    ui.label(tr(label_key));
    ui.text_edit_singleline(value);
    ui.end_row();
}

/// ComboBox over `(id, name)` pairs writing the chosen id
fn reference_row<'a>(
    ui: &mut Ui,
    label_key: &str,
    salt: &str,
    value: &mut String,
    options: impl Iterator<Item = (&'a str, &'a str)>,
) {
    ui.label(tr(label_key));
    let options: Vec<(&str, &str)> = options.collect();
    let selected = options
        .iter()
        .find(|(id, _)| *id == value.as_str())
        .map(|(_, name)| name.to_string())
        .unwrap_or_else(|| tr("config.select"));
    egui::ComboBox::from_id_salt(salt)
        .selected_text(selected)
        .show_ui(ui, |ui| {
            for (id, name) in options {
                ui.selectable_value(value, id.to_string(), format!("{} ({})", name, id));
            }
        });
    ui.end_row();
}

fn render_form(ui: &mut Ui, forms: &mut ConfigForms, catalog: &CatalogSnapshot) {
    match forms.tab {
        ConfigTab::Stations => {
            let draft = &mut forms.station;
            text_row(ui, "config.field.id", &mut draft.id);
            text_row(ui, "config.field.name", &mut draft.name);
        }
        ConfigTab::Groups => {
            let draft = &mut forms.group;
            text_row(ui, "config.field.id", &mut draft.id);
            text_row(ui, "config.field.name", &mut draft.name);
            reference_row(
                ui,
                "config.field.station",
                "group_station",
                &mut draft.station_id,
                catalog.stations.iter().map(|s| (s.id.as_str(), s.name.as_str())),
            );
        }
        ConfigTab::Sensors => {
            let draft = &mut forms.sensor;
            text_row(ui, "config.field.id", &mut draft.id);
            text_row(ui, "config.field.name", &mut draft.name);
            reference_row(
                ui,
                "config.field.group",
                "sensor_group",
                &mut draft.group_id,
                catalog.groups.iter().map(|g| (g.id.as_str(), g.name.as_str())),
            );
            reference_row(
                ui,
                "config.field.sensor_type",
                "sensor_type",
                &mut draft.sensor_type_id,
                catalog.sensor_types.iter().map(|t| (t.id.as_str(), t.name.as_str())),
            );
            reference_row(
                ui,
                "config.field.unit",
                "sensor_unit",
                &mut draft.unit_id,
                catalog.units.iter().map(|u| (u.id.as_str(), u.symbol.as_str())),
            );

            ui.label(tr("config.field.sampling_interval"));
            ui.add(egui::DragValue::new(&mut draft.sampling_interval).range(1..=86_400).suffix(" s"));
            ui.end_row();

            ui.label(tr("config.field.requires_calibration"));
            ui.checkbox(&mut draft.requires_calibration, "");
            ui.end_row();

            if draft.requires_calibration {
                ui.label(tr("config.field.calibration_interval"));
                let interval = draft.recommended_calibration_interval.get_or_insert(365);
                ui.add(egui::DragValue::new(interval).range(1..=3650).suffix(" d"));
                ui.end_row();
            } else {
                draft.recommended_calibration_interval = None;
            }
        }
        ConfigTab::SensorTypes => {
            let draft = &mut forms.sensor_type;
            text_row(ui, "config.field.id", &mut draft.id);
            text_row(ui, "config.field.name", &mut draft.name);
            text_row(ui, "config.field.description", &mut draft.description);
        }
        ConfigTab::Units => {
            let draft = &mut forms.unit;
            text_row(ui, "config.field.id", &mut draft.id);
            text_row(ui, "config.field.name", &mut draft.name);
            text_row(ui, "config.field.symbol", &mut draft.symbol);
            text_row(ui, "config.field.description", &mut draft.description);
        }
    }
}

fn render_existing(ui: &mut Ui, tab: ConfigTab, catalog: &CatalogSnapshot) {
    let rows: Vec<(String, String)> = match tab {
        ConfigTab::Stations => catalog
            .stations
            .iter()
            .map(|s| (s.id.clone(), s.name.clone()))
            .collect(),
        ConfigTab::Groups => catalog
            .groups
            .iter()
            .map(|g| {
                let station = catalog.station(&g.station_id).map_or("?", |s| s.name.as_str());
                (g.id.clone(), format!("{} / {}", station, g.name))
            })
            .collect(),
        ConfigTab::Sensors => catalog
            .sensors
            .iter()
            .map(|s| (s.id.clone(), catalog.sensor_display_name(&s.id)))
            .collect(),
        ConfigTab::SensorTypes => catalog
            .sensor_types
            .iter()
            .map(|t| (t.id.clone(), t.name.clone()))
            .collect(),
        ConfigTab::Units => catalog
            .units
            .iter()
            .map(|u| (u.id.clone(), format!("{} ({})", u.name, u.symbol)))
            .collect(),
    };

    if rows.is_empty() {
        ui.weak(t!("common.empty"));
        return;
    }

    egui::Grid::new("config_existing_grid")
        .num_columns(2)
        .striped(true)
        .show(ui, |ui| {
            for (id, label) in rows {
                ui.monospace(id);
                ui.label(label);
                ui.end_row();
            }
        });
}
