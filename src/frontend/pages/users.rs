//! Users page: create dashboard users and change their roles.

use chrono::Local;
use egui::Context;
use rust_i18n::t;

use super::Page;
use crate::forms::UserDraft;
use crate::frontend::state::{AppAction, SharedState};
use crate::i18n::role_label;
use crate::types::{Role, User};

#[derive(Debug, Default)]
pub struct UsersPageState {
    pub users: Vec<User>,
    pub loaded: bool,
    pub draft: UserDraft,
    /// Failure of the last creation attempt
    pub form_error: Option<String>,
    /// Confirmation of the last successful creation
    pub form_notice: Option<String>,
    pub pending: bool,
}

impl UsersPageState {
    pub fn set_users(&mut self, users: Vec<User>) {
        self.users = users;
        self.loaded = true;
    }

    /// Build the creation action; an incomplete draft is not submitted
    pub fn submit(&mut self) -> Option<AppAction> {
        if self.pending {
            return None;
        }
        let user = self.draft.validate().ok()?;
        self.pending = true;
        self.form_error = None;
        self.form_notice = None;
        Some(AppAction::CreateUser(user))
    }

    pub fn created(&mut self, email: &str) {
        self.pending = false;
        self.draft = UserDraft::default();
        self.form_notice = Some(t!("users.created", email = email).into_owned());
    }

    pub fn create_failed(&mut self, message: String) {
        self.pending = false;
        self.form_error = Some(message);
    }
}

pub struct UsersPage;

impl Page for UsersPage {
    type State = UsersPageState;

    fn render(
        state: &mut Self::State,
        _shared: &mut SharedState<'_>,
        ctx: &Context,
    ) -> Vec<AppAction> {
        let mut actions = Vec::new();

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.heading(t!("users.title"));
            ui.separator();

            // === New user ===
            ui.strong(t!("users.new_user"));
            egui::Grid::new("new_user_grid")
                .num_columns(2)
                .spacing([10.0, 6.0])
                .show(ui, |ui| {
                    ui.label(t!("users.email"));
                    ui.text_edit_singleline(&mut state.draft.email);
                    ui.end_row();

                    ui.label(t!("users.password"));
                    ui.add(egui::TextEdit::singleline(&mut state.draft.password).password(true));
                    ui.end_row();

                    ui.label(t!("users.role_label"));
                    egui::ComboBox::from_id_salt("new_user_role")
                        .selected_text(role_label(state.draft.role))
                        .show_ui(ui, |ui| {
                            for role in Role::all() {
                                ui.selectable_value(&mut state.draft.role, *role, role_label(*role));
                            }
                        });
                    ui.end_row();
                });

            ui.horizontal(|ui| {
                if state.pending {
                    ui.spinner();
                } else if ui.button(t!("users.create")).clicked() {
                    actions.extend(state.submit());
                }
                if let Some(error) = &state.form_error {
                    ui.colored_label(egui::Color32::RED, error);
                } else if let Some(notice) = &state.form_notice {
                    ui.colored_label(egui::Color32::GREEN, notice);
                }
            });

            ui.separator();

            // === Existing users ===
            if !state.loaded {
                ui.horizontal(|ui| {
                    ui.spinner();
                    ui.label(t!("common.loading"));
                });
                return;
            }
            if state.users.is_empty() {
                ui.weak(t!("common.empty"));
                return;
            }

            egui::ScrollArea::vertical().show(ui, |ui| {
                egui::Grid::new("users_grid")
                    .num_columns(3)
                    .striped(true)
                    .spacing([16.0, 6.0])
                    .show(ui, |ui| {
                        ui.strong(t!("users.email"));
                        ui.strong(t!("users.role_label"));
                        ui.strong(t!("users.created_at"));
                        ui.end_row();

                        for user in &state.users {
                            ui.label(&user.email);
                            let mut role = user.role;
                            egui::ComboBox::from_id_salt(("user_role", &user.id))
                                .selected_text(role_label(role))
                                .show_ui(ui, |ui| {
                                    for option in Role::all() {
                                        ui.selectable_value(&mut role, *option, role_label(*option));
                                    }
                                });
                            if role != user.role {
                                actions.push(AppAction::UpdateRole {
                                    user_id: user.id.clone(),
                                    role,
                                });
                            }
                            ui.label(
                                user.created_at
                                    .with_timezone(&Local)
                                    .format("%d/%m/%Y %H:%M")
                                    .to_string(),
                            );
                            ui.end_row();
                        }
                    });
            });
        });

        actions
    }
}
