//! Sign-in page shown while there is no session

use egui::Context;
use rust_i18n::t;

use super::Page;
use crate::backend::mock::{DEMO_EMAIL, DEMO_PASSWORD};
use crate::frontend::state::{AppAction, SharedState};

#[derive(Debug, Default)]
pub struct LoginPageState {
    pub email: String,
    pub password: String,
    /// A sign-in request is in flight
    pub pending: bool,
    /// Message of the last failed attempt
    pub error: Option<String>,
    /// Show the demo credentials
    pub demo_hint: bool,
}

impl LoginPageState {
    /// Build the sign-in action, or `None` while the form is incomplete
    pub fn submit(&mut self) -> Option<AppAction> {
        let email = self.email.trim();
        if email.is_empty() || self.password.is_empty() || self.pending {
            return None;
        }
        self.pending = true;
        self.error = None;
        Some(AppAction::SignIn {
            email: email.to_string(),
            password: self.password.clone(),
        })
    }

    /// The identity service rejected the attempt
    pub fn fail(&mut self, message: String) {
        self.pending = false;
        self.error = Some(message);
    }

    /// Forget the entered credentials
    pub fn clear(&mut self) {
        let demo_hint = self.demo_hint;
        *self = Self {
            demo_hint,
            ..Self::default()
        };
    }
}

pub struct LoginPage;

impl Page for LoginPage {
    type State = LoginPageState;

    fn render(
        state: &mut Self::State,
        _shared: &mut SharedState<'_>,
        ctx: &Context,
    ) -> Vec<AppAction> {
        let mut actions = Vec::new();

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.vertical_centered(|ui| {
                ui.add_space(ui.available_height() * 0.2);
                ui.heading(t!("app.title"));
                ui.add_space(12.0);
                ui.label(t!("login.title"));
                ui.add_space(8.0);

                let width = 260.0;
                ui.add(
                    egui::TextEdit::singleline(&mut state.email)
                        .hint_text(t!("login.email"))
                        .desired_width(width),
                );
                let password = ui.add(
                    egui::TextEdit::singleline(&mut state.password)
                        .hint_text(t!("login.password"))
                        .password(true)
                        .desired_width(width),
                );
                let enter = password.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter));

                ui.add_space(8.0);
                if state.pending {
                    ui.horizontal(|ui| {
                        ui.spinner();
                        ui.label(t!("login.pending"));
                    });
                } else if ui.button(t!("login.submit")).clicked() || enter {
                    actions.extend(state.submit());
                }

                if let Some(error) = &state.error {
                    ui.add_space(8.0);
                    ui.colored_label(egui::Color32::RED, error);
                }

                if state.demo_hint {
                    ui.add_space(16.0);
                    ui.weak(t!("login.demo_hint", email = DEMO_EMAIL, password = DEMO_PASSWORD));
                }
            });
        });

        actions
    }
}
