//! Frontend module for egui UI
//!
//! This module provides the main UI components using eframe/egui.
//! It receives results and live readings from the backend through
//! crossbeam channels and sends commands back the same way.
//!
//! # Architecture
//!
//! One page is shown at a time (overview, analysis, configuration, users),
//! or the sign-in page while there is no session. Pages render from
//! borrowed [`SharedState`] and return [`AppAction`]s; the app handles the
//! actions and turns them into backend commands.
//!
//! # Main Types
//!
//! - [`StationMonitorApp`] - Main application state implementing [`eframe::App`]
//! - [`ChartView`] - Plot configuration and rendering
//!
//! # Submodules
//!
//! - `pages` - Full-page views
//! - `dialogs` - History modal and preferences
//! - `plot` - Plot rendering with egui_plot
//! - `widgets` - Custom UI widgets (status indicators, sparklines, etc.)

pub mod dialogs;
pub mod pages;
mod plot;
pub mod state;
mod status_bar;
pub mod widgets;

pub use plot::{build_series, format_time, ChartSeries, ChartView};
pub use state::{AppAction, SharedState, View};
pub use status_bar::{render_status_bar, StatusBarContext};
pub use widgets::*;

use dialogs::{show_dialog, PreferencesAction, PreferencesContext, PreferencesDialog, PreferencesState};
use pages::{
    AnalysisPage, AnalysisPageState, ConfigurationPage, ConfigurationPageState, LoginPage,
    LoginPageState, OverviewPage, OverviewPageState, Page, UsersPage, UsersPageState,
};

use crate::aggregator::{default_export_file_name, to_csv, ExportColumn};
use crate::backend::{BackendCommand, BackendMessage, FrontendReceiver, SessionUser};
use crate::catalog::CatalogSnapshot;
use crate::config::settings::{ExportTimeZone, RuntimeSettings};
use crate::config::AppState;
use crate::history::{HistoryModalState, RecentReadings, RECENT_READINGS_LIMIT};
use crate::i18n::tr;
use crate::selection::ToggleOutcome;
use crate::types::{BackendStats, FeedStatus};
use rust_i18n::t;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Repaint interval while live data may arrive
const REPAINT_INTERVAL: Duration = Duration::from_millis(200);

/// Main application state for the station monitor
pub struct StationMonitorApp {
    // === Communication ===
    frontend: FrontendReceiver,
    backend_name: String,
    backend_alive: bool,

    // === Shared State ===
    app_state: AppState,
    settings: RuntimeSettings,
    catalog: Arc<CatalogSnapshot>,
    session: Option<SessionUser>,
    feeds: HashMap<String, FeedStatus>,
    stats: BackendStats,
    last_error: Option<String>,

    // === Pages ===
    view: View,
    login: LoginPageState,
    overview: OverviewPageState,
    analysis: AnalysisPageState,
    configuration: ConfigurationPageState,
    users: UsersPageState,

    // === Dialogs ===
    preferences_open: bool,
    preferences_state: PreferencesState,
}

impl StationMonitorApp {
    /// Create a new application instance
    pub fn new(
        cc: &eframe::CreationContext<'_>,
        frontend: FrontendReceiver,
        app_state: AppState,
    ) -> Self {
        apply_ui_preferences(&cc.egui_ctx, &app_state);

        // The session decides whether the dashboard or the sign-in form shows
        frontend.load_session();

        Self {
            frontend,
            backend_name: String::new(),
            backend_alive: true,
            view: app_state.last_view,
            app_state,
            settings: RuntimeSettings::default(),
            catalog: Arc::new(CatalogSnapshot::default()),
            session: None,
            feeds: HashMap::new(),
            stats: BackendStats::default(),
            last_error: None,
            login: LoginPageState::default(),
            overview: OverviewPageState::default(),
            analysis: AnalysisPageState::default(),
            configuration: ConfigurationPageState::default(),
            users: UsersPageState::default(),
            preferences_open: false,
            preferences_state: PreferencesState::default(),
        }
    }

    fn process_backend_messages(&mut self) -> bool {
        let messages = self.frontend.drain();
        let had_messages = !messages.is_empty();

        for msg in messages {
            match msg {
                BackendMessage::Ready { backend } => {
                    tracing::info!("Backend ready: {}", backend);
                    self.login.demo_hint = backend == "mock";
                    self.backend_name = backend;
                }
                BackendMessage::Session(user) => self.set_session(user),
                BackendMessage::AuthError(err) => {
                    self.login.fail(err);
                }
                BackendMessage::Catalog(catalog) => {
                    self.catalog = catalog;
                }
                BackendMessage::RecentReadings(readings) => {
                    tracing::debug!("Loaded {} recent readings", readings.len());
                    self.overview.load(RecentReadings::from_readings(readings));
                }
                BackendMessage::Readings { per_sensor } => {
                    self.analysis.aggregator.finish_fetch(per_sensor);
                }
                BackendMessage::ReadingsFailed(err) => {
                    tracing::warn!("Reading fetch failed: {}", err);
                    self.analysis.aggregator.fail_fetch();
                }
                BackendMessage::History {
                    sensor_id,
                    window,
                    readings,
                } => {
                    if self.overview.history_open {
                        self.overview.history.accept(&sensor_id, window, readings);
                    }
                }
                BackendMessage::HistoryFailed { sensor_id } => {
                    if self.overview.history.sensor_id == sensor_id {
                        self.overview.history.loading = false;
                    }
                }
                BackendMessage::FeedStatus { channel, status } => {
                    self.feeds.insert(channel, status);
                }
                BackendMessage::ReadingInserted { channel, reading } => {
                    match channel.as_str() {
                        "overview" => self.overview.recent.push(reading),
                        "analysis" => {
                            self.analysis.aggregator.apply_insert(reading);
                        }
                        other => tracing::debug!("Reading on unknown channel {}", other),
                    }
                }
                BackendMessage::Created { table } => {
                    tracing::info!("Created a row in {}", table);
                    self.configuration.forms.reset(table);
                }
                BackendMessage::Users(users) => {
                    self.users.set_users(users);
                }
                BackendMessage::UserCreated { email } => {
                    self.users.created(&email);
                }
                BackendMessage::UserCreateFailed(err) => {
                    self.users.create_failed(err);
                }
                BackendMessage::RoleUpdated { user_id, role } => {
                    tracing::info!("User {} is now {}", user_id, role);
                }
                BackendMessage::Stats(stats) => {
                    self.stats = stats;
                }
                BackendMessage::Shutdown => {
                    tracing::info!("Backend shutdown received");
                    self.backend_alive = false;
                    self.last_error = Some(t!("app.backend_stopped").into_owned());
                }
            }
        }

        had_messages
    }

    fn set_session(&mut self, user: Option<SessionUser>) {
        match (self.session.is_some(), user) {
            (false, Some(user)) => {
                tracing::info!("Signed in as {}", user.email.as_deref().unwrap_or(&user.id));
                self.session = Some(user);
                self.login.clear();
                self.mount_view(self.view);
            }
            (true, Some(user)) => {
                self.session = Some(user);
            }
            (true, None) => {
                tracing::info!("Signed out");
                self.unmount_view(self.view);
                self.reset_dashboard();
            }
            (false, None) => {
                self.login.pending = false;
            }
        }
    }

    /// Drop everything loaded for the previous session
    fn reset_dashboard(&mut self) {
        self.session = None;
        self.catalog = Arc::new(CatalogSnapshot::default());
        self.feeds.clear();
        self.overview = OverviewPageState::default();
        self.analysis = AnalysisPageState::default();
        self.configuration = ConfigurationPageState::default();
        self.users = UsersPageState::default();
        self.login.clear();
    }

    /// Load the data a view needs and start its change feed
    fn mount_view(&mut self, view: View) {
        tracing::debug!("Mounting {:?}", view);
        self.frontend.refresh_catalog();
        if let Some(channel) = view.feed_channel() {
            self.frontend.subscribe(channel);
        }
        match view {
            View::Overview => {
                self.frontend.send_command(BackendCommand::FetchRecentReadings {
                    limit: RECENT_READINGS_LIMIT,
                });
            }
            View::Analysis => {
                self.settings.restart_analysis_window(chrono::Utc::now());
                self.fetch_analysis();
            }
            View::Users => {
                self.frontend.send_command(BackendCommand::FetchUsers);
            }
            View::Configuration => {}
        }
    }

    fn unmount_view(&mut self, view: View) {
        if let Some(channel) = view.feed_channel() {
            self.frontend.unsubscribe(channel);
        }
        if view == View::Overview {
            self.overview.close_history();
        }
    }

    /// Fetch the readings of every selected sensor over the current window
    fn fetch_analysis(&mut self) {
        let sensors = self.analysis.aggregator.selected().to_vec();
        if sensors.is_empty() {
            return;
        }
        self.analysis.aggregator.begin_fetch();
        self.frontend.send_command(BackendCommand::FetchReadings {
            sensors,
            window: self.settings.analysis_window,
        });
    }

    fn fetch_history(&self) {
        let history = &self.overview.history;
        self.frontend.send_command(BackendCommand::FetchHistory {
            sensor_id: history.sensor_id.clone(),
            window: history.window,
        });
    }

    fn handle_action(&mut self, ctx: &egui::Context, action: AppAction) {
        match action {
            AppAction::SignIn { email, password } => {
                self.frontend.sign_in(email, password);
            }
            AppAction::SignOut => {
                self.frontend.sign_out();
            }
            AppAction::SwitchView(view) => {
                if view != self.view {
                    self.unmount_view(self.view);
                    self.view = view;
                    self.app_state.last_view = view;
                    self.mount_view(view);
                }
            }
            AppAction::RefreshCatalog => {
                self.frontend.refresh_catalog();
            }
            AppAction::OpenHistory(sensor_id) => {
                self.overview
                    .open_history(HistoryModalState::open(sensor_id, self.app_state.history_window));
                self.fetch_history();
            }
            AppAction::SetHistoryWindow(window) => {
                if self.overview.history.set_window(window) {
                    self.app_state.history_window = window;
                    self.fetch_history();
                }
            }
            AppAction::CloseHistory => {
                self.overview.close_history();
            }
            AppAction::ToggleSensor(sensor_id) => {
                if self.analysis.aggregator.toggle(&sensor_id) != ToggleOutcome::Ignored {
                    self.fetch_analysis();
                }
            }
            AppAction::SetAnalysisWindow(window) => {
                if self.settings.set_analysis_window(window) {
                    self.settings.reset_view();
                    self.fetch_analysis();
                }
            }
            AppAction::ExportCsv => self.export_csv(),
            AppAction::Create(entity) => {
                self.frontend.send_command(BackendCommand::Create(entity));
            }
            AppAction::CreateUser(user) => {
                self.frontend.send_command(BackendCommand::CreateUser(user));
            }
            AppAction::UpdateRole { user_id, role } => {
                self.frontend
                    .send_command(BackendCommand::UpdateRole { user_id, role });
            }
            AppAction::OpenPreferences => {
                self.preferences_state =
                    PreferencesState::from_config(&self.app_state.ui_preferences, &self.settings);
                self.preferences_open = true;
                ctx.request_repaint();
            }
        }
    }

    /// Write the merged analysis table to a user-chosen CSV file
    fn export_csv(&mut self) {
        let Some(path) = rfd::FileDialog::new()
            .add_filter("CSV", &["csv"])
            .set_file_name(default_export_file_name())
            .save_file()
        else {
            return;
        };

        let columns: Vec<ExportColumn> = self
            .analysis
            .aggregator
            .selected()
            .iter()
            .map(|id| ExportColumn::new(id.clone(), self.catalog.sensor_display_name(id)))
            .collect();
        let table = self.analysis.aggregator.table();
        let csv = match self.settings.export.time_zone {
            ExportTimeZone::Local => to_csv(table, &columns, &chrono::Local),
            ExportTimeZone::Utc => to_csv(table, &columns, &chrono::Utc),
        };

        self.analysis.export_status = Some(match std::fs::write(&path, csv) {
            Ok(()) => {
                tracing::info!("Exported {} rows to {:?}", table.len(), path);
                t!("analysis.exported", path = path.display().to_string()).into_owned()
            }
            Err(e) => {
                tracing::error!("CSV export to {:?} failed: {}", path, e);
                t!("analysis.export_failed", error = e.to_string()).into_owned()
            }
        });
    }

    fn render_top_bar(&mut self, ctx: &egui::Context) -> Vec<AppAction> {
        let mut actions = Vec::new();

        egui::TopBottomPanel::top("menu_bar").show(ctx, |ui| {
            egui::MenuBar::new().ui(ui, |ui| {
                ui.strong(t!("app.title"));
                ui.separator();

                for view in View::all() {
                    if ui
                        .selectable_label(self.view == *view, tr(view.label_key()))
                        .clicked()
                    {
                        actions.push(AppAction::SwitchView(*view));
                    }
                }

                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    if ui.button(t!("nav.sign_out")).clicked() {
                        actions.push(AppAction::SignOut);
                    }
                    if ui.button(t!("nav.preferences")).clicked() {
                        actions.push(AppAction::OpenPreferences);
                    }
                    if let Some(email) = self.session.as_ref().and_then(|u| u.email.as_deref()) {
                        ui.weak(email);
                    }
                });
            });
        });

        actions
    }

    fn render_status_bar(&self, ctx: &egui::Context) {
        egui::TopBottomPanel::bottom("status_bar").show(ctx, |ui| {
            let status = StatusBarContext {
                backend_name: &self.backend_name,
                feed_status: self.session.as_ref().and_then(|_| {
                    self.view
                        .feed_channel()
                        .map(|channel| self.feeds.get(channel).copied().unwrap_or_default())
                }),
                stats: &self.stats,
                signed_in_as: self.session.as_ref().and_then(|u| u.email.as_deref()),
                last_error: self.last_error.as_deref(),
            };
            render_status_bar(ui, &status);
        });
    }

    fn render_page(&mut self, ctx: &egui::Context) -> Vec<AppAction> {
        let feed_status = self
            .view
            .feed_channel()
            .and_then(|channel| self.feeds.get(channel).copied())
            .unwrap_or_default();

        let mut shared = SharedState {
            catalog: &self.catalog,
            settings: &mut self.settings,
            app_state: &mut self.app_state,
            user: self.session.as_ref(),
            feed_status,
            stats: &self.stats,
            last_error: &mut self.last_error,
        };

        if self.session.is_none() {
            return LoginPage::render(&mut self.login, &mut shared, ctx);
        }

        match self.view {
            View::Overview => OverviewPage::render(&mut self.overview, &mut shared, ctx),
            View::Analysis => AnalysisPage::render(&mut self.analysis, &mut shared, ctx),
            View::Configuration => {
                ConfigurationPage::render(&mut self.configuration, &mut shared, ctx)
            }
            View::Users => UsersPage::render(&mut self.users, &mut shared, ctx),
        }
    }

    fn render_preferences(&mut self, ctx: &egui::Context) {
        if let Some(PreferencesAction::Apply(prefs)) = show_dialog::<PreferencesDialog>(
            ctx,
            &mut self.preferences_open,
            &mut self.preferences_state,
            PreferencesContext,
        ) {
            prefs.apply_to(&mut self.app_state.ui_preferences, &mut self.settings);
            apply_ui_preferences(ctx, &self.app_state);
            if let Err(e) = self.app_state.save() {
                tracing::warn!("Failed to save app state: {}", e);
            }
        }
    }
}

/// Apply theme, zoom and language from the saved preferences
fn apply_ui_preferences(ctx: &egui::Context, app_state: &AppState) {
    let prefs = &app_state.ui_preferences;
    ctx.set_visuals(if prefs.dark_mode {
        egui::Visuals::dark()
    } else {
        egui::Visuals::light()
    });
    ctx.set_zoom_factor(prefs.font_scale);
    crate::i18n::set_language(prefs.language);
}

impl eframe::App for StationMonitorApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let had_messages = self.process_backend_messages();

        if had_messages {
            ctx.request_repaint();
        } else if self.backend_alive {
            ctx.request_repaint_after(REPAINT_INTERVAL);
        }

        let mut actions = Vec::new();
        if self.session.is_some() {
            actions.extend(self.render_top_bar(ctx));
        }
        self.render_status_bar(ctx);
        actions.extend(self.render_page(ctx));

        self.render_preferences(ctx);

        for action in actions {
            self.handle_action(ctx, action);
        }
    }

    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        self.unmount_view(self.view);
        self.frontend.shutdown();

        self.app_state.last_view = self.view;
        if let Err(e) = self.app_state.save() {
            tracing::warn!("Failed to save app state: {}", e);
        }
    }
}
