//! Integration tests for frontend state management
//!
//! These tests validate the SharedState container and the page state
//! transitions driven by backend messages.

mod common;

use common::builders::{at, reading, CatalogBuilder};
use station_monitor::config::settings::RuntimeSettings;
use station_monitor::config::AppState;
use station_monitor::forms::UserDraft;
use station_monitor::frontend::pages::{LoginPageState, OverviewPageState, UsersPageState};
use station_monitor::frontend::state::{AppAction, SharedState, View};
use station_monitor::history::{HistoryModalState, HistoryWindow, RecentReadings};
use station_monitor::types::{BackendStats, FeedStatus, Role};
use station_monitor::TimeWindow;

#[test]
fn test_shared_state_borrows_app_fields() {
    let catalog = CatalogBuilder::new().sensor("S1", "Boiler 1").build();
    let mut settings = RuntimeSettings::default();
    let mut app_state = AppState::default();
    let stats = BackendStats::default();
    let mut last_error = None;

    let shared = SharedState {
        catalog: &catalog,
        settings: &mut settings,
        app_state: &mut app_state,
        user: None,
        feed_status: FeedStatus::Disconnected,
        stats: &stats,
        last_error: &mut last_error,
    };

    // Pages write through the borrowed settings
    let window = TimeWindow::new(at(0), at(60));
    assert!(shared.settings.set_analysis_window(window));
    *shared.last_error = Some("boom".into());
    assert_eq!(shared.catalog.sensor_display_name("S1"), "Boiler 1");

    assert_eq!(settings.analysis_window, window);
    assert_eq!(last_error.as_deref(), Some("boom"));
}

#[test]
fn test_views_and_channels() {
    let channels: Vec<_> = View::all().iter().filter_map(|v| v.feed_channel()).collect();
    assert_eq!(channels, vec!["overview", "analysis"]);
    assert_eq!(View::default(), View::Overview);
}

#[test]
fn test_login_submit_and_failure() {
    let mut login = LoginPageState::default();
    assert_eq!(login.submit(), None);

    login.email = "  demo@example.com ".into();
    login.password = "demo".into();
    assert_eq!(
        login.submit(),
        Some(AppAction::SignIn {
            email: "demo@example.com".into(),
            password: "demo".into(),
        })
    );
    // A second click while pending does nothing
    assert_eq!(login.submit(), None);

    login.fail("Invalid login credentials".into());
    assert!(!login.pending);
    assert_eq!(login.error.as_deref(), Some("Invalid login credentials"));

    login.demo_hint = true;
    login.clear();
    assert!(login.email.is_empty());
    assert!(login.error.is_none());
    assert!(login.demo_hint);
}

#[test]
fn test_overview_live_readings_and_history() {
    let mut overview = OverviewPageState::default();
    overview.load(RecentReadings::from_readings(vec![
        reading("S1", 2, 3.0),
        reading("S1", 1, 2.0),
        reading("S2", 0, 9.0),
    ]));
    assert!(overview.loaded);
    assert_eq!(overview.recent.latest("S1").map(|r| r.value), Some(3.0));

    overview.recent.push(reading("S1", 3, 4.0));
    assert_eq!(overview.recent.recent_values("S1", 2), vec![3.0, 4.0]);

    overview.open_history(HistoryModalState::open("S1", HistoryWindow::Day));
    assert!(overview.history_open);
    assert!(overview.history.loading);

    // A late result for another sensor is dropped
    assert!(!overview
        .history
        .accept("S2", HistoryWindow::Day, vec![reading("S2", 0, 9.0)]));
    assert!(overview.history.loading);
    assert!(overview
        .history
        .accept("S1", HistoryWindow::Day, vec![reading("S1", 0, 1.0)]));
    assert_eq!(overview.history.points().len(), 1);

    overview.close_history();
    assert!(!overview.history_open);
    assert!(overview.history.readings.is_empty());
}

#[test]
fn test_users_state_tracks_creation() {
    let mut users = UsersPageState::default();
    users.draft = UserDraft {
        email: "op@example.com".into(),
        password: "secret".into(),
        role: Role::Operator,
    };
    assert!(matches!(users.submit(), Some(AppAction::CreateUser(_))));
    assert!(users.pending);

    users.created("op@example.com");
    assert!(!users.pending);
    assert!(users.form_notice.is_some());
    assert_eq!(users.draft.role, Role::default());
}

#[test]
fn test_runtime_settings_view_controls() {
    let mut settings = RuntimeSettings::new();
    settings.autoscale_x = false;
    settings.autoscale_y = false;
    settings.reset_view();
    assert!(settings.autoscale_x && settings.autoscale_y);

    let now = at(0);
    assert!(settings.set_last_hours(6, now));
    assert!(!settings.set_last_hours(6, now));
    assert_eq!(settings.analysis_window.duration(), chrono::Duration::hours(6));
}
