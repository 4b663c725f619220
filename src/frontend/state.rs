//! Shared state types for the frontend
//!
//! This module defines the shared state container and action types used by
//! the pages. Pages receive `SharedState` via borrowing and return
//! `AppAction`s instead of mutating state directly.

use serde::{Deserialize, Serialize};

use crate::aggregator::TimeWindow;
use crate::backend::SessionUser;
use crate::catalog::CatalogSnapshot;
use crate::config::settings::RuntimeSettings;
use crate::config::AppState;
use crate::forms::{NewEntity, NewUser};
use crate::history::HistoryWindow;
use crate::types::{BackendStats, FeedStatus, Role};

/// Top-level views of the dashboard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum View {
    #[default]
    Overview,
    Analysis,
    Configuration,
    Users,
}

impl View {
    pub fn all() -> &'static [View] {
        &[View::Overview, View::Analysis, View::Configuration, View::Users]
    }

    pub fn label_key(&self) -> &'static str {
        match self {
            View::Overview => "nav.overview",
            View::Analysis => "nav.analysis",
            View::Configuration => "nav.configuration",
            View::Users => "nav.users",
        }
    }

    /// Realtime channel owned by the view, if it listens for inserts
    pub fn feed_channel(&self) -> Option<&'static str> {
        match self {
            View::Overview => Some("overview"),
            View::Analysis => Some("analysis"),
            View::Configuration | View::Users => None,
        }
    }
}

/// Shared state accessible by all pages (borrowed, not owned).
pub struct SharedState<'a> {
    /// Current catalog snapshot
    pub catalog: &'a CatalogSnapshot,

    // Configuration (read-write by pages)
    pub settings: &'a mut RuntimeSettings,
    pub app_state: &'a mut AppState,

    /// Signed-in identity
    pub user: Option<&'a SessionUser>,

    /// Feed state of the active view
    pub feed_status: FeedStatus,
    pub stats: &'a BackendStats,

    // Error display
    pub last_error: &'a mut Option<String>,
}

/// Actions that any page can emit
///
/// Pages return `Vec<AppAction>` instead of mutating state directly.
/// This enables:
/// - Testable page logic
/// - Clear separation between UI and backend calls
/// - Centralized action handling
#[derive(Debug, Clone, PartialEq)]
pub enum AppAction {
    // Session
    /// Sign in with the entered credentials
    SignIn { email: String, password: String },
    /// Sign out
    SignOut,

    // Navigation
    /// Show another view
    SwitchView(View),
    /// Refetch the catalog
    RefreshCatalog,

    // Overview
    /// Open the history modal for a sensor
    OpenHistory(String),
    /// Change the window of the open history modal
    SetHistoryWindow(HistoryWindow),
    /// Close the history modal
    CloseHistory,

    // Analysis
    /// Add or remove a sensor from the plotted set
    ToggleSensor(String),
    /// Set the fetched range and refetch
    SetAnalysisWindow(TimeWindow),
    /// Write the merged table to a CSV file
    ExportCsv,

    // Configuration
    /// Insert a validated entity
    Create(NewEntity),

    // Users
    /// Create an identity and its profile
    CreateUser(NewUser),
    /// Change a user's role
    UpdateRole { user_id: String, role: Role },

    /// Open the preferences dialog
    OpenPreferences,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_live_views_own_a_channel() {
        assert_eq!(View::Overview.feed_channel(), Some("overview"));
        assert_eq!(View::Analysis.feed_channel(), Some("analysis"));
        assert_eq!(View::Configuration.feed_channel(), None);
        assert_eq!(View::Users.feed_channel(), None);
    }

    #[test]
    fn test_view_serde() {
        let json = serde_json::to_string(&View::Analysis).unwrap();
        assert_eq!(serde_json::from_str::<View>(&json).unwrap(), View::Analysis);
    }
}
