//! Page modules for the frontend
//!
//! Each page implements the Page trait, receiving shared state
//! via context and returning actions instead of mutating directly.
//!
//! This design enables:
//! - Clear dependency injection through `SharedState`
//! - Testable page logic (pages are pure functions of state)
//! - Decoupled architecture (pages don't know about each other)
//! - Centralized action handling in the main app

mod analysis;
mod configuration;
mod login;
mod overview;
mod users;

pub use analysis::{format_local_minute, parse_local_minute, AnalysisPage, AnalysisPageState};
pub use configuration::{ConfigurationPage, ConfigurationPageState};
pub use login::{LoginPage, LoginPageState};
pub use overview::{OverviewPage, OverviewPageState};
pub use users::{UsersPage, UsersPageState};

use crate::frontend::state::{AppAction, SharedState};
use egui::Context;

/// Trait for page components
///
/// Pages receive shared state via `SharedState` and return actions
/// instead of mutating the main app directly. This pattern is similar
/// to the Dialog trait but for full-page components.
///
/// # Example
///
/// ```ignore
/// #[derive(Default)]
/// pub struct MyPageState {
///     selection: Option<String>,
/// }
///
/// pub struct MyPage;
///
/// impl Page for MyPage {
///     type State = MyPageState;
///
///     fn render(
///         state: &mut Self::State,
///         shared: &mut SharedState<'_>,
///         ctx: &Context,
///     ) -> Vec<AppAction> {
///         let mut actions = Vec::new();
///
///         egui::CentralPanel::default().show(ctx, |ui| {
///             if ui.button("Refresh").clicked() {
///                 actions.push(AppAction::RefreshCatalog);
///             }
///         });
///
///         actions
///     }
/// }
/// ```
pub trait Page {
    /// Page-specific state (forms, selections, fetched data)
    ///
    /// This state is owned by the main app and passed to the page
    /// during rendering. It persists across frames.
    type State: Default;

    /// Render the page and return any actions to perform
    ///
    /// This method receives:
    /// - `state`: Mutable reference to page-specific state
    /// - `shared`: Mutable reference to shared application state
    /// - `ctx`: The egui context for rendering
    ///
    /// Returns a vector of actions that the main app should handle.
    /// Actions are processed after the page finishes rendering.
    fn render(
        state: &mut Self::State,
        shared: &mut SharedState<'_>,
        ctx: &Context,
    ) -> Vec<AppAction>;
}
