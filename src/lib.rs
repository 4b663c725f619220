//! # Station Monitor: sensor network dashboard
//!
//! A desktop client for a hosted Postgres backend (PostgREST tables, an
//! identity service and a realtime change feed) that holds monitoring
//! stations, their sensor groups, sensors and timestamped readings.
//!
//! ## Architecture
//!
//! - **Backend**: A worker thread owning a Tokio runtime and a [`BackendClient`]
//!   (REST + websocket, or the in-memory mock)
//! - **Frontend**: Renders the UI using eframe/egui with egui_plot for charts
//! - **Aggregator**: Merges per-sensor readings into one timestamp-aligned
//!   table that feeds both the chart and the CSV export
//! - **Communication**: Crossbeam channels for thread-safe data transfer
//!
//! ## Configuration
//!
//! Backend settings come from `backend.toml` in the platform data directory
//! under `dev.hxyulin.station-monitor`, overridden by `STATION_MONITOR_*`
//! environment variables. UI state and the stored session live next to it:
//!
//! - **Linux**: `~/.local/share/dev.hxyulin.station-monitor/`
//! - **macOS**: `~/Library/Application Support/dev.hxyulin.station-monitor/`
//! - **Windows**: `%APPDATA%\dev.hxyulin.station-monitor\`
//!
//! ## Example
//!
//! ```ignore
//! use station_monitor::{backend::{DashBackend, MockBackend}, config::AppState, StationMonitorApp};
//! use std::sync::Arc;
//!
//! fn main() -> anyhow::Result<()> {
//!     let app_state = AppState::load_or_default();
//!     let client = Arc::new(MockBackend::seeded_demo()?);
//!     let (backend, frontend) = DashBackend::new(client);
//!
//!     std::thread::spawn(move || backend.run());
//!
//!     eframe::run_native(
//!         "Station Monitor",
//!         eframe::NativeOptions::default(),
//!         Box::new(|cc| Ok(Box::new(StationMonitorApp::new(cc, frontend, app_state)))),
//!     )?;
//!     Ok(())
//! }
//! ```

rust_i18n::i18n!("locales", fallback = "en");

pub mod aggregator;
pub mod app;
pub mod backend;
pub mod catalog;
pub mod config;
pub mod error;
pub mod forms;
pub mod frontend;
pub mod history;
pub mod i18n;
pub mod selection;
pub mod types;

// Re-export commonly used types
pub use aggregator::{ChartTable, ReadingAggregator, TimeWindow};
pub use app::StationMonitorApp;
pub use backend::{BackendClient, BackendCommand, BackendMessage, DashBackend, FrontendReceiver};
pub use config::{AppState, BackendConfig};
pub use error::{DashError, Result};
pub use types::{Reading, Role, Sensor, Station};
