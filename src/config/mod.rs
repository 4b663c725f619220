//! Configuration module for the station monitor
//!
//! This module handles application configuration including:
//! - Backend endpoint and credentials ([`BackendConfig`])
//! - Application state persistence (preferences, last view)
//! - Runtime settings during execution
//!
//! # App Data Location
//!
//! Application data is stored in the platform-appropriate location:
//! - **Linux**: `~/.local/share/dev.hxyulin.station-monitor/`
//! - **macOS**: `~/Library/Application Support/dev.hxyulin.station-monitor/`
//! - **Windows**: `%APPDATA%\dev.hxyulin.station-monitor\`
//!
//! # Files
//!
//! - `app_state.json` - UI preferences and last session info
//! - `backend.toml` - Optional backend endpoint/credentials override
//! - `session.json` - Persisted identity session
//! - `logs/` - Daily rolling log files
//!
//! # Backend Configuration Layers
//!
//! Later layers override earlier ones:
//!
//! 1. Values baked in at build time (`STATION_MONITOR_URL`,
//!    `STATION_MONITOR_ANON_KEY`, `STATION_MONITOR_SERVICE_KEY`,
//!    `STATION_MONITOR_REALTIME_URL`)
//! 2. `backend.toml` in the app data directory
//! 3. The same environment variables at runtime

pub mod settings;

pub use settings::*;

use crate::error::{DashError, Result};
use crate::frontend::state::View;
use crate::history::HistoryWindow;
use crate::i18n::Language;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application identifier for data directories
pub const APP_ID: &str = "dev.hxyulin.station-monitor";

/// App state filename
pub const APP_STATE_FILE: &str = "app_state.json";

/// Backend override filename
pub const BACKEND_CONFIG_FILE: &str = "backend.toml";

/// Environment variable holding the backend base URL
pub const ENV_URL: &str = "STATION_MONITOR_URL";

/// Environment variable holding the public (anon) API key
pub const ENV_ANON_KEY: &str = "STATION_MONITOR_ANON_KEY";

/// Environment variable holding the service role key used for admin calls
pub const ENV_SERVICE_KEY: &str = "STATION_MONITOR_SERVICE_KEY";

/// Environment variable overriding the realtime endpoint
pub const ENV_REALTIME_URL: &str = "STATION_MONITOR_REALTIME_URL";

/// Default timeout for backend requests in milliseconds
pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;

/// Default realtime heartbeat period in seconds
pub const DEFAULT_HEARTBEAT_SECS: u64 = 30;

// ==================== App Data Directory ====================

/// Get the application data directory path
pub fn app_data_dir() -> Option<PathBuf> {
    dirs_next::data_dir().map(|p| p.join(APP_ID))
}

/// Ensure the app data directory exists
pub fn ensure_app_data_dir() -> Result<PathBuf> {
    let dir = app_data_dir().ok_or_else(|| {
        DashError::Config("Could not determine app data directory".to_string())
    })?;

    if !dir.exists() {
        std::fs::create_dir_all(&dir).map_err(|e| {
            DashError::Config(format!("Failed to create app data directory: {}", e))
        })?;
    }

    Ok(dir)
}

/// Get the path to the app state file
pub fn app_state_path() -> Option<PathBuf> {
    app_data_dir().map(|p| p.join(APP_STATE_FILE))
}

// ==================== Backend Config ====================

/// Endpoint and credentials of the managed backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Base URL, e.g. `https://xyz.supabase.co`
    pub url: String,

    /// Public API key sent with every request
    pub anon_key: String,

    /// Service role key, only needed for creating users
    pub service_role_key: Option<String>,

    /// Realtime base URL; derived from `url` when unset
    pub realtime_url: Option<String>,

    /// Request timeout in milliseconds
    pub request_timeout_ms: u64,

    /// Realtime heartbeat period in seconds
    pub heartbeat_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: option_env!("STATION_MONITOR_URL").unwrap_or_default().to_string(),
            anon_key: option_env!("STATION_MONITOR_ANON_KEY")
                .unwrap_or_default()
                .to_string(),
            service_role_key: option_env!("STATION_MONITOR_SERVICE_KEY").map(str::to_string),
            realtime_url: option_env!("STATION_MONITOR_REALTIME_URL").map(str::to_string),
            request_timeout_ms: DEFAULT_TIMEOUT_MS,
            heartbeat_secs: DEFAULT_HEARTBEAT_SECS,
        }
    }
}

impl BackendConfig {
    /// Load all layers: build-time defaults, `backend.toml`, environment
    pub fn load() -> Result<Self> {
        let file = app_data_dir().map(|d| d.join(BACKEND_CONFIG_FILE));
        let mut config = Self::load_from(file.as_deref())?;
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Load build-time defaults overlaid with a TOML file, if it exists
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path.filter(|p| p.exists()) else {
            return Ok(Self::default());
        };

        let content = std::fs::read_to_string(path).map_err(|e| {
            DashError::Config(format!("Failed to read backend config {:?}: {}", path, e))
        })?;

        toml::from_str(&content).map_err(|e| {
            DashError::Config(format!("Failed to parse backend config {:?}: {}", path, e))
        })
    }

    /// Apply overrides from a key lookup (the environment in production)
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup(ENV_URL) {
            self.url = url;
        }
        if let Some(key) = lookup(ENV_ANON_KEY) {
            self.anon_key = key;
        }
        if let Some(key) = lookup(ENV_SERVICE_KEY) {
            self.service_role_key = Some(key);
        }
        if let Some(url) = lookup(ENV_REALTIME_URL) {
            self.realtime_url = Some(url);
        }
    }

    /// Check that the backend can be reached with this config
    pub fn validate(&self) -> Result<()> {
        if self.url.trim().is_empty() {
            return Err(DashError::Config(format!(
                "Backend URL is not set ({} or {})",
                ENV_URL, BACKEND_CONFIG_FILE
            )));
        }
        if !(self.url.starts_with("http://") || self.url.starts_with("https://")) {
            return Err(DashError::Config(format!(
                "Backend URL must start with http:// or https://, got '{}'",
                self.url
            )));
        }
        if self.anon_key.trim().is_empty() {
            return Err(DashError::Config(format!(
                "Backend API key is not set ({})",
                ENV_ANON_KEY
            )));
        }
        Ok(())
    }

    fn base(&self) -> &str {
        self.url.trim_end_matches('/')
    }

    /// Base URL of the table API
    pub fn rest_url(&self) -> String {
        format!("{}/rest/v1", self.base())
    }

    /// Base URL of the identity API
    pub fn auth_url(&self) -> String {
        format!("{}/auth/v1", self.base())
    }

    /// Websocket URL of the change feed
    pub fn realtime_websocket_url(&self) -> String {
        let base = match &self.realtime_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => {
                let base = self.base();
                if let Some(rest) = base.strip_prefix("https://") {
                    format!("wss://{}", rest)
                } else if let Some(rest) = base.strip_prefix("http://") {
                    format!("ws://{}", rest)
                } else {
                    base.to_string()
                }
            }
        };
        format!(
            "{}/realtime/v1/websocket?apikey={}&vsn=1.0.0",
            base, self.anon_key
        )
    }
}

// ==================== App State ====================

/// Persistent application state
///
/// This stores user preferences that persist across sessions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppState {
    /// Version for future migration support
    #[serde(default = "default_app_state_version")]
    pub version: u32,

    /// View shown after sign-in
    #[serde(default)]
    pub last_view: View,

    /// Window preselected when the history modal opens
    #[serde(default)]
    pub history_window: HistoryWindow,

    /// UI preferences
    #[serde(default)]
    pub ui_preferences: UiPreferences,
}

fn default_app_state_version() -> u32 {
    1
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            version: 1,
            last_view: View::default(),
            history_window: HistoryWindow::default(),
            ui_preferences: UiPreferences::default(),
        }
    }
}

impl AppState {
    /// Load app state from the default location
    pub fn load() -> Result<Self> {
        let path = app_state_path().ok_or_else(|| {
            DashError::Config("Could not determine app state path".to_string())
        })?;
        Self::load_from(&path)
    }

    /// Load app state from a specific file
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| DashError::Config(format!("Failed to read app state: {}", e)))?;

        serde_json::from_str(&content)
            .map_err(|e| DashError::Config(format!("Failed to parse app state: {}", e)))
    }

    /// Load app state, returning defaults on any error
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_else(|e| {
            tracing::warn!("Failed to load app state, using defaults: {}", e);
            Self::default()
        })
    }

    /// Save app state to the default location
    pub fn save(&self) -> Result<()> {
        let dir = ensure_app_data_dir()?;
        self.save_to(&dir.join(APP_STATE_FILE))
    }

    /// Save app state to a specific file
    pub fn save_to(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| DashError::Config(format!("Failed to serialize app state: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| DashError::Config(format!("Failed to write app state: {}", e)))
    }
}

/// UI preferences that persist across sessions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UiPreferences {
    /// Enable dark mode
    #[serde(default = "default_true")]
    pub dark_mode: bool,

    /// Font scale factor
    #[serde(default = "default_font_scale")]
    pub font_scale: f32,

    /// Interface language
    #[serde(default)]
    pub language: Language,
}

fn default_true() -> bool {
    true
}

fn default_font_scale() -> f32 {
    1.0
}

impl Default for UiPreferences {
    fn default() -> Self {
        Self {
            dark_mode: true,
            font_scale: 1.0,
            language: Language::default(),
        }
    }
}
