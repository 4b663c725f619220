//! Runtime settings that can be modified during application execution
//!
//! This module contains settings that may change during runtime,
//! separate from the persistent configuration. They control the analysis
//! time window, plot display options and CSV export.
//!
//! # Main Types
//!
//! - [`RuntimeSettings`] - Current analysis window and plot flags
//! - [`ExportSettings`] - CSV export options
//! - [`ExportTimeZone`] - Zone used to render exported timestamps

use crate::aggregator::{TimeWindow, DEFAULT_WINDOW_HOURS};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Runtime settings for the application
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeSettings {
    /// Range of readings fetched on the analysis page
    pub analysis_window: TimeWindow,

    /// Whether to auto-scale the X axis to fit the data
    pub autoscale_x: bool,

    /// Whether to auto-scale the Y axis to fit the data
    pub autoscale_y: bool,

    /// Whether the X axis is locked (user cannot zoom/pan)
    pub lock_x: bool,

    /// Whether the Y axis is locked (user cannot zoom/pan)
    pub lock_y: bool,

    /// Draw a marker at every reading in addition to the line
    pub show_points: bool,

    /// Show the plot legend
    pub show_legend: bool,

    /// Export settings
    pub export: ExportSettings,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            analysis_window: TimeWindow::default(),
            autoscale_x: true,
            autoscale_y: true,
            lock_x: false,
            lock_y: false,
            show_points: false,
            show_legend: true,
            export: ExportSettings::default(),
        }
    }
}

impl RuntimeSettings {
    /// Create new runtime settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the analysis window; returns true when it changed
    pub fn set_analysis_window(&mut self, window: TimeWindow) -> bool {
        if self.analysis_window == window {
            return false;
        }
        self.analysis_window = window;
        true
    }

    /// Set the analysis window to the `hours` preceding `now`
    pub fn set_last_hours(&mut self, hours: i64, now: DateTime<Utc>) -> bool {
        self.set_analysis_window(TimeWindow::new(now - Duration::hours(hours), now))
    }

    /// Restart the analysis window at the default span ending `now`.
    /// Run each time the analysis view is shown.
    pub fn restart_analysis_window(&mut self, now: DateTime<Utc>) -> bool {
        let changed = self.set_last_hours(DEFAULT_WINDOW_HOURS, now);
        if changed {
            self.reset_view();
        }
        changed
    }

    /// Toggle X axis lock
    pub fn toggle_lock_x(&mut self) {
        self.lock_x = !self.lock_x;
    }

    /// Toggle Y axis lock
    pub fn toggle_lock_y(&mut self) {
        self.lock_y = !self.lock_y;
    }

    /// Re-enable autoscaling on both axes
    pub fn reset_view(&mut self) {
        self.autoscale_x = true;
        self.autoscale_y = true;
    }
}

/// Export settings for CSV export
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportSettings {
    /// Zone the timestamp column is rendered in
    pub time_zone: ExportTimeZone,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            time_zone: ExportTimeZone::Local,
        }
    }
}

/// Time zone options for exported timestamps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExportTimeZone {
    /// The machine's local zone
    Local,
    /// Coordinated Universal Time
    Utc,
}

impl std::fmt::Display for ExportTimeZone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExportTimeZone::Local => write!(f, "Local"),
            ExportTimeZone::Utc => write!(f, "UTC"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_runtime_settings_default() {
        let settings = RuntimeSettings::default();
        assert!(settings.autoscale_x);
        assert!(settings.autoscale_y);
        assert!(settings.show_legend);
        assert_eq!(settings.export.time_zone, ExportTimeZone::Local);
    }

    #[test]
    fn test_set_last_hours_truncates_to_minute() {
        let mut settings = RuntimeSettings::default();
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 45).unwrap();

        assert!(settings.set_last_hours(6, now));
        assert_eq!(
            settings.analysis_window.start,
            Utc.with_ymd_and_hms(2024, 3, 1, 6, 30, 0).unwrap()
        );
        assert_eq!(
            settings.analysis_window.end,
            Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap()
        );

        // Same minute, nothing changes
        assert!(!settings.set_last_hours(6, now + Duration::seconds(5)));
    }

    #[test]
    fn test_restart_analysis_window_ends_at_now() {
        let launch = Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap();
        let mut settings = RuntimeSettings::default();
        settings.set_last_hours(DEFAULT_WINDOW_HOURS, launch);
        settings.autoscale_x = false;

        // Shown three hours after launch
        let mount = launch + Duration::hours(3) + Duration::seconds(20);
        assert!(settings.restart_analysis_window(mount));
        assert_eq!(
            settings.analysis_window.end,
            Utc.with_ymd_and_hms(2024, 3, 1, 11, 0, 0).unwrap()
        );
        assert_eq!(
            settings.analysis_window.duration(),
            Duration::hours(DEFAULT_WINDOW_HOURS)
        );
        assert!(settings.autoscale_x);

        assert!(!settings.restart_analysis_window(mount));
    }

    #[test]
    fn test_axis_locks_and_reset() {
        let mut settings = RuntimeSettings::default();
        settings.toggle_lock_x();
        settings.toggle_lock_y();
        assert!(settings.lock_x && settings.lock_y);

        settings.autoscale_x = false;
        settings.autoscale_y = false;
        settings.reset_view();
        assert!(settings.autoscale_x && settings.autoscale_y);
    }
}
