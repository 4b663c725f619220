//! Overview and sensor history state
//!
//! The overview keeps the most recent readings grouped per sensor and
//! appends live inserts to them. The history modal holds the readings of
//! one sensor over a fixed relative window; closing it drops them.

use crate::aggregator::truncate_to_minute;
use crate::types::Reading;
use chrono::{DateTime, Duration, Utc};
use egui::Color32;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Number of readings loaded when the overview mounts
pub const RECENT_READINGS_LIMIT: usize = 1000;

/// Relative range of the history modal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum HistoryWindow {
    Hour,
    SixHours,
    #[default]
    Day,
    Week,
    Month,
}

impl HistoryWindow {
    pub fn all() -> &'static [HistoryWindow] {
        &[
            HistoryWindow::Hour,
            HistoryWindow::SixHours,
            HistoryWindow::Day,
            HistoryWindow::Week,
            HistoryWindow::Month,
        ]
    }

    pub fn duration(&self) -> Duration {
        match self {
            HistoryWindow::Hour => Duration::hours(1),
            HistoryWindow::SixHours => Duration::hours(6),
            HistoryWindow::Day => Duration::days(1),
            HistoryWindow::Week => Duration::weeks(1),
            HistoryWindow::Month => Duration::days(30),
        }
    }

    /// Start of the window ending at `now`, to the minute
    pub fn start(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        truncate_to_minute(now - self.duration())
    }

    /// Translation key of the button label
    pub fn label_key(&self) -> &'static str {
        match self {
            HistoryWindow::Hour => "history.window.hour",
            HistoryWindow::SixHours => "history.window.six_hours",
            HistoryWindow::Day => "history.window.day",
            HistoryWindow::Week => "history.window.week",
            HistoryWindow::Month => "history.window.month",
        }
    }

    /// Short windows label the time axis with the time only
    pub fn axis_format(&self) -> &'static str {
        match self {
            HistoryWindow::Hour | HistoryWindow::SixHours => "%H:%M",
            _ => "%d/%m %H:%M",
        }
    }
}

/// Readings shown on the overview cards, grouped per sensor
#[derive(Debug, Clone, Default)]
pub struct RecentReadings {
    per_sensor: HashMap<String, Vec<Reading>>,
}

impl RecentReadings {
    /// Group a flat list of readings by sensor, keeping their order
    pub fn from_readings(readings: Vec<Reading>) -> Self {
        let mut per_sensor: HashMap<String, Vec<Reading>> = HashMap::new();
        for reading in readings {
            per_sensor
                .entry(reading.sensor_id.clone())
                .or_default()
                .push(reading);
        }
        Self { per_sensor }
    }

    /// Append a live reading for any sensor
    pub fn push(&mut self, reading: Reading) {
        self.per_sensor
            .entry(reading.sensor_id.clone())
            .or_default()
            .push(reading);
    }

    /// The reading with the greatest timestamp
    pub fn latest(&self, sensor_id: &str) -> Option<&Reading> {
        self.per_sensor
            .get(sensor_id)?
            .iter()
            .max_by_key(|r| r.timestamp)
    }

    /// Values of the `n` newest readings, oldest first
    pub fn recent_values(&self, sensor_id: &str, n: usize) -> Vec<f64> {
        let Some(readings) = self.per_sensor.get(sensor_id) else {
            return Vec::new();
        };
        let mut sorted: Vec<&Reading> = readings.iter().collect();
        sorted.sort_by_key(|r| r.timestamp);
        let skip = sorted.len().saturating_sub(n);
        sorted.into_iter().skip(skip).map(|r| r.value).collect()
    }

    pub fn count(&self, sensor_id: &str) -> usize {
        self.per_sensor.get(sensor_id).map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.per_sensor.is_empty()
    }
}

/// State of the open history modal
#[derive(Debug, Clone, Default)]
pub struct HistoryModalState {
    pub sensor_id: String,
    pub window: HistoryWindow,
    pub readings: Vec<Reading>,
    pub loading: bool,
}

impl HistoryModalState {
    pub fn open(sensor_id: impl Into<String>, window: HistoryWindow) -> Self {
        Self {
            sensor_id: sensor_id.into(),
            window,
            readings: Vec::new(),
            loading: true,
        }
    }

    /// Switch window; returns true when a new query is needed
    pub fn set_window(&mut self, window: HistoryWindow) -> bool {
        if self.window == window {
            return false;
        }
        self.window = window;
        self.loading = true;
        true
    }

    /// Take a history result. Results for another sensor are dropped;
    /// returns whether the data was accepted.
    pub fn accept(&mut self, sensor_id: &str, window: HistoryWindow, readings: Vec<Reading>) -> bool {
        if sensor_id != self.sensor_id {
            tracing::debug!("Dropping history for {} (modal shows {})", sensor_id, self.sensor_id);
            return false;
        }
        self.window = window;
        self.readings = readings;
        self.loading = false;
        true
    }

    /// Points as (unix seconds, value)
    pub fn points(&self) -> Vec<[f64; 2]> {
        self.readings
            .iter()
            .map(|r| [r.timestamp.timestamp_millis() as f64 / 1000.0, r.value])
            .collect()
    }
}

/// Icon category of a sensor, picked from its type id
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorKind {
    Temperature,
    Humidity,
    Pressure,
    Co2,
    Other,
}

impl SensorKind {
    pub fn from_type_id(sensor_type_id: &str) -> Self {
        match sensor_type_id {
            "TEMP" => SensorKind::Temperature,
            "HUM" => SensorKind::Humidity,
            "PRESS" => SensorKind::Pressure,
            "CO2" => SensorKind::Co2,
            _ => SensorKind::Other,
        }
    }

    pub fn icon(&self) -> &'static str {
        match self {
            SensorKind::Temperature => "🌡",
            SensorKind::Humidity => "💧",
            SensorKind::Pressure | SensorKind::Other => "⏲",
            SensorKind::Co2 => "🌬",
        }
    }

    pub fn color(&self) -> Color32 {
        match self {
            SensorKind::Temperature => Color32::from_rgb(0xef, 0x44, 0x44),
            SensorKind::Humidity => Color32::from_rgb(0x3b, 0x82, 0xf6),
            SensorKind::Pressure => Color32::from_rgb(0x22, 0xc5, 0x5e),
            SensorKind::Co2 => Color32::from_rgb(0xa8, 0x55, 0xf7),
            SensorKind::Other => Color32::from_rgb(0x6b, 0x72, 0x80),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 10, minute, 0).unwrap()
    }

    #[test]
    fn test_window_start() {
        let now = Utc.with_ymd_and_hms(2024, 3, 31, 12, 0, 30).unwrap();
        assert_eq!(
            HistoryWindow::Hour.start(now),
            Utc.with_ymd_and_hms(2024, 3, 31, 11, 0, 0).unwrap()
        );
        assert_eq!(
            HistoryWindow::Month.start(now),
            Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
        );
        assert_eq!(HistoryWindow::default(), HistoryWindow::Day);
    }

    #[test]
    fn test_latest_is_max_timestamp() {
        // Overview rows arrive newest first
        let mut recent = RecentReadings::from_readings(vec![
            Reading::new("S1", at(5), 5.0),
            Reading::new("S1", at(1), 1.0),
        ]);
        assert_eq!(recent.latest("S1").map(|r| r.value), Some(5.0));

        recent.push(Reading::new("S1", at(9), 9.0));
        assert_eq!(recent.latest("S1").map(|r| r.value), Some(9.0));
        assert_eq!(recent.count("S1"), 3);
        assert!(recent.latest("S2").is_none());
        assert_eq!(recent.recent_values("S1", 2), vec![5.0, 9.0]);
        assert!(recent.recent_values("S2", 2).is_empty());
    }

    #[test]
    fn test_modal_drops_other_sensor() {
        let mut modal = HistoryModalState::open("S1", HistoryWindow::Day);
        assert!(!modal.accept("S2", HistoryWindow::Day, vec![Reading::new("S2", at(1), 1.0)]));
        assert!(modal.loading);

        assert!(modal.accept("S1", HistoryWindow::Day, vec![Reading::new("S1", at(1), 1.0)]));
        assert!(!modal.loading);
        assert_eq!(modal.points(), vec![[at(1).timestamp() as f64, 1.0]]);
    }

    #[test]
    fn test_modal_window_change_replaces_data() {
        let mut modal = HistoryModalState::open("S1", HistoryWindow::Day);
        modal.accept("S1", HistoryWindow::Day, vec![Reading::new("S1", at(1), 1.0)]);

        assert!(!modal.set_window(HistoryWindow::Day));
        assert!(modal.set_window(HistoryWindow::Hour));
        modal.accept("S1", HistoryWindow::Hour, vec![]);
        assert!(modal.readings.is_empty());
    }

    #[test]
    fn test_sensor_kind() {
        assert_eq!(SensorKind::from_type_id("TEMP"), SensorKind::Temperature);
        assert_eq!(SensorKind::from_type_id("CO2"), SensorKind::Co2);
        assert_eq!(SensorKind::from_type_id("temp"), SensorKind::Other);
    }
}
