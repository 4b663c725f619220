//! Reading aggregation for the analysis view
//!
//! The [`ReadingAggregator`] owns the per-sensor reading lists of the
//! current selection and the [`ChartTable`] merged from them. Fetched
//! lists replace the old ones wholesale; live inserts are appended to the
//! list of their sensor. Every change re-merges the table, which is the
//! shared input of the chart and the CSV export.
//!
//! Neither path deduplicates: a reading delivered both by a fetch and by
//! the change feed is kept twice, and the merge shows whichever value
//! comes last in the list.

pub mod export;
pub mod merge;

pub use export::{default_export_file_name, export_file_name, to_csv, ExportColumn};
pub use merge::{merge_readings, ChartRow, ChartTable};

use crate::selection::{SensorSelection, ToggleOutcome};
use crate::types::Reading;
use chrono::{DateTime, Duration, DurationRound, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Default length of the analysis window in hours
pub const DEFAULT_WINDOW_HOURS: i64 = 24;

/// A time range with minute granularity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    /// Build a window, dropping seconds and below from both ends
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            start: truncate_to_minute(start),
            end: truncate_to_minute(end),
        }
    }

    /// The `hours` preceding `now`
    pub fn last_hours(hours: i64, now: DateTime<Utc>) -> Self {
        Self::new(now - Duration::hours(hours), now)
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    pub fn is_valid(&self) -> bool {
        self.start <= self.end
    }
}

impl Default for TimeWindow {
    fn default() -> Self {
        Self::last_hours(DEFAULT_WINDOW_HOURS, Utc::now())
    }
}

/// Drop seconds and sub-second precision
pub fn truncate_to_minute(ts: DateTime<Utc>) -> DateTime<Utc> {
    ts.duration_trunc(Duration::minutes(1)).unwrap_or(ts)
}

/// State of the analysis view: selection, reading lists and merged table
#[derive(Debug, Default)]
pub struct ReadingAggregator {
    selection: SensorSelection,
    readings: HashMap<String, Vec<Reading>>,
    table: ChartTable,
    loading: bool,
}

impl ReadingAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn selection(&self) -> &SensorSelection {
        &self.selection
    }

    /// Ids of the selected sensors, in selection order
    pub fn selected(&self) -> &[String] {
        self.selection.ids()
    }

    pub fn table(&self) -> &ChartTable {
        &self.table
    }

    pub fn readings_of(&self, sensor_id: &str) -> &[Reading] {
        self.readings.get(sensor_id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// Toggle a sensor and re-merge right away so a removed sensor
    /// disappears before the next fetch lands
    pub fn toggle(&mut self, sensor_id: &str) -> ToggleOutcome {
        let outcome = self.selection.toggle(sensor_id);
        if outcome != ToggleOutcome::Ignored {
            self.remerge();
        }
        outcome
    }

    /// Mark a fetch as in flight
    pub fn begin_fetch(&mut self) {
        self.loading = true;
    }

    /// Replace all reading lists with a fetch result
    pub fn finish_fetch(&mut self, per_sensor: HashMap<String, Vec<Reading>>) {
        self.readings = per_sensor;
        self.loading = false;
        self.remerge();
    }

    /// A fetch failed; the previous lists stay in place
    pub fn fail_fetch(&mut self) {
        self.loading = false;
    }

    /// Append a live reading if its sensor is selected.
    ///
    /// Returns true when the table was recomputed.
    pub fn apply_insert(&mut self, reading: Reading) -> bool {
        if !self.selection.contains(&reading.sensor_id) {
            return false;
        }
        self.readings
            .entry(reading.sensor_id.clone())
            .or_default()
            .push(reading);
        self.remerge();
        true
    }

    fn remerge(&mut self) {
        self.table = merge_readings(&self.readings, self.selection.ids());
    }
}
