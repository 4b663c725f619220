//! Core data types for the station monitor
//!
//! This module contains the record types mirrored from the backend tables
//! and the parsing step that turns loosely-typed JSON rows into them.
//!
//! # Main Types
//!
//! - [`Station`], [`Group`], [`Sensor`] - The configuration hierarchy
//! - [`SensorType`], [`MeasurementUnit`] - Shared catalog entries
//! - [`Reading`] - One timestamped value of one sensor
//! - [`User`] / [`Role`] - Profiles managed from the users page
//! - [`Table`] - Names of the backend tables
//!
//! # Boundary Parsing
//!
//! Every row that crosses the backend boundary goes through [`parse_rows`]
//! (or [`parse_row`]). A row that does not match its record shape is
//! rejected with [`DashError::MalformedRow`] instead of being carried
//! inward as untyped JSON.

use crate::error::{DashError, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};

/// Default sampling interval for new sensors in seconds
pub const DEFAULT_SAMPLING_INTERVAL: u32 = 300;

/// Backend tables used by the application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Stations,
    Groups,
    Sensors,
    SensorTypes,
    MeasurementUnits,
    Readings,
    Users,
}

impl Table {
    /// Table name as exposed by the REST API
    pub fn name(&self) -> &'static str {
        match self {
            Table::Stations => "stations",
            Table::Groups => "groups",
            Table::Sensors => "sensors",
            Table::SensorTypes => "sensor_types",
            Table::MeasurementUnits => "measurement_units",
            Table::Readings => "readings",
            Table::Users => "users",
        }
    }
}

impl std::fmt::Display for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A record type stored in one backend table
pub trait Record: DeserializeOwned + Serialize + Clone + Send + 'static {
    /// The table holding rows of this type
    const TABLE: Table;
}

/// Top-level physical site
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Station {
    pub id: String,
    pub name: String,
}

impl Record for Station {
    const TABLE: Table = Table::Stations;
}

/// Logical grouping of sensors within a station
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub id: String,
    pub name: String,
    pub station_id: String,
}

impl Record for Group {
    const TABLE: Table = Table::Groups;
}

/// Catalog entry classifying the kind of a sensor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorType {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl Record for SensorType {
    const TABLE: Table = Table::SensorTypes;
}

/// Catalog entry for the unit a sensor reports in
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementUnit {
    pub id: String,
    pub name: String,
    pub symbol: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl Record for MeasurementUnit {
    const TABLE: Table = Table::MeasurementUnits;
}

/// A single monitored instrument
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sensor {
    pub id: String,
    pub name: String,
    pub sensor_type_id: String,
    pub unit_id: String,
    pub group_id: String,
    /// Sampling interval in seconds
    #[serde(default = "default_sampling_interval")]
    pub sampling_interval: u32,
    #[serde(default)]
    pub requires_calibration: bool,
    /// Recommended calibration interval in days
    #[serde(default)]
    pub recommended_calibration_interval: Option<u32>,
}

fn default_sampling_interval() -> u32 {
    DEFAULT_SAMPLING_INTERVAL
}

impl Record for Sensor {
    const TABLE: Table = Table::Sensors;
}

/// One timestamped numeric observation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub sensor_id: String,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub timestamp: DateTime<Utc>,
    #[serde(deserialize_with = "deserialize_number")]
    pub value: f64,
}

impl Reading {
    pub fn new(sensor_id: impl Into<String>, timestamp: DateTime<Utc>, value: f64) -> Self {
        Self {
            sensor_id: sensor_id.into(),
            timestamp,
            value,
        }
    }
}

impl Record for Reading {
    const TABLE: Table = Table::Readings;
}

/// Access level of a dashboard user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Operator,
    #[default]
    Viewer,
}

impl Role {
    pub fn all() -> &'static [Role] {
        &[Role::Admin, Role::Operator, Role::Viewer]
    }

    /// Wire form of the role
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Operator => "operator",
            Role::Viewer => "viewer",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Dashboard user profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    pub role: Role,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub created_at: DateTime<Utc>,
}

impl Record for User {
    const TABLE: Table = Table::Users;
}

/// Accepts RFC 3339 timestamps and offset-less ones (taken as UTC).
///
/// `timestamptz` columns come back with an offset, plain `timestamp`
/// columns do not.
fn deserialize_timestamp<'de, D>(deserializer: D) -> std::result::Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw).map_err(serde::de::Error::custom)
}

/// Parse a backend timestamp string
pub fn parse_timestamp(raw: &str) -> std::result::Result<DateTime<Utc>, String> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Ok(naive.and_utc());
        }
    }
    Err(format!("invalid timestamp '{}'", raw))
}

/// `numeric` columns may arrive as JSON strings
fn deserialize_number<'de, D>(deserializer: D) -> std::result::Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrString {
        Number(f64),
        String(String),
    }

    match NumberOrString::deserialize(deserializer)? {
        NumberOrString::Number(n) => Ok(n),
        NumberOrString::String(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| serde::de::Error::custom(format!("invalid number '{}'", s))),
    }
}

/// Parse a single JSON row into a record
pub fn parse_row<T: Record>(row: serde_json::Value) -> Result<T> {
    serde_json::from_value(row).map_err(|e| DashError::malformed(T::TABLE.name(), e))
}

/// Parse a batch of JSON rows; the first malformed row fails the batch
pub fn parse_rows<T: Record>(rows: Vec<serde_json::Value>) -> Result<Vec<T>> {
    rows.into_iter().map(parse_row::<T>).collect()
}

/// State of the live change feed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FeedStatus {
    /// No subscription open
    #[default]
    Disconnected,
    /// Websocket connecting or channel joining
    Connecting,
    /// Joined and delivering events
    Live,
    /// The subscription failed
    Error,
}

impl std::fmt::Display for FeedStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FeedStatus::Disconnected => write!(f, "Disconnected"),
            FeedStatus::Connecting => write!(f, "Connecting..."),
            FeedStatus::Live => write!(f, "Live"),
            FeedStatus::Error => write!(f, "Error"),
        }
    }
}

/// Counters about backend traffic, shown in the status bar
#[derive(Debug, Clone, Default)]
pub struct BackendStats {
    /// Number of requests that succeeded
    pub requests_ok: u64,
    /// Number of requests that failed
    pub requests_failed: u64,
    /// Number of change events delivered
    pub events_received: u64,
}

impl BackendStats {
    /// Calculate the success rate as a percentage
    pub fn success_rate(&self) -> f64 {
        let total = self.requests_ok + self.requests_failed;
        if total == 0 {
            100.0
        } else {
            (self.requests_ok as f64 / total as f64) * 100.0
        }
    }
}
