//! In-memory backend for testing and demos
//!
//! This module provides a [`BackendClient`] that keeps every table in
//! memory. It evaluates [`Query`] values directly, delivers inserts on
//! `readings` to open subscriptions and fakes the identity service. It is
//! used by the test suite and by the `--mock` demo mode.
//!
//! # Features
//!
//! - **Failure injection**: make reads/writes of a table fail, or make admin
//!   user creation fail
//! - **Demo seeding**: a small station tree with a day of history
//! - **Pattern-based ingest**: a background task that appends readings
//!   following a [`MockDataPattern`] per sensor
//!
//! # Data Patterns
//!
//! - [`MockDataPattern::Constant`] - Fixed value
//! - [`MockDataPattern::Sine`] - Sinusoidal wave around an offset
//! - [`MockDataPattern::Random`] - Random values within a range
//! - [`MockDataPattern::Sawtooth`] - Linear ramp that resets periodically
//! - [`MockDataPattern::Square`] - Alternates between two levels
//! - [`MockDataPattern::Triangle`] - Triangle wave

use super::client::{BackendClient, FeedEvent, Subscription};
use super::query::Query;
use super::session::{AuthEvent, MemorySessionStore, NewIdentity, Session, SessionManager, SessionUser};
use crate::error::{DashError, Result};
use crate::types::{FeedStatus, Reading, Table};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;

/// Email of the identity seeded by [`MockBackend::seeded_demo`]
pub const DEMO_EMAIL: &str = "demo@example.com";

/// Password of the seeded demo identity
pub const DEMO_PASSWORD: &str = "demo";

/// Pattern for generating mock readings
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MockDataPattern {
    /// Constant value
    Constant(f64),
    /// Sine wave, period in seconds
    Sine {
        period: f64,
        amplitude: f64,
        offset: f64,
    },
    /// Random values within range
    Random { min: f64, max: f64 },
    /// Sawtooth wave
    Sawtooth { period: f64, amplitude: f64 },
    /// Square wave
    Square { period: f64, amplitude: f64 },
    /// Triangle wave
    Triangle { period: f64, amplitude: f64 },
}

impl Default for MockDataPattern {
    fn default() -> Self {
        MockDataPattern::Sine {
            period: 3600.0,
            amplitude: 10.0,
            offset: 0.0,
        }
    }
}

/// Generation settings of one mock sensor
#[derive(Debug, Clone)]
pub struct MockSensorConfig {
    pub sensor_id: String,
    pub pattern: MockDataPattern,
    /// Noise amplitude to add (0.0 = no noise)
    pub noise_amplitude: f64,
}

impl MockSensorConfig {
    pub fn new(sensor_id: impl Into<String>, pattern: MockDataPattern) -> Self {
        Self {
            sensor_id: sensor_id.into(),
            pattern,
            noise_amplitude: 0.0,
        }
    }

    /// Add noise to the generated values
    pub fn with_noise(mut self, amplitude: f64) -> Self {
        self.noise_amplitude = amplitude;
        self
    }

    /// Generate a value for a point in time (seconds since the epoch)
    pub fn generate_value(&self, t: f64) -> f64 {
        let base_value = match self.pattern {
            MockDataPattern::Constant(v) => v,
            MockDataPattern::Sine {
                period,
                amplitude,
                offset,
            } => offset + amplitude * (2.0 * std::f64::consts::PI * t / period).sin(),
            MockDataPattern::Random { min, max } => min + rand_simple() * (max - min),
            MockDataPattern::Sawtooth { period, amplitude } => {
                let t = t % period;
                amplitude * (t / period)
            }
            MockDataPattern::Square { period, amplitude } => {
                let t = t % period;
                if t < period / 2.0 {
                    amplitude
                } else {
                    -amplitude
                }
            }
            MockDataPattern::Triangle { period, amplitude } => {
                let t = t % period;
                let half = period / 2.0;
                if t < half {
                    amplitude * (2.0 * t / half - 1.0)
                } else {
                    amplitude * (1.0 - 2.0 * (t - half) / half)
                }
            }
        };

        let value = if self.noise_amplitude > 0.0 {
            base_value + (rand_simple() - 0.5) * 2.0 * self.noise_amplitude
        } else {
            base_value
        };
        (value * 100.0).round() / 100.0
    }

    /// Reading for `timestamp`
    pub fn reading_at(&self, timestamp: DateTime<Utc>) -> Reading {
        let t = timestamp.timestamp_millis() as f64 / 1000.0;
        Reading::new(self.sensor_id.clone(), timestamp, self.generate_value(t))
    }
}

/// Simple pseudo-random number generator (no external dependency)
fn rand_simple() -> f64 {
    use std::cell::Cell;
    thread_local! {
        static SEED: Cell<u64> = const { Cell::new(12345) };
    }
    SEED.with(|seed| {
        let mut s = seed.get();
        s ^= s << 13;
        s ^= s >> 7;
        s ^= s << 17;
        seed.set(s);
        (s as f64) / (u64::MAX as f64)
    })
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

struct Subscriber {
    table: Table,
    events: mpsc::UnboundedSender<FeedEvent>,
    cancel: CancellationToken,
}

struct Identity {
    user: SessionUser,
    password: String,
}

/// Backend keeping every table in memory
pub struct MockBackend {
    tables: Mutex<HashMap<Table, Vec<Value>>>,
    subscribers: Mutex<Vec<Subscriber>>,
    failing: Mutex<HashSet<Table>>,
    fail_admin_create: AtomicBool,
    identities: Mutex<Vec<Identity>>,
    session: SessionManager,
    next_id: AtomicU64,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBackend {
    /// Empty backend with an in-memory session
    pub fn new() -> Self {
        Self::with_session(SessionManager::new(Box::new(MemorySessionStore::default())))
    }

    pub fn with_session(session: SessionManager) -> Self {
        Self {
            tables: Mutex::new(HashMap::new()),
            subscribers: Mutex::new(Vec::new()),
            failing: Mutex::new(HashSet::new()),
            fail_admin_create: AtomicBool::new(false),
            identities: Mutex::new(Vec::new()),
            session,
            next_id: AtomicU64::new(1),
        }
    }

    /// Make every read and write of `table` fail
    pub fn fail_table(&self, table: Table) {
        lock(&self.failing).insert(table);
    }

    /// Undo [`fail_table`](Self::fail_table)
    pub fn heal_table(&self, table: Table) {
        lock(&self.failing).remove(&table);
    }

    /// Make administrative user creation fail
    pub fn set_fail_admin_create(&self, fail: bool) {
        self.fail_admin_create.store(fail, Ordering::SeqCst);
    }

    /// Register an identity that can sign in
    pub fn add_identity(&self, email: &str, password: &str) -> NewIdentity {
        let id = format!("uid-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        lock(&self.identities).push(Identity {
            user: SessionUser {
                id: id.clone(),
                email: Some(email.to_string()),
            },
            password: password.to_string(),
        });
        NewIdentity {
            id,
            email: Some(email.to_string()),
        }
    }

    /// Raw rows of a table
    pub fn rows(&self, table: Table) -> Vec<Value> {
        lock(&self.tables).get(&table).cloned().unwrap_or_default()
    }

    /// Number of live subscriptions on a table
    pub fn subscriber_count(&self, table: Table) -> usize {
        let mut subscribers = lock(&self.subscribers);
        subscribers.retain(|s| !s.cancel.is_cancelled() && !s.events.is_closed());
        subscribers.iter().filter(|s| s.table == table).count()
    }

    /// Store a reading as the external ingestion process would, and
    /// notify subscribers
    pub fn ingest_reading(&self, reading: &Reading) -> Result<()> {
        let row = serde_json::to_value(reading)?;
        self.store(Table::Readings, row)
    }

    fn check_failing(&self, table: Table) -> Result<()> {
        if lock(&self.failing).contains(&table) {
            return Err(DashError::Backend {
                status: 503,
                message: format!("{} is unavailable", table),
            });
        }
        Ok(())
    }

    fn store(&self, table: Table, mut row: Value) -> Result<()> {
        self.check_failing(table)?;
        if !row.is_object() {
            return Err(DashError::Backend {
                status: 400,
                message: "row must be a JSON object".to_string(),
            });
        }

        {
            let mut tables = lock(&self.tables);
            let rows = tables.entry(table).or_default();

            if table == Table::Readings {
                if row.get("id").is_none() {
                    row["id"] = json!(self.next_id.fetch_add(1, Ordering::SeqCst));
                }
            } else if let Some(id) = row.get("id") {
                if rows.iter().any(|r| r.get("id") == Some(id)) {
                    return Err(DashError::Backend {
                        status: 409,
                        message: format!(
                            "duplicate key value violates unique constraint \"{}_pkey\"",
                            table
                        ),
                    });
                }
            }
            if table == Table::Users && row.get("created_at").is_none() {
                row["created_at"] = json!(Utc::now().to_rfc3339());
            }
            rows.push(row.clone());
        }

        self.notify(table, &row);
        Ok(())
    }

    fn notify(&self, table: Table, row: &Value) {
        let mut subscribers = lock(&self.subscribers);
        subscribers.retain(|s| !s.cancel.is_cancelled() && !s.events.is_closed());
        for subscriber in subscribers.iter().filter(|s| s.table == table) {
            let _ = subscriber.events.send(FeedEvent::Inserted {
                table: table.name().to_string(),
                record: row.clone(),
            });
        }
    }

    /// Backend seeded with a station tree, a day of history and a
    /// signed-out demo identity
    pub fn seeded_demo() -> Result<Self> {
        let backend = Self::new();
        for (table, rows) in demo_catalog() {
            for row in rows {
                backend.store(table, row)?;
            }
        }

        let identity = backend.add_identity(DEMO_EMAIL, DEMO_PASSWORD);
        backend.store(
            Table::Users,
            json!({"id": identity.id, "email": DEMO_EMAIL, "role": "admin"}),
        )?;

        let now = crate::aggregator::truncate_to_minute(Utc::now());
        for config in demo_sensors() {
            let mut ts = now - Duration::hours(24);
            while ts <= now {
                backend.ingest_reading(&config.reading_at(ts))?;
                ts += Duration::minutes(5);
            }
        }
        Ok(backend)
    }
}

fn demo_catalog() -> Vec<(Table, Vec<Value>)> {
    vec![
        (
            Table::Stations,
            vec![
                json!({"id": "EST-1", "name": "Estación Norte"}),
                json!({"id": "EST-2", "name": "Estación Sur"}),
            ],
        ),
        (
            Table::Groups,
            vec![
                json!({"id": "G-CAL", "name": "Calderas", "station_id": "EST-1"}),
                json!({"id": "G-AMB", "name": "Ambiente", "station_id": "EST-1"}),
                json!({"id": "G-TAN", "name": "Tanques", "station_id": "EST-2"}),
            ],
        ),
        (
            Table::SensorTypes,
            vec![
                json!({"id": "TEMP", "name": "Temperature", "description": "Air or fluid temperature"}),
                json!({"id": "HUM", "name": "Humidity", "description": null}),
                json!({"id": "PRESS", "name": "Pressure", "description": null}),
                json!({"id": "CO2", "name": "CO2", "description": "Carbon dioxide concentration"}),
            ],
        ),
        (
            Table::MeasurementUnits,
            vec![
                json!({"id": "C", "name": "Celsius", "symbol": "°C", "description": null}),
                json!({"id": "PCT", "name": "Percent", "symbol": "%", "description": null}),
                json!({"id": "BAR", "name": "Bar", "symbol": "bar", "description": null}),
                json!({"id": "PPM", "name": "Parts per million", "symbol": "ppm", "description": null}),
            ],
        ),
        (
            Table::Sensors,
            vec![
                json!({"id": "T-01", "name": "Caldera 1", "sensor_type_id": "TEMP", "unit_id": "C", "group_id": "G-CAL", "sampling_interval": 300, "requires_calibration": true, "recommended_calibration_interval": 180}),
                json!({"id": "P-01", "name": "Presión caldera 1", "sensor_type_id": "PRESS", "unit_id": "BAR", "group_id": "G-CAL", "sampling_interval": 300, "requires_calibration": false, "recommended_calibration_interval": null}),
                json!({"id": "T-02", "name": "Sala de control", "sensor_type_id": "TEMP", "unit_id": "C", "group_id": "G-AMB", "sampling_interval": 300, "requires_calibration": false, "recommended_calibration_interval": null}),
                json!({"id": "H-01", "name": "Humedad sala", "sensor_type_id": "HUM", "unit_id": "PCT", "group_id": "G-AMB", "sampling_interval": 300, "requires_calibration": false, "recommended_calibration_interval": null}),
                json!({"id": "Q-01", "name": "CO2 sala", "sensor_type_id": "CO2", "unit_id": "PPM", "group_id": "G-AMB", "sampling_interval": 300, "requires_calibration": false, "recommended_calibration_interval": null}),
                json!({"id": "T-03", "name": "Tanque A", "sensor_type_id": "TEMP", "unit_id": "C", "group_id": "G-TAN", "sampling_interval": 300, "requires_calibration": false, "recommended_calibration_interval": null}),
            ],
        ),
    ]
}

/// Patterns of the demo sensors
pub fn demo_sensors() -> Vec<MockSensorConfig> {
    vec![
        MockSensorConfig::new(
            "T-01",
            MockDataPattern::Sine {
                period: 6.0 * 3600.0,
                amplitude: 8.0,
                offset: 72.0,
            },
        )
        .with_noise(0.5),
        MockSensorConfig::new(
            "P-01",
            MockDataPattern::Square {
                period: 4.0 * 3600.0,
                amplitude: 0.4,
            },
        )
        .with_noise(0.05),
        MockSensorConfig::new(
            "T-02",
            MockDataPattern::Sine {
                period: 24.0 * 3600.0,
                amplitude: 3.0,
                offset: 21.0,
            },
        )
        .with_noise(0.2),
        MockSensorConfig::new("H-01", MockDataPattern::Random { min: 38.0, max: 52.0 }),
        MockSensorConfig::new(
            "Q-01",
            MockDataPattern::Sawtooth {
                period: 2.0 * 3600.0,
                amplitude: 400.0,
            },
        ),
        MockSensorConfig::new(
            "T-03",
            MockDataPattern::Triangle {
                period: 8.0 * 3600.0,
                amplitude: 5.0,
            },
        ),
    ]
}

/// Append one reading per configured sensor every `period` until
/// cancelled
pub fn spawn_demo_ingest(
    backend: Arc<MockBackend>,
    sensors: Vec<MockSensorConfig>,
    period: std::time::Duration,
    cancel: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let now = Utc::now();
                    for config in &sensors {
                        if let Err(e) = backend.ingest_reading(&config.reading_at(now)) {
                            tracing::warn!("Demo ingest for {} failed: {}", config.sensor_id, e);
                        }
                    }
                }
            }
        }
        tracing::debug!("Demo ingest stopped");
    })
}

#[async_trait]
impl BackendClient for MockBackend {
    async fn select(&self, query: &Query) -> Result<Vec<Value>> {
        self.check_failing(query.table)?;
        let tables = lock(&self.tables);
        let rows = tables.get(&query.table).map(Vec::as_slice).unwrap_or(&[]);
        Ok(query.apply(rows))
    }

    async fn insert(&self, table: Table, row: Value) -> Result<()> {
        self.store(table, row)
    }

    async fn update(&self, table: Table, id: &str, patch: Value) -> Result<()> {
        self.check_failing(table)?;
        let mut tables = lock(&self.tables);
        let Some(rows) = tables.get_mut(&table) else {
            return Ok(());
        };
        for row in rows
            .iter_mut()
            .filter(|r| r.get("id").and_then(Value::as_str) == Some(id))
        {
            if let (Some(target), Some(changes)) = (row.as_object_mut(), patch.as_object()) {
                for (key, value) in changes {
                    target.insert(key.clone(), value.clone());
                }
            }
        }
        Ok(())
    }

    async fn subscribe_inserts(&self, channel: &str, table: Table) -> Result<Subscription> {
        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let _ = tx.send(FeedEvent::Status(FeedStatus::Live));
        lock(&self.subscribers).push(Subscriber {
            table,
            events: tx,
            cancel: cancel.clone(),
        });
        Ok(Subscription::new(channel, rx, cancel))
    }

    async fn current_session(&self) -> Result<Option<Session>> {
        Ok(self.session.get())
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session> {
        let user = lock(&self.identities)
            .iter()
            .find(|i| i.user.email.as_deref() == Some(email) && i.password == password)
            .map(|i| i.user.clone())
            .ok_or_else(|| DashError::Auth("Invalid login credentials".to_string()))?;

        let session = Session {
            access_token: format!("mock-token-{}", user.id),
            refresh_token: None,
            expires_at: None,
            user,
        };
        self.session.set(session.clone());
        Ok(session)
    }

    async fn sign_out(&self) -> Result<()> {
        self.session.clear();
        Ok(())
    }

    async fn admin_create_user(&self, email: &str, password: &str) -> Result<NewIdentity> {
        if self.fail_admin_create.load(Ordering::SeqCst) {
            return Err(DashError::Auth("User not allowed".to_string()));
        }
        let exists = lock(&self.identities)
            .iter()
            .any(|i| i.user.email.as_deref() == Some(email));
        if exists {
            return Err(DashError::Auth(
                "A user with this email address has already been registered".to_string(),
            ));
        }
        Ok(self.add_identity(email, password))
    }

    fn auth_events(&self) -> broadcast::Receiver<AuthEvent> {
        self.session.subscribe()
    }

    fn name(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::query::Direction;
    use chrono::TimeZone;

    #[test]
    fn test_mock_patterns() {
        let constant = MockSensorConfig::new("S", MockDataPattern::Constant(42.0));
        assert_eq!(constant.generate_value(0.0), 42.0);
        assert_eq!(constant.generate_value(1000.0), 42.0);

        let square = MockSensorConfig::new(
            "S",
            MockDataPattern::Square {
                period: 10.0,
                amplitude: 2.0,
            },
        );
        assert_eq!(square.generate_value(1.0), 2.0);
        assert_eq!(square.generate_value(6.0), -2.0);

        let random = MockSensorConfig::new("S", MockDataPattern::Random { min: 1.0, max: 2.0 });
        let v = random.generate_value(0.0);
        assert!((1.0..=2.0).contains(&v));
    }

    #[tokio::test]
    async fn test_select_applies_query() {
        let backend = MockBackend::new();
        let t0 = Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap();
        for i in 0..5 {
            backend
                .ingest_reading(&Reading::new("S1", t0 + Duration::minutes(i), i as f64))
                .unwrap();
        }
        backend.ingest_reading(&Reading::new("S2", t0, 9.0)).unwrap();

        let rows = backend
            .select(
                &Query::select(Table::Readings)
                    .eq("sensor_id", "S1")
                    .order("timestamp", Direction::Descending)
                    .limit(2),
            )
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["value"], 4.0);
    }

    #[tokio::test]
    async fn test_duplicate_id_is_rejected() {
        let backend = MockBackend::new();
        let row = json!({"id": "ST1", "name": "North"});
        backend.insert(Table::Stations, row.clone()).await.unwrap();
        let err = backend.insert(Table::Stations, row).await.unwrap_err();
        assert!(matches!(err, DashError::Backend { status: 409, .. }));
    }

    #[tokio::test]
    async fn test_subscription_receives_inserts() {
        let backend = MockBackend::new();
        let mut sub = backend
            .subscribe_inserts("overview", Table::Readings)
            .await
            .unwrap();
        assert_eq!(sub.next().await, Some(FeedEvent::Status(FeedStatus::Live)));

        backend
            .ingest_reading(&Reading::new("S1", Utc::now(), 1.0))
            .unwrap();
        match sub.next().await {
            Some(FeedEvent::Inserted { table, record }) => {
                assert_eq!(table, "readings");
                assert_eq!(record["sensor_id"], "S1");
            }
            other => panic!("unexpected event: {:?}", other),
        }

        drop(sub);
        assert_eq!(backend.subscriber_count(Table::Readings), 0);
    }

    #[tokio::test]
    async fn test_update_patches_row() {
        let backend = MockBackend::new();
        backend
            .insert(Table::Users, json!({"id": "u1", "email": "a@b.c", "role": "viewer"}))
            .await
            .unwrap();
        backend
            .update(Table::Users, "u1", json!({"role": "admin"}))
            .await
            .unwrap();
        let rows = backend.rows(Table::Users);
        assert_eq!(rows[0]["role"], "admin");
        assert!(rows[0].get("created_at").is_some());
    }

    #[tokio::test]
    async fn test_sign_in_flow() {
        let backend = MockBackend::new();
        backend.add_identity("ops@example.com", "pw");
        let mut events = backend.auth_events();

        assert!(backend.sign_in_with_password("ops@example.com", "bad").await.is_err());
        let session = backend
            .sign_in_with_password("ops@example.com", "pw")
            .await
            .unwrap();
        assert!(matches!(events.recv().await, Ok(AuthEvent::SignedIn(_))));
        assert_eq!(
            backend.current_session().await.unwrap().map(|s| s.user),
            Some(session.user)
        );

        backend.sign_out().await.unwrap();
        assert!(backend.current_session().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_admin_create_rejects_duplicate_email() {
        let backend = MockBackend::new();
        backend.admin_create_user("a@b.c", "pw").await.unwrap();
        assert!(backend.admin_create_user("a@b.c", "pw").await.is_err());

        backend.set_fail_admin_create(true);
        assert!(backend.admin_create_user("x@y.z", "pw").await.is_err());
    }

    #[test]
    fn test_seeded_demo() {
        let backend = MockBackend::seeded_demo().unwrap();
        assert_eq!(backend.rows(Table::Stations).len(), 2);
        assert_eq!(backend.rows(Table::Sensors).len(), demo_sensors().len());
        // 24h at 5 minute steps, both ends included
        assert_eq!(
            backend.rows(Table::Readings).len(),
            demo_sensors().len() * (24 * 12 + 1)
        );
    }
}
