//! Entity cache for the configuration catalog
//!
//! Stations, groups, sensors, sensor types and measurement units are read
//! in full and kept as one immutable [`CatalogSnapshot`]. A refresh builds
//! a new snapshot and swaps it in; consumers hold an `Arc` and redraw when
//! the generation changes. There is no partial update and no pagination.

use crate::backend::client::{select_records, BackendClient};
use crate::backend::query::{Direction, Query};
use crate::error::{Result, ResultExt};
use crate::types::{Group, MeasurementUnit, Record, Sensor, SensorType, Station};
use std::sync::Arc;

/// One consistent read of every catalog table, each ordered by name
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CatalogSnapshot {
    pub stations: Vec<Station>,
    pub groups: Vec<Group>,
    pub sensors: Vec<Sensor>,
    pub sensor_types: Vec<SensorType>,
    pub units: Vec<MeasurementUnit>,
}

impl CatalogSnapshot {
    pub fn station(&self, id: &str) -> Option<&Station> {
        self.stations.iter().find(|s| s.id == id)
    }

    pub fn group(&self, id: &str) -> Option<&Group> {
        self.groups.iter().find(|g| g.id == id)
    }

    pub fn sensor(&self, id: &str) -> Option<&Sensor> {
        self.sensors.iter().find(|s| s.id == id)
    }

    pub fn sensor_type(&self, id: &str) -> Option<&SensorType> {
        self.sensor_types.iter().find(|t| t.id == id)
    }

    pub fn unit(&self, id: &str) -> Option<&MeasurementUnit> {
        self.units.iter().find(|u| u.id == id)
    }

    /// Groups belonging to a station
    pub fn groups_of<'a>(&'a self, station_id: &'a str) -> impl Iterator<Item = &'a Group> + 'a {
        self.groups.iter().filter(move |g| g.station_id == station_id)
    }

    /// Sensors belonging to a group
    pub fn sensors_of<'a>(&'a self, group_id: &'a str) -> impl Iterator<Item = &'a Sensor> + 'a {
        self.sensors.iter().filter(move |s| s.group_id == group_id)
    }

    /// Sensor name, or the id when the sensor is unknown
    pub fn sensor_display_name(&self, id: &str) -> String {
        self.sensor(id)
            .map(|s| s.name.clone())
            .unwrap_or_else(|| id.to_string())
    }

    /// Unit symbol of a sensor, empty when unknown
    pub fn unit_symbol_of(&self, sensor: &Sensor) -> &str {
        self.unit(&sensor.unit_id)
            .map(|u| u.symbol.as_str())
            .unwrap_or("")
    }

    pub fn is_empty(&self) -> bool {
        self.stations.is_empty()
            && self.groups.is_empty()
            && self.sensors.is_empty()
            && self.sensor_types.is_empty()
            && self.units.is_empty()
    }
}

fn by_name<T: Record>() -> Query {
    Query::select(T::TABLE).order("name", Direction::Ascending)
}

/// Read every catalog table concurrently
pub async fn fetch_catalog(client: &dyn BackendClient) -> Result<CatalogSnapshot> {
    let station_query = by_name::<Station>();
    let group_query = by_name::<Group>();
    let sensor_query = by_name::<Sensor>();
    let sensor_type_query = by_name::<SensorType>();
    let unit_query = by_name::<MeasurementUnit>();
    let (stations, groups, sensors, sensor_types, units) = futures::try_join!(
        select_records::<Station>(client, &station_query),
        select_records::<Group>(client, &group_query),
        select_records::<Sensor>(client, &sensor_query),
        select_records::<SensorType>(client, &sensor_type_query),
        select_records::<MeasurementUnit>(client, &unit_query),
    )
    .context("Fetching catalog")?;

    Ok(CatalogSnapshot {
        stations,
        groups,
        sensors,
        sensor_types,
        units,
    })
}

/// Holder of the current snapshot
#[derive(Debug, Default)]
pub struct EntityCache {
    snapshot: Arc<CatalogSnapshot>,
    generation: u64,
}

impl EntityCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Arc<CatalogSnapshot> {
        Arc::clone(&self.snapshot)
    }

    /// Incremented on every successful refresh
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Swap in a freshly built snapshot
    pub fn replace(&mut self, snapshot: CatalogSnapshot) -> Arc<CatalogSnapshot> {
        self.snapshot = Arc::new(snapshot);
        self.generation += 1;
        self.snapshot()
    }

    /// Refetch everything. On failure the error is logged, the previous
    /// snapshot is kept and returned.
    pub async fn refresh(&mut self, client: &dyn BackendClient) -> Arc<CatalogSnapshot> {
        match fetch_catalog(client).await {
            Ok(snapshot) => {
                tracing::debug!(
                    "Catalog refreshed: {} stations, {} groups, {} sensors",
                    snapshot.stations.len(),
                    snapshot.groups.len(),
                    snapshot.sensors.len()
                );
                self.replace(snapshot)
            }
            Err(e) => {
                tracing::error!("Catalog refresh failed: {}", e);
                self.snapshot()
            }
        }
    }
}
