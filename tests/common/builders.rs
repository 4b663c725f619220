//! Test data builders for creating test objects

use chrono::{DateTime, TimeZone, Utc};
use station_monitor::catalog::CatalogSnapshot;
use station_monitor::types::{Group, MeasurementUnit, Reading, Sensor, SensorType, Station};

/// 2024-03-01 12:00 UTC plus `minutes`
pub fn at(minutes: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap() + chrono::Duration::minutes(minutes)
}

pub fn reading(sensor_id: &str, minutes: i64, value: f64) -> Reading {
    Reading::new(sensor_id, at(minutes), value)
}

/// Builder for a catalog with one station and one group
pub struct CatalogBuilder {
    snapshot: CatalogSnapshot,
}

impl CatalogBuilder {
    pub fn new() -> Self {
        let mut snapshot = CatalogSnapshot::default();
        snapshot.stations.push(Station {
            id: "ST1".into(),
            name: "North".into(),
        });
        snapshot.groups.push(Group {
            id: "G1".into(),
            name: "Boilers".into(),
            station_id: "ST1".into(),
        });
        snapshot.sensor_types.push(SensorType {
            id: "TEMP".into(),
            name: "Temperature".into(),
            description: None,
        });
        snapshot.units.push(MeasurementUnit {
            id: "C".into(),
            name: "Celsius".into(),
            symbol: "°C".into(),
            description: None,
        });
        Self { snapshot }
    }

    pub fn sensor(mut self, id: &str, name: &str) -> Self {
        self.snapshot.sensors.push(Sensor {
            id: id.into(),
            name: name.into(),
            sensor_type_id: "TEMP".into(),
            unit_id: "C".into(),
            group_id: "G1".into(),
            sampling_interval: 300,
            requires_calibration: false,
            recommended_calibration_interval: None,
        });
        self
    }

    pub fn build(self) -> CatalogSnapshot {
        self.snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_builder() {
        let catalog = CatalogBuilder::new().sensor("S1", "Boiler 1").build();
        assert_eq!(catalog.sensors.len(), 1);
        assert_eq!(catalog.sensors_of("G1").count(), 1);
    }
}
