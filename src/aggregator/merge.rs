//! Timestamp-aligned merge of per-sensor reading lists
//!
//! The merged [`ChartTable`] is the single input of both the chart and the
//! CSV export, so whatever one shows the other writes.

use crate::types::Reading;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};

/// One row of the merged table
#[derive(Debug, Clone, PartialEq)]
pub struct ChartRow {
    pub timestamp: DateTime<Utc>,
    /// Value per sensor id; absent when the sensor has no reading at
    /// exactly this timestamp
    pub values: BTreeMap<String, f64>,
}

impl ChartRow {
    pub fn value(&self, sensor_id: &str) -> Option<f64> {
        self.values.get(sensor_id).copied()
    }
}

/// Rows sorted by ascending timestamp, one per distinct timestamp
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChartTable {
    pub rows: Vec<ChartRow>,
}

impl ChartTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Points of one sensor as (unix seconds, value), for plotting
    pub fn series(&self, sensor_id: &str) -> Vec<[f64; 2]> {
        self.rows
            .iter()
            .filter_map(|row| {
                row.value(sensor_id)
                    .map(|v| [row.timestamp.timestamp_millis() as f64 / 1000.0, v])
            })
            .collect()
    }
}

/// Merge the reading lists of `sensors` into one table.
///
/// Only the listed sensors contribute; lists of other sensors are ignored.
/// Timestamps are not interpolated. When a sensor has several readings at
/// the same timestamp the one later in its list wins.
pub fn merge_readings(readings: &HashMap<String, Vec<Reading>>, sensors: &[String]) -> ChartTable {
    let mut by_time: BTreeMap<DateTime<Utc>, BTreeMap<String, f64>> = BTreeMap::new();

    for sensor_id in sensors {
        let Some(list) = readings.get(sensor_id) else {
            continue;
        };
        for reading in list {
            by_time
                .entry(reading.timestamp)
                .or_default()
                .insert(sensor_id.clone(), reading.value);
        }
    }

    ChartTable {
        rows: by_time
            .into_iter()
            .map(|(timestamp, values)| ChartRow { timestamp, values })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;
    use std::collections::HashSet;

    fn at(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 10, minute, 0).unwrap()
    }

    #[test]
    fn test_two_sensor_merge() {
        let mut readings = HashMap::new();
        readings.insert(
            "S1".to_string(),
            vec![Reading::new("S1", at(1), 10.0), Reading::new("S1", at(2), 20.0)],
        );
        readings.insert("S2".to_string(), vec![Reading::new("S2", at(1), 15.0)]);

        let table = merge_readings(&readings, &["S1".to_string(), "S2".to_string()]);

        assert_eq!(table.len(), 2);
        assert_eq!(table.rows[0].timestamp, at(1));
        assert_eq!(table.rows[0].value("S1"), Some(10.0));
        assert_eq!(table.rows[0].value("S2"), Some(15.0));
        assert_eq!(table.rows[1].value("S1"), Some(20.0));
        assert_eq!(table.rows[1].value("S2"), None);
    }

    #[test]
    fn test_unselected_lists_are_ignored() {
        let mut readings = HashMap::new();
        readings.insert("S1".to_string(), vec![Reading::new("S1", at(1), 1.0)]);
        readings.insert("S9".to_string(), vec![Reading::new("S9", at(5), 9.0)]);

        let table = merge_readings(&readings, &["S1".to_string()]);
        assert_eq!(table.len(), 1);
        assert_eq!(table.rows[0].value("S9"), None);
    }

    #[test]
    fn test_duplicate_timestamp_last_wins() {
        let mut readings = HashMap::new();
        readings.insert(
            "S1".to_string(),
            vec![Reading::new("S1", at(1), 1.0), Reading::new("S1", at(1), 2.0)],
        );

        let table = merge_readings(&readings, &["S1".to_string()]);
        assert_eq!(table.len(), 1);
        assert_eq!(table.rows[0].value("S1"), Some(2.0));
    }

    #[test]
    fn test_unsorted_input_is_sorted() {
        let mut readings = HashMap::new();
        readings.insert(
            "S1".to_string(),
            vec![Reading::new("S1", at(9), 9.0), Reading::new("S1", at(3), 3.0)],
        );

        let table = merge_readings(&readings, &["S1".to_string()]);
        assert_eq!(table.rows[0].timestamp, at(3));
        assert_eq!(table.series("S1")[1][1], 9.0);
    }

    proptest! {
        #[test]
        fn prop_rows_match_distinct_timestamps(
            lists in prop::collection::vec(
                prop::collection::vec((0u32..60, -100.0f64..100.0), 0..20),
                1..=5,
            )
        ) {
            let mut readings = HashMap::new();
            let mut sensors = Vec::new();
            for (i, list) in lists.iter().enumerate() {
                let id = format!("S{}", i);
                readings.insert(
                    id.clone(),
                    list.iter().map(|(m, v)| Reading::new(id.clone(), at(*m), *v)).collect::<Vec<_>>(),
                );
                sensors.push(id);
            }

            let table = merge_readings(&readings, &sensors);
            let distinct: HashSet<_> = lists.iter().flatten().map(|(m, _)| *m).collect();
            prop_assert_eq!(table.len(), distinct.len());

            for row in &table.rows {
                for (i, list) in lists.iter().enumerate() {
                    let id = format!("S{}", i);
                    let expected = list
                        .iter()
                        .rev()
                        .find(|(m, _)| at(*m) == row.timestamp)
                        .map(|(_, v)| *v);
                    prop_assert_eq!(row.value(&id), expected);
                }
            }
            prop_assert!(table.rows.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
        }
    }
}
