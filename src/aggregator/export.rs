//! CSV export of the merged table
//!
//! Values are written with `f64`'s `Display`, so whole numbers have no
//! fractional part. Sensor names are written as-is: a name containing a
//! comma or quote will shift the columns of that file.

use super::merge::ChartTable;
use chrono::{DateTime, TimeZone, Utc};

/// Format of the timestamp column
pub const CSV_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A column of the export: sensor id plus its header label
#[derive(Debug, Clone, PartialEq)]
pub struct ExportColumn {
    pub sensor_id: String,
    pub label: String,
}

impl ExportColumn {
    pub fn new(sensor_id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            sensor_id: sensor_id.into(),
            label: label.into(),
        }
    }
}

/// Serialize `table` as CSV text with timestamps rendered in `tz`.
///
/// One header line plus one line per row; lines are joined with `\n` and
/// there is no trailing newline.
pub fn to_csv<Tz>(table: &ChartTable, columns: &[ExportColumn], tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let mut lines = Vec::with_capacity(table.len() + 1);

    let mut header = String::from("Timestamp");
    for column in columns {
        header.push(',');
        header.push_str(&column.label);
    }
    lines.push(header);

    for row in &table.rows {
        let mut line = row
            .timestamp
            .with_timezone(tz)
            .format(CSV_TIMESTAMP_FORMAT)
            .to_string();
        for column in columns {
            line.push(',');
            if let Some(value) = row.value(&column.sensor_id) {
                line.push_str(&value.to_string());
            }
        }
        lines.push(line);
    }

    lines.join("\n")
}

/// Default file name for an export started at `now`
pub fn export_file_name<Tz>(now: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    format!("sensor-data-{}.csv", now.format("%Y-%m-%d-%H%M"))
}

/// Default file name in the machine's local zone
pub fn default_export_file_name() -> String {
    export_file_name(&Utc::now().with_timezone(&chrono::Local))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::merge::merge_readings;
    use crate::types::Reading;
    use chrono::FixedOffset;
    use proptest::prelude::*;
    use std::collections::HashMap;

    fn at(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 10, minute, 0).unwrap()
    }

    fn sample_table() -> ChartTable {
        let mut readings = HashMap::new();
        readings.insert(
            "S1".to_string(),
            vec![Reading::new("S1", at(1), 10.0), Reading::new("S1", at(2), 20.0)],
        );
        readings.insert("S2".to_string(), vec![Reading::new("S2", at(1), 15.0)]);
        merge_readings(&readings, &["S1".to_string(), "S2".to_string()])
    }

    fn columns() -> Vec<ExportColumn> {
        vec![
            ExportColumn::new("S1", "SensorOneName"),
            ExportColumn::new("S2", "SensorTwoName"),
        ]
    }

    #[test]
    fn test_csv_two_sensors() {
        let csv = to_csv(&sample_table(), &columns(), &Utc);
        assert_eq!(
            csv,
            "Timestamp,SensorOneName,SensorTwoName\n\
             2024-03-01 10:01:00,10,15\n\
             2024-03-01 10:02:00,20,"
        );
    }

    proptest! {
        #[test]
        fn prop_csv_shape(
            lists in prop::collection::vec(
                prop::collection::vec((0u32..60, -1000.0f64..1000.0), 0..20),
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
            let columns: Vec<ExportColumn> = sensors
                .iter()
                .map(|id| ExportColumn::new(id.clone(), format!("Sensor {}", id)))
                .collect();

            let csv = to_csv(&table, &columns, &Utc);
            let lines: Vec<_> = csv.split('\n').collect();
            prop_assert_eq!(lines.len(), table.len() + 1);
            for line in lines {
                prop_assert_eq!(line.split(',').count(), columns.len() + 1);
            }
        }
    }

    #[test]
    fn test_csv_uses_given_zone() {
        let tz = FixedOffset::east_opt(2 * 3600).unwrap();
        let csv = to_csv(&sample_table(), &columns(), &tz);
        assert!(csv.contains("\n2024-03-01 12:01:00,10,15"));
    }

    #[test]
    fn test_csv_fractional_values() {
        let mut readings = HashMap::new();
        readings.insert("S1".to_string(), vec![Reading::new("S1", at(1), 21.25)]);
        let table = merge_readings(&readings, &["S1".to_string()]);
        let csv = to_csv(&table, &[ExportColumn::new("S1", "Temp")], &Utc);
        assert!(csv.ends_with(",21.25"));
    }

    #[test]
    fn test_empty_table_is_header_only() {
        let csv = to_csv(&ChartTable::default(), &columns(), &Utc);
        assert_eq!(csv, "Timestamp,SensorOneName,SensorTwoName");
    }

    #[test]
    fn test_names_are_not_escaped() {
        let csv = to_csv(
            &ChartTable::default(),
            &[ExportColumn::new("S1", "Temp, boiler")],
            &Utc,
        );
        assert_eq!(csv, "Timestamp,Temp, boiler");
    }

    #[test]
    fn test_export_file_name() {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 9, 5, 59).unwrap();
        assert_eq!(export_file_name(&now), "sensor-data-2024-03-01-0905.csv");
    }
}
