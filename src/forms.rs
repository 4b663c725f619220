//! Create-form drafts for catalog entities and users
//!
//! A draft holds the raw form input. `validate` only checks that required
//! fields are filled in (whitespace counts as empty); filled-in values are
//! stored exactly as typed. References to other
//! entities are not checked against the catalog: a stale id that is not
//! blank goes through and the backend decides.

use crate::error::{DashError, Result};
use crate::types::{
    Group, MeasurementUnit, Role, Sensor, SensorType, Station, Table, DEFAULT_SAMPLING_INTERVAL,
};
use serde_json::{json, Value};

fn required(value: &str, field: &'static str) -> Result<String> {
    if value.trim().is_empty() {
        Err(DashError::Validation(field))
    } else {
        Ok(value.to_string())
    }
}

fn optional(value: &str) -> Option<String> {
    (!value.trim().is_empty()).then(|| value.to_string())
}

/// A validated row ready to insert
#[derive(Debug, Clone, PartialEq)]
pub enum NewEntity {
    Station(Station),
    Group(Group),
    Sensor(Sensor),
    SensorType(SensorType),
    Unit(MeasurementUnit),
}

impl NewEntity {
    pub fn table(&self) -> Table {
        match self {
            NewEntity::Station(_) => Table::Stations,
            NewEntity::Group(_) => Table::Groups,
            NewEntity::Sensor(_) => Table::Sensors,
            NewEntity::SensorType(_) => Table::SensorTypes,
            NewEntity::Unit(_) => Table::MeasurementUnits,
        }
    }

    /// JSON row for the insert call
    pub fn to_row(&self) -> Result<Value> {
        let row = match self {
            NewEntity::Station(r) => serde_json::to_value(r)?,
            NewEntity::Group(r) => serde_json::to_value(r)?,
            NewEntity::Sensor(r) => serde_json::to_value(r)?,
            NewEntity::SensorType(r) => serde_json::to_value(r)?,
            NewEntity::Unit(r) => serde_json::to_value(r)?,
        };
        Ok(row)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StationDraft {
    pub id: String,
    pub name: String,
}

impl StationDraft {
    pub fn validate(&self) -> Result<NewEntity> {
        Ok(NewEntity::Station(Station {
            id: required(&self.id, "id")?,
            name: required(&self.name, "name")?,
        }))
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GroupDraft {
    pub id: String,
    pub name: String,
    pub station_id: String,
}

impl GroupDraft {
    pub fn validate(&self) -> Result<NewEntity> {
        Ok(NewEntity::Group(Group {
            id: required(&self.id, "id")?,
            name: required(&self.name, "name")?,
            station_id: required(&self.station_id, "station_id")?,
        }))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SensorDraft {
    pub id: String,
    pub name: String,
    pub sensor_type_id: String,
    pub unit_id: String,
    pub group_id: String,
    pub sampling_interval: u32,
    pub requires_calibration: bool,
    pub recommended_calibration_interval: Option<u32>,
}

impl Default for SensorDraft {
    fn default() -> Self {
        Self {
            id: String::new(),
            name: String::new(),
            sensor_type_id: String::new(),
            unit_id: String::new(),
            group_id: String::new(),
            sampling_interval: DEFAULT_SAMPLING_INTERVAL,
            requires_calibration: false,
            recommended_calibration_interval: None,
        }
    }
}

impl SensorDraft {
    pub fn validate(&self) -> Result<NewEntity> {
        Ok(NewEntity::Sensor(Sensor {
            id: required(&self.id, "id")?,
            name: required(&self.name, "name")?,
            sensor_type_id: required(&self.sensor_type_id, "sensor_type_id")?,
            unit_id: required(&self.unit_id, "unit_id")?,
            group_id: required(&self.group_id, "group_id")?,
            sampling_interval: self.sampling_interval,
            requires_calibration: self.requires_calibration,
            recommended_calibration_interval: self.recommended_calibration_interval,
        }))
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SensorTypeDraft {
    pub id: String,
    pub name: String,
    pub description: String,
}

impl SensorTypeDraft {
    pub fn validate(&self) -> Result<NewEntity> {
        Ok(NewEntity::SensorType(SensorType {
            id: required(&self.id, "id")?,
            name: required(&self.name, "name")?,
            description: optional(&self.description),
        }))
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct UnitDraft {
    pub id: String,
    pub name: String,
    pub symbol: String,
    pub description: String,
}

impl UnitDraft {
    pub fn validate(&self) -> Result<NewEntity> {
        Ok(NewEntity::Unit(MeasurementUnit {
            id: required(&self.id, "id")?,
            name: required(&self.name, "name")?,
            symbol: required(&self.symbol, "symbol")?,
            description: optional(&self.description),
        }))
    }
}

/// Draft of a new dashboard user
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserDraft {
    pub email: String,
    pub password: String,
    pub role: Role,
}

/// Validated user creation request
#[derive(Debug, Clone, PartialEq)]
pub struct NewUser {
    pub email: String,
    pub password: String,
    pub role: Role,
}

impl NewUser {
    /// Profile row linking the created identity to its role
    pub fn profile_row(&self, identity_id: &str) -> Value {
        json!({
            "id": identity_id,
            "email": self.email,
            "role": self.role,
        })
    }
}

impl UserDraft {
    pub fn validate(&self) -> Result<NewUser> {
        // Addresses are matched exactly by the identity service
        let email = required(&self.email, "email")?.trim().to_string();
        // Passwords are passed through untrimmed
        if self.password.is_empty() {
            return Err(DashError::Validation("password"));
        }
        Ok(NewUser {
            email,
            password: self.password.clone(),
            role: self.role,
        })
    }
}

/// Which create form is shown on the configuration page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConfigTab {
    #[default]
    Stations,
    Groups,
    Sensors,
    SensorTypes,
    Units,
}

impl ConfigTab {
    pub fn all() -> &'static [ConfigTab] {
        &[
            ConfigTab::Stations,
            ConfigTab::Groups,
            ConfigTab::Sensors,
            ConfigTab::SensorTypes,
            ConfigTab::Units,
        ]
    }

    pub fn label_key(&self) -> &'static str {
        match self {
            ConfigTab::Stations => "config.tab.stations",
            ConfigTab::Groups => "config.tab.groups",
            ConfigTab::Sensors => "config.tab.sensors",
            ConfigTab::SensorTypes => "config.tab.sensor_types",
            ConfigTab::Units => "config.tab.units",
        }
    }
}

/// All create-form drafts of the configuration page
#[derive(Debug, Clone, Default)]
pub struct ConfigForms {
    pub tab: ConfigTab,
    pub station: StationDraft,
    pub group: GroupDraft,
    pub sensor: SensorDraft,
    pub sensor_type: SensorTypeDraft,
    pub unit: UnitDraft,
}

impl ConfigForms {
    /// Validate the draft of the active tab
    pub fn validate_active(&self) -> Result<NewEntity> {
        match self.tab {
            ConfigTab::Stations => self.station.validate(),
            ConfigTab::Groups => self.group.validate(),
            ConfigTab::Sensors => self.sensor.validate(),
            ConfigTab::SensorTypes => self.sensor_type.validate(),
            ConfigTab::Units => self.unit.validate(),
        }
    }

    /// Reset the draft whose entity was just created
    pub fn reset(&mut self, table: Table) {
        match table {
            Table::Stations => self.station = StationDraft::default(),
            Table::Groups => self.group = GroupDraft::default(),
            Table::Sensors => self.sensor = SensorDraft::default(),
            Table::SensorTypes => self.sensor_type = SensorTypeDraft::default(),
            Table::MeasurementUnits => self.unit = UnitDraft::default(),
            Table::Readings | Table::Users => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_station_requires_id_and_name() {
        let draft = StationDraft {
            id: "ST1".into(),
            name: "   ".into(),
        };
        match draft.validate() {
            Err(DashError::Validation(field)) => assert_eq!(field, "name"),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_sensor_requires_references() {
        let mut draft = SensorDraft {
            id: "T-01".into(),
            name: "Boiler".into(),
            sensor_type_id: "TEMP".into(),
            unit_id: "C".into(),
            ..Default::default()
        };
        assert!(matches!(
            draft.validate(),
            Err(DashError::Validation("group_id"))
        ));

        draft.group_id = "G1".into();
        let entity = draft.validate().unwrap();
        assert_eq!(entity.table(), Table::Sensors);
        let row = entity.to_row().unwrap();
        assert_eq!(row["sampling_interval"], 300);
        assert_eq!(row["recommended_calibration_interval"], Value::Null);
    }

    /// Observed behaviour: a reference that names nothing in the catalog
    /// is not caught before submission.
    #[test]
    fn test_stale_reference_passes_validation() {
        let draft = SensorDraft {
            id: "T-02".into(),
            name: "Orphan".into(),
            sensor_type_id: "NO-SUCH-TYPE".into(),
            unit_id: "NO-SUCH-UNIT".into(),
            group_id: "NO-SUCH-GROUP".into(),
            ..Default::default()
        };
        assert!(draft.validate().is_ok());
    }

    #[test]
    fn test_values_are_stored_as_typed() {
        let draft = UnitDraft {
            id: " C ".into(),
            name: "Celsius ".into(),
            symbol: "°C".into(),
            description: "  ".into(),
        };
        match draft.validate().unwrap() {
            NewEntity::Unit(unit) => {
                assert_eq!(unit.id, " C ");
                assert_eq!(unit.name, "Celsius ");
                assert_eq!(unit.description, None);
            }
            other => panic!("unexpected: {:?}", other),
        }

        let draft = StationDraft {
            id: "  ".into(),
            name: "North".into(),
        };
        assert!(matches!(draft.validate(), Err(DashError::Validation("id"))));
    }

    #[test]
    fn test_user_draft() {
        let mut draft = UserDraft {
            email: "ops@example.com".into(),
            ..Default::default()
        };
        assert!(matches!(draft.validate(), Err(DashError::Validation("password"))));

        draft.password = "secret".into();
        let user = draft.validate().unwrap();
        assert_eq!(user.role, Role::Viewer);
        let row = user.profile_row("uid-1");
        assert_eq!(row["id"], "uid-1");
        assert_eq!(row["role"], "viewer");
    }

    #[test]
    fn test_reset_only_created_form() {
        let mut forms = ConfigForms::default();
        forms.station.id = "ST1".into();
        forms.group.id = "G1".into();
        forms.reset(Table::Stations);
        assert!(forms.station.id.is_empty());
        assert_eq!(forms.group.id, "G1");
    }
}
