//! Navigation and sensor selection state
//!
//! Purely local UI state: which stations and groups are expanded in the
//! hierarchy pickers, and which sensors are selected for analysis. Nothing
//! here is persisted.

use egui::Color32;
use std::collections::HashSet;

/// Maximum number of sensors plotted at once
pub const MAX_SELECTED_SENSORS: usize = 5;

/// Line colours, assigned by selection index
pub const LINE_COLORS: [Color32; 7] = [
    Color32::from_rgb(0x4f, 0x46, 0xe5),
    Color32::from_rgb(0xe1, 0x1d, 0x48),
    Color32::from_rgb(0x05, 0x96, 0x69),
    Color32::from_rgb(0xd9, 0x77, 0x06),
    Color32::from_rgb(0x7c, 0x3a, 0xed),
    Color32::from_rgb(0xbe, 0x12, 0x3c),
    Color32::from_rgb(0x08, 0x91, 0xb2),
];

/// Colour of the series at `index` in the selection
pub fn line_color(index: usize) -> Color32 {
    LINE_COLORS[index % LINE_COLORS.len()]
}

/// Expanded/collapsed flags of the hierarchy tree
#[derive(Debug, Clone, Default)]
pub struct NavigationState {
    expanded_stations: HashSet<String>,
    expanded_groups: HashSet<String>,
}

impl NavigationState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn toggle_station(&mut self, station_id: &str) {
        if !self.expanded_stations.remove(station_id) {
            self.expanded_stations.insert(station_id.to_string());
        }
    }

    pub fn toggle_group(&mut self, group_id: &str) {
        if !self.expanded_groups.remove(group_id) {
            self.expanded_groups.insert(group_id.to_string());
        }
    }

    pub fn is_station_expanded(&self, station_id: &str) -> bool {
        self.expanded_stations.contains(station_id)
    }

    pub fn is_group_expanded(&self, group_id: &str) -> bool {
        self.expanded_groups.contains(group_id)
    }
}

/// What a call to [`SensorSelection::toggle`] did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleOutcome {
    Added,
    Removed,
    /// The selection was full
    Ignored,
}

/// Bounded, insertion-ordered set of selected sensor ids
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SensorSelection {
    ids: Vec<String>,
}

impl SensorSelection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove `sensor_id` if selected, otherwise add it while there is room
    pub fn toggle(&mut self, sensor_id: &str) -> ToggleOutcome {
        if let Some(pos) = self.ids.iter().position(|id| id == sensor_id) {
            self.ids.remove(pos);
            ToggleOutcome::Removed
        } else if self.ids.len() < MAX_SELECTED_SENSORS {
            self.ids.push(sensor_id.to_string());
            ToggleOutcome::Added
        } else {
            ToggleOutcome::Ignored
        }
    }

    pub fn contains(&self, sensor_id: &str) -> bool {
        self.ids.iter().any(|id| id == sensor_id)
    }

    /// Position in selection order, which also picks the line colour
    pub fn index_of(&self, sensor_id: &str) -> Option<usize> {
        self.ids.iter().position(|id| id == sensor_id)
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.ids.len() >= MAX_SELECTED_SENSORS
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_navigation_defaults_collapsed() {
        let mut nav = NavigationState::new();
        assert!(!nav.is_station_expanded("ST1"));

        nav.toggle_station("ST1");
        assert!(nav.is_station_expanded("ST1"));
        assert!(!nav.is_group_expanded("ST1"));

        nav.toggle_station("ST1");
        assert!(!nav.is_station_expanded("ST1"));
    }

    #[test]
    fn test_sixth_sensor_is_ignored() {
        let mut selection = SensorSelection::new();
        for i in 0..MAX_SELECTED_SENSORS {
            assert_eq!(selection.toggle(&format!("S{}", i)), ToggleOutcome::Added);
        }
        let before = selection.clone();

        assert_eq!(selection.toggle("S5"), ToggleOutcome::Ignored);
        assert_eq!(selection, before);
        assert!(selection.is_full());
    }

    #[test]
    fn test_remove_when_full() {
        let mut selection = SensorSelection::new();
        for i in 0..MAX_SELECTED_SENSORS {
            selection.toggle(&format!("S{}", i));
        }
        assert_eq!(selection.toggle("S2"), ToggleOutcome::Removed);
        assert_eq!(selection.len(), 4);
        assert_eq!(selection.index_of("S3"), Some(2));
    }

    #[test]
    fn test_line_colors_cycle() {
        assert_eq!(line_color(0), line_color(7));
        assert_ne!(line_color(0), line_color(1));
    }

    proptest! {
        #[test]
        fn prop_selection_stays_bounded(ops in prop::collection::vec(0u8..10, 0..60)) {
            let mut selection = SensorSelection::new();
            for op in ops {
                let id = format!("S{}", op);
                let was_selected = selection.contains(&id);
                let len_before = selection.len();

                let outcome = selection.toggle(&id);

                prop_assert!(selection.len() <= MAX_SELECTED_SENSORS);
                if was_selected {
                    prop_assert_eq!(outcome, ToggleOutcome::Removed);
                    prop_assert!(!selection.contains(&id));
                } else if len_before == MAX_SELECTED_SENSORS {
                    prop_assert_eq!(outcome, ToggleOutcome::Ignored);
                    prop_assert_eq!(selection.len(), len_before);
                } else {
                    prop_assert_eq!(outcome, ToggleOutcome::Added);
                }
            }
        }
    }
}
