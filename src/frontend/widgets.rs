//! Custom widgets for the station monitor UI
//!
//! This module provides reusable UI widgets for the application.
//!
//! # Widgets
//!
//! - [`StatusIndicator`] - Colored status dot with label (live, error, etc.)
//! - [`ValueDisplay`] - Formatted value with label and optional unit
//! - [`ColorSwatch`] - Small colored square showing a series color
//! - [`Sparkline`] - Mini inline chart for showing recent values

use egui::{Color32, Response, Ui, Widget};

use crate::i18n::feed_status_label;
use crate::types::FeedStatus;

/// A widget that displays a colored status indicator
pub struct StatusIndicator {
    color: Color32,
    label: String,
    tooltip: Option<String>,
}

impl StatusIndicator {
    /// Create a new status indicator with the given color and label
    pub fn new(color: Color32, label: impl Into<String>) -> Self {
        Self {
            color,
            label: label.into(),
            tooltip: None,
        }
    }

    /// Indicator for a change feed state
    pub fn feed(status: FeedStatus) -> Self {
        Self::new(feed_status_color(status), feed_status_label(status))
    }

    /// Add a tooltip to the indicator
    pub fn with_tooltip(mut self, tooltip: impl Into<String>) -> Self {
        self.tooltip = Some(tooltip.into());
        self
    }
}

pub fn feed_status_color(status: FeedStatus) -> Color32 {
    match status {
        FeedStatus::Live => Color32::GREEN,
        FeedStatus::Connecting => Color32::YELLOW,
        FeedStatus::Disconnected => Color32::GRAY,
        FeedStatus::Error => Color32::RED,
    }
}

impl Widget for StatusIndicator {
    fn ui(self, ui: &mut Ui) -> Response {
        let response = ui.horizontal(|ui| {
            ui.colored_label(self.color, "●");
            ui.label(&self.label);
        });

        let response = response.response;

        if let Some(tooltip) = self.tooltip {
            response.on_hover_text(tooltip)
        } else {
            response
        }
    }
}

/// A widget for displaying a value with a label and optional unit
pub struct ValueDisplay {
    label: String,
    value: String,
    unit: Option<String>,
    color: Option<Color32>,
}

impl ValueDisplay {
    /// Create a new value display
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
            unit: None,
            color: None,
        }
    }

    /// Create a new value display from a numeric value
    pub fn from_f64(label: impl Into<String>, value: f64, precision: usize) -> Self {
        Self::new(
            label,
            format!("{:.precision$}", value, precision = precision),
        )
    }

    /// Add a unit to the display
    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        let unit = unit.into();
        self.unit = (!unit.is_empty()).then_some(unit);
        self
    }

    /// Set the color of the value
    pub fn with_color(mut self, color: Color32) -> Self {
        self.color = Some(color);
        self
    }

    fn value_text(&self) -> String {
        match &self.unit {
            Some(unit) => format!("{} {}", self.value, unit),
            None => self.value.clone(),
        }
    }
}

impl Widget for ValueDisplay {
    fn ui(self, ui: &mut Ui) -> Response {
        ui.horizontal(|ui| {
            if !self.label.is_empty() {
                ui.label(format!("{}:", self.label));
            }

            let text = egui::RichText::new(self.value_text()).size(20.0).strong();
            if let Some(color) = self.color {
                ui.label(text.color(color));
            } else {
                ui.label(text);
            }
        })
        .response
    }
}

/// A color swatch widget
pub struct ColorSwatch {
    color: Color32,
    size: f32,
}

impl ColorSwatch {
    /// Create a new color swatch
    pub fn new(color: Color32) -> Self {
        Self { color, size: 12.0 }
    }

    /// Set the size of the swatch
    pub fn with_size(mut self, size: f32) -> Self {
        self.size = size;
        self
    }
}

impl Widget for ColorSwatch {
    fn ui(self, ui: &mut Ui) -> Response {
        let (rect, response) =
            ui.allocate_exact_size(egui::vec2(self.size, self.size), egui::Sense::hover());

        if ui.is_rect_visible(rect) {
            ui.painter().rect_filled(rect, 2.0, self.color);
            ui.painter().rect_stroke(
                rect,
                2.0,
                egui::Stroke::new(1.0, Color32::GRAY),
                egui::StrokeKind::Outside,
            );
        }

        response
    }
}

/// A mini sparkline widget for showing recent values
pub struct Sparkline {
    values: Vec<f64>,
    width: f32,
    height: f32,
    color: Color32,
}

impl Sparkline {
    /// Create a new sparkline from values
    pub fn new(values: Vec<f64>) -> Self {
        Self {
            values,
            width: 80.0,
            height: 20.0,
            color: Color32::WHITE,
        }
    }

    /// Set the size of the sparkline
    pub fn with_size(mut self, width: f32, height: f32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Set the color of the sparkline
    pub fn with_color(mut self, color: Color32) -> Self {
        self.color = color;
        self
    }
}

impl Widget for Sparkline {
    fn ui(self, ui: &mut Ui) -> Response {
        let (rect, response) =
            ui.allocate_exact_size(egui::vec2(self.width, self.height), egui::Sense::hover());

        if ui.is_rect_visible(rect) && !self.values.is_empty() {
            let min_val = self.values.iter().cloned().fold(f64::INFINITY, f64::min);
            let max_val = self
                .values
                .iter()
                .cloned()
                .fold(f64::NEG_INFINITY, f64::max);
            let range = (max_val - min_val).max(f64::EPSILON);

            let points: Vec<egui::Pos2> = self
                .values
                .iter()
                .enumerate()
                .map(|(i, &v)| {
                    let x = rect.left()
                        + (i as f32 / (self.values.len() - 1).max(1) as f32) * rect.width();
                    let y = rect.bottom() - ((v - min_val) / range) as f32 * rect.height();
                    egui::pos2(x, y)
                })
                .collect();

            for pair in points.windows(2) {
                ui.painter()
                    .line_segment([pair[0], pair[1]], egui::Stroke::new(1.0, self.color));
            }
        }

        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feed_indicator_colors() {
        assert_eq!(StatusIndicator::feed(FeedStatus::Live).color, Color32::GREEN);
        assert_eq!(StatusIndicator::feed(FeedStatus::Error).color, Color32::RED);
        assert_eq!(feed_status_color(FeedStatus::Disconnected), Color32::GRAY);
    }

    #[test]
    fn test_value_display() {
        let display = ValueDisplay::from_f64("Temperature", 25.5, 1).with_unit("°C");
        assert_eq!(display.label, "Temperature");
        assert_eq!(display.value_text(), "25.5 °C");

        let bare = ValueDisplay::new("", "7").with_unit("");
        assert_eq!(bare.unit, None);
        assert_eq!(bare.value_text(), "7");
    }
}
