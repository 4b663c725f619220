//! Plot rendering module using egui_plot
//!
//! Draws the merged reading table of the analysis page and the single
//! series of the history modal. The X axis is in unix seconds and labelled
//! with local wall-clock time.
//!
//! # Features
//!
//! - **Auto-scaling**: X follows the requested window, Y fits the visible data
//! - **Axis locking**: Lock X/Y axes to prevent accidental zoom/pan
//! - **Multiple sensors**: One line per selected sensor, colored by selection slot
//!
//! # Main Types
//!
//! - [`ChartView`] - Plot flags and rendering
//! - [`ChartSeries`] - One named, colored line

use crate::aggregator::ChartTable;
use crate::catalog::CatalogSnapshot;
use crate::config::settings::RuntimeSettings;
use crate::selection::line_color;
use chrono::{Local, TimeZone};
use egui::{Color32, Ui};
use egui_plot::{Corner, GridMark, Legend, Line, Plot, PlotBounds, PlotPoints, PlotUi, Points};

/// One line of the chart
#[derive(Debug, Clone, PartialEq)]
pub struct ChartSeries {
    pub name: String,
    pub color: Color32,
    /// (unix seconds, value)
    pub points: Vec<[f64; 2]>,
}

/// Build one series per selected sensor, in selection order
pub fn build_series(table: &ChartTable, selected: &[String], catalog: &CatalogSnapshot) -> Vec<ChartSeries> {
    selected
        .iter()
        .enumerate()
        .map(|(index, sensor_id)| ChartSeries {
            name: catalog.sensor_display_name(sensor_id),
            color: line_color(index),
            points: table.series(sensor_id),
        })
        .collect()
}

/// Plot view configuration
#[derive(Debug, Clone)]
pub struct ChartView {
    /// Whether to show the legend
    pub show_legend: bool,
    /// Whether to show grid lines
    pub show_grid: bool,
    /// Line width for all series
    pub line_width: f32,
    /// Draw a marker at every reading
    pub show_points: bool,
    /// Whether the X axis spans the requested window
    pub auto_scale_x: bool,
    /// Whether to auto-scale the Y axis
    pub auto_scale_y: bool,
    /// Whether the X axis is locked (user cannot zoom/pan)
    pub lock_x: bool,
    /// Whether the Y axis is locked (user cannot zoom/pan)
    pub lock_y: bool,
    /// chrono format of the axis labels
    pub time_format: &'static str,
}

impl Default for ChartView {
    fn default() -> Self {
        Self {
            show_legend: true,
            show_grid: true,
            line_width: 1.5,
            show_points: false,
            auto_scale_x: true,
            auto_scale_y: true,
            lock_x: false,
            lock_y: false,
            time_format: "%d/%m %H:%M",
        }
    }
}

impl ChartView {
    /// Update the view from runtime settings
    pub fn update_from_settings(&mut self, settings: &RuntimeSettings) {
        self.show_legend = settings.show_legend;
        self.show_points = settings.show_points;
        self.auto_scale_x = settings.autoscale_x;
        self.auto_scale_y = settings.autoscale_y;
        self.lock_x = settings.lock_x;
        self.lock_y = settings.lock_y;
    }

    /// Check if X axis allows user interaction (zoom/pan)
    pub fn can_interact_x(&self) -> bool {
        !self.lock_x && !self.auto_scale_x
    }

    /// Check if Y axis allows user interaction (zoom/pan)
    pub fn can_interact_y(&self) -> bool {
        !self.lock_y && !self.auto_scale_y
    }

    /// Render `series` over `x_range` (unix seconds).
    ///
    /// Returns true when the user zoomed or dragged, which turns
    /// autoscaling off for that axis.
    pub fn render(
        &mut self,
        ui: &mut Ui,
        plot_id: &str,
        series: &[ChartSeries],
        x_range: Option<(f64, f64)>,
    ) -> bool {
        let allow_x_zoom = !self.lock_x;
        let allow_y_zoom = !self.lock_y;

        let time_format = self.time_format;
        let mut plot = Plot::new(plot_id)
            .allow_zoom([allow_x_zoom, allow_y_zoom])
            .allow_drag([self.can_interact_x(), self.can_interact_y()])
            .allow_scroll([!self.lock_x, !self.lock_y])
            .allow_boxed_zoom(allow_x_zoom || allow_y_zoom)
            .show_axes(true)
            .show_grid(self.show_grid)
            .x_grid_spacer(|grid_input| create_time_grid_marks(grid_input.bounds))
            .x_axis_formatter(move |mark, _range| format_time(mark.value, time_format))
            .label_formatter(move |name, point| {
                let time = format_time(point.x, "%d/%m/%Y %H:%M:%S");
                if name.is_empty() {
                    format!("{}\n{:.2}", time, point.y)
                } else {
                    format!("{}\n{}\n{:.2}", name, time, point.y)
                }
            })
            .auto_bounds([false, self.auto_scale_y]);

        if self.show_legend {
            plot = plot.legend(
                Legend::default()
                    .position(Corner::RightTop)
                    .background_alpha(0.8),
            );
        }

        let auto_scale_x = self.auto_scale_x;
        let auto_scale_y = self.auto_scale_y;
        let response = plot.show(ui, |plot_ui| {
            let x_bounds = x_range.or_else(|| data_x_range(series));
            if auto_scale_x {
                if let Some((x_min, x_max)) = x_bounds {
                    let (y_min, y_max) = if auto_scale_y {
                        calculate_y_bounds_for_range(series, x_min, x_max)
                    } else {
                        let current = plot_ui.plot_bounds();
                        (current.min()[1], current.max()[1])
                    };
                    plot_ui.set_plot_bounds(PlotBounds::from_min_max(
                        [x_min, y_min],
                        [x_max, y_max],
                    ));
                }
            }
            self.render_lines(plot_ui, series);
        });

        let interacted = response.response.dragged()
            || (response.response.hovered() && ui.input(|i| i.raw_scroll_delta.y.abs() > 0.0));
        if interacted && !self.lock_x && self.auto_scale_x {
            self.auto_scale_x = false;
        }
        interacted
    }

    fn render_lines(&self, plot_ui: &mut PlotUi, series: &[ChartSeries]) {
        for s in series {
            if s.points.is_empty() {
                continue;
            }

            let line = Line::new(s.name.clone(), PlotPoints::from(s.points.clone()))
                .color(s.color)
                .width(self.line_width);
            plot_ui.line(line);

            if self.show_points {
                let points = Points::new(s.name.clone(), PlotPoints::from(s.points.clone()))
                    .color(s.color)
                    .radius(2.0);
                plot_ui.points(points);
            }
        }
    }
}

/// Format unix seconds as local time
pub fn format_time(secs: f64, format: &str) -> String {
    let millis = (secs * 1000.0).round() as i64;
    match Local.timestamp_millis_opt(millis).single() {
        Some(ts) => ts.format(format).to_string(),
        None => String::new(),
    }
}

fn data_x_range(series: &[ChartSeries]) -> Option<(f64, f64)> {
    let xs = series.iter().flat_map(|s| s.points.iter().map(|p| p[0]));
    let (min, max) = xs.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), x| {
        (lo.min(x), hi.max(x))
    });
    (min.is_finite() && max.is_finite()).then_some((min, max.max(min + 1.0)))
}

/// Calculate Y bounds for data within the given X range
fn calculate_y_bounds_for_range(series: &[ChartSeries], x_min: f64, x_max: f64) -> (f64, f64) {
    let mut y_min = f64::MAX;
    let mut y_max = f64::MIN;

    for point in series.iter().flat_map(|s| s.points.iter()) {
        if point[0] >= x_min && point[0] <= x_max {
            y_min = y_min.min(point[1]);
            y_max = y_max.max(point[1]);
        }
    }

    // Add some padding to Y bounds
    if y_min < f64::MAX && y_max > f64::MIN {
        let y_range = y_max - y_min;
        let padding = if y_range > 0.0 { y_range * 0.1 } else { 1.0 };
        (y_min - padding, y_max + padding)
    } else {
        (-1.0, 1.0)
    }
}

/// Time grid marks on whole minutes/hours/days
fn create_time_grid_marks(bounds: (f64, f64)) -> Vec<GridMark> {
    let (min, max) = bounds;
    let range = max - min;

    const MINUTE: f64 = 60.0;
    const HOUR: f64 = 3600.0;
    const DAY: f64 = 86_400.0;

    let step = if range <= 15.0 * MINUTE {
        MINUTE
    } else if range <= HOUR {
        5.0 * MINUTE
    } else if range <= 3.0 * HOUR {
        15.0 * MINUTE
    } else if range <= 12.0 * HOUR {
        HOUR
    } else if range <= 2.0 * DAY {
        3.0 * HOUR
    } else if range <= 10.0 * DAY {
        12.0 * HOUR
    } else {
        DAY
    };

    if !range.is_finite() || range <= 0.0 || range / step > 500.0 {
        return Vec::new();
    }

    let mut marks = Vec::new();
    let mut current = (min / step).floor() * step;
    while current <= max {
        marks.push(GridMark {
            value: current,
            step_size: step,
        });
        current += step;
    }

    marks
}
