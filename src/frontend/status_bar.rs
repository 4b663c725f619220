//! Status bar panel: bottom bar showing backend, feed, request counters
//! and the last error.

use egui::{Color32, RichText, Ui};
use rust_i18n::t;

use crate::frontend::widgets::feed_status_color;
use crate::i18n::feed_status_label;
use crate::types::{BackendStats, FeedStatus};

/// Context needed to render the status bar.
pub struct StatusBarContext<'a> {
    pub backend_name: &'a str,
    pub feed_status: Option<FeedStatus>,
    pub stats: &'a BackendStats,
    pub signed_in_as: Option<&'a str>,
    pub last_error: Option<&'a str>,
}

/// Render the status bar.
pub fn render_status_bar(ui: &mut Ui, ctx: &StatusBarContext<'_>) {
    ui.horizontal(|ui| {
        ui.spacing_mut().item_spacing.x = 8.0;

        // === Backend ===
        ui.label(RichText::new(format!("{}: {}", t!("status.backend"), ctx.backend_name)).small());

        // === Feed of the active view ===
        if let Some(status) = ctx.feed_status {
            ui.separator();
            ui.colored_label(feed_status_color(status), "●");
            ui.label(RichText::new(feed_status_label(status)).small());
        }

        ui.separator();

        let stats = ctx.stats;
        ui.label(RichText::new(t!("status.requests", ok = stats.requests_ok)).small());

        let error_color = if stats.requests_failed > 0 {
            Color32::LIGHT_RED
        } else {
            Color32::GRAY
        };
        ui.colored_label(
            error_color,
            RichText::new(t!("status.failed", count = stats.requests_failed)).small(),
        );

        ui.separator();
        ui.label(RichText::new(t!("status.events", count = stats.events_received)).small());

        if let Some(email) = ctx.signed_in_as {
            ui.separator();
            ui.label(RichText::new(email).small());
        }

        // === Error message (right-aligned) ===
        if let Some(error) = ctx.last_error {
            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                ui.colored_label(Color32::RED, RichText::new(error).small());
            });
        }
    });
}
