//! Telemetry snapshot builder
//!
//! Assembles a point-in-time readable report from surface and engine
//! introspection. Snapshots are rebuilt fresh on every poll tick, never
//! cached or mutated in place, and a row is simply omitted when the
//! underlying value is unavailable.

use serde::{Deserialize, Serialize};

use crate::{strategy::DeliveryStrategy, surface::PlaybackSurface, types::TimeRange};

/// One line of the telemetry report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TelemetryRow {
    Entry { label: String, value: String },
    Divider,
}

impl TelemetryRow {
    pub fn entry(label: impl Into<String>, value: impl Into<String>) -> Self {
        TelemetryRow::Entry {
            label: label.into(),
            value: value.into(),
        }
    }
}

/// Seconds buffered ahead of `position`: the end boundary of the buffered
/// interval containing the position, minus the position. Absent when no
/// interval contains it.
pub fn buffer_ahead(ranges: &[TimeRange], position: f64) -> Option<f64> {
    ranges
        .iter()
        .find(|range| range.contains(position))
        .map(|range| range.end - position)
}

/// Render seconds as `m:ss` or `h:mm:ss`
pub fn format_time(seconds: f64) -> String {
    let total = seconds.max(0.0) as u64;
    let (h, m, s) = (total / 3600, (total % 3600) / 60, total % 60);
    if h > 0 {
        format!("{h}:{m:02}:{s:02}")
    } else {
        format!("{m}:{s:02}")
    }
}

/// Build a snapshot from the surface and the active strategy.
///
/// Never raises on missing capabilities; engine-specific rows appear only
/// when the active strategy provides them, preceded by a divider.
pub fn build_snapshot(
    surface: &dyn PlaybackSurface,
    strategy: Option<&dyn DeliveryStrategy>,
) -> Vec<TelemetryRow> {
    let mut rows = Vec::new();

    if let Some(size) = surface.video_size() {
        rows.push(TelemetryRow::entry("Resolution", size.to_string()));
    }
    if let Some(viewport) = surface.viewport_size() {
        rows.push(TelemetryRow::entry("Viewport", viewport.to_string()));
    }
    rows.push(TelemetryRow::entry(
        "Playback Rate",
        format!("{:.2}x", surface.playback_rate()),
    ));

    let position = surface.current_time();
    if let Some(duration) = surface.duration() {
        rows.push(TelemetryRow::entry(
            "Time",
            format!("{} / {}", format_time(position), format_time(duration)),
        ));
    }

    if let Some(ahead) = buffer_ahead(&surface.buffered(), position) {
        rows.push(TelemetryRow::entry("Buffer Ahead", format!("{ahead:.1}s")));
    }

    if let Some(stats) = surface.frame_stats() {
        if stats.total > 0 {
            rows.push(TelemetryRow::entry(
                "Dropped Frames",
                format!(
                    "{} / {} ({:.2}%)",
                    stats.dropped,
                    stats.total,
                    stats.drop_percent()
                ),
            ));
        }
    }

    if let Some(strategy) = strategy {
        let engine_rows = strategy.describe();
        if !engine_rows.is_empty() {
            rows.push(TelemetryRow::Divider);
            rows.extend(engine_rows);
        }
    }

    if let Some(connection) = surface.connection_info() {
        rows.push(TelemetryRow::Divider);
        rows.push(TelemetryRow::entry(
            "Downlink",
            format!("{:.1} Mbps", connection.downlink_mbps),
        ));
        rows.push(TelemetryRow::entry("Network Type", connection.effective_type));
    }

    rows
}
