// src/pipeline/format.rs

//! Alert text rendering.

use unicode_segmentation::UnicodeSegmentation;

use crate::models::{GeoPoint, SeismicEvent};
use crate::utils::geo::distance_km;

/// Header line of every alert.
pub const ALERT_HEADER: &str = "🚨 EARTHQUAKE ALERT 🚨";

/// Placeholder for events without a place description.
pub const UNKNOWN_PLACE: &str = "Unknown location";

/// Longest mesh node long name, in grapheme clusters.
const LONG_NAME_MAX: usize = 20;

/// Render the alert text for `event` as seen from `node`.
///
/// ```text
/// 🚨 EARTHQUAKE ALERT 🚨
/// M4.2 - 10 km NE of Ridgecrest, CA
/// 2024-05-01 12:34:56 UTC
/// Depth: 7.5 km | 193 km away
/// ```
pub fn format_event(event: &SeismicEvent, node: GeoPoint) -> String {
    let distance = distance_km(node, GeoPoint::new(event.latitude, event.longitude));
    format!(
        "{ALERT_HEADER}\nM{} - {}\n{}\nDepth: {:.1} km | {} km away",
        magnitude_label(event),
        place_label(event),
        event.occurred_at.format("%Y-%m-%d %H:%M:%S UTC"),
        event.depth_km,
        distance
    )
}

/// Magnitude with one decimal, `?` when unknown.
pub fn magnitude_label(event: &SeismicEvent) -> String {
    match event.magnitude {
        Some(mag) => format!("{mag:.1}"),
        None => "?".to_string(),
    }
}

fn place_label(event: &SeismicEvent) -> &str {
    let place = event.place.trim();
    if place.is_empty() { UNKNOWN_PLACE } else { place }
}

/// Mesh short name for an event's pseudo node.
pub fn short_name(event: &SeismicEvent) -> String {
    magnitude_label(event)
}

/// Mesh long name for an event's pseudo node: the place, cut to 20 graphemes.
pub fn long_name(event: &SeismicEvent) -> String {
    place_label(event).graphemes(true).take(LONG_NAME_MAX).collect()
}

/// Formatter bound to this node's location.
#[derive(Debug, Clone, Copy)]
pub struct EventFormatter {
    node: GeoPoint,
}

impl EventFormatter {
    pub fn new(node: GeoPoint) -> Self {
        Self { node }
    }

    pub fn format(&self, event: &SeismicEvent) -> String {
        format_event(event, self.node)
    }
}
