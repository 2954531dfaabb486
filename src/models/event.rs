//! Seismic event records and decoding of the USGS GeoJSON feed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{AppError, Result};

/// A single earthquake as reported by the feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeismicEvent {
    /// Feed-assigned identifier, stable across revisions
    pub id: String,

    /// Magnitude; `None` when the feed has not published one yet
    pub magnitude: Option<f64>,

    pub latitude: f64,
    pub longitude: f64,

    /// Hypocentre depth in kilometres
    pub depth_km: f64,

    /// Free-text location, may be empty
    pub place: String,

    pub occurred_at: DateTime<Utc>,

    /// Review status ("automatic", "reviewed", ...)
    #[serde(default)]
    pub status: Option<String>,

    /// Event detail page
    #[serde(default)]
    pub url: Option<String>,
}

impl SeismicEvent {
    /// Decode one GeoJSON feature.
    pub fn from_feature(feature: Value) -> Result<Self> {
        let feature: Feature = serde_json::from_value(feature)?;

        let [longitude, latitude, rest @ ..] = feature.geometry.coordinates.as_slice() else {
            return Err(AppError::feed(format!(
                "event {} has fewer than two coordinates",
                feature.id
            )));
        };
        let depth_km = rest.first().copied().unwrap_or(0.0);

        let occurred_at = DateTime::from_timestamp_millis(feature.properties.time).ok_or_else(
            || {
                AppError::feed(format!(
                    "event {} has out-of-range time {}",
                    feature.id, feature.properties.time
                ))
            },
        )?;

        Ok(Self {
            id: feature.id,
            magnitude: feature.properties.mag,
            latitude: *latitude,
            longitude: *longitude,
            depth_km,
            place: feature.properties.place.unwrap_or_default(),
            occurred_at,
            status: feature.properties.status,
            url: feature.properties.url,
        })
    }

    /// Review status and detail page, for log lines.
    pub fn source_summary(&self) -> String {
        format!(
            "status {}, {}",
            self.status.as_deref().unwrap_or("unknown"),
            self.url.as_deref().unwrap_or("no detail page")
        )
    }
}

/// Events decoded from one successful fetch.
#[derive(Debug, Clone, Default)]
pub struct FeedBatch {
    /// Usable events, in the order the feed reported them
    pub events: Vec<SeismicEvent>,

    /// Records dropped because they could not be decoded
    pub skipped: usize,

    /// Event count claimed by the feed metadata
    pub reported_count: Option<u64>,

    /// When the feed generated this response
    pub generated_at: Option<DateTime<Utc>>,
}

impl FeedBatch {
    pub fn new(events: Vec<SeismicEvent>) -> Self {
        Self {
            events,
            ..Self::default()
        }
    }

    /// Records in the response, decoded or not.
    pub fn record_count(&self) -> usize {
        self.events.len() + self.skipped
    }

    /// Latest origin time among the decoded events.
    pub fn newest_event_time(&self) -> Option<DateTime<Utc>> {
        self.events.iter().map(|e| e.occurred_at).max()
    }

    /// Decode a GeoJSON FeatureCollection.
    ///
    /// A body that is not a FeatureCollection is an error. Individual
    /// features that fail to decode are logged and counted in `skipped`.
    pub fn from_geojson(body: &str) -> Result<Self> {
        let collection: FeatureCollection = serde_json::from_str(body)?;

        let mut batch = FeedBatch {
            reported_count: collection.metadata.as_ref().and_then(|m| m.count),
            generated_at: collection
                .metadata
                .as_ref()
                .and_then(|m| m.generated)
                .and_then(DateTime::from_timestamp_millis),
            ..FeedBatch::default()
        };

        for (index, feature) in collection.features.into_iter().enumerate() {
            match SeismicEvent::from_feature(feature) {
                Ok(event) => batch.events.push(event),
                Err(e) => {
                    batch.skipped += 1;
                    log::warn!("Skipping malformed feed record #{}: {}", index, e);
                }
            }
        }

        Ok(batch)
    }
}

// --- GeoJSON wire shapes ---

#[derive(Deserialize)]
struct FeatureCollection {
    #[serde(default)]
    metadata: Option<Metadata>,
    features: Vec<Value>,
}

#[derive(Deserialize)]
struct Metadata {
    #[serde(default)]
    generated: Option<i64>,
    #[serde(default)]
    count: Option<u64>,
}

#[derive(Deserialize)]
struct Feature {
    id: String,
    properties: Properties,
    geometry: Geometry,
}

#[derive(Deserialize)]
struct Properties {
    #[serde(default)]
    mag: Option<f64>,
    #[serde(default)]
    place: Option<String>,
    time: i64,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    url: Option<String>,
}

#[derive(Deserialize)]
struct Geometry {
    coordinates: Vec<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn feature(id: &str, mag: Value) -> Value {
        json!({
            "type": "Feature",
            "id": id,
            "properties": {
                "mag": mag,
                "place": "10 km NE of Ridgecrest, CA",
                "time": 1_714_566_896_000_i64,
                "status": "reviewed",
                "url": "https://earthquake.usgs.gov/earthquakes/eventpage/ci1"
            },
            "geometry": { "type": "Point", "coordinates": [-117.6, 35.7, 7.5] }
        })
    }

    #[test]
    fn decodes_feature_fields() {
        let event = SeismicEvent::from_feature(feature("ci1", json!(4.2))).unwrap();
        assert_eq!(event.id, "ci1");
        assert_eq!(event.magnitude, Some(4.2));
        assert_eq!(event.latitude, 35.7);
        assert_eq!(event.longitude, -117.6);
        assert_eq!(event.depth_km, 7.5);
        assert_eq!(event.place, "10 km NE of Ridgecrest, CA");
        assert_eq!(
            event.occurred_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            "2024-05-01 12:34:56"
        );
        assert_eq!(event.status.as_deref(), Some("reviewed"));
    }

    #[test]
    fn null_magnitude_is_absent() {
        let event = SeismicEvent::from_feature(feature("ci2", Value::Null)).unwrap();
        assert_eq!(event.magnitude, None);
    }

    #[test]
    fn missing_depth_defaults_to_zero() {
        let mut value = feature("ci3", json!(2.5));
        value["geometry"]["coordinates"] = json!([-117.6, 35.7]);
        assert_eq!(SeismicEvent::from_feature(value).unwrap().depth_km, 0.0);
    }

    #[test]
    fn batch_skips_bad_records() {
        let mut broken = feature("ci4", json!(3.0));
        broken["geometry"]["coordinates"] = json!([-117.6]);
        let body = json!({
            "type": "FeatureCollection",
            "metadata": { "generated": 1_714_566_900_000_i64, "count": 3 },
            "features": [feature("ci1", json!(4.2)), broken, { "id": 7 }],
        })
        .to_string();

        let batch = FeedBatch::from_geojson(&body).unwrap();
        assert_eq!(batch.events.len(), 1);
        assert_eq!(batch.skipped, 2);
        assert_eq!(batch.reported_count, Some(3));
        assert_eq!(
            batch.generated_at,
            DateTime::from_timestamp_millis(1_714_566_900_000)
        );
        assert_eq!(batch.record_count(), 3);
    }

    #[test]
    fn source_summary_names_status_and_page() {
        let body = json!({
            "type": "FeatureCollection",
            "features": [feature("ci1", json!(4.2))],
        })
        .to_string();
        let mut event = FeedBatch::from_geojson(&body).unwrap().events.remove(0);
        assert_eq!(
            event.source_summary(),
            "status reviewed, https://earthquake.usgs.gov/earthquakes/eventpage/ci1"
        );

        event.status = None;
        event.url = None;
        assert_eq!(event.source_summary(), "status unknown, no detail page");
    }

    #[test]
    fn batch_rejects_non_collection() {
        assert!(FeedBatch::from_geojson("{\"error\": \"busy\"}").is_err());
        assert!(FeedBatch::from_geojson("<html>").is_err());
    }
}
