// src/services/usgs.rs

//! USGS FDSN event feed client.
//!
//! Queries `/fdsnws/event/1/query` for GeoJSON, pushing the region, magnitude
//! floor and time window to the server so responses stay small.

use async_trait::async_trait;
use reqwest::Client;
use url::Url;

use crate::error::{AppError, Result};
use crate::models::{FeedBatch, FeedConfig};
use crate::services::{FeedQuery, FeedSource};
use crate::utils::http;

/// Feed source backed by the USGS event web service.
pub struct UsgsFeed {
    client: Client,
    endpoint: Url,
}

impl UsgsFeed {
    /// Create a feed client with the configured endpoint, timeout and agent.
    pub fn new(config: &FeedConfig) -> Result<Self> {
        Ok(Self {
            client: http::create_client(config)?,
            endpoint: config.endpoint()?,
        })
    }

    /// Full request URL for `query`.
    pub fn query_url(&self, query: &FeedQuery) -> Url {
        let mut url = self.endpoint.clone();
        {
            let mut pairs = url.query_pairs_mut();
            pairs
                .append_pair("format", "geojson")
                .append_pair("orderby", "time-asc")
                .append_pair(
                    "starttime",
                    &query.start_time.format("%Y-%m-%dT%H:%M:%S").to_string(),
                )
                .append_pair("minlatitude", &query.bounds.min_latitude.to_string())
                .append_pair("maxlatitude", &query.bounds.max_latitude.to_string())
                .append_pair("minlongitude", &query.bounds.min_longitude.to_string())
                .append_pair("maxlongitude", &query.bounds.max_longitude.to_string())
                .append_pair("limit", &query.limit.to_string());
            if query.min_magnitude.is_finite() {
                pairs.append_pair("minmagnitude", &query.min_magnitude.to_string());
            }
        }
        url
    }
}

#[async_trait]
impl FeedSource for UsgsFeed {
    async fn fetch(&self, query: &FeedQuery) -> Result<FeedBatch> {
        let url = self.query_url(query);
        log::debug!("Fetching {}", url);

        let response = self.client.get(url.clone()).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(AppError::FeedStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let body = response.text().await?;
        let batch = FeedBatch::from_geojson(&body)?;
        log::debug!(
            "Feed returned {} events ({} skipped, feed count {:?}, generated {})",
            batch.events.len(),
            batch.skipped,
            batch.reported_count,
            batch
                .generated_at
                .map_or_else(|| "at unknown time".to_string(), |t| t.to_rfc3339())
        );
        Ok(batch)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::DateTime;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::models::RegionBounds;

    fn query() -> FeedQuery {
        FeedQuery {
            start_time: DateTime::from_timestamp(1_714_563_296, 0).unwrap(),
            bounds: RegionBounds::new(33.0, 35.0, -120.0, -116.0),
            min_magnitude: 2.0,
            limit: 50,
        }
    }

    fn feed_for(server: &MockServer) -> UsgsFeed {
        let config = FeedConfig {
            scheme: "http".into(),
            host: server.address().to_string(),
            timeout_secs: 1,
            ..FeedConfig::default()
        };
        UsgsFeed::new(&config).unwrap()
    }

    fn collection() -> String {
        json!({
            "type": "FeatureCollection",
            "metadata": { "count": 2 },
            "features": [
                {
                    "type": "Feature",
                    "id": "ci40000001",
                    "properties": { "mag": 4.2, "place": "10 km NE of Ridgecrest, CA", "time": 1_714_566_896_000_i64 },
                    "geometry": { "type": "Point", "coordinates": [-117.6, 35.7, 7.5] }
                },
                {
                    "type": "Feature",
                    "id": "ci40000002",
                    "properties": { "mag": 2.1, "place": "", "time": "not a time" },
                    "geometry": { "type": "Point", "coordinates": [-117.1, 34.1, 3.0] }
                }
            ]
        })
        .to_string()
    }

    #[test]
    fn query_url_carries_region_and_window() {
        let feed = UsgsFeed::new(&FeedConfig::default()).unwrap();
        let url = feed.query_url(&query());

        assert_eq!(url.path(), "/fdsnws/event/1/query");
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        let get = |key: &str| {
            pairs
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.as_str())
        };
        assert_eq!(get("format"), Some("geojson"));
        assert_eq!(get("starttime"), Some("2024-05-01T11:34:56"));
        assert_eq!(get("minlatitude"), Some("33"));
        assert_eq!(get("maxlongitude"), Some("-116"));
        assert_eq!(get("minmagnitude"), Some("2"));
        assert_eq!(get("limit"), Some("50"));
    }

    #[test]
    fn unbounded_magnitude_is_not_sent() {
        let feed = UsgsFeed::new(&FeedConfig::default()).unwrap();
        let mut q = query();
        q.min_magnitude = f64::NEG_INFINITY;
        assert!(!feed.query_url(&q).as_str().contains("minmagnitude"));
    }

    #[tokio::test]
    async fn fetch_decodes_batch_and_skips_bad_records() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/fdsnws/event/1/query"))
            .and(query_param("format", "geojson"))
            .respond_with(ResponseTemplate::new(200).set_body_string(collection()))
            .expect(1)
            .mount(&server)
            .await;

        let batch = feed_for(&server).fetch(&query()).await.unwrap();
        assert_eq!(batch.events.len(), 1);
        assert_eq!(batch.events[0].id, "ci40000001");
        assert_eq!(batch.skipped, 1);
        assert_eq!(batch.reported_count, Some(2));
    }

    #[tokio::test]
    async fn non_success_status_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = feed_for(&server).fetch(&query()).await.unwrap_err();
        assert!(matches!(err, AppError::FeedStatus { status: 503, .. }));
    }

    #[tokio::test]
    async fn malformed_body_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
            .mount(&server)
            .await;

        let err = feed_for(&server).fetch(&query()).await.unwrap_err();
        assert!(matches!(err, AppError::Json(_)));
    }

    #[tokio::test]
    async fn slow_feed_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(collection())
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&server)
            .await;

        let err = feed_for(&server).fetch(&query()).await.unwrap_err();
        assert!(matches!(err, AppError::Http(_)));
    }
}
