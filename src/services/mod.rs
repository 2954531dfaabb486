//! Service layer for the quake relay.
//!
//! This module contains the collaborators the poller talks to:
//! - Earthquake feed access (`FeedSource`, implemented by `UsgsFeed`)
//! - Alert delivery (`Broadcaster`, implemented by `MeshBroadcaster`)

mod mesh;
pub mod meshtastic;
mod usgs;

pub use mesh::{MeshBroadcaster, node_id, pseudo_node_num};
pub use usgs::UsgsFeed;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::models::{AlertRecord, FeedBatch, RegionBounds};

/// Parameters of one feed request.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedQuery {
    /// Earliest event time to return
    pub start_time: DateTime<Utc>,
    pub bounds: RegionBounds,
    pub min_magnitude: f64,
    pub limit: u32,
}

/// Source of seismic event batches.
#[async_trait]
pub trait FeedSource: Send + Sync {
    /// Fetch and decode one batch.
    ///
    /// Any transport, status or top-level payload problem is an error;
    /// undecodable individual records are skipped inside the batch.
    async fn fetch(&self, query: &FeedQuery) -> Result<FeedBatch>;
}

/// Delivery of formatted alerts.
#[async_trait]
pub trait Broadcaster: Send + Sync {
    /// Send one alert. An error means the alert did not go out.
    async fn send(&self, alert: &AlertRecord) -> Result<()>;

    /// Human-readable destination, for logs.
    fn destination(&self) -> String;
}
