// src/models/mod.rs

//! Domain models for the quake relay.
//!
//! This module contains the data structures shared by the pipeline and the
//! feed/mesh services, organized by their primary purpose.

mod alert;
mod config;
mod event;
mod region;

// Re-export all public types
pub use alert::AlertRecord;
pub use config::{
    Config, FeedConfig, LoggingConfig, MeshConfig, NodeConfig, PollerConfig, RegionConfig,
};
pub use event::{FeedBatch, SeismicEvent};
pub use region::{GeoPoint, RegionBounds};
