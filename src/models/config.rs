//! Application configuration structures.

use std::fs;
use std::path::Path;
use std::time::Duration;

use chrono::TimeDelta;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{AppError, Result};
use crate::models::{GeoPoint, RegionBounds};

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Earthquake feed endpoint and query settings
    #[serde(default)]
    pub feed: FeedConfig,

    /// Area and magnitude floor to alert on
    #[serde(default)]
    pub region: RegionConfig,

    /// Poll loop timing
    #[serde(default)]
    pub poller: PollerConfig,

    /// Location of this node, for distance reporting
    #[serde(default)]
    pub node: NodeConfig,

    /// Mesh radio broadcast settings
    #[serde(default)]
    pub mesh: MeshConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration from `path` when it exists, defaults otherwise.
    ///
    /// A file that exists but does not parse is an error.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            log::info!("No config file at {:?}. Using defaults.", path);
            Ok(Self::default())
        }
    }

    /// Apply overrides from the process environment.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from a key lookup using the `EARTHQUAKE_*` names.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        let float = |key: &str| -> Result<Option<f64>> {
            lookup(key)
                .map(|raw| {
                    raw.trim().parse::<f64>().map_err(|e| {
                        AppError::config(format!("{key}={raw:?} is not a number: {e}"))
                    })
                })
                .transpose()
        };

        if let Some(v) = float("EARTHQUAKE_MIN_LATITUDE")? {
            self.region.min_latitude = v;
        }
        if let Some(v) = float("EARTHQUAKE_MAX_LATITUDE")? {
            self.region.max_latitude = v;
        }
        if let Some(v) = float("EARTHQUAKE_MIN_LONGITUDE")? {
            self.region.min_longitude = v;
        }
        if let Some(v) = float("EARTHQUAKE_MAX_LONGITUDE")? {
            self.region.max_longitude = v;
        }
        if let Some(v) = float("EARTHQUAKE_MIN_MAGNITUDE")? {
            self.region.min_magnitude = v;
        }
        if let Some(v) = float("NODE_LATITUDE")? {
            self.node.latitude = Some(v);
        }
        if let Some(v) = float("NODE_LONGITUDE")? {
            self.node.longitude = Some(v);
        }
        if let Some(host) = lookup("USGS_HOST") {
            self.feed.host = host.trim().to_string();
        }
        if let Some(destination) = lookup("MESH_DESTINATION") {
            self.mesh.destination = destination.trim().to_string();
        }
        Ok(())
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        let r = &self.region;
        for (name, value) in [
            ("region.min_latitude", r.min_latitude),
            ("region.max_latitude", r.max_latitude),
        ] {
            if !(-90.0..=90.0).contains(&value) {
                return Err(AppError::validation(format!(
                    "{name} must be within [-90, 90], got {value}"
                )));
            }
        }
        for (name, value) in [
            ("region.min_longitude", r.min_longitude),
            ("region.max_longitude", r.max_longitude),
        ] {
            if !(-180.0..=180.0).contains(&value) {
                return Err(AppError::validation(format!(
                    "{name} must be within [-180, 180], got {value}"
                )));
            }
        }
        if r.min_latitude > r.max_latitude {
            return Err(AppError::validation(
                "region.min_latitude is greater than region.max_latitude",
            ));
        }
        if r.min_magnitude.is_nan() {
            return Err(AppError::validation("region.min_magnitude is NaN"));
        }
        if self.bounds().crosses_antimeridian() {
            log::warn!(
                "Region crosses the antimeridian ({} > {}); such boxes are unsupported and no event will be admitted",
                r.min_longitude,
                r.max_longitude
            );
        }

        if self.feed.host.trim().is_empty() {
            return Err(AppError::validation("feed.host is empty"));
        }
        if self.feed.timeout_secs == 0 {
            return Err(AppError::validation("feed.timeout_secs must be > 0"));
        }
        if self.feed.limit == 0 {
            return Err(AppError::validation("feed.limit must be > 0"));
        }
        if self.feed.lookback_secs == 0 {
            return Err(AppError::validation("feed.lookback_secs must be > 0"));
        }
        self.feed.endpoint()?;

        let p = &self.poller;
        if p.interval_secs == 0 {
            return Err(AppError::validation("poller.interval_secs must be > 0"));
        }
        if p.max_backoff_secs < p.interval_secs {
            return Err(AppError::validation(
                "poller.max_backoff_secs must be >= poller.interval_secs",
            ));
        }
        if p.retention_secs <= self.feed.lookback_secs {
            return Err(AppError::validation(format!(
                "poller.retention_secs ({}) must exceed feed.lookback_secs ({})",
                p.retention_secs, self.feed.lookback_secs
            )));
        }

        match (self.node.latitude, self.node.longitude) {
            (Some(lat), Some(lon)) => {
                if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
                    return Err(AppError::validation(format!(
                        "node location ({lat}, {lon}) is out of range"
                    )));
                }
            }
            (None, None) => {}
            _ => {
                return Err(AppError::validation(
                    "node.latitude and node.longitude must be set together",
                ));
            }
        }

        let port = self
            .mesh
            .destination
            .rsplit_once(':')
            .and_then(|(host, port)| (!host.is_empty()).then_some(port))
            .and_then(|port| port.parse::<u16>().ok());
        if port.is_none() {
            return Err(AppError::validation(format!(
                "mesh.destination {:?} is not host:port",
                self.mesh.destination
            )));
        }
        if self.mesh.hop_limit > 7 {
            return Err(AppError::validation("mesh.hop_limit must be <= 7"));
        }
        if self.mesh.node_num == 0 || self.mesh.node_num == u32::MAX {
            return Err(AppError::validation(
                "mesh.node_num must not be 0 or the broadcast address",
            ));
        }
        Ok(())
    }

    /// Configured bounding box.
    pub fn bounds(&self) -> RegionBounds {
        RegionBounds::new(
            self.region.min_latitude,
            self.region.max_latitude,
            self.region.min_longitude,
            self.region.max_longitude,
        )
    }

    /// Node location, falling back to the centre of the region.
    pub fn node_location(&self) -> GeoPoint {
        match (self.node.latitude, self.node.longitude) {
            (Some(lat), Some(lon)) => GeoPoint::new(lat, lon),
            _ => self.bounds().center(),
        }
    }
}

/// Feed endpoint and query settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    /// URL scheme, `https` unless talking to a local mirror
    #[serde(default = "defaults::scheme")]
    pub scheme: String,

    /// Feed host, optionally with a port
    #[serde(default = "defaults::host")]
    pub host: String,

    /// FDSN event query path
    #[serde(default = "defaults::path")]
    pub path: String,

    /// User-Agent header for feed requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Maximum events per query
    #[serde(default = "defaults::limit")]
    pub limit: u32,

    /// History requested on regular polls
    #[serde(default = "defaults::lookback")]
    pub lookback_secs: u64,

    /// History requested until the first successful poll
    #[serde(default = "defaults::initial_lookback")]
    pub initial_lookback_secs: u64,
}

impl FeedConfig {
    /// Full query endpoint without parameters.
    pub fn endpoint(&self) -> Result<Url> {
        let url = Url::parse(&format!("{}://{}", self.scheme, self.host))?;
        Ok(url.join(&self.path)?)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn lookback(&self) -> TimeDelta {
        seconds(self.lookback_secs)
    }

    pub fn initial_lookback(&self) -> TimeDelta {
        seconds(self.initial_lookback_secs.max(self.lookback_secs))
    }
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            scheme: defaults::scheme(),
            host: defaults::host(),
            path: defaults::path(),
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            limit: defaults::limit(),
            lookback_secs: defaults::lookback(),
            initial_lookback_secs: defaults::initial_lookback(),
        }
    }
}

/// Bounding box and magnitude floor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegionConfig {
    #[serde(default = "defaults::min_latitude")]
    pub min_latitude: f64,
    #[serde(default = "defaults::max_latitude")]
    pub max_latitude: f64,
    #[serde(default = "defaults::min_longitude")]
    pub min_longitude: f64,
    #[serde(default = "defaults::max_longitude")]
    pub max_longitude: f64,

    /// Events below this magnitude are ignored
    #[serde(default = "defaults::min_magnitude")]
    pub min_magnitude: f64,
}

impl Default for RegionConfig {
    fn default() -> Self {
        Self {
            min_latitude: defaults::min_latitude(),
            max_latitude: defaults::max_latitude(),
            min_longitude: defaults::min_longitude(),
            max_longitude: defaults::max_longitude(),
            min_magnitude: defaults::min_magnitude(),
        }
    }
}

/// Poll loop timing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollerConfig {
    /// Delay between successful polls
    #[serde(default = "defaults::interval")]
    pub interval_secs: u64,

    /// Ceiling for the retry delay after failed polls
    #[serde(default = "defaults::max_backoff")]
    pub max_backoff_secs: u64,

    /// Random extra delay added to each wait, 0 disables
    #[serde(default)]
    pub jitter_secs: u64,

    /// How long an alerted event id is remembered
    #[serde(default = "defaults::retention")]
    pub retention_secs: u64,
}

impl PollerConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_secs(self.max_backoff_secs)
    }

    pub fn jitter(&self) -> Duration {
        Duration::from_secs(self.jitter_secs)
    }

    pub fn retention(&self) -> TimeDelta {
        seconds(self.retention_secs)
    }
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval_secs: defaults::interval(),
            max_backoff_secs: defaults::max_backoff(),
            jitter_secs: 0,
            retention_secs: defaults::retention(),
        }
    }
}

/// Location of the receiving node.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeConfig {
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
}

/// Mesh radio broadcast settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeshConfig {
    /// Datagram destination as host:port
    #[serde(default = "defaults::destination")]
    pub destination: String,

    /// Multicast TTL
    #[serde(default = "defaults::ttl")]
    pub ttl: u32,

    /// Node number packets are sent from
    #[serde(default = "defaults::node_num")]
    pub node_num: u32,

    /// Channel index
    #[serde(default)]
    pub channel: u32,

    /// Mesh hop limit (0-7)
    #[serde(default = "defaults::hop_limit")]
    pub hop_limit: u32,

    /// Send each event from its own pseudo node with node info and position
    #[serde(default = "defaults::announce_event_nodes")]
    pub announce_event_nodes: bool,

    /// Pause between packets of one alert, in milliseconds
    #[serde(default = "defaults::packet_delay")]
    pub packet_delay_ms: u64,
}

impl MeshConfig {
    pub fn packet_delay(&self) -> Duration {
        Duration::from_millis(self.packet_delay_ms)
    }
}

impl Default for MeshConfig {
    fn default() -> Self {
        Self {
            destination: defaults::destination(),
            ttl: defaults::ttl(),
            node_num: defaults::node_num(),
            channel: 0,
            hop_limit: defaults::hop_limit(),
            announce_event_nodes: defaults::announce_event_nodes(),
            packet_delay_ms: defaults::packet_delay(),
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset
    #[serde(default = "defaults::level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::level(),
        }
    }
}

fn seconds(secs: u64) -> TimeDelta {
    i64::try_from(secs)
        .ok()
        .and_then(TimeDelta::try_seconds)
        .unwrap_or(TimeDelta::MAX)
}

mod defaults {
    // Feed defaults
    pub fn scheme() -> String {
        "https".into()
    }
    pub fn host() -> String {
        "earthquake.usgs.gov".into()
    }
    pub fn path() -> String {
        "/fdsnws/event/1/query".into()
    }
    pub fn user_agent() -> String {
        concat!("udpquake/", env!("CARGO_PKG_VERSION")).into()
    }
    pub fn timeout() -> u64 {
        30
    }
    pub fn limit() -> u32 {
        50
    }
    pub fn lookback() -> u64 {
        60 * 60
    }
    pub fn initial_lookback() -> u64 {
        72 * 60 * 60
    }

    // Region defaults (Southern California)
    pub fn min_latitude() -> f64 {
        33.0
    }
    pub fn max_latitude() -> f64 {
        35.0
    }
    pub fn min_longitude() -> f64 {
        -120.0
    }
    pub fn max_longitude() -> f64 {
        -116.0
    }
    pub fn min_magnitude() -> f64 {
        2.0
    }

    // Poller defaults
    pub fn interval() -> u64 {
        60
    }
    pub fn max_backoff() -> u64 {
        600
    }
    pub fn retention() -> u64 {
        2 * 60 * 60
    }

    // Mesh defaults
    pub fn destination() -> String {
        "224.0.0.69:4403".into()
    }
    pub fn ttl() -> u32 {
        1
    }
    pub fn node_num() -> u32 {
        0x7571_6b65
    }
    pub fn hop_limit() -> u32 {
        3
    }
    pub fn announce_event_nodes() -> bool {
        true
    }
    pub fn packet_delay() -> u64 {
        3000
    }

    pub fn level() -> String {
        "info".into()
    }
}
