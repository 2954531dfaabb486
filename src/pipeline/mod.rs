//! Alert pipeline.
//!
//! - `filter`: region and magnitude admission
//! - `dedupe`: memory of already-alerted events
//! - `format`: alert text rendering
//! - `backoff`: retry delay after failed fetches
//! - `poller`: the loop tying them to a feed and a broadcaster

pub mod backoff;
pub mod dedupe;
pub mod filter;
pub mod format;
pub mod poller;

pub use backoff::Backoff;
pub use dedupe::DedupeStore;
pub use filter::{GeoFilter, SIGNIFICANT_MAGNITUDE, admit, is_significant};
pub use format::{EventFormatter, format_event};
pub use poller::{CycleReport, FeedPoller, PollerState};
