//! Alert handed from the formatter to a broadcaster.

use chrono::{DateTime, Utc};

use super::SeismicEvent;

/// A formatted alert for one event. Never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct AlertRecord {
    pub event: SeismicEvent,
    pub text: String,
    pub emitted_at: DateTime<Utc>,
}

impl AlertRecord {
    pub fn new(event: SeismicEvent, text: String, emitted_at: DateTime<Utc>) -> Self {
        Self {
            event,
            text,
            emitted_at,
        }
    }

    pub fn event_id(&self) -> &str {
        &self.event.id
    }
}
