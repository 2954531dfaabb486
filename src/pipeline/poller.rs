// src/pipeline/poller.rs

//! The poll loop: fetch, filter, dedupe, format, broadcast.
//!
//! ```text
//!            tick                  batch
//!   Idle ────────────▶ Fetching ──────────▶ Processing ──▶ Idle
//!    ▲                    │ error
//!    └──── retry delay ── Backoff
//! ```
//!
//! Cycles never overlap. An event is marked seen only after its broadcast
//! succeeds, so a failed send is retried on the next cycle while the feed
//! still reports the event.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::Rng;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::models::{AlertRecord, Config, FeedBatch};
use crate::pipeline::backoff::Backoff;
use crate::pipeline::dedupe::DedupeStore;
use crate::pipeline::filter::{GeoFilter, is_significant};
use crate::pipeline::format::{EventFormatter, magnitude_label};
use crate::services::{Broadcaster, FeedQuery, FeedSource};
use crate::utils::clock::{Clock, SystemClock};

/// Where the poller currently is in its cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollerState {
    Idle,
    Fetching,
    Processing,
    /// Waiting to retry after `failures` consecutive fetch failures
    Backoff { failures: u32 },
}

/// Counts from one processed batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Events decoded from the feed
    pub fetched: usize,
    /// Records the decoder skipped
    pub skipped_records: usize,
    /// Events inside the region and above the magnitude floor
    pub admitted: usize,
    /// Admitted events already alerted earlier
    pub duplicates: usize,
    /// Alerts broadcast successfully
    pub alerted: usize,
    /// Alerted events of magnitude 4.0 or more
    pub significant: usize,
    /// Alerts whose broadcast failed
    pub send_failures: usize,
    /// Seen-set entries dropped after the batch
    pub evicted: usize,
}

pub struct FeedPoller {
    config: Arc<Config>,
    source: Box<dyn FeedSource>,
    broadcaster: Box<dyn Broadcaster>,
    clock: Arc<dyn Clock>,
    filter: GeoFilter,
    formatter: EventFormatter,
    seen: DedupeStore,
    backoff: Backoff,
    state: PollerState,
    primed: bool,
    resume_from: Option<DateTime<Utc>>,
}

impl FeedPoller {
    /// Create a poller on the wall clock.
    pub fn new(
        config: Arc<Config>,
        source: Box<dyn FeedSource>,
        broadcaster: Box<dyn Broadcaster>,
    ) -> Self {
        Self::with_clock(config, source, broadcaster, Arc::new(SystemClock))
    }

    pub fn with_clock(
        config: Arc<Config>,
        source: Box<dyn FeedSource>,
        broadcaster: Box<dyn Broadcaster>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let filter = GeoFilter::new(config.bounds(), config.region.min_magnitude);
        let formatter = EventFormatter::new(config.node_location());
        let backoff = Backoff::new(config.poller.interval(), config.poller.max_backoff());
        Self {
            config,
            source,
            broadcaster,
            clock,
            filter,
            formatter,
            seen: DedupeStore::new(),
            backoff,
            state: PollerState::Idle,
            primed: false,
            resume_from: None,
        }
    }

    pub fn state(&self) -> PollerState {
        self.state
    }

    pub fn seen(&self) -> &DedupeStore {
        &self.seen
    }

    pub fn backoff(&self) -> &Backoff {
        &self.backoff
    }

    /// Feed request for a poll starting at `now`.
    ///
    /// Until one fetch has succeeded the query reaches back over the longer
    /// initial window, so history is not lost to a startup outage. After a
    /// full page the query resumes from the newest event of that page.
    pub fn query(&self, now: DateTime<Utc>) -> FeedQuery {
        let lookback = if self.primed {
            self.config.feed.lookback()
        } else {
            self.config.feed.initial_lookback()
        };
        let window_start = now
            .checked_sub_signed(lookback)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        FeedQuery {
            start_time: self.resume_from.unwrap_or(window_start),
            bounds: *self.filter.bounds(),
            min_magnitude: self.filter.min_magnitude(),
            limit: self.config.feed.limit,
        }
    }

    /// Run one fetch and, on success, process the batch.
    ///
    /// A fetch error is returned after it has been counted by the backoff;
    /// the poller is then in the `Backoff` state.
    pub async fn poll_once(&mut self) -> Result<CycleReport> {
        self.state = PollerState::Fetching;
        let query = self.query(self.clock.now());

        match self.source.fetch(&query).await {
            Ok(batch) => {
                self.backoff.record_success();
                self.primed = true;
                self.advance_cursor(&batch);
                Ok(self.process_batch(batch).await)
            }
            Err(e) => {
                let delay = self.backoff.record_failure();
                self.state = PollerState::Backoff {
                    failures: self.backoff.failures(),
                };
                log::warn!(
                    "Feed fetch failed ({} in a row), retrying in {}s: {}",
                    self.backoff.failures(),
                    delay.as_secs(),
                    e
                );
                Err(e)
            }
        }
    }

    /// Track where the next query starts when `batch` filled the page.
    ///
    /// The feed is asked for oldest events first, so a full page may leave
    /// newer events behind; the next query starts at the newest event seen.
    fn advance_cursor(&mut self, batch: &FeedBatch) {
        let limit = usize::try_from(self.config.feed.limit).unwrap_or(usize::MAX);
        if batch.record_count() < limit {
            if self.resume_from.take().is_some() {
                log::info!("Caught up with the feed");
            }
            return;
        }

        match batch.newest_event_time() {
            Some(newest) if self.resume_from.is_none_or(|from| newest > from) => {
                log::warn!(
                    "Feed returned a full page of {} records, next poll resumes from {}",
                    limit,
                    newest.to_rfc3339()
                );
                self.resume_from = Some(newest);
            }
            _ => {
                log::warn!(
                    "Feed returned a full page of {} records without newer events; raise feed.limit to avoid missing alerts",
                    limit
                );
                self.resume_from = None;
            }
        }
    }

    /// Alert on every admitted, unseen event of `batch`, in feed order, then
    /// evict seen entries past the retention window.
    pub async fn process_batch(&mut self, batch: FeedBatch) -> CycleReport {
        self.state = PollerState::Processing;
        let mut report = CycleReport {
            fetched: batch.events.len(),
            skipped_records: batch.skipped,
            ..CycleReport::default()
        };

        for event in batch.events {
            if !self.filter.admit(&event) {
                log::debug!("Ignoring {} (outside region or below magnitude)", event.id);
                continue;
            }
            report.admitted += 1;

            if self.seen.has_seen(&event.id) {
                report.duplicates += 1;
                continue;
            }

            let text = self.formatter.format(&event);
            let alert = AlertRecord::new(event, text, self.clock.now());
            match self.broadcaster.send(&alert).await {
                Ok(()) => {
                    self.seen.mark_seen(alert.event_id(), self.clock.now());
                    report.alerted += 1;
                    log::info!(
                        "Alerted {} (M{} {}) to {}",
                        alert.event_id(),
                        magnitude_label(&alert.event),
                        alert.event.place,
                        self.broadcaster.destination()
                    );
                    log::debug!("{}: {}", alert.event_id(), alert.event.source_summary());
                    if is_significant(&alert.event) {
                        report.significant += 1;
                        log::warn!(
                            "Significant earthquake: M{} {} at {}",
                            magnitude_label(&alert.event),
                            alert.event.place,
                            alert.event.occurred_at.format("%Y-%m-%d %H:%M:%S UTC")
                        );
                    }
                }
                Err(e) => {
                    report.send_failures += 1;
                    log::warn!(
                        "Broadcast of {} failed, will retry next poll: {}",
                        alert.event_id(),
                        e
                    );
                }
            }
        }

        let now = self.clock.now();
        let cutoff = now
            .checked_sub_signed(self.config.poller.retention())
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        report.evicted = self.seen.evict_older_than(cutoff);

        self.state = PollerState::Idle;
        report
    }

    /// Wait before the next fetch: the poll interval, or the backoff delay
    /// after failures, plus random jitter when configured.
    pub fn next_delay(&self) -> Duration {
        let delay = self.backoff.delay();
        let jitter_ms = u64::try_from(self.config.poller.jitter().as_millis()).unwrap_or(u64::MAX);
        if jitter_ms == 0 {
            return delay;
        }
        delay + Duration::from_millis(rand::rng().random_range(0..=jitter_ms))
    }

    /// Poll until `cancel` fires. Feed and broadcast failures never end the
    /// loop; cancellation interrupts both the fetch and the wait.
    ///
    /// Delays are measured from the start of each cycle, so time spent
    /// broadcasting does not push the schedule back.
    pub async fn run(&mut self, cancel: CancellationToken) {
        log::info!(
            "Polling every {}s for M{}+ in lat [{}, {}] lon [{}, {}]",
            self.config.poller.interval_secs,
            self.filter.min_magnitude(),
            self.filter.bounds().min_latitude,
            self.filter.bounds().max_latitude,
            self.filter.bounds().min_longitude,
            self.filter.bounds().max_longitude,
        );

        loop {
            let cycle_started = Instant::now();
            let outcome = tokio::select! {
                _ = cancel.cancelled() => break,
                outcome = self.poll_once() => outcome,
            };

            if let Ok(report) = outcome {
                log::info!(
                    "Poll complete: {} fetched, {} admitted, {} alerted ({} significant), {} duplicate, {} send failures, {} skipped, {} evicted ({} remembered)",
                    report.fetched,
                    report.admitted,
                    report.alerted,
                    report.significant,
                    report.duplicates,
                    report.send_failures,
                    report.skipped_records,
                    report.evicted,
                    self.seen.len()
                );
            }

            let next_poll = cycle_started + self.next_delay();
            log::debug!(
                "Next poll in {:?}",
                next_poll.saturating_duration_since(Instant::now())
            );
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep_until(next_poll) => {}
            }
        }

        self.state = PollerState::Idle;
        log::info!("Poller stopped");
    }
}
