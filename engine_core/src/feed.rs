// Feed health, bounded retry and poll scheduling.
// The host performs the fetches; this module decides when and records how they went.
// A failed cycle never touches previously ingested data.

use serde::{Deserialize, Serialize};

use crate::types::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedKind {
    News,
    Seismic,
    Warning,
}

impl FeedKind {
    pub const ALL: [FeedKind; 3] = [FeedKind::News, FeedKind::Seismic, FeedKind::Warning];

    fn index(self) -> usize {
        match self {
            FeedKind::News => 0,
            FeedKind::Seismic => 1,
            FeedKind::Warning => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedStatus {
    /// No fetch has completed yet.
    #[default]
    Loading,
    Fresh,
    /// Data arrived but the upstream reported itself degraded.
    Stale,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedHealth {
    pub feed: FeedKind,
    pub status: FeedStatus,
    pub last_updated: Option<Timestamp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl FeedHealth {
    fn new(feed: FeedKind) -> Self {
        FeedHealth {
            feed,
            status: FeedStatus::Loading,
            last_updated: None,
            last_error: None,
        }
    }
}

pub struct FeedMonitor {
    feeds: [FeedHealth; 3],
}

impl FeedMonitor {
    pub fn new() -> Self {
        FeedMonitor {
            feeds: FeedKind::ALL.map(FeedHealth::new),
        }
    }

    pub fn health(&self, feed: FeedKind) -> &FeedHealth {
        &self.feeds[feed.index()]
    }

    pub fn status(&self, feed: FeedKind) -> FeedStatus {
        self.health(feed).status
    }

    pub fn all(&self) -> Vec<FeedHealth> {
        self.feeds.to_vec()
    }

    pub fn record_success(&mut self, feed: FeedKind, upstream_ok: bool, now: Timestamp) {
        let health = &mut self.feeds[feed.index()];
        health.status = if upstream_ok {
            FeedStatus::Fresh
        } else {
            log::warn!("feed {:?}: upstream reported degraded data", feed);
            FeedStatus::Stale
        };
        health.last_updated = Some(now);
        health.last_error = None;
    }

    /// Retries are exhausted. Keeps `last_updated` so the host can show data age.
    pub fn record_failure(&mut self, feed: FeedKind, message: &str) {
        log::warn!("feed {:?}: fetch failed: {}", feed, message);
        let health = &mut self.feeds[feed.index()];
        health.status = FeedStatus::Error;
        health.last_error = Some(message.to_string());
    }
}

impl Default for FeedMonitor {
    fn default() -> Self {
        Self::new()
    }
}

/// Bounded exponential backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
}

impl RetryPolicy {
    pub fn new(settings: &FeedSettings) -> Self {
        RetryPolicy {
            max_attempts: settings.max_attempts,
            base_delay_ms: settings.base_retry_delay_ms,
        }
    }

    /// Delay after the `failed_attempts`-th consecutive failure, doubling each
    /// time from `base_delay_ms`. `None` once the attempt budget is spent.
    pub fn delay_before_retry(&self, failed_attempts: u32) -> Option<u64> {
        if failed_attempts == 0 || failed_attempts >= self.max_attempts {
            return None;
        }
        let factor = 1u64.checked_shl(failed_attempts - 1).unwrap_or(u64::MAX);
        Some(self.base_delay_ms.saturating_mul(factor))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy::new(&FeedSettings::default())
    }
}

/// The two independent fetch loops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PollKind {
    News,
    Hazard,
}

impl PollKind {
    pub const ALL: [PollKind; 2] = [PollKind::News, PollKind::Hazard];

    /// Feeds whose health a hazard or news cycle reports on.
    pub fn feeds(self) -> &'static [FeedKind] {
        match self {
            PollKind::News => &[FeedKind::News],
            PollKind::Hazard => &[FeedKind::Seismic, FeedKind::Warning],
        }
    }

    fn index(self) -> usize {
        match self {
            PollKind::News => 0,
            PollKind::Hazard => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryOutcome {
    RetryAt(Timestamp),
    /// Attempt budget spent; the poller falls back to its regular interval.
    GaveUp,
}

#[derive(Debug, Clone, Copy)]
struct Poller {
    interval_ms: u64,
    next_due: Option<Timestamp>,
    failed_attempts: u32,
}

impl Poller {
    fn new(interval_ms: u64) -> Self {
        Poller {
            interval_ms,
            next_due: None,
            failed_attempts: 0,
        }
    }
}

pub struct PollScheduler {
    policy: RetryPolicy,
    pollers: [Poller; 2],
}

impl PollScheduler {
    pub fn new(settings: &FeedSettings) -> Self {
        PollScheduler {
            policy: RetryPolicy::new(settings),
            pollers: [
                Poller::new(settings.news_poll_ms),
                Poller::new(settings.hazard_poll_ms),
            ],
        }
    }

    /// Both pollers fetch immediately.
    pub fn start(&mut self, now: Timestamp) {
        for poller in &mut self.pollers {
            poller.next_due = Some(now);
            poller.failed_attempts = 0;
        }
    }

    pub fn next_due(&self, kind: PollKind) -> Option<Timestamp> {
        self.pollers[kind.index()].next_due
    }

    /// Pollers whose deadline has passed. Each is reported once; it is re-armed
    /// by the outcome of the fetch.
    pub fn take_due(&mut self, now: Timestamp) -> Vec<PollKind> {
        PollKind::ALL
            .into_iter()
            .filter(|kind| {
                let poller = &mut self.pollers[kind.index()];
                match poller.next_due {
                    Some(due) if due <= now => {
                        poller.next_due = None;
                        true
                    }
                    _ => false,
                }
            })
            .collect()
    }

    pub fn on_success(&mut self, kind: PollKind, now: Timestamp) {
        let poller = &mut self.pollers[kind.index()];
        poller.failed_attempts = 0;
        poller.next_due = Some(now.plus_millis(poller.interval_ms));
    }

    pub fn on_failure(&mut self, kind: PollKind, now: Timestamp) -> RetryOutcome {
        let poller = &mut self.pollers[kind.index()];
        poller.failed_attempts += 1;
        match self.policy.delay_before_retry(poller.failed_attempts) {
            Some(delay) => {
                let at = now.plus_millis(delay);
                log::debug!(
                    "poll {:?}: attempt {} failed, retry at {:?}",
                    kind,
                    poller.failed_attempts,
                    at
                );
                poller.next_due = Some(at);
                RetryOutcome::RetryAt(at)
            }
            None => {
                poller.failed_attempts = 0;
                poller.next_due = Some(now.plus_millis(poller.interval_ms));
                RetryOutcome::GaveUp
            }
        }
    }

    pub fn cancel_all(&mut self) {
        for poller in &mut self.pollers {
            poller.next_due = None;
            poller.failed_attempts = 0;
        }
    }
}
