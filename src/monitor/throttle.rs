//! Minimum-interval suppression of repeated alerts.

use serde::Deserialize;
use time::{Duration, OffsetDateTime};

/// When a send attempt starts the throttle window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThrottlePolicy {
    /// Only a delivered alert is recorded; a failed send is retried next cycle.
    #[default]
    Confirmed,
    /// Every attempt is recorded, delivered or not.
    Attempted,
}

impl ThrottlePolicy {
    /// Whether an attempt with this delivery result should be recorded.
    pub fn records(self, delivered: bool) -> bool {
        match self {
            Self::Confirmed => delivered,
            Self::Attempted => true,
        }
    }
}

/// Tracks the last alert and enforces the minimum interval.
#[derive(Debug, Clone)]
pub struct AlertThrottle {
    /// Minimum time between alerts.
    min_interval: Duration,
    /// Time of the last recorded alert.
    last_alert: Option<OffsetDateTime>,
}

impl AlertThrottle {
    /// Create a throttle with no alert history.
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_alert: None,
        }
    }

    /// Whether an alert may be sent at `now`.
    pub fn should_alert(&self, now: OffsetDateTime) -> bool {
        match self.last_alert {
            None => true,
            Some(last) => now - last >= self.min_interval,
        }
    }

    /// Record an alert sent at `now`.
    pub fn record_alert(&mut self, now: OffsetDateTime) {
        self.last_alert = Some(now);
    }

    /// Time left until the next alert is allowed.
    pub fn remaining(&self, now: OffsetDateTime) -> Duration {
        match self.last_alert {
            None => Duration::ZERO,
            Some(last) => (self.min_interval - (now - last)).max(Duration::ZERO),
        }
    }

    /// Time of the last recorded alert.
    pub fn last_alert(&self) -> Option<OffsetDateTime> {
        self.last_alert
    }
}
