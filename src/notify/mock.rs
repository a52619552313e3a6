//! Recording alert sink for unit testing.
//!
//! Captures every notification instead of sending it, and can be told to
//! fail so callers can be tested against a broken notification endpoint.

use std::sync::{Arc, Mutex};

use super::{AlertSink, Priority};
use crate::error::NotifyError;

/// A notification captured by [`RecordingSink`].
#[derive(Debug, Clone, PartialEq)]
pub struct SentAlert {
    /// Message body.
    pub message: String,
    /// Priority header.
    pub priority: Priority,
    /// Title header.
    pub title: String,
}

/// Alert sink that records sends.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    /// Successfully delivered alerts.
    sent: Arc<Mutex<Vec<SentAlert>>>,
    /// Number of send attempts, including failed ones.
    attempts: Arc<Mutex<u32>>,
    /// Whether sends should fail.
    fail: Arc<Mutex<bool>>,
}

impl RecordingSink {
    /// Create a sink that accepts every alert.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a sink that rejects every alert.
    pub fn failing() -> Self {
        let sink = Self::default();
        sink.set_failing(true);
        sink
    }

    /// Toggle failure mode.
    pub fn set_failing(&self, fail: bool) {
        *self.fail.lock().unwrap() = fail;
    }

    /// Alerts delivered so far.
    pub fn sent(&self) -> Vec<SentAlert> {
        self.sent.lock().unwrap().clone()
    }

    /// Send attempts so far.
    pub fn attempts(&self) -> u32 {
        *self.attempts.lock().unwrap()
    }
}

impl AlertSink for RecordingSink {
    async fn send(
        &self,
        message: &str,
        priority: Priority,
        title: &str,
    ) -> Result<(), NotifyError> {
        *self.attempts.lock().unwrap() += 1;

        if *self.fail.lock().unwrap() {
            return Err(NotifyError::Status {
                status: 503,
                body: "mock notify failure".to_string(),
            });
        }

        self.sent.lock().unwrap().push(SentAlert {
            message: message.to_string(),
            priority,
            title: title.to_string(),
        });
        Ok(())
    }
}
