//! Push notifications for low hopper alerts.
//!
//! This module handles:
//! - The `AlertSink` seam the poll loop sends through
//! - The ntfy HTTP client
//! - Alert message formatting
//! - A recording sink for testing

pub mod message;
pub mod mock;
pub mod ntfy;

pub use message::{format_low_alert, format_status};
pub use mock::RecordingSink;
pub use ntfy::{NtfyClient, Priority};

use crate::error::NotifyError;

/// Destination for alert notifications.
#[allow(async_fn_in_trait)]
pub trait AlertSink {
    /// Deliver one notification.
    async fn send(&self, message: &str, priority: Priority, title: &str)
        -> Result<(), NotifyError>;
}
