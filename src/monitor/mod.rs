//! Hopper level monitoring.
//!
//! This module handles:
//! - Level assessment against the threshold
//! - Alert throttling
//! - The poll loop and its backoff schedule

pub mod level;
pub mod poll;
pub mod throttle;

pub use level::{assess, LevelReport, Thresholds};
pub use poll::{CycleOutcome, Monitor, PollState, Schedule};
pub use throttle::{AlertThrottle, ThrottlePolicy};
