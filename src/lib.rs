//! StokerCloud pellet hopper monitor.
//!
//! Polls the StokerCloud API for the boiler's hopper content, compares it
//! with a threshold and publishes throttled ntfy alerts when it runs low.
//!
//! ```text
//! login ─► accept terms ─► controllerdata2 ─► frontdata.hoppercontent
//!                                                   │
//!                         80.0 kg <= 100.0 kg ◄─────┘
//!                                   │
//!                  throttle permits? ─► POST <ntfy server>/<topic>
//! ```
//!
//! # Modules
//!
//! - [`config`]: Configuration loading from environment
//! - [`error`]: Unified error types
//! - [`stoker`]: StokerCloud client and token-owning session
//! - [`notify`]: ntfy client and alert formatting
//! - [`monitor`]: Level assessment, alert throttle and poll loop
//! - [`metrics`]: Prometheus metrics
//! - [`utils`]: Utility functions

pub mod config;
pub mod error;
pub mod metrics;
pub mod monitor;
pub mod notify;
pub mod stoker;
pub mod utils;

pub use config::Config;
pub use error::MonitorError;
