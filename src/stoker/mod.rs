//! StokerCloud vendor API access.
//!
//! This module handles:
//! - Controller data payload parsing
//! - The HTTP client for login, terms and controller data
//! - The session that owns the token and renews it on rejection
//! - Mock API for testing

pub mod client;
pub mod mock;
pub mod session;
pub mod types;

pub use client::StokerCloudClient;
pub use mock::{MockResponse, MockStokerApi};
pub use session::SessionClient;
pub use types::{HopperReading, HopperSource};

use crate::error::StokerError;

/// Operations the session needs from the vendor API.
#[allow(async_fn_in_trait)]
pub trait StokerApi {
    /// Log in and return a fresh token.
    async fn login(&self) -> Result<String, StokerError>;

    /// Accept the terms of use for a token. Safe to repeat.
    async fn accept_terms(&self, token: &str) -> Result<(), StokerError>;

    /// Read the hopper content with a token.
    async fn fetch_hopper_level(&self, token: &str) -> Result<HopperReading, StokerError>;
}
