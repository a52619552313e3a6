//! Mock StokerCloud API for unit testing.
//!
//! This module provides a scripted API that can be used in tests
//! without making real network requests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use super::types::{HopperReading, HopperSource};
use super::StokerApi;
use crate::error::StokerError;

/// Scripted outcome of one `fetch_hopper_level` call.
#[derive(Debug, Clone)]
pub enum MockResponse {
    /// Return this many kilograms.
    Level(f64),
    /// Reject the token.
    TokenExpired,
    /// Fail at the transport level.
    FetchFailed,
}

/// Call counters recorded by the mock.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MockCalls {
    /// Login calls.
    pub logins: u32,
    /// Terms acceptance calls.
    pub accept_terms: u32,
    /// Data fetch calls.
    pub fetches: u32,
    /// Tokens passed to fetch, in order.
    pub fetch_tokens: Vec<String>,
}

/// Mock StokerCloud API.
#[derive(Debug, Clone, Default)]
pub struct MockStokerApi {
    /// Fetch outcomes, consumed front to back.
    responses: Arc<Mutex<VecDeque<MockResponse>>>,
    /// Recorded calls.
    calls: Arc<Mutex<MockCalls>>,
    /// Whether login should fail.
    fail_login: Arc<Mutex<bool>>,
    /// Whether terms acceptance should fail.
    fail_terms: Arc<Mutex<bool>>,
}

impl MockStokerApi {
    /// Create a mock with no scripted responses.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock that answers with the given outcomes in order.
    pub fn with_responses(responses: impl IntoIterator<Item = MockResponse>) -> Self {
        let mock = Self::default();
        mock.push_responses(responses);
        mock
    }

    /// Queue more fetch outcomes.
    pub fn push_responses(&self, responses: impl IntoIterator<Item = MockResponse>) {
        self.responses.lock().unwrap().extend(responses);
    }

    /// Make login fail.
    pub fn set_fail_login(&self, fail: bool) {
        *self.fail_login.lock().unwrap() = fail;
    }

    /// Make terms acceptance fail.
    pub fn set_fail_terms(&self, fail: bool) {
        *self.fail_terms.lock().unwrap() = fail;
    }

    /// Snapshot of recorded calls.
    pub fn calls(&self) -> MockCalls {
        self.calls.lock().unwrap().clone()
    }
}

impl StokerApi for MockStokerApi {
    async fn login(&self) -> Result<String, StokerError> {
        let mut calls = self.calls.lock().unwrap();
        calls.logins += 1;

        if *self.fail_login.lock().unwrap() {
            return Err(StokerError::LoginFailed("mock login failure".to_string()));
        }

        Ok(format!("token-{}", calls.logins))
    }

    async fn accept_terms(&self, _token: &str) -> Result<(), StokerError> {
        self.calls.lock().unwrap().accept_terms += 1;

        if *self.fail_terms.lock().unwrap() {
            return Err(StokerError::TermsRejected("mock terms failure".to_string()));
        }

        Ok(())
    }

    async fn fetch_hopper_level(&self, token: &str) -> Result<HopperReading, StokerError> {
        {
            let mut calls = self.calls.lock().unwrap();
            calls.fetches += 1;
            calls.fetch_tokens.push(token.to_string());
        }

        let next = self.responses.lock().unwrap().pop_front();
        match next {
            Some(MockResponse::Level(kg)) => Ok(HopperReading {
                kg,
                source: HopperSource::FrontData,
            }),
            Some(MockResponse::TokenExpired) => Err(StokerError::TokenExpired),
            Some(MockResponse::FetchFailed) => {
                Err(StokerError::FetchFailed("mock fetch failure".to_string()))
            }
            None => Err(StokerError::FetchFailed("no scripted response".to_string())),
        }
    }
}
