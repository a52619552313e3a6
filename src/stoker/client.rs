//! StokerCloud HTTP client.

use std::time::Instant;

use reqwest::StatusCode;
use serde_json::Value;
use tracing::{debug, error, info, instrument};

use super::types::{extract_hopper_reading, extract_token, is_token_rejection, HopperReading};
use super::StokerApi;
use crate::config::Config;
use crate::error::StokerError;
use crate::metrics;
use crate::notify::ntfy::truncate;

/// Longest response excerpt kept in logs and errors.
const MAX_LOGGED_BODY: usize = 200;

/// StokerCloud v2 dataout client.
#[derive(Debug, Clone)]
pub struct StokerCloudClient {
    /// HTTP client for API requests.
    http: reqwest::Client,
    /// Account name.
    user: String,
    /// Account password.
    password: String,
    /// Login endpoint.
    login_url: String,
    /// Terms acceptance endpoint.
    accept_terms_url: String,
    /// Controller data endpoint.
    controllerdata_url: String,
    /// Screen layout parameter.
    screen: String,
}

impl StokerCloudClient {
    /// Create a new StokerCloud client from config.
    pub fn new(config: &Config) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(config.http_timeout())
            .build()?;

        Ok(Self {
            http,
            user: config.stokercloud_user.clone(),
            password: config.stokercloud_password.clone(),
            login_url: config.stokercloud_login_url.clone(),
            accept_terms_url: config.stokercloud_accept_terms_url.clone(),
            controllerdata_url: config.stokercloud_controllerdata_url.clone(),
            screen: config.stokercloud_screen.clone(),
        })
    }

    /// Account name this client logs in as.
    pub fn user(&self) -> &str {
        &self.user
    }
}

impl StokerApi for StokerCloudClient {
    #[instrument(skip(self), fields(user = %self.user))]
    async fn login(&self) -> Result<String, StokerError> {
        info!("Logging in to StokerCloud");

        let response = self
            .http
            .post(&self.login_url)
            .query(&[("user", &self.user), ("password", &self.password)])
            .send()
            .await
            .map_err(|e| StokerError::LoginFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(StokerError::LoginFailed(format!("HTTP {}", status)));
        }

        let text = response
            .text()
            .await
            .map_err(|e| StokerError::LoginFailed(e.to_string()))?;

        let body: Value = serde_json::from_str(&text).map_err(|_| {
            error!(body = %truncate(&text, MAX_LOGGED_BODY), "Login did not return JSON");
            StokerError::LoginFailed("response was not JSON".to_string())
        })?;

        let token = extract_token(&body).ok_or_else(|| {
            error!(body = %truncate(&text, MAX_LOGGED_BODY), "No token in login response");
            StokerError::LoginFailed("token not found in login response".to_string())
        })?;

        metrics::inc_logins();
        info!("Got token from login");

        Ok(token)
    }

    #[instrument(skip(self, token))]
    async fn accept_terms(&self, token: &str) -> Result<(), StokerError> {
        info!("Accepting terms for token");

        let response = self
            .http
            .get(&self.accept_terms_url)
            .query(&[("token", token)])
            .send()
            .await
            .map_err(|e| StokerError::TermsRejected(e.to_string()))?;

        let status = response.status();
        let text = response.text().await.unwrap_or_default();

        if !status.is_success() {
            return Err(StokerError::TermsRejected(format!("HTTP {}", status)));
        }

        debug!(body = %truncate(&text, MAX_LOGGED_BODY), "acceptterms response");

        Ok(())
    }

    #[instrument(skip(self, token))]
    async fn fetch_hopper_level(&self, token: &str) -> Result<HopperReading, StokerError> {
        let start = Instant::now();

        let response = self
            .http
            .get(&self.controllerdata_url)
            .query(&[("screen", self.screen.as_str()), ("token", token)])
            .send()
            .await
            .map_err(|e| StokerError::FetchFailed(e.to_string()))?;

        metrics::record_fetch_latency(start);

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(StokerError::TokenExpired);
        }

        if !status.is_success() {
            return Err(StokerError::FetchFailed(format!("HTTP {}", status)));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| StokerError::ParseError(format!("invalid JSON: {}", e)))?;

        if let Some(object) = body.as_object() {
            debug!(keys = ?object.keys().collect::<Vec<_>>(), "controllerdata top-level keys");
        }

        if is_token_rejection(&body) {
            return Err(StokerError::TokenExpired);
        }

        let reading = extract_hopper_reading(&body)?;
        info!(kg = reading.kg, source = %reading.source, "Hopper reading");

        Ok(reading)
    }
}
