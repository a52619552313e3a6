//! Token-owning session over a StokerCloud API.

use tracing::{info, instrument, warn};

use super::types::HopperReading;
use super::StokerApi;
use crate::error::StokerError;
use crate::metrics;

/// How many times a rejected token is renewed within one reading.
const MAX_TOKEN_RENEWALS: u32 = 1;

/// Session that caches the StokerCloud token and renews it when rejected.
#[derive(Debug)]
pub struct SessionClient<A> {
    /// Underlying API.
    api: A,
    /// Current token, if logged in.
    token: Option<String>,
}

impl<A: StokerApi> SessionClient<A> {
    /// Create a session that logs in on first use.
    pub fn new(api: A) -> Self {
        Self { api, token: None }
    }

    /// Whether a token is cached.
    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    /// Drop the cached token so the next reading logs in again.
    pub fn invalidate(&mut self) {
        self.token = None;
    }

    /// Log in, accept terms and cache the new token.
    ///
    /// A terms failure is logged and ignored.
    #[instrument(skip(self))]
    pub async fn renew_token(&mut self) -> Result<String, StokerError> {
        self.token = None;
        let token = self.api.login().await?;

        if let Err(e) = self.api.accept_terms(&token).await {
            warn!(error = %e, "Accepting terms failed, continuing with new token");
        }

        self.token = Some(token.clone());
        Ok(token)
    }

    /// Read the hopper level, renewing the token at most once if it is rejected.
    #[instrument(skip(self))]
    pub async fn get_reading(&mut self) -> Result<HopperReading, StokerError> {
        let mut renewals = 0;

        loop {
            let token = match &self.token {
                Some(token) => token.clone(),
                None => self.renew_token().await?,
            };

            match self.api.fetch_hopper_level(&token).await {
                Err(StokerError::TokenExpired) if renewals < MAX_TOKEN_RENEWALS => {
                    renewals += 1;
                    metrics::inc_token_renewals();
                    warn!("Token rejected, logging in again");
                    self.renew_token().await?;
                    info!("New token obtained, retrying data fetch");
                }
                Err(StokerError::TokenExpired) => {
                    self.token = None;
                    return Err(StokerError::TokenExpired);
                }
                result => return result,
            }
        }
    }
}
