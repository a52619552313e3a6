//! Unified error types for the hopper monitor.

use thiserror::Error;

/// Unified error type for the hopper monitor.
#[derive(Error, Debug)]
pub enum MonitorError {
    /// Configuration loading or validation error.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// StokerCloud session or data error.
    #[error("stokercloud error: {0}")]
    Stoker(#[from] StokerError),

    /// Push notification error.
    #[error("notification error: {0}")]
    Notify(#[from] NotifyError),
}

impl MonitorError {
    /// Name of the step that failed, for log context.
    pub fn step(&self) -> &'static str {
        match self {
            Self::Config(_) => "config",
            Self::Stoker(e) => e.step(),
            Self::Notify(_) => "notify",
        }
    }
}

/// Configuration errors. Always fatal at startup.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Missing or unparseable environment variable.
    #[error("{0}")]
    Env(#[from] envy::Error),

    /// A value parsed but failed validation.
    #[error("{var} is invalid: {reason}")]
    Invalid {
        /// Environment variable name.
        var: &'static str,
        /// Why the value was rejected.
        reason: String,
    },
}

impl ConfigError {
    pub(crate) fn invalid(var: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            var,
            reason: reason.into(),
        }
    }
}

/// StokerCloud API errors.
#[derive(Error, Debug)]
pub enum StokerError {
    /// Login request failed or returned no token.
    #[error("login failed: {0}")]
    LoginFailed(String),

    /// Terms acceptance failed.
    #[error("accepting terms failed: {0}")]
    TermsRejected(String),

    /// The data endpoint rejected the token.
    #[error("token rejected by controller data endpoint")]
    TokenExpired,

    /// Data request failed at the transport or HTTP level.
    #[error("controller data request failed: {0}")]
    FetchFailed(String),

    /// Data response did not contain a usable hopper value.
    #[error("failed to parse controller data: {0}")]
    ParseError(String),
}

impl StokerError {
    /// Name of the session step this error belongs to.
    pub fn step(&self) -> &'static str {
        match self {
            Self::LoginFailed(_) => "login",
            Self::TermsRejected(_) => "accept-terms",
            Self::TokenExpired => "token",
            Self::FetchFailed(_) | Self::ParseError(_) => "fetch",
        }
    }

    /// Whether this is an authentication failure (login or terms).
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::LoginFailed(_) | Self::TermsRejected(_))
    }
}

/// Push notification errors.
#[derive(Error, Debug)]
pub enum NotifyError {
    /// Request could not be sent or the connection failed.
    #[error("ntfy request failed: {0}")]
    Request(String),

    /// Server answered with a non-success status.
    #[error("ntfy returned HTTP {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Truncated response body.
        body: String,
    },
}
