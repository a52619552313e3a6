//! ntfy publish client.

use serde::Deserialize;
use strum::{Display, EnumString};
use tracing::{debug, info, instrument};

use super::AlertSink;
use crate::config::Config;
use crate::error::NotifyError;

/// Longest response body kept in error messages.
const MAX_ERROR_BODY: usize = 200;

/// ntfy message priority.
///
/// Parses from the numeric form (`1`-`5`) or ntfy's names; renders as the
/// number for the `Priority` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString, Deserialize)]
#[strum(ascii_case_insensitive)]
#[serde(try_from = "String")]
pub enum Priority {
    /// Lowest priority, no notification sound.
    #[strum(to_string = "1", serialize = "min")]
    Min,
    /// Low priority.
    #[strum(to_string = "2", serialize = "low")]
    Low,
    /// ntfy's default priority.
    #[strum(to_string = "3", serialize = "default")]
    Normal,
    /// High priority.
    #[default]
    #[strum(to_string = "4", serialize = "high")]
    High,
    /// Urgent, long vibration bursts.
    #[strum(to_string = "5", serialize = "max", serialize = "urgent")]
    Max,
}

impl TryFrom<String> for Priority {
    type Error = strum::ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.trim().parse()
    }
}

/// HTTP client for an ntfy topic.
#[derive(Debug, Clone)]
pub struct NtfyClient {
    /// HTTP client for publish requests.
    http: reqwest::Client,
    /// Publish URL (`<server>/<topic>`).
    url: String,
    /// Value of the `Tags` header.
    tags: String,
    /// Bearer token for protected topics.
    token: Option<String>,
}

impl NtfyClient {
    /// Create a client from config.
    pub fn new(config: &Config) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(config.http_timeout())
            .build()?;

        Ok(Self {
            http,
            url: config.ntfy_url(),
            tags: config.ntfy_tags.clone(),
            token: config.ntfy_token.clone(),
        })
    }

    /// Publish URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Publish a message to the topic.
    #[instrument(skip(self, message), fields(url = %self.url))]
    pub async fn publish(
        &self,
        message: &str,
        priority: Priority,
        title: &str,
    ) -> Result<(), NotifyError> {
        info!("Sending ntfy alert");

        let mut request = self
            .http
            .post(&self.url)
            .header("Title", title)
            .header("Priority", priority.to_string())
            .body(message.to_owned());

        if !self.tags.is_empty() {
            request = request.header("Tags", &self.tags);
        }

        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| NotifyError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NotifyError::Status {
                status: status.as_u16(),
                body: truncate(&body, MAX_ERROR_BODY),
            });
        }

        debug!(status = %status, "ntfy accepted message");
        info!("ntfy alert sent successfully");

        Ok(())
    }
}

impl AlertSink for NtfyClient {
    async fn send(
        &self,
        message: &str,
        priority: Priority,
        title: &str,
    ) -> Result<(), NotifyError> {
        self.publish(message, priority, title).await
    }
}

/// Cut a string to at most `max` characters.
pub(crate) fn truncate(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}
