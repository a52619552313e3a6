//! Application configuration loaded from environment variables.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Deserializer};
use url::Url;

use crate::error::ConfigError;
use crate::monitor::throttle::ThrottlePolicy;
use crate::notify::Priority;

/// Screen layout the StokerCloud web UI requests with controller data.
pub const DEFAULT_SCREEN_PARAM: &str = concat!(
    "b1,3,b2,5,b3,4,b4,6,b5,12,b6,14,b7,15,b8,16,b9,9,b10,0,",
    "d1,3,d2,4,d3,0,d4,0,d5,0,d6,0,d7,0,d8,0,d9,0,d10,0,",
    "h1,2,h2,3,h3,4,h4,7,h5,8,h6,0,h7,0,h8,0,h9,0,h10,0,",
    "w1,2,w2,3,w3,9,w4,0,w5,0"
);

/// Application configuration loaded from environment variables.
#[derive(Clone, Deserialize)]
pub struct Config {
    // === StokerCloud Credentials ===
    /// StokerCloud account name.
    pub stokercloud_user: String,

    /// StokerCloud account password.
    pub stokercloud_password: String,

    // === StokerCloud Endpoints ===
    /// Login endpoint.
    #[serde(default = "default_login_url")]
    pub stokercloud_login_url: String,

    /// Terms acceptance endpoint.
    #[serde(default = "default_accept_terms_url")]
    pub stokercloud_accept_terms_url: String,

    /// Controller data endpoint.
    #[serde(default = "default_controllerdata_url")]
    pub stokercloud_controllerdata_url: String,

    /// Screen layout parameter sent with controller data requests.
    #[serde(default = "default_screen")]
    pub stokercloud_screen: String,

    // === Notification Target ===
    /// ntfy server base URL.
    #[serde(default = "default_ntfy_server")]
    pub ntfy_server: String,

    /// ntfy topic to publish to.
    pub ntfy_topic: String,

    /// Notification title.
    #[serde(default = "default_ntfy_title")]
    pub ntfy_title: String,

    /// Notification priority (1-5 or ntfy name).
    #[serde(default)]
    pub ntfy_priority: Priority,

    /// Comma-separated ntfy tags.
    #[serde(default = "default_ntfy_tags")]
    pub ntfy_tags: String,

    /// Optional ntfy access token for protected topics.
    #[serde(default, deserialize_with = "deserialize_optional")]
    pub ntfy_token: Option<String>,

    // === Thresholds ===
    /// Alert when the hopper holds this many kilograms or fewer.
    #[serde(default = "default_low_threshold")]
    pub low_threshold_kg: f64,

    /// Hopper capacity, used to report a fill percentage.
    #[serde(default, deserialize_with = "deserialize_optional")]
    pub max_capacity_kg: Option<f64>,

    // === Timing ===
    /// Seconds between polls.
    #[serde(default = "default_check_interval")]
    pub check_interval_seconds: u64,

    /// Minimum minutes between two alerts.
    #[serde(default = "default_min_alert_interval")]
    pub min_alert_interval_min: u64,

    /// Upper bound for the wait after repeated failed cycles.
    #[serde(default = "default_max_backoff")]
    pub max_backoff_seconds: u64,

    /// Timeout applied to every HTTP request.
    #[serde(default = "default_http_timeout")]
    pub http_timeout_secs: u64,

    /// Whether failed notifications still start the throttle window.
    #[serde(default)]
    pub alert_throttle_policy: ThrottlePolicy,

    // === Observability ===
    /// Port for the Prometheus exporter; disabled when unset.
    #[serde(default, deserialize_with = "deserialize_optional")]
    pub metrics_port: Option<u16>,
}

/// Largest accepted `MIN_ALERT_INTERVAL_MIN` (one year).
const MAX_ALERT_INTERVAL_MIN: u64 = 525_600;

/// Parse an optional variable, treating an empty or blank value as unset.
fn deserialize_optional<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
    T::Err: fmt::Display,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => value.parse().map(Some).map_err(serde::de::Error::custom),
    }
}

fn default_login_url() -> String {
    "https://stokercloud.dk/v2/dataout2/login.php".to_string()
}

fn default_accept_terms_url() -> String {
    "https://stokercloud.dk/v2/dataout2/acceptterms.php".to_string()
}

fn default_controllerdata_url() -> String {
    "https://stokercloud.dk/v2/dataout2/controllerdata2.php".to_string()
}

fn default_screen() -> String {
    DEFAULT_SCREEN_PARAM.to_string()
}

fn default_ntfy_server() -> String {
    "https://ntfy.sh".to_string()
}

fn default_ntfy_title() -> String {
    "Stoker hopper low".to_string()
}

fn default_ntfy_tags() -> String {
    "warning,fire".to_string()
}

fn default_low_threshold() -> f64 {
    140.0
}

fn default_check_interval() -> u64 {
    60
}

fn default_min_alert_interval() -> u64 {
    2
}

fn default_max_backoff() -> u64 {
    600
}

fn default_http_timeout() -> u64 {
    10
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

impl Config {
    /// Load configuration from environment, reading .env file first.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_iter(std::env::vars())
    }

    /// Build configuration from explicit `(NAME, value)` pairs.
    pub fn from_iter<I>(vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        Ok(envy::from_iter(vars)?)
    }

    /// Check if the configuration is valid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.stokercloud_user.trim().is_empty() {
            return Err(ConfigError::invalid("STOKERCLOUD_USER", "must not be empty"));
        }

        if self.stokercloud_password.is_empty() {
            return Err(ConfigError::invalid(
                "STOKERCLOUD_PASSWORD",
                "must not be empty",
            ));
        }

        if self.ntfy_topic.trim().is_empty() {
            return Err(ConfigError::invalid("NTFY_TOPIC", "must not be empty"));
        }

        check_url("STOKERCLOUD_LOGIN_URL", &self.stokercloud_login_url)?;
        check_url(
            "STOKERCLOUD_ACCEPT_TERMS_URL",
            &self.stokercloud_accept_terms_url,
        )?;
        check_url(
            "STOKERCLOUD_CONTROLLERDATA_URL",
            &self.stokercloud_controllerdata_url,
        )?;
        check_url("NTFY_SERVER", &self.ntfy_server)?;

        if !self.low_threshold_kg.is_finite() || self.low_threshold_kg < 0.0 {
            return Err(ConfigError::invalid(
                "LOW_THRESHOLD_KG",
                format!("must be a non-negative number, got {}", self.low_threshold_kg),
            ));
        }

        if let Some(capacity) = self.max_capacity_kg {
            if !capacity.is_finite() || capacity <= 0.0 {
                return Err(ConfigError::invalid(
                    "MAX_CAPACITY_KG",
                    format!("must be greater than zero, got {}", capacity),
                ));
            }
        }

        if self.check_interval_seconds == 0 {
            return Err(ConfigError::invalid(
                "CHECK_INTERVAL_SECONDS",
                "must be at least 1",
            ));
        }

        if self.min_alert_interval_min > MAX_ALERT_INTERVAL_MIN {
            return Err(ConfigError::invalid(
                "MIN_ALERT_INTERVAL_MIN",
                format!("must be at most {}", MAX_ALERT_INTERVAL_MIN),
            ));
        }

        if self.max_backoff_seconds < self.check_interval_seconds {
            return Err(ConfigError::invalid(
                "MAX_BACKOFF_SECONDS",
                "must not be shorter than CHECK_INTERVAL_SECONDS",
            ));
        }

        if self.http_timeout_secs == 0 {
            return Err(ConfigError::invalid("HTTP_TIMEOUT_SECS", "must be at least 1"));
        }

        Ok(())
    }

    /// Poll interval.
    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_seconds)
    }

    /// Longest wait between cycles while failures persist.
    pub fn max_backoff(&self) -> Duration {
        Duration::from_secs(self.max_backoff_seconds)
    }

    /// Minimum time between alerts, clamped to the accepted maximum.
    pub fn min_alert_interval(&self) -> time::Duration {
        let minutes = self.min_alert_interval_min.min(MAX_ALERT_INTERVAL_MIN);
        time::Duration::minutes(minutes as i64)
    }

    /// Per-request HTTP timeout.
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    /// Full publish URL: `<server>/<topic>`.
    pub fn ntfy_url(&self) -> String {
        format!(
            "{}/{}",
            self.ntfy_server.trim_end_matches('/'),
            self.ntfy_topic.trim_start_matches('/')
        )
    }
}

/// Logging settings, read before the main configuration so that
/// configuration errors are logged with the requested level and format.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log output format: text or json.
    #[serde(default = "default_log_format")]
    pub log_format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
        }
    }
}

impl LoggingConfig {
    /// Read logging settings from the environment, falling back to defaults.
    pub fn from_env() -> Self {
        envy::from_env().unwrap_or_default()
    }

    /// Whether structured JSON logs were requested.
    pub fn json(&self) -> bool {
        self.log_format.eq_ignore_ascii_case("json")
    }
}

fn check_url(var: &'static str, value: &str) -> Result<(), ConfigError> {
    let url = Url::parse(value).map_err(|e| ConfigError::invalid(var, e.to_string()))?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(ConfigError::invalid(
            var,
            format!("unsupported scheme '{}'", other),
        )),
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("stokercloud_user", &self.stokercloud_user)
            .field("stokercloud_password", &"<redacted>")
            .field("stokercloud_login_url", &self.stokercloud_login_url)
            .field("stokercloud_accept_terms_url", &self.stokercloud_accept_terms_url)
            .field(
                "stokercloud_controllerdata_url",
                &self.stokercloud_controllerdata_url,
            )
            .field("ntfy_server", &self.ntfy_server)
            .field("ntfy_topic", &self.ntfy_topic)
            .field("ntfy_title", &self.ntfy_title)
            .field("ntfy_priority", &self.ntfy_priority)
            .field("ntfy_tags", &self.ntfy_tags)
            .field("ntfy_token", &self.ntfy_token.as_ref().map(|_| "<redacted>"))
            .field("low_threshold_kg", &self.low_threshold_kg)
            .field("max_capacity_kg", &self.max_capacity_kg)
            .field("check_interval_seconds", &self.check_interval_seconds)
            .field("min_alert_interval_min", &self.min_alert_interval_min)
            .field("max_backoff_seconds", &self.max_backoff_seconds)
            .field("http_timeout_secs", &self.http_timeout_secs)
            .field("alert_throttle_policy", &self.alert_throttle_policy)
            .field("metrics_port", &self.metrics_port)
            .finish()
    }
}
