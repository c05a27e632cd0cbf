//! Application configuration structs
//!
//! Loads configuration from environment variables (and a `.env` file).

use serde::Deserialize;
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub app: AppSettings,
    pub redis: RedisConfig,
    pub client: ClientConfig,
    pub trigger: TriggerTimings,
}

/// General application settings
#[derive(Debug, Clone, Deserialize)]
pub struct AppSettings {
    #[serde(default = "default_app_name")]
    pub name: String,
    #[serde(default = "default_env")]
    pub env: Environment,
}

/// Environment type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl Environment {
    #[must_use]
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }

    #[must_use]
    pub fn is_development(&self) -> bool {
        matches!(self, Self::Development)
    }

    fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "production" => Some(Self::Production),
            "staging" => Some(Self::Staging),
            "development" => Some(Self::Development),
            _ => None,
        }
    }
}

/// Redis configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    pub url: String,
    #[serde(default = "default_redis_max_connections")]
    pub max_connections: u32,
}

/// Realtime client configuration (reconnect backoff)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// First reconnect delay
    pub reconnect_base: Duration,
    /// Upper bound for the reconnect delay
    pub reconnect_max: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            reconnect_base: Duration::from_millis(default_reconnect_base_ms()),
            reconnect_max: Duration::from_millis(default_reconnect_max_ms()),
        }
    }
}

/// Tuning of the realtime trigger.
///
/// These absorb noise from the realtime service; they are not correctness
/// parameters and can be changed per deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriggerTimings {
    /// Delay between channel/user becoming available and subscribing
    pub subscribe_debounce: Duration,
    /// Quiet period before a non-local presence change is committed
    pub presence_debounce: Duration,
    /// How long a disconnect may last before it becomes visible
    pub disconnect_grace: Duration,
    /// Window, opened by the first status event, for burst suppression
    pub status_burst_window: Duration,
    /// Status events accepted per window
    pub status_burst_limit: u32,
    /// Consecutive error statuses before the subscription is marked lost
    pub max_consecutive_errors: u32,
}

impl Default for TriggerTimings {
    fn default() -> Self {
        Self {
            subscribe_debounce: Duration::from_millis(default_subscribe_debounce_ms()),
            presence_debounce: Duration::from_millis(default_presence_debounce_ms()),
            disconnect_grace: Duration::from_millis(default_disconnect_grace_ms()),
            status_burst_window: Duration::from_millis(default_status_burst_window_ms()),
            status_burst_limit: default_status_burst_limit(),
            max_consecutive_errors: default_max_consecutive_errors(),
        }
    }
}

impl TriggerTimings {
    /// Reject settings that would disable the trigger
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.status_burst_limit == 0 {
            return Err(ConfigError::InvalidValue(
                "TRIGGER_STATUS_BURST_LIMIT",
                "must be at least 1".to_string(),
            ));
        }
        if self.max_consecutive_errors == 0 {
            return Err(ConfigError::InvalidValue(
                "TRIGGER_MAX_CONSECUTIVE_ERRORS",
                "must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

// Default value functions
fn default_app_name() -> String {
    "chat-listen".to_string()
}

fn default_env() -> Environment {
    Environment::Development
}

fn default_redis_max_connections() -> u32 {
    10
}

fn default_reconnect_base_ms() -> u64 {
    500
}

fn default_reconnect_max_ms() -> u64 {
    30_000
}

fn default_subscribe_debounce_ms() -> u64 {
    500
}

fn default_presence_debounce_ms() -> u64 {
    3_000
}

fn default_disconnect_grace_ms() -> u64 {
    8_000
}

fn default_status_burst_window_ms() -> u64 {
    2_000
}

fn default_status_burst_limit() -> u32 {
    3
}

fn default_max_consecutive_errors() -> u32 {
    5
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    /// Returns an error if required environment variables are missing or invalid
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars(&lookup);

        let config = Self {
            app: AppSettings {
                name: lookup("APP_NAME").unwrap_or_else(default_app_name),
                env: lookup("APP_ENV")
                    .and_then(|s| Environment::parse(&s))
                    .unwrap_or_default(),
            },
            redis: RedisConfig {
                url: lookup("REDIS_URL").ok_or(ConfigError::MissingVar("REDIS_URL"))?,
                max_connections: vars
                    .parse_or("REDIS_MAX_CONNECTIONS", default_redis_max_connections)?,
            },
            client: ClientConfig {
                reconnect_base: vars
                    .millis_or("REALTIME_RECONNECT_BASE_MS", default_reconnect_base_ms)?,
                reconnect_max: vars
                    .millis_or("REALTIME_RECONNECT_MAX_MS", default_reconnect_max_ms)?,
            },
            trigger: TriggerTimings {
                subscribe_debounce: vars
                    .millis_or("TRIGGER_SUBSCRIBE_DEBOUNCE_MS", default_subscribe_debounce_ms)?,
                presence_debounce: vars
                    .millis_or("TRIGGER_PRESENCE_DEBOUNCE_MS", default_presence_debounce_ms)?,
                disconnect_grace: vars
                    .millis_or("TRIGGER_DISCONNECT_GRACE_MS", default_disconnect_grace_ms)?,
                status_burst_window: vars.millis_or(
                    "TRIGGER_STATUS_BURST_WINDOW_MS",
                    default_status_burst_window_ms,
                )?,
                status_burst_limit: vars
                    .parse_or("TRIGGER_STATUS_BURST_LIMIT", default_status_burst_limit)?,
                max_consecutive_errors: vars.parse_or(
                    "TRIGGER_MAX_CONSECUTIVE_ERRORS",
                    default_max_consecutive_errors,
                )?,
            },
        };

        config.trigger.validate()?;
        if config.client.reconnect_base > config.client.reconnect_max {
            return Err(ConfigError::InvalidValue(
                "REALTIME_RECONNECT_BASE_MS",
                "must not exceed REALTIME_RECONNECT_MAX_MS".to_string(),
            ));
        }

        Ok(config)
    }
}

/// Typed access to optional variables
struct Vars<'a, F>(&'a F);

impl<F> Vars<'_, F>
where
    F: Fn(&str) -> Option<String>,
{
    fn parse_or<T: FromStr>(
        &self,
        name: &'static str,
        default: fn() -> T,
    ) -> Result<T, ConfigError> {
        match (self.0)(name) {
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue(name, raw)),
            None => Ok(default()),
        }
    }

    fn millis_or(&self, name: &'static str, default: fn() -> u64) -> Result<Duration, ConfigError> {
        self.parse_or(name, default).map(Duration::from_millis)
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(&'static str),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(&'static str, String),
}
