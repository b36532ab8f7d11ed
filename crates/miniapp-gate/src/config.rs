//! Mini App Gate configuration.
//!
//! Configuration is loaded from environment variables once at startup and
//! shared read-only afterwards. The bot token is held as a `SecretString`
//! and is redacted in Debug output.

use secrecy::SecretString;
use std::collections::HashMap;
use std::env;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Default server bind address.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8000";

/// Default per-key request budget per second.
pub const DEFAULT_RATE_LIMIT_PER_SECOND: u32 = 5;

/// Default per-key request budget per hour.
pub const DEFAULT_RATE_LIMIT_PER_HOUR: u32 = 100;

/// Default CORS origins: the Telegram web client and t.me links.
pub const DEFAULT_CORS_ALLOWED_ORIGINS: &[&str] = &["https://web.telegram.org", "https://t.me"];

/// Default cap for the buffered request body.
pub const DEFAULT_MAX_BODY_BYTES: usize = 64 * 1024;

/// Default drain period between a shutdown signal and closing the listener.
pub const DEFAULT_DRAIN_SECONDS: u64 = 5;

/// Telegram usernames are 5 to 32 characters long.
const BOT_USERNAME_MIN_LEN: usize = 5;
const BOT_USERNAME_MAX_LEN: usize = 32;

/// Mini App Gate configuration.
#[derive(Clone)]
pub struct Config {
    /// Server bind address (default: "0.0.0.0:8000").
    pub bind_address: String,

    /// Bot credential used to derive the init data signing key.
    ///
    /// `None` means signed requests cannot be verified; with public mode off
    /// every request carrying init data is rejected.
    pub bot_token: Option<SecretString>,

    /// Public/demo mode. Bypasses classification and verification entirely.
    pub allow_public: bool,

    /// Bot handle (without `@`) used to redirect non-Telegram clients.
    pub bot_username: Option<String>,

    /// Per-key request budget per second.
    pub rate_limit_per_second: u32,

    /// Per-key request budget per hour.
    pub rate_limit_per_hour: u32,

    /// Origins allowed by the CORS layer.
    pub cors_allowed_origins: Vec<String>,

    /// Upper bound for the single buffered body read.
    pub max_body_bytes: usize,

    /// How long in-flight requests get to finish after SIGINT/SIGTERM.
    /// Zero skips the drain.
    pub drain_period: Duration,
}

/// Custom Debug implementation that redacts the bot token.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("bind_address", &self.bind_address)
            .field(
                "bot_token",
                &self.bot_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("allow_public", &self.allow_public)
            .field("bot_username", &self.bot_username)
            .field("rate_limit_per_second", &self.rate_limit_per_second)
            .field("rate_limit_per_hour", &self.rate_limit_per_hour)
            .field("cors_allowed_origins", &self.cors_allowed_origins)
            .field("max_body_bytes", &self.max_body_bytes)
            .field("drain_period", &self.drain_period)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid boolean for {name}: {value}")]
    InvalidBool { name: String, value: String },

    #[error("Invalid bot username: {0}")]
    InvalidBotUsername(String),

    #[error("Invalid rate limit configuration: {0}")]
    InvalidRateLimit(String),

    #[error("Invalid body size limit: {0}")]
    InvalidBodyLimit(String),

    #[error("Invalid drain period: {0}")]
    InvalidDrainPeriod(String),
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let bind_address = vars
            .get("BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());

        // Blank tokens are treated as unset so a stray `BOT_TOKEN=` fails closed
        let bot_token = vars
            .get("BOT_TOKEN")
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
            .map(|v| SecretString::from(v.to_string()));

        let allow_public = match vars.get("ALLOW_PUBLIC") {
            Some(value) => parse_bool("ALLOW_PUBLIC", value)?,
            None => false,
        };

        let bot_username = match vars.get("BOT_USERNAME").map(|v| v.trim()) {
            Some(raw) if !raw.is_empty() => Some(parse_bot_username(raw)?),
            _ => None,
        };

        let rate_limit_per_second =
            parse_positive_u32(vars, "RATE_LIMIT_PER_SECOND", DEFAULT_RATE_LIMIT_PER_SECOND)?;
        let rate_limit_per_hour =
            parse_positive_u32(vars, "RATE_LIMIT_PER_HOUR", DEFAULT_RATE_LIMIT_PER_HOUR)?;

        if rate_limit_per_hour < rate_limit_per_second {
            return Err(ConfigError::InvalidRateLimit(format!(
                "RATE_LIMIT_PER_HOUR ({}) must not be lower than RATE_LIMIT_PER_SECOND ({})",
                rate_limit_per_hour, rate_limit_per_second
            )));
        }

        let cors_allowed_origins = match vars.get("CORS_ALLOWED_ORIGINS") {
            Some(list) => list
                .split(',')
                .map(str::trim)
                .filter(|origin| !origin.is_empty())
                .map(str::to_string)
                .collect(),
            None => DEFAULT_CORS_ALLOWED_ORIGINS
                .iter()
                .map(|origin| origin.to_string())
                .collect(),
        };

        let max_body_bytes = if let Some(value_str) = vars.get("MAX_BODY_BYTES") {
            let value: usize = value_str.parse().map_err(|e| {
                ConfigError::InvalidBodyLimit(format!(
                    "MAX_BODY_BYTES must be a valid positive integer, got '{}': {}",
                    value_str, e
                ))
            })?;

            if value == 0 {
                return Err(ConfigError::InvalidBodyLimit(
                    "MAX_BODY_BYTES must be greater than 0".to_string(),
                ));
            }

            value
        } else {
            DEFAULT_MAX_BODY_BYTES
        };

        let drain_period = match vars.get("GATE_DRAIN_SECONDS") {
            Some(value_str) => {
                let secs: u64 = value_str.trim().parse().map_err(|e| {
                    ConfigError::InvalidDrainPeriod(format!(
                        "GATE_DRAIN_SECONDS must be a whole number of seconds, got '{}': {}",
                        value_str, e
                    ))
                })?;
                Duration::from_secs(secs)
            }
            None => Duration::from_secs(DEFAULT_DRAIN_SECONDS),
        };

        Ok(Config {
            bind_address,
            bot_token,
            allow_public,
            bot_username,
            rate_limit_per_second,
            rate_limit_per_hour,
            cors_allowed_origins,
            max_body_bytes,
            drain_period,
        })
    }
}

fn parse_bool(name: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" | "" => Ok(false),
        _ => Err(ConfigError::InvalidBool {
            name: name.to_string(),
            value: value.to_string(),
        }),
    }
}

fn parse_bot_username(raw: &str) -> Result<String, ConfigError> {
    let handle = raw.strip_prefix('@').unwrap_or(raw);

    if handle.len() < BOT_USERNAME_MIN_LEN || handle.len() > BOT_USERNAME_MAX_LEN {
        return Err(ConfigError::InvalidBotUsername(format!(
            "BOT_USERNAME must be {}-{} characters, got '{}'",
            BOT_USERNAME_MIN_LEN, BOT_USERNAME_MAX_LEN, handle
        )));
    }

    if !handle
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return Err(ConfigError::InvalidBotUsername(format!(
            "BOT_USERNAME may only contain letters, digits and '_', got '{}'",
            handle
        )));
    }

    Ok(handle.to_string())
}

fn parse_positive_u32(
    vars: &HashMap<String, String>,
    name: &str,
    default: u32,
) -> Result<u32, ConfigError> {
    let Some(value_str) = vars.get(name) else {
        return Ok(default);
    };

    let value: u32 = value_str.parse().map_err(|e| {
        ConfigError::InvalidRateLimit(format!(
            "{} must be a valid positive integer, got '{}': {}",
            name, value_str, e
        ))
    })?;

    if value == 0 {
        return Err(ConfigError::InvalidRateLimit(format!(
            "{} must be greater than 0",
            name
        )));
    }

    Ok(value)
}
