use std::env;
use std::fmt;
use std::time::Duration;

const DEFAULT_STORE_TIMEOUT_MS: u64 = 2000;
const DEFAULT_ALERT_TIMEOUT_MS: u64 = 5000;

#[derive(Debug, Clone, PartialEq)]
pub struct ConfigError(String);

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "configuration error: {}", self.0)
    }
}

impl std::error::Error for ConfigError {}

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// PostgreSQL URL; `None` selects the in-memory state store
    pub database_url: Option<String>,
    pub channel_access_token: String,
    pub store_timeout: Duration,
    pub alert_timeout: Duration,
}

impl ServiceConfig {
    pub fn new() -> Result<Self, ConfigError> {
        // Load environment variables
        dotenv::dotenv().ok();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL")
            .map(|url| url.trim().to_string())
            .filter(|url| !url.is_empty());

        let channel_access_token = lookup("CHANNEL_ACCESS_TOKEN")
            .map(|token| token.trim().to_string())
            .filter(|token| !token.is_empty())
            .ok_or_else(|| {
                ConfigError("CHANNEL_ACCESS_TOKEN environment variable not set".into())
            })?;

        let store_timeout = parse_timeout(&lookup, "STORE_TIMEOUT_MS", DEFAULT_STORE_TIMEOUT_MS)?;
        let alert_timeout = parse_timeout(&lookup, "ALERT_TIMEOUT_MS", DEFAULT_ALERT_TIMEOUT_MS)?;

        Ok(ServiceConfig {
            database_url,
            channel_access_token,
            store_timeout,
            alert_timeout,
        })
    }
}

fn parse_timeout<F>(lookup: &F, key: &str, default_ms: u64) -> Result<Duration, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(key) else {
        return Ok(Duration::from_millis(default_ms));
    };

    match raw.trim().parse::<u64>() {
        Ok(ms) if ms > 0 => Ok(Duration::from_millis(ms)),
        _ => Err(ConfigError(format!(
            "{} must be a positive number of milliseconds, got '{}'",
            key, raw
        ))),
    }
}
