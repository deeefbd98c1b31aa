use std::env;
use std::time::Duration;
use thiserror::Error;
use url::Url;

pub const TOKEN_ENV: &str = "SLACK_BOT_TOKEN";
pub const DEFAULT_API_URL: &str = "https://slack.com/api";
pub const DEFAULT_MIN_INTERVAL_MS: u64 = 1_000;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid SLACK_API_URL {value:?}: {reason}")]
    ApiUrl { value: String, reason: String },
}

/// Runtime configuration for the Slack client and request gateway.
/// Values are sourced from environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    pub api_url: String,
    pub user_agent: String,
    pub timeout_secs: u64,
    pub min_interval: Duration,
    pub enable_ping: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            user_agent: default_user_agent(),
            timeout_secs: 30,
            min_interval: Duration::from_millis(DEFAULT_MIN_INTERVAL_MS),
            enable_ping: false,
        }
    }
}

impl Config {
    /// Load configuration from environment.
    ///
    /// SLACK_BOT_TOKEN is not read here; the credential store picks it up on
    /// the first remote call so a missing token only fails that call.
    ///
    /// Env vars:
    /// - SLACK_API_URL (default: https://slack.com/api)
    /// - SLACK_HTTP_TIMEOUT_SECS (default: 30)
    /// - SLACK_MIN_API_INTERVAL_MS (default: 1000)
    /// - SLACK_USER_AGENT (default: slack-mcp/<version>)
    /// - SLACK_MCP_ENABLE_PING (default: off)
    pub fn from_env() -> Result<Self, ConfigError> {
        let raw_url = env::var("SLACK_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string());
        let api_url = normalize_api_url(&raw_url)?;

        let timeout_secs = env::var("SLACK_HTTP_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(30);
        let min_interval_ms = env::var("SLACK_MIN_API_INTERVAL_MS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_MIN_INTERVAL_MS);
        let user_agent = env::var("SLACK_USER_AGENT").unwrap_or_else(|_| default_user_agent());
        let enable_ping = env::var("SLACK_MCP_ENABLE_PING")
            .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
            .unwrap_or(false);

        Ok(Self {
            api_url,
            user_agent,
            timeout_secs,
            min_interval: Duration::from_millis(min_interval_ms),
            enable_ping,
        })
    }
}

fn default_user_agent() -> String {
    format!("slack-mcp/{}", env!("CARGO_PKG_VERSION"))
}

// Accept only absolute http(s) URLs; strip the trailing slash so method paths join cleanly.
fn normalize_api_url(raw: &str) -> Result<String, ConfigError> {
    let parsed = Url::parse(raw).map_err(|e| ConfigError::ApiUrl {
        value: raw.to_string(),
        reason: e.to_string(),
    })?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ConfigError::ApiUrl {
            value: raw.to_string(),
            reason: format!("unsupported scheme {}", parsed.scheme()),
        });
    }
    Ok(raw.trim_end_matches('/').to_string())
}
