use serde::Deserialize;
use std::time::Duration;

use crate::error::{AppError, Result};

/// Plain environment variables honoured as defaults underneath the file and
/// `PIPEWATCH__*` sources.
const LEGACY_ENV: &[(&str, &str)] = &[
    ("SLACK_WEBHOOK_URL", "slack.webhook_url"),
    ("GITHUB_TOKEN", "github.token"),
    ("ENVIRONMENT", "environment"),
];

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub slack: SlackConfig,
    #[serde(default)]
    pub github: GitHubConfig,
    /// Deployment environment label included in alerts and rollback payloads.
    #[serde(default = "default_environment")]
    pub environment: String,
    /// Upper bound for every outbound HTTP call.
    #[serde(default = "default_outbound_timeout_secs")]
    pub outbound_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Deserialize, Clone)]
pub struct SlackConfig {
    pub webhook_url: Option<String>,
    #[serde(default = "default_username")]
    pub username: Option<String>,
    #[serde(default = "default_icon_emoji")]
    pub icon_emoji: Option<String>,
}

// Manual Debug impl to avoid leaking the webhook URL, which embeds a secret
impl std::fmt::Debug for SlackConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlackConfig")
            .field("webhook_url", &self.webhook_url.as_ref().map(|_| "[REDACTED]"))
            .field("username", &self.username)
            .field("icon_emoji", &self.icon_emoji)
            .finish()
    }
}

#[derive(Deserialize, Clone)]
pub struct GitHubConfig {
    pub token: Option<String>,
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
}

// Manual Debug impl to avoid leaking the token
impl std::fmt::Debug for GitHubConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubConfig")
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("api_base_url", &self.api_base_url)
            .finish()
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for SlackConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            username: default_username(),
            icon_emoji: default_icon_emoji(),
        }
    }
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            token: None,
            api_base_url: default_api_base_url(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            slack: SlackConfig::default(),
            github: GitHubConfig::default(),
            environment: default_environment(),
            outbound_timeout_secs: default_outbound_timeout_secs(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_username() -> Option<String> {
    Some("Pipeline Monitor".to_string())
}

fn default_icon_emoji() -> Option<String> {
    Some(":rotating_light:".to_string())
}

fn default_api_base_url() -> String {
    "https://api.github.com".to_string()
}

fn default_environment() -> String {
    "production".to_string()
}

fn default_outbound_timeout_secs() -> u64 {
    10
}

fn non_empty(value: Option<&String>) -> Option<&str> {
    value.map(|v| v.trim()).filter(|v| !v.is_empty())
}

impl AppConfig {
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let legacy = LEGACY_ENV.iter().filter_map(|(var, key)| {
            std::env::var(var)
                .ok()
                .filter(|v| !v.is_empty())
                .map(|v| (*key, v))
        });
        Self::load_with_defaults(config_path, legacy)
    }

    fn load_with_defaults<I>(config_path: Option<&str>, defaults: I) -> Result<Self>
    where
        I: IntoIterator<Item = (&'static str, String)>,
    {
        let mut builder = config::Config::builder();

        for (key, value) in defaults {
            builder = builder
                .set_default(key, value)
                .map_err(|e| AppError::Config(e.to_string()))?;
        }

        // Load from file if specified
        if let Some(path) = config_path {
            builder = builder.add_source(config::File::with_name(path));
        } else {
            builder = builder.add_source(config::File::with_name("pipewatch").required(false));
        }

        // Environment variable overrides with PIPEWATCH__ prefix
        builder = builder.add_source(
            config::Environment::with_prefix("PIPEWATCH")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder
            .build()
            .map_err(|e| AppError::Config(e.to_string()))?;

        let config: Self = config
            .try_deserialize()
            .map_err(|e| AppError::Config(e.to_string()))?;

        if config.outbound_timeout_secs == 0 {
            return Err(AppError::Config(
                "outbound_timeout_secs must be at least 1".to_string(),
            ));
        }

        Ok(config)
    }

    /// Slack incoming-webhook URL, if one is configured.
    pub fn slack_webhook_url(&self) -> Option<&str> {
        non_empty(self.slack.webhook_url.as_ref())
    }

    /// Token used for repository dispatches, if one is configured.
    pub fn github_token(&self) -> Option<&str> {
        non_empty(self.github.token.as_ref())
    }

    pub fn outbound_timeout(&self) -> Duration {
        Duration::from_secs(self.outbound_timeout_secs)
    }
}
