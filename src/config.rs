use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::auth::{OAuthConfig, ProviderSettings};
use crate::client::PollPolicy;
use crate::models::Provider;

const APP_DIR: &str = "promptweb";

/// Contents of `config.toml`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Backend serving `/api/promptweb` and `/api/results`
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_session_refresh")]
    pub session_refresh_secs: u64,
    /// Unset means poll until the job finishes
    #[serde(default)]
    pub max_wait_secs: Option<u64>,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    /// Defaults to the platform data directory
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
    #[serde(default)]
    pub google: ProviderSettings,
    #[serde(default)]
    pub slack: ProviderSettings,
}

fn default_base_url() -> String {
    "https://localhost:8181".to_string()
}

fn default_poll_interval() -> u64 {
    30
}

fn default_session_refresh() -> u64 {
    60
}

fn default_request_timeout() -> u64 {
    30
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            poll_interval_secs: default_poll_interval(),
            session_refresh_secs: default_session_refresh(),
            max_wait_secs: None,
            request_timeout_secs: default_request_timeout(),
            data_dir: None,
            google: ProviderSettings::default(),
            slack: ProviderSettings::default(),
        }
    }
}

impl AppConfig {
    /// `$PROMPTWEB_CONFIG`, or `<config_dir>/promptweb/config.toml`
    pub fn default_path() -> PathBuf {
        if let Ok(path) = std::env::var("PROMPTWEB_CONFIG") {
            return PathBuf::from(path);
        }
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
            .join("config.toml")
    }

    /// Load the config file; a missing file yields the defaults.
    /// `PROMPTWEB_BASE_URL` overrides `base_url`.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config {}", path.display()))?;
            Self::parse(&content)
                .with_context(|| format!("Invalid config {}", path.display()))?
        } else {
            tracing::debug!("No config at {}, using defaults", path.display());
            Self::default()
        };

        if let Ok(base_url) = std::env::var("PROMPTWEB_BASE_URL") {
            config.base_url = base_url;
        }

        Ok(config)
    }

    /// Parse a config file. Zero intervals are raised to one second.
    pub fn parse(content: &str) -> Result<Self> {
        let mut config: Self = toml::from_str(content)?;

        if config.poll_interval_secs == 0 {
            tracing::warn!("poll_interval_secs = 0 would poll without pause, using 1");
            config.poll_interval_secs = 1;
        }
        if config.session_refresh_secs == 0 {
            tracing::warn!("session_refresh_secs = 0 is not a period, using 1");
            config.session_refresh_secs = 1;
        }

        Ok(config)
    }

    pub fn data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(APP_DIR)
        })
    }

    pub fn session_path(&self) -> PathBuf {
        self.data_dir().join("session.json")
    }

    pub fn log_dir(&self) -> PathBuf {
        self.data_dir().join("logs")
    }

    pub fn poll_policy(&self) -> PollPolicy {
        PollPolicy {
            interval: Duration::from_secs(self.poll_interval_secs),
            max_wait: self.max_wait_secs.map(Duration::from_secs),
        }
    }

    pub fn session_refresh(&self) -> Duration {
        Duration::from_secs(self.session_refresh_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn oauth(&self, provider: Provider) -> OAuthConfig {
        let settings = match provider {
            Provider::Google => &self.google,
            Provider::Slack => &self.slack,
        };
        OAuthConfig::for_provider(provider, settings)
    }
}
