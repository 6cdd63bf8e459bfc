use crate::constants::{DEFAULT_DATA_SERVICE_URL, DEFAULT_ICON_URL, DEFAULT_NODE_URL, DEFAULT_RETRY_DELAY_MS};
use crate::data_sync::scheduler::RetryPolicy;
use crate::utils::config_loader::{LoadConfigError, load_from_file, load_from_file_sync};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use url::Url;

/// Configuration of one balance tracker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Address whose balances are tracked
    pub address: String,
    /// Node REST API (balances and fee quotes)
    pub node_url: String,
    /// Data service API (asset metadata)
    pub data_service_url: String,
    /// Base URL of asset icons
    pub icon_url: String,
    /// Polling interval in milliseconds; no polling when unset
    pub update_balances_ms: Option<u64>,
    /// Delay between retries of a failed load in milliseconds
    pub retry_delay_ms: u64,
    /// Attempts before a load gives up; retries forever when unset
    pub max_retry_attempts: Option<u32>,
    /// Timeout for HTTP requests in seconds
    pub http_timeout_secs: u64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            address: String::new(),
            node_url: DEFAULT_NODE_URL.to_string(),
            data_service_url: DEFAULT_DATA_SERVICE_URL.to_string(),
            icon_url: DEFAULT_ICON_URL.to_string(),
            update_balances_ms: None,
            retry_delay_ms: DEFAULT_RETRY_DELAY_MS,
            max_retry_attempts: None,
            http_timeout_secs: 10,
        }
    }
}

impl TrackerConfig {
    pub fn new(address: impl Into<String>) -> Self {
        Self { address: address.into(), ..Self::default() }
    }

    /// Load configuration from environment variables
    pub fn from_env() -> eyre::Result<Self> {
        let mut config = Self::default();

        if let Ok(address) = std::env::var("BALANCE_ADDRESS") {
            config.address = address;
        }

        if let Ok(node_url) = std::env::var("NODE_URL") {
            Url::parse(&node_url).map_err(|e| eyre::eyre!("Invalid NODE_URL: {}", e))?;
            config.node_url = node_url;
        }

        if let Ok(data_service_url) = std::env::var("DATA_SERVICE_URL") {
            Url::parse(&data_service_url).map_err(|e| eyre::eyre!("Invalid DATA_SERVICE_URL: {}", e))?;
            config.data_service_url = data_service_url;
        }

        if let Ok(icon_url) = std::env::var("ICON_URL") {
            Url::parse(&icon_url).map_err(|e| eyre::eyre!("Invalid ICON_URL: {}", e))?;
            config.icon_url = icon_url;
        }

        if let Ok(interval_str) = std::env::var("UPDATE_BALANCES_MS") {
            config.update_balances_ms = Some(
                interval_str
                    .parse()
                    .map_err(|e| eyre::eyre!("Invalid UPDATE_BALANCES_MS: {}", e))?,
            );
        }

        if let Ok(delay_str) = std::env::var("RETRY_DELAY_MS") {
            config.retry_delay_ms = delay_str
                .parse()
                .map_err(|e| eyre::eyre!("Invalid RETRY_DELAY_MS: {}", e))?;
        }

        if let Ok(attempts_str) = std::env::var("MAX_RETRY_ATTEMPTS") {
            config.max_retry_attempts = Some(
                attempts_str
                    .parse()
                    .map_err(|e| eyre::eyre!("Invalid MAX_RETRY_ATTEMPTS: {}", e))?,
            );
        }

        if let Ok(timeout_str) = std::env::var("HTTP_TIMEOUT_SECS") {
            config.http_timeout_secs = timeout_str
                .parse()
                .map_err(|e| eyre::eyre!("Invalid HTTP_TIMEOUT_SECS: {}", e))?;
        }

        Ok(config)
    }

    /// Load a `[tracker]`-less TOML file; `${VAR}` references are expanded.
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, LoadConfigError> {
        let config: Self = load_from_file(path).await?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file_sync(path: impl AsRef<Path>) -> Result<Self, LoadConfigError> {
        let config: Self = load_from_file_sync(path)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), LoadConfigError> {
        if self.address.is_empty() {
            return Err(LoadConfigError::ConfigError("address is required".to_string()));
        }
        for (name, value) in [
            ("node_url", &self.node_url),
            ("data_service_url", &self.data_service_url),
            ("icon_url", &self.icon_url),
        ] {
            Url::parse(value).map_err(|e| LoadConfigError::ConfigError(format!("Invalid {name}: {e}")))?;
        }
        if self.update_balances_ms == Some(0) {
            return Err(LoadConfigError::ConfigError("update_balances_ms must be positive".to_string()));
        }
        Ok(())
    }

    pub fn update_interval(&self) -> Option<Duration> {
        self.update_balances_ms.map(Duration::from_millis)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        match self.max_retry_attempts {
            Some(max_attempts) => RetryPolicy::bounded(self.retry_delay(), max_attempts),
            None => RetryPolicy::forever(self.retry_delay()),
        }
    }
}
