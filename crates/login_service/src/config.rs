//! Login service configuration loaded from a TOML file.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginConfig {
    pub service: ServiceSettings,
    pub cache: CacheLinkSettings,
    pub users: UserPolicySettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceSettings {
    /// This login service's numeric id on the inner network.
    pub service_id: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheLinkSettings {
    /// Cache service endpoint.
    pub address: String,
    /// Floor between reconnect attempts, in milliseconds.
    pub reconnect_interval_ms: u64,
    /// When false, losing the cache connection terminates the service.
    pub auto_reconnect: bool,
    /// How long a parked request may wait for its response before it is
    /// failed with a definite outcome, in milliseconds.
    pub request_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserPolicySettings {
    /// Ask the cache service to create unknown accounts on first login.
    pub auto_create_users: bool,
    /// Access level assigned to auto-created accounts.
    pub default_access_level: u8,
    /// Minimum access level allowed through this login service.
    pub allowed_access_level: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    pub level: String,
    pub json_format: bool,
}

impl Default for LoginConfig {
    fn default() -> Self {
        Self {
            service: ServiceSettings { service_id: 2 },
            cache: CacheLinkSettings {
                address: "127.0.0.1:9010".to_string(),
                reconnect_interval_ms: 5000,
                auto_reconnect: true,
                request_timeout_ms: 10_000,
            },
            users: UserPolicySettings {
                auto_create_users: false,
                default_access_level: 0,
                allowed_access_level: 0,
            },
            logging: LoggingSettings {
                level: "info".to_string(),
                json_format: false,
            },
        }
    }
}

impl LoginConfig {
    pub async fn load_from_file(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let content = tokio::fs::read_to_string(path).await?;
            let config: LoginConfig = toml::from_str(&content)?;
            Ok(config)
        } else {
            let default_config = LoginConfig::default();
            let toml_content = toml::to_string_pretty(&default_config)?;
            tokio::fs::write(path, toml_content).await?;
            tracing::info!("created default configuration file: {}", path.display());
            Ok(default_config)
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.cache.address.parse::<std::net::SocketAddr>().is_err() {
            return Err(format!("invalid cache address: {}", self.cache.address));
        }
        if self.cache.request_timeout_ms == 0 {
            return Err("request timeout must be positive".to_string());
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(format!(
                "invalid log level: {}. Must be one of: {:?}",
                self.logging.level, valid_levels
            ));
        }
        Ok(())
    }

    pub fn reconnect_interval(&self) -> Duration {
        Duration::from_millis(self.cache.reconnect_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.cache.request_timeout_ms)
    }
}
