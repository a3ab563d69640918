//! Cache service configuration loaded from a TOML file.

use std::path::Path;

use serde::{Deserialize, Serialize};

use inner_net::WorldSummary;

/// Application configuration for the cache service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub service: ServiceSettings,
    pub logging: LoggingSettings,
    /// Worlds served to the login services; stands in for the worlds table
    /// the database collaborator would load in production.
    #[serde(default)]
    pub worlds: Vec<WorldSummary>,
    /// Seed accounts for the in-memory database.
    #[serde(default)]
    pub accounts: Vec<AccountSeed>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceSettings {
    /// This cache service's numeric id on the inner network.
    pub service_id: u8,
    /// Address the inner-network listener binds to.
    pub bind_address: String,
    /// Listener backlog.
    pub backlog: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Log level filter
    pub level: String,
    /// JSON formatting
    pub json_format: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountSeed {
    pub login: String,
    pub password: String,
    #[serde(default)]
    pub access_level: u8,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            service: ServiceSettings {
                service_id: 1,
                bind_address: "127.0.0.1:9010".to_string(),
                backlog: 128,
            },
            logging: LoggingSettings {
                level: "info".to_string(),
                json_format: false,
            },
            worlds: Vec::new(),
            accounts: Vec::new(),
        }
    }
}

impl CacheConfig {
    /// Loads configuration from `path`, writing a default file there first
    /// if none exists yet.
    pub async fn load_from_file(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let content = tokio::fs::read_to_string(path).await?;
            let config: CacheConfig = toml::from_str(&content)?;
            Ok(config)
        } else {
            let default_config = CacheConfig::default();
            let toml_content = toml::to_string_pretty(&default_config)?;
            tokio::fs::write(path, toml_content).await?;
            tracing::info!("created default configuration file: {}", path.display());
            Ok(default_config)
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self
            .service
            .bind_address
            .parse::<std::net::SocketAddr>()
            .is_err()
        {
            return Err(format!(
                "invalid bind address: {}",
                self.service.bind_address
            ));
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(format!(
                "invalid log level: {}. Must be one of: {:?}",
                self.logging.level, valid_levels
            ));
        }

        let mut ids = std::collections::HashSet::new();
        for world in &self.worlds {
            if !ids.insert(world.id) {
                return Err(format!("duplicate world id in configuration: {}", world.id));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = CacheConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn bad_bind_address_fails_validation() {
        let mut config = CacheConfig::default();
        config.service.bind_address = "not-an-address".to_string();
        assert!(config.validate().is_err());
    }

    #[tokio::test]
    async fn missing_file_is_created_with_defaults() {
        let dir = tempfile::tempdir().expect("tempdir should be created");
        let path = dir.path().join("cache.toml");

        let config = CacheConfig::load_from_file(&path)
            .await
            .expect("load should create defaults");
        assert!(path.exists());
        assert_eq!(config.service.service_id, 1);

        let reloaded = CacheConfig::load_from_file(&path)
            .await
            .expect("written file should parse back");
        assert_eq!(reloaded.service.bind_address, config.service.bind_address);
    }
}
