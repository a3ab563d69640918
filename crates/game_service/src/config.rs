//! Game service configuration loaded from a TOML file.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameConfig {
    pub service: ServiceSettings,
    pub cache: CacheLinkSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceSettings {
    /// This game service's numeric id on the inner network; it doubles as
    /// the id of the world it hosts.
    pub service_id: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheLinkSettings {
    pub address: String,
    pub reconnect_interval_ms: u64,
    pub auto_reconnect: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    pub level: String,
    pub json_format: bool,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            service: ServiceSettings { service_id: 1 },
            cache: CacheLinkSettings {
                address: "127.0.0.1:9010".to_string(),
                reconnect_interval_ms: 5000,
                auto_reconnect: true,
            },
            logging: LoggingSettings {
                level: "info".to_string(),
                json_format: false,
            },
        }
    }
}

impl GameConfig {
    pub async fn load_from_file(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let content = tokio::fs::read_to_string(path).await?;
            let config: GameConfig = toml::from_str(&content)?;
            Ok(config)
        } else {
            let default_config = GameConfig::default();
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
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(GameConfig::default().validate().is_ok());
    }

    #[tokio::test]
    async fn missing_file_is_created_with_defaults() {
        let dir = tempfile::tempdir().expect("tempdir should be created");
        let path = dir.path().join("game.toml");
        let config = GameConfig::load_from_file(&path)
            .await
            .expect("load should create defaults");
        assert!(path.exists());
        assert_eq!(config.service.service_id, 1);
    }
}
