//! Npc service entry point.
//!
//! The npc service keeps an identified connection to the cache service and
//! nothing more today; the npc logic itself hangs off this link.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use clap::{Arg, Command};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use inner_net::messages::layer;
use inner_net::messages::service_layer::{self, InitializeResponse};
use inner_net::{
    LinkConfig, LinkEvent, NetError, Packet, PacketHandler, ServiceIdentity, ServiceKind,
    ServiceLink,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct NpcConfig {
    service: ServiceSettings,
    cache: CacheLinkSettings,
    logging: LoggingSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ServiceSettings {
    service_id: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheLinkSettings {
    address: String,
    reconnect_interval_ms: u64,
    auto_reconnect: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LoggingSettings {
    level: String,
    json_format: bool,
}

impl Default for NpcConfig {
    fn default() -> Self {
        Self {
            service: ServiceSettings { service_id: 4 },
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

impl NpcConfig {
    async fn load_from_file(path: &std::path::Path) -> anyhow::Result<Self> {
        if path.exists() {
            let content = tokio::fs::read_to_string(path).await?;
            Ok(toml::from_str(&content)?)
        } else {
            let default_config = NpcConfig::default();
            tokio::fs::write(path, toml::to_string_pretty(&default_config)?).await?;
            info!("created default configuration file: {}", path.display());
            Ok(default_config)
        }
    }
}

/// Handler for packets arriving from the cache service.
struct CacheLinkHandler;

#[async_trait]
impl PacketHandler for CacheLinkHandler {
    async fn handle_packet(&self, mut packet: Packet) -> Result<(), NetError> {
        match (packet.first_opcode(), packet.second_opcode()) {
            (layer::SERVICE_LAYER, service_layer::INITIALIZE_RESPONSE) => {
                let response = InitializeResponse::from_packet(&mut packet)?;
                if response.accepted {
                    info!(remote = %response.remote, "authorized on remote service");
                } else {
                    warn!(remote = %response.remote, "connection rejected by remote service");
                }
            }
            (first, second) => {
                warn!(first, second, "unknown packet received from cache service");
            }
        }
        Ok(())
    }
}

fn setup_logging(level: &str, json_format: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let registry = tracing_subscriber::registry().with(filter);
    if json_format {
        registry.with(fmt::layer().json().with_target(false)).init();
    } else {
        registry.with(fmt::layer().with_target(false)).init();
    }
}

async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigint = signal(SignalKind::interrupt()).expect("SIGINT handler");
        let mut sigterm = signal(SignalKind::terminate()).expect("SIGTERM handler");
        tokio::select! {
            _ = sigint.recv() => info!("📡 received SIGINT"),
            _ = sigterm.recv() => info!("📡 received SIGTERM"),
        }
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await.expect("Ctrl+C handler");
        info!("📡 received Ctrl+C");
    }
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> anyhow::Result<()> {
    let matches = Command::new("Npc Service")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Npc backend connected to the cache service")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path")
                .default_value("npc_service.toml"),
        )
        .arg(
            Arg::new("cache")
                .long("cache")
                .value_name("ADDRESS")
                .help("Cache service address (e.g., 127.0.0.1:9010)"),
        )
        .get_matches();

    let config_path = PathBuf::from(
        matches
            .get_one::<String>("config")
            .expect("default config path should always be set"),
    );
    let mut config = NpcConfig::load_from_file(&config_path).await?;
    if let Some(cache_address) = matches.get_one::<String>("cache") {
        config.cache.address = cache_address.clone();
    }

    setup_logging(&config.logging.level, config.logging.json_format);

    let cache_address = config
        .cache
        .address
        .parse()
        .map_err(|_| anyhow::anyhow!("invalid cache address: {}", config.cache.address))?;
    let identity = ServiceIdentity::new(ServiceKind::NpcService, config.service.service_id);

    let (link, _sender, mut events) = ServiceLink::new(LinkConfig {
        remote: cache_address,
        identity,
        reconnect_interval: Duration::from_millis(config.cache.reconnect_interval_ms),
        auto_reconnect: config.cache.auto_reconnect,
    });
    let link = link.spawn(Arc::new(CacheLinkHandler));
    info!(%identity, cache = %cache_address, "🚀 npc service started");

    let events_task = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            if let LinkEvent::Fatal(message) = event {
                error!("❌ npc service terminated: {message}");
                std::process::exit(1);
            }
        }
    });

    wait_for_shutdown_signal().await;
    link.shutdown();
    events_task.abort();
    info!("✅ npc service shutdown complete");

    Ok(())
}
