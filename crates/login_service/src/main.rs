//! Login service entry point.

use std::path::PathBuf;

use clap::{Arg, Command};
use tracing::{error, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use login_service::{LoginConfig, LoginService};

#[derive(Debug, Clone)]
struct CliArgs {
    config_path: PathBuf,
    cache_address: Option<String>,
    log_level: Option<String>,
    json_logs: bool,
}

impl CliArgs {
    fn parse() -> Self {
        let matches = Command::new("Login Service")
            .version(env!("CARGO_PKG_VERSION"))
            .about("Authenticates users against the cache service")
            .arg(
                Arg::new("config")
                    .short('c')
                    .long("config")
                    .value_name("FILE")
                    .help("Configuration file path")
                    .default_value("login_service.toml"),
            )
            .arg(
                Arg::new("cache")
                    .long("cache")
                    .value_name("ADDRESS")
                    .help("Cache service address (e.g., 127.0.0.1:9010)"),
            )
            .arg(
                Arg::new("log-level")
                    .short('l')
                    .long("log-level")
                    .value_name("LEVEL")
                    .help("Log level (trace, debug, info, warn, error)"),
            )
            .arg(
                Arg::new("json-logs")
                    .long("json-logs")
                    .help("Output logs in JSON format")
                    .action(clap::ArgAction::SetTrue),
            )
            .get_matches();

        Self {
            config_path: PathBuf::from(
                matches
                    .get_one::<String>("config")
                    .expect("default config path should always be set"),
            ),
            cache_address: matches.get_one::<String>("cache").cloned(),
            log_level: matches.get_one::<String>("log-level").cloned(),
            json_logs: matches.get_flag("json-logs"),
        }
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
    let args = CliArgs::parse();

    let mut config = LoginConfig::load_from_file(&args.config_path).await?;
    if let Some(cache_address) = args.cache_address {
        config.cache.address = cache_address;
    }
    if let Some(log_level) = args.log_level {
        config.logging.level = log_level;
    }
    if args.json_logs {
        config.logging.json_format = true;
    }
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("configuration validation failed: {e}"))?;

    setup_logging(&config.logging.level, config.logging.json_format);

    let service = LoginService::start(config)?;

    tokio::select! {
        _ = wait_for_shutdown_signal() => {
            service.shutdown();
            info!("✅ login service shutdown complete");
        }
        reason = service.wait_fatal() => {
            error!("❌ login service terminated: {reason}");
            service.shutdown();
            std::process::exit(1);
        }
    }

    Ok(())
}
