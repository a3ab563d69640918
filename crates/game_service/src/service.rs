//! Game service wiring: the cache link and the world-readiness
//! announcement sequence.
//!
//! Startup order on every (re)connect: identity handshake → settings push
//! → wait for acceptance → announce the world active. The cache service
//! flips the world online only after that announcement, so players cannot
//! be routed to a world that is not actually serving yet.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, watch};
use tracing::{error, info, warn};

use inner_net::messages::layer;
use inner_net::messages::service_layer::{
    self, InitializeResponse, SetSettingsRequest, SetSettingsResponse,
};
use inner_net::messages::world_data::{self, SetWorldActiveRequest};
use inner_net::{
    GameServiceSettings, LinkConfig, LinkEvent, LinkHandle, LinkSender, NetError, Packet,
    PacketHandler, ServiceIdentity, ServiceKind, ServiceLink, ServiceSettings,
};

use crate::config::GameConfig;

/// Handler for packets arriving from the cache service.
struct CacheLinkHandler {
    sender: LinkSender,
    settings: GameServiceSettings,
    active_tx: watch::Sender<bool>,
    fatal_tx: mpsc::UnboundedSender<String>,
}

#[async_trait]
impl PacketHandler for CacheLinkHandler {
    async fn handle_packet(&self, mut packet: Packet) -> Result<(), NetError> {
        match (packet.first_opcode(), packet.second_opcode()) {
            (layer::SERVICE_LAYER, service_layer::INITIALIZE_RESPONSE) => {
                let response = InitializeResponse::from_packet(&mut packet)?;
                if response.accepted {
                    info!(remote = %response.remote, "authorized on remote service");
                    let request = SetSettingsRequest {
                        settings: ServiceSettings::Game(self.settings),
                    };
                    if let Err(e) = self.sender.send(request.to_packet()) {
                        warn!(error = %e, "failed to push settings after handshake");
                    }
                } else {
                    warn!(remote = %response.remote, "connection rejected by remote service");
                    let _ = self.fatal_tx.send("handshake rejected".to_string());
                }
            }
            (layer::SERVICE_LAYER, service_layer::SET_SETTINGS_RESPONSE) => {
                let response = SetSettingsResponse::from_packet(&mut packet)?;
                if response.accepted {
                    info!("cache service accepted service settings");
                    if let Err(e) = self.sender.send(SetWorldActiveRequest.to_packet()) {
                        warn!(error = %e, "failed to announce world readiness");
                    }
                } else {
                    let _ = self
                        .fatal_tx
                        .send("cache service rejected settings setup".to_string());
                }
            }
            (layer::WORLD_DATA_LAYER, world_data::SET_WORLD_ACTIVE_RESPONSE) => {
                info!("world is ready for incoming user connections");
                let _ = self.active_tx.send(true);
            }
            (first, second) => {
                warn!(first, second, "unknown packet received from cache service");
            }
        }
        Ok(())
    }
}

/// The game service: keeps the cache link alive and the world announced.
pub struct GameService {
    link: LinkHandle,
    active: watch::Receiver<bool>,
    fatal: watch::Receiver<Option<String>>,
}

impl GameService {
    pub fn start(config: GameConfig) -> anyhow::Result<Self> {
        let cache_address = config
            .cache
            .address
            .parse()
            .map_err(|_| anyhow::anyhow!("invalid cache address: {}", config.cache.address))?;

        let identity = ServiceIdentity::new(ServiceKind::GameService, config.service.service_id);
        let (link, sender, mut link_events) = ServiceLink::new(LinkConfig {
            remote: cache_address,
            identity,
            reconnect_interval: config.reconnect_interval(),
            auto_reconnect: config.cache.auto_reconnect,
        });

        let (active_tx, active) = watch::channel(false);
        let (handler_fatal_tx, mut handler_fatal_rx) = mpsc::unbounded_channel();
        let handler = CacheLinkHandler {
            sender,
            settings: GameServiceSettings {
                service_id: config.service.service_id,
            },
            active_tx: active_tx.clone(),
            fatal_tx: handler_fatal_tx,
        };
        let link = link.spawn(Arc::new(handler));

        let (fatal_tx, fatal) = watch::channel(None);
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    event = link_events.recv() => match event {
                        Some(LinkEvent::Connected) => {}
                        Some(LinkEvent::Disconnected(reason)) => {
                            warn!(%reason, "cache link lost");
                            let _ = active_tx.send(false);
                        }
                        Some(LinkEvent::Fatal(message)) => {
                            error!(%message, "cache link is gone for good");
                            let _ = fatal_tx.send(Some(message));
                            return;
                        }
                        None => return,
                    },
                    message = handler_fatal_rx.recv() => match message {
                        Some(message) => {
                            error!(%message, "cache service refused this game service");
                            let _ = fatal_tx.send(Some(message));
                            return;
                        }
                        None => return,
                    },
                }
            }
        });

        info!(%identity, cache = %cache_address, "🚀 game service started");
        Ok(Self {
            link,
            active,
            fatal,
        })
    }

    /// Waits until the cache service has confirmed the world is active.
    pub async fn wait_active(&self) {
        let mut active = self.active.clone();
        let _ = active.wait_for(|active| *active).await;
    }

    /// Resolves when the service can no longer operate, with the reason.
    pub async fn wait_fatal(&self) -> String {
        let mut fatal = self.fatal.clone();
        let result = match fatal.wait_for(|reason| reason.is_some()).await {
            Ok(reason) => reason.clone().unwrap_or_default(),
            Err(_) => "service supervisor stopped".to_string(),
        };
        result
    }

    pub fn shutdown(&self) {
        info!("🛑 shutting down game service...");
        self.link.shutdown();
    }
}
