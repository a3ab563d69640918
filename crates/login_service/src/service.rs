//! Login service wiring: cache link, correlation pool, flow API and the
//! supervisor that keeps the pool honest.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::time::interval;
use tracing::{error, info, warn};

use inner_net::{
    LinkConfig, LinkEvent, LinkHandle, RequestPool, ServiceIdentity, ServiceKind, ServiceLink,
};

use crate::config::LoginConfig;
use crate::flow::{ClientTicket, LoginFlows};
use crate::handlers::{CacheLinkHandler, ControlEvent};

/// The login service: owns the cache link and exposes the client flows.
pub struct LoginService {
    flows: Arc<LoginFlows>,
    pool: Arc<RequestPool<ClientTicket>>,
    link: LinkHandle,
    ready: watch::Receiver<bool>,
    fatal: watch::Receiver<Option<String>>,
}

impl LoginService {
    /// Builds and starts the service: dials the cache service, pushes
    /// settings once accepted, and runs the pool sweeper.
    pub fn start(config: LoginConfig) -> anyhow::Result<Self> {
        let cache_address = config
            .cache
            .address
            .parse()
            .map_err(|_| anyhow::anyhow!("invalid cache address: {}", config.cache.address))?;

        let identity = ServiceIdentity::new(ServiceKind::LoginService, config.service.service_id);
        let pool = Arc::new(RequestPool::new());

        let (link, sender, link_events) = ServiceLink::new(LinkConfig {
            remote: cache_address,
            identity,
            reconnect_interval: config.reconnect_interval(),
            auto_reconnect: config.cache.auto_reconnect,
        });

        let (control_tx, control_rx) = mpsc::unbounded_channel();
        let handler = CacheLinkHandler {
            sender: sender.clone(),
            pool: pool.clone(),
            settings: inner_net::LoginServiceSettings {
                service_id: config.service.service_id,
                auto_create_users: config.users.auto_create_users,
                default_access_level: config.users.default_access_level,
            },
            allowed_access_level: config.users.allowed_access_level,
            control: control_tx,
        };
        let link = link.spawn(Arc::new(handler));

        let (ready_tx, ready) = watch::channel(false);
        let (fatal_tx, fatal) = watch::channel(None);
        tokio::spawn(supervise(
            pool.clone(),
            link_events,
            control_rx,
            ready_tx,
            fatal_tx,
            config.request_timeout(),
        ));

        let flows = Arc::new(LoginFlows::new(sender, pool.clone()));
        info!(%identity, cache = %cache_address, "🚀 login service started");

        Ok(Self {
            flows,
            pool,
            link,
            ready,
            fatal,
        })
    }

    /// The flow API handed to the client-facing front end.
    pub fn flows(&self) -> Arc<LoginFlows> {
        self.flows.clone()
    }

    /// Waits until the cache service has accepted our settings.
    pub async fn wait_ready(&self) {
        let mut ready = self.ready.clone();
        let _ = ready.wait_for(|ready| *ready).await;
    }

    /// Resolves when the service can no longer operate (link gave up or
    /// the cache service refused us), with the reason.
    pub async fn wait_fatal(&self) -> String {
        let mut fatal = self.fatal.clone();
        let result = match fatal.wait_for(|reason| reason.is_some()).await {
            Ok(reason) => reason.clone().unwrap_or_default(),
            Err(_) => "service supervisor stopped".to_string(),
        };
        result
    }

    /// Stops the link and fails everything still parked.
    pub fn shutdown(&self) {
        info!("🛑 shutting down login service...");
        for (_, ticket) in self.pool.shutdown() {
            ticket.fail("service shutting down");
        }
        self.link.shutdown();
    }
}

/// Supervisor loop: reconciles the pool with link state (a dead remote
/// answers nothing, so its pending entries are failed explicitly), applies
/// the request timeout sweep, and surfaces fatal conditions.
async fn supervise(
    pool: Arc<RequestPool<ClientTicket>>,
    mut link_events: mpsc::UnboundedReceiver<LinkEvent>,
    mut control: mpsc::UnboundedReceiver<ControlEvent>,
    ready_tx: watch::Sender<bool>,
    fatal_tx: watch::Sender<Option<String>>,
    request_timeout: std::time::Duration,
) {
    let mut sweep = interval(request_timeout.min(std::time::Duration::from_secs(1)));

    loop {
        tokio::select! {
            event = link_events.recv() => match event {
                Some(LinkEvent::Connected) => {}
                Some(LinkEvent::Disconnected(reason)) => {
                    let _ = ready_tx.send(false);
                    let orphaned = pool.drain();
                    if !orphaned.is_empty() {
                        warn!(count = orphaned.len(), %reason,
                              "cache link lost, failing parked requests");
                    }
                    for (_, ticket) in orphaned {
                        ticket.fail("cache service disconnected");
                    }
                }
                Some(LinkEvent::Fatal(message)) => {
                    error!(%message, "cache link is gone for good");
                    for (_, ticket) in pool.shutdown() {
                        ticket.fail("cache service unreachable");
                    }
                    let _ = fatal_tx.send(Some(message));
                    return;
                }
                None => return,
            },
            event = control.recv() => match event {
                Some(ControlEvent::Ready) => {
                    let _ = ready_tx.send(true);
                }
                Some(ControlEvent::Refused(message)) => {
                    error!(%message, "cache service refused this login service");
                    let _ = fatal_tx.send(Some(message));
                    return;
                }
                None => return,
            },
            _ = sweep.tick() => {
                for (request_id, ticket) in pool.expire_older_than(request_timeout) {
                    warn!(request_id, "request timed out waiting for the cache service");
                    ticket.fail("request timed out");
                }
            }
        }
    }
}
