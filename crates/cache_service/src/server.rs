//! Core cache server implementation.
//!
//! `CacheServer` wires the inner-network listener to the realtime
//! registries and the database collaborator. It is an explicitly
//! constructed object: no global state, so tests can run several
//! instances in one process.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use tokio::sync::broadcast;
use tracing::info;

use inner_net::{InnerNetworkListener, ServiceIdentity, ServiceKind, ServiceRegistry};

use crate::config::CacheConfig;
use crate::database::{AuditEvent, Database};
use crate::error::ServiceError;
use crate::handlers::CacheHandlerFactory;
use crate::registry::{SessionRegistry, WorldRegistry};

/// The cache service: accepts login/game/npc connections and owns the
/// session and world tables they operate on.
pub struct CacheServer {
    config: CacheConfig,
    identity: ServiceIdentity,
    database: Arc<dyn Database>,
    sessions: Arc<SessionRegistry>,
    worlds: Arc<WorldRegistry>,
    registry: Arc<ServiceRegistry>,
    shutdown_sender: broadcast::Sender<()>,
    local_addr: Mutex<Option<SocketAddr>>,
}

impl CacheServer {
    pub fn new(config: CacheConfig, database: Arc<dyn Database>) -> Self {
        let identity = ServiceIdentity::new(ServiceKind::CacheService, config.service.service_id);
        let (shutdown_sender, _) = broadcast::channel(1);
        Self {
            config,
            identity,
            database,
            sessions: Arc::new(SessionRegistry::new()),
            worlds: Arc::new(WorldRegistry::new()),
            registry: Arc::new(ServiceRegistry::new(identity)),
            shutdown_sender,
            local_addr: Mutex::new(None),
        }
    }

    /// Starts the server and runs until shutdown is requested.
    ///
    /// Startup sequence: audit the start, bulk-load the worlds table, bind
    /// the inner-network listener, then accept connections until the
    /// shutdown signal fires.
    pub async fn start(&self) -> Result<(), ServiceError> {
        info!(identity = %self.identity, "🚀 starting cache service on {}",
              self.config.service.bind_address);

        self.database
            .service_audit(self.identity.id, self.identity.kind, AuditEvent::ServiceStarted)
            .await;

        self.worlds.cache(self.database.as_ref()).await;

        let bind_address: SocketAddr = self
            .config
            .service
            .bind_address
            .parse()
            .map_err(|_| {
                ServiceError::Config(format!(
                    "invalid bind address: {}",
                    self.config.service.bind_address
                ))
            })?;

        let listener = InnerNetworkListener::bind(bind_address, self.config.service.backlog)
            .await
            .map_err(|e| ServiceError::Network(format!("bind failed: {e}")))?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| ServiceError::Network(format!("listener has no local address: {e}")))?;
        *self
            .local_addr
            .lock()
            .expect("local address lock poisoned") = Some(local_addr);
        info!("✅ listener bound on {local_addr}");

        let factory = Arc::new(CacheHandlerFactory {
            registry: self.registry.clone(),
            sessions: self.sessions.clone(),
            worlds: self.worlds.clone(),
            database: self.database.clone(),
        });

        listener
            .run(
                self.registry.clone(),
                factory,
                self.shutdown_sender.subscribe(),
            )
            .await;

        self.database
            .service_audit(self.identity.id, self.identity.kind, AuditEvent::ServiceStopped)
            .await;
        info!("cache service stopped");
        Ok(())
    }

    /// Signals the accept loop to stop and closes live connections.
    pub fn shutdown(&self) {
        info!("🛑 shutting down cache service...");
        let _ = self.shutdown_sender.send(());
    }

    /// Address the listener actually bound to; `None` until
    /// [`CacheServer::start`] has bound it. With a zero port in the
    /// configuration this is how tests learn the real endpoint.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        *self
            .local_addr
            .lock()
            .expect("local address lock poisoned")
    }

    pub fn sessions(&self) -> Arc<SessionRegistry> {
        self.sessions.clone()
    }

    pub fn worlds(&self) -> Arc<WorldRegistry> {
        self.worlds.clone()
    }

    pub fn connections(&self) -> Arc<ServiceRegistry> {
        self.registry.clone()
    }
}
