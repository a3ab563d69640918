//! Packet handlers for each kind of connected service.
//!
//! The listener binds one handler per accepted connection, chosen by the
//! remote's service kind; each handler independently implements the higher
//! protocol layers for its peer.

pub mod game;
pub mod login;
pub mod npc;

use std::sync::Arc;

use inner_net::{
    ConnectionHandle, PacketHandler, ServiceHandlerFactory, ServiceIdentity, ServiceKind,
    ServiceRegistry,
};
use tracing::debug;

use crate::database::{AuditEvent, Database};
use crate::registry::{SessionRegistry, WorldRegistry};

/// Builds the cache-side handler for a freshly identified connection.
pub struct CacheHandlerFactory {
    pub registry: Arc<ServiceRegistry>,
    pub sessions: Arc<SessionRegistry>,
    pub worlds: Arc<WorldRegistry>,
    pub database: Arc<dyn Database>,
}

impl ServiceHandlerFactory for CacheHandlerFactory {
    fn build(
        &self,
        identity: ServiceIdentity,
        handle: ConnectionHandle,
    ) -> Option<Arc<dyn PacketHandler>> {
        let handler: Arc<dyn PacketHandler> = match identity.kind {
            ServiceKind::LoginService => Arc::new(login::LoginServiceHandler {
                handle,
                identity,
                registry: self.registry.clone(),
                sessions: self.sessions.clone(),
                worlds: self.worlds.clone(),
                database: self.database.clone(),
            }),
            ServiceKind::GameService => Arc::new(game::GameServiceHandler {
                handle,
                identity,
                registry: self.registry.clone(),
                worlds: self.worlds.clone(),
            }),
            ServiceKind::NpcService => Arc::new(npc::NpcServiceHandler { identity }),
            _ => return None,
        };

        let database = self.database.clone();
        tokio::spawn(async move {
            database
                .service_audit(identity.id, identity.kind, AuditEvent::ServiceConnected)
                .await;
        });
        debug!(%identity, "handler bound");

        Some(handler)
    }
}
