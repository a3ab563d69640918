//! Inbound connection acceptance and the live-service registry.
//!
//! The acceptor reads the identity handshake synchronously before anything
//! is registered. Unrecognized service kinds are closed without a response;
//! a duplicate service id gets an explicit rejection, and the existing
//! connection stays untouched. At most one live connection exists per
//! remote service id.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio::time::timeout;
use tracing::{info, warn};
use uuid::Uuid;

use crate::connection::{Connection, ConnectionHandle, DisconnectReason, PacketHandler};
use crate::messages::service_layer::{InitializeRequest, InitializeResponse, SetSettingsResponse};
use crate::service::{ServiceIdentity, ServiceKind, ServiceSettings};

/// A connection that passed the identity handshake.
pub struct RegisteredService {
    pub identity: ServiceIdentity,
    pub handle: ConnectionHandle,
    /// Settings blob pushed by the remote after the handshake, if any.
    pub settings: Option<ServiceSettings>,
}

/// Registry of live inner-network connections, keyed by remote service id.
pub struct ServiceRegistry {
    local: ServiceIdentity,
    connections: DashMap<u8, RegisteredService>,
}

impl ServiceRegistry {
    pub fn new(local: ServiceIdentity) -> Self {
        Self {
            local,
            connections: DashMap::new(),
        }
    }

    /// Identity this registry answers handshakes with.
    pub fn local_identity(&self) -> ServiceIdentity {
        self.local
    }

    /// Registers a freshly identified connection. Fails when the service id
    /// is already taken; the atomic entry check is what keeps a second
    /// claimant from replacing the first.
    fn try_register(&self, identity: ServiceIdentity, handle: ConnectionHandle) -> bool {
        match self.connections.entry(identity.id) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(RegisteredService {
                    identity,
                    handle,
                    settings: None,
                });
                true
            }
        }
    }

    /// Removes the entry for `service_id`, but only if it still belongs to
    /// the given connection.
    fn remove_connection(&self, service_id: u8, connection_id: Uuid) {
        self.connections
            .remove_if(&service_id, |_, reg| reg.handle.id() == connection_id);
    }

    /// Attaches a settings blob to the live connection it names and answers
    /// with an acceptance. A settings push for a service id that is not
    /// currently registered is a silent no-op.
    pub fn set_service_settings(&self, settings: ServiceSettings) {
        if let Some(mut reg) = self.connections.get_mut(&settings.service_id()) {
            let response = SetSettingsResponse { accepted: true };
            if let Err(e) = reg.handle.send(response.to_packet()) {
                warn!(identity = %reg.identity, error = %e,
                      "failed to acknowledge settings update");
                return;
            }
            reg.settings = Some(settings);
            info!(identity = %reg.identity, "settings update done");
        }
    }

    /// Snapshot of the settings currently bound to `service_id`.
    pub fn settings(&self, service_id: u8) -> Option<ServiceSettings> {
        self.connections
            .get(&service_id)
            .and_then(|reg| reg.settings.clone())
    }

    pub fn contains(&self, service_id: u8) -> bool {
        self.connections.contains_key(&service_id)
    }

    /// Sending handle for a registered service, if it is live.
    pub fn handle(&self, service_id: u8) -> Option<ConnectionHandle> {
        self.connections.get(&service_id).map(|reg| reg.handle.clone())
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Closes every live connection; used during shutdown.
    pub fn close_all(&self) {
        for reg in self.connections.iter() {
            reg.handle.close();
        }
    }
}

/// Builds the packet handler for a newly identified connection, chosen by
/// the remote's service kind. Returning `None` rejects the connection.
pub trait ServiceHandlerFactory: Send + Sync {
    fn build(
        &self,
        identity: ServiceIdentity,
        handle: ConnectionHandle,
    ) -> Option<Arc<dyn PacketHandler>>;
}

/// TCP listener for inner-network connections.
pub struct InnerNetworkListener {
    listener: TcpListener,
    handshake_timeout: Duration,
}

impl InnerNetworkListener {
    /// Binds with reuse-address and an explicit backlog, then hands the
    /// socket to tokio.
    pub async fn bind(addr: SocketAddr, backlog: i32) -> std::io::Result<Self> {
        let domain = Domain::for_address(addr);
        let socket = Socket::new(domain, Type::STREAM, Some(Protocol::TCP))?;
        socket.set_reuse_address(true)?;
        socket.bind(&addr.into())?;
        socket.listen(backlog)?;

        let std_listener: std::net::TcpListener = socket.into();
        std_listener.set_nonblocking(true)?;
        Ok(Self {
            listener: TcpListener::from_std(std_listener)?,
            handshake_timeout: Duration::from_secs(5),
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accepts connections until the shutdown signal fires. Each accepted
    /// socket is served on its own task.
    pub async fn run(
        self,
        registry: Arc<ServiceRegistry>,
        factory: Arc<dyn ServiceHandlerFactory>,
        mut shutdown: broadcast::Receiver<()>,
    ) {
        loop {
            tokio::select! {
                accepted = self.listener.accept() => {
                    match accepted {
                        Ok((stream, addr)) => {
                            let registry = registry.clone();
                            let factory = factory.clone();
                            let handshake_timeout = self.handshake_timeout;
                            tokio::spawn(async move {
                                serve_inbound(stream, addr, registry, factory, handshake_timeout)
                                    .await;
                            });
                        }
                        Err(e) => {
                            warn!(error = %e, "failed to accept connection");
                        }
                    }
                }
                _ = shutdown.recv() => {
                    info!("listener stopping");
                    registry.close_all();
                    return;
                }
            }
        }
    }
}

async fn serve_inbound(
    stream: TcpStream,
    addr: SocketAddr,
    registry: Arc<ServiceRegistry>,
    factory: Arc<dyn ServiceHandlerFactory>,
    handshake_timeout: Duration,
) {
    let mut conn = match Connection::new(stream) {
        Ok(conn) => conn,
        Err(e) => {
            warn!(peer = %addr, error = %e, "connection setup failed");
            return;
        }
    };

    // Identity handshake comes first, before any registration.
    let mut packet = match timeout(handshake_timeout, conn.read_packet()).await {
        Ok(Ok(packet)) => packet,
        Ok(Err(reason)) => {
            warn!(peer = %addr, %reason, "connection lost during handshake");
            return;
        }
        Err(_) => {
            warn!(peer = %addr, "handshake timed out");
            return;
        }
    };

    if [packet.first_opcode(), packet.second_opcode()] != InitializeRequest::OPCODES {
        warn!(peer = %addr, "expected identity handshake, got another packet");
        return;
    }
    let request = match InitializeRequest::from_packet(&mut packet) {
        Ok(request) => request,
        Err(e) => {
            warn!(peer = %addr, error = %e, "malformed identity handshake");
            return;
        }
    };

    // Unrecognized services are closed without a response.
    if request.identity.kind == ServiceKind::Undefined {
        warn!(peer = %addr, "connection rejected, service was not recognized");
        return;
    }

    let handle = conn.handle();
    if !registry.try_register(request.identity, handle.clone()) {
        warn!(identity = %request.identity, peer = %addr,
              "already connected, skipping connection request");
        let rejection = InitializeResponse {
            accepted: false,
            remote: registry.local_identity(),
        };
        let _ = handle.send(rejection.to_packet());
        return;
    }

    let handler = match factory.build(request.identity, handle.clone()) {
        Some(handler) => handler,
        None => {
            warn!(identity = %request.identity, peer = %addr,
                  "no handler for this service kind, rejecting");
            registry.remove_connection(request.identity.id, handle.id());
            return;
        }
    };

    let acceptance = InitializeResponse {
        accepted: true,
        remote: registry.local_identity(),
    };
    if let Err(e) = handle.send(acceptance.to_packet()) {
        warn!(identity = %request.identity, error = %e, "failed to accept handshake");
        registry.remove_connection(request.identity.id, handle.id());
        return;
    }

    info!(identity = %request.identity, peer = %addr, "connection accepted");

    let connection_id = handle.id();
    let reason = conn.run(handler.as_ref()).await;
    match reason {
        DisconnectReason::RemoteClosed | DisconnectReason::RemoteReset => {
            info!(identity = %request.identity, "remote closed the connection itself");
        }
        reason => {
            info!(identity = %request.identity, %reason, "connection closed");
        }
    }
    registry.remove_connection(request.identity.id, connection_id);
}
