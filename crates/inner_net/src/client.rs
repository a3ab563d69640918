//! Outbound reconnecting connection to a remote service.
//!
//! Wraps a [`Connection`] with a dial/retry loop. Identity is re-negotiated
//! after every reconnect: a fresh `InitializeRequest` goes out on each new
//! socket, and nothing is resumed across TCP reconnects. The configured
//! interval is a floor between attempts so a dead remote is never
//! hot-looped.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::sync::{mpsc, Notify};
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::connection::{Connection, ConnectionHandle, DisconnectReason, PacketHandler};
use crate::error::NetError;
use crate::messages::service_layer::InitializeRequest;
use crate::packet::Packet;
use crate::service::ServiceIdentity;

/// How an outbound link dials and identifies itself.
#[derive(Debug, Clone)]
pub struct LinkConfig {
    /// Remote service endpoint.
    pub remote: SocketAddr,
    /// Identity announced in the handshake after every (re)connect.
    pub identity: ServiceIdentity,
    /// Floor between reconnect attempts.
    pub reconnect_interval: Duration,
    /// When false, a lost connection is fatal for the owning service
    /// instead of triggering redials.
    pub auto_reconnect: bool,
}

/// Lifecycle notifications surfaced to the owning service.
#[derive(Debug)]
pub enum LinkEvent {
    /// Socket is up and the identity handshake has been sent.
    Connected,
    /// The connection dropped; a redial follows if auto-reconnect is on.
    Disconnected(DisconnectReason),
    /// The link gave up (auto-reconnect off). The owner should terminate.
    Fatal(String),
}

struct LinkShared {
    current: Mutex<Option<ConnectionHandle>>,
    stopping: AtomicBool,
    shutdown: Notify,
}

/// Cloneable sending side of a [`ServiceLink`]. Sends fail with
/// [`NetError::NotConnected`] while the link is down; retrying is the
/// caller's decision, not the link's.
#[derive(Clone)]
pub struct LinkSender {
    shared: Arc<LinkShared>,
}

impl LinkSender {
    pub fn send(&self, packet: Packet) -> Result<(), NetError> {
        let current = self
            .shared
            .current
            .lock()
            .expect("link handle lock poisoned");
        match current.as_ref() {
            Some(handle) => handle.send(packet),
            None => Err(NetError::NotConnected),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.shared
            .current
            .lock()
            .expect("link handle lock poisoned")
            .as_ref()
            .is_some_and(ConnectionHandle::is_connected)
    }
}

/// Running link task. Dropping the handle does not stop the link; call
/// [`LinkHandle::shutdown`] for that.
pub struct LinkHandle {
    shared: Arc<LinkShared>,
    task: tokio::task::JoinHandle<()>,
}

impl LinkHandle {
    /// Stops redialing and closes the live connection, if any.
    pub fn shutdown(&self) {
        self.shared.stopping.store(true, Ordering::Release);
        self.shared.shutdown.notify_one();
        let current = self
            .shared
            .current
            .lock()
            .expect("link handle lock poisoned");
        if let Some(handle) = current.as_ref() {
            handle.close();
        }
    }

    pub async fn join(self) {
        let _ = self.task.await;
    }
}

/// Outbound reconnecting connection used by the login/game/npc services to
/// reach the cache service.
pub struct ServiceLink {
    config: LinkConfig,
    shared: Arc<LinkShared>,
    events_tx: mpsc::UnboundedSender<LinkEvent>,
}

impl ServiceLink {
    /// Builds the link plus its sender and event stream. The sender can be
    /// handed to a packet handler before the link is spawned, which breaks
    /// the handler ↔ link construction cycle.
    pub fn new(config: LinkConfig) -> (Self, LinkSender, mpsc::UnboundedReceiver<LinkEvent>) {
        let shared = Arc::new(LinkShared {
            current: Mutex::new(None),
            stopping: AtomicBool::new(false),
            shutdown: Notify::new(),
        });
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let sender = LinkSender {
            shared: shared.clone(),
        };
        (
            Self {
                config,
                shared,
                events_tx,
            },
            sender,
            events_rx,
        )
    }

    /// Starts the dial/receive/redial loop on its own task.
    pub fn spawn(self, handler: Arc<dyn PacketHandler>) -> LinkHandle {
        let shared = self.shared.clone();
        let task = tokio::spawn(self.run(handler));
        LinkHandle { shared, task }
    }

    async fn run(self, handler: Arc<dyn PacketHandler>) {
        let config = self.config;
        let shared = self.shared;
        let events = self.events_tx;

        loop {
            if shared.stopping.load(Ordering::Acquire) {
                return;
            }

            match TcpStream::connect(config.remote).await {
                Ok(stream) => match Connection::new(stream) {
                    Ok(conn) => {
                        let handle = conn.handle();
                        *shared.current.lock().expect("link handle lock poisoned") =
                            Some(handle.clone());

                        info!(remote = %config.remote, identity = %config.identity,
                              "connected, identifying");
                        let hello = InitializeRequest {
                            identity: config.identity,
                        };
                        match handle.send(hello.to_packet()) {
                            Ok(()) => {
                                let _ = events.send(LinkEvent::Connected);
                                let reason = conn.run(handler.as_ref()).await;
                                info!(remote = %config.remote, %reason, "link down");
                                let _ = events.send(LinkEvent::Disconnected(reason));
                            }
                            Err(e) => {
                                warn!(remote = %config.remote, error = %e,
                                      "failed to send identity handshake");
                            }
                        }
                        *shared.current.lock().expect("link handle lock poisoned") = None;
                    }
                    Err(e) => {
                        warn!(remote = %config.remote, error = %e, "connection setup failed");
                    }
                },
                Err(e) => {
                    debug!(remote = %config.remote, error = %e, "dial failed");
                }
            }

            if shared.stopping.load(Ordering::Acquire) {
                return;
            }
            if !config.auto_reconnect {
                let _ = events.send(LinkEvent::Fatal(format!(
                    "connection to {} lost and auto-reconnect is disabled",
                    config.remote
                )));
                return;
            }

            tokio::select! {
                _ = sleep(config.reconnect_interval) => {}
                _ = shared.shutdown.notified() => return,
            }
        }
    }
}
