//! Full-duplex inner-network connection over one TCP socket.
//!
//! Each connection owns exactly one socket. A receive loop reads the
//! two-byte length header, then exactly that many body bytes (partial
//! reads accumulate across socket reads), and hands each assembled
//! [`Packet`] to the pluggable [`PacketHandler`] in strict arrival order.
//! Sends go through an unbounded queue drained by a separate writer task,
//! so the receive loop never blocks on a send.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::OwnedReadHalf;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Notify};
use tracing::{trace, warn};
use uuid::Uuid;

use crate::error::NetError;
use crate::packet::{Packet, LENGTH_PREFIX_SIZE};

/// Why a connection stopped. Owners react differently: the registry only
/// logs and unregisters, while an outbound link may schedule a reconnect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
    /// The remote side closed the stream cleanly.
    RemoteClosed,
    /// The remote side dropped the connection abruptly (reset).
    RemoteReset,
    /// This side closed the connection explicitly.
    LocalClosed,
    /// Framing or handling failed; the stream can no longer be trusted.
    Corrupted(String),
    /// Some other socket error.
    Io(String),
}

impl std::fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RemoteClosed => f.write_str("remote closed the connection"),
            Self::RemoteReset => f.write_str("connection reset by remote"),
            Self::LocalClosed => f.write_str("closed locally"),
            Self::Corrupted(e) => write!(f, "stream corrupted: {e}"),
            Self::Io(e) => write!(f, "socket error: {e}"),
        }
    }
}

fn classify_read_error(err: std::io::Error) -> DisconnectReason {
    match err.kind() {
        std::io::ErrorKind::UnexpectedEof => DisconnectReason::RemoteClosed,
        std::io::ErrorKind::ConnectionReset | std::io::ErrorKind::ConnectionAborted => {
            DisconnectReason::RemoteReset
        }
        _ => DisconnectReason::Io(err.to_string()),
    }
}

/// Receives every decoded packet from one connection, in arrival order.
///
/// Implementations are injected at connection start; a returned error
/// marks the stream as corrupted and closes the connection.
#[async_trait]
pub trait PacketHandler: Send + Sync {
    async fn handle_packet(&self, packet: Packet) -> Result<(), NetError>;
}

/// Cloneable sending side of a connection.
///
/// A send on a disconnected connection fails with
/// [`NetError::NotConnected`]; the connection itself never retries.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    id: Uuid,
    peer: SocketAddr,
    connected: Arc<AtomicBool>,
    closed: Arc<Notify>,
    tx: mpsc::UnboundedSender<Vec<u8>>,
}

impl ConnectionHandle {
    /// Connection id assigned at accept/dial time, before any identity is
    /// negotiated. Used to tag log lines and registry entries.
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// Queues a packet for transmission without blocking the caller.
    pub fn send(&self, packet: Packet) -> Result<(), NetError> {
        if !self.is_connected() {
            return Err(NetError::NotConnected);
        }
        let frame = packet.into_frame()?;
        self.tx.send(frame).map_err(|_| NetError::NotConnected)
    }

    /// Requests a local close; the receive loop exits with
    /// [`DisconnectReason::LocalClosed`].
    pub fn close(&self) {
        self.connected.store(false, Ordering::Release);
        self.closed.notify_one();
    }
}

/// One live socket plus its writer task. Created by the listener (inbound)
/// or by a service link (outbound), then driven with [`Connection::run`].
pub struct Connection {
    handle: ConnectionHandle,
    read_half: OwnedReadHalf,
    writer: tokio::task::JoinHandle<()>,
}

impl Connection {
    pub fn new(stream: TcpStream) -> std::io::Result<Self> {
        let peer = stream.peer_addr()?;
        let (read_half, mut write_half) = stream.into_split();
        let (tx, mut rx) = mpsc::unbounded_channel::<Vec<u8>>();

        let writer = tokio::spawn(async move {
            while let Some(frame) = rx.recv().await {
                if write_half.write_all(&frame).await.is_err() {
                    break;
                }
            }
            let _ = write_half.shutdown().await;
        });

        Ok(Self {
            handle: ConnectionHandle {
                id: Uuid::new_v4(),
                peer,
                connected: Arc::new(AtomicBool::new(true)),
                closed: Arc::new(Notify::new()),
                tx,
            },
            read_half,
            writer,
        })
    }

    pub fn handle(&self) -> ConnectionHandle {
        self.handle.clone()
    }

    /// Reads exactly one frame and decodes it. Used by the acceptor to pull
    /// the identity handshake before the regular receive loop starts.
    pub async fn read_packet(&mut self) -> Result<Packet, DisconnectReason> {
        read_frame(&mut self.read_half).await
    }

    /// Drives the receive loop until disconnect, dispatching every packet
    /// to `handler`. Consumes the connection; clones of the handle keep
    /// working until the socket is gone.
    pub async fn run<H: PacketHandler + ?Sized>(mut self, handler: &H) -> DisconnectReason {
        let reason = tokio::select! {
            _ = self.handle.closed.notified() => DisconnectReason::LocalClosed,
            reason = receive_loop(&mut self.read_half, handler, &self.handle) => reason,
        };
        self.handle.connected.store(false, Ordering::Release);
        // Drops the write half, closing the socket; frames still queued at
        // disconnect time are discarded.
        self.writer.abort();
        reason
    }
}

async fn read_frame(read_half: &mut OwnedReadHalf) -> Result<Packet, DisconnectReason> {
    let mut len_buf = [0u8; LENGTH_PREFIX_SIZE];
    read_half
        .read_exact(&mut len_buf)
        .await
        .map_err(classify_read_error)?;

    let len = u16::from_le_bytes(len_buf) as usize;
    let mut body = vec![0u8; len];
    read_half
        .read_exact(&mut body)
        .await
        .map_err(classify_read_error)?;

    Packet::from_frame_body(body).map_err(|e| DisconnectReason::Corrupted(e.to_string()))
}

async fn receive_loop<H: PacketHandler + ?Sized>(
    read_half: &mut OwnedReadHalf,
    handler: &H,
    handle: &ConnectionHandle,
) -> DisconnectReason {
    loop {
        let packet = match read_frame(read_half).await {
            Ok(packet) => packet,
            Err(DisconnectReason::Corrupted(e)) => {
                warn!(
                    connection = %handle.id(),
                    peer = %handle.peer(),
                    error = %e,
                    "malformed frame, dropping connection"
                );
                return DisconnectReason::Corrupted(e);
            }
            Err(reason) => return reason,
        };

        trace!(
            connection = %handle.id(),
            first = packet.first_opcode(),
            second = packet.second_opcode(),
            len = packet.len(),
            "packet received"
        );

        if let Err(e) = handler.handle_packet(packet).await {
            warn!(
                connection = %handle.id(),
                peer = %handle.peer(),
                error = %e,
                "packet handling failed, dropping connection"
            );
            return DisconnectReason::Corrupted(e.to_string());
        }
    }
}
