//! # Inner Network - Service Interconnect Library
//!
//! The private binary protocol that connects the backend services (login,
//! cache, game, npc) to each other, distinct from any client-facing
//! protocol. The library provides the transport, framing, identity and
//! correlation layers that every service builds on:
//!
//! * **Packet codec** - length-prefixed frames with positional fields
//!   ([`packet`])
//! * **Identity handshake** - who is talking to whom, accept/reject
//!   semantics ([`messages::service_layer`])
//! * **Connection abstraction** - async receive loop, queued sends,
//!   disconnect classification ([`connection`])
//! * **Outbound link** - dial/retry with mandatory re-identification
//!   ([`client`])
//! * **Inbound registry** - accept, type-dispatch, duplicate rejection
//!   ([`listener`])
//! * **Correlation pool** - request ids matched to parked callers
//!   ([`pool`])
//!
//! ## Message Flow
//!
//! 1. A service dials (or accepts) a connection and exchanges the identity
//!    handshake.
//! 2. Decoded packets are dispatched, in arrival order, to the
//!    [`connection::PacketHandler`] bound at connection start.
//! 3. A cross-service call parks its continuation in a
//!    [`pool::RequestPool`] under a fresh request id and sends the request.
//! 4. The matching response correlates back through the pool and resumes
//!    the caller; unmatched responses are logged and discarded.
//!
//! Ordering holds within a connection only; across connections the sole
//! correlation mechanism is the request id.

pub mod client;
pub mod connection;
pub mod error;
pub mod listener;
pub mod messages;
pub mod packet;
pub mod pool;
pub mod service;
pub mod types;

pub use client::{LinkConfig, LinkEvent, LinkHandle, LinkSender, ServiceLink};
pub use connection::{Connection, ConnectionHandle, DisconnectReason, PacketHandler};
pub use error::{NetError, PacketError};
pub use listener::{InnerNetworkListener, ServiceHandlerFactory, ServiceRegistry};
pub use packet::Packet;
pub use pool::RequestPool;
pub use service::{
    GameServiceSettings, LoginServiceSettings, ServiceIdentity, ServiceKind, ServiceSettings,
};
pub use types::{UserSession, WorldSummary};
