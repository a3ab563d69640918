//! Client-facing login flows over the cache link.
//!
//! Every flow parks a [`ClientTicket`] in the correlation pool, sends the
//! request to the cache service, and resolves when the matching response
//! (or a timeout, or a link failure) un-parks it. No task blocks while a
//! ticket waits: the caller awaits a oneshot the handler completes later.
//! Whatever happens on the backend, the caller always receives a definite
//! [`ClientReply`], never a hang.

use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::sync::oneshot;
use tracing::warn;
use uuid::Uuid;

use inner_net::messages::user_data::{
    AuthenticationResult, JoinWorldRequest, JoinWorldResult, UnCacheUser,
    UserAuthenticationRequest, WorldsListRequest,
};
use inner_net::{LinkSender, RequestPool, UserSession, WorldSummary};

/// Definite outcome delivered to the client-facing side for every flow.
#[derive(Debug)]
pub enum ClientReply {
    /// Authentication and session caching both succeeded.
    LoginOk(UserSession),
    /// Authentication failed with the given reason.
    LoginFailed(AuthenticationResult),
    /// Snapshot of the known worlds plus the user's last world.
    WorldsList {
        last_world: u8,
        worlds: Vec<WorldSummary>,
    },
    /// The join-world request was accepted.
    PlayOk(UserSession),
    /// The join-world request was refused.
    PlayFailed(JoinWorldResult),
}

/// Which step of a flow a parked ticket is waiting on. Selects the failure
/// shape when the ticket must be failed without a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowStage {
    Authenticating,
    CachingSession,
    ListingWorlds,
    JoiningWorld,
}

/// A parked client continuation: the session being negotiated plus the
/// oneshot that resumes the waiting caller.
pub struct ClientTicket {
    pub session: UserSession,
    pub stage: FlowStage,
    pub reply: oneshot::Sender<ClientReply>,
}

impl ClientTicket {
    /// Resolves the ticket with the stage-appropriate failure. Used for
    /// timeouts, link loss and pool refusal.
    pub fn fail(self, why: &str) {
        warn!(stage = ?self.stage, session_id = self.session.id, why, "failing parked request");
        let reply = match self.stage {
            FlowStage::JoiningWorld => ClientReply::PlayFailed(JoinWorldResult::SystemError),
            _ => ClientReply::LoginFailed(AuthenticationResult::SystemError),
        };
        let _ = self.reply.send(reply);
    }
}

/// Builds fresh sessions for incoming clients: sequential ids plus random
/// scramble keys and cipher material.
pub struct SessionFactory {
    next_id: AtomicI32,
}

impl SessionFactory {
    pub fn new() -> Self {
        Self {
            next_id: AtomicI32::new(1),
        }
    }

    pub fn create(&self, account_name: &str, ip_address: &str) -> UserSession {
        let keys = Uuid::new_v4().into_bytes();
        let start_time = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0);
        UserSession {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            account_name: account_name.to_string(),
            account_id: -1,
            login1: i32::from_le_bytes([keys[0], keys[1], keys[2], keys[3]]),
            login2: i32::from_le_bytes([keys[4], keys[5], keys[6], keys[7]]),
            play1: i32::from_le_bytes([keys[8], keys[9], keys[10], keys[11]]),
            play2: i32::from_le_bytes([keys[12], keys[13], keys[14], keys[15]]),
            start_time,
            last_world: 0,
            ip_address: ip_address.to_string(),
            blowfish_key: Uuid::new_v4().into_bytes().to_vec(),
        }
    }
}

impl Default for SessionFactory {
    fn default() -> Self {
        Self::new()
    }
}

/// The login service's cross-service flows, shared with the client-facing
/// front end.
pub struct LoginFlows {
    sender: LinkSender,
    pool: Arc<RequestPool<ClientTicket>>,
    sessions: SessionFactory,
}

impl LoginFlows {
    pub fn new(sender: LinkSender, pool: Arc<RequestPool<ClientTicket>>) -> Self {
        Self {
            sender,
            pool,
            sessions: SessionFactory::new(),
        }
    }

    /// Runs the authenticate → cache-session sequence for one client and
    /// resolves with either `LoginOk` or a definite failure.
    pub async fn authenticate(
        &self,
        login: &str,
        password: &str,
        client_ip: &str,
    ) -> ClientReply {
        let session = self.sessions.create(login, client_ip);
        let session_id = session.id;
        let (ticket, rx) = Self::park(session, FlowStage::Authenticating);

        let Some(request_id) = self.pool.enqueue(ticket) else {
            return ClientReply::LoginFailed(AuthenticationResult::SystemError);
        };
        let request = UserAuthenticationRequest {
            request_id,
            login: login.to_string(),
            password: password.to_string(),
            session_id,
        };
        self.dispatch(request_id, request.to_packet(), rx).await
    }

    /// Fetches the world list snapshot for an already logged-in session.
    pub async fn worlds_list(&self, session: &UserSession) -> ClientReply {
        let (ticket, rx) = Self::park(session.clone(), FlowStage::ListingWorlds);
        let Some(request_id) = self.pool.enqueue(ticket) else {
            return ClientReply::LoginFailed(AuthenticationResult::SystemError);
        };
        self.dispatch(request_id, WorldsListRequest { request_id }.to_packet(), rx)
            .await
    }

    /// Asks the cache service to admit the session into a world.
    pub async fn join_world(&self, session: &UserSession, world_id: u8) -> ClientReply {
        let session_id = session.id;
        let (ticket, rx) = Self::park(session.clone(), FlowStage::JoiningWorld);
        let Some(request_id) = self.pool.enqueue(ticket) else {
            return ClientReply::PlayFailed(JoinWorldResult::SystemError);
        };
        let request = JoinWorldRequest {
            request_id,
            session_id,
            world_id,
        };
        self.dispatch(request_id, request.to_packet(), rx).await
    }

    /// Fire-and-forget: tells the cache service to drop the session.
    pub fn logout(&self, session_id: i32) {
        if let Err(e) = self.sender.send(UnCacheUser { session_id }.to_packet()) {
            warn!(session_id, error = %e, "failed to send un-cache request");
        }
    }

    fn park(
        session: UserSession,
        stage: FlowStage,
    ) -> (ClientTicket, oneshot::Receiver<ClientReply>) {
        let (tx, rx) = oneshot::channel();
        (
            ClientTicket {
                session,
                stage,
                reply: tx,
            },
            rx,
        )
    }

    /// Sends the request and waits for the handler (or the sweep) to
    /// resolve the parked ticket.
    async fn dispatch(
        &self,
        request_id: i64,
        packet: inner_net::Packet,
        rx: oneshot::Receiver<ClientReply>,
    ) -> ClientReply {
        if let Err(e) = self.sender.send(packet) {
            warn!(request_id, error = %e, "failed to send request to cache service");
            if let Some(ticket) = self.pool.dequeue(request_id) {
                ticket.fail("cache link is down");
            }
        }
        match rx.await {
            Ok(reply) => reply,
            // The sender side vanished without resolving; treat as failure.
            Err(_) => ClientReply::LoginFailed(AuthenticationResult::SystemError),
        }
    }
}
