//! Handler for packets arriving from the cache service.
//!
//! Responses are matched to parked [`ClientTicket`]s through the
//! correlation pool; a response for an unknown request id is logged and
//! discarded, never dereferenced.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{info, warn};

use inner_net::messages::layer;
use inner_net::messages::service_layer::{
    self, InitializeResponse, SetSettingsRequest, SetSettingsResponse,
};
use inner_net::messages::user_data::{
    self, AuthenticationResult, CacheUserSessionRequest, CacheUserSessionResponse,
    JoinWorldResponse, JoinWorldResult, UserAuthenticationResponse, WorldsListResponse,
};
use inner_net::{
    LinkSender, LoginServiceSettings, NetError, Packet, PacketHandler, RequestPool,
    ServiceSettings,
};

use crate::flow::{ClientReply, ClientTicket, FlowStage};

/// Handshake-adjacent notifications the service supervisor reacts to.
#[derive(Debug)]
pub enum ControlEvent {
    /// The cache service accepted our settings; flows may run.
    Ready,
    /// The cache service refused us; the service cannot operate.
    Refused(String),
}

pub struct CacheLinkHandler {
    pub sender: LinkSender,
    pub pool: Arc<RequestPool<ClientTicket>>,
    /// Settings pushed right after the identity handshake is accepted.
    pub settings: LoginServiceSettings,
    /// Minimum access level allowed through this login service.
    pub allowed_access_level: u8,
    pub control: mpsc::UnboundedSender<ControlEvent>,
}

impl CacheLinkHandler {
    fn resolve(&self, ticket: ClientTicket, reply: ClientReply) {
        let _ = ticket.reply.send(reply);
    }

    fn on_initialize_response(&self, response: InitializeResponse) {
        if response.accepted {
            info!(remote = %response.remote, "authorized on remote service");
            let request = SetSettingsRequest {
                settings: ServiceSettings::Login(self.settings.clone()),
            };
            if let Err(e) = self.sender.send(request.to_packet()) {
                warn!(error = %e, "failed to push settings after handshake");
            }
        } else {
            warn!(remote = %response.remote, "connection rejected by remote service");
            let _ = self
                .control
                .send(ControlEvent::Refused("handshake rejected".to_string()));
        }
    }

    fn on_settings_response(&self, response: SetSettingsResponse) {
        if response.accepted {
            info!("cache service accepted service settings");
            let _ = self.control.send(ControlEvent::Ready);
        } else {
            let _ = self.control.send(ControlEvent::Refused(
                "cache service rejected settings setup".to_string(),
            ));
        }
    }

    /// Authentication answered. On acceptance the flow chains into the
    /// cache-session step under a fresh request id; everything else
    /// resolves the client with a definite failure.
    fn on_authentication_response(&self, response: UserAuthenticationResponse) {
        let Some(mut ticket) = self.pool.dequeue(response.request_id) else {
            warn!(request_id = response.request_id,
                  "authentication response for unknown request, discarding");
            return;
        };

        if response.result != AuthenticationResult::UserAccepted {
            self.resolve(ticket, ClientReply::LoginFailed(response.result));
            return;
        }

        ticket.session.account_id = response.user_id;
        ticket.session.last_world = response.last_world_id;

        if response.access_level < self.allowed_access_level {
            self.resolve(
                ticket,
                ClientReply::LoginFailed(AuthenticationResult::AccessFailed),
            );
            return;
        }

        ticket.stage = FlowStage::CachingSession;
        let session = ticket.session.clone();
        let Some(request_id) = self.pool.enqueue(ticket) else {
            warn!("failed to chain cache-session request, pool refused");
            return;
        };
        let request = CacheUserSessionRequest {
            request_id,
            session,
        };
        if let Err(e) = self.sender.send(request.to_packet()) {
            warn!(error = %e, "failed to send cache-session request");
            if let Some(ticket) = self.pool.dequeue(request_id) {
                ticket.fail("cache link is down");
            }
        }
    }

    fn on_cache_session_response(&self, response: CacheUserSessionResponse) {
        let Some(ticket) = self.pool.dequeue(response.request_id) else {
            warn!(request_id = response.request_id,
                  "cache-session response for unknown request, discarding");
            return;
        };

        if response.accepted {
            let session = ticket.session.clone();
            self.resolve(ticket, ClientReply::LoginOk(session));
        } else {
            warn!("failed to cache user session data on cache service side");
            self.resolve(
                ticket,
                ClientReply::LoginFailed(AuthenticationResult::SystemError),
            );
        }
    }

    fn on_worlds_list_response(&self, response: WorldsListResponse) {
        let Some(ticket) = self.pool.dequeue(response.request_id) else {
            warn!(request_id = response.request_id,
                  "worlds list response for unknown request, discarding");
            return;
        };
        let last_world = ticket.session.last_world;
        self.resolve(
            ticket,
            ClientReply::WorldsList {
                last_world,
                worlds: response.worlds,
            },
        );
    }

    fn on_join_world_response(&self, response: JoinWorldResponse) {
        let Some(ticket) = self.pool.dequeue(response.request_id) else {
            warn!(request_id = response.request_id,
                  "join world response for unknown request, discarding");
            return;
        };
        match response.result {
            JoinWorldResult::Accepted => {
                let session = ticket.session.clone();
                self.resolve(ticket, ClientReply::PlayOk(session));
            }
            result => self.resolve(ticket, ClientReply::PlayFailed(result)),
        }
    }
}

#[async_trait]
impl PacketHandler for CacheLinkHandler {
    async fn handle_packet(&self, mut packet: Packet) -> Result<(), NetError> {
        match (packet.first_opcode(), packet.second_opcode()) {
            (layer::SERVICE_LAYER, service_layer::INITIALIZE_RESPONSE) => {
                self.on_initialize_response(InitializeResponse::from_packet(&mut packet)?);
            }
            (layer::SERVICE_LAYER, service_layer::SET_SETTINGS_RESPONSE) => {
                self.on_settings_response(SetSettingsResponse::from_packet(&mut packet)?);
            }
            (layer::USER_DATA_LAYER, user_data::USER_AUTHENTICATION_RESPONSE) => {
                self.on_authentication_response(UserAuthenticationResponse::from_packet(
                    &mut packet,
                )?);
            }
            (layer::USER_DATA_LAYER, user_data::CACHE_USER_SESSION_RESPONSE) => {
                self.on_cache_session_response(CacheUserSessionResponse::from_packet(&mut packet)?);
            }
            (layer::USER_DATA_LAYER, user_data::WORLDS_LIST_RESPONSE) => {
                self.on_worlds_list_response(WorldsListResponse::from_packet(&mut packet)?);
            }
            (layer::USER_DATA_LAYER, user_data::JOIN_WORLD_RESPONSE) => {
                self.on_join_world_response(JoinWorldResponse::from_packet(&mut packet)?);
            }
            (first, second) => {
                warn!(first, second, "unknown packet received from cache service");
            }
        }
        Ok(())
    }
}
