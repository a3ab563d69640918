//! Handler for packets arriving from a connected login service.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use inner_net::messages::service_layer::{self, SetSettingsRequest};
use inner_net::messages::user_data::{
    self, AuthenticationResult, CacheUserSessionRequest, CacheUserSessionResponse,
    JoinWorldRequest, JoinWorldResponse, JoinWorldResult, UnCacheUser, UserAuthenticationRequest,
    UserAuthenticationResponse, WorldsListRequest, WorldsListResponse,
};
use inner_net::messages::layer;
use inner_net::{
    ConnectionHandle, LoginServiceSettings, NetError, Packet, PacketHandler, ServiceIdentity,
    ServiceRegistry, ServiceSettings,
};

use crate::database::Database;
use crate::registry::{SessionRegistry, WorldRegistry};

/// Serves one login service connection: authentication, session caching,
/// world listing and join-world gating.
pub struct LoginServiceHandler {
    pub handle: ConnectionHandle,
    pub identity: ServiceIdentity,
    pub registry: Arc<ServiceRegistry>,
    pub sessions: Arc<SessionRegistry>,
    pub worlds: Arc<WorldRegistry>,
    pub database: Arc<dyn Database>,
}

impl LoginServiceHandler {
    fn send(&self, packet: Packet) {
        if let Err(e) = self.handle.send(packet) {
            warn!(identity = %self.identity, error = %e, "failed to send response");
        }
    }

    /// The settings this login service pushed after its handshake, or the
    /// conservative defaults (no auto-create) if none arrived yet.
    fn login_settings(&self) -> LoginServiceSettings {
        match self.registry.settings(self.identity.id) {
            Some(ServiceSettings::Login(settings)) => settings,
            _ => LoginServiceSettings::default(),
        }
    }

    async fn authenticate(&self, request: UserAuthenticationRequest) {
        // A session id or account that is already live answers without
        // ever touching the database.
        if self.sessions.connected_session(request.session_id) {
            self.send(
                UserAuthenticationResponse::rejected(
                    request.request_id,
                    AuthenticationResult::AccessFailed,
                )
                .to_packet(),
            );
            return;
        }
        if self.sessions.connected_account(&request.login) {
            self.send(
                UserAuthenticationResponse::rejected(
                    request.request_id,
                    AuthenticationResult::AccountInUse,
                )
                .to_packet(),
            );
            return;
        }

        let settings = self.login_settings();
        let response = self.database.user_auth(&request, &settings).await;
        self.send(response.to_packet());
    }

    fn cache_session(&self, request: CacheUserSessionRequest) {
        let accepted = !self.sessions.connected_session(request.session.id)
            && !self.sessions.connected_account(&request.session.account_name)
            && self.sessions.register(request.session);

        if !accepted {
            warn!(identity = %self.identity, "failed to cache user session data");
        }
        self.send(
            CacheUserSessionResponse {
                request_id: request.request_id,
                accepted,
            }
            .to_packet(),
        );
    }

    async fn uncache_user(&self, request: UnCacheUser) {
        // Update login/logout bookkeeping before the session is forgotten.
        if let Some(session) = self.sessions.find(request.session_id) {
            self.database
                .user_logout(
                    session.account_id,
                    session.start_time,
                    &session.ip_address,
                    session.last_world,
                )
                .await;
            self.sessions.unregister_session(request.session_id);
        }
    }

    fn join_world(&self, request: JoinWorldRequest) {
        let result = if !self.sessions.connected_session(request.session_id) {
            JoinWorldResult::AccessFailed
        } else if !self.worlds.contains(request.world_id)
            || !self.worlds.is_online(request.world_id)
        {
            JoinWorldResult::SystemError
        } else if self.worlds.is_full(request.world_id) {
            JoinWorldResult::TooManyPlayers
        } else {
            self.sessions
                .update_current_world(request.session_id, request.world_id);
            JoinWorldResult::Accepted
        };

        self.send(
            JoinWorldResponse {
                request_id: request.request_id,
                result,
            }
            .to_packet(),
        );
    }
}

#[async_trait]
impl PacketHandler for LoginServiceHandler {
    async fn handle_packet(&self, mut packet: Packet) -> Result<(), NetError> {
        match (packet.first_opcode(), packet.second_opcode()) {
            (layer::SERVICE_LAYER, service_layer::INITIALIZE_REQUEST) => {
                info!(identity = %self.identity, "connected service requests connection initialization");
            }
            (layer::SERVICE_LAYER, service_layer::SET_SETTINGS_REQUEST) => {
                let request = SetSettingsRequest::from_packet(&mut packet)?;
                self.registry.set_service_settings(request.settings);
            }
            (layer::USER_DATA_LAYER, user_data::AUTHENTICATE_USER) => {
                let request = UserAuthenticationRequest::from_packet(&mut packet)?;
                self.authenticate(request).await;
            }
            (layer::USER_DATA_LAYER, user_data::CACHE_USER_SESSION_REQUEST) => {
                let request = CacheUserSessionRequest::from_packet(&mut packet)?;
                self.cache_session(request);
            }
            (layer::USER_DATA_LAYER, user_data::WORLDS_LIST_REQUEST) => {
                let request = WorldsListRequest::from_packet(&mut packet)?;
                self.send(
                    WorldsListResponse {
                        request_id: request.request_id,
                        worlds: self.worlds.snapshot(),
                    }
                    .to_packet(),
                );
            }
            (layer::USER_DATA_LAYER, user_data::UN_CACHE_USER) => {
                let request = UnCacheUser::from_packet(&mut packet)?;
                self.uncache_user(request).await;
            }
            (layer::USER_DATA_LAYER, user_data::JOIN_WORLD_REQUEST) => {
                let request = JoinWorldRequest::from_packet(&mut packet)?;
                self.join_world(request);
            }
            (first, second) => {
                warn!(
                    identity = %self.identity,
                    first, second,
                    "unknown packet received from login service"
                );
            }
        }
        Ok(())
    }
}
