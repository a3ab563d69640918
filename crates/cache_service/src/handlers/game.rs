//! Handler for packets arriving from a connected game service.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use inner_net::messages::layer;
use inner_net::messages::service_layer::{self, SetSettingsRequest};
use inner_net::messages::world_data::{self, SetWorldActiveResponse};
use inner_net::{
    ConnectionHandle, NetError, Packet, PacketHandler, ServiceIdentity, ServiceRegistry,
};

use crate::registry::WorldRegistry;

/// Serves one game service connection: settings and world readiness.
/// The connection's service id names the world it hosts.
pub struct GameServiceHandler {
    pub handle: ConnectionHandle,
    pub identity: ServiceIdentity,
    pub registry: Arc<ServiceRegistry>,
    pub worlds: Arc<WorldRegistry>,
}

#[async_trait]
impl PacketHandler for GameServiceHandler {
    async fn handle_packet(&self, mut packet: Packet) -> Result<(), NetError> {
        match (packet.first_opcode(), packet.second_opcode()) {
            (layer::SERVICE_LAYER, service_layer::INITIALIZE_REQUEST) => {
                info!(identity = %self.identity, "connected service requests connection initialization");
            }
            (layer::SERVICE_LAYER, service_layer::SET_SETTINGS_REQUEST) => {
                let request = SetSettingsRequest::from_packet(&mut packet)?;
                self.registry.set_service_settings(request.settings);
            }
            (layer::WORLD_DATA_LAYER, world_data::SET_WORLD_ACTIVE_REQUEST) => {
                self.worlds.set_active(self.identity.id);
                if let Err(e) = self.handle.send(SetWorldActiveResponse.to_packet()) {
                    warn!(identity = %self.identity, error = %e,
                          "failed to confirm world activation");
                }
                info!(
                    world_id = self.identity.id,
                    "world allowed to accept user connections"
                );
            }
            (first, second) => {
                warn!(
                    identity = %self.identity,
                    first, second,
                    "unknown packet received from game service"
                );
            }
        }
        Ok(())
    }
}
