//! Handler for packets arriving from a connected npc service.
//!
//! Npc services only ever use the handshake today; everything else is
//! logged and discarded.

use async_trait::async_trait;
use tracing::{info, warn};

use inner_net::messages::layer;
use inner_net::messages::service_layer;
use inner_net::{NetError, Packet, PacketHandler, ServiceIdentity};

pub struct NpcServiceHandler {
    pub identity: ServiceIdentity,
}

#[async_trait]
impl PacketHandler for NpcServiceHandler {
    async fn handle_packet(&self, packet: Packet) -> Result<(), NetError> {
        match (packet.first_opcode(), packet.second_opcode()) {
            (layer::SERVICE_LAYER, service_layer::INITIALIZE_REQUEST) => {
                info!(identity = %self.identity, "connected service requests connection initialization");
            }
            (first, second) => {
                warn!(
                    identity = %self.identity,
                    first, second,
                    "unknown packet received from npc service"
                );
            }
        }
        Ok(())
    }
}
