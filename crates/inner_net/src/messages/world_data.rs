//! World-data-layer messages: readiness announcements from game services.

use crate::error::PacketError;
use crate::messages::layer;
use crate::packet::Packet;

pub const SET_WORLD_ACTIVE_REQUEST: u8 = 0x00;
pub const SET_WORLD_ACTIVE_RESPONSE: u8 = 0x01;

/// Fire-and-forget notification that the sending game service is ready to
/// accept player connections. Carries no payload: the announcing
/// connection's service id names the world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SetWorldActiveRequest;

impl SetWorldActiveRequest {
    pub const OPCODES: [u8; 2] = [layer::WORLD_DATA_LAYER, SET_WORLD_ACTIVE_REQUEST];

    pub fn to_packet(&self) -> Packet {
        Packet::new(Self::OPCODES)
    }

    pub fn from_packet(_p: &mut Packet) -> Result<Self, PacketError> {
        Ok(Self)
    }
}

/// Echo confirming the world was marked online.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SetWorldActiveResponse;

impl SetWorldActiveResponse {
    pub const OPCODES: [u8; 2] = [layer::WORLD_DATA_LAYER, SET_WORLD_ACTIVE_RESPONSE];

    pub fn to_packet(&self) -> Packet {
        Packet::new(Self::OPCODES)
    }

    pub fn from_packet(_p: &mut Packet) -> Result<Self, PacketError> {
        Ok(Self)
    }
}
