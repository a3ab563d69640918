//! Service-layer messages: the identity handshake and the optional
//! settings push that follows it.

use crate::error::PacketError;
use crate::messages::layer;
use crate::packet::Packet;
use crate::service::{ServiceIdentity, ServiceKind, ServiceSettings};

pub const INITIALIZE_REQUEST: u8 = 0x00;
pub const INITIALIZE_RESPONSE: u8 = 0x01;
pub const SET_SETTINGS_REQUEST: u8 = 0x02;
pub const SET_SETTINGS_RESPONSE: u8 = 0x03;

/// Sent by the connecting side immediately after the socket opens,
/// declaring who it is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InitializeRequest {
    pub identity: ServiceIdentity,
}

impl InitializeRequest {
    pub const OPCODES: [u8; 2] = [layer::SERVICE_LAYER, INITIALIZE_REQUEST];

    pub fn to_packet(&self) -> Packet {
        let mut p = Packet::new(Self::OPCODES);
        p.write_u8(self.identity.id);
        p.write_u8(self.identity.kind as u8);
        p
    }

    pub fn from_packet(p: &mut Packet) -> Result<Self, PacketError> {
        let id = p.read_u8()?;
        let kind = ServiceKind::from_u8(p.read_u8()?);
        Ok(Self {
            identity: ServiceIdentity::new(kind, id),
        })
    }
}

/// The acceptor's verdict on an [`InitializeRequest`], carrying its own
/// identity so the initiator learns who it reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InitializeResponse {
    pub accepted: bool,
    pub remote: ServiceIdentity,
}

impl InitializeResponse {
    pub const OPCODES: [u8; 2] = [layer::SERVICE_LAYER, INITIALIZE_RESPONSE];

    pub const REJECTED: u8 = 0x00;
    pub const ACCEPTED: u8 = 0x01;

    pub fn to_packet(&self) -> Packet {
        let mut p = Packet::new(Self::OPCODES);
        p.write_u8(if self.accepted {
            Self::ACCEPTED
        } else {
            Self::REJECTED
        });
        p.write_u8(self.remote.id);
        p.write_u8(self.remote.kind as u8);
        p
    }

    pub fn from_packet(p: &mut Packet) -> Result<Self, PacketError> {
        let accepted = p.read_u8()? == Self::ACCEPTED;
        let id = p.read_u8()?;
        let kind = ServiceKind::from_u8(p.read_u8()?);
        Ok(Self {
            accepted,
            remote: ServiceIdentity::new(kind, id),
        })
    }
}

/// Pushes the initiator's service-specific settings blob; the acceptor
/// binds it to the connection for the rest of the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetSettingsRequest {
    pub settings: ServiceSettings,
}

impl SetSettingsRequest {
    pub const OPCODES: [u8; 2] = [layer::SERVICE_LAYER, SET_SETTINGS_REQUEST];

    pub fn to_packet(&self) -> Packet {
        let mut p = Packet::new(Self::OPCODES);
        self.settings.write(&mut p);
        p
    }

    pub fn from_packet(p: &mut Packet) -> Result<Self, PacketError> {
        Ok(Self {
            settings: ServiceSettings::read(p)?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetSettingsResponse {
    pub accepted: bool,
}

impl SetSettingsResponse {
    pub const OPCODES: [u8; 2] = [layer::SERVICE_LAYER, SET_SETTINGS_RESPONSE];

    pub const REJECTED: u8 = 0x00;
    pub const ACCEPTED: u8 = 0x01;

    pub fn to_packet(&self) -> Packet {
        let mut p = Packet::new(Self::OPCODES);
        p.write_u8(if self.accepted {
            Self::ACCEPTED
        } else {
            Self::REJECTED
        });
        p
    }

    pub fn from_packet(p: &mut Packet) -> Result<Self, PacketError> {
        Ok(Self {
            accepted: p.read_u8()? == Self::ACCEPTED,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::LoginServiceSettings;

    fn reparse(p: Packet) -> Packet {
        let frame = p.into_frame().expect("frame should encode");
        Packet::from_frame_body(frame[2..].to_vec()).expect("body should parse")
    }

    #[test]
    fn initialize_exchange_round_trips() {
        let req = InitializeRequest {
            identity: ServiceIdentity::new(ServiceKind::LoginService, 2),
        };
        let mut p = reparse(req.to_packet());
        assert_eq!(p.first_opcode(), layer::SERVICE_LAYER);
        assert_eq!(p.second_opcode(), INITIALIZE_REQUEST);
        assert_eq!(InitializeRequest::from_packet(&mut p).unwrap(), req);

        let resp = InitializeResponse {
            accepted: false,
            remote: ServiceIdentity::new(ServiceKind::CacheService, 1),
        };
        let mut p = reparse(resp.to_packet());
        assert_eq!(InitializeResponse::from_packet(&mut p).unwrap(), resp);
    }

    #[test]
    fn settings_request_round_trips() {
        let req = SetSettingsRequest {
            settings: ServiceSettings::Login(LoginServiceSettings {
                service_id: 2,
                auto_create_users: true,
                default_access_level: 1,
            }),
        };
        let mut p = reparse(req.to_packet());
        assert_eq!(SetSettingsRequest::from_packet(&mut p).unwrap(), req);
    }
}
