//! User-data-layer messages: authentication, session caching, world
//! listing and world joining. All request/response pairs here correlate
//! through a caller-supplied request id; only `UnCacheUser` is
//! fire-and-forget.

use crate::error::PacketError;
use crate::messages::layer;
use crate::packet::Packet;
use crate::types::{UserSession, WorldSummary};

pub const AUTHENTICATE_USER: u8 = 0x00;
pub const USER_AUTHENTICATION_RESPONSE: u8 = 0x01;
pub const CACHE_USER_SESSION_REQUEST: u8 = 0x02;
pub const CACHE_USER_SESSION_RESPONSE: u8 = 0x03;
pub const WORLDS_LIST_REQUEST: u8 = 0x04;
pub const WORLDS_LIST_RESPONSE: u8 = 0x05;
pub const UN_CACHE_USER: u8 = 0x06;
pub const JOIN_WORLD_REQUEST: u8 = 0x07;
pub const JOIN_WORLD_RESPONSE: u8 = 0x08;

/// Outcome codes for a user authentication attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum AuthenticationResult {
    SystemError = 0x01,
    PasswordWrong = 0x02,
    UserOrPasswordWrong = 0x03,
    AccessFailed = 0x04,
    AccountInUse = 0x07,
    ServerOverloaded = 0x0f,
    ServerMaintenance = 0x10,
    TemporaryPasswordExpired = 0x11,
    DualBox = 0x23,
    UserAccepted = 0xfd,
}

impl AuthenticationResult {
    pub fn from_u8(value: u8) -> Result<Self, PacketError> {
        Ok(match value {
            0x01 => Self::SystemError,
            0x02 => Self::PasswordWrong,
            0x03 => Self::UserOrPasswordWrong,
            0x04 => Self::AccessFailed,
            0x07 => Self::AccountInUse,
            0x0f => Self::ServerOverloaded,
            0x10 => Self::ServerMaintenance,
            0x11 => Self::TemporaryPasswordExpired,
            0x23 => Self::DualBox,
            0xfd => Self::UserAccepted,
            _ => {
                return Err(PacketError::UnknownDiscriminant {
                    field: "AuthenticationResult",
                    value,
                })
            }
        })
    }
}

/// Outcome codes for a join-world attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum JoinWorldResult {
    SystemError = 0x01,
    UserOrPasswordWrong = 0x02,
    PasswordIsIncorrect = 0x03,
    AccessFailed = 0x04,
    TooManyPlayers = 0x0f,
    Accepted = 0xff,
}

impl JoinWorldResult {
    pub fn from_u8(value: u8) -> Result<Self, PacketError> {
        Ok(match value {
            0x01 => Self::SystemError,
            0x02 => Self::UserOrPasswordWrong,
            0x03 => Self::PasswordIsIncorrect,
            0x04 => Self::AccessFailed,
            0x0f => Self::TooManyPlayers,
            0xff => Self::Accepted,
            _ => {
                return Err(PacketError::UnknownDiscriminant {
                    field: "JoinWorldResult",
                    value,
                })
            }
        })
    }
}

/// Login service asks the cache service to authenticate a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserAuthenticationRequest {
    pub request_id: i64,
    pub login: String,
    pub password: String,
    pub session_id: i32,
}

impl UserAuthenticationRequest {
    pub const OPCODES: [u8; 2] = [layer::USER_DATA_LAYER, AUTHENTICATE_USER];

    pub fn to_packet(&self) -> Packet {
        let mut p = Packet::new(Self::OPCODES);
        p.write_i64(self.request_id);
        p.write_string(&self.login);
        p.write_string(&self.password);
        p.write_i32(self.session_id);
        p
    }

    pub fn from_packet(p: &mut Packet) -> Result<Self, PacketError> {
        Ok(Self {
            request_id: p.read_i64()?,
            login: p.read_string()?,
            password: p.read_string()?,
            session_id: p.read_i32()?,
        })
    }
}

/// Cache service's authentication verdict. The user fields are only on the
/// wire when the result is [`AuthenticationResult::UserAccepted`]; for every
/// other result they hold their defaults and must not be trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserAuthenticationResponse {
    pub request_id: i64,
    pub result: AuthenticationResult,
    pub user_id: i32,
    pub last_world_id: u8,
    pub access_level: u8,
}

impl UserAuthenticationResponse {
    pub const OPCODES: [u8; 2] = [layer::USER_DATA_LAYER, USER_AUTHENTICATION_RESPONSE];

    /// A rejection carrying no user data.
    pub fn rejected(request_id: i64, result: AuthenticationResult) -> Self {
        Self {
            request_id,
            result,
            user_id: -1,
            last_world_id: 1,
            access_level: 0,
        }
    }

    pub fn accepted(request_id: i64, user_id: i32, last_world_id: u8, access_level: u8) -> Self {
        Self {
            request_id,
            result: AuthenticationResult::UserAccepted,
            user_id,
            last_world_id,
            access_level,
        }
    }

    pub fn to_packet(&self) -> Packet {
        let mut p = Packet::new(Self::OPCODES);
        p.write_i64(self.request_id);
        p.write_u8(self.result as u8);
        if self.result == AuthenticationResult::UserAccepted {
            p.write_i32(self.user_id);
            p.write_u8(self.last_world_id);
            p.write_u8(self.access_level);
        }
        p
    }

    pub fn from_packet(p: &mut Packet) -> Result<Self, PacketError> {
        let request_id = p.read_i64()?;
        let result = AuthenticationResult::from_u8(p.read_u8()?)?;
        if result == AuthenticationResult::UserAccepted {
            Ok(Self {
                request_id,
                result,
                user_id: p.read_i32()?,
                last_world_id: p.read_u8()?,
                access_level: p.read_u8()?,
            })
        } else {
            Ok(Self::rejected(request_id, result))
        }
    }
}

/// Login service asks the cache service to register a freshly
/// authenticated session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheUserSessionRequest {
    pub request_id: i64,
    pub session: UserSession,
}

impl CacheUserSessionRequest {
    pub const OPCODES: [u8; 2] = [layer::USER_DATA_LAYER, CACHE_USER_SESSION_REQUEST];

    pub fn to_packet(&self) -> Packet {
        let mut p = Packet::new(Self::OPCODES);
        p.write_i64(self.request_id);
        self.session.write(&mut p);
        p
    }

    pub fn from_packet(p: &mut Packet) -> Result<Self, PacketError> {
        Ok(Self {
            request_id: p.read_i64()?,
            session: UserSession::read(p)?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheUserSessionResponse {
    pub request_id: i64,
    pub accepted: bool,
}

impl CacheUserSessionResponse {
    pub const OPCODES: [u8; 2] = [layer::USER_DATA_LAYER, CACHE_USER_SESSION_RESPONSE];

    pub const FAILED: u8 = 0x00;
    pub const ACCEPTED: u8 = 0x01;

    pub fn to_packet(&self) -> Packet {
        let mut p = Packet::new(Self::OPCODES);
        p.write_i64(self.request_id);
        p.write_u8(if self.accepted {
            Self::ACCEPTED
        } else {
            Self::FAILED
        });
        p
    }

    pub fn from_packet(p: &mut Packet) -> Result<Self, PacketError> {
        Ok(Self {
            request_id: p.read_i64()?,
            accepted: p.read_u8()? == Self::ACCEPTED,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorldsListRequest {
    pub request_id: i64,
}

impl WorldsListRequest {
    pub const OPCODES: [u8; 2] = [layer::USER_DATA_LAYER, WORLDS_LIST_REQUEST];

    pub fn to_packet(&self) -> Packet {
        let mut p = Packet::new(Self::OPCODES);
        p.write_i64(self.request_id);
        p
    }

    pub fn from_packet(p: &mut Packet) -> Result<Self, PacketError> {
        Ok(Self {
            request_id: p.read_i64()?,
        })
    }
}

/// Snapshot of every world the cache service knows about, prefixed by a
/// one-byte count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorldsListResponse {
    pub request_id: i64,
    pub worlds: Vec<WorldSummary>,
}

impl WorldsListResponse {
    pub const OPCODES: [u8; 2] = [layer::USER_DATA_LAYER, WORLDS_LIST_RESPONSE];

    pub fn to_packet(&self) -> Packet {
        let mut p = Packet::new(Self::OPCODES);
        p.write_i64(self.request_id);
        p.write_u8(self.worlds.len().min(u8::MAX as usize) as u8);
        for world in self.worlds.iter().take(u8::MAX as usize) {
            world.write(&mut p);
        }
        p
    }

    pub fn from_packet(p: &mut Packet) -> Result<Self, PacketError> {
        let request_id = p.read_i64()?;
        let count = p.read_u8()? as usize;
        let mut worlds = Vec::with_capacity(count);
        for _ in 0..count {
            worlds.push(WorldSummary::read(p)?);
        }
        Ok(Self { request_id, worlds })
    }
}

/// Fire-and-forget request to drop a cached session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnCacheUser {
    pub session_id: i32,
}

impl UnCacheUser {
    pub const OPCODES: [u8; 2] = [layer::USER_DATA_LAYER, UN_CACHE_USER];

    pub fn to_packet(&self) -> Packet {
        let mut p = Packet::new(Self::OPCODES);
        p.write_i32(self.session_id);
        p
    }

    pub fn from_packet(p: &mut Packet) -> Result<Self, PacketError> {
        Ok(Self {
            session_id: p.read_i32()?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinWorldRequest {
    pub request_id: i64,
    pub session_id: i32,
    pub world_id: u8,
}

impl JoinWorldRequest {
    pub const OPCODES: [u8; 2] = [layer::USER_DATA_LAYER, JOIN_WORLD_REQUEST];

    pub fn to_packet(&self) -> Packet {
        let mut p = Packet::new(Self::OPCODES);
        p.write_i64(self.request_id);
        p.write_i32(self.session_id);
        p.write_u8(self.world_id);
        p
    }

    pub fn from_packet(p: &mut Packet) -> Result<Self, PacketError> {
        Ok(Self {
            request_id: p.read_i64()?,
            session_id: p.read_i32()?,
            world_id: p.read_u8()?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinWorldResponse {
    pub request_id: i64,
    pub result: JoinWorldResult,
}

impl JoinWorldResponse {
    pub const OPCODES: [u8; 2] = [layer::USER_DATA_LAYER, JOIN_WORLD_RESPONSE];

    pub fn to_packet(&self) -> Packet {
        let mut p = Packet::new(Self::OPCODES);
        p.write_i64(self.request_id);
        p.write_u8(self.result as u8);
        p
    }

    pub fn from_packet(p: &mut Packet) -> Result<Self, PacketError> {
        Ok(Self {
            request_id: p.read_i64()?,
            result: JoinWorldResult::from_u8(p.read_u8()?)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reparse(p: Packet) -> Packet {
        let frame = p.into_frame().expect("frame should encode");
        Packet::from_frame_body(frame[2..].to_vec()).expect("body should parse")
    }

    fn sample_session() -> UserSession {
        UserSession {
            id: 42,
            account_name: "bob".into(),
            account_id: 7,
            login1: 11,
            login2: 22,
            play1: 33,
            play2: 44,
            start_time: 1_700_000_000_000,
            last_world: 0,
            ip_address: "10.0.0.5".into(),
            blowfish_key: vec![0xde, 0xad],
        }
    }

    #[test]
    fn accepted_authentication_preserves_user_fields() {
        let resp = UserAuthenticationResponse::accepted(99, 1234, 3, 100);
        let mut p = reparse(resp.to_packet());
        let decoded = UserAuthenticationResponse::from_packet(&mut p).unwrap();
        assert_eq!(decoded.request_id, 99);
        assert_eq!(decoded.result, AuthenticationResult::UserAccepted);
        assert_eq!(decoded.user_id, 1234);
        assert_eq!(decoded.last_world_id, 3);
        assert_eq!(decoded.access_level, 100);
    }

    #[test]
    fn rejected_authentication_carries_no_user_fields() {
        let resp =
            UserAuthenticationResponse::rejected(7, AuthenticationResult::UserOrPasswordWrong);
        let frame = resp.to_packet().into_frame().unwrap();
        // length + opcodes + request id + result byte, nothing else
        assert_eq!(frame.len(), 2 + 2 + 8 + 1);

        let mut p = Packet::from_frame_body(frame[2..].to_vec()).unwrap();
        let decoded = UserAuthenticationResponse::from_packet(&mut p).unwrap();
        assert_eq!(decoded.result, AuthenticationResult::UserOrPasswordWrong);
        assert_eq!(decoded.user_id, -1);
    }

    #[test]
    fn cache_session_request_round_trips_wire_fields() {
        let req = CacheUserSessionRequest {
            request_id: 5,
            session: sample_session(),
        };
        let mut p = reparse(req.to_packet());
        let decoded = CacheUserSessionRequest::from_packet(&mut p).unwrap();
        assert_eq!(decoded.request_id, 5);
        assert_eq!(decoded.session.id, 42);
        assert_eq!(decoded.session.account_name, "bob");
        assert_eq!(decoded.session.ip_address, "10.0.0.5");
        assert_eq!(decoded.session.start_time, 1_700_000_000_000);
        // Cipher key material never crosses the inner network.
        assert!(decoded.session.blowfish_key.is_empty());
    }

    #[test]
    fn worlds_list_response_round_trips_multiple_worlds() {
        let mut first = crate::types::tests::sample_world(1);
        first.is_online = true;
        first.users_online = 9;
        let second = crate::types::tests::sample_world(2);

        let resp = WorldsListResponse {
            request_id: 17,
            worlds: vec![first.clone(), second.clone()],
        };
        let mut p = reparse(resp.to_packet());
        let decoded = WorldsListResponse::from_packet(&mut p).unwrap();
        assert_eq!(decoded.worlds, vec![first, second]);
    }

    #[test]
    fn join_world_response_rejects_unknown_result_bytes() {
        let mut p = Packet::new(JoinWorldResponse::OPCODES);
        p.write_i64(1);
        p.write_u8(0x42);
        let mut p = reparse(p);
        let err = JoinWorldResponse::from_packet(&mut p).expect_err("0x42 is not a result");
        assert!(matches!(err, PacketError::UnknownDiscriminant { .. }));
    }
}
