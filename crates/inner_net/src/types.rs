//! Domain records shared between services: cached user sessions and
//! world summaries.

use serde::{Deserialize, Serialize};

use crate::error::PacketError;
use crate::packet::Packet;

/// A cached, authenticated user's in-memory record, shared across the
/// login/game flows via the cache service.
///
/// At most one live session exists per `id` and per `account_name` at any
/// time; the cache service's session registry enforces both.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserSession {
    /// Session unique id, assigned by the login service.
    pub id: i32,
    pub account_name: String,
    pub account_id: i32,
    /// Scramble key pair handed to the client for the login phase.
    pub login1: i32,
    pub login2: i32,
    /// Scramble key pair handed to the client for the play phase.
    pub play1: i32,
    pub play2: i32,
    /// Session start, milliseconds since the Unix epoch.
    pub start_time: i64,
    /// World the user last joined, zero when not in a world.
    pub last_world: u8,
    pub ip_address: String,
    /// Per-connection key material for the client-facing stream cipher.
    /// Local to the login service; never crosses the inner network.
    pub blowfish_key: Vec<u8>,
}

impl UserSession {
    /// Appends the session's wire fields in catalogue order. The cipher key
    /// stays local and the current world is tracked server-side only.
    pub(crate) fn write(&self, p: &mut Packet) {
        p.write_string(&self.account_name);
        p.write_string(&self.ip_address);
        p.write_i32(self.id);
        p.write_i32(self.account_id);
        p.write_i32(self.login1);
        p.write_i32(self.login2);
        p.write_i32(self.play1);
        p.write_i32(self.play2);
        p.write_timestamp(self.start_time);
    }

    pub(crate) fn read(p: &mut Packet) -> Result<Self, PacketError> {
        let account_name = p.read_string()?;
        let ip_address = p.read_string()?;
        Ok(Self {
            account_name,
            ip_address,
            id: p.read_i32()?,
            account_id: p.read_i32()?,
            login1: p.read_i32()?,
            login2: p.read_i32()?,
            play1: p.read_i32()?,
            play2: p.read_i32()?,
            start_time: p.read_timestamp()?,
            last_world: 0,
            blowfish_key: Vec::new(),
        })
    }
}

/// Summary of one game-content world as tracked by the cache service.
///
/// Bulk-loaded from the database at cache startup; only `is_online` mutates
/// at runtime, flipped when the world's game service announces readiness.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorldSummary {
    /// World unique id; equals the hosting game service's numeric id.
    pub id: u8,
    /// IPv4 address of the world, as raw octets.
    pub address: [u8; 4],
    pub port: u16,
    pub age_limit: u8,
    pub is_pvp: bool,
    pub users_max: i16,
    pub users_online: i16,
    pub show_brackets: bool,
    pub is_test_server: bool,
    pub show_clock: bool,
    #[serde(default)]
    pub is_online: bool,
    /// Minimum access level required to connect.
    pub access_level: u8,
}

impl WorldSummary {
    /// Capacity gate: a world at or past `users_max` accepts nobody else.
    pub fn is_full(&self) -> bool {
        self.users_online >= self.users_max
    }

    pub(crate) fn write(&self, p: &mut Packet) {
        p.write_u8(self.id);
        p.write_bytes(&self.address);
        p.write_u16(self.port);
        p.write_u8(self.age_limit);
        p.write_bool(self.is_pvp);
        p.write_i16(self.users_max);
        p.write_i16(self.users_online);
        p.write_bool(self.show_brackets);
        p.write_bool(self.is_test_server);
        p.write_bool(self.show_clock);
        p.write_bool(self.is_online);
        p.write_u8(self.access_level);
    }

    pub(crate) fn read(p: &mut Packet) -> Result<Self, PacketError> {
        let id = p.read_u8()?;
        let address_bytes = p.read_bytes(4)?;
        let mut address = [0u8; 4];
        address.copy_from_slice(&address_bytes);
        Ok(Self {
            id,
            address,
            port: p.read_u16()?,
            age_limit: p.read_u8()?,
            is_pvp: p.read_bool()?,
            users_max: p.read_i16()?,
            users_online: p.read_i16()?,
            show_brackets: p.read_bool()?,
            is_test_server: p.read_bool()?,
            show_clock: p.read_bool()?,
            is_online: p.read_bool()?,
            access_level: p.read_u8()?,
        })
    }
}
