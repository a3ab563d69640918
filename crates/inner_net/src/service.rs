//! Service identity types shared by every backend service.

use crate::error::PacketError;
use crate::packet::Packet;

/// Enumerated role of a backend service on the inner network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ServiceKind {
    Undefined = 0x00,
    LoginService = 0x01,
    CacheService = 0x02,
    GameService = 0x03,
    NpcService = 0x04,
}

impl ServiceKind {
    /// Maps a wire byte onto a service kind. Unknown bytes collapse to
    /// [`ServiceKind::Undefined`], which every acceptor treats as a
    /// rejection condition.
    pub fn from_u8(value: u8) -> Self {
        match value {
            0x01 => Self::LoginService,
            0x02 => Self::CacheService,
            0x03 => Self::GameService,
            0x04 => Self::NpcService,
            _ => Self::Undefined,
        }
    }
}

impl std::fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Undefined => "undefined service",
            Self::LoginService => "login service",
            Self::CacheService => "cache service",
            Self::GameService => "game service",
            Self::NpcService => "npc service",
        };
        f.write_str(name)
    }
}

/// Who a connection belongs to: the service's role plus its numeric id.
/// Exchanged during the identity handshake and immutable once negotiated.
///
/// A game service's numeric id doubles as the id of the world it hosts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceIdentity {
    pub kind: ServiceKind,
    pub id: u8,
}

impl ServiceIdentity {
    pub fn new(kind: ServiceKind, id: u8) -> Self {
        Self { kind, id }
    }
}

impl std::fmt::Display for ServiceIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (0x{:02x})", self.kind, self.id)
    }
}

/// Settings the login service pushes to the cache service right after the
/// identity handshake. The acceptor honors them for the whole session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginServiceSettings {
    pub service_id: u8,
    /// Create unknown accounts on first authentication instead of failing.
    pub auto_create_users: bool,
    /// Access level assigned to auto-created accounts.
    pub default_access_level: u8,
}

impl Default for LoginServiceSettings {
    fn default() -> Self {
        Self {
            service_id: 0,
            auto_create_users: false,
            default_access_level: 0,
        }
    }
}

/// Settings a game service pushes before announcing world readiness.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GameServiceSettings {
    pub service_id: u8,
}

/// Kind-tagged settings blob carried by a `SetSettingsRequest`.
///
/// Wire layout: the sender's [`ServiceKind`] byte selects the blob schema
/// that follows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceSettings {
    Login(LoginServiceSettings),
    Game(GameServiceSettings),
}

impl ServiceSettings {
    /// The numeric id of the service these settings belong to.
    pub fn service_id(&self) -> u8 {
        match self {
            Self::Login(s) => s.service_id,
            Self::Game(s) => s.service_id,
        }
    }

    pub fn kind(&self) -> ServiceKind {
        match self {
            Self::Login(_) => ServiceKind::LoginService,
            Self::Game(_) => ServiceKind::GameService,
        }
    }

    pub(crate) fn write(&self, p: &mut Packet) {
        p.write_u8(self.kind() as u8);
        match self {
            Self::Login(s) => {
                p.write_u8(s.service_id);
                p.write_bool(s.auto_create_users);
                p.write_u8(s.default_access_level);
            }
            Self::Game(s) => {
                p.write_u8(s.service_id);
            }
        }
    }

    pub(crate) fn read(p: &mut Packet) -> Result<Self, PacketError> {
        let kind = p.read_u8()?;
        match ServiceKind::from_u8(kind) {
            ServiceKind::LoginService => Ok(Self::Login(LoginServiceSettings {
                service_id: p.read_u8()?,
                auto_create_users: p.read_bool()?,
                default_access_level: p.read_u8()?,
            })),
            ServiceKind::GameService => Ok(Self::Game(GameServiceSettings {
                service_id: p.read_u8()?,
            })),
            _ => Err(PacketError::UnknownDiscriminant {
                field: "ServiceSettings.kind",
                value: kind,
            }),
        }
    }
}
