//! The inner-network message catalogue.
//!
//! Packets carry no self-description: the opcode pair is the only key into
//! the schema, and field order is the contract. This module is the central
//! opcode → schema registry; any change to a message's field order must be
//! mirrored here and in every peer.
//!
//! | layer (op1)            | message (op2)                    | direction          | correlated |
//! |------------------------|----------------------------------|--------------------|------------|
//! | `SERVICE_LAYER` `0x00` | `INITIALIZE_REQUEST` `0x00`      | initiator → acceptor | no       |
//! |                        | `INITIALIZE_RESPONSE` `0x01`     | acceptor → initiator | no       |
//! |                        | `SET_SETTINGS_REQUEST` `0x02`    | initiator → acceptor | no       |
//! |                        | `SET_SETTINGS_RESPONSE` `0x03`   | acceptor → initiator | no       |
//! | `USER_DATA_LAYER` `0x01` | `AUTHENTICATE_USER` `0x00`     | login → cache      | request id |
//! |                        | `USER_AUTHENTICATION_RESPONSE` `0x01` | cache → login | request id |
//! |                        | `CACHE_USER_SESSION_REQUEST` `0x02` | login → cache   | request id |
//! |                        | `CACHE_USER_SESSION_RESPONSE` `0x03` | cache → login  | request id |
//! |                        | `WORLDS_LIST_REQUEST` `0x04`     | login → cache      | request id |
//! |                        | `WORLDS_LIST_RESPONSE` `0x05`    | cache → login      | request id |
//! |                        | `UN_CACHE_USER` `0x06`           | login/game → cache | no (fire-and-forget) |
//! |                        | `JOIN_WORLD_REQUEST` `0x07`      | login → cache      | request id |
//! |                        | `JOIN_WORLD_RESPONSE` `0x08`     | cache → login      | request id |
//! | `WORLD_DATA_LAYER` `0x02` | `SET_WORLD_ACTIVE_REQUEST` `0x00` | game → cache   | no (fire-and-forget) |
//! |                        | `SET_WORLD_ACTIVE_RESPONSE` `0x01` | cache → game    | no         |

pub mod service_layer;
pub mod user_data;
pub mod world_data;

/// Opcode layer selectors (first opcode byte).
pub mod layer {
    /// Identity handshake and per-connection settings.
    pub const SERVICE_LAYER: u8 = 0x00;
    /// Authentication, session caching, world listing and joining.
    pub const USER_DATA_LAYER: u8 = 0x01;
    /// World readiness announcements.
    pub const WORLD_DATA_LAYER: u8 = 0x02;
}
