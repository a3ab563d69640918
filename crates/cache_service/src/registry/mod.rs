//! In-memory realtime state: connected user sessions and world summaries.

pub mod sessions;
pub mod worlds;

pub use sessions::SessionRegistry;
pub use worlds::WorldRegistry;
