//! # Login Service
//!
//! Front door of the backend: authenticates end users against the cache
//! service and walks them through session caching, world listing and
//! world joining. The client-facing wire protocol is a separate concern;
//! this crate exposes the flows ([`flow::LoginFlows`]) that a front end
//! drives, each resolving to a definite [`flow::ClientReply`] no matter
//! what the backend does.

pub use config::LoginConfig;
pub use flow::{ClientReply, LoginFlows};
pub use service::LoginService;

pub mod config;
pub mod flow;
pub mod service;

mod handlers;
