//! # Game Service
//!
//! Hosts one game world. On the inner network it connects out to the
//! cache service, pushes its settings, and announces world readiness so
//! the cache can start routing players here. The world simulation itself
//! is a separate concern layered on top of this crate.

pub use config::GameConfig;
pub use service::GameService;

pub mod config;
pub mod service;
