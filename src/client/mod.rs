//! LXD client adapter
//!
//! Concrete implementation of [`crate::domain::ports::LxdApi`].

pub mod config;
pub mod lxd;

pub use config::{ClientConfig, Endpoint, DEFAULT_SNAP_URL, DEFAULT_URL};
pub use lxd::LxdClient;
