//! Managed resources
//!
//! Identity and path grammar of LXD storage pools and volumes, and the
//! YAML manifests describing them.

pub mod identity;
pub mod manifest;

pub use identity::*;
pub use manifest::*;
