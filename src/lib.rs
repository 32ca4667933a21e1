//! LXD Storage Reconciler
//!
//! Declarative management of LXD storage pools and storage volumes. A
//! desired state is compared with the live resource and converged through
//! the minimal set of idempotent API calls.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                             Reconciler                               │
//! ├──────────────────────────────────────────────────────────────────────┤
//! │  ┌───────────┐   ┌───────────┐   ┌───────────┐   ┌───────────────┐   │
//! │  │  Desired  │──▶│  Fetcher  │──▶│   Diff    │──▶│   Executor    │   │
//! │  │  Builder  │   │ (observe) │   │  Engine   │   │ (check mode)  │   │
//! │  └───────────┘   └───────────┘   └───────────┘   └───────┬───────┘   │
//! │                                                          │           │
//! │                                                  ┌───────┴───────┐   │
//! │                                                  │   Reporter    │   │
//! │                                                  └───────────────┘   │
//! ├──────────────────────────────────────────────────────────────────────┤
//! │                        LxdApi port                                   │
//! │  ┌───────────────────────────────┐  ┌───────────────────────────┐    │
//! │  │   unix socket (hyper)         │  │   https (reqwest)         │    │
//! │  └───────────────────────────────┘  └───────────────────────────┘    │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`reconcile`]: desired-state builder, fetcher, diff engine, executor, reporter
//! - [`resource`]: resource identity, LXD paths and manifests
//! - [`client`]: LXD REST client
//! - [`domain`]: the `LxdApi` port
//! - [`error`]: Error types and handling

pub mod client;
pub mod domain;
pub mod error;
pub mod reconcile;
pub mod resource;

#[cfg(test)]
pub(crate) mod testing;

// Re-export commonly used types
pub use client::{ClientConfig, Endpoint, LxdClient};

pub use domain::ports::{ApiResponse, HttpMethod, LxdApi, LxdApiRef, ResponseType};

pub use error::{Error, ErrorCategory, Result};

pub use reconcile::{
    Action, ActionLog, DesiredConfig, DesiredResource, DesiredState, DiffEngine, ObservedState,
    OldState, Plan, ReconcileFailure, ReconcileReport, Reconciler,
};

pub use resource::{ContentType, ResourceIdentity, ResourceKind, ResourceManifest, VolumeType};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
