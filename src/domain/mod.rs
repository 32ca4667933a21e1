//! Domain layer - Port definitions
//!
//! This module defines the trait the LXD client adapter implements,
//! following hexagonal architecture principles.

pub mod ports;

pub use ports::*;
