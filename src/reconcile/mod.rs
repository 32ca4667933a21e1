//! Reconciliation pipeline
//!
//! - [`desired`]: desired-state builder
//! - [`observed`]: remote-state fetcher
//! - [`diff`]: diff engine
//! - [`executor`]: action executor
//! - [`report`]: reporter
//! - [`reconciler`]: the pipeline itself

pub mod desired;
pub mod diff;
pub mod executor;
pub mod observed;
pub mod reconciler;
pub mod report;

pub use desired::{DesiredConfig, DesiredConfigBuilder, DesiredResource, DesiredState};
pub use diff::{Action, DiffEngine, Plan};
pub use executor::{ActionExecutor, ActionLog, ActionRequest};
pub use observed::{fetch, ObservedState, OldState};
pub use reconciler::Reconciler;
pub use report::{DiffRecord, ReconcileFailure, ReconcileReport, Reporter};
