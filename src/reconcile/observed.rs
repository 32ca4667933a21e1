//! Remote-State Fetcher

use crate::domain::ports::{ApiResponse, LxdApi};
use crate::error::Result;
use crate::resource::identity::{with_query, ResourceIdentity};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

/// Error code LXD returns for a missing resource
pub const NOT_FOUND: u16 = 404;

/// Live state of a resource
#[derive(Debug, Clone, PartialEq)]
pub enum ObservedState {
    Absent,
    Present(Map<String, Value>),
}

/// Label of the state a resource was found in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OldState {
    Present,
    Absent,
}

impl ObservedState {
    /// Map a response envelope onto a state. Error envelopes mean absent.
    pub fn from_response(response: ApiResponse) -> Self {
        if response.is_error() {
            return ObservedState::Absent;
        }
        match response.metadata {
            Value::Object(metadata) => ObservedState::Present(metadata),
            _ => ObservedState::Present(Map::new()),
        }
    }

    pub fn is_present(&self) -> bool {
        matches!(self, ObservedState::Present(_))
    }

    pub fn metadata(&self) -> Option<&Map<String, Value>> {
        match self {
            ObservedState::Present(metadata) => Some(metadata),
            ObservedState::Absent => None,
        }
    }

    pub fn label(&self) -> OldState {
        match self {
            ObservedState::Present(_) => OldState::Present,
            ObservedState::Absent => OldState::Absent,
        }
    }
}

/// Read the live state of `identity` with a single GET
pub async fn fetch(api: &dyn LxdApi, identity: &ResourceIdentity) -> Result<ObservedState> {
    let path = with_query(identity.resource_path(), &[("project", identity.project())]);
    let response = api.get(&path, &[NOT_FOUND]).await?;
    let observed = ObservedState::from_response(response);

    debug!(
        "Fetched {} {}: {:?}",
        identity.kind_label(),
        identity,
        observed.label()
    );

    Ok(observed)
}
