//! Diff Engine
//!
//! Compares a [`DesiredResource`] with the [`ObservedState`] of the same
//! resource and decides the ordered list of [`Action`]s that converges it.
//!
//! Rules:
//! - `config` style sub-mappings are merged key by key. Keys that only exist
//!   remotely are never touched.
//! - Write-once keys (a pool's `driver`) are sent on create and never
//!   compared afterwards.
//! - Updates are full documents: observed values plus desired overrides.
//! - `migrate` always precedes `apply_configs`.

use super::desired::{DesiredConfig, DesiredResource, DesiredState};
use super::observed::ObservedState;
use crate::error::{Error, Result};
use crate::resource::identity::{ResourceIdentity, ResourceKind, KEY_DRIVER};
use serde_json::{Map, Value};
use tracing::debug;

// =============================================================================
// Actions
// =============================================================================

/// A state-changing operation against the LXD server
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Create the resource with this body
    Create { body: Value },
    /// Delete the resource
    Delete,
    /// Move an existing volume to another cluster member
    Migrate { from: String, to: String },
    /// Replace the resource's mutable attributes with this body
    ApplyConfigs { body: Value },
}

impl Action {
    /// Tag reported for this action
    pub fn tag(&self) -> &'static str {
        match self {
            Action::Create { .. } => "create",
            Action::Delete => "delete",
            Action::Migrate { .. } => "migrate",
            Action::ApplyConfigs { .. } => "apply_configs",
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.tag())
    }
}

/// Outcome of the diff engine
#[derive(Debug, Clone, PartialEq)]
pub struct Plan {
    /// Actions in execution order
    pub actions: Vec<Action>,
    /// Configuration the resource is expected to end up with, for reporting
    pub after: Value,
}

impl Plan {
    fn new(actions: Vec<Action>, after: Value) -> Self {
        Self { actions, after }
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn tags(&self) -> Vec<&'static str> {
        self.actions.iter().map(Action::tag).collect()
    }
}

// =============================================================================
// Diff Engine
// =============================================================================

/// Decides how to converge a resource
pub struct DiffEngine;

impl DiffEngine {
    /// Decide the actions that bring `observed` to `desired`
    pub fn decide(desired: &DesiredResource, observed: &ObservedState) -> Result<Plan> {
        let identity = &desired.identity;
        let config = &desired.config;

        let plan = match (desired.state, observed) {
            (DesiredState::Present, ObservedState::Absent) => {
                let body = Self::create_body(identity, config)?;
                Plan::new(vec![Action::Create { body }], config.to_value())
            }
            (DesiredState::Present, ObservedState::Present(metadata)) => {
                let mut actions = Vec::new();

                if let Some(migrate) = Self::migration(desired, metadata)? {
                    actions.push(migrate);
                }

                let mut after = config.to_value();
                if Self::needs_to_apply_configs(identity, config, metadata) {
                    let body = Self::merged_body(identity, config, metadata);
                    after = body.clone();
                    actions.push(Action::ApplyConfigs { body });
                }

                Plan::new(actions, after)
            }
            (DesiredState::Absent, ObservedState::Present(_)) => {
                Plan::new(vec![Action::Delete], config.to_value())
            }
            (DesiredState::Absent, ObservedState::Absent) => {
                Plan::new(Vec::new(), config.to_value())
            }
        };

        debug!(
            "Decided actions for {} {}: {:?}",
            identity.kind_label(),
            identity,
            plan.tags()
        );

        Ok(plan)
    }

    /// Body of the create request
    fn create_body(identity: &ResourceIdentity, config: &DesiredConfig) -> Result<Value> {
        let mut body = config.as_map().clone();

        match identity.kind() {
            ResourceKind::Pool => {
                if !config.contains_key(KEY_DRIVER) {
                    return Err(Error::DriverRequired {
                        pool: identity.name().to_string(),
                    });
                }
            }
            ResourceKind::Volume {
                volume_type,
                content_type,
                ..
            } => {
                body.insert("type".into(), Value::String(volume_type.to_string()));
                body.insert(
                    "content_type".into(),
                    Value::String(content_type.to_string()),
                );
            }
        }
        body.insert("name".into(), Value::String(identity.name().to_string()));

        Ok(Value::Object(body))
    }

    /// Migration required to honor the requested placement, if any
    fn migration(
        desired: &DesiredResource,
        metadata: &Map<String, Value>,
    ) -> Result<Option<Action>> {
        let identity = &desired.identity;
        if !identity.supports_migration() {
            return Ok(None);
        }
        let Some(requested) = desired.placement.as_deref() else {
            return Ok(None);
        };
        let current = metadata
            .get("location")
            .and_then(Value::as_str)
            .unwrap_or_default();

        if current.is_empty() || current == requested {
            return Ok(None);
        }

        if !desired.allow_migrate {
            return Err(Error::MigrationNotAllowed {
                volume: identity.name().to_string(),
                current: current.to_string(),
                requested: requested.to_string(),
            });
        }

        Ok(Some(Action::Migrate {
            from: current.to_string(),
            to: requested.to_string(),
        }))
    }

    /// Whether the desired value of `key` differs from the observed one
    pub fn needs_to_change(
        config: &DesiredConfig,
        metadata: &Map<String, Value>,
        key: &str,
    ) -> bool {
        let Some(wanted) = config.get(key) else {
            return false;
        };
        let current = metadata.get(key);

        match wanted {
            Value::Object(entries) => {
                let current = current.and_then(Value::as_object);
                entries
                    .iter()
                    .any(|(k, v)| current.and_then(|c| c.get(k)) != Some(v))
            }
            scalar => current != Some(scalar),
        }
    }

    /// Whether any mutable key changed
    pub fn needs_to_apply_configs(
        identity: &ResourceIdentity,
        config: &DesiredConfig,
        metadata: &Map<String, Value>,
    ) -> bool {
        identity
            .recognized_keys()
            .iter()
            .filter(|key| !identity.is_write_once(key))
            .any(|key| Self::needs_to_change(config, metadata, key))
    }

    /// Full update document: observed values with desired overrides merged in
    fn merged_body(
        identity: &ResourceIdentity,
        config: &DesiredConfig,
        metadata: &Map<String, Value>,
    ) -> Value {
        let mut body = Map::new();

        for key in identity.recognized_keys() {
            let key = *key;
            if let Some(current) = metadata.get(key) {
                body.insert(key.to_string(), current.clone());
            }
            if identity.is_write_once(key) {
                continue;
            }

            match config.get(key) {
                Some(Value::Object(overrides)) => {
                    let slot = body
                        .entry(key.to_string())
                        .or_insert_with(|| Value::Object(Map::new()));
                    if !slot.is_object() {
                        *slot = Value::Object(Map::new());
                    }
                    if let Value::Object(merged) = slot {
                        for (k, v) in overrides {
                            merged.insert(k.clone(), v.clone());
                        }
                    }
                }
                Some(value) => {
                    body.insert(key.to_string(), value.clone());
                }
                None => {}
            }
        }

        Value::Object(body)
    }
}
