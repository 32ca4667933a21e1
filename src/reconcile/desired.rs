//! Desired-State Builder
//!
//! Collapses user-supplied attributes into a [`DesiredConfig`] holding only
//! the keys that were explicitly supplied. A missing key means "leave the
//! remote value alone", never "clear it".

use crate::resource::identity::{ResourceIdentity, KEY_CONFIG, KEY_DESCRIPTION, KEY_DRIVER};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

// =============================================================================
// Desired State
// =============================================================================

/// Whether the resource should exist
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DesiredState {
    #[default]
    Present,
    Absent,
}

impl std::fmt::Display for DesiredState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DesiredState::Present => write!(f, "present"),
            DesiredState::Absent => write!(f, "absent"),
        }
    }
}

// =============================================================================
// Desired Config
// =============================================================================

/// Normalized desired attributes of a resource
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct DesiredConfig(Map<String, Value>);

impl DesiredConfig {
    pub fn builder() -> DesiredConfigBuilder {
        DesiredConfigBuilder::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.0.clone())
    }
}

/// Builder that drops every attribute left unset
#[derive(Debug, Default)]
pub struct DesiredConfigBuilder {
    entries: Map<String, Value>,
}

impl DesiredConfigBuilder {
    /// Set `key` when a value was supplied
    pub fn attribute(mut self, key: &str, value: Option<Value>) -> Self {
        if let Some(value) = value {
            self.entries.insert(key.to_string(), value);
        }
        self
    }

    pub fn driver(self, driver: Option<String>) -> Self {
        self.attribute(KEY_DRIVER, driver.map(Value::String))
    }

    pub fn description(self, description: Option<String>) -> Self {
        self.attribute(KEY_DESCRIPTION, description.map(Value::String))
    }

    pub fn config(self, config: Option<BTreeMap<String, String>>) -> Self {
        let config = config.map(|entries| {
            Value::Object(
                entries
                    .into_iter()
                    .map(|(k, v)| (k, Value::String(v)))
                    .collect(),
            )
        });
        self.attribute(KEY_CONFIG, config)
    }

    pub fn build(self) -> DesiredConfig {
        DesiredConfig(self.entries)
    }
}

// =============================================================================
// Desired Resource
// =============================================================================

/// Everything the reconciler needs to know about one resource
#[derive(Debug, Clone)]
pub struct DesiredResource {
    /// Which resource
    pub identity: ResourceIdentity,
    /// Supplied attributes
    pub config: DesiredConfig,
    /// Whether it should exist
    pub state: DesiredState,
    /// Cluster member to create on (or migrate to, for volumes)
    pub placement: Option<String>,
    /// Permit relocating an existing volume to `placement`
    pub allow_migrate: bool,
}

impl DesiredResource {
    pub fn new(identity: ResourceIdentity, config: DesiredConfig) -> Self {
        Self {
            identity,
            config,
            state: DesiredState::Present,
            placement: None,
            allow_migrate: false,
        }
    }

    pub fn with_state(mut self, state: DesiredState) -> Self {
        self.state = state;
        self
    }

    pub fn with_placement(mut self, placement: Option<String>) -> Self {
        self.placement = placement;
        self
    }

    pub fn with_allow_migrate(mut self, allow_migrate: bool) -> Self {
        self.allow_migrate = allow_migrate;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_unset_attributes_are_omitted() {
        let desired = DesiredConfig::builder()
            .driver(None)
            .description(Some("fast pool".into()))
            .config(None)
            .build();

        assert_eq!(desired.to_value(), json!({"description": "fast pool"}));
        assert!(!desired.contains_key(KEY_DRIVER));
        assert!(!desired.contains_key(KEY_CONFIG));
    }

    #[test]
    fn test_empty_values_are_kept() {
        let desired = DesiredConfig::builder()
            .description(Some(String::new()))
            .config(Some(BTreeMap::new()))
            .build();

        assert_eq!(desired.to_value(), json!({"description": "", "config": {}}));
    }

    #[test]
    fn test_config_becomes_object() {
        let mut config = BTreeMap::new();
        config.insert("size".to_string(), "20GiB".to_string());
        let desired = DesiredConfig::builder()
            .driver(Some("zfs".into()))
            .config(Some(config))
            .build();

        assert_eq!(
            desired.to_value(),
            json!({"driver": "zfs", "config": {"size": "20GiB"}})
        );
    }

    #[test]
    fn test_desired_state_default() {
        assert_eq!(DesiredState::default(), DesiredState::Present);
        assert_eq!(DesiredState::Absent.to_string(), "absent");
    }
}
