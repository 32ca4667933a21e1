//! Resource manifests
//!
//! A manifest is a YAML document describing one pool or one volume.
//! It is the flat option set handed to the desired-state builder.

use super::identity::{ContentType, ResourceIdentity, VolumeType};
use crate::error::{Error, Result};
use crate::reconcile::desired::{DesiredConfig, DesiredResource, DesiredState};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

// =============================================================================
// Pool Manifest
// =============================================================================

/// Desired storage pool
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PoolSpec {
    /// Name of the storage pool
    pub name: String,

    /// LXD project
    #[serde(default)]
    pub project: Option<String>,

    /// Storage driver (dir, zfs, btrfs, lvm, ceph). Required on create.
    #[serde(default)]
    pub driver: Option<String>,

    /// Driver-specific configuration
    #[serde(default)]
    pub config: Option<BTreeMap<String, String>>,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub state: DesiredState,

    /// Cluster member to create the pool on
    #[serde(default)]
    pub target: Option<String>,
}

impl PoolSpec {
    pub fn identity(&self) -> ResourceIdentity {
        ResourceIdentity::pool(self.name.clone(), self.project.clone())
    }

    pub fn desired_config(&self) -> DesiredConfig {
        DesiredConfig::builder()
            .config(self.config.clone())
            .description(self.description.clone())
            .driver(self.driver.clone())
            .build()
    }
}

// =============================================================================
// Volume Manifest
// =============================================================================

/// Desired storage volume
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VolumeSpec {
    /// Name of the storage volume
    pub name: String,

    /// Pool the volume lives in
    pub pool: String,

    /// LXD project
    #[serde(default)]
    pub project: Option<String>,

    #[serde(default, rename = "type")]
    pub volume_type: VolumeType,

    #[serde(default)]
    pub content_type: ContentType,

    /// Volume configuration (size, snapshots.expiry, block.filesystem, ...)
    #[serde(default)]
    pub config: Option<BTreeMap<String, String>>,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub state: DesiredState,

    /// Cluster member the volume should live on
    #[serde(default)]
    pub target: Option<String>,

    /// Allow moving an existing volume to `target`
    #[serde(default)]
    pub allow_migrate: bool,
}

impl VolumeSpec {
    pub fn identity(&self) -> ResourceIdentity {
        ResourceIdentity::volume(
            self.name.clone(),
            self.pool.clone(),
            self.project.clone(),
            self.volume_type,
            self.content_type,
        )
    }

    pub fn desired_config(&self) -> DesiredConfig {
        DesiredConfig::builder()
            .config(self.config.clone())
            .description(self.description.clone())
            .build()
    }
}

// =============================================================================
// Manifest
// =============================================================================

/// A pool or volume manifest, tagged by `kind`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ResourceManifest {
    Pool(PoolSpec),
    Volume(VolumeSpec),
}

impl ResourceManifest {
    pub fn from_yaml_str(input: &str) -> Result<Self> {
        let manifest: Self = serde_yaml::from_str(input)?;
        manifest.validate()?;
        Ok(manifest)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let input = std::fs::read_to_string(path).map_err(|e| {
            Error::Configuration(format!("cannot read manifest {}: {}", path.display(), e))
        })?;
        Self::from_yaml_str(&input)
    }

    fn validate(&self) -> Result<()> {
        let (name, pool) = match self {
            ResourceManifest::Pool(spec) => (&spec.name, None),
            ResourceManifest::Volume(spec) => (&spec.name, Some(&spec.pool)),
        };
        if name.is_empty() {
            return Err(Error::Validation("name must not be empty".into()));
        }
        if pool.is_some_and(|p| p.is_empty()) {
            return Err(Error::Validation("pool must not be empty".into()));
        }
        Ok(())
    }

    /// Run the desired-state builder over this manifest
    pub fn into_desired(self) -> DesiredResource {
        match self {
            ResourceManifest::Pool(spec) => {
                DesiredResource::new(spec.identity(), spec.desired_config())
                    .with_state(spec.state)
                    .with_placement(spec.target)
            }
            ResourceManifest::Volume(spec) => {
                DesiredResource::new(spec.identity(), spec.desired_config())
                    .with_state(spec.state)
                    .with_placement(spec.target)
                    .with_allow_migrate(spec.allow_migrate)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::identity::ResourceKind;
    use assert_matches::assert_matches;
    use serde_json::json;
    use std::io::Write;

    #[test]
    fn test_parse_pool_manifest() {
        let manifest = ResourceManifest::from_yaml_str(
            r#"
kind: pool
name: my-zfs-pool
driver: zfs
config:
  size: 50GiB
description: ZFS storage pool
"#,
        )
        .unwrap();

        let desired = manifest.into_desired();
        assert_eq!(desired.identity.name(), "my-zfs-pool");
        assert_eq!(desired.state, DesiredState::Present);
        assert_eq!(
            desired.config.to_value(),
            json!({
                "driver": "zfs",
                "config": {"size": "50GiB"},
                "description": "ZFS storage pool"
            })
        );
        assert!(!desired.allow_migrate);
    }

    #[test]
    fn test_parse_volume_manifest_defaults() {
        let manifest = ResourceManifest::from_yaml_str(
            r#"
kind: volume
name: v1
pool: default
target: node02
allow_migrate: true
"#,
        )
        .unwrap();

        let desired = manifest.into_desired();
        assert_matches!(
            desired.identity.kind(),
            ResourceKind::Volume {
                volume_type: VolumeType::Custom,
                content_type: ContentType::Filesystem,
                ..
            }
        );
        assert_eq!(desired.placement.as_deref(), Some("node02"));
        assert!(desired.allow_migrate);
        assert!(desired.config.is_empty());
    }

    #[test]
    fn test_parse_volume_type_and_state() {
        let manifest = ResourceManifest::from_yaml_str(
            r#"
kind: volume
name: v1
pool: default
type: virtual-machine
content_type: block
state: absent
"#,
        )
        .unwrap();

        let desired = manifest.into_desired();
        assert_eq!(desired.state, DesiredState::Absent);
        assert_eq!(
            desired.identity.resource_path(),
            "/1.0/storage-pools/default/volumes/virtual-machine/v1"
        );
    }

    #[test]
    fn test_unknown_field_rejected() {
        let err = ResourceManifest::from_yaml_str("kind: pool\nname: p\nsize: 10GiB\n").unwrap_err();
        assert_matches!(err, Error::ManifestParse(_));
    }

    #[test]
    fn test_volume_requires_pool() {
        let err = ResourceManifest::from_yaml_str("kind: volume\nname: v\n").unwrap_err();
        assert_matches!(err, Error::ManifestParse(_));

        let err = ResourceManifest::from_yaml_str("kind: volume\nname: v\npool: ''\n").unwrap_err();
        assert_matches!(err, Error::Validation(_));
    }

    #[test]
    fn test_from_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "kind: pool\nname: from-file\ndriver: dir").unwrap();

        let manifest = ResourceManifest::from_path(file.path()).unwrap();
        assert_matches!(manifest, ResourceManifest::Pool(ref spec) if spec.name == "from-file");

        let missing = file.path().with_extension("missing");
        assert_matches!(
            ResourceManifest::from_path(&missing),
            Err(Error::Configuration(_))
        );
    }
}
