//! Resource identity and LXD path grammar
//!
//! Pools and volumes share one reconciliation pipeline. Everything that
//! differs between them (paths, recognized keys, migration support) is
//! answered by [`ResourceIdentity`] from its [`ResourceKind`] variant.

use serde::{Deserialize, Serialize};

/// LXD API version prefix
pub const API_PREFIX: &str = "/1.0";

/// Recognized attribute keys
pub const KEY_CONFIG: &str = "config";
pub const KEY_DESCRIPTION: &str = "description";
pub const KEY_DRIVER: &str = "driver";

const POOL_KEYS: &[&str] = &[KEY_CONFIG, KEY_DESCRIPTION, KEY_DRIVER];
const POOL_WRITE_ONCE_KEYS: &[&str] = &[KEY_DRIVER];
const VOLUME_KEYS: &[&str] = &[KEY_CONFIG, KEY_DESCRIPTION];

// =============================================================================
// Volume Attributes
// =============================================================================

/// Storage volume type
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VolumeType {
    #[default]
    Custom,
    Container,
    VirtualMachine,
    Image,
}

impl VolumeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            VolumeType::Custom => "custom",
            VolumeType::Container => "container",
            VolumeType::VirtualMachine => "virtual-machine",
            VolumeType::Image => "image",
        }
    }
}

impl std::fmt::Display for VolumeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Storage volume content type
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    #[default]
    Filesystem,
    Block,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Filesystem => "filesystem",
            ContentType::Block => "block",
        }
    }
}

impl std::fmt::Display for ContentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Resource Identity
// =============================================================================

/// Kind of managed storage resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceKind {
    /// A storage pool
    Pool,
    /// A storage volume inside a pool
    Volume {
        pool: String,
        volume_type: VolumeType,
        content_type: ContentType,
    },
}

/// Identity of a storage resource on the LXD server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceIdentity {
    name: String,
    project: Option<String>,
    kind: ResourceKind,
}

impl ResourceIdentity {
    /// Identity of a storage pool
    pub fn pool(name: impl Into<String>, project: Option<String>) -> Self {
        Self {
            name: name.into(),
            project,
            kind: ResourceKind::Pool,
        }
    }

    /// Identity of a storage volume
    pub fn volume(
        name: impl Into<String>,
        pool: impl Into<String>,
        project: Option<String>,
        volume_type: VolumeType,
        content_type: ContentType,
    ) -> Self {
        Self {
            name: name.into(),
            project,
            kind: ResourceKind::Volume {
                pool: pool.into(),
                volume_type,
                content_type,
            },
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn project(&self) -> Option<&str> {
        self.project.as_deref()
    }

    pub fn kind(&self) -> &ResourceKind {
        &self.kind
    }

    /// Label used in log lines and error messages
    pub fn kind_label(&self) -> &'static str {
        match self.kind {
            ResourceKind::Pool => "storage pool",
            ResourceKind::Volume { .. } => "storage volume",
        }
    }

    /// Collection path new resources are POSTed to
    pub fn collection_path(&self) -> String {
        match &self.kind {
            ResourceKind::Pool => format!("{}/storage-pools", API_PREFIX),
            ResourceKind::Volume {
                pool, volume_type, ..
            } => format!(
                "{}/storage-pools/{}/volumes/{}",
                API_PREFIX,
                urlencoding::encode(pool),
                volume_type
            ),
        }
    }

    /// Path of the resource itself
    pub fn resource_path(&self) -> String {
        format!(
            "{}/{}",
            self.collection_path(),
            urlencoding::encode(&self.name)
        )
    }

    /// Every attribute key the reconciler manages for this kind
    pub fn recognized_keys(&self) -> &'static [&'static str] {
        match self.kind {
            ResourceKind::Pool => POOL_KEYS,
            ResourceKind::Volume { .. } => VOLUME_KEYS,
        }
    }

    /// Keys that are only honored at creation time
    pub fn write_once_keys(&self) -> &'static [&'static str] {
        match self.kind {
            ResourceKind::Pool => POOL_WRITE_ONCE_KEYS,
            ResourceKind::Volume { .. } => &[],
        }
    }

    pub fn is_write_once(&self, key: &str) -> bool {
        self.write_once_keys().contains(&key)
    }

    /// Whether an existing resource can be relocated to another cluster member
    pub fn supports_migration(&self) -> bool {
        matches!(self.kind, ResourceKind::Volume { .. })
    }
}

impl std::fmt::Display for ResourceIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            ResourceKind::Pool => write!(f, "{}", self.name)?,
            ResourceKind::Volume {
                pool, volume_type, ..
            } => write!(f, "{}/{}/{}", pool, volume_type, self.name)?,
        }
        if let Some(project) = &self.project {
            write!(f, " (project {})", project)?;
        }
        Ok(())
    }
}

/// Append query parameters to `path`, skipping unset ones
pub fn with_query(path: String, params: &[(&str, Option<&str>)]) -> String {
    let query: Vec<String> = params
        .iter()
        .filter_map(|(key, value)| {
            value.map(|v| format!("{}={}", key, urlencoding::encode(v)))
        })
        .collect();

    if query.is_empty() {
        path
    } else {
        format!("{}?{}", path, query.join("&"))
    }
}
