//! Inventory document types
//!
//! The primary document is a YAML sequence. One entry may carry the reserved
//! `globals` key; every other entry that carries `hostname` describes a VM.

use serde::ser::SerializeSeq;
use serde::{Deserialize, Serialize, Serializer};
use serde_yaml::{Mapping, Value};
use std::fmt;
use thiserror::Error;

/// Reserved key of the global settings entry
pub const GLOBALS_KEY: &str = "globals";

/// Key that marks an entry as a host
pub const HOSTNAME_KEY: &str = "hostname";

// ============================================================================
// Inventory
// ============================================================================

/// Settings shared by every host in the document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GlobalSettings {
    /// Domain used until a host overrides it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
}

/// The parsed host inventory
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Inventory {
    pub globals: Option<GlobalSettings>,
    pub hosts: Vec<HostSpec>,
}

impl Inventory {
    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }

    /// Domain declared in the globals entry, if any
    pub fn global_domain(&self) -> Option<&str> {
        self.globals.as_ref().and_then(|g| g.domain.as_deref())
    }
}

#[derive(Serialize)]
struct GlobalsEntry<'a> {
    globals: &'a GlobalSettings,
}

impl Serialize for Inventory {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let len = self.hosts.len() + usize::from(self.globals.is_some());
        let mut seq = serializer.serialize_seq(Some(len))?;
        if let Some(globals) = &self.globals {
            seq.serialize_element(&GlobalsEntry { globals })?;
        }
        for host in &self.hosts {
            seq.serialize_element(host)?;
        }
        seq.end()
    }
}

// ============================================================================
// Host
// ============================================================================

/// One declared virtual machine and its provisioning intent
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostSpec {
    pub hostname: String,

    /// Domain override, carried forward to later hosts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,

    /// Base image identifier
    #[serde(rename = "box", default, skip_serializing_if = "Option::is_none")]
    pub box_image: Option<String>,

    /// Memory in MiB
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpus: Option<u32>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub networks: Vec<NetworkSpec>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub storage: Vec<StorageSpec>,

    /// Group tags, duplicates allowed
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ansible_playbook: Option<String>,

    /// Raw option bag for the configuration-management run
    #[serde(default, skip_serializing_if = "Mapping::is_empty")]
    pub ansible_options: Mapping,

    /// Variables scoped to this host only
    #[serde(default, skip_serializing_if = "Mapping::is_empty")]
    pub ansible_host_vars: Mapping,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shell_path: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shell_inline: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bats_path: Option<String>,

    #[serde(default, skip_serializing_if = "is_false")]
    pub serverspec: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serverspec_path: Option<String>,
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl HostSpec {
    pub fn new(hostname: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
            ..Self::default()
        }
    }

    /// Whether the host asks for a serverspec run
    pub fn wants_serverspec(&self) -> bool {
        self.serverspec && self.serverspec_path.is_some()
    }
}

// ============================================================================
// Network
// ============================================================================

/// A network attachment, written as a single-key mapping `kind: options`
///
/// The entry is kept as raw YAML so that a malformed entry does not reject
/// the whole document; [`NetworkSpec::resolve`] checks the shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NetworkSpec(Value);

/// Ways a network entry can fail to resolve
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NetworkShapeError {
    #[error("network entry must be a mapping of kind to options")]
    NotAMapping,

    #[error("network entry must name exactly one kind, found {0}")]
    KindCount(usize),

    #[error("network kind must be a string")]
    NonStringKind,

    #[error("options for network '{kind}' must be a mapping")]
    OptionsNotMapping { kind: String },
}

impl NetworkSpec {
    pub fn new(kind: &str, options: Mapping) -> Self {
        let mut entry = Mapping::new();
        entry.insert(Value::String(kind.to_string()), Value::Mapping(options));
        Self(Value::Mapping(entry))
    }

    /// Wrap an arbitrary YAML value as a network entry
    pub fn from_value(value: Value) -> Self {
        Self(value)
    }

    /// Resolve to exactly one `(kind, options)` pair
    pub fn resolve(&self) -> Result<(&str, &Mapping), NetworkShapeError> {
        let entry = self.0.as_mapping().ok_or(NetworkShapeError::NotAMapping)?;
        if entry.len() != 1 {
            return Err(NetworkShapeError::KindCount(entry.len()));
        }
        let (kind, options) = entry.iter().next().ok_or(NetworkShapeError::KindCount(0))?;
        let kind = kind.as_str().ok_or(NetworkShapeError::NonStringKind)?;
        let options = options
            .as_mapping()
            .ok_or_else(|| NetworkShapeError::OptionsNotMapping {
                kind: kind.to_string(),
            })?;
        Ok((kind, options))
    }

    /// The `ip` option, when the entry is well-formed and declares one
    pub fn ip(&self) -> Option<&str> {
        let (_, options) = self.resolve().ok()?;
        options
            .iter()
            .find(|(k, _)| k.as_str().map(|k| k.trim_start_matches(':')) == Some("ip"))
            .and_then(|(_, v)| v.as_str())
    }
}

// ============================================================================
// Storage
// ============================================================================

/// Disk size as written in the document: `10G` or a plain number of bytes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DiskSize {
    Bytes(u64),
    Text(String),
}

impl fmt::Display for DiskSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bytes(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

/// A storage volume attached to a host
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<DiskSize>,

    /// Guest block device, e.g. `vdb`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,

    /// Disk image on the hypervisor host
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// Reuse an existing image instead of refusing to overwrite it
    #[serde(default, skip_serializing_if = "is_false")]
    pub allow_existing: bool,
}

/// How a storage entry attaches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageKind {
    /// Raw block device
    Device,
    /// Disk image file
    Image,
    /// Neither `device` nor `path` given
    Unspecified,
}

impl StorageSpec {
    pub fn kind(&self) -> StorageKind {
        if self.path.is_some() {
            StorageKind::Image
        } else if self.device.is_some() {
            StorageKind::Device
        } else {
            StorageKind::Unspecified
        }
    }
}

// ============================================================================
// Group variables
// ============================================================================

/// Externally supplied group name -> variables mapping
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupVars(Mapping);

impl GroupVars {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, group: &str, value: Value) {
        self.0.insert(Value::String(group.to_string()), value);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Entries with string keys, in document order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0
            .iter()
            .filter_map(|(k, v)| k.as_str().map(|k| (k, v)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn network(yaml: &str) -> NetworkSpec {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn test_network_resolve() {
        let net = network("private_network:\n  ip: 10.0.0.2\n");
        let (kind, options) = net.resolve().unwrap();
        assert_eq!(kind, "private_network");
        assert_eq!(options.len(), 1);
        assert_eq!(net.ip(), Some("10.0.0.2"));
    }

    #[test]
    fn test_network_resolve_errors() {
        assert_eq!(
            network("private_network: dhcp").resolve(),
            Err(NetworkShapeError::OptionsNotMapping {
                kind: "private_network".to_string()
            })
        );
        assert_eq!(
            network("just-a-string").resolve(),
            Err(NetworkShapeError::NotAMapping)
        );
        assert_eq!(
            network("a: {}\nb: {}\n").resolve(),
            Err(NetworkShapeError::KindCount(2))
        );
    }

    #[test]
    fn test_storage_kind() {
        let image = StorageSpec {
            path: Some("data.qcow2".into()),
            ..Default::default()
        };
        let device = StorageSpec {
            device: Some("vdb".into()),
            ..Default::default()
        };
        assert_eq!(image.kind(), StorageKind::Image);
        assert_eq!(device.kind(), StorageKind::Device);
        assert_eq!(StorageSpec::default().kind(), StorageKind::Unspecified);
    }

    #[test]
    fn test_disk_size_accepts_text_and_number() {
        let text: StorageSpec = serde_yaml::from_str("size: 10G\ndevice: vdb\n").unwrap();
        let bytes: StorageSpec = serde_yaml::from_str("size: 1024\ndevice: vdb\n").unwrap();
        assert_eq!(text.size, Some(DiskSize::Text("10G".into())));
        assert_eq!(bytes.size, Some(DiskSize::Bytes(1024)));
    }

    #[test]
    fn test_host_camel_case_keys() {
        let host: HostSpec = serde_yaml::from_str(
            "hostname: web\nbox: debian/bookworm64\nshellPath: setup.sh\nshellInline: echo hi\n",
        )
        .unwrap();
        assert_eq!(host.box_image.as_deref(), Some("debian/bookworm64"));
        assert_eq!(host.shell_path.as_deref(), Some("setup.sh"));
        assert_eq!(host.shell_inline.as_deref(), Some("echo hi"));
    }

    #[test]
    fn test_inventory_serializes_globals_first() {
        let inventory = Inventory {
            globals: Some(GlobalSettings {
                domain: Some("lab.test".into()),
            }),
            hosts: vec![HostSpec::new("web")],
        };
        let yaml = serde_yaml::to_string(&inventory).unwrap();
        assert_eq!(yaml, "- globals:\n    domain: lab.test\n- hostname: web\n");
    }
}
