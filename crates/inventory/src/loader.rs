//! Loading, bootstrapping and saving inventory documents
//!
//! Loading is permissive by policy. A bad entry is dropped on its own and a
//! document that cannot be read at all degrades to an empty inventory (see
//! [`load_or_empty`]). Group variables degrade to an empty mapping.

use crate::diagnostics::{DiagnosticKind, Diagnostics};
use crate::error::{LoadError, Result};
use crate::types::{
    DiskSize, GLOBALS_KEY, GlobalSettings, GroupVars, HOSTNAME_KEY, HostSpec, Inventory,
    NetworkSpec, StorageSpec,
};
use serde_yaml::{Mapping, Value};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

/// Box used when a host does not name one
pub const DEFAULT_BOX: &str = "centos/7";

/// Memory in MiB used when a host does not set it
pub const DEFAULT_MEMORY: u32 = 1024;

/// CPU count used when a host does not set it
pub const DEFAULT_CPUS: u32 = 1;

/// Load the host inventory at `path`, writing a starter file if it is absent
///
/// Entries dropped while parsing are logged; use [`load_with_diagnostics`]
/// to collect them.
pub fn load(path: &Path) -> Result<Inventory> {
    load_with_diagnostics(path, &mut Diagnostics::new())
}

/// Load the host inventory, recording dropped entries in `diags`
pub fn load_with_diagnostics(path: &Path, diags: &mut Diagnostics) -> Result<Inventory> {
    if !path.exists() {
        let inventory = default_inventory();
        save(&inventory, path)?;
        log::info!("Wrote starter inventory to {}", path.display());
        return Ok(inventory);
    }

    let content = fs::read_to_string(path).map_err(|e| LoadError::io(path, e))?;
    parse(&content, diags).map_err(|reason| LoadError::malformed(path, reason))
}

/// Load the inventory, degrading to an empty one on any error
///
/// The failure is recorded as a `MalformedConfig` diagnostic.
pub fn load_or_empty(path: &Path, diags: &mut Diagnostics) -> Inventory {
    match load_with_diagnostics(path, diags) {
        Ok(inventory) => inventory,
        Err(e) => {
            diags.warn(
                DiagnosticKind::MalformedConfig,
                path.display().to_string(),
                format!("{e}; continuing with no hosts"),
            );
            Inventory::default()
        }
    }
}

/// Parse an inventory document
///
/// Only a syntax error or a top level that is not a sequence fails the
/// document. A bad globals or host entry is dropped with a diagnostic and
/// the remaining entries are kept.
pub fn parse(
    content: &str,
    diags: &mut Diagnostics,
) -> std::result::Result<Inventory, String> {
    let document: Value = serde_yaml::from_str(content).map_err(|e| e.to_string())?;
    from_document(document, diags)
}

fn from_document(
    document: Value,
    diags: &mut Diagnostics,
) -> std::result::Result<Inventory, String> {
    let entries = match document {
        Value::Sequence(entries) => entries,
        Value::Null => Vec::new(),
        other => {
            return Err(format!(
                "top level must be a sequence of entries, found {}",
                value_kind(&other)
            ));
        }
    };

    let mut inventory = Inventory::default();
    let mut seen = HashSet::new();

    for (index, entry) in entries.into_iter().enumerate() {
        let subject = format!("entry {index}");
        let Some(map) = entry.as_mapping() else {
            log::debug!("Dropping {subject}: not a mapping");
            continue;
        };

        if let Some(globals) = map.get(GLOBALS_KEY) {
            if inventory.globals.is_some() {
                log::debug!("Ignoring extra globals at {subject}");
                continue;
            }
            match serde_yaml::from_value::<GlobalSettings>(globals.clone()) {
                Ok(globals) => inventory.globals = Some(globals),
                Err(e) => diags.warn(
                    DiagnosticKind::InvalidEntry,
                    subject,
                    format!("invalid globals: {e}; dropped"),
                ),
            }
        } else if map.contains_key(HOSTNAME_KEY) {
            let host: HostSpec = match serde_yaml::from_value(entry) {
                Ok(host) => host,
                Err(e) => {
                    diags.warn(
                        DiagnosticKind::InvalidEntry,
                        subject,
                        format!("invalid host: {e}; dropped"),
                    );
                    continue;
                }
            };
            if host.hostname.trim().is_empty() {
                diags.warn(
                    DiagnosticKind::InvalidEntry,
                    subject,
                    "hostname cannot be empty; dropped",
                );
            } else if !seen.insert(host.hostname.clone()) {
                diags.warn(
                    DiagnosticKind::DuplicateHost,
                    subject,
                    format!("duplicate hostname '{}'; dropped", host.hostname),
                );
            } else {
                inventory.hosts.push(host);
            }
        } else {
            log::debug!("Dropping {subject}: neither globals nor hostname");
        }
    }

    Ok(inventory)
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Sequence(_) => "a sequence",
        Value::Mapping(_) => "a mapping",
        Value::Tagged(_) => "a tagged value",
    }
}

/// Serialize the inventory to `path`, creating parent directories
pub fn save(inventory: &Inventory, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(|e| LoadError::io(parent, e))?;
    }
    let content = serde_yaml::to_string(inventory)
        .map_err(|e| LoadError::malformed(path, format!("failed to serialize: {e}")))?;
    fs::write(path, content).map_err(|e| LoadError::io(path, e))
}

/// The starter inventory written on first run
pub fn default_inventory() -> Inventory {
    let mut network = Mapping::new();
    network.insert("ip".into(), "192.168.121.10".into());

    let mut ansible_options = Mapping::new();
    ansible_options.insert(
        "tags".into(),
        Value::Sequence(vec!["common".into(), "app".into()]),
    );

    let host = HostSpec {
        hostname: "node1".to_string(),
        box_image: Some(DEFAULT_BOX.to_string()),
        memory: Some(DEFAULT_MEMORY),
        cpus: Some(DEFAULT_CPUS),
        networks: vec![NetworkSpec::new("private_network", network)],
        storage: vec![
            StorageSpec {
                size: Some(DiskSize::Text("10G".to_string())),
                device: Some("vdb".to_string()),
                ..Default::default()
            },
            StorageSpec {
                size: Some(DiskSize::Text("20G".to_string())),
                path: Some("node1-data.qcow2".to_string()),
                allow_existing: true,
                ..Default::default()
            },
        ],
        groups: vec!["example".to_string()],
        ansible_playbook: Some("provisioning/site.yml".to_string()),
        ansible_options,
        shell_inline: Some("echo 'node1 provisioned'".to_string()),
        bats_path: Some("tests/node1.bats".to_string()),
        ..Default::default()
    };

    Inventory {
        globals: None,
        hosts: vec![host],
    }
}

/// Load the group-variables document, never failing
///
/// A missing file is simply empty; a malformed one is logged at debug level
/// and treated as empty.
pub fn load_group_vars(path: &Path) -> GroupVars {
    match try_load_group_vars(path) {
        Ok(vars) => vars,
        Err(e) => {
            log::debug!("{e}; using no group variables");
            GroupVars::default()
        }
    }
}

/// Load the group-variables document, reporting why it could not be used
pub fn try_load_group_vars(path: &Path) -> Result<GroupVars> {
    if !path.exists() {
        return Ok(GroupVars::default());
    }
    let content = fs::read_to_string(path).map_err(|e| LoadError::io(path, e))?;
    let malformed = |reason: String| LoadError::GroupVarsMalformed {
        path: path.to_path_buf(),
        reason,
    };

    let document: Value = serde_yaml::from_str(&content).map_err(|e| malformed(e.to_string()))?;
    match document {
        Value::Null => Ok(GroupVars::default()),
        Value::Mapping(_) => {
            serde_yaml::from_value(document).map_err(|e| malformed(e.to_string()))
        }
        other => Err(malformed(format!(
            "expected a mapping of group names, found {}",
            value_kind(&other)
        ))),
    }
}
