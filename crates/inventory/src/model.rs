//! Inventory model resolution - effective domains, FQDNs and groups

use crate::diagnostics::{DiagnosticKind, Diagnostics};
use crate::loader::{DEFAULT_BOX, DEFAULT_CPUS, DEFAULT_MEMORY};
use crate::types::{GroupVars, HostSpec, Inventory};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_yaml::Value;
use std::collections::HashSet;

/// Domain used when neither the globals entry nor any host sets one
pub const DEFAULT_DOMAIN: &str = "localdomain";

/// A host with its defaults and naming resolved
#[derive(Debug, Clone)]
pub struct ResolvedHost<'a> {
    pub spec: &'a HostSpec,
    /// Effective domain after carry-forward
    pub domain: String,
    pub fqdn: String,
}

impl ResolvedHost<'_> {
    pub fn hostname(&self) -> &str {
        &self.spec.hostname
    }

    pub fn box_image(&self) -> &str {
        self.spec.box_image.as_deref().unwrap_or(DEFAULT_BOX)
    }

    pub fn memory(&self) -> u32 {
        self.spec.memory.unwrap_or(DEFAULT_MEMORY)
    }

    pub fn cpus(&self) -> u32 {
        self.spec.cpus.unwrap_or(DEFAULT_CPUS)
    }

    /// Whether this host matches a hostname or FQDN filter
    pub fn matches(&self, name: &str) -> bool {
        self.spec.hostname == name || self.fqdn == name
    }
}

/// Value of a group entry
#[derive(Debug, Clone, PartialEq)]
pub enum GroupValue {
    /// Member FQDNs computed from host group tags
    Members(Vec<String>),
    /// Externally supplied value, usually a mapping of variables
    External(Value),
}

impl Serialize for GroupValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Members(members) => members.serialize(serializer),
            Self::External(value) => value.serialize(serializer),
        }
    }
}

/// Ordered group name -> value map
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GroupMap {
    entries: Vec<(String, GroupValue)>,
}

impl GroupMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, group: &str) -> Option<&GroupValue> {
        self.entries
            .iter()
            .find(|(name, _)| name == group)
            .map(|(_, value)| value)
    }

    /// Computed members of a group, `None` if absent or externally replaced
    pub fn members(&self, group: &str) -> Option<&[String]> {
        match self.get(group)? {
            GroupValue::Members(members) => Some(members),
            GroupValue::External(_) => None,
        }
    }

    /// Append a member, creating the group on first sight
    pub fn add_member(&mut self, group: &str, fqdn: &str) {
        match self.entries.iter_mut().find(|(name, _)| name == group) {
            Some((_, GroupValue::Members(members))) => members.push(fqdn.to_string()),
            Some((_, value @ GroupValue::External(_))) => {
                *value = GroupValue::Members(vec![fqdn.to_string()]);
            }
            None => self.entries.push((
                group.to_string(),
                GroupValue::Members(vec![fqdn.to_string()]),
            )),
        }
    }

    /// Replace an entry wholesale, keeping its position if it exists
    pub fn replace(&mut self, group: &str, value: GroupValue) {
        match self.entries.iter_mut().find(|(name, _)| name == group) {
            Some((_, existing)) => *existing = value,
            None => self.entries.push((group.to_string(), value)),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &GroupValue)> {
        self.entries.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

impl Serialize for GroupMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, value) in &self.entries {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// Everything derived from the inventory for one run
#[derive(Debug, Clone)]
pub struct ResolvedModel<'a> {
    pub hosts: Vec<ResolvedHost<'a>>,
    pub groups: GroupMap,
}

impl<'a> ResolvedModel<'a> {
    /// FQDN of a declared hostname
    pub fn fqdn_of(&self, hostname: &str) -> Option<&str> {
        self.hosts
            .iter()
            .find(|h| h.spec.hostname == hostname)
            .map(|h| h.fqdn.as_str())
    }

    /// Hostname -> FQDN pairs in document order
    pub fn fqdn_map(&self) -> impl Iterator<Item = (&str, &str)> {
        self.hosts
            .iter()
            .map(|h| (h.spec.hostname.as_str(), h.fqdn.as_str()))
    }

    pub fn find(&self, name: &str) -> Option<&ResolvedHost<'a>> {
        self.hosts.iter().find(|h| h.matches(name))
    }

    pub fn wants_serverspec(&self) -> bool {
        self.hosts.iter().any(|h| h.spec.wants_serverspec())
    }
}

/// Effective domain of every host, in document order
///
/// A host's own `domain` replaces the carried value for itself and every
/// later host; the walk starts from the globals domain or [`DEFAULT_DOMAIN`].
pub fn effective_domains(inventory: &Inventory) -> Vec<String> {
    let start = inventory
        .global_domain()
        .unwrap_or(DEFAULT_DOMAIN)
        .to_string();

    inventory
        .hosts
        .iter()
        .scan(start, |carried, host| {
            if let Some(domain) = &host.domain {
                carried.clone_from(domain);
            }
            Some(carried.clone())
        })
        .collect()
}

/// Resolve the inventory and external group variables into a model
pub fn build<'a>(
    inventory: &'a Inventory,
    group_vars: &GroupVars,
    diags: &mut Diagnostics,
) -> ResolvedModel<'a> {
    let mut seen = HashSet::new();
    let mut hosts = Vec::with_capacity(inventory.hosts.len());

    for (spec, domain) in inventory.hosts.iter().zip(effective_domains(inventory)) {
        let fqdn = format!("{}.{}", spec.hostname, domain);
        if !seen.insert(fqdn.clone()) {
            diags.warn(
                DiagnosticKind::DuplicateHost,
                &spec.hostname,
                format!("FQDN {fqdn} already declared; host skipped"),
            );
            continue;
        }
        hosts.push(ResolvedHost { spec, domain, fqdn });
    }

    let mut groups = GroupMap::new();
    for host in &hosts {
        for group in &host.spec.groups {
            groups.add_member(group, &host.fqdn);
        }
    }

    for (group, value) in group_vars.iter() {
        if groups.get(group).is_some() {
            log::debug!("Group variables replace computed group '{group}'");
        }
        groups.replace(group, GroupValue::External(value.clone()));
    }

    ResolvedModel { hosts, groups }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::GlobalSettings;
    use serde_yaml::Mapping;

    fn host(name: &str, domain: Option<&str>, groups: &[&str]) -> HostSpec {
        HostSpec {
            hostname: name.to_string(),
            domain: domain.map(str::to_string),
            groups: groups.iter().map(|g| (*g).to_string()).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_default_domain() {
        let inventory = Inventory {
            globals: None,
            hosts: vec![host("a", None, &[])],
        };
        let model = build(&inventory, &GroupVars::new(), &mut Diagnostics::new());
        assert_eq!(model.fqdn_of("a"), Some("a.localdomain"));
    }

    #[test]
    fn test_domain_carries_forward() {
        let inventory = Inventory {
            globals: Some(GlobalSettings {
                domain: Some("global.test".into()),
            }),
            hosts: vec![
                host("first", None, &[]),
                host("a", Some("x.org"), &[]),
                host("b", None, &[]),
                host("c", Some("y.org"), &[]),
                host("d", None, &[]),
            ],
        };
        let model = build(&inventory, &GroupVars::new(), &mut Diagnostics::new());

        assert_eq!(model.fqdn_of("first"), Some("first.global.test"));
        assert_eq!(model.fqdn_of("a"), Some("a.x.org"));
        assert_eq!(model.fqdn_of("b"), Some("b.x.org"));
        assert_eq!(model.fqdn_of("c"), Some("c.y.org"));
        assert_eq!(model.fqdn_of("d"), Some("d.y.org"));
    }

    #[test]
    fn test_group_membership_order_and_duplicates() {
        let inventory = Inventory {
            globals: None,
            hosts: vec![
                host("h1", None, &["web", "web"]),
                host("h2", None, &["web", "db"]),
            ],
        };
        let model = build(&inventory, &GroupVars::new(), &mut Diagnostics::new());

        assert_eq!(
            model.groups.members("web"),
            Some(
                &[
                    "h1.localdomain".to_string(),
                    "h1.localdomain".to_string(),
                    "h2.localdomain".to_string()
                ][..]
            )
        );
        assert_eq!(
            model.groups.members("db"),
            Some(&["h2.localdomain".to_string()][..])
        );
    }

    #[test]
    fn test_group_vars_replace_computed_group() {
        let inventory = Inventory {
            globals: None,
            hosts: vec![host("h1", None, &["web"]), host("h2", None, &["web"])],
        };
        let mut vars = Mapping::new();
        vars.insert("http_port".into(), 8080.into());
        let mut group_vars = GroupVars::new();
        group_vars.insert("web", Value::Mapping(vars.clone()));
        group_vars.insert("web:vars", Value::Mapping(vars.clone()));

        let model = build(&inventory, &group_vars, &mut Diagnostics::new());

        assert_eq!(model.groups.members("web"), None);
        assert_eq!(
            model.groups.get("web"),
            Some(&GroupValue::External(Value::Mapping(vars)))
        );
        assert_eq!(model.groups.len(), 2);
        assert_eq!(model.groups.iter().next().map(|(k, _)| k), Some("web"));
    }

    #[test]
    fn test_duplicate_fqdn_is_skipped() {
        let inventory = Inventory {
            globals: None,
            hosts: vec![
                host("a.b", Some("c"), &[]),
                host("a", Some("b.c"), &["web"]),
            ],
        };
        let mut diags = Diagnostics::new();
        let model = build(&inventory, &GroupVars::new(), &mut diags);

        assert_eq!(model.hosts.len(), 1);
        assert!(diags.has(DiagnosticKind::DuplicateHost));
        assert!(model.groups.is_empty());
    }

    #[test]
    fn test_resolved_defaults() {
        let inventory = Inventory {
            globals: None,
            hosts: vec![host("a", None, &[])],
        };
        let model = build(&inventory, &GroupVars::new(), &mut Diagnostics::new());
        let resolved = &model.hosts[0];
        assert_eq!(resolved.box_image(), DEFAULT_BOX);
        assert_eq!(resolved.memory(), DEFAULT_MEMORY);
        assert_eq!(resolved.cpus(), DEFAULT_CPUS);
        assert!(resolved.matches("a"));
        assert!(resolved.matches("a.localdomain"));
    }
}
