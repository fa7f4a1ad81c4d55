//! Generated inventory files
//!
//! `ansible-playbook` reads an INI inventory. Group entries are written in
//! map order: computed members become `[group]` sections, mapping values
//! become `[group:vars]`, and names already ending in `:vars` or `:children`
//! keep their suffix. Host variables appear only on the run's own host.

use super::HostEntry;
use crate::types::ConfigManagementRun;
use inventory::GroupValue;
use serde_yaml::{Mapping, Value};
use std::fmt::Write;

const HEADER: &str = "# Generated by vmplan. Manual edits will be overwritten.\n";

/// Render the INI inventory for one configuration-management run
pub fn render(run: &ConfigManagementRun, ip: Option<&str>) -> String {
    let mut out = String::from(HEADER);

    out.push_str(&run.host);
    if let Some(ip) = ip {
        let _ = write!(out, " ansible_host={ip}");
    }
    for line in vars_lines(&run.host_vars) {
        let _ = write!(out, " {line}");
    }
    out.push('\n');

    for (name, value) in run.groups.iter() {
        match value {
            GroupValue::Members(members) => section(&mut out, name, members.iter().cloned()),
            GroupValue::External(Value::Sequence(items)) => {
                section(&mut out, name, items.iter().filter_map(ini_value));
            }
            GroupValue::External(Value::Mapping(vars)) => {
                let header = if name.ends_with(":vars") {
                    name.to_string()
                } else {
                    format!("{name}:vars")
                };
                section(&mut out, &header, vars_lines(vars));
            }
            GroupValue::External(other) => {
                log::debug!("Group '{name}' has a scalar value {other:?}; not written");
            }
        }
    }

    out
}

fn section(out: &mut String, header: &str, lines: impl Iterator<Item = String>) {
    let _ = write!(out, "\n[{header}]\n");
    for line in lines {
        out.push_str(&line);
        out.push('\n');
    }
}

fn vars_lines(vars: &Mapping) -> impl Iterator<Item = String> + '_ {
    vars.iter().filter_map(|(key, value)| {
        let Some(key) = key.as_str() else {
            log::warn!("Variable key {key:?} is not a name; not written");
            return None;
        };
        let key = key.trim_start_matches(':');
        ini_value(value).map(|value| format!("{key}={value}"))
    })
}

/// Scalars as written; strings with whitespace and nested values as JSON
///
/// Values JSON cannot express, such as mappings with list keys, are left out
/// with a warning.
fn ini_value(value: &Value) -> Option<String> {
    match value {
        Value::Null => Some(String::new()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) if !s.chars().any(char::is_whitespace) => Some(s.clone()),
        other => match serde_json::to_string(other) {
            Ok(json) => Some(json),
            Err(e) => {
                log::warn!("Inventory value {other:?} not written: {e}");
                None
            }
        },
    }
}

/// Render a hosts file mapping addresses to FQDN and short hostname
pub fn render_hosts_file(hosts: &[HostEntry]) -> String {
    let mut out = String::from(HEADER);
    for host in hosts {
        match &host.ip {
            Some(ip) => {
                let _ = writeln!(out, "{ip}\t{} {}", host.fqdn, host.hostname);
            }
            None => log::debug!("{} has no static address; not in hosts file", host.fqdn),
        }
    }
    out
}
