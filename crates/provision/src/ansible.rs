//! Typed Ansible provisioner options
//!
//! Option bags from the inventory go through a closed table of recognized
//! names. Each name maps to a setter on [`AnsibleOptions`]; anything else is
//! reported and dropped instead of being forwarded blindly.

use inventory::{DiagnosticKind, Diagnostics};
use serde::Serialize;
use serde_yaml::{Mapping, Value};

/// Options for one `ansible-playbook` run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AnsibleOptions {
    /// Verbosity flag without the dash, e.g. `v` or `vvv`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verbose: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub skip_tags: Vec<String>,
    /// Overrides the default limit of the run's own host
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<String>,
    /// Already converted to JSON, the form `--extra-vars` takes
    #[serde(skip_serializing_if = "serde_json::Map::is_empty")]
    pub extra_vars: serde_json::Map<String, serde_json::Value>,
    #[serde(rename = "become")]
    pub become_root: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub become_user: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub galaxy_role_file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub galaxy_roles_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vault_password_file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_at_task: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host_key_checking: Option<bool>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub raw_arguments: Vec<String>,
}

type Setter = fn(&mut AnsibleOptions, &Value) -> Result<(), String>;

/// Recognized option names and their setters
const SETTERS: &[(&str, Setter)] = &[
    ("verbose", |o, v| {
        o.verbose = verbosity(v)?;
        Ok(())
    }),
    ("tags", |o, v| {
        o.tags = string_list(v)?;
        Ok(())
    }),
    ("skip_tags", |o, v| {
        o.skip_tags = string_list(v)?;
        Ok(())
    }),
    ("limit", |o, v| {
        o.limit = Some(string_list(v)?.join(","));
        Ok(())
    }),
    ("extra_vars", |o, v| {
        let vars = v.as_mapping().ok_or("expected a mapping")?;
        match serde_json::to_value(vars).map_err(|e| format!("not expressible as JSON: {e}"))? {
            serde_json::Value::Object(map) => o.extra_vars = map,
            _ => return Err("expected a mapping".to_string()),
        }
        Ok(())
    }),
    ("become", |o, v| {
        o.become_root = v.as_bool().ok_or("expected a boolean")?;
        Ok(())
    }),
    ("sudo", |o, v| {
        o.become_root = v.as_bool().ok_or("expected a boolean")?;
        Ok(())
    }),
    ("become_user", |o, v| {
        o.become_user = Some(string(v)?);
        Ok(())
    }),
    ("sudo_user", |o, v| {
        o.become_user = Some(string(v)?);
        Ok(())
    }),
    ("config_file", |o, v| {
        o.config_file = Some(string(v)?);
        Ok(())
    }),
    ("galaxy_role_file", |o, v| {
        o.galaxy_role_file = Some(string(v)?);
        Ok(())
    }),
    ("galaxy_roles_path", |o, v| {
        o.galaxy_roles_path = Some(string(v)?);
        Ok(())
    }),
    ("vault_password_file", |o, v| {
        o.vault_password_file = Some(string(v)?);
        Ok(())
    }),
    ("start_at_task", |o, v| {
        o.start_at_task = Some(string(v)?);
        Ok(())
    }),
    ("host_key_checking", |o, v| {
        o.host_key_checking = Some(v.as_bool().ok_or("expected a boolean")?);
        Ok(())
    }),
    ("raw_arguments", |o, v| {
        o.raw_arguments = string_list(v)?;
        Ok(())
    }),
];

/// Names accepted in `ansibleOptions`
pub fn recognized_options() -> impl Iterator<Item = &'static str> {
    SETTERS.iter().map(|(name, _)| *name)
}

fn string(value: &Value) -> Result<String, String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        _ => Err("expected a string".to_string()),
    }
}

fn string_list(value: &Value) -> Result<Vec<String>, String> {
    match value {
        Value::String(s) => Ok(s
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()),
        Value::Sequence(items) => items.iter().map(string).collect(),
        _ => Err("expected a string or a list of strings".to_string()),
    }
}

fn verbosity(value: &Value) -> Result<Option<String>, String> {
    match value {
        Value::Bool(true) => Ok(Some("v".to_string())),
        Value::Bool(false) => Ok(None),
        Value::String(s) => {
            let flag = s.trim_start_matches('-');
            if flag.is_empty() {
                Ok(None)
            } else if flag.chars().all(|c| c == 'v') {
                Ok(Some(flag.to_string()))
            } else {
                Err(format!("invalid verbosity '{s}'"))
            }
        }
        _ => Err("expected a boolean or a string like 'vv'".to_string()),
    }
}

impl AnsibleOptions {
    /// Build options from a raw bag, reporting unknown and invalid entries
    pub fn from_bag(bag: &Mapping, subject: &str, diags: &mut Diagnostics) -> Self {
        let mut options = Self::default();

        for (key, value) in bag {
            let Some(name) = key.as_str().map(|k| k.trim_start_matches(':')) else {
                diags.warn(
                    DiagnosticKind::UnknownOption,
                    subject,
                    format!("ansible option key {key:?} is not a name; ignored"),
                );
                continue;
            };

            match SETTERS.iter().find(|(known, _)| *known == name) {
                Some((_, setter)) => {
                    if let Err(reason) = setter(&mut options, value) {
                        diags.warn(
                            DiagnosticKind::InvalidOption,
                            subject,
                            format!("ansible option '{name}': {reason}; ignored"),
                        );
                    }
                }
                None => diags.warn(
                    DiagnosticKind::UnknownOption,
                    subject,
                    format!(
                        "unknown ansible option '{name}'; ignored (known: {})",
                        recognized_options().collect::<Vec<_>>().join(", ")
                    ),
                ),
            }
        }

        options
    }

    /// Command-line flags for `ansible-playbook`, excluding inventory and limit
    pub fn playbook_args(&self) -> Vec<String> {
        let mut args = Vec::new();

        if let Some(level) = &self.verbose {
            args.push(format!("-{level}"));
        }
        if !self.tags.is_empty() {
            args.push(format!("--tags={}", self.tags.join(",")));
        }
        if !self.skip_tags.is_empty() {
            args.push(format!("--skip-tags={}", self.skip_tags.join(",")));
        }
        if !self.extra_vars.is_empty() {
            // JSON keeps nested structures intact on the command line
            let json = serde_json::Value::Object(self.extra_vars.clone());
            args.push(format!("--extra-vars={json}"));
        }
        if self.become_root {
            args.push("--become".to_string());
        }
        if let Some(user) = &self.become_user {
            args.push(format!("--become-user={user}"));
        }
        if let Some(file) = &self.vault_password_file {
            args.push(format!("--vault-password-file={file}"));
        }
        if let Some(task) = &self.start_at_task {
            args.push(format!("--start-at-task={task}"));
        }
        args.extend(self.raw_arguments.iter().cloned());
        args
    }

    /// Environment variables for the `ansible-playbook` process
    pub fn env(&self) -> Vec<(String, String)> {
        let mut env = Vec::new();
        if let Some(config) = &self.config_file {
            env.push(("ANSIBLE_CONFIG".to_string(), config.clone()));
        }
        if let Some(checking) = self.host_key_checking {
            env.push((
                "ANSIBLE_HOST_KEY_CHECKING".to_string(),
                checking.to_string(),
            ));
        }
        env
    }
}
