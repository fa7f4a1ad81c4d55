//! Core types for provisioning plans and their execution

use crate::ansible::AnsibleOptions;
use inventory::{GroupMap, StorageSpec};
use serde::Serialize;
use serde_yaml::Mapping;
use std::fmt;

// ============================================================================
// Plan
// ============================================================================

/// Provider-agnostic VM definition, the sizing part of a plan
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VmDefinition {
    /// VM name as registered with the hypervisor (the FQDN)
    pub name: String,
    pub hostname: String,
    #[serde(rename = "box")]
    pub box_image: String,
    /// Memory in MiB
    pub memory: u32,
    pub cpus: u32,
}

/// Ordered provisioning steps for one host
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProvisioningPlan {
    pub hostname: String,
    pub fqdn: String,
    pub vm: VmDefinition,
    pub actions: Vec<Action>,
}

impl ProvisioningPlan {
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }
}

/// One discrete backend operation
///
/// Serialized with the variant name under `type`, next to the fields of the
/// step itself.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    AttachStorage(StorageAttachment),
    AttachNetwork(NetworkAttachment),
    RunConfigManagement(ConfigManagementRun),
    RunShell(ShellScript),
    RunTestSuite(TestSuiteStep),
}

impl Action {
    /// Short action type name, used for grouping and filtering
    pub fn action_type(&self) -> &'static str {
        match self {
            Self::AttachStorage(_) => "storage",
            Self::AttachNetwork(_) => "network",
            Self::RunConfigManagement(_) => "ansible",
            Self::RunShell(_) => "shell",
            Self::RunTestSuite(_) => "test",
        }
    }

    /// Human-readable description
    pub fn description(&self) -> String {
        match self {
            Self::AttachStorage(disk) => match (&disk.spec.path, &disk.spec.device) {
                (Some(path), _) => format!("Attach disk image {path}"),
                (None, Some(device)) => format!("Attach block device {device}"),
                (None, None) => format!("Attach storage #{}", disk.index),
            },
            Self::AttachNetwork(net) => format!("Attach {} #{}", net.kind, net.index),
            Self::RunConfigManagement(run) => format!("Run playbook {}", run.playbook),
            Self::RunShell(script) => format!("Run shell {script}"),
            Self::RunTestSuite(step) => {
                format!("{} {}: {}", step.phase, step.framework, step.script)
            }
        }
    }
}

/// Storage attachment, in declared order
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StorageAttachment {
    /// Position among the host's storage entries
    pub index: usize,
    #[serde(flatten)]
    pub spec: StorageSpec,
}

impl StorageAttachment {
    /// Guest device name: the declared one, or `vdb`, `vdc`, ... by position
    pub fn target_device(&self) -> String {
        self.spec.device.clone().unwrap_or_else(|| {
            let letter = (b'b' + (self.index % 25) as u8) as char;
            format!("vd{letter}")
        })
    }
}

/// Network attachment with validated option keys
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NetworkAttachment {
    /// Position among the host's well-formed networks
    pub index: usize,
    /// Network mode, e.g. `private_network`, `public_network`
    pub kind: String,
    pub options: Mapping,
}

impl NetworkAttachment {
    /// String value of an option
    pub fn option(&self, key: &str) -> Option<&str> {
        self.options.get(key).and_then(|v| v.as_str())
    }
}

/// A configuration-management (Ansible) run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfigManagementRun {
    pub playbook: String,
    pub options: AnsibleOptions,
    /// Host the run is limited to, and the only host `host_vars` apply to
    pub host: String,
    pub host_vars: Mapping,
    /// Full group map, computed and externally supplied
    pub groups: GroupMap,
}

/// A shell step, from a script file or inline text
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ShellScript {
    Path(String),
    Inline(String),
}

impl fmt::Display for ShellScript {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Path(path) => write!(f, "script {path}"),
            Self::Inline(text) => write!(f, "inline `{text}`"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TestFramework {
    Bats,
    Serverspec,
}

impl fmt::Display for TestFramework {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bats => f.write_str("bats"),
            Self::Serverspec => f.write_str("serverspec"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TestPhase {
    /// Install the test runner
    Install,
    /// Execute the suite
    Run,
}

impl fmt::Display for TestPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Install => f.write_str("Install"),
            Self::Run => f.write_str("Run"),
        }
    }
}

/// One step of a test-suite run, executed as a shell step
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TestSuiteStep {
    pub framework: TestFramework,
    pub phase: TestPhase,
    pub script: ShellScript,
}

// ============================================================================
// Execution
// ============================================================================

/// What to do with the remaining hosts once one host fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecPolicy {
    /// Stop the run at the first failing host
    #[default]
    FailFast,
    /// Record the failure and apply the remaining hosts
    ContinueOnError,
}

/// Options for execution
#[derive(Debug, Clone, Default)]
pub struct ExecuteOptions {
    pub policy: ExecPolicy,
    /// Register hostnames of the whole host set before applying plans
    pub register_hosts: bool,
}

/// Result of a single action
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    Applied,
    Skipped { reason: String },
}

/// Outcomes for one host, in plan order
#[derive(Debug, Clone, Default)]
pub struct HostReport {
    pub fqdn: String,
    pub outcomes: Vec<(String, ActionOutcome)>,
}

impl HostReport {
    pub fn new(fqdn: &str) -> Self {
        Self {
            fqdn: fqdn.to_string(),
            outcomes: Vec::new(),
        }
    }

    pub fn applied(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, o)| *o == ActionOutcome::Applied)
            .count()
    }

    pub fn skipped(&self) -> usize {
        self.outcomes.len() - self.applied()
    }
}

/// A host whose plan failed
#[derive(Debug, Clone)]
pub struct HostFailure {
    pub fqdn: String,
    pub error: String,
}

/// Summary of a whole run
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub hosts: Vec<HostReport>,
    pub failures: Vec<HostFailure>,
}

impl RunReport {
    /// Check if every host was applied without failure
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn applied(&self) -> usize {
        self.hosts.iter().map(HostReport::applied).sum()
    }

    pub fn skipped(&self) -> usize {
        self.hosts.iter().map(HostReport::skipped).sum()
    }

    /// Total number of hosts processed, failed or not
    pub fn total_hosts(&self) -> usize {
        self.hosts.len() + self.failures.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_device() {
        let named = StorageAttachment {
            index: 0,
            spec: StorageSpec {
                device: Some("vdz".into()),
                ..Default::default()
            },
        };
        let positional = StorageAttachment {
            index: 2,
            spec: StorageSpec {
                path: Some("data.qcow2".into()),
                ..Default::default()
            },
        };
        assert_eq!(named.target_device(), "vdz");
        assert_eq!(positional.target_device(), "vdd");
    }

    #[test]
    fn test_report_counts() {
        let mut host = HostReport::new("a.localdomain");
        host.outcomes.push(("one".into(), ActionOutcome::Applied));
        host.outcomes.push((
            "two".into(),
            ActionOutcome::Skipped {
                reason: "unsupported".into(),
            },
        ));
        let report = RunReport {
            hosts: vec![host],
            failures: vec![HostFailure {
                fqdn: "b.localdomain".into(),
                error: "boom".into(),
            }],
        };
        assert_eq!(report.applied(), 1);
        assert_eq!(report.skipped(), 1);
        assert_eq!(report.total_hosts(), 2);
        assert!(!report.is_success());
    }
}
