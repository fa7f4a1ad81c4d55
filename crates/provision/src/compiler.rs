//! Plan compilation
//!
//! Turns each resolved host into an ordered [`ProvisioningPlan`]. Problems
//! in a host's declaration never fail compilation: the affected unit is
//! skipped and a diagnostic is recorded.
//!
//! Action order is fixed: storage, networks, configuration management,
//! shell (path, then inline), then test suites (bats, then serverspec).

use crate::ansible::AnsibleOptions;
use crate::error::Result;
use crate::testdeps::{DependencyInstaller, ensure_serverspec_dependencies};
use crate::types::{
    Action, ConfigManagementRun, NetworkAttachment, ProvisioningPlan, ShellScript,
    StorageAttachment, TestFramework, TestPhase, TestSuiteStep, VmDefinition,
};
use inventory::{
    DiagnosticKind, Diagnostics, HostSpec, ResolvedHost, ResolvedModel, StorageKind,
};
use regex::Regex;
use serde_yaml::{Mapping, Value};
use std::path::PathBuf;
use std::sync::LazyLock;

/// Network option keys must be identifiers, optionally symbol-style
static OPTION_KEY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^:?[A-Za-z_][A-Za-z0-9_]*$").expect("Invalid option key regex")
});

/// Installs the bats runner in the guest unless already present
pub const BATS_INSTALL: &str = "command -v bats >/dev/null 2>&1 || \
(git clone --depth 1 https://github.com/bats-core/bats-core.git /tmp/bats-core \
&& /tmp/bats-core/install.sh /usr/local)";

/// Compile one host into its plan
pub fn compile(
    host: &ResolvedHost<'_>,
    model: &ResolvedModel<'_>,
    diags: &mut Diagnostics,
) -> ProvisioningPlan {
    let spec = host.spec;
    let subject = host.fqdn.as_str();

    let mut actions = Vec::new();
    actions.extend(storage_actions(spec, subject, diags));
    actions.extend(network_actions(spec, subject, diags));
    actions.extend(config_management_action(host, model, diags));
    actions.extend(shell_actions(spec));
    actions.extend(test_suite_actions(spec));

    ProvisioningPlan {
        hostname: spec.hostname.clone(),
        fqdn: host.fqdn.clone(),
        vm: VmDefinition {
            name: host.fqdn.clone(),
            hostname: spec.hostname.clone(),
            box_image: host.box_image().to_string(),
            memory: host.memory(),
            cpus: host.cpus(),
        },
        actions,
    }
}

fn storage_actions(spec: &HostSpec, subject: &str, diags: &mut Diagnostics) -> Vec<Action> {
    spec.storage
        .iter()
        .enumerate()
        .map(|(index, storage)| {
            if storage.kind() == StorageKind::Unspecified {
                diags.warn(
                    DiagnosticKind::IncompleteStorage,
                    subject,
                    format!("storage #{index} names neither device nor path"),
                );
            }
            Action::AttachStorage(StorageAttachment {
                index,
                spec: storage.clone(),
            })
        })
        .collect()
}

fn network_actions(spec: &HostSpec, subject: &str, diags: &mut Diagnostics) -> Vec<Action> {
    let mut actions = Vec::new();

    for (position, network) in spec.networks.iter().enumerate() {
        let (kind, raw_options) = match network.resolve() {
            Ok(resolved) => resolved,
            Err(e) => {
                diags.warn(
                    DiagnosticKind::MalformedNetwork,
                    subject,
                    format!("network #{position}: {e}; skipped"),
                );
                continue;
            }
        };

        let mut options = Mapping::new();
        for (key, value) in raw_options {
            match key.as_str().filter(|k| OPTION_KEY.is_match(k)) {
                Some(name) => {
                    options.insert(
                        Value::String(name.trim_start_matches(':').to_string()),
                        value.clone(),
                    );
                }
                None => diags.warn(
                    DiagnosticKind::NonIdentifierKey,
                    subject,
                    format!("network '{kind}' option key {key:?} is not an identifier; dropped"),
                ),
            }
        }

        actions.push(Action::AttachNetwork(NetworkAttachment {
            index: actions.len(),
            kind: kind.to_string(),
            options,
        }));
    }

    actions
}

fn config_management_action(
    host: &ResolvedHost<'_>,
    model: &ResolvedModel<'_>,
    diags: &mut Diagnostics,
) -> Option<Action> {
    let spec = host.spec;
    let Some(playbook) = &spec.ansible_playbook else {
        if !spec.ansible_options.is_empty() || !spec.ansible_host_vars.is_empty() {
            diags.warn(
                DiagnosticKind::OrphanProvisionerOptions,
                &host.fqdn,
                "ansible options or host vars declared without ansiblePlaybook; ignored",
            );
        }
        return None;
    };

    Some(Action::RunConfigManagement(ConfigManagementRun {
        playbook: playbook.clone(),
        options: AnsibleOptions::from_bag(&spec.ansible_options, &host.fqdn, diags),
        host: host.fqdn.clone(),
        host_vars: spec.ansible_host_vars.clone(),
        groups: model.groups.clone(),
    }))
}

fn shell_actions(spec: &HostSpec) -> Vec<Action> {
    let path = spec.shell_path.clone().map(ShellScript::Path);
    let inline = spec.shell_inline.clone().map(ShellScript::Inline);
    path.into_iter().chain(inline).map(Action::RunShell).collect()
}

fn test_suite_actions(spec: &HostSpec) -> Vec<Action> {
    let mut actions = Vec::new();

    if let Some(path) = &spec.bats_path {
        actions.push(Action::RunTestSuite(TestSuiteStep {
            framework: TestFramework::Bats,
            phase: TestPhase::Install,
            script: ShellScript::Inline(BATS_INSTALL.to_string()),
        }));
        actions.push(Action::RunTestSuite(TestSuiteStep {
            framework: TestFramework::Bats,
            phase: TestPhase::Run,
            script: ShellScript::Inline(format!("bats {path}")),
        }));
    }

    if spec.serverspec
        && let Some(path) = &spec.serverspec_path
    {
        actions.push(Action::RunTestSuite(TestSuiteStep {
            framework: TestFramework::Serverspec,
            phase: TestPhase::Run,
            script: ShellScript::Inline(format!("rspec {path}")),
        }));
    }

    actions
}

/// Batch compiler for a whole model
///
/// Unlike [`compile`], this may touch the project directory: when any
/// selected host wants serverspec and an installer is configured, the
/// dependency manifest is ensured before any plan is returned.
pub struct Compiler {
    project_dir: PathBuf,
    installer: Option<Box<dyn DependencyInstaller>>,
}

impl Compiler {
    /// A compiler that never touches test dependencies
    pub fn new(project_dir: impl Into<PathBuf>) -> Self {
        Self {
            project_dir: project_dir.into(),
            installer: None,
        }
    }

    pub fn with_installer(mut self, installer: impl DependencyInstaller + 'static) -> Self {
        self.installer = Some(Box::new(installer));
        self
    }

    /// Compile every host matching `filter` (hostname or FQDN), in order
    pub fn compile_all(
        &self,
        model: &ResolvedModel<'_>,
        filter: Option<&str>,
        diags: &mut Diagnostics,
    ) -> Result<Vec<ProvisioningPlan>> {
        let selected: Vec<&ResolvedHost<'_>> = model
            .hosts
            .iter()
            .filter(|host| filter.is_none_or(|name| host.matches(name)))
            .collect();

        if let Some(installer) = &self.installer
            && selected.iter().any(|host| host.spec.wants_serverspec())
        {
            ensure_serverspec_dependencies(&self.project_dir, installer.as_ref())?;
        }

        Ok(selected
            .into_iter()
            .map(|host| compile(host, model, diags))
            .collect())
    }
}
