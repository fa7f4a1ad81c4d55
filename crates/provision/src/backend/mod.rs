//! Backend abstraction over hypervisors and provisioning tools.
//!
//! The [`Backend`] trait names the capabilities a plan needs: defining and
//! starting VMs, attaching networks and storage, running shell steps and
//! Ansible, and registering hostnames. [`CliBackend`] implements it by
//! combining a hypervisor [`Provider`] (which renders provider-specific
//! commands) with a [`CommandRunner`] (which executes or records them).

pub mod ansible_inventory;
pub mod libvirt;
pub mod runner;
pub mod virtualbox;

use crate::error::{ExecError, Result};
use crate::types::{
    ConfigManagementRun, NetworkAttachment, ShellScript, StorageAttachment, VmDefinition,
};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

pub use libvirt::LibvirtProvider;
pub use runner::{CommandOutput, CommandRunner, CommandSpec, ProcessRunner, RecordingRunner};
pub use virtualbox::VirtualBoxProvider;

/// Supported hypervisor providers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Libvirt,
    VirtualBox,
}

impl ProviderKind {
    /// Construct the provider implementation
    pub fn provider(self) -> Box<dyn Provider> {
        match self {
            Self::Libvirt => Box::new(LibvirtProvider),
            Self::VirtualBox => Box::new(VirtualBoxProvider),
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Libvirt => f.write_str("libvirt"),
            Self::VirtualBox => f.write_str("virtualbox"),
        }
    }
}

/// Optional capabilities a provider may lack
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    /// Attaching extra disks
    Storage,
    /// Registering hostnames with the hypervisor's DNS
    HostDns,
}

/// Network kinds every provider can attach
pub const NETWORK_KINDS: &[&str] = &["private_network", "public_network"];

/// A host as seen by name registration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostEntry {
    pub hostname: String,
    pub fqdn: String,
    pub ip: Option<String>,
}

/// Hypervisor-specific command rendering
///
/// Sizing comes from the shared [`VmDefinition`], so every provider gets the
/// same memory and CPU values. Storage and DNS are extension points that only
/// some providers implement.
pub trait Provider {
    fn kind(&self) -> ProviderKind;

    fn supports(&self, capability: Capability) -> bool;

    /// Whether [`Provider::attach_network`] can render this network kind
    fn supports_network(&self, kind: &str) -> bool {
        NETWORK_KINDS.contains(&kind)
    }

    /// Commands that create the VM from its box and apply sizing
    fn define_vm(&self, vm: &VmDefinition) -> Vec<CommandSpec>;

    /// Commands that boot a defined VM
    fn start_vm(&self, vm: &VmDefinition) -> Vec<CommandSpec>;

    fn attach_network(
        &self,
        vm: &VmDefinition,
        network: &NetworkAttachment,
    ) -> Result<Vec<CommandSpec>>;

    /// Commands that create (if needed) and attach a disk
    ///
    /// `disks_dir` holds images for entries that do not name a path.
    fn attach_storage(
        &self,
        vm: &VmDefinition,
        disk: &StorageAttachment,
        disks_dir: &Path,
    ) -> Result<Vec<CommandSpec>> {
        let _ = (vm, disk, disks_dir);
        Err(self.unsupported("storage attachment"))
    }

    /// Commands that register a host with the hypervisor's DNS
    fn register_host(&self, host: &HostEntry) -> Vec<CommandSpec> {
        let _ = host;
        Vec::new()
    }

    fn unsupported(&self, what: &str) -> ExecError {
        ExecError::Unsupported {
            provider: self.kind().to_string(),
            what: what.to_string(),
        }
    }
}

/// The named capabilities the executor delegates actions to
pub trait Backend {
    fn provider(&self) -> ProviderKind;

    fn supports(&self, capability: Capability) -> bool;

    fn supports_network(&self, kind: &str) -> bool;

    fn define_vm(&self, vm: &VmDefinition) -> Result<()>;

    fn start_vm(&self, vm: &VmDefinition) -> Result<()>;

    fn attach_network(&self, vm: &VmDefinition, network: &NetworkAttachment) -> Result<()>;

    fn attach_storage(&self, vm: &VmDefinition, disk: &StorageAttachment) -> Result<()>;

    fn run_shell(&self, vm: &VmDefinition, script: &ShellScript) -> Result<()>;

    fn run_config_management(&self, vm: &VmDefinition, run: &ConfigManagementRun)
    -> Result<()>;

    /// Register hostnames and FQDNs of the whole host set
    fn register_hosts(&self, hosts: &[HostEntry]) -> Result<()>;
}

/// Backend that drives external command-line tools
pub struct CliBackend<R: CommandRunner> {
    provider: Box<dyn Provider>,
    runner: R,
    /// Directory for generated files (Ansible inventory, hosts file, disks)
    state_dir: PathBuf,
    /// Host addresses, used for `ansible_host` in the generated inventory
    ansible_hosts: Vec<HostEntry>,
}

impl<R: CommandRunner> CliBackend<R> {
    pub fn new(kind: ProviderKind, runner: R, state_dir: impl Into<PathBuf>) -> Self {
        Self {
            provider: kind.provider(),
            runner,
            state_dir: state_dir.into(),
            ansible_hosts: Vec::new(),
        }
    }

    /// Hosts known to the generated Ansible inventory (for `ansible_host`)
    pub fn with_hosts(mut self, hosts: Vec<HostEntry>) -> Self {
        self.ansible_hosts = hosts;
        self
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    pub fn state_dir(&self) -> &Path {
        &self.state_dir
    }

    fn run_all(&self, commands: &[CommandSpec]) -> Result<()> {
        for command in commands {
            self.runner.run(command)?;
        }
        Ok(())
    }

    /// Write a generated file, unless this is a dry run
    fn write_state_file(&self, name: &str, content: &str) -> Result<PathBuf> {
        let path = self.state_dir.join(name);
        if self.runner.is_dry_run() {
            log::info!("[dry-run] would write {}", path.display());
            return Ok(path);
        }
        fs::create_dir_all(&self.state_dir).map_err(|e| ExecError::io(&self.state_dir, e))?;
        fs::write(&path, content).map_err(|e| ExecError::io(&path, e))?;
        Ok(path)
    }

    fn ip_of(&self, fqdn: &str) -> Option<&str> {
        self.ansible_hosts
            .iter()
            .find(|h| h.fqdn == fqdn)
            .and_then(|h| h.ip.as_deref())
    }
}

fn ssh(vm: &VmDefinition) -> CommandSpec {
    CommandSpec::new("ssh")
        .args(["-o", "BatchMode=yes"])
        .arg(vm.name.clone())
}

impl<R: CommandRunner> Backend for CliBackend<R> {
    fn provider(&self) -> ProviderKind {
        self.provider.kind()
    }

    fn supports(&self, capability: Capability) -> bool {
        self.provider.supports(capability)
    }

    fn supports_network(&self, kind: &str) -> bool {
        self.provider.supports_network(kind)
    }

    fn define_vm(&self, vm: &VmDefinition) -> Result<()> {
        self.run_all(&self.provider.define_vm(vm))
    }

    fn start_vm(&self, vm: &VmDefinition) -> Result<()> {
        self.run_all(&self.provider.start_vm(vm))
    }

    fn attach_network(&self, vm: &VmDefinition, network: &NetworkAttachment) -> Result<()> {
        self.run_all(&self.provider.attach_network(vm, network)?)
    }

    fn attach_storage(&self, vm: &VmDefinition, disk: &StorageAttachment) -> Result<()> {
        let disks_dir = self.state_dir.join("disks");
        let commands = self.provider.attach_storage(vm, disk, &disks_dir)?;
        if !self.runner.is_dry_run() {
            fs::create_dir_all(&disks_dir).map_err(|e| ExecError::io(&disks_dir, e))?;
        }
        self.run_all(&commands)
    }

    fn run_shell(&self, vm: &VmDefinition, script: &ShellScript) -> Result<()> {
        let command = match script {
            ShellScript::Path(path) => ssh(vm).args(["sudo", "bash", "-s"]).stdin_file(path),
            ShellScript::Inline(text) => ssh(vm).args(["sudo", "bash", "-c"]).arg(text.clone()),
        };
        self.runner.run(&command).map(|_| ())
    }

    fn run_config_management(&self, vm: &VmDefinition, run: &ConfigManagementRun) -> Result<()> {
        let content = ansible_inventory::render(run, self.ip_of(&run.host));
        let inventory = self.write_state_file("ansible_inventory", &content)?;

        if let Some(role_file) = &run.options.galaxy_role_file {
            let mut galaxy = CommandSpec::new("ansible-galaxy")
                .arg("install")
                .arg(format!("--role-file={role_file}"));
            if let Some(roles_path) = &run.options.galaxy_roles_path {
                galaxy = galaxy.arg(format!("--roles-path={roles_path}"));
            }
            self.runner.run(&galaxy)?;
        }

        let limit = run.options.limit.clone().unwrap_or_else(|| vm.name.clone());
        let mut playbook = CommandSpec::new("ansible-playbook")
            .arg(format!("--inventory-file={}", inventory.display()))
            .arg(format!("--limit={limit}"))
            .args(run.options.playbook_args())
            .arg(run.playbook.clone());
        for (key, value) in run.options.env() {
            playbook = playbook.env(key, value);
        }
        self.runner.run(&playbook).map(|_| ())
    }

    fn register_hosts(&self, hosts: &[HostEntry]) -> Result<()> {
        let content = ansible_inventory::render_hosts_file(hosts);
        self.write_state_file("hosts", &content)?;

        if self.provider.supports(Capability::HostDns) {
            for host in hosts {
                self.run_all(&self.provider.register_host(host))?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ansible::AnsibleOptions;
    use inventory::GroupMap;
    use serde_yaml::Mapping;
    use tempfile::TempDir;

    fn vm() -> VmDefinition {
        VmDefinition {
            name: "web.lab.test".into(),
            hostname: "web".into(),
            box_image: "centos/7".into(),
            memory: 2048,
            cpus: 2,
        }
    }

    #[test]
    fn test_shell_forms() {
        let backend = CliBackend::new(ProviderKind::Libvirt, RecordingRunner::new(), "/tmp/x");
        backend
            .run_shell(&vm(), &ShellScript::Path("setup.sh".into()))
            .unwrap();
        backend
            .run_shell(&vm(), &ShellScript::Inline("echo hi".into()))
            .unwrap();

        assert_eq!(
            backend.runner().rendered(),
            vec![
                "ssh -o BatchMode=yes web.lab.test sudo bash -s < setup.sh",
                "ssh -o BatchMode=yes web.lab.test sudo bash -c 'echo hi'",
            ]
        );
    }

    #[test]
    fn test_config_management_writes_inventory() {
        let dir = TempDir::new().unwrap();
        let backend = CliBackend::new(ProviderKind::VirtualBox, ProcessRunner::default(), dir.path());
        let recorder = CliBackend::new(ProviderKind::VirtualBox, RecordingRunner::new(), dir.path())
            .with_hosts(vec![HostEntry {
                hostname: "web".into(),
                fqdn: "web.lab.test".into(),
                ip: Some("10.0.0.5".into()),
            }]);

        let run = ConfigManagementRun {
            playbook: "site.yml".into(),
            options: AnsibleOptions {
                tags: vec!["app".into()],
                config_file: Some("ansible.cfg".into()),
                ..Default::default()
            },
            host: "web.lab.test".into(),
            host_vars: Mapping::new(),
            groups: GroupMap::new(),
        };

        recorder.run_config_management(&vm(), &run).unwrap();
        let inventory_path = dir.path().join("ansible_inventory");
        assert_eq!(
            recorder.runner().rendered(),
            vec![format!(
                "ANSIBLE_CONFIG=ansible.cfg ansible-playbook --inventory-file={} --limit=web.lab.test --tags=app site.yml",
                inventory_path.display()
            )]
        );
        // Dry runs leave no files behind
        assert!(!inventory_path.exists());

        backend
            .write_state_file("ansible_inventory", "web.lab.test\n")
            .unwrap();
        assert!(inventory_path.exists());
    }

    #[test]
    fn test_register_hosts_uses_dns_only_where_supported() {
        let hosts = vec![HostEntry {
            hostname: "web".into(),
            fqdn: "web.lab.test".into(),
            ip: Some("10.0.0.5".into()),
        }];

        let libvirt = CliBackend::new(ProviderKind::Libvirt, RecordingRunner::new(), "/tmp/x");
        libvirt.register_hosts(&hosts).unwrap();
        assert_eq!(libvirt.runner().commands().len(), 1);

        let vbox = CliBackend::new(ProviderKind::VirtualBox, RecordingRunner::new(), "/tmp/x");
        vbox.register_hosts(&hosts).unwrap();
        assert!(vbox.runner().commands().is_empty());
    }
}
