//! libvirt provider (virt-clone, virsh, qemu-img)

use super::{Capability, HostEntry, Provider, ProviderKind};
use super::runner::CommandSpec;
use crate::error::{ExecError, Result};
use crate::types::{NetworkAttachment, StorageAttachment, VmDefinition};
use std::path::{Path, PathBuf};

/// Size used when a disk must be created and its entry gives none
pub const DEFAULT_DISK_SIZE: &str = "10G";

/// libvirt network the VMs attach to by default
const DEFAULT_NETWORK: &str = "default";

pub struct LibvirtProvider;

fn virsh(subcommand: &str) -> CommandSpec {
    CommandSpec::new("virsh").arg(subcommand)
}

impl Provider for LibvirtProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Libvirt
    }

    fn supports(&self, capability: Capability) -> bool {
        matches!(capability, Capability::Storage | Capability::HostDns)
    }

    fn define_vm(&self, vm: &VmDefinition) -> Vec<CommandSpec> {
        let memory = format!("{}M", vm.memory);
        let cpus = vm.cpus.to_string();
        vec![
            CommandSpec::new("virt-clone")
                .arg(format!("--original={}", vm.box_image))
                .arg(format!("--name={}", vm.name))
                .arg("--auto-clone"),
            virsh("setmaxmem").args([vm.name.as_str(), &memory, "--config"]),
            virsh("setmem").args([vm.name.as_str(), &memory, "--config"]),
            virsh("setvcpus").args([vm.name.as_str(), &cpus, "--config", "--maximum"]),
            virsh("setvcpus").args([vm.name.as_str(), &cpus, "--config"]),
        ]
    }

    fn start_vm(&self, vm: &VmDefinition) -> Vec<CommandSpec> {
        vec![virsh("start").arg(vm.name.clone())]
    }

    fn attach_network(
        &self,
        vm: &VmDefinition,
        network: &NetworkAttachment,
    ) -> Result<Vec<CommandSpec>> {
        let (source_type, source) = match network.kind.as_str() {
            "private_network" => (
                "network",
                network.option("network").unwrap_or(DEFAULT_NETWORK),
            ),
            "public_network" => (
                "bridge",
                network
                    .option("bridge")
                    .or_else(|| network.option("dev"))
                    .unwrap_or("br0"),
            ),
            other => return Err(self.unsupported(&format!("network kind '{other}'"))),
        };

        let mut command = virsh("attach-interface")
            .arg(vm.name.clone())
            .args([source_type, source])
            .args(["--model", "virtio", "--config"]);
        if let Some(mac) = network.option("mac") {
            command = command.args(["--mac", mac]);
        }
        Ok(vec![command])
    }

    fn attach_storage(
        &self,
        vm: &VmDefinition,
        disk: &StorageAttachment,
        disks_dir: &Path,
    ) -> Result<Vec<CommandSpec>> {
        let device = disk.target_device();
        let (image, format) = match &disk.spec.path {
            Some(path) => (disks_dir_relative(disks_dir, path), "qcow2"),
            None => (disks_dir.join(format!("{}-{device}.img", vm.name)), "raw"),
        };

        let mut commands = Vec::new();
        if image.exists() {
            if disk.spec.path.is_some() && !disk.spec.allow_existing {
                return Err(ExecError::StorageExists { path: image });
            }
            log::debug!("Reusing disk image {}", image.display());
        } else {
            let size = disk.spec.size.as_ref().map_or_else(
                || {
                    log::warn!(
                        "{}: storage #{} has no size; using {DEFAULT_DISK_SIZE}",
                        vm.name,
                        disk.index
                    );
                    DEFAULT_DISK_SIZE.to_string()
                },
                ToString::to_string,
            );
            commands.push(
                CommandSpec::new("qemu-img")
                    .args(["create", "-f", format])
                    .arg(image.to_string_lossy())
                    .arg(size),
            );
        }

        commands.push(
            virsh("attach-disk")
                .arg(vm.name.clone())
                .arg(image.to_string_lossy())
                .arg(device)
                .args(["--driver", "qemu", "--subdriver", format])
                .args(["--targetbus", "virtio", "--config"]),
        );
        Ok(commands)
    }

    fn register_host(&self, host: &HostEntry) -> Vec<CommandSpec> {
        let Some(ip) = &host.ip else {
            return Vec::new();
        };
        let record = format!(
            "<host ip='{ip}'><hostname>{}</hostname><hostname>{}</hostname></host>",
            host.fqdn, host.hostname
        );
        vec![
            virsh("net-update")
                .args([DEFAULT_NETWORK, "add-last", "dns-host"])
                .arg(record)
                .args(["--live", "--config"]),
        ]
    }
}

/// Relative image paths live under the disks directory
fn disks_dir_relative(disks_dir: &Path, path: &str) -> PathBuf {
    let path = Path::new(path);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        disks_dir.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use inventory::{DiskSize, StorageSpec};
    use serde_yaml::Mapping;
    use tempfile::TempDir;

    fn vm() -> VmDefinition {
        VmDefinition {
            name: "db.lab.test".into(),
            hostname: "db".into(),
            box_image: "centos/7".into(),
            memory: 2048,
            cpus: 2,
        }
    }

    fn rendered(commands: &[CommandSpec]) -> Vec<String> {
        commands.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_define_applies_sizing() {
        let commands = rendered(&LibvirtProvider.define_vm(&vm()));
        assert_eq!(
            commands,
            vec![
                "virt-clone --original=centos/7 --name=db.lab.test --auto-clone",
                "virsh setmaxmem db.lab.test 2048M --config",
                "virsh setmem db.lab.test 2048M --config",
                "virsh setvcpus db.lab.test 2 --config --maximum",
                "virsh setvcpus db.lab.test 2 --config",
            ]
        );
    }

    #[test]
    fn test_device_storage_creates_raw_volume() {
        let dir = TempDir::new().unwrap();
        let disk = StorageAttachment {
            index: 0,
            spec: StorageSpec {
                size: Some(DiskSize::Text("5G".into())),
                device: Some("vdb".into()),
                ..Default::default()
            },
        };

        let commands = LibvirtProvider
            .attach_storage(&vm(), &disk, dir.path())
            .unwrap();
        let image = dir.path().join("db.lab.test-vdb.img");
        assert_eq!(
            rendered(&commands),
            vec![
                format!("qemu-img create -f raw {} 5G", image.display()),
                format!(
                    "virsh attach-disk db.lab.test {} vdb --driver qemu --subdriver raw --targetbus virtio --config",
                    image.display()
                ),
            ]
        );
    }

    #[test]
    fn test_existing_image_requires_allow_existing() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("data.qcow2"), b"").unwrap();

        let mut disk = StorageAttachment {
            index: 1,
            spec: StorageSpec {
                path: Some("data.qcow2".into()),
                ..Default::default()
            },
        };
        assert!(matches!(
            LibvirtProvider.attach_storage(&vm(), &disk, dir.path()),
            Err(ExecError::StorageExists { .. })
        ));

        disk.spec.allow_existing = true;
        let commands = LibvirtProvider
            .attach_storage(&vm(), &disk, dir.path())
            .unwrap();
        assert_eq!(commands.len(), 1);
        assert_eq!(commands[0].args[0], "attach-disk");
        assert!(commands[0].args.contains(&"vdc".to_string()));
    }

    #[test]
    fn test_network_kinds() {
        let mut options = Mapping::new();
        options.insert("mac".into(), "52:54:00:aa:bb:cc".into());
        let private = NetworkAttachment {
            index: 0,
            kind: "private_network".into(),
            options,
        };
        assert_eq!(
            rendered(&LibvirtProvider.attach_network(&vm(), &private).unwrap()),
            vec![
                "virsh attach-interface db.lab.test network default --model virtio --config --mac 52:54:00:aa:bb:cc"
            ]
        );

        let forwarded = NetworkAttachment {
            index: 1,
            kind: "forwarded_port".into(),
            options: Mapping::new(),
        };
        assert!(matches!(
            LibvirtProvider.attach_network(&vm(), &forwarded),
            Err(ExecError::Unsupported { .. })
        ));
    }
}
