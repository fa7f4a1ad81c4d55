//! VirtualBox provider (VBoxManage)
//!
//! VirtualBox gets no extra disks: storage entries are skipped on this
//! provider, and the executor reports them as such.

use super::runner::CommandSpec;
use super::{Capability, Provider, ProviderKind};
use crate::error::Result;
use crate::types::{NetworkAttachment, VmDefinition};

pub struct VirtualBoxProvider;

fn vboxmanage(subcommand: &str) -> CommandSpec {
    CommandSpec::new("VBoxManage").arg(subcommand)
}

impl Provider for VirtualBoxProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::VirtualBox
    }

    fn supports(&self, _capability: Capability) -> bool {
        false
    }

    fn define_vm(&self, vm: &VmDefinition) -> Vec<CommandSpec> {
        vec![
            vboxmanage("clonevm")
                .arg(vm.box_image.clone())
                .args(["--name", vm.name.as_str(), "--register"]),
            vboxmanage("modifyvm").arg(vm.name.clone()).args([
                "--memory".to_string(),
                vm.memory.to_string(),
                "--cpus".to_string(),
                vm.cpus.to_string(),
            ]),
        ]
    }

    fn start_vm(&self, vm: &VmDefinition) -> Vec<CommandSpec> {
        vec![
            vboxmanage("startvm")
                .arg(vm.name.clone())
                .args(["--type", "headless"]),
        ]
    }

    fn attach_network(
        &self,
        vm: &VmDefinition,
        network: &NetworkAttachment,
    ) -> Result<Vec<CommandSpec>> {
        // Adapter 1 is the NAT interface used for management
        let nic = network.index + 2;
        let mut args = match network.kind.as_str() {
            "private_network" => vec![
                format!("--nic{nic}"),
                "hostonly".to_string(),
                format!("--hostonlyadapter{nic}"),
                network.option("name").unwrap_or("vboxnet0").to_string(),
            ],
            "public_network" => vec![
                format!("--nic{nic}"),
                "bridged".to_string(),
                format!("--bridgeadapter{nic}"),
                network
                    .option("bridge")
                    .or_else(|| network.option("dev"))
                    .unwrap_or("eth0")
                    .to_string(),
            ],
            other => return Err(self.unsupported(&format!("network kind '{other}'"))),
        };
        if let Some(mac) = network.option("mac") {
            args.push(format!("--macaddress{nic}"));
            args.push(mac.replace(':', ""));
        }

        Ok(vec![vboxmanage("modifyvm").arg(vm.name.clone()).args(args)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ExecError;
    use crate::types::StorageAttachment;
    use inventory::StorageSpec;
    use serde_yaml::Mapping;
    use std::path::Path;

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
    fn test_define_applies_sizing() {
        let commands: Vec<String> = VirtualBoxProvider
            .define_vm(&vm())
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(
            commands,
            vec![
                "VBoxManage clonevm centos/7 --name web.lab.test --register",
                "VBoxManage modifyvm web.lab.test --memory 2048 --cpus 2",
            ]
        );
    }

    #[test]
    fn test_storage_is_unsupported() {
        assert!(!VirtualBoxProvider.supports(Capability::Storage));
        let disk = StorageAttachment {
            index: 0,
            spec: StorageSpec::default(),
        };
        assert!(matches!(
            VirtualBoxProvider.attach_storage(&vm(), &disk, Path::new("/tmp")),
            Err(ExecError::Unsupported { .. })
        ));
    }

    #[test]
    fn test_second_network_uses_third_adapter() {
        let mut options = Mapping::new();
        options.insert("bridge".into(), "en0".into());
        options.insert("mac".into(), "08:00:27:aa:bb:cc".into());
        let network = NetworkAttachment {
            index: 1,
            kind: "public_network".into(),
            options,
        };

        let commands = VirtualBoxProvider.attach_network(&vm(), &network).unwrap();
        assert_eq!(
            commands[0].to_string(),
            "VBoxManage modifyvm web.lab.test --nic3 bridged --bridgeadapter3 en0 --macaddress3 080027aabbcc"
        );
    }
}
