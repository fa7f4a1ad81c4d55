//! Execution engine - applies provisioning plans through a backend

use crate::backend::{Backend, Capability, HostEntry};
use crate::context::{NoProgress, ProgressCallback};
use crate::error::Result;
use crate::types::{
    Action, ActionOutcome, ExecPolicy, ExecuteOptions, HostFailure, HostReport,
    ProvisioningPlan, RunReport,
};

/// Name-registration entries for a set of plans
///
/// A host's address is the `ip` option of its first network that has one.
pub fn host_entries(plans: &[ProvisioningPlan]) -> Vec<HostEntry> {
    plans
        .iter()
        .map(|plan| HostEntry {
            hostname: plan.hostname.clone(),
            fqdn: plan.fqdn.clone(),
            ip: plan.actions.iter().find_map(|action| match action {
                Action::AttachNetwork(net) => net.option("ip").map(str::to_string),
                _ => None,
            }),
        })
        .collect()
}

/// Apply one host's plan
///
/// The VM is defined first, then actions run strictly in plan order.
/// Attachments are made while the VM is down; it boots before the first
/// provisioning step, or after the last attachment if there is none. The
/// first failing action ends the host.
pub fn apply<B, P>(plan: &ProvisioningPlan, backend: &B, progress: &mut P) -> Result<HostReport>
where
    B: Backend + ?Sized,
    P: ProgressCallback + ?Sized,
{
    progress.on_host_start(&plan.fqdn, plan.len());
    let result = apply_actions(plan, backend, progress);
    progress.on_host_complete(&plan.fqdn, result.as_ref().err());
    result
}

fn apply_actions<B, P>(plan: &ProvisioningPlan, backend: &B, progress: &mut P) -> Result<HostReport>
where
    B: Backend + ?Sized,
    P: ProgressCallback + ?Sized,
{
    let vm = &plan.vm;
    let mut report = HostReport::new(&plan.fqdn);
    let mut running = false;

    backend.define_vm(vm)?;

    for action in &plan.actions {
        let description = action.description();
        progress.on_action_start(&plan.fqdn, &description);

        let is_attachment = matches!(
            action,
            Action::AttachStorage(_) | Action::AttachNetwork(_)
        );
        if !is_attachment && !running {
            backend.start_vm(vm)?;
            running = true;
        }

        let outcome = match action {
            Action::AttachStorage(_) if !backend.supports(Capability::Storage) => {
                ActionOutcome::Skipped {
                    reason: format!("{} has no storage support", backend.provider()),
                }
            }
            Action::AttachStorage(disk) => {
                backend.attach_storage(vm, disk)?;
                ActionOutcome::Applied
            }
            Action::AttachNetwork(network) if !backend.supports_network(&network.kind) => {
                ActionOutcome::Skipped {
                    reason: format!(
                        "{} cannot attach {} networks",
                        backend.provider(),
                        network.kind
                    ),
                }
            }
            Action::AttachNetwork(network) => {
                backend.attach_network(vm, network)?;
                ActionOutcome::Applied
            }
            Action::RunConfigManagement(run) => {
                backend.run_config_management(vm, run)?;
                ActionOutcome::Applied
            }
            Action::RunShell(script) => {
                backend.run_shell(vm, script)?;
                ActionOutcome::Applied
            }
            Action::RunTestSuite(step) => {
                backend.run_shell(vm, &step.script)?;
                ActionOutcome::Applied
            }
        };

        progress.on_action_complete(&plan.fqdn, &description, &outcome);
        report.outcomes.push((description, outcome));
    }

    if !running {
        backend.start_vm(vm)?;
    }

    Ok(report)
}

/// Apply plans in order under the given failure policy
///
/// With [`ExecPolicy::FailFast`] the first host error is returned as is.
/// With [`ExecPolicy::ContinueOnError`] it is recorded in the report and the
/// remaining hosts are still applied.
pub fn execute<B, P>(
    plans: &[ProvisioningPlan],
    backend: &B,
    opts: &ExecuteOptions,
    progress: &mut P,
) -> Result<RunReport>
where
    B: Backend + ?Sized,
    P: ProgressCallback + ?Sized,
{
    if opts.register_hosts && !plans.is_empty() {
        backend.register_hosts(&host_entries(plans))?;
    }

    let mut report = RunReport::default();
    for plan in plans {
        match apply(plan, backend, progress) {
            Ok(host) => report.hosts.push(host),
            Err(e) => match opts.policy {
                ExecPolicy::FailFast => return Err(e),
                ExecPolicy::ContinueOnError => report.failures.push(HostFailure {
                    fqdn: plan.fqdn.clone(),
                    error: e.to_string(),
                }),
            },
        }
    }

    Ok(report)
}

/// Simple execution without progress reporting
pub fn execute_simple<B: Backend + ?Sized>(
    plans: &[ProvisioningPlan],
    backend: &B,
    opts: &ExecuteOptions,
) -> Result<RunReport> {
    execute(plans, backend, opts, &mut NoProgress)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{CliBackend, ProviderKind, RecordingRunner};
    use crate::compiler::compile;
    use crate::error::ExecError;
    use inventory::{Diagnostics, GroupVars, build, loader};
    use tempfile::TempDir;

    const TWO_HOSTS: &str = r"
- hostname: web
  memory: 2048
  cpus: 2
  networks:
    - private_network: { ip: 10.0.0.5 }
  storage:
    - { size: 5G, device: vdb }
  shellInline: echo web
- hostname: db
  networks:
    - private_network: { ip: 10.0.0.6 }
  shellInline: echo db
";

    fn plans(yaml: &str) -> Vec<ProvisioningPlan> {
        let mut diags = Diagnostics::new();
        let inventory = loader::parse(yaml, &mut diags).unwrap();
        let model = build(&inventory, &GroupVars::new(), &mut diags);
        model
            .hosts
            .iter()
            .map(|host| compile(host, &model, &mut diags))
            .collect()
    }

    fn backend(
        kind: ProviderKind,
        runner: RecordingRunner,
        dir: &TempDir,
    ) -> CliBackend<RecordingRunner> {
        CliBackend::new(kind, runner, dir.path())
    }

    #[test]
    fn test_storage_skipped_on_virtualbox() {
        let dir = TempDir::new().unwrap();
        let backend = backend(ProviderKind::VirtualBox, RecordingRunner::new(), &dir);
        let plans = plans(TWO_HOSTS);

        let report = apply(&plans[0], &backend, &mut NoProgress).unwrap();

        assert_eq!(report.skipped(), 1);
        assert_eq!(report.applied(), 2);
        assert!(
            !backend
                .runner()
                .rendered()
                .iter()
                .any(|c| c.contains("attach-disk") || c.contains("qemu-img"))
        );
    }

    #[test]
    fn test_storage_attached_on_libvirt() {
        let dir = TempDir::new().unwrap();
        let backend = backend(ProviderKind::Libvirt, RecordingRunner::new(), &dir);
        let plans = plans(TWO_HOSTS);

        let report = apply(&plans[0], &backend, &mut NoProgress).unwrap();

        assert_eq!(report.skipped(), 0);
        let commands = backend.runner().rendered();
        let position = |needle: &str| commands.iter().position(|c| c.contains(needle)).unwrap();
        assert!(position("virt-clone") < position("attach-disk"));
        assert!(position("attach-disk") < position("attach-interface"));
        assert!(position("attach-interface") < position("virsh start"));
        assert!(position("virsh start") < position("echo web"));
    }

    #[test]
    fn test_unknown_network_kind_is_skipped() {
        let dir = TempDir::new().unwrap();
        let plans = plans(
            "- hostname: web\n  networks:\n    - forwarded_port: { guest: 80, host: 8080 }\n    - private_network: { ip: 10.0.0.5 }\n  shellInline: echo web\n",
        );

        for kind in [ProviderKind::Libvirt, ProviderKind::VirtualBox] {
            let backend = backend(kind, RecordingRunner::new(), &dir);
            let report = apply(&plans[0], &backend, &mut NoProgress).unwrap();

            assert_eq!(report.skipped(), 1);
            assert_eq!(report.applied(), 2);
            assert!(matches!(
                &report.outcomes[0].1,
                ActionOutcome::Skipped { reason } if reason.contains("forwarded_port")
            ));
        }
    }

    #[test]
    fn test_sizing_is_identical_across_providers() {
        let dir = TempDir::new().unwrap();
        let plans = plans(TWO_HOSTS);
        let libvirt = backend(ProviderKind::Libvirt, RecordingRunner::new(), &dir);
        let vbox = backend(ProviderKind::VirtualBox, RecordingRunner::new(), &dir);

        libvirt.define_vm(&plans[0].vm).unwrap();
        vbox.define_vm(&plans[0].vm).unwrap();

        let libvirt = libvirt.runner().rendered().join("\n");
        let vbox = vbox.runner().rendered().join("\n");
        assert!(libvirt.contains("setmem web.localdomain 2048M"));
        assert!(libvirt.contains("setvcpus web.localdomain 2 --config"));
        assert!(vbox.contains("--memory 2048 --cpus 2"));
    }

    #[test]
    fn test_fail_fast_stops_at_first_failing_host() {
        let dir = TempDir::new().unwrap();
        let backend = backend(
            ProviderKind::VirtualBox,
            RecordingRunner::failing_on("echo web"),
            &dir,
        );
        let opts = ExecuteOptions::default();

        let result = execute_simple(&plans(TWO_HOSTS), &backend, &opts);

        assert!(matches!(result, Err(ExecError::CommandFailed { .. })));
        assert!(
            !backend
                .runner()
                .rendered()
                .iter()
                .any(|c| c.contains("db.localdomain"))
        );
    }

    #[test]
    fn test_continue_on_error_applies_remaining_hosts() {
        let dir = TempDir::new().unwrap();
        let backend = backend(
            ProviderKind::VirtualBox,
            RecordingRunner::failing_on("echo web"),
            &dir,
        );
        let opts = ExecuteOptions {
            policy: ExecPolicy::ContinueOnError,
            register_hosts: false,
        };

        let report = execute_simple(&plans(TWO_HOSTS), &backend, &opts).unwrap();

        assert!(!report.is_success());
        assert_eq!(report.failures[0].fqdn, "web.localdomain");
        assert_eq!(report.hosts.len(), 1);
        assert_eq!(report.hosts[0].fqdn, "db.localdomain");
        assert_eq!(report.total_hosts(), 2);
    }

    #[test]
    fn test_host_entries_and_registration() {
        let dir = TempDir::new().unwrap();
        let backend = backend(ProviderKind::Libvirt, RecordingRunner::new(), &dir);
        let plans = plans(TWO_HOSTS);

        let entries = host_entries(&plans);
        assert_eq!(entries[0].ip.as_deref(), Some("10.0.0.5"));
        assert_eq!(entries[1].fqdn, "db.localdomain");

        let opts = ExecuteOptions {
            policy: ExecPolicy::FailFast,
            register_hosts: true,
        };
        execute_simple(&plans, &backend, &opts).unwrap();

        let commands = backend.runner().rendered();
        assert!(commands[0].starts_with("virsh net-update default add-last dns-host"));
        assert!(commands[1].starts_with("virsh net-update"));
    }

    #[test]
    fn test_vm_started_even_without_provisioning_steps() {
        let dir = TempDir::new().unwrap();
        let backend = backend(ProviderKind::VirtualBox, RecordingRunner::new(), &dir);
        let plans = plans("- hostname: bare\n");

        let report = apply(&plans[0], &backend, &mut NoProgress).unwrap();

        assert!(report.outcomes.is_empty());
        assert_eq!(
            backend.runner().rendered().last().map(String::as_str),
            Some("VBoxManage startvm bare.localdomain --type headless")
        );
    }
}
