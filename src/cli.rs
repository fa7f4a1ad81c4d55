use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;

#[derive(Parser)]
#[command(name = "vmplan")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(about = "Declarative VM provisioning from a YAML host inventory", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Host inventory file [default: hosts.yml]
    #[arg(short, long, global = true, env = "VMPLAN_INVENTORY")]
    pub inventory: Option<String>,

    /// Group variables file [default: group_vars.yml next to the inventory]
    #[arg(short, long, global = true, env = "VMPLAN_GROUP_VARS")]
    pub group_vars: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Write a starter inventory if none exists
    Init,

    /// List hosts with their FQDNs, sizing and groups
    Hosts(HostsArgs),

    /// Show the provisioning plan without touching anything
    Plan(PlanArgs),

    /// Provision hosts through a hypervisor backend
    Apply(ApplyArgs),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Args)]
pub struct HostsArgs {
    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

#[derive(Args)]
pub struct PlanArgs {
    /// Only this host (hostname or FQDN)
    pub host: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

#[derive(Args)]
pub struct ApplyArgs {
    /// Only this host (hostname or FQDN)
    pub host: Option<String>,

    /// Hypervisor provider
    #[arg(short, long, value_enum, env = "VMPLAN_PROVIDER", default_value_t = ProviderArg::Libvirt)]
    pub provider: ProviderArg,

    /// What to do with remaining hosts when one fails
    #[arg(long, value_enum, default_value_t = OnError::Stop)]
    pub on_error: OnError,

    /// Print the backend commands instead of running them
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,

    /// Do not create or install test-suite dependencies
    #[arg(long)]
    pub skip_deps: bool,

    /// Do not register hostnames with the hypervisor
    #[arg(long)]
    pub no_register: bool,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Yaml,
    Json,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ProviderArg {
    Libvirt,
    #[value(name = "virtualbox")]
    VirtualBox,
}

impl From<ProviderArg> for provision::ProviderKind {
    fn from(arg: ProviderArg) -> Self {
        match arg {
            ProviderArg::Libvirt => Self::Libvirt,
            ProviderArg::VirtualBox => Self::VirtualBox,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OnError {
    /// Stop at the first failing host
    Stop,
    /// Keep provisioning the remaining hosts
    Continue,
}

impl From<OnError> for provision::ExecPolicy {
    fn from(arg: OnError) -> Self {
        match arg {
            OnError::Stop => Self::FailFast,
            OnError::Continue => Self::ContinueOnError,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_apply_flags() {
        let cli = Cli::try_parse_from([
            "vmplan",
            "apply",
            "web",
            "--provider",
            "virtualbox",
            "--on-error",
            "continue",
            "-n",
        ])
        .unwrap();

        let Command::Apply(args) = cli.command else {
            panic!("expected apply");
        };
        assert_eq!(args.host.as_deref(), Some("web"));
        assert!(args.provider == ProviderArg::VirtualBox);
        assert!(args.on_error == OnError::Continue);
        assert!(args.dry_run);
        assert!(!args.yes);
    }
}
