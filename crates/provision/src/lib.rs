//! # Provision
//!
//! Plan compilation and execution for resolved host inventories.
//!
//! ## Core Concepts
//!
//! - **ProvisioningPlan**: the ordered actions for one host, plus its VM sizing
//! - **Compiler**: turns a `ResolvedModel` into plans, ensuring test
//!   dependencies when asked
//! - **Backend**: the named capabilities actions are delegated to
//! - **ExecPolicy**: what happens to the remaining hosts after a failure
//!
//! ## Example
//!
//! ```no_run
//! use inventory::{Diagnostics, build, load_group_vars, load_or_empty};
//! use provision::{
//!     CliBackend, Compiler, ExecuteOptions, ProcessRunner, ProviderKind, execute_simple,
//! };
//! use std::path::Path;
//!
//! let mut diags = Diagnostics::new();
//! let inventory = load_or_empty(Path::new("hosts.yml"), &mut diags);
//! let model = build(&inventory, &load_group_vars(Path::new("group_vars.yml")), &mut diags);
//!
//! let plans = Compiler::new(".").compile_all(&model, None, &mut diags)?;
//! let backend = CliBackend::new(ProviderKind::Libvirt, ProcessRunner::default(), ".vmplan");
//! let report = execute_simple(&plans, &backend, &ExecuteOptions::default())?;
//! println!("{} actions applied", report.applied());
//! # Ok::<(), provision::ExecError>(())
//! ```

pub mod ansible;
pub mod backend;
pub mod compiler;
pub mod context;
pub mod error;
pub mod executor;
pub mod testdeps;
pub mod types;

pub use ansible::{AnsibleOptions, recognized_options};
pub use backend::{
    Backend, Capability, CliBackend, CommandRunner, CommandSpec, HostEntry, ProcessRunner,
    Provider, ProviderKind, RecordingRunner,
};
pub use compiler::{Compiler, compile};
pub use context::{LogProgress, NoProgress, ProgressCallback};
pub use error::{ExecError, Result};
pub use executor::{apply, execute, execute_simple, host_entries};
pub use testdeps::{BundlerInstaller, DependencyInstaller, ensure_serverspec_dependencies};
pub use types::{
    Action, ActionOutcome, ConfigManagementRun, ExecPolicy, ExecuteOptions, HostFailure,
    HostReport, NetworkAttachment, ProvisioningPlan, RunReport, ShellScript, StorageAttachment,
    TestFramework, TestPhase, TestSuiteStep, VmDefinition,
};
