//! # Inventory
//!
//! Loading and resolution of declarative host inventories.
//!
//! ## Core Concepts
//!
//! - **Inventory**: the parsed document, a sequence of host entries plus an
//!   optional `globals` entry
//! - **GroupVars**: an external group name -> variables document
//! - **ResolvedModel**: hosts with effective domains and FQDNs, plus the
//!   merged group map
//! - **Diagnostics**: non-fatal warnings collected along the way
//!
//! ## Example
//!
//! ```no_run
//! use inventory::{Diagnostics, build, load_group_vars, load_or_empty};
//! use std::path::Path;
//!
//! let mut diags = Diagnostics::new();
//! let inventory = load_or_empty(Path::new("hosts.yml"), &mut diags);
//! let group_vars = load_group_vars(Path::new("group_vars.yml"));
//! let model = build(&inventory, &group_vars, &mut diags);
//!
//! for (hostname, fqdn) in model.fqdn_map() {
//!     println!("{hostname} -> {fqdn}");
//! }
//! ```

pub mod diagnostics;
pub mod error;
pub mod loader;
pub mod model;
pub mod types;

pub use diagnostics::{Diagnostic, DiagnosticKind, Diagnostics};
pub use error::{LoadError, Result};
pub use loader::{
    DEFAULT_BOX, DEFAULT_CPUS, DEFAULT_MEMORY, default_inventory, load, load_group_vars,
    load_or_empty, load_with_diagnostics, save, try_load_group_vars,
};
pub use model::{
    DEFAULT_DOMAIN, GroupMap, GroupValue, ResolvedHost, ResolvedModel, build, effective_domains,
};
pub use types::{
    DiskSize, GlobalSettings, GroupVars, HostSpec, Inventory, NetworkShapeError, NetworkSpec,
    StorageKind, StorageSpec,
};
