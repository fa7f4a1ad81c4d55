// Project setup
pub mod init;

// Read-only views
pub mod hosts;
pub mod plan;

// Provisioning
pub mod apply;

use crate::Context;
use anyhow::{Result, bail};
use inventory::{Diagnostics, GroupVars, Inventory};

/// Documents read from the project, plus diagnostics raised while loading
pub struct Inputs {
    pub inventory: Inventory,
    pub group_vars: GroupVars,
    pub diags: Diagnostics,
}

/// Load the inventory (bootstrapping it when absent) and group variables
///
/// A malformed inventory degrades to zero hosts with a diagnostic; the
/// group variables file is optional.
pub fn load(ctx: &Context) -> Inputs {
    let mut diags = Diagnostics::new();
    let inventory = inventory::load_or_empty(&ctx.inventory, &mut diags);
    let group_vars = inventory::load_group_vars(&ctx.group_vars);
    log::debug!(
        "Loaded {} hosts and {} group variable entries",
        inventory.hosts.len(),
        group_vars.len()
    );

    Inputs {
        inventory,
        group_vars,
        diags,
    }
}

/// Fail when a host filter matched nothing
pub fn ensure_selected(filter: Option<&str>, selected: usize) -> Result<()> {
    if let Some(name) = filter
        && selected == 0
    {
        bail!("No host matches '{name}' (expected a hostname or FQDN)");
    }
    Ok(())
}
