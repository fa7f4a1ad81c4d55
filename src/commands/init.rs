use crate::{Context, paths, ui};
use anyhow::{Context as _, Result};

/// Write the starter inventory unless one already exists
pub fn run(ctx: &Context) -> Result<()> {
    let shown = paths::display(&ctx.inventory);

    if ctx.inventory.exists() {
        ui::info(&format!("{shown} already exists; leaving it untouched"));
        return Ok(());
    }

    let inventory = inventory::load(&ctx.inventory)
        .with_context(|| format!("Failed to write starter inventory to {shown}"))?;

    ui::success(&format!("Wrote starter inventory to {shown}"));
    for host in &inventory.hosts {
        ui::kv("host", &host.hostname);
    }
    if !ctx.quiet {
        ui::dim("Edit it, then run `vmplan plan` to preview the provisioning steps.");
    }
    Ok(())
}
