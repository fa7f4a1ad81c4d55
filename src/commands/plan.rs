use crate::cli::{OutputFormat, PlanArgs};
use crate::commands::{Inputs, ensure_selected, load};
use crate::{Context, ui};
use anyhow::Result;
use provision::{Compiler, ProvisioningPlan};

/// Compile and print plans without side effects
pub fn run(ctx: &Context, args: &PlanArgs) -> Result<()> {
    let Inputs {
        inventory,
        group_vars,
        mut diags,
    } = load(ctx);
    let model = inventory::build(&inventory, &group_vars, &mut diags);

    // No installer: previewing never creates test dependencies
    let plans =
        Compiler::new(ctx.project_dir()).compile_all(&model, args.host.as_deref(), &mut diags)?;
    ensure_selected(args.host.as_deref(), plans.len())?;

    match args.format {
        OutputFormat::Yaml => print!("{}", serde_yaml::to_string(&plans)?),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&plans)?),
        OutputFormat::Text => print_plans(&plans),
    }

    if !diags.is_empty() && args.format == OutputFormat::Text {
        println!();
        ui::warn(&format!(
            "{} raised while compiling; affected entries were skipped",
            ui::count(diags.len(), "warning")
        ));
    }
    Ok(())
}

fn print_plans(plans: &[ProvisioningPlan]) {
    if plans.is_empty() {
        ui::info("No hosts declared");
        return;
    }

    for plan in plans {
        ui::header(&plan.fqdn);
        ui::kv("box", &plan.vm.box_image);
        ui::kv("memory", &ui::format_memory(plan.vm.memory));
        ui::kv("cpus", &plan.vm.cpus.to_string());

        if plan.is_empty() {
            ui::dim("no provisioning actions");
            continue;
        }
        println!();
        for (i, action) in plan.actions.iter().enumerate() {
            ui::step(i + 1, plan.len(), &action.description());
        }
    }
}
