use crate::cli::ApplyArgs;
use crate::commands::{Inputs, ensure_selected, load};
use crate::progress::ApplyProgress;
use crate::{Context, paths, ui};
use anyhow::{Context as _, Result, bail};
use colored::Colorize;
use provision::{
    Backend, BundlerInstaller, CliBackend, Compiler, ExecuteOptions, LogProgress, NoProgress,
    ProcessRunner, ProviderKind, ProvisioningPlan, RecordingRunner, RunReport, host_entries,
};

/// Compile and apply plans through the selected provider
pub fn run(ctx: &Context, args: &ApplyArgs) -> Result<()> {
    let Inputs {
        inventory,
        group_vars,
        mut diags,
    } = load(ctx);
    let model = inventory::build(&inventory, &group_vars, &mut diags);
    let project = ctx.project_dir();

    let mut compiler = Compiler::new(&project);
    if args.skip_deps || args.dry_run {
        log::info!("Leaving test-suite dependencies alone");
    } else {
        let installer = BundlerInstaller::new(ProcessRunner::new(!ctx.quiet));
        compiler = compiler.with_installer(installer);
    }
    let plans = compiler
        .compile_all(&model, args.host.as_deref(), &mut diags)
        .context("Failed to prepare test-suite dependencies")?;
    ensure_selected(args.host.as_deref(), plans.len())?;

    if plans.is_empty() {
        ui::info("No hosts to provision");
        return Ok(());
    }

    let provider = ProviderKind::from(args.provider);
    let state_dir = ctx.state_dir();
    print_overview(&plans, provider, args.dry_run, diags.len());

    if !args.dry_run && !args.yes && !confirm_proceed(plans.len())? {
        ui::info("Cancelled");
        return Ok(());
    }

    let opts = ExecuteOptions {
        policy: args.on_error.into(),
        register_hosts: !args.no_register,
    };

    let report = if args.dry_run {
        let backend = CliBackend::new(provider, RecordingRunner::new(), &state_dir)
            .with_hosts(host_entries(&plans));
        let report = execute(ctx, &plans, &backend, &opts)?;
        print_commands(&backend.runner().rendered());
        report
    } else {
        let runner = ProcessRunner::new(ctx.verbose > 0);
        let backend =
            CliBackend::new(provider, runner, &state_dir).with_hosts(host_entries(&plans));
        execute(ctx, &plans, &backend, &opts)?
    };

    print_summary(&report);
    if !args.dry_run {
        ui::dim(&format!("Generated files are in {}", paths::display(&state_dir)));
    }

    if !report.is_success() {
        bail!("{} failed", ui::count(report.failures.len(), "host"));
    }
    Ok(())
}

fn execute<B: Backend>(
    ctx: &Context,
    plans: &[ProvisioningPlan],
    backend: &B,
    opts: &ExecuteOptions,
) -> Result<RunReport> {
    // Progress bars would interleave with debug logs
    let result = if ctx.quiet {
        provision::execute(plans, backend, opts, &mut NoProgress)
    } else if ctx.verbose >= 2 {
        provision::execute(plans, backend, opts, &mut LogProgress)
    } else {
        provision::execute(plans, backend, opts, &mut ApplyProgress::new())
    };
    result.context("Provisioning stopped")
}

fn print_overview(
    plans: &[ProvisioningPlan],
    provider: ProviderKind,
    dry_run: bool,
    warnings: usize,
) {
    let actions: usize = plans.iter().map(ProvisioningPlan::len).sum();

    ui::header("Provisioning");
    ui::kv("provider", &provider.to_string());
    ui::kv("hosts", &plans.len().to_string());
    ui::kv("actions", &actions.to_string());
    println!();

    if warnings > 0 {
        ui::warn(&format!(
            "{} raised while compiling; affected entries were skipped",
            ui::count(warnings, "warning")
        ));
    }
    if dry_run {
        ui::info("Dry run: backend commands are printed, not executed");
    }
}

/// Confirm with user
fn confirm_proceed(hosts: usize) -> Result<bool> {
    use dialoguer::Confirm;

    let confirmed = Confirm::new()
        .with_prompt(format!("Provision {}?", ui::count(hosts, "host")))
        .default(true)
        .interact()?;

    Ok(confirmed)
}

fn print_commands(commands: &[String]) {
    ui::section("Commands");
    for command in commands {
        ui::dim(command);
    }
}

/// Print final summary
fn print_summary(report: &RunReport) {
    println!();
    if report.is_success() {
        println!("  {} Provisioning complete", "✓".green().bold());
    } else {
        println!("  {} Provisioning finished with errors", "⚠".yellow().bold());
    }

    if report.applied() > 0 {
        println!("    • {} applied", ui::count(report.applied(), "action"));
    }
    if report.skipped() > 0 {
        println!("    • {} skipped", ui::count(report.skipped(), "action"));
    }
    for failure in &report.failures {
        ui::error(&format!("{}: {}", failure.fqdn, failure.error));
    }
}
