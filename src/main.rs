mod cli;
mod commands;
mod paths;
mod progress;
mod ui;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Command};
use std::io;
use std::path::PathBuf;

/// Global context for the application
pub struct Context {
    pub verbose: u8,
    pub quiet: bool,
    /// Primary inventory document
    pub inventory: PathBuf,
    /// External group variables document
    pub group_vars: PathBuf,
}

impl Context {
    pub fn project_dir(&self) -> PathBuf {
        paths::project_dir(&self.inventory)
    }

    pub fn state_dir(&self) -> PathBuf {
        paths::state_dir(&self.project_dir())
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(if cli.quiet {
            log::LevelFilter::Error
        } else {
            log_level
        })
        .format_timestamp(None)
        .init();

    let inventory = paths::inventory_path(cli.inventory.as_deref());
    let group_vars = paths::group_vars_path(cli.group_vars.as_deref(), &inventory);
    let ctx = Context {
        verbose: cli.verbose,
        quiet: cli.quiet,
        inventory,
        group_vars,
    };

    match cli.command {
        Command::Init => commands::init::run(&ctx),
        Command::Hosts(args) => commands::hosts::run(&ctx, &args),
        Command::Plan(args) => commands::plan::run(&ctx, &args),
        Command::Apply(args) => commands::apply::run(&ctx, &args),
        Command::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "vmplan", &mut io::stdout());
            Ok(())
        }
    }
}
