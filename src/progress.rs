//! Terminal progress for `vmplan apply`.

use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use provision::{ActionOutcome, ExecError, ProgressCallback};

const TEMPLATE: &str = "{spinner:.green} {prefix:.bold} [{bar:30.cyan/blue}] {pos}/{len} {msg}";

/// One progress bar per host, cleared when the host finishes
#[derive(Default)]
pub struct ApplyProgress {
    bar: Option<ProgressBar>,
}

impl ApplyProgress {
    pub fn new() -> Self {
        Self::default()
    }

    fn style() -> ProgressStyle {
        ProgressStyle::default_bar()
            .template(TEMPLATE)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=>-")
    }
}

impl ProgressCallback for ApplyProgress {
    fn on_host_start(&mut self, fqdn: &str, actions: usize) {
        let bar = ProgressBar::new(actions as u64);
        bar.set_style(Self::style());
        bar.set_prefix(fqdn.to_string());
        bar.set_message("defining VM");
        self.bar = Some(bar);
    }

    fn on_action_start(&mut self, _fqdn: &str, description: &str) {
        if let Some(bar) = &self.bar {
            bar.set_message(description.to_string());
        }
    }

    fn on_action_complete(&mut self, _fqdn: &str, description: &str, outcome: &ActionOutcome) {
        let Some(bar) = &self.bar else {
            return;
        };
        if let ActionOutcome::Skipped { reason } = outcome {
            bar.println(format!(
                "  {} {} {}",
                "⊘".yellow(),
                description,
                format!("({reason})").dimmed()
            ));
        }
        bar.inc(1);
    }

    fn on_host_complete(&mut self, fqdn: &str, error: Option<&ExecError>) {
        if let Some(bar) = self.bar.take() {
            bar.finish_and_clear();
        }
        match error {
            None => println!("{} {}", "✓".green(), fqdn),
            Some(e) => eprintln!("{} {}: {}", "✗".red(), fqdn.bold(), e),
        }
    }
}
