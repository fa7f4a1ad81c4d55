//! Callback traits for execution
//!
//! These keep the executor free of any particular terminal UI.

use crate::error::ExecError;
use crate::types::ActionOutcome;

/// Progress callback for execution operations
///
/// Implement this trait to receive progress updates during execution.
pub trait ProgressCallback {
    /// Called when a host's plan starts
    fn on_host_start(&mut self, fqdn: &str, actions: usize);

    /// Called before an action is handed to the backend
    fn on_action_start(&mut self, fqdn: &str, description: &str);

    /// Called when an action completes
    fn on_action_complete(&mut self, fqdn: &str, description: &str, outcome: &ActionOutcome);

    /// Called when a host's plan finishes, successfully or not
    fn on_host_complete(&mut self, fqdn: &str, error: Option<&ExecError>);
}

/// No-op progress callback
pub struct NoProgress;

impl ProgressCallback for NoProgress {
    fn on_host_start(&mut self, _fqdn: &str, _actions: usize) {}
    fn on_action_start(&mut self, _fqdn: &str, _description: &str) {}
    fn on_action_complete(&mut self, _fqdn: &str, _description: &str, _outcome: &ActionOutcome) {}
    fn on_host_complete(&mut self, _fqdn: &str, _error: Option<&ExecError>) {}
}

/// Progress callback that writes to the `log` facade
pub struct LogProgress;

impl ProgressCallback for LogProgress {
    fn on_host_start(&mut self, fqdn: &str, actions: usize) {
        log::info!("{fqdn}: applying {actions} actions");
    }

    fn on_action_start(&mut self, fqdn: &str, description: &str) {
        log::debug!("{fqdn}: {description}");
    }

    fn on_action_complete(&mut self, fqdn: &str, description: &str, outcome: &ActionOutcome) {
        if let ActionOutcome::Skipped { reason } = outcome {
            log::info!("{fqdn}: skipped {description} ({reason})");
        }
    }

    fn on_host_complete(&mut self, fqdn: &str, error: Option<&ExecError>) {
        match error {
            Some(e) => log::error!("{fqdn}: {e}"),
            None => log::info!("{fqdn}: done"),
        }
    }
}
