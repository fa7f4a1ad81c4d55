//! Running external commands
//!
//! Providers render [`CommandSpec`]s; a [`CommandRunner`] decides whether
//! they really run ([`ProcessRunner`]) or are only recorded
//! ([`RecordingRunner`], used for dry runs and tests).

use crate::error::{ExecError, Result};
use std::cell::RefCell;
use std::fmt;
use std::fs::File;
use std::path::PathBuf;
use std::process::{Command, Output, Stdio};

/// A fully rendered external command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
    /// File fed to the command's stdin
    pub stdin_file: Option<PathBuf>,
}

impl CommandSpec {
    pub fn new(program: &str) -> Self {
        Self {
            program: program.to_string(),
            args: Vec::new(),
            env: Vec::new(),
            stdin_file: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn stdin_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.stdin_file = Some(path.into());
        self
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (key, value) in &self.env {
            write!(f, "{key}={} ", quote(value))?;
        }
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {}", quote(arg))?;
        }
        if let Some(path) = &self.stdin_file {
            write!(f, " < {}", quote(&path.to_string_lossy()))?;
        }
        Ok(())
    }
}

/// Quote an argument for display when it contains shell metacharacters
fn quote(arg: &str) -> String {
    let plain = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./=:,@%+".contains(c));
    if plain {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', r"'\''"))
    }
}

/// Output from a command
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub success: bool,
}

impl From<Output> for CommandOutput {
    fn from(output: Output) -> Self {
        Self {
            stdout: output.stdout,
            stderr: output.stderr,
            success: output.status.success(),
        }
    }
}

impl CommandOutput {
    /// Get stderr as a string
    pub fn stderr_str(&self) -> String {
        String::from_utf8_lossy(&self.stderr).to_string()
    }
}

/// Executes rendered commands
pub trait CommandRunner {
    /// Run a command; a non-zero exit is an error
    fn run(&self, spec: &CommandSpec) -> Result<CommandOutput>;

    /// Whether commands only get recorded instead of executed
    fn is_dry_run(&self) -> bool {
        false
    }
}

/// Runner that spawns real processes
#[derive(Debug, Default)]
pub struct ProcessRunner {
    /// Pass the command's stdout/stderr through to the terminal
    pub stream_output: bool,
}

impl ProcessRunner {
    pub fn new(stream_output: bool) -> Self {
        Self { stream_output }
    }
}

impl CommandRunner for ProcessRunner {
    fn run(&self, spec: &CommandSpec) -> Result<CommandOutput> {
        log::debug!("Running: {spec}");

        let mut command = Command::new(&spec.program);
        command.args(&spec.args);
        for (key, value) in &spec.env {
            command.env(key, value);
        }
        if let Some(path) = &spec.stdin_file {
            let file = File::open(path).map_err(|e| ExecError::io(path, e))?;
            command.stdin(Stdio::from(file));
        }
        if self.stream_output {
            command.stdout(Stdio::inherit());
        }

        let output: CommandOutput = command
            .output()
            .map_err(|e| ExecError::Spawn {
                program: spec.program.clone(),
                source: e,
            })?
            .into();

        if output.success {
            Ok(output)
        } else {
            Err(ExecError::CommandFailed {
                command: spec.to_string(),
                status: "non-zero exit".to_string(),
                stderr: output.stderr_str().trim().to_string(),
            })
        }
    }
}

/// Runner that records commands without executing them
#[derive(Debug, Default)]
pub struct RecordingRunner {
    commands: RefCell<Vec<CommandSpec>>,
    /// Fail any command whose rendered form contains this text
    fail_on: Option<String>,
}

impl RecordingRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// A recorder that fails commands matching `pattern`
    pub fn failing_on(pattern: &str) -> Self {
        Self {
            commands: RefCell::default(),
            fail_on: Some(pattern.to_string()),
        }
    }

    /// Commands recorded so far
    pub fn commands(&self) -> Vec<CommandSpec> {
        self.commands.borrow().clone()
    }

    /// Commands recorded so far, rendered
    pub fn rendered(&self) -> Vec<String> {
        self.commands.borrow().iter().map(ToString::to_string).collect()
    }
}

impl CommandRunner for RecordingRunner {
    fn run(&self, spec: &CommandSpec) -> Result<CommandOutput> {
        let rendered = spec.to_string();
        log::info!("[dry-run] {rendered}");
        self.commands.borrow_mut().push(spec.clone());

        if let Some(pattern) = &self.fail_on
            && rendered.contains(pattern.as_str())
        {
            return Err(ExecError::CommandFailed {
                command: rendered,
                status: "simulated failure".to_string(),
                stderr: String::new(),
            });
        }

        Ok(CommandOutput {
            success: true,
            ..Default::default()
        })
    }

    fn is_dry_run(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_quotes_only_when_needed() {
        let spec = CommandSpec::new("ssh")
            .arg("web.localdomain")
            .arg("echo 'hello world'")
            .env("ANSIBLE_CONFIG", "ansible.cfg");
        assert_eq!(
            spec.to_string(),
            r"ANSIBLE_CONFIG=ansible.cfg ssh web.localdomain 'echo '\''hello world'\'''"
        );
    }

    #[test]
    fn test_recording_runner() {
        let runner = RecordingRunner::failing_on("virsh");
        assert!(runner.run(&CommandSpec::new("qemu-img").arg("create")).is_ok());
        assert!(matches!(
            runner.run(&CommandSpec::new("virsh").arg("attach-disk")),
            Err(ExecError::CommandFailed { .. })
        ));
        assert_eq!(runner.rendered(), vec!["qemu-img create", "virsh attach-disk"]);
        assert!(runner.is_dry_run());
    }

    #[test]
    fn test_process_runner_reports_failure() {
        let runner = ProcessRunner::default();
        let result = runner.run(&CommandSpec::new("vmplan-definitely-missing-binary"));
        assert!(matches!(result, Err(ExecError::Spawn { .. })));
    }
}
