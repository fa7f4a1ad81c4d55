//! Non-fatal diagnostics collected while loading and compiling.
//!
//! Every recorded diagnostic is also emitted through `log::warn!`, which the
//! CLI routes to stderr. Stdout stays reserved for command output.

use std::fmt;

/// Category of a diagnostic
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticKind {
    /// Primary inventory unreadable or of the wrong shape
    MalformedConfig,
    /// Inventory entry dropped for an empty hostname or a mistyped field
    InvalidEntry,
    /// Network entry that does not resolve to one kind with mapping options
    MalformedNetwork,
    /// Network option key that is not an identifier
    NonIdentifierKey,
    /// Provisioner option name outside the recognized set
    UnknownOption,
    /// Recognized provisioner option with a value of the wrong type
    InvalidOption,
    /// Storage entry with neither `device` nor `path`
    IncompleteStorage,
    /// Host whose hostname or FQDN collides with an earlier host
    DuplicateHost,
    /// Provisioner options declared without a playbook
    OrphanProvisionerOptions,
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::MalformedConfig => "malformed-config",
            Self::InvalidEntry => "invalid-entry",
            Self::MalformedNetwork => "malformed-network",
            Self::NonIdentifierKey => "non-identifier-key",
            Self::UnknownOption => "unknown-option",
            Self::InvalidOption => "invalid-option",
            Self::IncompleteStorage => "incomplete-storage",
            Self::DuplicateHost => "duplicate-host",
            Self::OrphanProvisionerOptions => "orphan-provisioner-options",
        };
        f.write_str(name)
    }
}

/// A single recorded diagnostic
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    /// What the diagnostic is about (file path, hostname, ...)
    pub subject: String,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.kind, self.subject, self.message)
    }
}

/// Collector for diagnostics over one run
#[derive(Debug, Default)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a warning and forward it to the log stream
    pub fn warn(
        &mut self,
        kind: DiagnosticKind,
        subject: impl Into<String>,
        message: impl Into<String>,
    ) {
        let diagnostic = Diagnostic {
            kind,
            subject: subject.into(),
            message: message.into(),
        };
        log::warn!("{diagnostic}");
        self.entries.push(diagnostic);
    }

    pub fn entries(&self) -> &[Diagnostic] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Count of diagnostics of one kind
    pub fn count(&self, kind: DiagnosticKind) -> usize {
        self.entries.iter().filter(|d| d.kind == kind).count()
    }

    pub fn has(&self, kind: DiagnosticKind) -> bool {
        self.count(kind) > 0
    }
}
