//! Test-suite dependencies on the hypervisor host
//!
//! Serverspec runs need a Ruby bundle. The project gets a `Gemfile` with two
//! pinned gems the first time any host asks for serverspec, and the bundle is
//! installed right after the manifest is created. An existing `Gemfile` is
//! never rewritten and never triggers an install. A failed install removes
//! the manifest again so the next run retries.

use crate::backend::{CommandRunner, CommandSpec, ProcessRunner};
use crate::error::{ExecError, Result};
use std::fs;
use std::path::Path;

/// Manifest file name, created in the project directory
pub const MANIFEST: &str = "Gemfile";

/// The manifest written when none exists
pub const GEMFILE: &str = "\
source 'https://rubygems.org'

gem 'serverspec', '2.42.3'
gem 'rake', '13.2.1'
";

/// Installs the packages declared in a dependency manifest
pub trait DependencyInstaller {
    fn install(&self, manifest: &Path) -> Result<()>;
}

/// Installer that runs `bundle install` for the manifest
#[derive(Debug, Default)]
pub struct BundlerInstaller<R: CommandRunner = ProcessRunner> {
    runner: R,
}

impl<R: CommandRunner> BundlerInstaller<R> {
    pub fn new(runner: R) -> Self {
        Self { runner }
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }
}

impl<R: CommandRunner> DependencyInstaller for BundlerInstaller<R> {
    fn install(&self, manifest: &Path) -> Result<()> {
        let command = CommandSpec::new("bundle")
            .arg("install")
            .arg(format!("--gemfile={}", manifest.display()));
        self.runner.run(&command).map(|_| ())
    }
}

/// Create the manifest if absent, installing only when it was just created
///
/// Returns whether the manifest was created by this call.
pub fn ensure_serverspec_dependencies(
    project_dir: &Path,
    installer: &dyn DependencyInstaller,
) -> Result<bool> {
    let manifest = project_dir.join(MANIFEST);
    if manifest.exists() {
        log::debug!("{} exists; skipping dependency install", manifest.display());
        return Ok(false);
    }

    fs::create_dir_all(project_dir).map_err(|e| ExecError::io(project_dir, e))?;
    fs::write(&manifest, GEMFILE).map_err(|e| ExecError::io(&manifest, e))?;
    log::info!("Created {}", manifest.display());

    if let Err(e) = installer.install(&manifest) {
        if let Err(remove) = fs::remove_file(&manifest) {
            log::warn!("Could not remove {}: {remove}", manifest.display());
        }
        return Err(e);
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::RecordingRunner;
    use std::cell::Cell;
    use tempfile::TempDir;

    #[derive(Default)]
    struct CountingInstaller {
        calls: Cell<usize>,
    }

    impl DependencyInstaller for CountingInstaller {
        fn install(&self, _manifest: &Path) -> Result<()> {
            self.calls.set(self.calls.get() + 1);
            Ok(())
        }
    }

    #[test]
    fn test_manifest_created_once_and_installed_once() {
        let dir = TempDir::new().unwrap();
        let installer = CountingInstaller::default();

        assert!(ensure_serverspec_dependencies(dir.path(), &installer).unwrap());
        assert!(!ensure_serverspec_dependencies(dir.path(), &installer).unwrap());

        assert_eq!(installer.calls.get(), 1);
        let content = fs::read_to_string(dir.path().join(MANIFEST)).unwrap();
        assert_eq!(content.lines().filter(|l| l.starts_with("gem ")).count(), 2);
    }

    #[test]
    fn test_existing_manifest_is_left_alone() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(MANIFEST), "gem 'custom'\n").unwrap();
        let installer = CountingInstaller::default();

        assert!(!ensure_serverspec_dependencies(dir.path(), &installer).unwrap());
        assert_eq!(installer.calls.get(), 0);
        assert_eq!(
            fs::read_to_string(dir.path().join(MANIFEST)).unwrap(),
            "gem 'custom'\n"
        );
    }

    #[test]
    fn test_failed_install_is_retried() {
        let dir = TempDir::new().unwrap();
        let failing = BundlerInstaller::new(RecordingRunner::failing_on("bundle"));

        assert!(ensure_serverspec_dependencies(dir.path(), &failing).is_err());
        assert!(!dir.path().join(MANIFEST).exists());

        let installer = CountingInstaller::default();
        assert!(ensure_serverspec_dependencies(dir.path(), &installer).unwrap());
        assert_eq!(installer.calls.get(), 1);
    }

    #[test]
    fn test_bundler_command() {
        let installer = BundlerInstaller::new(RecordingRunner::new());
        installer.install(Path::new("/srv/lab/Gemfile")).unwrap();
        assert_eq!(
            installer.runner().rendered(),
            vec!["bundle install --gemfile=/srv/lab/Gemfile"]
        );
    }
}
