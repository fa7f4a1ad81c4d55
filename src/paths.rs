//! Path resolution for vmplan
//!
//! Everything is project-relative: the project directory is the one holding
//! the inventory file. Generated files go to a state directory inside it.
//!
//! # Environment Variables
//!
//! - `VMPLAN_INVENTORY` - Inventory file (also `--inventory`)
//! - `VMPLAN_GROUP_VARS` - Group variables file (also `--group-vars`)
//! - `VMPLAN_STATE_DIR` - Override the state directory
//!
//! # Path Resolution Priority
//!
//! For state_dir():
//! 1. `VMPLAN_STATE_DIR` environment variable
//! 2. `<project>/.vmplan`

use std::path::{Path, PathBuf};

/// Environment variable for state directory override
pub const ENV_STATE_DIR: &str = "VMPLAN_STATE_DIR";

/// Inventory file used when none is given
pub const DEFAULT_INVENTORY: &str = "hosts.yml";

/// Group variables file, looked up next to the inventory
pub const DEFAULT_GROUP_VARS: &str = "group_vars.yml";

/// State directory name inside the project
pub const STATE_DIR_NAME: &str = ".vmplan";

/// Resolve the inventory path from the CLI/env value
pub fn inventory_path(arg: Option<&str>) -> PathBuf {
    arg.map_or_else(|| PathBuf::from(DEFAULT_INVENTORY), expand)
}

/// Resolve the group variables path; the default sits next to the inventory
pub fn group_vars_path(arg: Option<&str>, inventory: &Path) -> PathBuf {
    arg.map_or_else(
        || project_dir(inventory).join(DEFAULT_GROUP_VARS),
        expand,
    )
}

/// Directory holding the inventory file
pub fn project_dir(inventory: &Path) -> PathBuf {
    match inventory.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Get the state directory for a project
///
/// Priority:
/// 1. `VMPLAN_STATE_DIR` env var
/// 2. `<project>/.vmplan`
pub fn state_dir(project: &Path) -> PathBuf {
    resolve_state_dir(std::env::var(ENV_STATE_DIR).ok(), project)
}

fn resolve_state_dir(env_override: Option<String>, project: &Path) -> PathBuf {
    if let Some(dir) = env_override {
        let path = expand(&dir);
        log::debug!("Using state dir from {}: {}", ENV_STATE_DIR, path.display());
        return path;
    }

    let path = project.join(STATE_DIR_NAME);
    log::debug!("Using default state dir: {}", path.display());
    path
}

/// Expand ~ and environment variables in a path string.
pub fn expand(path: &str) -> PathBuf {
    let expanded = shellexpand::full(path).unwrap_or(std::borrow::Cow::Borrowed(path));
    PathBuf::from(expanded.as_ref())
}

/// Display a path with the home directory shortened to `~`
pub fn display(path: &Path) -> String {
    if let Some(home) = dirs::home_dir()
        && let Ok(rest) = path.strip_prefix(&home)
    {
        return Path::new("~").join(rest).display().to_string();
    }
    path.display().to_string()
}

// ============================================================================
// Tests
// ============================================================================
