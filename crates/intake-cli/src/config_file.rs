use anyhow::Context;
use intake_core::Config;
use std::path::{Path, PathBuf};

pub const DEFAULT_FILE: &str = "intake.yaml";

/// Resolve which configuration file applies.
///
/// Priority:
/// 1. `--config` flag / `INTAKE_CONFIG` env var (passed in as `explicit`)
/// 2. `intake.yaml` in the working directory, if it exists
/// 3. None: built-in defaults
pub fn resolve_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(p) = explicit {
        return Some(p.to_path_buf());
    }
    let local = PathBuf::from(DEFAULT_FILE);
    local.is_file().then_some(local)
}

/// Load the effective configuration. An explicit path that does not exist is
/// an error; a missing default file just means defaults.
pub fn load(explicit: Option<&Path>) -> anyhow::Result<Config> {
    match resolve_path(explicit) {
        Some(path) => Config::load(&path)
            .with_context(|| format!("failed to load config from {}", path.display())),
        None => Ok(Config::default()),
    }
}
