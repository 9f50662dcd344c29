//! Startup checks
//!
//! Reports missing directories and programs up front instead of failing
//! halfway through a pass. Nothing here installs or creates anything.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::config::PackConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MissingCapability {
    /// Dataset directory does not exist
    DatasetDir(PathBuf),
    /// Store directory cannot be created under this ancestor
    StoreParent { path: PathBuf, reason: String },
    /// Render command is configured but its program is not on PATH
    RenderProgram(String),
}

impl fmt::Display for MissingCapability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DatasetDir(path) => {
                write!(f, "dataset directory not found: {}", path.display())
            }
            Self::StoreParent { path, reason } => {
                write!(f, "cannot create store under {}: {reason}", path.display())
            }
            Self::RenderProgram(program) => {
                write!(f, "render program '{program}' not found on PATH")
            }
        }
    }
}

/// Run every check against `config`.
pub fn check(config: &PackConfig) -> Vec<MissingCapability> {
    let mut missing = Vec::new();

    let dataset = config.dataset_path();
    if !dataset.is_dir() {
        missing.push(MissingCapability::DatasetDir(dataset));
    }

    if let Err(problem) = check_creatable(&config.store_path()) {
        missing.push(problem);
    }

    if let Some(program) = config.render_command.as_deref().and_then(render_program) {
        if which::which(program).is_err() {
            missing.push(MissingCapability::RenderProgram(program.to_string()));
        }
    }

    missing
}

/// First whitespace-separated token of a render command template.
pub fn render_program(command: &str) -> Option<&str> {
    command.split_whitespace().next()
}

/// `path` either exists as a directory or its nearest existing ancestor is a
/// writable directory.
fn check_creatable(path: &Path) -> Result<(), MissingCapability> {
    let mut current = Some(path);
    while let Some(p) = current {
        if p.exists() {
            let reason = if !p.is_dir() {
                Some("not a directory")
            } else if p != path && is_read_only(p) {
                Some("directory is read-only")
            } else {
                None
            };
            return match reason {
                Some(reason) => Err(MissingCapability::StoreParent {
                    path: p.to_path_buf(),
                    reason: reason.to_string(),
                }),
                None => Ok(()),
            };
        }
        current = p.parent().filter(|parent| !parent.as_os_str().is_empty());
    }
    // Relative path with no existing component: created under the cwd
    Ok(())
}

fn is_read_only(dir: &Path) -> bool {
    dir.metadata()
        .map(|m| m.permissions().readonly())
        .unwrap_or(true)
}
