//! Workspace reset: removes stale output artifacts before a new run.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::info;

/// Extensions of the artifacts regenerated by every run.
pub const DEFAULT_EXTENSIONS: &[&str] = &[".trace", ".trj"];

/// Errors raised while cleaning a working directory.
#[derive(Error, Debug)]
pub enum WorkspaceError {
    #[error("cannot list \"{}\": {source}", path.display())]
    List { path: PathBuf, source: io::Error },

    #[error("cannot remove \"{}\": {source}", path.display())]
    Remove { path: PathBuf, source: io::Error },
}

/// Deletes every regular file or symlink in `dir` whose name ends with one
/// of `extensions`.
///
/// Subdirectories are neither entered nor removed. A matching symlink is
/// removed itself, dangling or not; its target is left untouched. Returns the removed paths
/// sorted by name; a clean directory yields an empty vector.
///
/// # Errors
///
/// Returns a `WorkspaceError` as soon as listing `dir` or removing a file
/// fails. Files removed before the failure stay removed.
pub fn reset<S: AsRef<str>>(dir: &Path, extensions: &[S]) -> Result<Vec<PathBuf>, WorkspaceError> {
    let list_err = |source: io::Error| WorkspaceError::List {
        path: dir.to_path_buf(),
        source,
    };

    let mut stale = Vec::new();
    for entry in fs::read_dir(dir).map_err(list_err)? {
        let entry = entry.map_err(list_err)?;
        let file_type = entry.file_type().map_err(list_err)?;
        if !(file_type.is_file() || file_type.is_symlink()) {
            continue;
        }
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if extensions.iter().any(|ext| name.ends_with(ext.as_ref())) {
            stale.push(entry.path());
        }
    }
    stale.sort();

    for path in &stale {
        fs::remove_file(path).map_err(|source| WorkspaceError::Remove {
            path: path.clone(),
            source,
        })?;
        info!(path = %path.display(), "removed stale artifact");
    }

    Ok(stale)
}
