//! Refuse to build into a directory that already holds files.

use crate::error::{BuildError, Result};
use std::path::Path;
use tracing::error;

/// Pass if `dir` does not exist or is empty; fail with
/// [`BuildError::BuildDirectoryNotEmpty`] otherwise.
///
/// The directory is never created here.
pub fn ensure_empty_build_dir(dir: impl AsRef<Path>) -> Result<()> {
    let dir = dir.as_ref();
    if !dir.exists() {
        return Ok(());
    }
    let mut entries = std::fs::read_dir(dir)
        .map_err(|e| BuildError::io(format!("listing build directory {}", dir.display()), e))?;
    if entries.next().is_none() {
        return Ok(());
    }
    error!(dir = %dir.display(), "build directory is not empty");
    Err(BuildError::BuildDirectoryNotEmpty {
        dir: dir.to_path_buf(),
    })
}
