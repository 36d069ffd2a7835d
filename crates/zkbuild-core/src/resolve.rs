//! Discovery of circuit sources and the build directory each one maps to.
//!
//! A root that itself ends in `.code` or `.pcode` is the only source and
//! builds straight into the output root. Any other root is scanned
//! recursively; each match builds into the output root joined with the
//! match's parent directory relative to the scan root, so `a/gm17/main.code`
//! builds into `<out>/a/gm17`.
//!
//! A root that does not exist matches nothing. A root that is a file with
//! any other extension is rejected.

use crate::error::{BuildError, Result};
use std::path::{Path, PathBuf};
use tracing::warn;

/// Extension of sources that need template expansion.
pub const TEMPLATE_EXTENSION: &str = "pcode";
/// Extension of sources that are copied as-is.
pub const CANONICAL_EXTENSION: &str = "code";

/// Whether the path has one of the two recognised source extensions.
#[must_use]
pub fn is_source_file(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some(TEMPLATE_EXTENSION | CANONICAL_EXTENSION)
    )
}

/// Make `path` absolute against the current directory without touching the file system.
pub fn absolutize(path: impl AsRef<Path>) -> Result<PathBuf> {
    let path = path.as_ref();
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let cwd = std::env::current_dir().map_err(|e| BuildError::io("reading current directory", e))?;
    Ok(cwd.join(path))
}

/// Resolve `(source, build_dir)` pairs in discovery order.
///
/// Directory scans are sorted by path and skip hidden entries. A directory
/// with no sources, or a root that does not exist, yields an empty list. A
/// root that is some other kind of file is [`BuildError::UnsupportedExtension`].
pub fn resolve_sources(
    code_path: impl AsRef<Path>,
    build_root: impl AsRef<Path>,
) -> Result<Vec<(PathBuf, PathBuf)>> {
    let code_path = absolutize(code_path)?;
    let build_root = absolutize(build_root)?;

    if is_source_file(&code_path) {
        return Ok(vec![(code_path, build_root)]);
    }
    if !code_path.exists() {
        warn!(path = %code_path.display(), "code path does not exist, nothing to build");
        return Ok(Vec::new());
    }
    if !code_path.is_dir() {
        return Err(BuildError::UnsupportedExtension { path: code_path });
    }

    let mut found = Vec::new();
    walk(&code_path, &mut found)?;
    found.sort();

    Ok(found
        .into_iter()
        .map(|source| {
            let rel_parent = source
                .strip_prefix(&code_path)
                .ok()
                .and_then(Path::parent)
                .map(Path::to_path_buf)
                .unwrap_or_default();
            let build_dir = build_root.join(rel_parent);
            (source, build_dir)
        })
        .collect())
}

fn walk(dir: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    let entries = std::fs::read_dir(dir)
        .map_err(|e| BuildError::io(format!("scanning {}", dir.display()), e))?;
    for entry in entries {
        let entry = entry.map_err(|e| BuildError::io(format!("scanning {}", dir.display()), e))?;
        if entry.file_name().to_string_lossy().starts_with('.') {
            continue;
        }
        let path = entry.path();
        let ty = entry
            .file_type()
            .map_err(|e| BuildError::io(format!("inspecting {}", path.display()), e))?;
        if ty.is_dir() {
            walk(&path, out)?;
        } else if is_source_file(&path) {
            out.push(path);
        }
    }
    Ok(())
}
