//! Normalise a circuit source into `<build_dir>/source.code`.
//!
//! `.code` files are copied byte for byte; `.pcode` templates are handed to a
//! [`TemplateExpander`]. Afterwards the *original* source is scanned for
//! `import "...code"` directives: the toolchain container only sees the build
//! directory, so cross-file includes cannot resolve and fail the task.

use crate::error::{BuildError, Result};
use crate::resolve::{CANONICAL_EXTENSION, TEMPLATE_EXTENSION};
use crate::task::SOURCE_FILE;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::OnceLock;
use tracing::{debug, info};

static IMPORT_REGEX: OnceLock<Option<Regex>> = OnceLock::new();

fn import_regex() -> Option<&'static Regex> {
    IMPORT_REGEX
        .get_or_init(|| Regex::new(r#"import\s+"[^"\r\n]+\.p?code""#).ok())
        .as_ref()
}

/// Expands a template-form source into canonical form.
pub trait TemplateExpander {
    /// Write the expanded source of `source` to `output`. `build_dir` may hold
    /// intermediate files.
    fn expand(&self, source: &Path, output: &Path, build_dir: &Path) -> Result<()>;
}

/// Runs an external program: `argv... <source> <output> <build_dir>`.
#[derive(Debug, Clone)]
pub struct CommandExpander {
    argv: Vec<String>,
}

impl CommandExpander {
    /// Expander for a non-empty argv; `None` if `argv` is empty.
    #[must_use]
    pub fn new(argv: Vec<String>) -> Option<Self> {
        if argv.is_empty() {
            None
        } else {
            Some(Self { argv })
        }
    }
}

impl TemplateExpander for CommandExpander {
    fn expand(&self, source: &Path, output: &Path, build_dir: &Path) -> Result<()> {
        let (program, args) = self
            .argv
            .split_first()
            .ok_or_else(|| BuildError::Config("empty preprocessor command".into()))?;
        debug!(program, ?args, source = %source.display(), "running template expander");

        let out = Command::new(program)
            .args(args)
            .arg(source)
            .arg(output)
            .arg(build_dir)
            .output()
            .map_err(|e| BuildError::io(format!("spawning preprocessor {program}"), e))?;

        if !out.status.success() {
            return Err(BuildError::Preprocess {
                path: source.to_path_buf(),
                reason: format!(
                    "{program} exited with {}: {}",
                    out.status,
                    String::from_utf8_lossy(&out.stderr).trim()
                ),
            });
        }
        if !output.is_file() {
            return Err(BuildError::Preprocess {
                path: source.to_path_buf(),
                reason: format!("{program} did not write {}", output.display()),
            });
        }
        Ok(())
    }
}

/// Stand-in used when no expander is configured; every template fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoExpander;

impl TemplateExpander for NoExpander {
    fn expand(&self, source: &Path, _output: &Path, _build_dir: &Path) -> Result<()> {
        Err(BuildError::Preprocess {
            path: source.to_path_buf(),
            reason: "no template preprocessor configured ([preprocessor] command)".into(),
        })
    }
}

/// Produce `<build_dir>/source.code` from `source`, then run the import scan.
///
/// `build_dir` must already exist. Returns the path written.
pub fn preprocess(
    source: &Path,
    build_dir: &Path,
    expander: &dyn TemplateExpander,
) -> Result<PathBuf> {
    let target = build_dir.join(SOURCE_FILE);
    match source.extension().and_then(|e| e.to_str()) {
        Some(TEMPLATE_EXTENSION) => {
            info!("processing .pcode to .code and saving to build folder");
            expander.expand(source, &target, build_dir)?;
        }
        Some(CANONICAL_EXTENSION) => {
            info!("copying .code to build folder");
            std::fs::copy(source, &target).map_err(|e| {
                BuildError::io(
                    format!("copying {} to {}", source.display(), target.display()),
                    e,
                )
            })?;
        }
        _ => {
            return Err(BuildError::UnsupportedExtension {
                path: source.to_path_buf(),
            })
        }
    }

    check_imports(source)?;
    Ok(target)
}

/// Fail with [`BuildError::UnsupportedImport`] if `source` includes another file.
pub fn check_imports(source: &Path) -> Result<()> {
    let bytes = std::fs::read(source)
        .map_err(|e| BuildError::io(format!("reading {}", source.display()), e))?;
    let text = String::from_utf8_lossy(&bytes);
    find_import(&text).map_or(Ok(()), |directive| {
        Err(BuildError::UnsupportedImport {
            path: source.to_path_buf(),
            directive,
        })
    })
}

/// First include directive in `text`, if any.
#[must_use]
pub fn find_import(text: &str) -> Option<String> {
    import_regex()?.find(text).map(|m| m.as_str().to_owned())
}
