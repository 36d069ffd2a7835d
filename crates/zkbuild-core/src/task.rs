//! Build tasks, pipeline stages and the artifact set a task produces.

use crate::backend::Backend;
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

/// Canonical single-file source every task compiles.
pub const SOURCE_FILE: &str = "source.code";
/// Compiled circuit, human readable.
pub const COMPILED_TEXT_FILE: &str = "out.code";
/// Compiled circuit, toolchain binary format.
pub const COMPILED_FILE: &str = "out";
/// Proving key, binary.
pub const PROVING_KEY_FILE: &str = "proving.key";
/// Proving key, JSON.
pub const PROVING_JSON_FILE: &str = "proving.json";
/// Verification key, binary.
pub const VERIFICATION_KEY_FILE: &str = "verification.key";
/// Verification key, JSON.
pub const VERIFICATION_JSON_FILE: &str = "verification.json";
/// Verifier contract source.
pub const VERIFIER_FILE: &str = "verifier.sol";
/// Variables used in the R1CS.
pub const VARIABLES_FILE: &str = "variables.inf";

/// One unit of work: a source file, its exclusive build directory and backend.
///
/// Immutable once resolved; nothing is shared between tasks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildTask {
    /// Absolute path of the circuit source.
    pub source: PathBuf,
    /// Absolute, task-exclusive output directory.
    pub build_dir: PathBuf,
    /// Proving backend inferred from `source`.
    pub backend: Backend,
}

impl BuildTask {
    /// Construct a task.
    #[must_use]
    pub fn new(source: PathBuf, build_dir: PathBuf, backend: Backend) -> Self {
        Self {
            source,
            build_dir,
            backend,
        }
    }

    /// Artifact locations inside this task's build directory.
    #[must_use]
    pub fn artifacts(&self) -> ArtifactSet {
        ArtifactSet::new(&self.build_dir)
    }
}

/// Steps a task goes through, in order. Used to label progress and failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    /// Backend inference and support check.
    Backend,
    /// Empty-build-directory guard.
    Guard,
    /// Host-side setup (config, directory creation).
    Prepare,
    /// Copy or template-expand into `source.code`, then the import scan.
    Preprocess,
    /// Starting the toolchain container.
    Launch,
    /// `compile`
    Compile,
    /// Trusted setup producing proving and verification keys.
    Setup,
    /// `export-verifier`
    ExportVerifier,
    /// Copying outputs into the mounted build directory.
    CopyArtifacts,
    /// Parsing `verifier.sol` into `<basename>-vk.json`.
    ExtractKey,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Backend => "backend",
            Stage::Guard => "guard",
            Stage::Prepare => "prepare",
            Stage::Preprocess => "preprocess",
            Stage::Launch => "launch",
            Stage::Compile => "compile",
            Stage::Setup => "setup",
            Stage::ExportVerifier => "export-verifier",
            Stage::CopyArtifacts => "copy-artifacts",
            Stage::ExtractKey => "extract-key",
        };
        f.write_str(s)
    }
}

/// Named outputs of a task inside its build directory.
///
/// Only paths are held here; a set is complete when every stage through key
/// extraction succeeded. Files from a failed task are left where they are.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactSet {
    build_dir: PathBuf,
}

impl ArtifactSet {
    /// Artifact set rooted at `build_dir`.
    #[must_use]
    pub fn new(build_dir: impl Into<PathBuf>) -> Self {
        Self {
            build_dir: build_dir.into(),
        }
    }

    /// The build directory itself.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.build_dir
    }

    /// Last path component of the build directory, used to name the key document.
    #[must_use]
    pub fn basename(&self) -> String {
        self.build_dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// `source.code`
    #[must_use]
    pub fn source(&self) -> PathBuf {
        self.build_dir.join(SOURCE_FILE)
    }

    /// `out.code`
    #[must_use]
    pub fn compiled_text(&self) -> PathBuf {
        self.build_dir.join(COMPILED_TEXT_FILE)
    }

    /// `out`
    #[must_use]
    pub fn compiled(&self) -> PathBuf {
        self.build_dir.join(COMPILED_FILE)
    }

    /// `proving.key`
    #[must_use]
    pub fn proving_key(&self) -> PathBuf {
        self.build_dir.join(PROVING_KEY_FILE)
    }

    /// `proving.json`
    #[must_use]
    pub fn proving_json(&self) -> PathBuf {
        self.build_dir.join(PROVING_JSON_FILE)
    }

    /// `verification.key`
    #[must_use]
    pub fn verification_key(&self) -> PathBuf {
        self.build_dir.join(VERIFICATION_KEY_FILE)
    }

    /// `verification.json`
    #[must_use]
    pub fn verification_json(&self) -> PathBuf {
        self.build_dir.join(VERIFICATION_JSON_FILE)
    }

    /// `verifier.sol`
    #[must_use]
    pub fn verifier(&self) -> PathBuf {
        self.build_dir.join(VERIFIER_FILE)
    }

    /// `variables.inf`
    #[must_use]
    pub fn variables(&self) -> PathBuf {
        self.build_dir.join(VARIABLES_FILE)
    }

    /// `<basename>-vk.json`, the extracted verification key document.
    #[must_use]
    pub fn vk_document(&self) -> PathBuf {
        self.build_dir.join(format!("{}-vk.json", self.basename()))
    }

    /// Files a finished task must have produced that are not on disk.
    ///
    /// The JSON key dumps and `out.code` depend on the toolchain version, so
    /// only the files the pipeline itself copies or writes are checked.
    #[must_use]
    pub fn missing(&self) -> Vec<PathBuf> {
        [
            self.source(),
            self.compiled(),
            self.proving_key(),
            self.verification_key(),
            self.verifier(),
            self.variables(),
            self.vk_document(),
        ]
        .into_iter()
        .filter(|p| !p.is_file())
        .collect()
    }
}
