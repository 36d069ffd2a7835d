//! Error taxonomy for a single build task.
//!
//! Every variant is fatal to the task that raised it. The driver catches each
//! task's error independently, so nothing here is retried.

use crate::task::Stage;
use std::path::PathBuf;

/// Crate-wide result alias.
pub type Result<T, E = BuildError> = std::result::Result<T, E>;

/// Why a build task failed.
#[allow(missing_docs)]
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error(
        "the code must have gm17 or pghr13 in the full path to indicate the backend to use: {path}"
    )]
    BackendUnresolved { path: PathBuf },

    #[error("backend {backend} is recognised but not supported end-to-end (only gm17 is)")]
    UnsupportedBackend { backend: String },

    #[error("invalid file extension for {path}: expected .code or .pcode")]
    UnsupportedExtension { path: PathBuf },

    #[error("user includes are not supported ({directive} in {path})")]
    UnsupportedImport { path: PathBuf, directive: String },

    #[error("build directory is not empty, empty it before setup can proceed: {dir}")]
    BuildDirectoryNotEmpty { dir: PathBuf },

    #[error("template preprocessing of {path} failed: {reason}")]
    Preprocess { path: PathBuf, reason: String },

    #[error("failed to launch toolchain container: {0}")]
    ContainerLaunch(String),

    #[error("compile failed: {output}")]
    Compile { output: String },

    #[error("trusted setup failed: {output}")]
    Setup { output: String },

    #[error("export-verifier failed: {output}")]
    ExportVerifier { output: String },

    #[error("copying artifacts out of the container failed: {output}")]
    ArtifactCopy { output: String },

    #[error("no verification key found in {path}: {reason}")]
    KeyExtraction { path: PathBuf, reason: String },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl BuildError {
    /// Wrap an I/O error with a short description of what was being attempted.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Build the error a failed toolchain stage raises, carrying its output.
    ///
    /// Only the four container stages have a dedicated variant; any other stage
    /// is reported as a launch failure since nothing else runs inside a session.
    #[must_use]
    pub fn stage_failed(stage: Stage, output: String) -> Self {
        match stage {
            Stage::Compile => Self::Compile { output },
            Stage::Setup => Self::Setup { output },
            Stage::ExportVerifier => Self::ExportVerifier { output },
            Stage::CopyArtifacts => Self::ArtifactCopy { output },
            _ => Self::ContainerLaunch(output),
        }
    }

    /// The stage this error belongs to.
    #[must_use]
    pub fn stage(&self) -> Stage {
        match self {
            Self::BackendUnresolved { .. } | Self::UnsupportedBackend { .. } => Stage::Backend,
            Self::BuildDirectoryNotEmpty { .. } => Stage::Guard,
            Self::UnsupportedExtension { .. }
            | Self::UnsupportedImport { .. }
            | Self::Preprocess { .. } => Stage::Preprocess,
            Self::ContainerLaunch(_) => Stage::Launch,
            Self::Compile { .. } => Stage::Compile,
            Self::Setup { .. } => Stage::Setup,
            Self::ExportVerifier { .. } => Stage::ExportVerifier,
            Self::ArtifactCopy { .. } => Stage::CopyArtifacts,
            Self::KeyExtraction { .. } => Stage::ExtractKey,
            Self::Config(_) | Self::Io { .. } => Stage::Prepare,
        }
    }
}
