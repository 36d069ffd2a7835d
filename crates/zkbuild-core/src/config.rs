//! Configuration for a zkbuild run, loaded from TOML.
//!
//! Every field has a default, so an empty (or absent) file is a valid
//! configuration. Command-line flags are applied on top by the binary.

use crate::capture::{StreamCapture, DEFAULT_FAILURE_MARKER, DEFAULT_MAX_CHARS};
use crate::error::{BuildError, Result};
use crate::task::{
    COMPILED_FILE, PROVING_KEY_FILE, VARIABLES_FILE, VERIFICATION_KEY_FILE, VERIFIER_FILE,
};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Container image and toolchain layout.
    #[serde(default)]
    pub toolchain: ToolchainConfig,
    /// Output capture limits and failure markers.
    #[serde(default)]
    pub capture: CaptureConfig,
    /// Stage sequencing and teardown.
    #[serde(default)]
    pub pipeline: PipelineConfig,
    /// Template (`.pcode`) expansion.
    #[serde(default)]
    pub preprocessor: PreprocessorConfig,
    /// Log filter.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Parse a TOML document.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| BuildError::Config(e.to_string()))
    }

    /// Read and parse a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let s = std::fs::read_to_string(path)
            .map_err(|e| BuildError::io(format!("reading config {}", path.display()), e))?;
        Self::from_toml_str(&s)
    }
}

/// Where the toolchain lives inside its container image.
#[derive(Debug, Clone, Deserialize)]
pub struct ToolchainConfig {
    /// Image every session is started from.
    #[serde(default = "ToolchainConfig::default_image")]
    pub image: String,
    /// Container runtime CLI.
    #[serde(default = "ToolchainConfig::default_docker")]
    pub docker: String,
    /// Directory commands run in; the toolchain writes its outputs here.
    #[serde(default = "ToolchainConfig::default_workdir")]
    pub workdir: String,
    /// Toolchain executable, relative to `workdir` or absolute.
    #[serde(default = "ToolchainConfig::default_binary")]
    pub binary: String,
    /// Mount point of the build directory inside the container.
    #[serde(default = "ToolchainConfig::default_code_dir")]
    pub code_dir: String,
    /// Files copied from `workdir` into the mounted build directory.
    #[serde(default = "ToolchainConfig::default_artifacts")]
    pub artifacts: Vec<String>,
}

impl ToolchainConfig {
    fn default_image() -> String {
        "zokrates/zokrates:0.4.10".to_string()
    }
    fn default_docker() -> String {
        "docker".to_string()
    }
    fn default_workdir() -> String {
        "/home/zokrates".to_string()
    }
    fn default_binary() -> String {
        "./zokrates".to_string()
    }
    fn default_code_dir() -> String {
        "/home/zokrates/code".to_string()
    }
    fn default_artifacts() -> Vec<String> {
        [
            COMPILED_FILE,
            PROVING_KEY_FILE,
            VERIFICATION_KEY_FILE,
            VARIABLES_FILE,
            VERIFIER_FILE,
        ]
        .iter()
        .map(|s| (*s).to_string())
        .collect()
    }
}

impl Default for ToolchainConfig {
    fn default() -> Self {
        Self {
            image: Self::default_image(),
            docker: Self::default_docker(),
            workdir: Self::default_workdir(),
            binary: Self::default_binary(),
            code_dir: Self::default_code_dir(),
            artifacts: Self::default_artifacts(),
        }
    }
}

/// Limits applied to every stage's captured output.
#[derive(Debug, Clone, Deserialize)]
pub struct CaptureConfig {
    /// Characters kept before the buffer is replaced by the truncation marker.
    #[serde(default = "CaptureConfig::default_max_chars")]
    pub max_chars: usize,
    /// Substrings that mark a stage as failed whatever its exit status.
    #[serde(default = "CaptureConfig::default_failure_markers")]
    pub failure_markers: Vec<String>,
    /// Characters of output echoed per stage when not verbose.
    #[serde(default = "CaptureConfig::default_echo_tail_chars")]
    pub echo_tail_chars: usize,
}

impl CaptureConfig {
    fn default_max_chars() -> usize {
        DEFAULT_MAX_CHARS
    }
    fn default_failure_markers() -> Vec<String> {
        vec![DEFAULT_FAILURE_MARKER.to_string()]
    }
    fn default_echo_tail_chars() -> usize {
        2_000
    }

    /// A fresh capture with these limits.
    #[must_use]
    pub fn new_capture(&self) -> StreamCapture {
        StreamCapture::new(self.max_chars, self.failure_markers.iter().cloned())
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            max_chars: Self::default_max_chars(),
            failure_markers: Self::default_failure_markers(),
            echo_tail_chars: Self::default_echo_tail_chars(),
        }
    }
}

/// What happens to a task's container after every stage succeeded.
///
/// Failed tasks always have their container killed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TeardownPolicy {
    /// Leave it running for manual inspection.
    #[default]
    Keep,
    /// Kill and remove it.
    Delete,
}

/// Stage sequencing options.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PipelineConfig {
    /// Container fate after a successful task.
    #[serde(default)]
    pub on_success: TeardownPolicy,
    /// Upper bound on a single stage; `None` waits forever.
    #[serde(default)]
    pub stage_timeout_secs: Option<u64>,
    /// Echo full stage output instead of its tail.
    #[serde(default)]
    pub verbose: bool,
}

impl PipelineConfig {
    /// Stage timeout as a `Duration`.
    #[must_use]
    pub fn stage_timeout(&self) -> Option<Duration> {
        self.stage_timeout_secs.map(Duration::from_secs)
    }
}

/// External template expander for `.pcode` sources.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PreprocessorConfig {
    /// Program and leading arguments; source, output and build directory are appended.
    #[serde(default)]
    pub command: Option<Vec<String>>,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// `tracing` filter directive used when `RUST_LOG` is unset.
    #[serde(default = "LoggingConfig::default_level")]
    pub level: String,
}

impl LoggingConfig {
    fn default_level() -> String {
        "info".to_string()
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_is_all_defaults() {
        let cfg = Config::from_toml_str("").unwrap();
        assert_eq!(cfg.toolchain.code_dir, "/home/zokrates/code");
        assert_eq!(cfg.toolchain.artifacts.len(), 5);
        assert_eq!(cfg.capture.max_chars, 10_000_000);
        assert_eq!(cfg.capture.failure_markers, vec!["panicked".to_string()]);
        assert_eq!(cfg.pipeline.on_success, TeardownPolicy::Keep);
        assert!(cfg.pipeline.stage_timeout().is_none());
        assert_eq!(cfg.logging.level, "info");
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let cfg = Config::from_toml_str(
            r#"
            [toolchain]
            image = "zokrates/zokrates:0.5.0"

            [pipeline]
            on_success = "delete"
            stage_timeout_secs = 3600

            [preprocessor]
            command = ["node", "preprop.js"]
            "#,
        )
        .unwrap();
        assert_eq!(cfg.toolchain.image, "zokrates/zokrates:0.5.0");
        assert_eq!(cfg.toolchain.docker, "docker");
        assert_eq!(cfg.pipeline.on_success, TeardownPolicy::Delete);
        assert_eq!(cfg.pipeline.stage_timeout(), Some(Duration::from_secs(3600)));
        let command = cfg.preprocessor.command.unwrap_or_default();
        assert_eq!(command, ["node", "preprop.js"]);
    }

    #[test]
    fn malformed_document_is_config_error() {
        let err = Config::from_toml_str("[pipeline]\non_success = \"sometimes\"").unwrap_err();
        assert!(matches!(err, BuildError::Config(_)));
    }
}
