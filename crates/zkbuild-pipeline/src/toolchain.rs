//! Shell commands run inside the toolchain container.
//!
//! Commands `cd` into the toolchain's working directory first; that is where
//! it writes `out`, the keys and `verifier.sol`. The copy stage then moves
//! them into the mounted code directory so they land in the build directory.

use zkbuild_core::config::ToolchainConfig;
use zkbuild_core::{Backend, SOURCE_FILE};

/// Command builder for one toolchain layout.
#[derive(Debug, Clone)]
pub struct Toolchain {
    workdir: String,
    binary: String,
    code_dir: String,
    artifacts: Vec<String>,
}

impl Toolchain {
    /// Layout from configuration.
    #[must_use]
    pub fn from_config(cfg: &ToolchainConfig) -> Self {
        Self {
            workdir: cfg.workdir.clone(),
            binary: cfg.binary.clone(),
            code_dir: cfg.code_dir.trim_end_matches('/').to_owned(),
            artifacts: cfg.artifacts.clone(),
        }
    }

    fn in_workdir(&self, rest: &str) -> String {
        format!("cd {} && {rest}", shell_quote(&self.workdir))
    }

    /// Compile `source.code` from the mounted directory.
    #[must_use]
    pub fn compile(&self) -> String {
        let input = format!("{}/{SOURCE_FILE}", self.code_dir);
        self.in_workdir(&format!(
            "{} compile -i {}",
            shell_quote(&self.binary),
            shell_quote(&input)
        ))
    }

    /// Trusted setup for `backend`.
    #[must_use]
    pub fn setup(&self, backend: Backend) -> String {
        self.in_workdir(&format!(
            "{} setup --proving-scheme {}",
            shell_quote(&self.binary),
            backend.scheme()
        ))
    }

    /// Generate `verifier.sol` for `backend`.
    #[must_use]
    pub fn export_verifier(&self, backend: Backend) -> String {
        self.in_workdir(&format!(
            "{} export-verifier --proving-scheme {}",
            shell_quote(&self.binary),
            backend.scheme()
        ))
    }

    /// Copy the configured outputs into the mounted directory.
    #[must_use]
    pub fn copy_artifacts(&self) -> String {
        let files: Vec<String> = self.artifacts.iter().map(|f| shell_quote(f)).collect();
        self.in_workdir(&format!(
            "cp {} {}/",
            files.join(" "),
            shell_quote(&self.code_dir)
        ))
    }
}

/// Single-quote `s` for bash unless it only has characters that need none.
fn shell_quote(s: &str) -> String {
    let plain = !s.is_empty()
        && s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "/._-+:=@".contains(c));
    if plain {
        s.to_owned()
    } else {
        format!("'{}'", s.replace('\'', r"'\''"))
    }
}
