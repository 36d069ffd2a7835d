//! The container runtime seam.

use crate::session::ContainerSession;
use async_trait::async_trait;
use std::path::Path;
use zkbuild_core::StreamCapture;

/// Runtime-level failure, before any judgement about the stage it served.
#[allow(missing_docs)]
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` exited with {status}: {stderr}")]
    Command {
        command: String,
        status: String,
        stderr: String,
    },

    #[error("container runtime returned no container id")]
    EmptyId,

    #[error("session {0} is not running")]
    NotRunning(String),

    #[error("reading container output: {0}")]
    Stream(#[from] std::io::Error),
}

/// How an executed command ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecStatus {
    /// Exit code; `None` when terminated by a signal.
    pub code: Option<i32>,
}

impl ExecStatus {
    /// Exit code zero.
    #[must_use]
    pub fn success(self) -> bool {
        self.code == Some(0)
    }
}

/// Operations a container runtime must provide.
///
/// Implementations must not judge output; they only move bytes into the
/// capture and report completion.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Create and start a container with `mount` bind-mounted, in `Running` state.
    async fn start(&self, mount: &Path) -> Result<ContainerSession, RuntimeError>;

    /// Run `command` through a shell in `session`, feeding combined
    /// stdout/stderr into `capture` until the command ends.
    async fn exec(
        &self,
        session: &ContainerSession,
        command: &str,
        capture: &mut StreamCapture,
    ) -> Result<ExecStatus, RuntimeError>;

    /// Stop `session`: killed and removed when `force_kill`, otherwise stopped.
    async fn stop(&self, session: &mut ContainerSession, force_kill: bool)
        -> Result<(), RuntimeError>;
}
