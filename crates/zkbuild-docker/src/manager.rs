//! Stage execution on top of a [`ContainerRuntime`].
//!
//! A stage fails when the runtime errors, when the command exits non-zero, or
//! when the capture saw a failure marker. The last rule wins over a clean exit
//! status: the toolchain can abort without reporting it.

use crate::runtime::{ContainerRuntime, RuntimeError};
use crate::session::ContainerSession;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};
use zkbuild_core::config::CaptureConfig;
use zkbuild_core::{BuildError, Stage, StreamCapture};

/// Starts, drives and tears down sessions for one runtime.
#[derive(Debug, Clone)]
pub struct SessionManager<R> {
    runtime: R,
    capture: CaptureConfig,
    stage_timeout: Option<Duration>,
}

impl<R: ContainerRuntime> SessionManager<R> {
    /// Manager with the given capture limits and optional per-stage timeout.
    pub fn new(runtime: R, capture: CaptureConfig, stage_timeout: Option<Duration>) -> Self {
        Self {
            runtime,
            capture,
            stage_timeout,
        }
    }

    /// The wrapped runtime.
    pub fn runtime(&self) -> &R {
        &self.runtime
    }

    /// Launch a fresh session with `build_dir` mounted.
    pub async fn start(&self, build_dir: &Path) -> Result<ContainerSession, BuildError> {
        let session = self
            .runtime
            .start(build_dir)
            .await
            .map_err(|e| BuildError::ContainerLaunch(e.to_string()))?;
        info!(container = %session.id(), "container running");
        Ok(session)
    }

    /// Run one stage command and judge it.
    ///
    /// On success the capture is returned for echoing; on failure the stage's
    /// error carries the captured text (or the text from the failure marker on).
    pub async fn exec(
        &self,
        session: &ContainerSession,
        stage: Stage,
        command: &str,
    ) -> Result<StreamCapture, BuildError> {
        let mut capture = self.capture.new_capture();

        let outcome = match self.stage_timeout {
            Some(limit) => {
                let timed =
                    tokio::time::timeout(limit, self.runtime.exec(session, command, &mut capture))
                        .await;
                match timed {
                    Ok(r) => r,
                    Err(_) => {
                        let text = format!(
                            "{stage} timed out after {}s\n{}",
                            limit.as_secs(),
                            capture.text()
                        );
                        return Err(BuildError::stage_failed(stage, text));
                    }
                }
            }
            None => self.runtime.exec(session, command, &mut capture).await,
        };

        let status = match outcome {
            Ok(status) => status,
            Err(e) => {
                let text = format!("{e}\n{}", capture.text());
                return Err(BuildError::stage_failed(stage, text));
            }
        };

        if let Some(msg) = capture.failure_message() {
            return Err(BuildError::stage_failed(stage, msg.to_owned()));
        }
        if !status.success() {
            let code = status
                .code
                .map_or_else(|| "signal".to_string(), |c| c.to_string());
            let text = format!("exit status {code}\n{}", capture.text());
            return Err(BuildError::stage_failed(stage, text));
        }
        Ok(capture)
    }

    /// Tear a session down. Failures are logged here as well as returned.
    pub async fn stop(&self, session: &mut ContainerSession, force_kill: bool) -> Result<(), RuntimeError> {
        let r = self.runtime.stop(session, force_kill).await;
        match &r {
            Ok(()) => info!(container = %session.id(), force_kill, "container stopped"),
            Err(e) => warn!(container = %session.id(), error = %e, "failed to stop container"),
        }
        r
    }
}
