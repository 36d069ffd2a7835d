//! [`ContainerRuntime`] over the `docker` command-line client.
//!
//! Containers are started detached with a TTY and `/bin/bash` as entrypoint so
//! they idle until commands are exec'd into them. The build directory is
//! bind-mounted at the toolchain's code directory.

use crate::runtime::{ContainerRuntime, ExecStatus, RuntimeError};
use crate::session::{ContainerSession, SessionState};
use async_trait::async_trait;
use std::io;
use std::path::Path;
use std::process::Stdio;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tracing::debug;
use zkbuild_core::config::ToolchainConfig;
use zkbuild_core::StreamCapture;

const READ_CHUNK: usize = 8 << 10;

/// Docker (or a CLI-compatible runtime such as podman).
#[derive(Debug, Clone)]
pub struct DockerCli {
    program: String,
    image: String,
    workdir: String,
    code_dir: String,
}

impl DockerCli {
    /// Runtime for the image and layout in `cfg`.
    #[must_use]
    pub fn from_config(cfg: &ToolchainConfig) -> Self {
        Self {
            program: cfg.docker.clone(),
            image: cfg.image.clone(),
            workdir: cfg.workdir.clone(),
            code_dir: cfg.code_dir.clone(),
        }
    }

    /// Arguments that start a session for `mount`.
    #[must_use]
    pub fn run_args(&self, mount: &Path) -> Vec<String> {
        vec![
            "run".into(),
            "--detach".into(),
            "--tty".into(),
            "--entrypoint".into(),
            "/bin/bash".into(),
            "--workdir".into(),
            self.workdir.clone(),
            "--volume".into(),
            format!("{}:{}", mount.display(), self.code_dir),
            self.image.clone(),
        ]
    }

    /// Arguments that run `command` in container `id`.
    #[must_use]
    pub fn exec_args(&self, id: &str, command: &str) -> Vec<String> {
        vec![
            "exec".into(),
            id.into(),
            "/bin/bash".into(),
            "-c".into(),
            command.into(),
        ]
    }

    /// Argument lists that stop container `id`, run in order.
    #[must_use]
    pub fn stop_args(id: &str, force_kill: bool) -> Vec<Vec<String>> {
        if force_kill {
            vec![vec!["rm".into(), "--force".into(), id.into()]]
        } else {
            vec![vec!["stop".into(), id.into()], vec!["rm".into(), id.into()]]
        }
    }

    async fn run_to_completion(&self, args: &[String]) -> Result<String, RuntimeError> {
        debug!(program = %self.program, ?args, "container runtime call");
        let out = Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|source| RuntimeError::Spawn {
                program: self.program.clone(),
                source,
            })?;
        if !out.status.success() {
            return Err(RuntimeError::Command {
                command: format!("{} {}", self.program, args.join(" ")),
                status: out.status.to_string(),
                stderr: String::from_utf8_lossy(&out.stderr).trim().to_owned(),
            });
        }
        Ok(String::from_utf8_lossy(&out.stdout).into_owned())
    }
}

#[async_trait]
impl ContainerRuntime for DockerCli {
    async fn start(&self, mount: &Path) -> Result<ContainerSession, RuntimeError> {
        let stdout = self.run_to_completion(&self.run_args(mount)).await?;
        let id = stdout.trim();
        if id.is_empty() {
            return Err(RuntimeError::EmptyId);
        }
        Ok(ContainerSession::new(id, mount, SessionState::Running))
    }

    async fn exec(
        &self,
        session: &ContainerSession,
        command: &str,
        capture: &mut StreamCapture,
    ) -> Result<ExecStatus, RuntimeError> {
        if !session.is_running() {
            return Err(RuntimeError::NotRunning(session.id().to_owned()));
        }
        let args = self.exec_args(session.id(), command);
        debug!(session = %session.short_id(), command, "exec");

        let mut child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| RuntimeError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        let missing = || io::Error::new(io::ErrorKind::BrokenPipe, "output pipe not captured");
        let mut stdout = child.stdout.take().ok_or_else(missing)?;
        let mut stderr = child.stderr.take().ok_or_else(missing)?;

        let mut out_buf = vec![0u8; READ_CHUNK];
        let mut err_buf = vec![0u8; READ_CHUNK];
        let (mut out_open, mut err_open) = (true, true);
        while out_open || err_open {
            tokio::select! {
                r = stdout.read(&mut out_buf), if out_open => match r? {
                    0 => out_open = false,
                    n => capture.push_bytes(&out_buf[..n]),
                },
                r = stderr.read(&mut err_buf), if err_open => match r? {
                    0 => err_open = false,
                    n => capture.push_bytes(&err_buf[..n]),
                },
            }
        }

        let status = child.wait().await?;
        Ok(ExecStatus {
            code: status.code(),
        })
    }

    async fn stop(
        &self,
        session: &mut ContainerSession,
        force_kill: bool,
    ) -> Result<(), RuntimeError> {
        for args in Self::stop_args(session.id(), force_kill) {
            self.run_to_completion(&args).await?;
        }
        session.set_state(if force_kill {
            SessionState::Killed
        } else {
            SessionState::Exited
        });
        Ok(())
    }
}
