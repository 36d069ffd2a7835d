//! How `SessionManager::exec` judges a stage from exit status and output.

use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;
use zkbuild_core::config::CaptureConfig;
use zkbuild_core::{BuildError, Stage, StreamCapture};
use zkbuild_docker::{
    ContainerRuntime, ContainerSession, ExecStatus, RuntimeError, SessionManager, SessionState,
};

/// Replays fixed output and exit code for every command.
struct Scripted {
    chunks: Vec<&'static str>,
    code: Option<i32>,
    hang: bool,
    launch_fails: bool,
}

impl Scripted {
    fn new(chunks: Vec<&'static str>, code: Option<i32>) -> Self {
        Self {
            chunks,
            code,
            hang: false,
            launch_fails: false,
        }
    }
}

#[async_trait]
impl ContainerRuntime for Scripted {
    async fn start(&self, mount: &Path) -> Result<ContainerSession, RuntimeError> {
        if self.launch_fails {
            return Err(RuntimeError::Command {
                command: "docker run".into(),
                status: "exit status: 125".into(),
                stderr: "Unable to find image".into(),
            });
        }
        Ok(ContainerSession::new("0123456789abcdef", mount, SessionState::Running))
    }

    async fn exec(
        &self,
        _session: &ContainerSession,
        _command: &str,
        capture: &mut StreamCapture,
    ) -> Result<ExecStatus, RuntimeError> {
        for c in &self.chunks {
            capture.push_bytes(c.as_bytes());
        }
        if self.hang {
            std::future::pending::<()>().await;
        }
        Ok(ExecStatus { code: self.code })
    }

    async fn stop(
        &self,
        session: &mut ContainerSession,
        force_kill: bool,
    ) -> Result<(), RuntimeError> {
        session.set_state(if force_kill {
            SessionState::Killed
        } else {
            SessionState::Exited
        });
        Ok(())
    }
}

fn manager(rt: Scripted) -> SessionManager<Scripted> {
    SessionManager::new(rt, CaptureConfig::default(), Some(Duration::from_millis(200)))
}

#[tokio::test]
async fn clean_exit_returns_capture() {
    let m = manager(Scripted::new(vec!["Compiling source.code\n", "done\n"], Some(0)));
    let s = m.start(Path::new("/b")).await.unwrap();
    let cap = m.exec(&s, Stage::Compile, "compile").await.unwrap();
    assert_eq!(cap.text(), "Compiling source.code\ndone\n");
}

#[tokio::test]
async fn marker_overrides_clean_exit() {
    let m = manager(Scripted::new(
        vec!["Compiling\n", "thread 'main' panicked at 'out of memory'"],
        Some(0),
    ));
    let s = m.start(Path::new("/b")).await.unwrap();
    let err = m.exec(&s, Stage::Setup, "setup").await.unwrap_err();
    match err {
        BuildError::Setup { output } => assert!(output.starts_with("panicked at 'out of memory'")),
        other => panic!("unexpected {other:?}"),
    }
}

#[tokio::test]
async fn non_zero_exit_fails_with_output() {
    let m = manager(Scripted::new(vec!["cp: cannot stat 'out'"], Some(1)));
    let s = m.start(Path::new("/b")).await.unwrap();
    let err = m.exec(&s, Stage::CopyArtifacts, "cp").await.unwrap_err();
    assert_eq!(err.stage(), Stage::CopyArtifacts);
    assert!(err.to_string().contains("cannot stat"));
}

#[tokio::test]
async fn stalled_stage_times_out() {
    let mut rt = Scripted::new(vec!["partial"], Some(0));
    rt.hang = true;
    let m = manager(rt);
    let s = m.start(Path::new("/b")).await.unwrap();
    let err = m.exec(&s, Stage::ExportVerifier, "export-verifier").await.unwrap_err();
    assert!(matches!(&err, BuildError::ExportVerifier { output } if output.contains("timed out") && output.contains("partial")));
}

#[tokio::test]
async fn launch_failure_is_container_launch_error() {
    let mut rt = Scripted::new(vec![], Some(0));
    rt.launch_fails = true;
    let err = manager(rt).start(Path::new("/b")).await.unwrap_err();
    assert!(matches!(err, BuildError::ContainerLaunch(msg) if msg.contains("Unable to find image")));
}

#[tokio::test]
async fn stop_records_state() {
    let m = manager(Scripted::new(vec![], Some(0)));
    let mut s = m.start(Path::new("/b")).await.unwrap();
    m.stop(&mut s, true).await.unwrap();
    assert_eq!(s.state(), SessionState::Killed);
}
