//! Ordered stages for a single task.

use crate::toolchain::Toolchain;
use tracing::{info, warn};
use zkbuild_core::config::{Config, TeardownPolicy};
use zkbuild_core::keys::extract_key_file;
use zkbuild_core::{ArtifactSet, BuildError, BuildTask, Stage, StreamCapture};
use zkbuild_docker::{ContainerRuntime, ContainerSession, SessionManager};

/// Runs compile → setup → export-verifier → copy-artifacts → extract-key.
///
/// Each task gets its own session, which is killed if any stage fails and
/// otherwise handled per [`TeardownPolicy`].
#[derive(Debug)]
pub struct Pipeline<R> {
    sessions: SessionManager<R>,
    toolchain: Toolchain,
    on_success: TeardownPolicy,
    verbose: bool,
    echo_tail_chars: usize,
    runtime_program: String,
}

impl<R: ContainerRuntime> Pipeline<R> {
    /// Pipeline over `runtime` configured by `cfg`.
    pub fn new(runtime: R, cfg: &Config) -> Self {
        Self {
            sessions: SessionManager::new(
                runtime,
                cfg.capture.clone(),
                cfg.pipeline.stage_timeout(),
            ),
            toolchain: Toolchain::from_config(&cfg.toolchain),
            on_success: cfg.pipeline.on_success,
            verbose: cfg.pipeline.verbose,
            echo_tail_chars: cfg.capture.echo_tail_chars,
            runtime_program: cfg.toolchain.docker.clone(),
        }
    }

    /// Shell command an operator can use to enter container `id`.
    #[must_use]
    pub fn connect_command(&self, id: &str) -> String {
        format!("{} exec -ti {id} bash", self.runtime_program)
    }

    /// Session manager, mostly for inspecting the runtime in tests.
    pub fn sessions(&self) -> &SessionManager<R> {
        &self.sessions
    }

    /// Run every stage for `task`. Files already written stay in the build
    /// directory whatever the outcome.
    pub async fn run(&self, task: &BuildTask) -> Result<ArtifactSet, BuildError> {
        task.backend.ensure_supported()?;
        let artifacts = task.artifacts();
        let name = artifacts.basename();

        info!(
            project = %name,
            build_dir = %task.build_dir.display(),
            backend = %task.backend,
            "preparing toolchain build"
        );

        let mut session = self.sessions.start(&task.build_dir).await?;
        info!(
            "to connect to the {name} container manually: '{}'",
            self.connect_command(session.id())
        );

        if let Err(e) = self.run_stages(&session, task, &artifacts).await {
            let _ = self.sessions.stop(&mut session, true).await;
            return Err(e);
        }

        match self.on_success {
            TeardownPolicy::Delete => {
                if self.sessions.stop(&mut session, true).await.is_ok() {
                    info!("container {} killed, because delete on finish is set", session.id());
                }
            }
            TeardownPolicy::Keep => info!(
                "container {} left running; connect with '{}'",
                session.short_id(),
                self.connect_command(session.id())
            ),
        }

        let missing = artifacts.missing();
        if !missing.is_empty() {
            warn!(?missing, "build finished but some artifacts are absent");
        }
        info!("{name} SETUP COMPLETE");
        Ok(artifacts)
    }

    async fn run_stages(
        &self,
        session: &ContainerSession,
        task: &BuildTask,
        artifacts: &ArtifactSet,
    ) -> Result<(), BuildError> {
        let stages = [
            (Stage::Compile, self.toolchain.compile()),
            (Stage::Setup, self.toolchain.setup(task.backend)),
            (Stage::ExportVerifier, self.toolchain.export_verifier(task.backend)),
            (Stage::CopyArtifacts, self.toolchain.copy_artifacts()),
        ];

        for (stage, command) in stages {
            info!(%stage, "running");
            let capture = self.sessions.exec(session, stage, &command).await?;
            self.echo(stage, &capture);
            info!(%stage, "complete");
        }

        info!(stage = %Stage::ExtractKey, "running");
        let vk = extract_key_file(&artifacts.verifier(), &artifacts.vk_document())?;
        info!(
            fields = vk.len(),
            file = %artifacts.vk_document().display(),
            "verification key extracted"
        );
        Ok(())
    }

    fn echo(&self, stage: Stage, capture: &StreamCapture) {
        let text = if self.verbose {
            capture.text()
        } else {
            capture.tail(self.echo_tail_chars)
        };
        let text = text.trim_end();
        if !text.is_empty() {
            info!(target: "zkbuild::toolchain", %stage, "\n{text}");
        }
    }
}
