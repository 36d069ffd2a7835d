//! Sequential orchestration over every discovered source.

use crate::executor::Pipeline;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{error, info, info_span, Instrument};
use zkbuild_core::guard::ensure_empty_build_dir;
use zkbuild_core::preprocess::{preprocess, TemplateExpander};
use zkbuild_core::resolve::resolve_sources;
use zkbuild_core::{infer_backend, ArtifactSet, BuildError, BuildTask, Stage};
use zkbuild_docker::ContainerRuntime;

/// How one task ended.
#[derive(Debug)]
pub enum Outcome {
    /// Every stage through key extraction succeeded.
    Built(ArtifactSet),
    /// The task stopped at `error.stage()`.
    Failed(BuildError),
}

/// Result for one discovered source.
#[derive(Debug)]
pub struct TaskReport {
    /// Source file.
    pub source: PathBuf,
    /// Build directory it was mapped to.
    pub build_dir: PathBuf,
    /// Success or failure.
    pub outcome: Outcome,
}

impl TaskReport {
    /// Whether the task produced a complete artifact set.
    #[must_use]
    pub fn succeeded(&self) -> bool {
        matches!(self.outcome, Outcome::Built(_))
    }

    /// The error, if the task failed.
    #[must_use]
    pub fn error(&self) -> Option<&BuildError> {
        match &self.outcome {
            Outcome::Failed(e) => Some(e),
            Outcome::Built(_) => None,
        }
    }

    /// Stage the task failed in.
    #[must_use]
    pub fn failed_stage(&self) -> Option<Stage> {
        self.error().map(BuildError::stage)
    }
}

/// Per-task results in discovery order.
#[derive(Debug, Default)]
pub struct RunSummary {
    /// One report per discovered source.
    pub reports: Vec<TaskReport>,
}

/// Serializable line of a run summary.
#[derive(Debug, Serialize)]
pub struct SummaryLine<'a> {
    /// Source file.
    pub source: &'a Path,
    /// Build directory.
    pub build_dir: &'a Path,
    /// Failing stage, absent on success.
    pub stage: Option<Stage>,
    /// Error text, absent on success.
    pub error: Option<String>,
}

impl RunSummary {
    /// Number of tasks that built completely.
    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.reports.iter().filter(|r| r.succeeded()).count()
    }

    /// Number of failed tasks.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.reports.len() - self.succeeded()
    }

    /// True when no task failed (an empty run counts as success).
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failed() == 0
    }

    /// Failed tasks only.
    pub fn failures(&self) -> impl Iterator<Item = &TaskReport> {
        self.reports.iter().filter(|r| !r.succeeded())
    }

    /// Flat, serializable view of every report.
    #[must_use]
    pub fn lines(&self) -> Vec<SummaryLine<'_>> {
        self.reports
            .iter()
            .map(|r| SummaryLine {
                source: &r.source,
                build_dir: &r.build_dir,
                stage: r.failed_stage(),
                error: r.error().map(ToString::to_string),
            })
            .collect()
    }
}

/// Walks sources through backend check, guard, preprocessing and the pipeline.
pub struct Driver<R> {
    pipeline: Pipeline<R>,
    expander: Box<dyn TemplateExpander + Send + Sync>,
}

impl<R: ContainerRuntime> Driver<R> {
    /// Driver over `pipeline`, expanding templates with `expander`.
    pub fn new(pipeline: Pipeline<R>, expander: Box<dyn TemplateExpander + Send + Sync>) -> Self {
        Self { pipeline, expander }
    }

    /// The pipeline tasks run through.
    pub fn pipeline(&self) -> &Pipeline<R> {
        &self.pipeline
    }

    /// Discover sources under `code_path` and build each into `build_root`.
    ///
    /// Only discovery errors are returned as `Err`; task failures are in the summary.
    pub async fn setup(
        &self,
        code_path: impl AsRef<Path>,
        build_root: impl AsRef<Path>,
    ) -> Result<RunSummary, BuildError> {
        let sources = resolve_sources(code_path, build_root)?;
        info!(tasks = sources.len(), "discovered circuit sources");
        Ok(self.run(sources).await)
    }

    /// Process `(source, build_dir)` pairs strictly one after another.
    pub async fn run(&self, sources: Vec<(PathBuf, PathBuf)>) -> RunSummary {
        let mut summary = RunSummary::default();
        for (source, build_dir) in sources {
            let name = source
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let span = info_span!("task", source = %name);

            info!(
                parent: &span,
                source = %source.display(),
                build_dir = %build_dir.display(),
                "performing setup"
            );
            let outcome = match self
                .run_task(&source, &build_dir)
                .instrument(span.clone())
                .await
            {
                Ok(artifacts) => Outcome::Built(artifacts),
                Err(e) => {
                    error!(
                        parent: &span,
                        stage = %e.stage(),
                        error = %e,
                        "trusted setup has failed for {}",
                        source.display()
                    );
                    Outcome::Failed(e)
                }
            };
            summary.reports.push(TaskReport {
                source,
                build_dir,
                outcome,
            });
        }
        summary
    }

    async fn run_task(&self, source: &Path, build_dir: &Path) -> Result<ArtifactSet, BuildError> {
        let backend = infer_backend(source)?;
        backend.ensure_supported()?;

        ensure_empty_build_dir(build_dir)?;
        std::fs::create_dir_all(build_dir).map_err(|e| {
            BuildError::io(format!("creating build directory {}", build_dir.display()), e)
        })?;

        preprocess(source, build_dir, self.expander.as_ref())?;

        let task = BuildTask::new(source.to_path_buf(), build_dir.to_path_buf(), backend);
        self.pipeline.run(&task).await
    }
}
