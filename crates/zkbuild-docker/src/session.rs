//! A running toolchain container bound to one build directory.

use std::fmt;
use std::path::{Path, PathBuf};

/// Lifecycle of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// Created but not yet started.
    Created,
    /// Accepting commands.
    Running,
    /// Stopped gracefully.
    Exited,
    /// Force-killed and removed.
    Killed,
}

/// Handle to one container, owned by the pipeline of a single task.
///
/// Not `Clone`: exactly one owner decides when it is torn down.
#[derive(Debug, PartialEq, Eq)]
pub struct ContainerSession {
    id: String,
    mount: PathBuf,
    state: SessionState,
}

impl ContainerSession {
    /// A session for container `id` with `mount` bind-mounted.
    #[must_use]
    pub fn new(id: impl Into<String>, mount: impl Into<PathBuf>, state: SessionState) -> Self {
        Self {
            id: id.into(),
            mount: mount.into(),
            state,
        }
    }

    /// Runtime-assigned container id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Shortened id for log lines.
    #[must_use]
    pub fn short_id(&self) -> &str {
        self.id.get(..12).unwrap_or(&self.id)
    }

    /// Host directory mounted into the container.
    #[must_use]
    pub fn mount(&self) -> &Path {
        &self.mount
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Record a state transition.
    pub fn set_state(&mut self, state: SessionState) {
        self.state = state;
    }

    /// Whether commands can still be run.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state == SessionState::Running
    }
}

impl fmt::Display for ContainerSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.short_id(), self.mount.display())
    }
}
