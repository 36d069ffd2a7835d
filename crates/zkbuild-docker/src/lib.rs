//! zkbuild-docker — toolchain container sessions.
//!
//! - [`runtime::ContainerRuntime`] is the seam to a container runtime: start a
//!   container with the build directory mounted, run a shell command in it
//!   streaming combined output, stop it.
//! - [`docker::DockerCli`] implements it by driving the `docker` CLI.
//! - [`manager::SessionManager`] adds capture limits, failure-marker
//!   detection, stage timeouts and the mapping to [`zkbuild_core::BuildError`].

#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![deny(missing_docs)]
#![deny(clippy::unwrap_used, clippy::expect_used)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

/// Docker CLI runtime.
pub mod docker;
/// Stage execution with capture and failure judgement.
pub mod manager;
/// Runtime trait and its error type.
pub mod runtime;
/// Session handle and lifecycle state.
pub mod session;

pub use docker::DockerCli;
pub use manager::SessionManager;
pub use runtime::{ContainerRuntime, ExecStatus, RuntimeError};
pub use session::{ContainerSession, SessionState};
