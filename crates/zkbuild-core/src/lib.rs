//! zkbuild-core — the data model and the container-free half of a trusted-setup build.
//!
//! This crate owns everything that can be decided on the host before (or
//! after) a toolchain container is involved:
//! - which proving backend a circuit targets ([`backend`]),
//! - which source files become build tasks and where they build ([`resolve`]),
//! - the empty-build-directory guard ([`guard`]),
//! - turning `.pcode`/`.code` sources into `source.code` ([`preprocess`]),
//! - bounded capture of toolchain output with failure detection ([`capture`]),
//! - recovering the verification key from `verifier.sol` ([`keys`]).
//!
//! ```no_run
//! use zkbuild_core::{resolve::resolve_sources, backend::infer_backend};
//! let tasks = resolve_sources("./code", "./build")?;
//! for (source, build_dir) in &tasks {
//!     let backend = infer_backend(source)?;
//!     println!("{} -> {} ({backend})", source.display(), build_dir.display());
//! }
//! # Ok::<(), zkbuild_core::BuildError>(())
//! ```

#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![deny(missing_docs)]
#![deny(clippy::unwrap_used, clippy::expect_used)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions, clippy::doc_markdown)]

/// Proving backends and inference from a source path.
pub mod backend;
/// Bounded output capture with failure-marker detection.
pub mod capture;
/// TOML configuration with defaults for every field.
pub mod config;
/// Error taxonomy shared by every stage of a build.
pub mod error;
/// Refuses to build into a non-empty directory.
pub mod guard;
/// Verification-key extraction from a generated verifier contract.
pub mod keys;
/// Source normalisation into `source.code` and the import scan.
pub mod preprocess;
/// Discovery of circuit sources and their build directories.
pub mod resolve;
/// Build tasks, stages and artifact sets.
pub mod task;

pub use backend::*;
pub use capture::StreamCapture;
pub use config::Config;
pub use error::*;
pub use task::*;

/// Commonly-used items for quick imports.
pub mod prelude {
    pub use crate::{
        backend::{infer_backend, Backend},
        capture::StreamCapture,
        config::Config,
        error::{BuildError, Result},
        task::{ArtifactSet, BuildTask, Stage},
    };
}
