//! zkbuild-pipeline — from discovered sources to artifact sets.
//!
//! [`executor::Pipeline`] runs the container stages of one task in order
//! (compile, setup, export-verifier, copy-artifacts) and then extracts the
//! verification key. [`driver::Driver`] walks every discovered source, one at
//! a time, through backend check, guard, preprocessing and the pipeline, and
//! collects a [`driver::RunSummary`]. One task failing never stops the next.

#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![deny(missing_docs)]
#![deny(clippy::unwrap_used, clippy::expect_used)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

/// Batch orchestration and result aggregation.
pub mod driver;
/// Per-task stage sequencing and teardown.
pub mod executor;
/// Shell commands for the compiler toolchain.
pub mod toolchain;

pub use driver::{Driver, Outcome, RunSummary, TaskReport};
pub use executor::Pipeline;
pub use toolchain::Toolchain;
