// crates/zkbuild-cli/src/main.rs

#![forbid(unsafe_code)]
#![deny(
    rust_2018_idioms,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo
)]

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use zkbuild_core::config::{Config, TeardownPolicy};
use zkbuild_core::preprocess::{CommandExpander, NoExpander, TemplateExpander};
use zkbuild_docker::DockerCli;
use zkbuild_pipeline::{Driver, Pipeline, RunSummary};

const DEFAULT_CONFIG_FILE: &str = "zkbuild.toml";

#[derive(Parser, Debug)]
#[command(
    name = "zkbuild",
    about = "Trusted setup for zero-knowledge circuits",
    long_about = "Trusted setup for zero-knowledge circuits.\n\n\
        Compiles every .code/.pcode source under --code-path inside a toolchain container, \
        runs the trusted setup, exports a verifier contract and extracts its verification key. \
        The backend is inferred from the path: it must contain gm17 or pghr13. \
        File includes are not supported.",
    version = env!("CARGO_PKG_VERSION"),
    disable_help_subcommand = true
)]
struct Cli {
    #[command(subcommand)]
    cmd: Cmd,

    #[command(flatten)]
    common: Common,
}

#[derive(Args, Debug)]
struct Common {
    /// Source file or directory to build
    #[arg(long, global = true, default_value = "./code")]
    code_path: PathBuf,

    /// Output root; each source builds into its own subdirectory
    #[arg(long, global = true, default_value = "./build")]
    build_dir: PathBuf,

    /// Echo full toolchain output instead of its tail
    #[arg(long, global = true)]
    verbose: bool,

    /// Remove containers after a successful build
    #[arg(long, global = true)]
    delete: bool,

    /// Configuration file (TOML); defaults to ./zkbuild.toml when present
    #[arg(long, global = true, env = "ZKBUILD_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Compile, run trusted setup and export verifiers into --build-dir
    Setup {
        /// Also write the run summary as JSON to this file
        #[arg(long)]
        summary_json: Option<PathBuf>,
    },

    /// Compute a witness from a previous build (not yet implemented)
    Witness {
        /// Arguments for compute-witness, space separated
        #[arg(long, default_value = "")]
        witness_args: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli.common)?;
    init_tracing(&config.logging.level);

    match cli.cmd {
        Cmd::Setup { summary_json } => setup(&cli.common, &config, summary_json.as_deref()).await,
        Cmd::Witness { witness_args } => witness(&cli.common, &witness_args),
    }
}

/// Initialize tracing with an env-driven filter, falling back to the configured level.
fn init_tracing(level: &str) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let fmt_layer = fmt::layer().with_target(false).with_level(true).compact();

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init();
}

/// Read the config file (explicit, or `./zkbuild.toml` if present) and apply flags.
fn load_config(common: &Common) -> Result<Config> {
    let mut config = match &common.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None if Path::new(DEFAULT_CONFIG_FILE).is_file() => Config::from_file(DEFAULT_CONFIG_FILE)
            .with_context(|| format!("loading config from {DEFAULT_CONFIG_FILE}"))?,
        None => Config::default(),
    };

    if common.delete {
        config.pipeline.on_success = TeardownPolicy::Delete;
    }
    if common.verbose {
        config.pipeline.verbose = true;
    }
    Ok(config)
}

fn expander(config: &Config) -> Box<dyn TemplateExpander + Send + Sync> {
    match config
        .preprocessor
        .command
        .clone()
        .and_then(CommandExpander::new)
    {
        Some(cmd) => Box::new(cmd),
        None => Box::new(NoExpander),
    }
}

async fn setup(common: &Common, config: &Config, summary_json: Option<&Path>) -> Result<()> {
    println!("====");
    println!("==== zkbuild trusted setup");
    println!("==== Code path:       {}", common.code_path.display());
    println!("==== Build directory: {}", common.build_dir.display());
    println!("==== This may take an hour or so.");
    println!("====\n");

    let runtime = DockerCli::from_config(&config.toolchain);
    let driver = Driver::new(Pipeline::new(runtime, config), expander(config));

    let summary = driver
        .setup(&common.code_path, &common.build_dir)
        .await
        .with_context(|| format!("discovering sources under {}", common.code_path.display()))?;

    if let Some(path) = summary_json {
        write_summary(path, &summary)?;
    }
    report(&summary);

    if !summary.is_success() {
        bail!(
            "TRUSTED SETUP FAILED: {} of {} tasks failed",
            summary.failed(),
            summary.reports.len()
        );
    }
    println!("==");
    println!("== zkbuild SETUP COMPLETE ({} built)", summary.succeeded());
    println!("==");
    Ok(())
}

fn report(summary: &RunSummary) {
    for r in &summary.reports {
        match r.error() {
            None => println!("OK    {} -> {}", r.source.display(), r.build_dir.display()),
            Some(e) => println!("FAIL  {} [{}] {e}", r.source.display(), e.stage()),
        }
    }
    if summary.is_success() {
        return;
    }
    let bar = "*".repeat(100);
    println!("\n{bar}");
    for r in summary.failures() {
        println!("Trusted setup has failed for {}.", r.source.display());
    }
    println!("The most common cause of errors is insufficient resources allocated to the container runtime.");
    println!("Increase the memory available to Docker and run again.");
    println!("{bar}");
}

fn write_summary(path: &Path, summary: &RunSummary) -> Result<()> {
    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("creating parent directory {}", dir.display()))?;
        }
    }
    let json = serde_json::to_vec_pretty(&summary.lines()).context("serialize run summary")?;
    std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
    info!(file = %path.display(), "run summary written");
    Ok(())
}

fn witness(common: &Common, witness_args: &str) -> Result<()> {
    let args: Vec<&str> = witness_args.split_whitespace().collect();
    println!("== Witness calculation");
    println!("== Build directory: {}", common.build_dir.display());
    println!("== Arguments: {args:?}");
    bail!("witness calculation not yet implemented");
}
