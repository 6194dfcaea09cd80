//! `pms`: pipeline merge sort front-end.
//!
//! ```bash
//! # Write 16 random bytes to ./numbers, then sort them through 5 stages
//! cargo run --bin pms -- generate
//! RUST_LOG=debug cargo run --bin pms -- sort
//!
//! # 1024 elements, timing only
//! cargo run --bin pms -- generate -n 1024
//! cargo run --bin pms -- sort -n 1024 --bench
//! ```

use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use pms_pipeline::{PipelineCoordinator, PipelineError};
use pms_types::Rank;
use pms_types::config::{SortConfig, DEFAULT_CHANNEL_CAPACITY, DEFAULT_ELEMENTS};

const DEFAULT_INPUT: &str = "numbers";

// ── Exit codes ────────────────────────────────────────────────────────────────

const EXIT_INPUT_ERR: u8 = 1;
const EXIT_PROCESS_ERR: u8 = 2;

// ── CLI ───────────────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name    = "pms",
    version = env!("CARGO_PKG_VERSION"),
    about   = "Pipeline merge sort over a chain of concurrent stages"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Sort the bytes of the input file and print input and output.
    Sort(SortArgs),

    /// Write a file of random bytes to sort.
    Generate(GenerateArgs),
}

#[derive(Args)]
struct SortArgs {
    /// File whose bytes are the elements to sort.
    #[arg(short, long, env = "PMS_INPUT", default_value = DEFAULT_INPUT)]
    input: PathBuf,

    /// Expected element count. Must be a power of two.
    #[arg(short = 'n', long, env = "PMS_ELEMENTS", default_value_t = DEFAULT_ELEMENTS)]
    elements: usize,

    /// Stage count. Defaults to log2(elements) + 1.
    #[arg(short = 'p', long, env = "PMS_STAGES")]
    stages: Option<usize>,

    /// Messages each link buffers before its sender waits.
    #[arg(long, env = "PMS_CHANNEL_CAPACITY", default_value_t = DEFAULT_CHANNEL_CAPACITY)]
    channel_capacity: usize,

    /// Print only the elapsed sort time.
    #[arg(long)]
    bench: bool,

    /// Also print per-stage reports as JSON.
    #[arg(long)]
    report: bool,
}

impl SortArgs {
    fn config(&self) -> SortConfig {
        let config = SortConfig::for_elements(self.elements)
            .with_channel_capacity(self.channel_capacity);
        match self.stages {
            Some(stages) => config.with_stages(stages),
            None => config,
        }
    }
}

#[derive(Args)]
struct GenerateArgs {
    /// File to write.
    #[arg(short, long, env = "PMS_INPUT", default_value = DEFAULT_INPUT)]
    output: PathBuf,

    /// Number of bytes to write.
    #[arg(short = 'n', long, env = "PMS_ELEMENTS", default_value_t = DEFAULT_ELEMENTS)]
    elements: usize,

    /// Seed for reproducible output.
    #[arg(long)]
    seed: Option<u64>,
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> ExitCode {
    // Default log level: INFO. Override with RUST_LOG=pms_pipeline=debug etc.
    // Logs go to stderr; stdout carries only sequences.
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Command::Sort(args)     => run_sort(args).await,
        Command::Generate(args) => run_generate(args),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(rank = ?error_rank(&err), "{err:#}");
            ExitCode::from(exit_status(&err))
        }
    }
}

// ── Sort ──────────────────────────────────────────────────────────────────────

async fn run_sort(args: SortArgs) -> Result<()> {
    // Config errors surface before the input file is touched.
    let coordinator = PipelineCoordinator::new(&args.config())?;

    let input = tokio::fs::read(&args.input)
        .await
        .with_context(|| format!("cannot read input file {}", args.input.display()))?;

    let outcome = coordinator.run(input.clone()).await?;

    if args.bench {
        println!("{}ms", outcome.elapsed.as_secs_f64() * 1000.0);
    } else {
        println!("{}", format_sequence(&input, " "));
        println!("{}", format_sequence(&outcome.sorted, "\n"));
    }

    if args.report {
        println!("{}", serde_json::to_string_pretty(&outcome.reports)?);
    }
    Ok(())
}

/// Values joined by `delimiter`, printed as numbers rather than characters.
fn format_sequence(values: &[u8], delimiter: &str) -> String {
    values
        .iter()
        .map(u8::to_string)
        .collect::<Vec<_>>()
        .join(delimiter)
}

// ── Generate ──────────────────────────────────────────────────────────────────

fn run_generate(args: GenerateArgs) -> Result<()> {
    let mut rng = match args.seed {
        Some(seed) => fastrand::Rng::with_seed(seed),
        None => fastrand::Rng::new(),
    };
    let bytes = random_bytes(&mut rng, args.elements);

    std::fs::write(&args.output, &bytes)
        .with_context(|| format!("cannot write {}", args.output.display()))?;

    info!(path = %args.output.display(), elements = bytes.len(), "wrote input file");
    Ok(())
}

fn random_bytes(rng: &mut fastrand::Rng, count: usize) -> Vec<u8> {
    (0..count).map(|_| rng.u8(..)).collect()
}

// ── Exit status ───────────────────────────────────────────────────────────────

/// Stage a failure is attributed to. Configuration errors count against the
/// Source (rank 0); I/O errors belong to no stage.
fn error_rank(err: &anyhow::Error) -> Option<Rank> {
    err.downcast_ref::<PipelineError>().map(PipelineError::rank)
}

/// Input problems (bad file, wrong element count) exit with 1; everything
/// else, configuration included, with 2.
fn exit_status(err: &anyhow::Error) -> u8 {
    if err.downcast_ref::<io::Error>().is_some() {
        return EXIT_INPUT_ERR;
    }
    match err.downcast_ref::<PipelineError>() {
        Some(PipelineError::Input { .. }) => EXIT_INPUT_ERR,
        _ => EXIT_PROCESS_ERR,
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
