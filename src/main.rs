//! Command-line interface for chunk-sync
//!
//! # Usage Examples
//!
//! ## Diff
//! ```bash
//! # Stream both files in pages of 1000 and print the actions
//! chunk-sync diff --source source.jsonl --dest dest.jsonl --key id
//!
//! # Different key paths per side, duplicates allowed on the source
//! chunk-sync diff --source a.jsonl --dest b.jsonl \
//!   --source-key meta.id --dest-key id \
//!   --ignore-duplicates source --output actions.jsonl
//! ```
//!
//! ## Group
//! ```bash
//! chunk-sync group --source events.jsonl --key t --chunk-size 100
//! ```
//!
//! Logging is controlled with `RUST_LOG` (e.g. `RUST_LOG=chunk_sync=debug`).

use anyhow::Context;
use chunk_sync::args::{DiffArgs, GroupArgs};
use chunk_sync::jsonl::JsonlPageReader;
use chunk_sync::{group, synchronize, Config, JsonlWriter};
use clap::{Parser, Subcommand};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

#[derive(Parser)]
#[command(name = "chunk-sync")]
#[command(about = "Reconcile two sorted JSON Lines feeds chunk by chunk")]
#[command(long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute the update, create and remove actions turning dest into source
    Diff(DiffArgs),

    /// Group a sorted feed by key
    Group(GroupArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = run().await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}

async fn run() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Diff(args) => run_diff(args).await,
        Commands::Group(args) => run_group(args).await,
    }
}

fn open_output(path: Option<&Path>) -> anyhow::Result<Box<dyn Write + Send>> {
    match path {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create output file: {}", path.display()))?;
            Ok(Box::new(BufWriter::new(file)))
        }
        None => Ok(Box::new(BufWriter::new(std::io::stdout()))),
    }
}

async fn run_diff(args: DiffArgs) -> anyhow::Result<()> {
    let config = Config::new(args.compare_opts()?).with_flush(args.flush_policy());

    let mut source = JsonlPageReader::open(&args.feed.source, args.feed.chunk_size).await?;
    let mut dest = JsonlPageReader::open(&args.dest, args.feed.chunk_size).await?;
    let mut writer =
        JsonlWriter::new(open_output(args.output.as_deref())?).with_dry_run(args.dry_run);

    let summary = synchronize(&config, &mut source, &mut dest, &mut writer).await?;
    writer.flush()?;

    eprintln!("{}", serde_json::to_string(&summary)?);
    Ok(())
}

async fn run_group(args: GroupArgs) -> anyhow::Result<()> {
    let config = args.group_config()?;

    let mut source = JsonlPageReader::open(&args.feed.source, args.feed.chunk_size).await?;
    let mut writer = JsonlWriter::new(open_output(args.output.as_deref())?);

    let summary = group(&config, &mut source, &mut writer).await?;
    writer.flush()?;

    eprintln!("{}", serde_json::to_string(&summary)?);
    Ok(())
}
