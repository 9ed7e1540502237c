//! rollcall-melt: Normalize an attendance export into relational tables
//!
//! Usage:
//!   # Read data/attendances.json, write CSVs to ./output
//!   rollcall-melt
//!
//!   # Explicit input and output directory
//!   rollcall-melt export.json --output-dir ./tables
//!
//!   # JSON Lines instead of CSV, tolerate attendances without a referrer
//!   rollcall-melt export.json --format jsonl --lenient-referrer

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use anyhow::Result;
use clap::{Parser, ValueEnum};
use rollcall::{melt_file, CsvDirSink, JsonlDirSink, MeltConfig, ReferrerPolicy, TableSink};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "rollcall-melt")]
#[command(about = "Normalize an event-attendance export into people, events, timeslots and attendances tables", long_about = None)]
struct Args {
    /// Attendance export (JSON array, API page, or NDJSON)
    #[arg(value_name = "FILE", default_value = "data/attendances.json")]
    input: PathBuf,

    /// Directory the tables are written to; existing tables are replaced
    #[arg(long, short = 'o', default_value = "output")]
    output_dir: PathBuf,

    /// Output table format
    #[arg(long, value_enum, default_value_t = Format::Csv)]
    format: Format,

    /// Log progress every N records (0 disables)
    #[arg(long)]
    progress_interval: Option<usize>,

    /// Write a null utm_source instead of failing when an attendance has no referrer
    #[arg(long)]
    lenient_referrer: bool,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum Format {
    Csv,
    Jsonl,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args = Args::parse();

    // Build config
    let mut config = MeltConfig::default();
    if let Some(interval) = args.progress_interval {
        config.progress_interval = interval;
    }
    if args.lenient_referrer {
        config.referrer_policy = ReferrerPolicy::Nullable;
    }

    let mut sink: Box<dyn TableSink> = match args.format {
        Format::Csv => Box::new(CsvDirSink::new(&args.output_dir)),
        Format::Jsonl => Box::new(JsonlDirSink::new(&args.output_dir)),
    };

    melt_file(&args.input, sink.as_mut(), config)?;
    Ok(())
}
