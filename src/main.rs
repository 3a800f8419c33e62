mod clock;
mod diagnostics;
mod pattern;
mod session;
mod ui;

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Parser;

use crate::pattern::model::{PatternSequence, load_pattern_file};
use crate::session::{BellSink, StopwatchSession};

#[derive(Parser, Debug)]
#[command(
    name = "seagullwatch",
    version,
    about = "Stopwatch with sequential alarm patterns"
)]
struct Cli {
    /// Pattern file to load at startup
    #[arg(long)]
    patterns: Option<PathBuf>,

    /// Timer tick period in milliseconds
    #[arg(long, default_value_t = 10)]
    tick_ms: u64,

    /// Validate the pattern file, print its schedule, and exit
    #[arg(long)]
    check: bool,

    /// Measure tick pacing drift and exit
    #[arg(long)]
    bench: bool,
}

fn main() {
    env_logger::init();
    if let Err(err) = run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    if cli.tick_ms == 0 {
        bail!("--tick-ms must be greater than zero");
    }

    let mut sequence = PatternSequence::default();
    let source = match &cli.patterns {
        Some(path) => {
            let file = load_pattern_file(path)
                .with_context(|| format!("failed to load {}", path.display()))?;
            sequence = PatternSequence::new(file.entries, file.repeat.unwrap_or(true));
            log::info!(
                "loaded {} pattern(s) from {}",
                sequence.len(),
                path.display()
            );
            path.display().to_string()
        }
        None => "(none)".to_string(),
    };

    if cli.check {
        return diagnostics::run_check(&sequence, &source);
    }
    if cli.bench {
        return diagnostics::run_bench(cli.tick_ms);
    }

    let session = StopwatchSession::new(sequence, Box::new(BellSink));
    ui::app::run_gui(session, cli.tick_ms, cli.patterns)
}
