//! CLI tool to render CSV rows from stdin through a format string.
//!
//! Usage:
//!   cq '<format>'  < input.csv
//!   cq --headers   < input.csv
//!
//! Placeholders use the column name normalized to lowercase with `_`
//! separators: a `First Name` column is `\(.first_name)`.

use clap::Parser;
use cq_rs::{RunConfig, run};
use std::io::{self, BufWriter};
use std::process;
use tracing_subscriber::EnvFilter;

/// Render each CSV row read from stdin through a format string.
///
/// Use `\(.column)` placeholders, or `{{ ... }}` template actions with the
/// `join` and `replace` helpers. `LINENUM` holds the 1-based row number.
#[derive(Parser)]
#[command(name = "cq", version)]
struct Cli {
    /// List the columns and their placeholders instead of rendering rows
    #[arg(long)]
    headers: bool,

    /// Log parsing and rendering progress on stderr
    #[arg(short, long)]
    verbose: bool,

    /// Output format applied to every row; only the last one is used
    format: Vec<String>,
}

fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(level))
        .with_writer(io::stderr)
        .with_target(false)
        .without_time()
        .init();
}

fn main() {
    let mut cli = Cli::parse();
    init_logging(cli.verbose);

    let config = RunConfig {
        format: cli.format.pop(),
        show_headers: cli.headers,
    };

    let stdin = io::stdin().lock();
    let stdout = BufWriter::new(io::stdout().lock());

    if let Err(e) = run(&config, stdin, stdout) {
        eprintln!("cq: {e}");
        process::exit(e.exit_code());
    }
}
