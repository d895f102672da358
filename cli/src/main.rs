//! ParcelCheck CLI: bulk courier-history checks from the terminal.
//!
//! # Commands
//! ```text
//! parcelcheck check     <FILE> [--config parcelcheck.yaml] [--output report.json]
//! parcelcheck normalize <FILE> [--json]
//! ```

use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};

mod cmd_check;
mod cmd_normalize;
mod logging;

#[derive(Parser)]
#[command(
    name = "parcelcheck",
    about = "Bulk courier-history checks for lists of phone numbers",
    long_about = "
Reads a text file with one phone number per line, normalizes and
de-duplicates the numbers, and looks each one up against the courier-check
service with bounded parallelism, pacing and retries.

ENVIRONMENT VARIABLES:
  PARCELCHECK_API_KEY   Bearer token for the lookup service (fallback: API_KEY)
  PARCELCHECK_API_URL   Lookup endpoint
  RUST_LOG              Log filter, overrides -v
",
    version
)]
struct Cli {
    /// Raise log verbosity (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Look up every number in a file and print a summary
    Check(cmd_check::CheckArgs),

    /// Normalize and de-duplicate a file without any network access
    Normalize(cmd_normalize::NormalizeArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_tracing(&logging::LogConfig::from_verbosity(cli.verbose, cli.json_logs));

    match cli.command {
        Commands::Check(args) => cmd_check::run(args).await,
        Commands::Normalize(args) => cmd_normalize::run(args),
    }
}
