//! `parcelcheck normalize`: offline preview of what `check` would submit.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use parcelcheck_core::input::DEFAULT_MAX_INPUT_BYTES;
use parcelcheck_core::report::InvalidToken;
use parcelcheck_core::{read_upload, Normalizer, PreparedInput};

#[derive(Args)]
pub struct NormalizeArgs {
    /// Text file with one phone number per line
    pub file: PathBuf,

    /// Print the result as JSON
    #[arg(long)]
    pub json: bool,

    /// Reject files larger than this many bytes
    #[arg(long, default_value_t = DEFAULT_MAX_INPUT_BYTES)]
    pub max_bytes: usize,
}

pub fn run(args: NormalizeArgs) -> Result<()> {
    let bytes = std::fs::read(&args.file)
        .with_context(|| format!("reading {}", args.file.display()))?;
    let tokens = read_upload(&bytes, args.max_bytes)?;
    let prepared = PreparedInput::prepare(&tokens, &Normalizer::default())?;

    if args.json {
        let invalid: Vec<InvalidToken> = prepared.invalid.iter().map(InvalidToken::new).collect();
        let doc = serde_json::json!({
            "received": prepared.raw_count,
            "unique": prepared.unique,
            "duplicates_removed": prepared.duplicates_removed,
            "invalid": invalid,
        });
        println!("{}", serde_json::to_string_pretty(&doc)?);
        return Ok(());
    }

    println!("Received:           {}", prepared.raw_count);
    println!("Unique valid:       {}", prepared.unique.len());
    println!("Duplicates removed: {}", prepared.duplicates_removed);
    println!("Invalid:            {}", prepared.invalid.len());
    println!();
    for id in &prepared.unique {
        println!("  {id}");
    }
    if !prepared.invalid.is_empty() {
        println!();
        println!("Rejected:");
        for token in &prepared.invalid {
            println!("  {token:<20} Invalid format");
        }
    }
    Ok(())
}
