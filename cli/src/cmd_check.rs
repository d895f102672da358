//! `parcelcheck check`: run the full lookup pipeline over a file.
//!
//! Settings resolve in order: config file, then environment, then flags.
//! Ctrl-C cancels the run; in-flight lookups finish, everything not yet
//! submitted is reported as cancelled.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use tracing::{info, warn};

use parcelcheck_core::{CheckerConfig, RunContext, VerificationReport, Verifier};
use parcelcheck_http::HttpLookupClient;

#[derive(Args)]
pub struct CheckArgs {
    /// Text file with one phone number per line
    pub file: PathBuf,

    /// YAML config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Write the full report as JSON to this path
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Lookup endpoint (overrides config and environment)
    #[arg(long)]
    pub api_url: Option<String>,

    /// Bearer token (overrides config and environment)
    #[arg(long)]
    pub api_key: Option<String>,

    /// Identifiers per batch
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Concurrent lookups per batch
    #[arg(long)]
    pub workers: Option<usize>,

    /// Retries after the first attempt
    #[arg(long)]
    pub max_retries: Option<u32>,
}

impl CheckArgs {
    fn resolve_config(&self) -> Result<CheckerConfig> {
        let mut config = match &self.config {
            Some(path) => CheckerConfig::from_yaml_file(path)
                .with_context(|| format!("loading config from {}", path.display()))?,
            None => CheckerConfig::default(),
        };
        config.apply_env();

        if let Some(url) = &self.api_url {
            config.api_url = url.clone();
        }
        if let Some(key) = &self.api_key {
            config.api_key = key.clone();
        }
        if let Some(n) = self.batch_size {
            config.batch_size = n;
        }
        if let Some(n) = self.workers {
            config.max_workers = n;
        }
        if let Some(n) = self.max_retries {
            config.max_retries = n;
        }

        config.validate()?;
        Ok(config)
    }
}

pub async fn run(args: CheckArgs) -> Result<()> {
    let config = args.resolve_config()?;
    let bytes = std::fs::read(&args.file)
        .with_context(|| format!("reading {}", args.file.display()))?;

    let client = HttpLookupClient::from_checker(&config)?;
    let verifier = Verifier::from_config(Arc::new(client), &config);
    let ctx = RunContext::new(config.cache_config());

    let token = ctx.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("Interrupted: finishing in-flight lookups, skipping the rest...");
            warn!("interrupt received, cancelling run");
            token.cancel();
        }
    });

    println!("Checking {} against {}", args.file.display(), config.api_url);
    println!(
        "  Batch size: {}  Workers: {}  Max retries: {}",
        config.batch_size, config.max_workers, config.max_retries
    );
    println!();

    info!(
        file = %args.file.display(),
        bytes = bytes.len(),
        batch_size = config.batch_size,
        workers = config.max_workers,
        "check started"
    );
    let report = verifier.verify_upload(&bytes, &ctx).await?;
    info!(
        results = report.results.len(),
        invalid = report.invalid.len(),
        elapsed_ms = report.elapsed_ms,
        cancelled = report.cancelled,
        "check finished"
    );

    print_summary_table(&report);
    print_stats(&report);

    if let Some(path) = &args.output {
        write_report(&report, path)?;
        info!(path = %path.display(), "report written");
        println!("Report written to {}", path.display());
    }
    Ok(())
}

fn print_summary_table(report: &VerificationReport) {
    println!(
        "{:<13} {:>7} {:>8} {:>10} {:>10} {:>9}  {}",
        "Phone", "Total", "Success", "Cancelled", "Success %", "Failed %", "Status"
    );
    for s in report.summaries() {
        match s.totals {
            Some(t) => println!(
                "{:<13} {:>7} {:>8} {:>10} {:>10.2} {:>9.2}  {}",
                s.phone,
                t.total_parcel,
                t.success_parcel,
                t.cancelled_parcel,
                s.success_ratio.unwrap_or_default(),
                s.failed_ratio.unwrap_or_default(),
                s.status
            ),
            None => println!(
                "{:<13} {:>7} {:>8} {:>10} {:>10} {:>9}  {}",
                s.phone, "N/A", "N/A", "N/A", "N/A", "N/A", s.status
            ),
        }
    }
    for invalid in &report.invalid {
        println!("{:<13} {}", invalid.token, invalid.reason);
    }
    println!();
}

fn print_stats(report: &VerificationReport) {
    let stats = &report.stats;
    println!("  Submitted:          {}", stats.total);
    println!("  Succeeded:          {}", stats.succeeded);
    println!("  Failed:             {}", stats.failed);
    println!("  Retries:            {}", stats.retries);
    println!("  Cache hits:         {}", stats.cache_hits);
    println!("  Inconsistent data:  {}", stats.inconsistent_payloads);
    println!("  Duplicates removed: {}", report.duplicates_removed);
    println!("  Invalid numbers:    {}", report.invalid.len());
    println!("  Success rate:       {:.1}%", stats.success_rate());
    println!("  Elapsed:            {:.1}s", report.elapsed_ms as f64 / 1000.0);
    if report.cancelled {
        println!("  Run was cancelled before completion.");
    }
    println!();
}

fn write_report(report: &VerificationReport, path: &Path) -> Result<()> {
    let doc = serde_json::json!({
        "report": report,
        "summaries": report.summaries(),
        "courier_rows": report.courier_rows(),
    });
    let file = std::fs::File::create(path)
        .with_context(|| format!("creating {}", path.display()))?;
    serde_json::to_writer_pretty(std::io::BufWriter::new(file), &doc)
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}
