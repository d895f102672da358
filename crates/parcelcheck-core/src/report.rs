//! Run report handed to presentation layers.
//!
//! [`VerificationReport`] is the hand-off to whatever renders results
//! (spreadsheet, JSON, terminal table). Presentation itself lives outside
//! this crate; the row derivations here only fix the numbers and statuses
//! every renderer must agree on.
//!
//! # Ordering
//! `results` is batch-ordered and completion-ordered within a batch. It is
//! not in input order. `invalid` is in input order.

use std::fmt;

use serde::{Deserialize, Serialize, Serializer};

use crate::identifier::CanonicalIdentifier;
use crate::outcome::{ratio, CourierStats, LookupOutcome};
use crate::stats::StatsSnapshot;

/// Cancelled-parcel percentage above which a row is flagged.
pub const HIGH_FAILURE_THRESHOLD: f64 = 40.0;

/// Reason attached to every rejected raw token.
pub const INVALID_FORMAT: &str = "Invalid format";

/// Terminal outcome for one submitted identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LookupResult {
    pub phone: CanonicalIdentifier,
    pub outcome: LookupOutcome,
}

/// A raw token rejected by the normalizer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvalidToken {
    pub token: String,
    pub reason: String,
}

impl InvalidToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            reason: INVALID_FORMAT.to_string(),
        }
    }
}

/// Everything a run produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationReport {
    pub results: Vec<LookupResult>,
    pub invalid: Vec<InvalidToken>,
    pub duplicates_removed: usize,
    pub stats: StatsSnapshot,
    pub elapsed_ms: u64,
    /// The run was cancelled before every identifier was looked up.
    pub cancelled: bool,
}

impl VerificationReport {
    /// One row per (identifier, courier) for successful lookups.
    pub fn courier_rows(&self) -> Vec<CourierRow> {
        let mut rows = Vec::new();
        for result in &self.results {
            let Some(report) = result.outcome.report() else {
                continue;
            };
            for (name, stats) in &report.couriers {
                rows.push(CourierRow::new(&result.phone, name, *stats));
            }
        }
        rows
    }

    /// One summary per submitted identifier, in `results` order.
    pub fn summaries(&self) -> Vec<IdentifierSummary> {
        self.results.iter().map(IdentifierSummary::from_result).collect()
    }

    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.outcome.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.results.len() - self.succeeded()
    }
}

/// Display highlight for a courier row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowFlag {
    Normal,
    NoData,
    HighFailure,
}

impl RowFlag {
    fn classify(stats: &CourierStats, failed_ratio: f64) -> Self {
        if !stats.has_data() {
            Self::NoData
        } else if failed_ratio > HIGH_FAILURE_THRESHOLD {
            Self::HighFailure
        } else {
            Self::Normal
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CourierRow {
    pub phone: String,
    /// Courier name with the first letter upper-cased, the rest lower-cased.
    pub courier: String,
    #[serde(flatten)]
    pub stats: CourierStats,
    pub success_ratio: f64,
    pub failed_ratio: f64,
    pub flag: RowFlag,
}

impl CourierRow {
    fn new(phone: &CanonicalIdentifier, courier: &str, stats: CourierStats) -> Self {
        let failed_ratio = stats.failed_ratio();
        Self {
            phone: phone.to_string(),
            courier: display_name(courier),
            stats,
            success_ratio: stats.success_ratio(),
            failed_ratio,
            flag: RowFlag::classify(&stats, failed_ratio),
        }
    }
}

/// Per-identifier verdict.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SummaryStatus {
    Success,
    NoData,
    HighFailure,
    Error(String),
}

impl fmt::Display for SummaryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => f.write_str("Success"),
            Self::NoData => f.write_str("No Data"),
            Self::HighFailure => f.write_str("High Failure"),
            Self::Error(reason) => write!(f, "Error: {reason}"),
        }
    }
}

impl Serialize for SummaryStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Totals across every courier for one identifier. Counters and ratios are
/// `None` when the lookup failed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IdentifierSummary {
    pub phone: String,
    pub totals: Option<CourierStats>,
    pub success_ratio: Option<f64>,
    pub failed_ratio: Option<f64>,
    pub status: SummaryStatus,
}

impl IdentifierSummary {
    pub fn from_result(result: &LookupResult) -> Self {
        let phone = result.phone.to_string();
        match &result.outcome {
            LookupOutcome::Found(report) => {
                let totals = report.totals();
                let success_ratio = ratio(totals.success_parcel, totals.total_parcel);
                let failed_ratio = ratio(totals.cancelled_parcel, totals.total_parcel);
                let status = if !totals.has_data() {
                    SummaryStatus::NoData
                } else if failed_ratio > HIGH_FAILURE_THRESHOLD {
                    SummaryStatus::HighFailure
                } else {
                    SummaryStatus::Success
                };
                Self {
                    phone,
                    totals: Some(totals),
                    success_ratio: Some(success_ratio),
                    failed_ratio: Some(failed_ratio),
                    status,
                }
            }
            LookupOutcome::Failed(failure) => Self {
                phone,
                totals: None,
                success_ratio: None,
                failed_ratio: None,
                status: SummaryStatus::Error(failure.to_string()),
            },
        }
    }
}

fn display_name(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}
