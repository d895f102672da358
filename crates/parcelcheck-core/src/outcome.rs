//! Lookup outcomes: the courier payload on success, a typed reason on failure.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Reserved payload key holding a rollup of all couriers. Never a courier.
pub const SUMMARY_KEY: &str = "summary";

/// Top-level field of a successful response body.
pub const COURIER_DATA_FIELD: &str = "courierData";

/// Parcel counters reported for one courier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourierStats {
    pub total_parcel: u64,
    pub success_parcel: u64,
    pub cancelled_parcel: u64,
}

impl CourierStats {
    /// `success / total` as a percentage rounded to two decimals; 0 when
    /// there is no data.
    pub fn success_ratio(&self) -> f64 {
        ratio(self.success_parcel, self.total_parcel)
    }

    /// `cancelled / total` as a percentage rounded to two decimals.
    pub fn failed_ratio(&self) -> f64 {
        ratio(self.cancelled_parcel, self.total_parcel)
    }

    pub fn has_data(&self) -> bool {
        self.total_parcel > 0
    }

    /// `success + cancelled` must not exceed `total`.
    pub fn is_consistent(&self) -> bool {
        self.success_parcel.saturating_add(self.cancelled_parcel) <= self.total_parcel
    }
}

pub(crate) fn ratio(part: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let pct = part as f64 / total as f64 * 100.0;
    (pct * 100.0).round() / 100.0
}

/// Successful lookup payload: courier name → counters, in response order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CourierReport {
    pub couriers: IndexMap<String, CourierStats>,
    /// Set when any counter was negative, non-integer, or when
    /// `success + cancelled > total` for some courier. The payload is kept
    /// as-is either way.
    #[serde(default)]
    pub inconsistent: bool,
}

/// Why a 200 response body could not be turned into a [`CourierReport`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PayloadError {
    #[error("invalid JSON body: {0}")]
    InvalidJson(String),

    #[error("response is missing `courierData`")]
    MissingCourierData,
}

#[derive(Deserialize)]
struct ResponseBody {
    #[serde(rename = "courierData")]
    courier_data: Option<IndexMap<String, Value>>,
}

impl CourierReport {
    /// Parse a 200 response body.
    ///
    /// Parsing is permissive: `summary` entries (any case) are dropped,
    /// missing counters read as zero, and malformed counters are clamped to
    /// zero and flag the report as inconsistent rather than rejecting it.
    pub fn from_body(body: &str) -> Result<Self, PayloadError> {
        let parsed: ResponseBody =
            serde_json::from_str(body).map_err(|e| PayloadError::InvalidJson(e.to_string()))?;
        let data = parsed.courier_data.ok_or(PayloadError::MissingCourierData)?;
        Ok(Self::from_courier_data(data))
    }

    /// Build a report from an already-decoded `courierData` mapping.
    pub fn from_courier_data(data: IndexMap<String, Value>) -> Self {
        let mut couriers = IndexMap::with_capacity(data.len());
        let mut inconsistent = false;

        for (name, entry) in data {
            if name.eq_ignore_ascii_case(SUMMARY_KEY) {
                continue;
            }
            let (stats, clean) = read_stats(&entry);
            inconsistent |= !clean || !stats.is_consistent();
            couriers.insert(name, stats);
        }

        Self {
            couriers,
            inconsistent,
        }
    }

    /// Counters summed over every courier.
    pub fn totals(&self) -> CourierStats {
        self.couriers
            .values()
            .fold(CourierStats::default(), |acc, s| CourierStats {
                total_parcel: acc.total_parcel.saturating_add(s.total_parcel),
                success_parcel: acc.success_parcel.saturating_add(s.success_parcel),
                cancelled_parcel: acc.cancelled_parcel.saturating_add(s.cancelled_parcel),
            })
    }
}

fn read_stats(entry: &Value) -> (CourierStats, bool) {
    let Some(obj) = entry.as_object() else {
        return (CourierStats::default(), false);
    };
    let (total_parcel, a) = read_counter(obj.get("total_parcel"));
    let (success_parcel, b) = read_counter(obj.get("success_parcel"));
    let (cancelled_parcel, c) = read_counter(obj.get("cancelled_parcel"));
    (
        CourierStats {
            total_parcel,
            success_parcel,
            cancelled_parcel,
        },
        a && b && c,
    )
}

/// Returns the counter value and whether it was well-formed. Absent counters
/// are zero-data, not malformed.
fn read_counter(v: Option<&Value>) -> (u64, bool) {
    match v {
        None | Some(Value::Null) => (0, true),
        Some(v) => match v.as_u64() {
            Some(n) => (n, true),
            None => match v.as_f64() {
                Some(f) if f > 0.0 => (f as u64, false),
                _ => (0, false),
            },
        },
    }
}

/// Terminal failure reason for one identifier.
#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LookupFailure {
    #[error("Rate limit exceeded")]
    RateLimited,

    #[error("API Error {code}: {body}")]
    HttpStatus { code: u16, body: String },

    #[error("Request timeout")]
    Timeout,

    #[error("Request failed: {message}")]
    Transport { message: String },

    #[error("Unexpected error: {message}")]
    Unexpected { message: String },

    /// The lookup task itself crashed.
    #[error("Processing error: {message}")]
    Processing { message: String },

    /// The run was cancelled before this identifier was resolved.
    #[error("Cancelled before completion")]
    Cancelled,
}

impl LookupFailure {
    /// Rate limits, HTTP errors, timeouts and transport errors are transient.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimited | Self::HttpStatus { .. } | Self::Timeout | Self::Transport { .. }
        )
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited)
    }
}

/// The result of resolving one identifier. Exactly one of payload / failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "data", rename_all = "snake_case")]
pub enum LookupOutcome {
    Found(CourierReport),
    Failed(LookupFailure),
}

impl LookupOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Found(_))
    }

    pub fn report(&self) -> Option<&CourierReport> {
        match self {
            Self::Found(r) => Some(r),
            Self::Failed(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&LookupFailure> {
        match self {
            Self::Found(_) => None,
            Self::Failed(f) => Some(f),
        }
    }
}
