use std::fmt;

use chrono::{DateTime, NaiveDateTime, Utc};
use rust_decimal::Decimal;

/// Storage and display format for transaction timestamps.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S %z";

/// One card charge, complete by construction.
///
/// Equality covers all three fields and is the only dedup key: two alerts
/// for the same instant, vendor and amount are the same transaction.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Transaction {
    pub timestamp: DateTime<Utc>,
    pub vendor_id: String,
    pub amount: Decimal,
}

impl Transaction {
    pub fn new(timestamp: DateTime<Utc>, vendor_id: impl Into<String>, amount: Decimal) -> Self {
        Self {
            timestamp,
            vendor_id: vendor_id.into(),
            amount: canonical_amount(amount),
        }
    }

    pub fn timestamp_str(&self) -> String {
        self.timestamp.format(TIMESTAMP_FORMAT).to_string()
    }

    pub fn amount_str(&self) -> String {
        self.amount.to_string()
    }
}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Transaction(date={}, vendor_id={}, amount={})",
            self.timestamp_str(),
            self.vendor_id,
            self.amount
        )
    }
}

/// A transaction being assembled from message headers or a stored row.
/// Any field may still be missing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransactionDraft {
    pub timestamp: Option<DateTime<Utc>>,
    pub vendor_id: Option<String>,
    pub amount: Option<Decimal>,
}

impl TransactionDraft {
    /// Build from raw text. Pieces that are missing or fail to parse stay `None`.
    pub fn from_raw(timestamp: Option<&str>, vendor_id: Option<&str>, amount: Option<&str>) -> Self {
        Self {
            timestamp: timestamp.and_then(parse_timestamp),
            vendor_id: vendor_id
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string),
            amount: amount.and_then(parse_amount),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.timestamp.is_some() && self.vendor_id.is_some() && self.amount.is_some()
    }

    pub fn finish(self) -> Option<Transaction> {
        match (self.timestamp, self.vendor_id, self.amount) {
            (Some(ts), Some(vendor), Some(amount)) => Some(Transaction::new(ts, vendor, amount)),
            _ => None,
        }
    }
}

impl fmt::Display for TransactionDraft {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let date = self
            .timestamp
            .map(|ts| ts.format(TIMESTAMP_FORMAT).to_string())
            .unwrap_or_else(|| "None".to_string());
        write!(
            f,
            "Transaction(date={}, vendor_id={}, amount={})",
            date,
            self.vendor_id.as_deref().unwrap_or("None"),
            self.amount.map(|a| a.to_string()).unwrap_or_else(|| "None".to_string())
        )
    }
}

// ---------------------------------------------------------------------------
// Field parsing
// ---------------------------------------------------------------------------

const OFFSET_FORMATS: &[&str] = &[TIMESTAMP_FORMAT, "%Y-%m-%d %H:%M:%S%:z", "%Y-%m-%d %H:%M:%S%z"];
const NAIVE_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

/// Parse a timestamp in any of the shapes mail headers and the database use,
/// normalized to UTC. Strings without an offset are read as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    // Mail clients append the zone name as a comment: "... -0500 (EST)"
    let without_comment = match raw.rfind('(') {
        Some(idx) if raw.ends_with(')') => raw[..idx].trim_end(),
        _ => raw,
    };
    if let Ok(dt) = DateTime::parse_from_rfc2822(without_comment) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(raw, fmt) {
            return Some(dt.with_timezone(&Utc));
        }
    }
    for fmt in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(naive.and_utc());
        }
    }
    None
}

/// Parse a currency amount into its two-decimal canonical form.
/// Rejects values with more than two fractional digits rather than rounding.
pub fn parse_amount(raw: &str) -> Option<Decimal> {
    let s = raw.replace([',', '$'], "");
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    let value = Decimal::from_str_exact(s).ok()?.normalize();
    if value.scale() > 2 {
        return None;
    }
    Some(canonical_amount(value))
}

fn canonical_amount(mut value: Decimal) -> Decimal {
    value.rescale(2);
    value
}
