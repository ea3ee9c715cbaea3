use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;

use crate::models::{parse_amount, parse_timestamp, Transaction, TransactionDraft};

/// One mail header, in the order the provider returned it.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Header {
    pub name: String,
    pub value: String,
}

impl Header {
    #[cfg(test)]
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// A fetched message: provider id plus its ordered header list.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RawMessage {
    pub id: String,
    pub headers: Vec<Header>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParseOutcome {
    Parsed(Transaction),
    /// The Date header alone put the message outside the acceptance window,
    /// so the remaining headers were never looked at.
    OutOfWindow(DateTime<Utc>),
    Incomplete(TransactionDraft),
}

fn subject_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^Your \$(?P<amount>[0-9]+\.[0-9]{2}) transaction with (?P<vendor_id>.*)$")
            .expect("subject pattern is valid")
    })
}

/// Pull `(amount, vendor)` out of an alert subject line.
pub fn parse_subject(subject: &str) -> Option<(&str, &str)> {
    let caps = subject_regex().captures(subject)?;
    let amount = caps.name("amount")?.as_str();
    let vendor = caps.name("vendor_id")?.as_str();
    Some((amount, vendor))
}

/// Walk the headers in order and build a transaction.
///
/// `out_of_window` is consulted as soon as the Date header is known; when it
/// returns true the message is abandoned even if Subject has not been seen.
/// Unrelated headers are ignored and a Subject that does not match the alert
/// pattern leaves the record incomplete.
pub fn parse_message<F>(headers: &[Header], out_of_window: F) -> ParseOutcome
where
    F: Fn(&DateTime<Utc>) -> bool,
{
    let mut draft = TransactionDraft::default();

    for header in headers {
        if header.name.eq_ignore_ascii_case("Subject") {
            if let Some((amount, vendor)) = parse_subject(&header.value) {
                draft.amount = parse_amount(amount);
                draft.vendor_id = Some(vendor.to_string()).filter(|v| !v.is_empty());
            }
        } else if header.name.eq_ignore_ascii_case("Date") {
            if let Some(ts) = parse_timestamp(&header.value) {
                if out_of_window(&ts) {
                    return ParseOutcome::OutOfWindow(ts);
                }
                draft.timestamp = Some(ts);
            }
        }

        if draft.is_complete() {
            break;
        }
    }

    match draft.clone().finish() {
        Some(txn) => ParseOutcome::Parsed(txn),
        None => ParseOutcome::Incomplete(draft),
    }
}
