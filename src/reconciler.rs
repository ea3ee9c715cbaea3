use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::Span;

use crate::models::Transaction;
use crate::parser::{parse_message, ParseOutcome, RawMessage};

/// Which side of the watermark counts as new.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Boundary {
    /// Accept only records strictly older than the watermark.
    #[default]
    Older,
    /// Accept only records strictly newer than the watermark.
    Newer,
}

impl Boundary {
    pub fn accepts(&self, timestamp: &DateTime<Utc>, watermark: &DateTime<Utc>) -> bool {
        match self {
            Self::Older => timestamp < watermark,
            Self::Newer => timestamp > watermark,
        }
    }

    pub fn key(&self) -> &'static str {
        match self {
            Self::Older => "older",
            Self::Newer => "newer",
        }
    }
}

#[derive(Debug, Default)]
pub struct ReconcileReport {
    /// New transactions in message iteration order.
    pub accepted: Vec<Transaction>,
    /// Complete records rejected as the watermark itself or outside the window.
    pub skipped: usize,
    /// Messages that never produced a complete record.
    pub incomplete: usize,
}

/// Turns a batch of fetched messages into the transactions worth storing.
///
/// With a watermark, a record is new when it differs from the watermark and
/// falls on the `boundary` side of it. Without one (bootstrap) every complete
/// record is new.
pub struct Reconciler<'a> {
    watermark: Option<&'a Transaction>,
    boundary: Boundary,
    span: Span,
}

impl<'a> Reconciler<'a> {
    pub fn new(watermark: &'a Transaction, boundary: Boundary) -> Self {
        Self {
            watermark: Some(watermark),
            boundary,
            span: Span::none(),
        }
    }

    pub fn bootstrap() -> Self {
        Self {
            watermark: None,
            boundary: Boundary::default(),
            span: Span::none(),
        }
    }

    /// Record decisions inside the caller's run span.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    fn out_of_window(&self, timestamp: &DateTime<Utc>) -> bool {
        match self.watermark {
            Some(w) => !self.boundary.accepts(timestamp, &w.timestamp),
            None => false,
        }
    }

    fn is_new(&self, txn: &Transaction) -> bool {
        match self.watermark {
            Some(w) => txn != w && self.boundary.accepts(&txn.timestamp, &w.timestamp),
            None => true,
        }
    }

    pub fn reconcile<'m, I>(&self, messages: I) -> ReconcileReport
    where
        I: IntoIterator<Item = &'m RawMessage>,
    {
        let _entered = self.span.enter();
        let mut report = ReconcileReport::default();

        for message in messages {
            match parse_message(&message.headers, |ts| self.out_of_window(ts)) {
                ParseOutcome::Parsed(txn) => {
                    if self.is_new(&txn) {
                        tracing::debug!(message_id = %message.id, "Keeping  {txn}");
                        report.accepted.push(txn);
                    } else {
                        tracing::debug!(message_id = %message.id, "Skipping {txn}");
                        report.skipped += 1;
                    }
                }
                ParseOutcome::OutOfWindow(ts) => {
                    tracing::debug!(
                        message_id = %message.id,
                        timestamp = %ts,
                        "Skipping message outside the {} window",
                        self.boundary.key()
                    );
                    report.skipped += 1;
                }
                ParseOutcome::Incomplete(draft) => {
                    tracing::warn!(
                        message_id = %message.id,
                        "Could not process message with incomplete transaction data: {draft}"
                    );
                    report.incomplete += 1;
                }
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::parse_amount;
    use crate::parser::Header;
    use chrono::TimeZone;

    fn txn(ts: &str, vendor: &str, amount: &str) -> Transaction {
        Transaction::new(
            DateTime::parse_from_rfc3339(ts).unwrap().with_timezone(&Utc),
            vendor,
            parse_amount(amount).unwrap(),
        )
    }

    fn alert(id: &str, subject: &str, date: &str) -> RawMessage {
        RawMessage {
            id: id.to_string(),
            headers: vec![Header::new("Subject", subject), Header::new("Date", date)],
        }
    }

    fn watermark() -> Transaction {
        txn("2024-01-10T12:00:00Z", "ACME", "10.00")
    }

    #[test]
    fn test_watermark_excluded_older_included() {
        let wm = watermark();
        let messages = vec![
            alert("m1", "Your $10.00 transaction with ACME", "2024-01-10T12:00:00Z"),
            alert("m2", "Your $5.25 transaction with Bean Co", "2024-01-09T08:00:00Z"),
        ];
        let report = Reconciler::new(&wm, Boundary::Older).reconcile(&messages);
        assert_eq!(report.accepted, vec![txn("2024-01-09T08:00:00Z", "Bean Co", "5.25")]);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.incomplete, 0);
    }

    #[test]
    fn test_watermark_equal_in_other_offset_excluded() {
        let wm = watermark();
        let messages = vec![alert(
            "m1",
            "Your $10.00 transaction with ACME",
            "Wed, 10 Jan 2024 07:00:00 -0500 (EST)",
        )];
        let report = Reconciler::new(&wm, Boundary::Older).reconcile(&messages);
        assert!(report.accepted.is_empty());
        assert_eq!(report.skipped, 1);
    }

    #[test]
    fn test_same_instant_different_record_not_accepted() {
        let wm = watermark();
        let messages = vec![alert("m1", "Your $3.00 transaction with Kiosk", "2024-01-10T12:00:00Z")];
        for boundary in [Boundary::Older, Boundary::Newer] {
            let report = Reconciler::new(&wm, boundary).reconcile(&messages);
            assert!(report.accepted.is_empty(), "{boundary:?}");
        }
    }

    #[test]
    fn test_newer_boundary() {
        let wm = watermark();
        let messages = vec![
            alert("m3", "Your $7.00 transaction with Late Cafe", "2024-01-11T09:00:00Z"),
            alert("m1", "Your $10.00 transaction with ACME", "2024-01-10T12:00:00Z"),
            alert("m2", "Your $5.25 transaction with Bean Co", "2024-01-09T08:00:00Z"),
        ];
        let report = Reconciler::new(&wm, Boundary::Newer).reconcile(&messages);
        assert_eq!(report.accepted, vec![txn("2024-01-11T09:00:00Z", "Late Cafe", "7.00")]);
        assert_eq!(report.skipped, 2);
    }

    #[test]
    fn test_missing_subject_is_incomplete() {
        let wm = watermark();
        let messages = vec![RawMessage {
            id: "m1".into(),
            headers: vec![Header::new("Date", "2024-01-09T08:00:00Z")],
        }];
        let report = Reconciler::new(&wm, Boundary::Older).reconcile(&messages);
        assert!(report.accepted.is_empty());
        assert_eq!(report.incomplete, 1);
    }

    #[test]
    fn test_incomplete_messages_do_not_stop_the_batch() {
        let wm = watermark();
        let messages = vec![
            alert("m1", "Your statement is ready", "2024-01-09T10:00:00Z"),
            RawMessage { id: "m2".into(), headers: vec![] },
            alert("m3", "Your $5.25 transaction with Bean Co", "2024-01-09T08:00:00Z"),
        ];
        let report = Reconciler::new(&wm, Boundary::Older).reconcile(&messages);
        assert_eq!(report.accepted.len(), 1);
        assert_eq!(report.incomplete, 2);
    }

    #[test]
    fn test_accepted_order_follows_messages() {
        let wm = watermark();
        let messages = vec![
            alert("m1", "Your $1.00 transaction with First", "2024-01-09T08:00:00Z"),
            alert("m2", "Your $2.00 transaction with Second", "2024-01-09T09:00:00Z"),
            alert("m3", "Your $3.00 transaction with Third", "2024-01-08T07:00:00Z"),
        ];
        let report = Reconciler::new(&wm, Boundary::Older).reconcile(&messages);
        let vendors: Vec<&str> = report.accepted.iter().map(|t| t.vendor_id.as_str()).collect();
        assert_eq!(vendors, vec!["First", "Second", "Third"]);
    }

    #[test]
    fn test_date_first_out_of_window_counts_as_skipped() {
        let wm = watermark();
        let messages = vec![RawMessage {
            id: "m1".into(),
            headers: vec![Header::new("Date", "2024-01-12T08:00:00Z")],
        }];
        let report = Reconciler::new(&wm, Boundary::Older).reconcile(&messages);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.incomplete, 0);
    }

    #[test]
    fn test_bootstrap_accepts_every_complete_record() {
        let messages = vec![
            alert("m1", "Your $10.00 transaction with ACME", "2024-01-10T12:00:00Z"),
            alert("m2", "Your statement is ready", "2024-01-09T10:00:00Z"),
            alert("m3", "Your $5.25 transaction with Bean Co", "2024-01-09T08:00:00Z"),
        ];
        let report = Reconciler::bootstrap().reconcile(&messages);
        assert_eq!(report.accepted.len(), 2);
        assert_eq!(report.incomplete, 1);
        assert_eq!(report.accepted[0].timestamp, Utc.with_ymd_and_hms(2024, 1, 10, 12, 0, 0).unwrap());
    }

    #[test]
    fn test_boundary_accepts() {
        let wm = Utc.with_ymd_and_hms(2024, 1, 10, 12, 0, 0).unwrap();
        let before = Utc.with_ymd_and_hms(2024, 1, 10, 11, 59, 59).unwrap();
        let after = Utc.with_ymd_and_hms(2024, 1, 10, 12, 0, 1).unwrap();
        assert!(Boundary::Older.accepts(&before, &wm));
        assert!(!Boundary::Older.accepts(&wm, &wm));
        assert!(!Boundary::Older.accepts(&after, &wm));
        assert!(Boundary::Newer.accepts(&after, &wm));
        assert!(!Boundary::Newer.accepts(&wm, &wm));
    }
}
