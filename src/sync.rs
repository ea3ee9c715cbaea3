use chrono::{Duration, NaiveDate};
use chrono_tz::Tz;

use crate::db::Ledger;
use crate::error::{AlertSyncError, Result};
use crate::fetcher::{build_query, fetch_candidates, MailClient, DEFAULT_SENDER};
use crate::models::Transaction;
use crate::reconciler::{Boundary, Reconciler};
use crate::settings::AccountContext;

#[derive(Debug, Clone)]
pub struct SyncOptions {
    pub dry_run: bool,
    /// Allow a run against an empty history: no date floor, accept everything.
    pub bootstrap: bool,
    pub boundary: Boundary,
    pub sender: String,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            dry_run: true,
            bootstrap: false,
            boundary: Boundary::default(),
            sender: DEFAULT_SENDER.to_string(),
        }
    }
}

#[derive(Debug, Default)]
pub struct SyncReport {
    pub watermark: Option<Transaction>,
    pub query: String,
    pub fetched: usize,
    /// Rows written (staged only, on a dry run).
    pub inserted: Vec<Transaction>,
    pub already_stored: usize,
    pub skipped: usize,
    pub incomplete: usize,
    pub committed: bool,
}

/// Local calendar day used as the search floor: the watermark's day in the
/// account's timezone, widened by one day.
pub fn query_floor(watermark: &Transaction, timezone: Tz) -> NaiveDate {
    (watermark.timestamp.with_timezone(&timezone) - Duration::days(1)).date_naive()
}

/// One synchronization run for one account.
///
/// Reads the watermark, fetches candidate alerts, reconciles them and writes
/// the survivors. Nothing is committed on a dry run, but every decision is
/// made and logged the same way.
pub fn run(
    ctx: &AccountContext,
    mail: &dyn MailClient,
    ledger: &mut dyn Ledger,
    opts: &SyncOptions,
) -> Result<SyncReport> {
    let span = tracing::info_span!("sync", account = %ctx.name, dry_run = opts.dry_run);
    let _entered = span.enter();

    let address = mail.profile_address()?;
    if !address.eq_ignore_ascii_case(&ctx.mailbox) {
        return Err(AlertSyncError::MailboxMismatch {
            expected: ctx.mailbox.clone(),
            actual: address,
        });
    }

    let watermark = ledger.last_transaction(&ctx.name)?;
    let floor = match &watermark {
        Some(w) => Some(query_floor(w, ctx.timezone)),
        None if opts.bootstrap => {
            tracing::info!("No stored transactions, bootstrapping from the full mailbox");
            None
        }
        None => return Err(AlertSyncError::NoWatermark(ctx.name.clone())),
    };

    let query = build_query(&opts.sender, floor);
    let messages = fetch_candidates(mail, &query)?;

    let reconciler = match &watermark {
        Some(w) => Reconciler::new(w, opts.boundary),
        None => Reconciler::bootstrap(),
    };
    let outcome = reconciler.with_span(span.clone()).reconcile(&messages);

    let mut inserted = Vec::with_capacity(outcome.accepted.len());
    let mut already_stored = 0usize;
    for txn in outcome.accepted {
        if inserted.contains(&txn) {
            tracing::debug!("Duplicate alert in batch {txn}");
            already_stored += 1;
        } else if ledger.contains(&ctx.name, &txn)? {
            tracing::debug!("Already stored {txn}");
            already_stored += 1;
        } else {
            inserted.push(txn);
        }
    }

    let commit = !opts.dry_run;
    ledger.insert(&ctx.name, &inserted, commit)?;
    if commit {
        tracing::info!(rows = inserted.len(), "Committed new transactions");
    } else {
        tracing::info!(rows = inserted.len(), "Dry run, rolled back new transactions");
    }

    tracing::info!(
        fetched = messages.len(),
        new = inserted.len(),
        already_stored,
        skipped = outcome.skipped,
        incomplete = outcome.incomplete,
        "Sync finished"
    );

    Ok(SyncReport {
        watermark,
        query,
        fetched: messages.len(),
        inserted,
        already_stored,
        skipped: outcome.skipped,
        incomplete: outcome.incomplete,
        committed: commit,
    })
}
