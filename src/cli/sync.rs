use std::path::Path;

use colored::Colorize;
use comfy_table::{Cell, CellAlignment, Table};

use crate::db::SqliteLedger;
use crate::error::Result;
use crate::fetcher::{load_access_token, GmailClient, MailClient, MailboxFile};
use crate::fmt::money;
use crate::reconciler::Boundary;
use crate::settings::{load_settings, AccountContext};
use crate::sync::{self, SyncOptions};

pub fn run(
    account: &str,
    timezone: Option<&str>,
    dry_run: bool,
    bootstrap: bool,
    boundary: Option<Boundary>,
    mailbox_file: Option<&str>,
) -> Result<()> {
    let settings = load_settings();
    let ctx = AccountContext::resolve(&settings, account, timezone)?;

    let client: Box<dyn MailClient> = match mailbox_file {
        Some(path) => Box::new(MailboxFile::open(Path::new(path))?),
        None => Box::new(GmailClient::new(load_access_token(Path::new(&settings.token_path))?)),
    };

    let opts = SyncOptions {
        dry_run,
        bootstrap,
        boundary: boundary.unwrap_or(settings.boundary),
        sender: settings.sender.clone(),
    };

    let report = {
        let mut ledger = SqliteLedger::open(&settings.db_path())?;
        sync::run(&ctx, client.as_ref(), &mut ledger, &opts)?
    };

    match &report.watermark {
        Some(w) => println!("Last stored: {w}"),
        None => println!("Last stored: (none, bootstrap run)"),
    }
    println!("{}", format!("Search: {}", report.query).dimmed());
    println!(
        "{} fetched, {} new, {} already stored, {} skipped, {} incomplete",
        report.fetched,
        report.inserted.len(),
        report.already_stored,
        report.skipped,
        report.incomplete
    );

    if !report.inserted.is_empty() {
        let mut table = Table::new();
        table.set_header(vec!["Date (UTC)", "Vendor", "Amount"]);
        for txn in &report.inserted {
            table.add_row(vec![
                Cell::new(txn.timestamp_str()),
                Cell::new(&txn.vendor_id),
                Cell::new(money(&txn.amount)).set_alignment(CellAlignment::Right),
            ]);
        }
        println!("{table}");
    }

    if report.committed {
        println!("{}", format!("Committed {} transactions.", report.inserted.len()).green());
    } else {
        println!("{}", "Dry run: nothing was committed.".yellow());
    }
    Ok(())
}
