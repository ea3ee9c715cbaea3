use comfy_table::{Cell, CellAlignment, Table};

use crate::db::{recent_transactions, SqliteLedger};
use crate::error::Result;
use crate::fmt::money;
use crate::settings::load_settings;

pub fn run(account: &str, limit: usize) -> Result<()> {
    let settings = load_settings();
    let ledger = SqliteLedger::open(&settings.db_path())?;
    let rows = recent_transactions(ledger.connection(), account, limit)?;

    if rows.is_empty() {
        println!("No transactions stored for {account}.");
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec!["Date (UTC)", "Vendor", "Amount"]);
    for txn in &rows {
        table.add_row(vec![
            Cell::new(txn.timestamp_str()),
            Cell::new(&txn.vendor_id),
            Cell::new(money(&txn.amount)).set_alignment(CellAlignment::Right),
        ]);
    }
    println!("{account}: last {} transactions\n{table}", rows.len());
    Ok(())
}
