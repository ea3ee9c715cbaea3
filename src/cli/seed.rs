use crate::db::{Ledger, SqliteLedger};
use crate::error::{AlertSyncError, Result};
use crate::models::TransactionDraft;
use crate::settings::load_settings;

pub fn run(account: &str, date: &str, vendor: &str, amount: &str) -> Result<()> {
    let settings = load_settings();
    if settings.account(account).is_none() {
        return Err(AlertSyncError::UnknownAccount(account.to_string()));
    }

    let draft = TransactionDraft::from_raw(Some(date), Some(vendor), Some(amount));
    let txn = draft.clone().finish().ok_or_else(|| {
        AlertSyncError::InvalidTransaction(format!("could not parse {draft}"))
    })?;

    let mut ledger = SqliteLedger::open(&settings.db_path())?;
    if ledger.contains(account, &txn)? {
        println!("Already stored: {txn}");
        return Ok(());
    }
    ledger.insert(account, std::slice::from_ref(&txn), true)?;
    println!("Stored {txn}");
    Ok(())
}
