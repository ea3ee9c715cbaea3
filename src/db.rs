use std::path::Path;

use rusqlite::Connection;

use crate::error::{AlertSyncError, Result};
use crate::models::{Transaction, TransactionDraft};

pub const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS expenses (
    id INTEGER PRIMARY KEY,
    account TEXT NOT NULL,
    datetime TEXT NOT NULL,
    vendor_id TEXT NOT NULL,
    amount TEXT NOT NULL,
    created_at TEXT DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_expenses_account_datetime ON expenses (account, datetime);
";

pub fn get_connection(db_path: &Path) -> Result<Connection> {
    let conn = Connection::open(db_path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL;")?;
    Ok(conn)
}

pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)?;
    Ok(())
}

fn row_to_transaction(datetime: &str, vendor_id: &str, amount: &str) -> Result<Transaction> {
    TransactionDraft::from_raw(Some(datetime), Some(vendor_id), Some(amount))
        .finish()
        .ok_or_else(|| {
            AlertSyncError::InvalidTransaction(format!(
                "stored row ({datetime}, {vendor_id}, {amount}) does not parse"
            ))
        })
}

/// Most recent rows for an account, newest first.
pub fn recent_transactions(conn: &Connection, account: &str, limit: usize) -> Result<Vec<Transaction>> {
    let mut stmt = conn.prepare(
        "SELECT datetime, vendor_id, amount FROM expenses WHERE account = ?1 \
         ORDER BY datetime DESC, id DESC LIMIT ?2",
    )?;
    let rows: Vec<(String, String, String)> = stmt
        .query_map(rusqlite::params![account, limit as i64], |row| {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    rows.iter()
        .map(|(dt, vendor, amount)| row_to_transaction(dt, vendor, amount))
        .collect()
}

pub fn count_by_account(conn: &Connection) -> Result<Vec<(String, i64)>> {
    let mut stmt =
        conn.prepare("SELECT account, count(*) FROM expenses GROUP BY account ORDER BY account")?;
    let rows = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ---------------------------------------------------------------------------
// Ledger
// ---------------------------------------------------------------------------

pub trait Ledger {
    /// The newest stored transaction, or `None` for an empty history.
    /// Fails when two rows share the newest timestamp.
    fn last_transaction(&self, account: &str) -> Result<Option<Transaction>>;
    fn contains(&self, account: &str, txn: &Transaction) -> Result<bool>;
    /// Stage `transactions` in one database transaction and keep them only
    /// when `commit` is set. Returns the number of rows written.
    fn insert(&mut self, account: &str, transactions: &[Transaction], commit: bool) -> Result<usize>;
}

pub struct SqliteLedger {
    conn: Connection,
}

impl SqliteLedger {
    pub fn open(db_path: &Path) -> Result<Self> {
        let conn = get_connection(db_path)?;
        init_db(&conn)?;
        Ok(Self { conn })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

impl Ledger for SqliteLedger {
    fn last_transaction(&self, account: &str) -> Result<Option<Transaction>> {
        let newest = recent_transactions(&self.conn, account, 2)?;
        match newest.as_slice() {
            [] => Ok(None),
            [first, second] if first.timestamp == second.timestamp => {
                Err(AlertSyncError::AmbiguousWatermark {
                    account: account.to_string(),
                    timestamp: first.timestamp_str(),
                })
            }
            [first, ..] => {
                tracing::debug!("Last Transaction: {first}");
                Ok(Some(first.clone()))
            }
        }
    }

    fn contains(&self, account: &str, txn: &Transaction) -> Result<bool> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT 1 FROM expenses WHERE account = ?1 AND datetime = ?2 AND vendor_id = ?3 AND amount = ?4",
        )?;
        Ok(stmt.exists(rusqlite::params![
            account,
            txn.timestamp_str(),
            txn.vendor_id,
            txn.amount_str()
        ])?)
    }

    fn insert(&mut self, account: &str, transactions: &[Transaction], commit: bool) -> Result<usize> {
        let tx = self.conn.transaction()?;
        for txn in transactions {
            tx.execute(
                "INSERT INTO expenses (account, datetime, vendor_id, amount) VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![account, txn.timestamp_str(), txn.vendor_id, txn.amount_str()],
            )?;
        }
        if commit {
            tx.commit()?;
        } else {
            tx.rollback()?;
        }
        Ok(transactions.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::parse_amount;
    use chrono::{DateTime, Utc};

    fn test_ledger() -> (tempfile::TempDir, SqliteLedger) {
        let dir = tempfile::tempdir().unwrap();
        let ledger = SqliteLedger::open(&dir.path().join("test.db")).unwrap();
        (dir, ledger)
    }

    fn txn(ts: &str, vendor: &str, amount: &str) -> Transaction {
        Transaction::new(
            DateTime::parse_from_rfc3339(ts).unwrap().with_timezone(&Utc),
            vendor,
            parse_amount(amount).unwrap(),
        )
    }

    fn row_count(ledger: &SqliteLedger) -> i64 {
        ledger
            .connection()
            .query_row("SELECT count(*) FROM expenses", [], |r| r.get(0))
            .unwrap()
    }

    #[test]
    fn test_init_db_creates_table() {
        let (_dir, ledger) = test_ledger();
        let tables: Vec<String> = ledger
            .connection()
            .prepare("SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%'")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap();
        assert!(tables.contains(&"expenses".to_string()));
    }

    #[test]
    fn test_init_db_is_idempotent() {
        let (_dir, ledger) = test_ledger();
        init_db(ledger.connection()).unwrap();
    }

    #[test]
    fn test_empty_history_has_no_watermark() {
        let (_dir, ledger) = test_ledger();
        assert_eq!(ledger.last_transaction("lee").unwrap(), None);
    }

    #[test]
    fn test_last_transaction_is_newest() {
        let (_dir, mut ledger) = test_ledger();
        let rows = [
            txn("2024-01-09T08:00:00Z", "Bean Co", "5.25"),
            txn("2024-01-10T12:00:00Z", "ACME", "10.00"),
            txn("2024-01-08T08:00:00Z", "Old", "1.00"),
        ];
        ledger.insert("lee", &rows, true).unwrap();
        ledger.insert("other", &[txn("2024-02-01T00:00:00Z", "Else", "2.00")], true).unwrap();
        assert_eq!(ledger.last_transaction("lee").unwrap(), Some(rows[1].clone()));
    }

    #[test]
    fn test_tied_newest_rows_are_ambiguous() {
        let (_dir, mut ledger) = test_ledger();
        ledger
            .insert(
                "lee",
                &[
                    txn("2024-01-10T12:00:00Z", "ACME", "10.00"),
                    txn("2024-01-10T12:00:00Z", "Kiosk", "3.00"),
                ],
                true,
            )
            .unwrap();
        let err = ledger.last_transaction("lee").unwrap_err();
        assert!(matches!(err, AlertSyncError::AmbiguousWatermark { .. }), "{err}");
    }

    #[test]
    fn test_dry_run_insert_rolls_back() {
        let (_dir, mut ledger) = test_ledger();
        let written = ledger
            .insert("lee", &[txn("2024-01-09T08:00:00Z", "Bean Co", "5.25")], false)
            .unwrap();
        assert_eq!(written, 1);
        assert_eq!(row_count(&ledger), 0);
    }

    #[test]
    fn test_commit_insert_persists() {
        let (dir, mut ledger) = test_ledger();
        ledger
            .insert("lee", &[txn("2024-01-09T08:00:00Z", "Bean Co", "5.25")], true)
            .unwrap();
        drop(ledger);
        let reopened = SqliteLedger::open(&dir.path().join("test.db")).unwrap();
        assert_eq!(row_count(&reopened), 1);
    }

    #[test]
    fn test_stored_format() {
        let (_dir, mut ledger) = test_ledger();
        ledger
            .insert("lee", &[txn("2024-01-09T03:00:00-05:00", "Bean Co", "5.3")], true)
            .unwrap();
        let (dt, amount): (String, String) = ledger
            .connection()
            .query_row("SELECT datetime, amount FROM expenses", [], |r| Ok((r.get(0)?, r.get(1)?)))
            .unwrap();
        assert_eq!(dt, "2024-01-09 08:00:00 +0000");
        assert_eq!(amount, "5.30");
    }

    #[test]
    fn test_contains() {
        let (_dir, mut ledger) = test_ledger();
        let stored = txn("2024-01-09T08:00:00Z", "Bean Co", "5.25");
        ledger.insert("lee", &[stored.clone()], true).unwrap();
        assert!(ledger.contains("lee", &stored).unwrap());
        assert!(!ledger.contains("other", &stored).unwrap());
        assert!(!ledger.contains("lee", &txn("2024-01-09T08:00:00Z", "Bean Co", "5.26")).unwrap());
    }

    #[test]
    fn test_count_by_account() {
        let (_dir, mut ledger) = test_ledger();
        ledger.insert("b", &[txn("2024-01-09T08:00:00Z", "X", "1.00")], true).unwrap();
        ledger
            .insert(
                "a",
                &[txn("2024-01-09T08:00:00Z", "X", "1.00"), txn("2024-01-10T08:00:00Z", "Y", "2.00")],
                true,
            )
            .unwrap();
        assert_eq!(
            count_by_account(ledger.connection()).unwrap(),
            vec![("a".to_string(), 2), ("b".to_string(), 1)]
        );
    }
}
