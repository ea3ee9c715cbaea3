use crate::db::{count_by_account, get_connection};
use crate::error::Result;
use crate::settings::load_settings;

pub fn run() -> Result<()> {
    let settings = load_settings();
    let db_path = settings.db_path();

    println!("Data dir:   {}", settings.data_dir);
    println!("Database:   {}", db_path.display());
    println!("Token file: {}", settings.token_path);
    println!("Sender:     {}", settings.sender);
    println!("Boundary:   {}", settings.boundary.key());

    if !db_path.exists() {
        println!();
        println!("Database not found. Run `alertsync init` to set up.");
        return Ok(());
    }

    let conn = get_connection(&db_path)?;
    let counts = count_by_account(&conn)?;
    println!();
    for account in &settings.accounts {
        let stored = counts
            .iter()
            .find(|(name, _)| name == &account.name)
            .map(|(_, n)| *n)
            .unwrap_or(0);
        println!("{:<12} {:>6} transactions  ({}, {})", account.name, stored, account.mailbox, account.timezone);
    }
    Ok(())
}
