use comfy_table::{Cell, Table};

use crate::error::Result;
use crate::settings::{load_settings, parse_timezone, save_settings, AccountSettings};

pub fn add(name: &str, mailbox: &str, timezone: &str) -> Result<()> {
    parse_timezone(timezone)?;
    let mut settings = load_settings();
    settings.upsert_account(AccountSettings {
        name: name.to_string(),
        mailbox: mailbox.to_string(),
        timezone: timezone.to_string(),
    });
    save_settings(&settings)?;
    println!("Saved account: {name}");
    Ok(())
}

pub fn list() -> Result<()> {
    let settings = load_settings();
    let mut table = Table::new();
    table.set_header(vec!["Name", "Mailbox", "Timezone"]);
    for account in &settings.accounts {
        table.add_row(vec![
            Cell::new(&account.name),
            Cell::new(&account.mailbox),
            Cell::new(&account.timezone),
        ]);
    }
    println!("Accounts\n{table}");
    Ok(())
}
