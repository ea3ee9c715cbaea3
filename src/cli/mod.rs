pub mod accounts;
pub mod history;
pub mod init;
pub mod seed;
pub mod status;
pub mod sync;

use clap::{Parser, Subcommand};

use crate::reconciler::Boundary;

#[derive(Parser)]
#[command(name = "alertsync", about = "Sync card transaction alert emails into a local expense ledger.")]
pub struct Cli {
    /// Log every keep/skip decision
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Choose a data directory and initialize the database.
    Init {
        /// Path for alertsync data (default: ~/Documents/alertsync)
        #[arg(long = "data-dir")]
        data_dir: Option<String>,
    },
    /// Manage accounts.
    Accounts {
        #[command(subcommand)]
        command: AccountsCommands,
    },
    /// Fetch new alert emails and store their transactions.
    Sync {
        /// Account name
        #[arg(long)]
        account: String,
        /// IANA timezone used to pick the search floor (default: the account's)
        #[arg(long)]
        timezone: Option<String>,
        /// Make every decision but roll back instead of committing
        #[arg(long = "dry-run")]
        dry_run: bool,
        /// Allow a first run against an empty history
        #[arg(long)]
        bootstrap: bool,
        /// Which side of the last stored transaction counts as new
        #[arg(long, value_enum)]
        boundary: Option<Boundary>,
        /// Read messages from a JSON mailbox export instead of Gmail
        #[arg(long = "mailbox-file")]
        mailbox_file: Option<String>,
    },
    /// Store a transaction by hand, e.g. to seed the first watermark.
    Seed {
        /// Account name
        #[arg(long)]
        account: String,
        /// Timestamp, e.g. '2024-01-10 07:00:00 -0500'
        #[arg(long)]
        date: String,
        /// Vendor as it appears in the alert subject
        #[arg(long)]
        vendor: String,
        /// Amount, e.g. 10.00
        #[arg(long)]
        amount: String,
    },
    /// Show stored transactions, newest first.
    History {
        /// Account name
        #[arg(long)]
        account: String,
        /// Maximum rows to show
        #[arg(long, default_value = "20")]
        limit: usize,
    },
    /// Show settings, database and row counts.
    Status,
}

#[derive(Subcommand)]
pub enum AccountsCommands {
    /// Add or update an account.
    Add {
        /// Account name, e.g. 'lee'
        name: String,
        /// Mailbox address the alerts are delivered to
        #[arg(long)]
        mailbox: String,
        /// IANA timezone, e.g. 'US/Eastern'
        #[arg(long)]
        timezone: String,
    },
    /// List configured accounts.
    List,
}
