use thiserror::Error;

#[derive(Error, Debug)]
pub enum AlertSyncError {
    #[error("Database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Mail API returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Unknown account: {0}")]
    UnknownAccount(String),

    #[error("Unknown timezone: {0}")]
    UnknownTimezone(String),

    #[error("No stored transactions for account {0}; seed one or run with --bootstrap")]
    NoWatermark(String),

    #[error("Multiple latest transactions for account {account} at {timestamp}")]
    AmbiguousWatermark { account: String, timestamp: String },

    #[error("Mailbox mismatch: account expects {expected}, client is signed in as {actual}")]
    MailboxMismatch { expected: String, actual: String },

    #[error("Invalid transaction: {0}")]
    InvalidTransaction(String),

    #[error("Settings error: {0}")]
    Settings(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, AlertSyncError>;
