use std::path::PathBuf;

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::{AlertSyncError, Result};
use crate::fetcher::DEFAULT_SENDER;
use crate::reconciler::Boundary;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountSettings {
    pub name: String,
    pub mailbox: String,
    pub timezone: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub data_dir: String,
    #[serde(default = "default_token_path")]
    pub token_path: String,
    #[serde(default = "default_sender")]
    pub sender: String,
    #[serde(default)]
    pub boundary: Boundary,
    #[serde(default)]
    pub accounts: Vec<AccountSettings>,
}

fn default_token_path() -> String {
    config_dir().join("gmail_token.json").to_string_lossy().to_string()
}

fn default_sender() -> String {
    DEFAULT_SENDER.to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir().to_string_lossy().to_string(),
            token_path: default_token_path(),
            sender: default_sender(),
            boundary: Boundary::default(),
            accounts: Vec::new(),
        }
    }
}

impl Settings {
    pub fn db_path(&self) -> PathBuf {
        PathBuf::from(&self.data_dir).join("alertsync.db")
    }

    pub fn account(&self, name: &str) -> Option<&AccountSettings> {
        self.accounts.iter().find(|a| a.name == name)
    }

    /// Add or replace an account by name.
    pub fn upsert_account(&mut self, account: AccountSettings) {
        match self.accounts.iter_mut().find(|a| a.name == account.name) {
            Some(existing) => *existing = account,
            None => self.accounts.push(account),
        }
    }
}

/// Immutable per-run view of one account.
#[derive(Debug, Clone, PartialEq)]
pub struct AccountContext {
    pub name: String,
    pub mailbox: String,
    pub timezone: Tz,
}

impl AccountContext {
    pub fn new(name: &str, mailbox: &str, timezone: &str) -> Result<Self> {
        Ok(Self {
            name: name.to_string(),
            mailbox: mailbox.to_string(),
            timezone: parse_timezone(timezone)?,
        })
    }

    /// Resolve an account from settings, optionally overriding its timezone.
    pub fn resolve(settings: &Settings, name: &str, timezone: Option<&str>) -> Result<Self> {
        let account = settings
            .account(name)
            .ok_or_else(|| AlertSyncError::UnknownAccount(name.to_string()))?;
        Self::new(&account.name, &account.mailbox, timezone.unwrap_or(&account.timezone))
    }
}

pub fn parse_timezone(name: &str) -> Result<Tz> {
    name.parse::<Tz>()
        .map_err(|_| AlertSyncError::UnknownTimezone(name.to_string()))
}

fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("alertsync")
}

fn settings_path() -> PathBuf {
    config_dir().join("settings.json")
}

fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("Documents")
        .join("alertsync")
}

pub fn load_settings() -> Settings {
    let path = settings_path();
    if path.exists() {
        let content = std::fs::read_to_string(&path).unwrap_or_default();
        serde_json::from_str(&content).unwrap_or_default()
    } else {
        Settings::default()
    }
}

pub fn save_settings(settings: &Settings) -> Result<()> {
    let dir = config_dir();
    std::fs::create_dir_all(&dir)?;
    let json = serde_json::to_string_pretty(settings)
        .map_err(|e| AlertSyncError::Settings(e.to_string()))?;
    std::fs::write(settings_path(), format!("{json}\n"))?;
    Ok(())
}

pub fn shellexpand_path(path: &str) -> String {
    if path.starts_with('~') {
        if let Some(home) = dirs::home_dir() {
            return path.replacen('~', &home.to_string_lossy(), 1);
        }
    }
    std::fs::canonicalize(path)
        .unwrap_or_else(|_| PathBuf::from(path))
        .to_string_lossy()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lee() -> AccountSettings {
        AccountSettings {
            name: "lee".to_string(),
            mailbox: "lee@example.com".to_string(),
            timezone: "US/Eastern".to_string(),
        }
    }

    #[test]
    fn test_load_merges_with_defaults() {
        let json = r#"{"data_dir": "/tmp/test"}"#;
        let s: Settings = serde_json::from_str(json).unwrap();
        assert_eq!(s.data_dir, "/tmp/test");
        assert_eq!(s.sender, "no.reply.alerts@chase.com");
        assert_eq!(s.boundary, Boundary::Older);
        assert!(s.accounts.is_empty());
        assert!(s.token_path.ends_with("gmail_token.json"));
    }

    #[test]
    fn test_roundtrip_with_accounts() {
        let mut settings = Settings {
            data_dir: "/tmp/test".to_string(),
            boundary: Boundary::Newer,
            ..Settings::default()
        };
        settings.upsert_account(lee());
        let json = serde_json::to_string_pretty(&settings).unwrap();
        assert!(json.contains("\"boundary\": \"newer\""));
        let loaded: Settings = serde_json::from_str(&json).unwrap();
        assert_eq!(loaded.accounts, vec![lee()]);
        assert_eq!(loaded.boundary, Boundary::Newer);
        assert_eq!(loaded.db_path(), PathBuf::from("/tmp/test/alertsync.db"));
    }

    #[test]
    fn test_upsert_replaces_by_name() {
        let mut settings = Settings::default();
        settings.upsert_account(lee());
        settings.upsert_account(AccountSettings {
            timezone: "UTC".to_string(),
            ..lee()
        });
        assert_eq!(settings.accounts.len(), 1);
        assert_eq!(settings.accounts[0].timezone, "UTC");
    }

    #[test]
    fn test_resolve_account_context() {
        let mut settings = Settings::default();
        settings.upsert_account(lee());
        let ctx = AccountContext::resolve(&settings, "lee", None).unwrap();
        assert_eq!(ctx.timezone, chrono_tz::US::Eastern);
        let ctx = AccountContext::resolve(&settings, "lee", Some("Europe/Berlin")).unwrap();
        assert_eq!(ctx.timezone, chrono_tz::Europe::Berlin);
        assert_eq!(ctx.mailbox, "lee@example.com");
    }

    #[test]
    fn test_resolve_errors() {
        let mut settings = Settings::default();
        settings.upsert_account(lee());
        assert!(matches!(
            AccountContext::resolve(&settings, "nobody", None),
            Err(AlertSyncError::UnknownAccount(_))
        ));
        assert!(matches!(
            AccountContext::resolve(&settings, "lee", Some("Mars/Olympus")),
            Err(AlertSyncError::UnknownTimezone(_))
        ));
    }
}
