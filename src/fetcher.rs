use std::path::Path;

use chrono::NaiveDate;
use serde::Deserialize;

use crate::error::{AlertSyncError, Result};
use crate::parser::{Header, RawMessage};

pub const DEFAULT_SENDER: &str = "no.reply.alerts@chase.com";
const SUBJECT_FILTER: &str = "Your * transaction with *";

/// One page of message ids from the provider.
#[derive(Debug, Clone, Default)]
pub struct MessagePage {
    pub ids: Vec<String>,
    pub next_page_token: Option<String>,
}

/// Read access to a mailbox. Transport, auth and retries live behind this.
pub trait MailClient {
    /// Address of the mailbox the client is signed in to.
    fn profile_address(&self) -> Result<String>;
    fn list_messages(&self, query: &str, page_token: Option<&str>) -> Result<MessagePage>;
    fn get_message(&self, id: &str) -> Result<RawMessage>;
}

/// Search query for alert messages, optionally floored at a local calendar day.
/// The provider treats `after:` as inclusive of that day.
pub fn build_query(sender: &str, after: Option<NaiveDate>) -> String {
    let mut query = format!("from:({sender}) subject:({SUBJECT_FILTER})");
    if let Some(date) = after {
        query.push_str(&format!(" after:{}", date.format("%Y/%m/%d")));
    }
    query
}

/// Follow page tokens until exhausted and return every message id, in
/// provider order.
pub fn list_all_message_ids(client: &dyn MailClient, query: &str) -> Result<Vec<String>> {
    tracing::debug!("Querying mailbox with q='{query}'");
    let mut ids = Vec::new();
    let mut page_token: Option<String> = None;
    loop {
        let page = client.list_messages(query, page_token.as_deref())?;
        ids.extend(page.ids);
        match page.next_page_token {
            Some(token) if !token.is_empty() => page_token = Some(token),
            _ => break,
        }
    }
    tracing::debug!("Retrieved {} transaction messages", ids.len());
    Ok(ids)
}

/// List and download every candidate alert message.
pub fn fetch_candidates(client: &dyn MailClient, query: &str) -> Result<Vec<RawMessage>> {
    list_all_message_ids(client, query)?
        .iter()
        .map(|id| client.get_message(id))
        .collect()
}

// ---------------------------------------------------------------------------
// Gmail REST client
// ---------------------------------------------------------------------------

const GMAIL_API_URL: &str = "https://gmail.googleapis.com/gmail/v1/users/me";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GmailProfile {
    email_address: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GmailListResponse {
    #[serde(default)]
    messages: Vec<GmailMessageRef>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GmailMessageRef {
    id: String,
}

#[derive(Debug, Deserialize)]
struct GmailMessage {
    id: String,
    #[serde(default)]
    payload: Option<GmailPayload>,
}

#[derive(Debug, Deserialize)]
struct GmailPayload {
    #[serde(default)]
    headers: Vec<Header>,
}

pub struct GmailClient {
    client: reqwest::blocking::Client,
    access_token: String,
    base_url: String,
}

impl GmailClient {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            client: reqwest::blocking::Client::new(),
            access_token: access_token.into(),
            base_url: GMAIL_API_URL.to_string(),
        }
    }

    fn get<T: serde::de::DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> Result<T> {
        let response = self
            .client
            .get(format!("{}{path}", self.base_url))
            .bearer_auth(&self.access_token)
            .query(query)
            .send()?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(AlertSyncError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response.json()?)
    }
}

impl MailClient for GmailClient {
    fn profile_address(&self) -> Result<String> {
        let profile: GmailProfile = self.get("/profile", &[])?;
        Ok(profile.email_address)
    }

    fn list_messages(&self, query: &str, page_token: Option<&str>) -> Result<MessagePage> {
        let mut params = vec![("q", query)];
        if let Some(token) = page_token {
            params.push(("pageToken", token));
        }
        let response: GmailListResponse = self.get("/messages", &params)?;
        Ok(MessagePage {
            ids: response.messages.into_iter().map(|m| m.id).collect(),
            next_page_token: response.next_page_token,
        })
    }

    fn get_message(&self, id: &str) -> Result<RawMessage> {
        let message: GmailMessage = self.get(
            &format!("/messages/{id}"),
            &[
                ("format", "metadata"),
                ("metadataHeaders", "Subject"),
                ("metadataHeaders", "Date"),
            ],
        )?;
        Ok(RawMessage {
            id: message.id,
            headers: message.payload.map(|p| p.headers).unwrap_or_default(),
        })
    }
}

/// Read the bearer token from the environment or a saved token file.
pub fn load_access_token(token_path: &Path) -> Result<String> {
    if let Ok(token) = std::env::var("ALERTSYNC_GMAIL_TOKEN") {
        if !token.trim().is_empty() {
            return Ok(token.trim().to_string());
        }
    }
    let content = std::fs::read_to_string(token_path).map_err(|e| {
        AlertSyncError::Settings(format!("Cannot read token file {}: {e}", token_path.display()))
    })?;
    let raw: serde_json::Value = serde_json::from_str(&content)?;
    ["token", "access_token"]
        .iter()
        .find_map(|key| raw.get(key).and_then(|v| v.as_str()))
        .map(str::to_string)
        .ok_or_else(|| {
            AlertSyncError::Settings(format!("No access token in {}", token_path.display()))
        })
}

// ---------------------------------------------------------------------------
// Offline mailbox export
// ---------------------------------------------------------------------------

/// A mailbox exported to JSON: `{"address": ..., "messages": [{id, headers}]}`.
/// The export is assumed to be pre-filtered, so queries are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct MailboxFile {
    pub address: String,
    #[serde(default)]
    pub messages: Vec<RawMessage>,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

fn default_page_size() -> usize {
    100
}

impl MailboxFile {
    pub fn open(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let mailbox: MailboxFile = serde_json::from_str(&content)?;
        Ok(mailbox)
    }
}

impl MailClient for MailboxFile {
    fn profile_address(&self) -> Result<String> {
        Ok(self.address.clone())
    }

    fn list_messages(&self, _query: &str, page_token: Option<&str>) -> Result<MessagePage> {
        let start: usize = match page_token {
            Some(token) => token
                .parse()
                .map_err(|_| AlertSyncError::Other(format!("Bad page token: {token}")))?,
            None => 0,
        };
        let size = self.page_size.max(1);
        let end = (start + size).min(self.messages.len());
        let ids = self.messages[start.min(end)..end].iter().map(|m| m.id.clone()).collect();
        let next_page_token = (end < self.messages.len()).then(|| end.to_string());
        Ok(MessagePage { ids, next_page_token })
    }

    fn get_message(&self, id: &str) -> Result<RawMessage> {
        self.messages
            .iter()
            .find(|m| m.id == id)
            .cloned()
            .ok_or_else(|| AlertSyncError::Other(format!("Message not found: {id}")))
    }
}
