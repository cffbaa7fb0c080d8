//! Gmail REST client.
//!
//! Messages are fetched in `format=raw` and decoded with mail-parser,
//! which handles the MIME part walking that the Gmail `full` format
//! would otherwise push onto us. Label ids arrive alongside the raw
//! payload in the same response.

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Duration, Utc};
use mail_parser::MessageParser;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::SourceError;
use crate::sources::auth::Credential;
use crate::sources::types::EmailRecord;
use crate::sources::EmailSource;

const GMAIL_BASE: &str = "https://gmail.googleapis.com/gmail/v1/users/me";

// ── API response types ──────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MessageListResponse {
    #[serde(default)]
    messages: Vec<MessageStub>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MessageStub {
    id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawMessage {
    id: String,
    #[serde(default)]
    thread_id: String,
    #[serde(default)]
    label_ids: Vec<String>,
    /// Milliseconds since the epoch, as a string.
    #[serde(default)]
    internal_date: Option<String>,
    #[serde(default)]
    raw: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LabelListResponse {
    #[serde(default)]
    labels: Vec<LabelResource>,
}

#[derive(Debug, Deserialize)]
struct LabelResource {
    id: String,
    name: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ModifyRequest<'a> {
    add_label_ids: &'a [String],
    remove_label_ids: &'a [String],
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateLabelRequest<'a> {
    name: &'a str,
    label_list_visibility: &'a str,
    message_list_visibility: &'a str,
}

#[derive(Debug, Serialize)]
struct SendRequest {
    raw: String,
}

// ── Client ──────────────────────────────────────────────────────────

/// Gmail client over the REST API. Holds a per-run bearer credential;
/// all label bookkeeping lives above this layer.
pub struct GmailClient {
    http: reqwest::Client,
    credential: Credential,
}

impl GmailClient {
    pub fn new(http: reqwest::Client, credential: Credential) -> Self {
        Self { http, credential }
    }

    fn err(reason: impl std::fmt::Display) -> SourceError {
        SourceError::RequestFailed {
            service: "gmail".into(),
            reason: reason.to_string(),
        }
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, SourceError> {
        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(SourceError::RateLimited {
                service: "gmail".into(),
            });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let excerpt: String = body.chars().take(200).collect();
            return Err(Self::err(format!("HTTP {status}: {excerpt}")));
        }
        Ok(response)
    }

    async fn get_raw_message(&self, id: &str) -> Result<RawMessage, SourceError> {
        let url = format!("{GMAIL_BASE}/messages/{id}?format=raw");
        let response = self
            .http
            .get(&url)
            .bearer_auth(self.credential.bearer())
            .send()
            .await
            .map_err(Self::err)?;
        Self::check(response)
            .await?
            .json::<RawMessage>()
            .await
            .map_err(|e| SourceError::InvalidResponse {
                service: "gmail".into(),
                reason: e.to_string(),
            })
    }

    /// Decode one raw message into an [`EmailRecord`].
    fn decode(&self, msg: RawMessage) -> EmailRecord {
        let timestamp = msg
            .internal_date
            .as_deref()
            .and_then(|ms| ms.parse::<i64>().ok())
            .and_then(DateTime::<Utc>::from_timestamp_millis)
            .unwrap_or_else(Utc::now);

        let (sender, subject, body) = match msg
            .raw
            .as_deref()
            .and_then(|raw| URL_SAFE_NO_PAD.decode(raw.trim_end_matches('=')).ok())
        {
            Some(bytes) => parse_rfc822(&bytes),
            None => {
                warn!(id = %msg.id, "message had no decodable raw payload");
                (String::new(), String::new(), String::new())
            }
        };

        // User-label ids look like "Label_123"; system ids are their
        // own names (INBOX, CATEGORY_*). Names for user labels are
        // resolved by the reconciler, which owns the id map.
        let label_names = msg
            .label_ids
            .iter()
            .filter(|id| !id.starts_with("Label_"))
            .cloned()
            .collect();

        EmailRecord {
            id: msg.id,
            thread_id: msg.thread_id,
            sender,
            subject,
            body,
            timestamp,
            label_ids: msg.label_ids,
            label_names,
            action_label: None,
        }
    }
}

/// Extract (sender, subject, plain-text body) from RFC 822 bytes.
fn parse_rfc822(bytes: &[u8]) -> (String, String, String) {
    let Some(parsed) = MessageParser::default().parse(bytes) else {
        return (String::new(), String::new(), String::new());
    };

    let sender = parsed
        .from()
        .and_then(|addr| addr.first())
        .map(|a| match (a.name(), a.address()) {
            (Some(name), Some(address)) => format!("{name} <{address}>"),
            (None, Some(address)) => address.to_string(),
            _ => String::new(),
        })
        .unwrap_or_default();

    let subject = parsed.subject().unwrap_or_default().to_string();
    let body = parsed
        .body_text(0)
        .map(|t| t.to_string())
        .unwrap_or_default();

    (sender, subject, body)
}

/// Gmail search-query date for a look-back window.
fn after_filter(days_back: u32) -> String {
    let date = Utc::now() - Duration::days(i64::from(days_back));
    format!("after:{}", date.format("%Y/%m/%d"))
}

#[async_trait]
impl EmailSource for GmailClient {
    async fn list(
        &self,
        days_back: u32,
        max_results: u32,
        query: Option<&str>,
    ) -> Result<Vec<EmailRecord>, SourceError> {
        let mut q = after_filter(days_back);
        if let Some(extra) = query {
            q.push(' ');
            q.push_str(extra);
        }
        debug!(query = %q, max_results, "listing gmail messages");

        let response = self
            .http
            .get(format!("{GMAIL_BASE}/messages"))
            .query(&[("q", q.as_str()), ("maxResults", &max_results.to_string())])
            .bearer_auth(self.credential.bearer())
            .send()
            .await
            .map_err(Self::err)?;
        let list: MessageListResponse = Self::check(response)
            .await?
            .json()
            .await
            .map_err(|e| SourceError::InvalidResponse {
                service: "gmail".into(),
                reason: e.to_string(),
            })?;

        // Per-message fetches are independent; run them concurrently.
        let fetches = list.messages.iter().map(|stub| self.get_raw_message(&stub.id));
        let results = futures::future::join_all(fetches).await;

        let mut records = Vec::with_capacity(list.messages.len());
        for (stub, result) in list.messages.iter().zip(results) {
            match result {
                Ok(raw) => records.push(self.decode(raw)),
                // One unreadable message must not sink the listing.
                Err(e) => warn!(id = %stub.id, error = %e, "skipping unreadable message"),
            }
        }
        Ok(records)
    }

    async fn modify_labels(
        &self,
        id: &str,
        add: &[String],
        remove: &[String],
    ) -> Result<(), SourceError> {
        let body = ModifyRequest {
            add_label_ids: add,
            remove_label_ids: remove,
        };
        let response = self
            .http
            .post(format!("{GMAIL_BASE}/messages/{id}/modify"))
            .bearer_auth(self.credential.bearer())
            .json(&body)
            .send()
            .await
            .map_err(Self::err)?;
        Self::check(response).await?;
        Ok(())
    }

    async fn send_raw(&self, mime: &[u8]) -> Result<(), SourceError> {
        let body = SendRequest {
            raw: URL_SAFE_NO_PAD.encode(mime),
        };
        let response = self
            .http
            .post(format!("{GMAIL_BASE}/messages/send"))
            .bearer_auth(self.credential.bearer())
            .json(&body)
            .send()
            .await
            .map_err(Self::err)?;
        Self::check(response).await?;
        Ok(())
    }

    async fn profile_address(&self) -> Result<String, SourceError> {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Profile {
            email_address: String,
        }

        let response = self
            .http
            .get(format!("{GMAIL_BASE}/profile"))
            .bearer_auth(self.credential.bearer())
            .send()
            .await
            .map_err(Self::err)?;
        let profile: Profile = Self::check(response)
            .await?
            .json()
            .await
            .map_err(|e| SourceError::InvalidResponse {
                service: "gmail".into(),
                reason: e.to_string(),
            })?;
        Ok(profile.email_address)
    }

    async fn archive(&self, id: &str) -> Result<(), SourceError> {
        self.modify_labels(id, &[], &["INBOX".to_string()]).await
    }

    async fn list_labels(&self) -> Result<Vec<(String, String)>, SourceError> {
        let response = self
            .http
            .get(format!("{GMAIL_BASE}/labels"))
            .bearer_auth(self.credential.bearer())
            .send()
            .await
            .map_err(Self::err)?;
        let list: LabelListResponse = Self::check(response)
            .await?
            .json()
            .await
            .map_err(|e| SourceError::InvalidResponse {
                service: "gmail".into(),
                reason: e.to_string(),
            })?;
        Ok(list.labels.into_iter().map(|l| (l.name, l.id)).collect())
    }

    async fn create_label(&self, name: &str) -> Result<String, SourceError> {
        let body = CreateLabelRequest {
            name,
            label_list_visibility: "labelShow",
            message_list_visibility: "show",
        };
        let response = self
            .http
            .post(format!("{GMAIL_BASE}/labels"))
            .bearer_auth(self.credential.bearer())
            .json(&body)
            .send()
            .await
            .map_err(Self::err)?;
        let created: LabelResource = Self::check(response)
            .await?
            .json()
            .await
            .map_err(|e| SourceError::InvalidResponse {
                service: "gmail".into(),
                reason: e.to_string(),
            })?;
        Ok(created.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_rfc822_extracts_fields() {
        let raw = b"From: Alice Example <alice@example.com>\r\n\
                    To: me@example.com\r\n\
                    Subject: Quarterly review\r\n\
                    Content-Type: text/plain\r\n\
                    \r\n\
                    Please take a look before Friday.\r\n";
        let (sender, subject, body) = parse_rfc822(raw);
        assert_eq!(sender, "Alice Example <alice@example.com>");
        assert_eq!(subject, "Quarterly review");
        assert!(body.contains("before Friday"));
    }

    #[test]
    fn parse_rfc822_without_display_name() {
        let raw = b"From: bot@example.com\r\n\
                    Subject: Ping\r\n\
                    Content-Type: text/plain\r\n\
                    \r\n\
                    pong\r\n";
        let (sender, subject, _) = parse_rfc822(raw);
        assert_eq!(sender, "bot@example.com");
        assert_eq!(subject, "Ping");
    }

    #[test]
    fn parse_rfc822_garbage_is_empty() {
        let (sender, subject, body) = parse_rfc822(&[]);
        assert!(sender.is_empty());
        assert!(subject.is_empty());
        assert!(body.is_empty());
    }

    #[test]
    fn after_filter_format() {
        let q = after_filter(7);
        assert!(q.starts_with("after:"));
        // Gmail expects YYYY/MM/DD.
        let date_part = q.strip_prefix("after:").unwrap();
        assert_eq!(date_part.len(), 10);
        assert_eq!(date_part.matches('/').count(), 2);
    }
}
