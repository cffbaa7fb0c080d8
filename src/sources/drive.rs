//! Google Drive search client — workspace document lookups.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::error::SourceError;
use crate::sources::auth::Credential;
use crate::sources::types::DocRef;
use crate::sources::DocumentSearch;

const DRIVE_BASE: &str = "https://www.googleapis.com/drive/v3/files";

#[derive(Debug, Deserialize)]
struct FileListResponse {
    #[serde(default)]
    files: Vec<FileResource>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileResource {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    web_view_link: Option<String>,
}

/// Drive client used by the calendar-enrichment stage to find documents
/// related to a meeting.
pub struct DriveClient {
    http: reqwest::Client,
    credential: Credential,
}

impl DriveClient {
    pub fn new(http: reqwest::Client, credential: Credential) -> Self {
        Self { http, credential }
    }

    fn err(reason: impl std::fmt::Display) -> SourceError {
        SourceError::RequestFailed {
            service: "workspace".into(),
            reason: reason.to_string(),
        }
    }
}

#[async_trait]
impl DocumentSearch for DriveClient {
    async fn ready(&self) -> Result<(), SourceError> {
        // Smallest possible authorized request: one file, name only.
        let response = self
            .http
            .get(DRIVE_BASE)
            .query(&[("pageSize", "1"), ("fields", "files(name)")])
            .bearer_auth(self.credential.bearer())
            .send()
            .await
            .map_err(Self::err)?;
        if !response.status().is_success() {
            return Err(SourceError::Unavailable {
                service: "workspace".into(),
                reason: format!("readiness probe failed: HTTP {}", response.status()),
            });
        }
        Ok(())
    }

    async fn search(&self, query: &str, max_results: u32) -> Result<Vec<DocRef>, SourceError> {
        // Drive query literals escape single quotes by doubling.
        let sanitized = query.replace('\'', "\\'");
        let q = format!("fullText contains '{sanitized}' and trashed = false");
        debug!(%q, max_results, "searching drive");

        let response = self
            .http
            .get(DRIVE_BASE)
            .query(&[
                ("q", q.as_str()),
                ("pageSize", &max_results.to_string()),
                ("fields", "files(name,webViewLink)"),
            ])
            .bearer_auth(self.credential.bearer())
            .send()
            .await
            .map_err(Self::err)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let excerpt: String = body.chars().take(200).collect();
            return Err(Self::err(format!("HTTP {status}: {excerpt}")));
        }

        let list: FileListResponse =
            response
                .json()
                .await
                .map_err(|e| SourceError::InvalidResponse {
                    service: "workspace".into(),
                    reason: e.to_string(),
                })?;

        Ok(list
            .files
            .into_iter()
            .filter_map(|f| {
                let title = f.name?;
                let url = f.web_view_link?;
                Some(DocRef {
                    title,
                    url,
                    source: format!("drive-search:{query}"),
                })
            })
            .collect())
    }
}
