//! Google OAuth token store — two-phase authentication.
//!
//! Phase one (`authenticate`) yields a [`Credential`]; phase two is the
//! per-source client construction that consumes it. The interactive OAuth
//! consent flow is out of scope: tokens are provisioned by a separate
//! setup step and this store only loads and refreshes them. Scope and
//! expiry problems surface as typed [`AuthError`] variants decided from
//! structured data, never by matching error-message text.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::AuthError;

const GOOGLE_TOKEN_ENDPOINT: &str = "https://oauth2.googleapis.com/token";

/// Scopes the workflows request.
pub const SCOPE_GMAIL_MODIFY: &str = "https://www.googleapis.com/auth/gmail.modify";
pub const SCOPE_GMAIL_SEND: &str = "https://www.googleapis.com/auth/gmail.send";
pub const SCOPE_CALENDAR_READONLY: &str = "https://www.googleapis.com/auth/calendar.readonly";
pub const SCOPE_DRIVE_READONLY: &str = "https://www.googleapis.com/auth/drive.readonly";

/// A live bearer credential. Read-only after construction; within a run
/// every Google client shares one.
#[derive(Debug, Clone)]
pub struct Credential {
    access_token: SecretString,
    pub expiry: Option<DateTime<Utc>>,
    pub scopes: Vec<String>,
}

impl Credential {
    /// The bearer token for an Authorization header.
    pub fn bearer(&self) -> &str {
        self.access_token.expose_secret()
    }

    /// True when the stored scope set covers `scope`.
    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes.iter().any(|s| s == scope)
    }
}

/// On-disk token in Google's authorized-user format.
#[derive(Debug, Serialize, Deserialize)]
struct StoredToken {
    token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    client_id: String,
    client_secret: String,
    #[serde(default)]
    scopes: Vec<String>,
    #[serde(default)]
    expiry: Option<DateTime<Utc>>,
}

/// Structured error body from the OAuth token endpoint.
#[derive(Debug, Deserialize)]
struct TokenEndpointError {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access_token: String,
    /// Lifetime in seconds from now.
    expires_in: i64,
    #[serde(default)]
    scope: Option<String>,
}

/// Loads, validates, and refreshes the stored Google token.
pub struct TokenStore {
    path: PathBuf,
    required_scopes: Vec<String>,
}

impl TokenStore {
    pub fn new(path: impl Into<PathBuf>, required_scopes: Vec<String>) -> Self {
        Self {
            path: path.into(),
            required_scopes,
        }
    }

    /// Load the stored token, check scopes, refresh if expired.
    ///
    /// The refreshed token is written back so the next run starts warm.
    pub async fn authenticate(&self, http: &reqwest::Client) -> Result<Credential, AuthError> {
        let stored = self.load()?;

        for scope in &self.required_scopes {
            if !stored.scopes.iter().any(|s| s == scope) {
                return Err(AuthError::ScopeInsufficient {
                    scope: scope.clone(),
                });
            }
        }

        let expired = stored
            .expiry
            .map(|e| e <= Utc::now() + chrono::Duration::seconds(60))
            .unwrap_or(true);

        if !expired {
            debug!(path = %self.path.display(), "stored token still valid");
            return Ok(Credential {
                access_token: SecretString::from(stored.token),
                expiry: stored.expiry,
                scopes: stored.scopes,
            });
        }

        let Some(refresh_token) = stored.refresh_token.as_deref() else {
            return Err(AuthError::Expired);
        };

        info!(path = %self.path.display(), "access token expired, refreshing");
        let refreshed = self
            .refresh(http, &stored, refresh_token)
            .await?;

        let updated = StoredToken {
            token: refreshed.access_token.clone(),
            refresh_token: stored.refresh_token.clone(),
            client_id: stored.client_id,
            client_secret: stored.client_secret,
            scopes: match &refreshed.scope {
                Some(s) => s.split_whitespace().map(String::from).collect(),
                None => stored.scopes.clone(),
            },
            expiry: Some(Utc::now() + chrono::Duration::seconds(refreshed.expires_in)),
        };
        self.save(&updated)?;

        Ok(Credential {
            access_token: SecretString::from(updated.token),
            expiry: updated.expiry,
            scopes: updated.scopes,
        })
    }

    async fn refresh(
        &self,
        http: &reqwest::Client,
        stored: &StoredToken,
        refresh_token: &str,
    ) -> Result<RefreshResponse, AuthError> {
        let params = [
            ("client_id", stored.client_id.as_str()),
            ("client_secret", stored.client_secret.as_str()),
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
        ];

        let response = http
            .post(GOOGLE_TOKEN_ENDPOINT)
            .form(&params)
            .send()
            .await
            .map_err(|e| AuthError::RefreshFailed {
                reason: e.to_string(),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            // The endpoint reports the failure class in a structured field.
            if let Ok(body) = response.json::<TokenEndpointError>().await {
                return Err(match body.error.as_str() {
                    "invalid_grant" => AuthError::Expired,
                    "invalid_scope" => AuthError::ScopeInsufficient {
                        scope: body.error_description.unwrap_or_default(),
                    },
                    _ => AuthError::RefreshFailed {
                        reason: format!(
                            "{} ({})",
                            body.error,
                            body.error_description.unwrap_or_default()
                        ),
                    },
                });
            }
            return Err(AuthError::RefreshFailed {
                reason: format!("HTTP {status}"),
            });
        }

        response
            .json::<RefreshResponse>()
            .await
            .map_err(|e| AuthError::RefreshFailed {
                reason: format!("malformed refresh response: {e}"),
            })
    }

    fn load(&self) -> Result<StoredToken, AuthError> {
        if !self.path.exists() {
            return Err(AuthError::Store(format!(
                "token file not found: {}",
                self.path.display()
            )));
        }
        let raw = std::fs::read_to_string(&self.path)?;
        serde_json::from_str(&raw)
            .map_err(|e| AuthError::Store(format!("{}: {e}", self.path.display())))
    }

    fn save(&self, token: &StoredToken) -> Result<(), AuthError> {
        let raw = serde_json::to_string_pretty(token)
            .map_err(|e| AuthError::Store(e.to_string()))?;
        std::fs::write(&self.path, raw)?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
