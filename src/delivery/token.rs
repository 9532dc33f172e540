//! Cached Gmail OAuth credential.
//!
//! The file format matches what Google's Python client writes with
//! `Credentials.to_json()`, so an existing `token.json` keeps working.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{PipelineError, Result};

pub const GMAIL_SEND_SCOPE: &str = "https://www.googleapis.com/auth/gmail.send";

/// Seconds of remaining life below which a token counts as expired.
const EXPIRY_SKEW_SECS: i64 = 60;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Credential {
    /// The access token (Python writes this as "token")
    #[serde(alias = "access_token")]
    pub token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: Option<String>,
    #[serde(default)]
    pub scopes: Vec<String>,
    /// RFC 3339 expiry; absent means the token does not expire.
    #[serde(default)]
    pub expiry: Option<String>,
}

fn default_token_uri() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

impl Credential {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        let Some(expiry) = &self.expiry else {
            return false;
        };
        match DateTime::parse_from_rfc3339(expiry) {
            Ok(expiry) => expiry <= now + chrono::Duration::seconds(EXPIRY_SKEW_SECS),
            // Unparseable expiry: treat as expired so it gets refreshed.
            Err(_) => true,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    pub fn can_refresh(&self) -> bool {
        self.refresh_token.as_deref().is_some_and(|t| !t.is_empty())
    }
}

/// Credential cache file at an explicit path.
#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the cached credential. A missing or unreadable cache is `None`.
    pub fn load(&self) -> Option<Credential> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!("Failed to read token cache {}: {e}", self.path.display());
                return None;
            }
        };

        match serde_json::from_str(&content) {
            Ok(credential) => Some(credential),
            Err(e) => {
                warn!("Ignoring malformed token cache {}: {e}", self.path.display());
                None
            }
        }
    }

    pub fn save(&self, credential: &Credential) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| PipelineError::io(parent, e))?;
        }

        let content = serde_json::to_string_pretty(credential)
            .map_err(|e| PipelineError::Auth(format!("Failed to serialize token: {e}")))?;
        std::fs::write(&self.path, content).map_err(|e| PipelineError::io(&self.path, e))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&self.path, std::fs::Permissions::from_mode(0o600))
                .map_err(|e| PipelineError::io(&self.path, e))?;
        }

        info!("Token cached at {}", self.path.display());
        Ok(())
    }
}

/// Parse a token endpoint response into a fresh credential based on `base`.
pub(crate) fn apply_token_response(base: &Credential, body: &serde_json::Value) -> Result<Credential> {
    let access_token = body["access_token"]
        .as_str()
        .filter(|t| !t.is_empty())
        .ok_or_else(|| PipelineError::Auth("token response has no access_token".into()))?;
    let expires_in = body["expires_in"].as_i64().unwrap_or(3600);

    let mut credential = base.clone();
    credential.token = access_token.to_string();
    credential.expiry = Some((Utc::now() + chrono::Duration::seconds(expires_in)).to_rfc3339());
    if let Some(refresh) = body["refresh_token"].as_str() {
        credential.refresh_token = Some(refresh.to_string());
    }
    Ok(credential)
}

/// Exchange the refresh token for a new access token.
pub async fn refresh(credential: &Credential) -> Result<Credential> {
    let refresh_token = credential
        .refresh_token
        .as_deref()
        .ok_or_else(|| PipelineError::Auth("credential has no refresh token".into()))?;

    let client = Client::builder()
        .timeout(Duration::from_secs(30))
        .build()
        .map_err(|e| PipelineError::Config(format!("Failed to create HTTP client: {e}")))?;

    let mut form = vec![
        ("client_id", credential.client_id.as_str()),
        ("refresh_token", refresh_token),
        ("grant_type", "refresh_token"),
    ];
    if let Some(secret) = credential.client_secret.as_deref() {
        form.push(("client_secret", secret));
    }

    let resp = client
        .post(&credential.token_uri)
        .form(&form)
        .send()
        .await
        .map_err(|e| PipelineError::Auth(format!("Token refresh request failed: {e}")))?;

    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();
    if !status.is_success() {
        return Err(PipelineError::Auth(format!("Token refresh failed ({status}): {body}")));
    }

    let body: serde_json::Value = serde_json::from_str(&body)
        .map_err(|e| PipelineError::Auth(format!("Failed to parse token refresh response: {e}")))?;
    apply_token_response(credential, &body)
}
