//! Authorization capability for the Gmail credential.
//!
//! [`InteractiveAuthorizer`] runs the installed-app OAuth consent flow in the
//! user's browser. [`PreAuthorized`] hands out a credential obtained out of
//! band, so tests and embedders never open a browser.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::{Query, State};
use axum::response::Html;
use axum::routing::get;
use axum::Router;
use reqwest::{Client, Url};
use serde::Deserialize;
use tokio::sync::oneshot;
use tracing::{info, warn};
use uuid::Uuid;

use super::token::{apply_token_response, Credential, GMAIL_SEND_SCOPE};

#[derive(Debug, thiserror::Error)]
pub enum AuthorizeError {
    /// The user declined, closed the flow, or never answered. Retryable.
    #[error("authorization cancelled: {0}")]
    Cancelled(String),
    #[error("{0}")]
    Failed(String),
}

#[async_trait]
pub trait Authorizer: Send + Sync {
    async fn authorize(&self) -> Result<Credential, AuthorizeError>;
}

// --- Pre-authorized ---

/// Grants a fixed credential and counts how often it was asked to.
pub struct PreAuthorized {
    credential: Credential,
    grants: AtomicU32,
}

impl PreAuthorized {
    pub fn new(credential: Credential) -> Self {
        Self {
            credential,
            grants: AtomicU32::new(0),
        }
    }

    pub fn grants(&self) -> u32 {
        self.grants.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl Authorizer for PreAuthorized {
    async fn authorize(&self) -> Result<Credential, AuthorizeError> {
        self.grants.fetch_add(1, Ordering::Relaxed);
        Ok(self.credential.clone())
    }
}

// Shared pointers authorize too, so callers can keep a handle for inspection.
#[async_trait]
impl<A: Authorizer + ?Sized> Authorizer for Arc<A> {
    async fn authorize(&self) -> Result<Credential, AuthorizeError> {
        (**self).authorize().await
    }
}

// --- Interactive ---

/// OAuth client secret file (`credentials.json`), desktop or web type.
#[derive(Debug, Clone, Deserialize)]
struct ClientSecretFile {
    installed: Option<ClientSecret>,
    web: Option<ClientSecret>,
}

#[derive(Debug, Clone, Deserialize)]
struct ClientSecret {
    client_id: String,
    #[serde(default)]
    client_secret: Option<String>,
    auth_uri: Option<String>,
    token_uri: Option<String>,
}

pub struct InteractiveAuthorizer {
    credentials_path: PathBuf,
    auth_uri: String,
    token_uri: String,
    consent_timeout: Duration,
}

impl InteractiveAuthorizer {
    pub fn new(credentials_path: impl Into<PathBuf>, auth_uri: &str, token_uri: &str) -> Self {
        Self {
            credentials_path: credentials_path.into(),
            auth_uri: auth_uri.to_string(),
            token_uri: token_uri.to_string(),
            consent_timeout: Duration::from_secs(300),
        }
    }

    fn load_client_secret(&self) -> Result<ClientSecret, AuthorizeError> {
        let content = std::fs::read_to_string(&self.credentials_path).map_err(|e| {
            AuthorizeError::Failed(format!(
                "Failed to read OAuth client file {}: {e}",
                self.credentials_path.display()
            ))
        })?;
        let file: ClientSecretFile = serde_json::from_str(&content).map_err(|e| {
            AuthorizeError::Failed(format!(
                "Invalid OAuth client file {}: {e}",
                self.credentials_path.display()
            ))
        })?;
        file.installed.or(file.web).ok_or_else(|| {
            AuthorizeError::Failed("OAuth client file has neither \"installed\" nor \"web\" section".into())
        })
    }
}

type CallbackSlot = Arc<Mutex<Option<oneshot::Sender<HashMap<String, String>>>>>;

async fn handle_callback(
    State(slot): State<CallbackSlot>,
    Query(params): Query<HashMap<String, String>>,
) -> Html<&'static str> {
    let denied = params.contains_key("error");
    let sender = slot.lock().ok().and_then(|mut guard| guard.take());
    if let Some(tx) = sender {
        let _ = tx.send(params);
    }
    if denied {
        Html("<html><body><h2>Authorization denied. You can close this tab.</h2></body></html>")
    } else {
        Html("<html><body><h2>Authorization complete. You can close this tab.</h2></body></html>")
    }
}

/// Unguessable per-flow value echoed back by the provider.
fn flow_state() -> String {
    Uuid::new_v4().simple().to_string()
}

#[async_trait]
impl Authorizer for InteractiveAuthorizer {
    async fn authorize(&self) -> Result<Credential, AuthorizeError> {
        let secret = self.load_client_secret()?;
        let auth_uri = secret.auth_uri.clone().unwrap_or_else(|| self.auth_uri.clone());
        let token_uri = secret.token_uri.clone().unwrap_or_else(|| self.token_uri.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| AuthorizeError::Failed(format!("Failed to bind OAuth redirect listener: {e}")))?;
        let port = listener
            .local_addr()
            .map_err(|e| AuthorizeError::Failed(format!("Failed to read listener address: {e}")))?
            .port();
        let redirect_uri = format!("http://127.0.0.1:{port}/");

        let (tx, rx) = oneshot::channel();
        let slot: CallbackSlot = Arc::new(Mutex::new(Some(tx)));
        let app = Router::new().route("/", get(handle_callback)).with_state(slot);
        let server = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                warn!("OAuth redirect listener error: {e}");
            }
        });

        let state = flow_state();
        let consent_url = Url::parse_with_params(
            &auth_uri,
            &[
                ("client_id", secret.client_id.as_str()),
                ("redirect_uri", redirect_uri.as_str()),
                ("response_type", "code"),
                ("scope", GMAIL_SEND_SCOPE),
                ("access_type", "offline"),
                ("prompt", "consent"),
                ("state", state.as_str()),
            ],
        )
        .map_err(|e| AuthorizeError::Failed(format!("Invalid auth_uri {auth_uri}: {e}")))?;

        info!("Opening browser for Gmail authorization");
        if let Err(e) = open::that(consent_url.as_str()) {
            warn!("Failed to open browser: {e}");
            eprintln!("Open this URL to authorize Gmail sending:\n{consent_url}");
        }

        let outcome = tokio::time::timeout(self.consent_timeout, rx).await;
        server.abort();

        let params = match outcome {
            Ok(Ok(params)) => params,
            Ok(Err(_)) => return Err(AuthorizeError::Cancelled("redirect listener closed".into())),
            Err(_) => return Err(AuthorizeError::Cancelled("no response from browser".into())),
        };

        if let Some(error) = params.get("error") {
            return Err(AuthorizeError::Cancelled(error.clone()));
        }
        if params.get("state").map(String::as_str) != Some(state.as_str()) {
            return Err(AuthorizeError::Failed("OAuth state mismatch".into()));
        }
        let code = params
            .get("code")
            .filter(|c| !c.is_empty())
            .ok_or_else(|| AuthorizeError::Cancelled("no authorization code received".into()))?;

        let client = Client::new();
        let mut form = vec![
            ("code", code.as_str()),
            ("client_id", secret.client_id.as_str()),
            ("redirect_uri", redirect_uri.as_str()),
            ("grant_type", "authorization_code"),
        ];
        if let Some(s) = secret.client_secret.as_deref() {
            form.push(("client_secret", s));
        }

        let resp = client
            .post(&token_uri)
            .form(&form)
            .send()
            .await
            .map_err(|e| AuthorizeError::Failed(format!("Token exchange request failed: {e}")))?;
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(AuthorizeError::Failed(format!("Token exchange failed ({status}): {body}")));
        }
        let body: serde_json::Value = serde_json::from_str(&body)
            .map_err(|e| AuthorizeError::Failed(format!("Failed to parse token response: {e}")))?;

        let base = Credential {
            token: String::new(),
            refresh_token: None,
            token_uri,
            client_id: secret.client_id,
            client_secret: secret.client_secret,
            scopes: vec![GMAIL_SEND_SCOPE.to_string()],
            expiry: None,
        };
        apply_token_response(&base, &body).map_err(|e| AuthorizeError::Failed(e.to_string()))
    }
}
