//! Gmail delivery of the memo and its narration.
//!
//! Credential acquisition follows NO_TOKEN → AUTHORIZING → AUTHORIZED → SENT.
//! A cached token short-circuits straight to AUTHORIZED; an expired one is
//! refreshed first and only falls back to AUTHORIZING when that fails.
//!
//! Components:
//! - `auth`: the [`Authorizer`] capability (interactive browser flow or a
//!   pre-authorized credential)
//! - `token`: credential cache file and refresh
//! - `message`: MIME composition

pub mod auth;
pub mod message;
pub mod token;

use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::config::DeliveryConfig;
use crate::error::{PipelineError, Result};
use crate::model::{AudioArtifact, Memo};

pub use auth::{AuthorizeError, Authorizer, InteractiveAuthorizer, PreAuthorized};
use message::{Attachment, OutgoingMessage};
pub use token::{Credential, TokenStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryState {
    NoToken,
    Authorizing,
    Authorized,
    Sent,
}

impl std::fmt::Display for DeliveryState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoToken => write!(f, "NO_TOKEN"),
            Self::Authorizing => write!(f, "AUTHORIZING"),
            Self::Authorized => write!(f, "AUTHORIZED"),
            Self::Sent => write!(f, "SENT"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryReceipt {
    /// Gmail message id; `None` when the provider accepted the message
    /// without reporting one.
    pub message_id: Option<String>,
    pub thread_id: Option<String>,
    pub recipient: String,
    /// Interactive authorization attempts made during this send.
    pub authorization_prompts: u32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SendResponse {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    thread_id: Option<String>,
}

pub struct DeliveryClient {
    client: Client,
    gmail_base_url: String,
    sender: String,
    subject: String,
    max_auth_attempts: u32,
    store: TokenStore,
    authorizer: Box<dyn Authorizer>,
}

impl DeliveryClient {
    pub fn new(config: &DeliveryConfig, sender: &str, authorizer: Box<dyn Authorizer>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| PipelineError::Config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            gmail_base_url: config.gmail_base_url.trim_end_matches('/').to_string(),
            sender: sender.to_string(),
            subject: config.subject.clone(),
            max_auth_attempts: config.max_auth_attempts.max(1),
            store: TokenStore::new(&config.token_path),
            authorizer,
        })
    }

    /// Send one email with the memo as the body and the audio attached.
    pub async fn send(&self, memo: &Memo, audio: &AudioArtifact, recipient: &str) -> Result<DeliveryReceipt> {
        let mut state = DeliveryState::NoToken;
        let (credential, prompts) = self.acquire_credential(&mut state).await?;

        let subject = format!("{} - {}", self.subject, chrono::Local::now().format("%Y-%m-%d"));
        let file_name = audio.file_name();
        let message = OutgoingMessage {
            from: &self.sender,
            to: recipient,
            subject: &subject,
            text: memo.text(),
            attachment: Some(Attachment {
                file_name: &file_name,
                content_type: &audio.content_type,
                bytes: &audio.bytes,
            }),
        };

        let url = format!("{}/gmail/v1/users/me/messages/send", self.gmail_base_url);
        let resp = self
            .client
            .post(&url)
            .bearer_auth(&credential.token)
            .json(&json!({ "raw": message.to_raw() }))
            .send()
            .await
            .map_err(|e| PipelineError::Delivery(format!("Gmail send request failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(PipelineError::from_status("Gmail", status, &body, PipelineError::Delivery));
        }

        // Gmail has accepted the message; a malformed body is only logged.
        let body = resp.text().await.unwrap_or_default();
        let sent = serde_json::from_str::<SendResponse>(&body).unwrap_or_else(|e| {
            warn!("Unexpected Gmail send response ({e}): {body}");
            SendResponse { id: None, thread_id: None }
        });

        transition(&mut state, DeliveryState::Sent);
        match &sent.id {
            Some(id) => info!("Email sent to {recipient} (message id {id})"),
            None => warn!("Email sent to {recipient}, but Gmail returned no message id"),
        }

        Ok(DeliveryReceipt {
            message_id: sent.id,
            thread_id: sent.thread_id,
            recipient: recipient.to_string(),
            authorization_prompts: prompts,
        })
    }

    /// Cached → refreshed → interactively authorized, persisting whatever
    /// was newly obtained before returning it.
    async fn acquire_credential(&self, state: &mut DeliveryState) -> Result<(Credential, u32)> {
        if let Some(cached) = self.store.load() {
            if !cached.is_expired() {
                debug!("Using cached token from {}", self.store.path().display());
                transition(state, DeliveryState::Authorized);
                return Ok((cached, 0));
            }

            if cached.can_refresh() {
                match token::refresh(&cached).await {
                    Ok(refreshed) => {
                        self.store.save(&refreshed)?;
                        info!("Refreshed expired Gmail token");
                        transition(state, DeliveryState::Authorized);
                        return Ok((refreshed, 0));
                    }
                    Err(e) => warn!("Token refresh failed, re-authorizing: {e}"),
                }
            }
        }

        transition(state, DeliveryState::Authorizing);
        let mut prompts = 0;
        loop {
            prompts += 1;
            match self.authorizer.authorize().await {
                Ok(credential) => {
                    self.store.save(&credential)?;
                    transition(state, DeliveryState::Authorized);
                    return Ok((credential, prompts));
                }
                Err(AuthorizeError::Cancelled(reason)) if prompts < self.max_auth_attempts => {
                    warn!(
                        "Authorization cancelled ({reason}), retrying ({prompts}/{})",
                        self.max_auth_attempts
                    );
                }
                Err(AuthorizeError::Cancelled(reason)) => {
                    return Err(PipelineError::Auth(format!(
                        "authorization cancelled {prompts} times, giving up: {reason}"
                    )));
                }
                Err(AuthorizeError::Failed(reason)) => {
                    return Err(PipelineError::Auth(format!("authorization failed: {reason}")));
                }
            }
        }
    }
}

fn transition(state: &mut DeliveryState, next: DeliveryState) {
    debug!("Delivery: {state} → {next}");
    *state = next;
}
