//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::path::Path;

use base64::engine::general_purpose::{STANDARD, URL_SAFE};
use base64::Engine;
use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use series_a_digest::config::Config;
use series_a_digest::delivery::Credential;

pub const EXA_KEY: &str = "exa-test-key";
pub const XI_KEY: &str = "xi-test-key";
pub const VOICE_ID: &str = "voice-123";
pub const SENDER: &str = "bot@example.com";
pub const RECIPIENT: &str = "reader@example.com";

/// Config pointing every provider at `base_url`, with the token cache and
/// output directory under `dir`.
pub fn test_config(base_url: &str, dir: &Path) -> Config {
    let mut config = Config::default();
    config.discovery.base_url = base_url.to_string();
    config.summarizer.base_url = base_url.to_string();
    config.narrator.base_url = base_url.to_string();
    config.delivery.gmail_base_url = base_url.to_string();
    config.delivery.token_uri = format!("{base_url}/token");
    config.delivery.token_path = dir.join("token.json");
    config.delivery.credentials_path = dir.join("credentials.json");
    config.output_dir = dir.join("output");
    config
}

pub fn company(name: &str, amount: &str) -> Value {
    json!({
        "id": format!("item_{name}"),
        "properties": {
            "type": "company",
            "url": format!("https://{}.example.com", name.to_lowercase()),
            "description": format!("{name} builds developer tools and raised {amount} in a Series A."),
            "company": { "name": name }
        },
        "enrichments": [ { "result": [amount] } ]
    })
}

/// Mount create → idle status → single items page for `items`.
pub async fn mount_discovery(server: &MockServer, items: Vec<Value>) {
    let found = items.len();
    Mock::given(method("POST"))
        .and(path("/websets/v0/websets"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "id": "ws_test", "status": "running" })))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/websets/v0/websets/ws_test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "ws_test",
            "status": "idle",
            "searches": [ { "progress": { "found": found, "analyzed": found, "completion": 100 } } ]
        })))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/websets/v0/websets/ws_test/items"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": items,
            "hasMore": false,
            "nextCursor": null
        })))
        .mount(server)
        .await;
}

pub fn valid_credential(token_uri: &str) -> Credential {
    Credential {
        token: "ya29.valid".into(),
        refresh_token: Some("1//refresh".into()),
        token_uri: token_uri.to_string(),
        client_id: "client.apps.googleusercontent.com".into(),
        client_secret: Some("secret".into()),
        scopes: vec!["https://www.googleapis.com/auth/gmail.send".into()],
        expiry: Some((chrono::Utc::now() + chrono::Duration::hours(1)).to_rfc3339()),
    }
}

#[derive(Debug)]
pub struct MimePart {
    pub content_type: String,
    pub disposition: Option<String>,
    pub body: Vec<u8>,
}

/// Decode the `raw` field of a Gmail send request into its leaf parts.
pub fn mime_parts(raw: &str) -> Vec<MimePart> {
    let decoded = URL_SAFE.decode(raw).expect("raw is base64url");
    let mime = String::from_utf8(decoded).expect("mime is utf-8");

    let mut chunks: Vec<Vec<&str>> = vec![Vec::new()];
    for line in mime.split("\r\n") {
        if line.starts_with("--=_series_a_digest") {
            chunks.push(Vec::new());
        } else if let Some(chunk) = chunks.last_mut() {
            chunk.push(line);
        }
    }

    chunks
        .into_iter()
        .filter_map(|lines| {
            let split = lines.iter().position(|l| l.is_empty())?;
            let (headers, body) = lines.split_at(split);
            let header = |name: &str| {
                headers
                    .iter()
                    .find_map(|h| h.strip_prefix(name))
                    .map(|v| v.trim().to_string())
            };
            let content_type = header("Content-Type:")?;
            if content_type.starts_with("multipart/") {
                return None;
            }
            let encoded: String = body.iter().map(|l| l.trim()).collect();
            let body = STANDARD.decode(encoded).expect("leaf is base64");
            Some(MimePart {
                content_type,
                disposition: header("Content-Disposition:"),
                body,
            })
        })
        .collect()
}

/// Raw message from the single recorded Gmail send request.
pub async fn sent_raw(server: &MockServer) -> Vec<String> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .into_iter()
        .filter(|r| r.url.path() == "/gmail/v1/users/me/messages/send")
        .map(|r| {
            let body: Value = r.body_json().expect("send body is json");
            body["raw"].as_str().expect("raw field").to_string()
        })
        .collect()
}
