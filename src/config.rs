//! Configuration management for series-a-digest.
//!
//! Non-secret parameters come from a YAML file in standard locations; every
//! field has a default so the file is optional. Secrets and addresses come
//! from the environment only (see [`Secrets`]).

use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::{PipelineError, Result};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    pub base_url: String,
    pub query: String,
    pub criteria: Vec<String>,
    pub days_lookback: u32,
    pub result_count: u32,
    pub entity_type: String,
    pub enrichments: Vec<EnrichmentConfig>,
    pub poll_interval_secs: u64,
    pub timeout_secs: u64,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.exa.ai".into(),
            query: "companies in SF that just raised their series A last week".into(),
            criteria: vec![
                "company is headquartered in san francisco, ca".into(),
                "completed a series a fundraising round".into(),
            ],
            days_lookback: 7,
            result_count: 5,
            entity_type: "company".into(),
            enrichments: vec![EnrichmentConfig::default()],
            poll_interval_secs: 30,
            timeout_secs: 600,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EnrichmentConfig {
    pub description: String,
    pub format: String,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            description: "Series A Amount".into(),
            format: "number".into(),
        }
    }
}

pub const DEFAULT_PROMPT_TEMPLATE: &str = "Instructions: Create a concise audio-friendly summary with NO links or citations. \
Start with 'Hello, here is your summary of companies that raised their Series A this week.' \
For each company, mention only their name, core offering, and funding amount in plain text format. \
Do not include any URLs, citations, or references in the output:\n\n{items}\n\n";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SummarizerConfig {
    pub base_url: String,
    pub prompt_template: String,
    pub max_words: usize,
    pub timeout_secs: u64,
}

impl Default for SummarizerConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.exa.ai".into(),
            prompt_template: DEFAULT_PROMPT_TEMPLATE.into(),
            max_words: 250,
            timeout_secs: 120,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NarratorConfig {
    pub base_url: String,
    pub model_id: String,
    pub stability: f32,
    pub similarity_boost: f32,
    pub style: f32,
    pub use_speaker_boost: bool,
}

impl Default for NarratorConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.elevenlabs.io".into(),
            model_id: "eleven_monolingual_v1".into(),
            stability: 0.6,
            similarity_boost: 0.75,
            style: 0.2,
            use_speaker_boost: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DeliveryConfig {
    pub gmail_base_url: String,
    pub auth_uri: String,
    pub token_uri: String,
    pub credentials_path: PathBuf,
    pub token_path: PathBuf,
    pub subject: String,
    pub max_auth_attempts: u32,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            gmail_base_url: "https://gmail.googleapis.com".into(),
            auth_uri: "https://accounts.google.com/o/oauth2/auth".into(),
            token_uri: "https://oauth2.googleapis.com/token".into(),
            credentials_path: PathBuf::from("credentials.json"),
            token_path: PathBuf::from("token.json"),
            subject: "Series A Companies Funding Update".into(),
            max_auth_attempts: 3,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub discovery: DiscoveryConfig,
    pub summarizer: SummarizerConfig,
    pub narrator: NarratorConfig,
    pub delivery: DeliveryConfig,
    pub output_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            discovery: DiscoveryConfig::default(),
            summarizer: SummarizerConfig::default(),
            narrator: NarratorConfig::default(),
            delivery: DeliveryConfig::default(),
            output_dir: PathBuf::from("output"),
        }
    }
}

impl Config {
    /// Load configuration from YAML file.
    ///
    /// Searches standard locations if no path is provided:
    /// 1. ./series-a-digest.yaml
    /// 2. ~/.config/series-a-digest/config.yaml
    pub fn load(path: Option<&Path>) -> Self {
        let resolved = path.map(PathBuf::from).or_else(|| {
            let candidates = [
                std::env::current_dir()
                    .ok()
                    .map(|d| d.join("series-a-digest.yaml")),
                dirs::home_dir().map(|h| h.join(".config/series-a-digest/config.yaml")),
            ];
            candidates.into_iter().flatten().find(|p| p.exists())
        });

        let Some(config_path) = resolved else {
            info!("No config file found, using defaults");
            return Self::default();
        };

        match std::fs::read_to_string(&config_path) {
            Ok(contents) => match serde_yml::from_str(&contents) {
                Ok(config) => {
                    info!("Loaded config from {}", config_path.display());
                    config
                }
                Err(e) => {
                    tracing::warn!("Failed to parse {}: {e}, using defaults", config_path.display());
                    Self::default()
                }
            },
            Err(e) => {
                tracing::warn!("Failed to read {}: {e}, using defaults", config_path.display());
                Self::default()
            }
        }
    }
}

/// The recognized environment variables. Nothing else is read from the
/// environment.
pub const ENV_VARS: [&str; 5] = [
    "DISCOVERY_API_KEY",
    "SPEECH_API_KEY",
    "VOICE_ID",
    "SENDER_EMAIL",
    "RECIPIENT_EMAIL",
];

/// Secrets and addresses supplied through the environment.
#[derive(Clone)]
pub struct Secrets {
    pub discovery_api_key: String,
    pub speech_api_key: String,
    pub voice_id: String,
    pub sender_email: String,
    pub recipient_email: String,
}

impl Secrets {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary lookup. All variables are required and must
    /// be non-blank; every missing name is reported at once.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let values: Vec<Option<String>> = ENV_VARS
            .iter()
            .map(|key| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty()))
            .collect();

        let missing: Vec<&str> = ENV_VARS
            .iter()
            .zip(&values)
            .filter(|(_, v)| v.is_none())
            .map(|(k, _)| *k)
            .collect();
        if !missing.is_empty() {
            return Err(PipelineError::Config(format!(
                "missing environment variables: {}",
                missing.join(", ")
            )));
        }

        let mut values = values.into_iter().flatten();
        let mut next = || values.next().unwrap_or_default();
        Ok(Self {
            discovery_api_key: next(),
            speech_api_key: next(),
            voice_id: next(),
            sender_email: next(),
            recipient_email: next(),
        })
    }
}

impl fmt::Debug for Secrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Secrets")
            .field("discovery_api_key", &"***")
            .field("speech_api_key", &"***")
            .field("voice_id", &self.voice_id)
            .field("sender_email", &self.sender_email)
            .field("recipient_email", &self.recipient_email)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn secrets_require_every_variable() {
        let vars = env(&[("DISCOVERY_API_KEY", "exa"), ("VOICE_ID", "  ")]);
        let err = Secrets::from_lookup(|k| vars.get(k).cloned()).unwrap_err();
        let msg = err.to_string();
        assert_eq!(err.kind(), "ConfigError");
        assert!(msg.contains("SPEECH_API_KEY"));
        assert!(msg.contains("VOICE_ID"));
        assert!(!msg.contains("DISCOVERY_API_KEY"));
    }

    #[test]
    fn secrets_debug_redacts_keys() {
        let vars = env(&[
            ("DISCOVERY_API_KEY", "exa-secret"),
            ("SPEECH_API_KEY", "xi-secret"),
            ("VOICE_ID", "voice"),
            ("SENDER_EMAIL", "me@example.com"),
            ("RECIPIENT_EMAIL", "you@example.com"),
        ]);
        let secrets = Secrets::from_lookup(|k| vars.get(k).cloned()).unwrap();
        assert_eq!(secrets.recipient_email, "you@example.com");
        let debug = format!("{secrets:?}");
        assert!(!debug.contains("exa-secret"));
        assert!(!debug.contains("xi-secret"));
    }

    #[test]
    fn partial_yaml_keeps_defaults() {
        let yaml = "discovery:\n  result_count: 3\noutput_dir: /tmp/digest\n";
        let config: Config = serde_yml::from_str(yaml).unwrap();
        assert_eq!(config.discovery.result_count, 3);
        assert_eq!(config.discovery.poll_interval_secs, 30);
        assert_eq!(config.output_dir, PathBuf::from("/tmp/digest"));
        assert_eq!(config.delivery.max_auth_attempts, 3);
        assert!(config.summarizer.prompt_template.contains("{items}"));
    }
}
