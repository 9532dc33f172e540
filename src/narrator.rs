//! ElevenLabs text-to-speech: memo text → MP3 artifact.
//!
//! The whole memo goes out in one request; memos are short enough that the
//! provider's per-request limit is never reached.

use std::time::{Duration, Instant};

use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::Client;
use serde::Serialize;
use tracing::{debug, info};

use crate::artifacts::OutputDir;
use crate::config::NarratorConfig;
use crate::error::{PipelineError, Result};
use crate::model::{AudioArtifact, Memo};

const AUDIO_MPEG: &str = "audio/mpeg";

#[derive(Debug, Serialize)]
struct SynthesisRequest<'a> {
    text: &'a str,
    model_id: &'a str,
    voice_settings: VoiceSettings,
}

#[derive(Debug, Clone, Copy, Serialize)]
struct VoiceSettings {
    stability: f32,
    similarity_boost: f32,
    style: f32,
    use_speaker_boost: bool,
}

pub struct Narrator {
    client: Client,
    base_url: String,
    api_key: String,
    model_id: String,
    settings: VoiceSettings,
}

impl Narrator {
    pub fn new(config: &NarratorConfig, api_key: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| PipelineError::Config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model_id: config.model_id.clone(),
            settings: VoiceSettings {
                stability: config.stability,
                similarity_boost: config.similarity_boost,
                style: config.style,
                use_speaker_boost: config.use_speaker_boost,
            },
        })
    }

    /// Narrate `memo` with `voice_id` and write the audio artifact.
    pub async fn synthesize(&self, memo: &Memo, voice_id: &str, output: &OutputDir) -> Result<AudioArtifact> {
        let t_start = Instant::now();
        let url = format!("{}/v1/text-to-speech/{voice_id}", self.base_url);
        debug!("Synthesizing {} chars with voice {voice_id}", memo.text().len());

        let resp = self
            .client
            .post(&url)
            .header("xi-api-key", &self.api_key)
            .header(ACCEPT, AUDIO_MPEG)
            .json(&SynthesisRequest {
                text: memo.text(),
                model_id: &self.model_id,
                voice_settings: self.settings,
            })
            .send()
            .await
            .map_err(|e| PipelineError::Synthesis(format!("ElevenLabs request failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(PipelineError::from_status("ElevenLabs", status, &body, PipelineError::Synthesis));
        }

        let content_type = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .filter(|v| v.starts_with("audio/"))
            .unwrap_or(AUDIO_MPEG)
            .to_string();

        let bytes = resp
            .bytes()
            .await
            .map_err(|e| PipelineError::Synthesis(format!("Failed to read ElevenLabs audio: {e}")))?;
        if bytes.is_empty() {
            return Err(PipelineError::Synthesis("ElevenLabs returned empty audio".into()));
        }

        let path = output.audio_path();
        output.write(&path, &bytes)?;
        info!(
            "Audio generated: {} bytes ({:.0}ms), saved to {}",
            bytes.len(),
            t_start.elapsed().as_secs_f64() * 1000.0,
            path.display()
        );

        Ok(AudioArtifact {
            path,
            bytes: bytes.to_vec(),
            content_type,
        })
    }
}
