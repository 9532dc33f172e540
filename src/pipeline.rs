//! Stage orchestration.
//!
//! DISCOVER → SUMMARIZE → NARRATE → DELIVER, strictly in order. The first
//! error aborts the run; nothing is resumed on the next invocation.

use std::path::PathBuf;
use std::time::Instant;

use tracing::{info, warn};

use crate::artifacts::OutputDir;
use crate::delivery::{DeliveryClient, DeliveryReceipt};
use crate::discovery::DiscoveryClient;
use crate::error::Result;
use crate::model::Query;
use crate::narrator::Narrator;
use crate::summarizer::{MemoGenerator, SummaryInput};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Delivered(DeliveryReceipt),
    /// Discovery found nothing; no memo, audio or email was produced.
    NoResults,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub discovery_path: PathBuf,
    pub memo_path: Option<PathBuf>,
    pub audio_path: Option<PathBuf>,
    pub outcome: Outcome,
}

pub struct Pipeline {
    pub discovery: DiscoveryClient,
    pub summarizer: MemoGenerator,
    pub narrator: Narrator,
    pub delivery: DeliveryClient,
    pub output: OutputDir,
    pub voice_id: String,
    pub recipient: String,
}

impl Pipeline {
    pub async fn run(&self, query: &Query) -> Result<RunReport> {
        let t_total = Instant::now();
        info!("Starting pipeline for query: {}", query.text);

        let results = self.discovery.fetch(query, &self.output).await?;
        if results.is_empty() {
            warn!("Discovery returned no companies, skipping memo and email");
            return Ok(RunReport {
                discovery_path: self.output.discovery_path(),
                memo_path: None,
                audio_path: None,
                outcome: Outcome::NoResults,
            });
        }

        let memo = self
            .summarizer
            .summarize(SummaryInput::Results(&results), &self.output)
            .await?;

        let audio = self
            .narrator
            .synthesize(&memo, &self.voice_id, &self.output)
            .await?;

        let receipt = self.delivery.send(&memo, &audio, &self.recipient).await?;

        info!(
            "Pipeline complete in {:.1}s",
            t_total.elapsed().as_secs_f64()
        );

        Ok(RunReport {
            discovery_path: self.output.discovery_path(),
            memo_path: Some(self.output.memo_path()),
            audio_path: Some(audio.path),
            outcome: Outcome::Delivered(receipt),
        })
    }
}
