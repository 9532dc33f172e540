//! Memo generation through the Exa Answer API.
//!
//! Renders the discovered companies into a fixed prompt template, asks the
//! provider for a short audio-friendly summary and strips links and
//! citations from the answer before it is narrated.

use std::sync::OnceLock;
use std::time::{Duration, Instant};

use regex::Regex;
use reqwest::Client;
use serde_json::json;
use tracing::{info, warn};

use crate::artifacts::OutputDir;
use crate::config::SummarizerConfig;
use crate::error::{PipelineError, Result};
use crate::model::{Memo, Query, ResultSet};

/// What the memo is generated from.
#[derive(Debug, Clone, Copy)]
pub enum SummaryInput<'a> {
    Results(&'a ResultSet),
    Query(&'a Query),
}

pub struct MemoGenerator {
    client: Client,
    base_url: String,
    api_key: String,
    prompt_template: String,
    max_words: usize,
}

impl MemoGenerator {
    pub fn new(config: &SummarizerConfig, api_key: &str) -> Result<Self> {
        if !config.prompt_template.contains("{items}") {
            return Err(PipelineError::Config(
                "summarizer prompt_template must contain an {items} placeholder".into(),
            ));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| PipelineError::Config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            prompt_template: config.prompt_template.clone(),
            max_words: config.max_words,
        })
    }

    /// Prompt sent to the provider.
    pub fn prompt(&self, input: SummaryInput<'_>) -> String {
        let items = match input {
            SummaryInput::Results(results) => items_block(results),
            SummaryInput::Query(query) => query_block(query),
        };
        self.prompt_template.replace("{items}", &items)
    }

    /// Generate the memo and write it to the memo artifact.
    pub async fn summarize(&self, input: SummaryInput<'_>, output: &OutputDir) -> Result<Memo> {
        let t_start = Instant::now();
        let prompt = self.prompt(input);

        if let SummaryInput::Results(results) = input {
            info!("Summarizing {} companies", results.len());
        }

        let body = json!({
            "query": prompt,
            "includeGeneratedQuery": false,
            "max_results": 0
        });

        let url = format!("{}/answer", self.base_url);
        let resp = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| PipelineError::Generation(format!("Exa answer request failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(PipelineError::from_status("Exa answer", status, &body, PipelineError::Generation));
        }

        let data: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| PipelineError::Generation(format!("Failed to parse Exa answer response: {e}")))?;

        let answer = data["answer"].as_str().unwrap_or("").trim();
        if answer.is_empty() {
            return Err(PipelineError::Generation("Exa answer returned an empty memo".into()));
        }

        let memo = Memo::new(remove_links(answer));
        let latency_ms = t_start.elapsed().as_secs_f64() * 1000.0;

        if memo.word_count() > self.max_words {
            warn!(
                "Memo is {} words, longer than the requested {}",
                memo.word_count(),
                self.max_words
            );
        }

        let path = output.memo_path();
        output.write(&path, memo.text().as_bytes())?;
        info!(
            "Memo generated: {} chars ({latency_ms:.0}ms), saved to {}",
            memo.text().len(),
            path.display()
        );

        Ok(memo)
    }
}

/// One markdown bullet per company, in discovery order.
fn items_block(results: &ResultSet) -> String {
    results
        .records
        .iter()
        .map(|r| {
            format!(
                "- **{}**: {}  \n  Funding: {}",
                r.name,
                r.description,
                r.funding.as_deref().unwrap_or("")
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn query_block(query: &Query) -> String {
    let mut block = format!("Search: {}", query.text);
    for criterion in &query.criteria {
        block.push_str(&format!("\n- {criterion}"));
    }
    block
}

fn link_patterns() -> &'static [(Regex, &'static str); 6] {
    static PATTERNS: OnceLock<[(Regex, &'static str); 6]> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        let re = |p: &str| Regex::new(p).expect("static regex");
        [
            (re(r"\[([^\]]+)\]\([^)]+\)"), "$1"),
            (re(r"https?://\S+"), ""),
            (re(r"www\.\S+"), ""),
            (re(r"\[\d+\]"), ""),
            (re(r"[ \t]{2,}"), " "),
            (re(r"\n\s*\n\s*\n"), "\n\n"),
        ]
    })
}

/// Strip markdown links, bare URLs and numeric citations so the memo reads
/// well aloud.
pub fn remove_links(text: &str) -> String {
    let mut out = text.to_string();
    for (pattern, replacement) in link_patterns() {
        out = pattern.replace_all(&out, *replacement).into_owned();
    }
    out.trim().to_string()
}
