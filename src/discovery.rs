//! Exa Websets discovery client.
//!
//! Creates a webset for the query, polls until the provider reports it idle,
//! then pages through the items and persists them verbatim.

use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::{Client, StatusCode};
use serde_json::Value;
use tracing::{debug, info};

use crate::artifacts::OutputDir;
use crate::clock::{Clock, SystemClock};
use crate::config::DiscoveryConfig;
use crate::error::{PipelineError, Result};
use crate::model::{CompanyRecord, Query, ResultSet};

const WEBSETS_PATH: &str = "/websets/v0/websets";

/// Upper bound on item pages fetched for one webset.
const MAX_ITEM_PAGES: usize = 100;

pub struct DiscoveryClient {
    client: Client,
    base_url: String,
    api_key: String,
    poll_interval: Duration,
    timeout: Duration,
    clock: Arc<dyn Clock>,
}

impl DiscoveryClient {
    pub fn new(config: &DiscoveryConfig, api_key: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| PipelineError::Config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            poll_interval: Duration::from_secs(config.poll_interval_secs),
            timeout: Duration::from_secs(config.timeout_secs),
            clock: Arc::new(SystemClock),
        })
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Run the query to completion and write the raw items to the
    /// discovery artifact.
    pub async fn fetch(&self, query: &Query, output: &OutputDir) -> Result<ResultSet> {
        let t_start = Instant::now();

        let webset_id = self.create_webset(query).await?;
        let webset = self.wait_for_idle(&webset_id).await?;
        let reported_count = reported_count(&webset);
        let items = self.list_items(&webset_id).await?;

        if let Some(expected) = reported_count {
            if expected != items.len() {
                return Err(PipelineError::Data(format!(
                    "webset {webset_id} reported {expected} items but {} were returned",
                    items.len()
                )));
            }
        }

        let result_set = ResultSet {
            webset_id,
            reported_count,
            records: items.into_iter().map(CompanyRecord::from_item).collect(),
        };

        let path = output.discovery_path();
        let json = serde_json::to_vec_pretty(&result_set.raw_items())
            .map_err(|e| PipelineError::Data(format!("Failed to serialize items: {e}")))?;
        output.write(&path, &json)?;

        info!(
            "Discovered {} companies in {:.0}ms, saved to {}",
            result_set.len(),
            t_start.elapsed().as_secs_f64() * 1000.0,
            path.display()
        );
        Ok(result_set)
    }

    async fn create_webset(&self, query: &Query) -> Result<String> {
        let body = query.to_request(self.clock.today());
        debug!("Webset request: {body}");

        let resp = self
            .client
            .post(format!("{}{WEBSETS_PATH}", self.base_url))
            .header("x-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| PipelineError::Data(format!("Webset creation request failed: {e}")))?;

        let webset = read_json(resp).await?;
        let id = webset["id"]
            .as_str()
            .filter(|id| !id.is_empty())
            .ok_or_else(|| PipelineError::Data("webset response has no id".into()))?;
        info!("Webset created: {id}");
        Ok(id.to_string())
    }

    async fn get_webset(&self, id: &str) -> Result<Value> {
        let resp = self
            .client
            .get(format!("{}{WEBSETS_PATH}/{id}", self.base_url))
            .header("x-api-key", &self.api_key)
            .send()
            .await
            .map_err(|e| PipelineError::Data(format!("Webset status request failed: {e}")))?;
        read_json(resp).await
    }

    /// Poll at a fixed interval until the webset is idle or the wait bound
    /// passes.
    async fn wait_for_idle(&self, id: &str) -> Result<Value> {
        let started = self.clock.now();
        info!(
            "Waiting for webset {id} (interval {}s, timeout {}s)",
            self.poll_interval.as_secs(),
            self.timeout.as_secs()
        );

        while self.clock.now().duration_since(started) < self.timeout {
            let webset = self.get_webset(id).await?;
            let status = webset["status"]
                .as_str()
                .ok_or_else(|| PipelineError::Data("webset response has no status".into()))?;

            if status == "idle" {
                info!("Webset {id} completed");
                return Ok(webset);
            }

            let progress = &webset["searches"][0]["progress"];
            if progress.is_object() {
                info!(
                    "Webset status: {status}. Progress: {}% (found: {}, analyzed: {})",
                    progress["completion"].as_f64().unwrap_or(0.0),
                    progress["found"].as_u64().unwrap_or(0),
                    progress["analyzed"].as_u64().unwrap_or(0),
                );
            } else {
                info!("Webset status: {status}");
            }

            self.clock.sleep(self.poll_interval).await;
        }

        Err(PipelineError::Timeout {
            waited_secs: self.clock.now().duration_since(started).as_secs(),
        })
    }

    async fn list_items(&self, id: &str) -> Result<Vec<Value>> {
        let url = format!("{}{WEBSETS_PATH}/{id}/items", self.base_url);
        let mut items = Vec::new();
        let mut cursor: Option<String> = None;
        let mut pages = 0;

        loop {
            let mut request = self.client.get(&url).header("x-api-key", &self.api_key);
            if let Some(c) = &cursor {
                request = request.query(&[("cursor", c.as_str())]);
            }

            let resp = request
                .send()
                .await
                .map_err(|e| PipelineError::Data(format!("Webset items request failed: {e}")))?;
            let page = read_json(resp).await?;

            let data = page["data"]
                .as_array()
                .ok_or_else(|| PipelineError::Data("items page has no data array".into()))?;
            items.extend(data.iter().cloned());
            debug!("Fetched {} items (total {})", data.len(), items.len());

            let next = page["nextCursor"]
                .as_str()
                .or_else(|| page["next_page_token"].as_str())
                .filter(|c| !c.is_empty())
                .map(str::to_string);
            if next.is_none() || page["hasMore"] == Value::Bool(false) {
                break;
            }
            if next == cursor {
                return Err(PipelineError::Data(format!(
                    "items cursor did not advance after {} items",
                    items.len()
                )));
            }
            pages += 1;
            if pages >= MAX_ITEM_PAGES {
                return Err(PipelineError::Data(format!(
                    "webset {id} still has more items after {MAX_ITEM_PAGES} pages"
                )));
            }
            cursor = next;
        }

        Ok(items)
    }
}

/// Sum of `found` across the webset's searches, when the provider reports it.
fn reported_count(webset: &Value) -> Option<usize> {
    let searches = webset["searches"].as_array()?;
    let counts: Vec<u64> = searches
        .iter()
        .filter_map(|s| s["progress"]["found"].as_u64())
        .collect();
    if counts.is_empty() {
        None
    } else {
        usize::try_from(counts.iter().sum::<u64>()).ok()
    }
}

async fn read_json(resp: reqwest::Response) -> Result<Value> {
    let status = resp.status();
    let body = resp
        .text()
        .await
        .map_err(|e| PipelineError::Data(format!("Failed to read Websets response: {e}")))?;

    if !(status == StatusCode::OK || status == StatusCode::CREATED) {
        return Err(PipelineError::from_status("Exa Websets", status, &body, PipelineError::Data));
    }

    serde_json::from_str(&body)
        .map_err(|e| PipelineError::Data(format!("Failed to parse Websets response: {e}")))
}
