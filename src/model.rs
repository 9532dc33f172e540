//! Values handed from one pipeline stage to the next.

use std::path::PathBuf;

use chrono::NaiveDate;
use serde::Serialize;
use serde_json::{json, Value};

use crate::config::{DiscoveryConfig, EnrichmentConfig};

/// Search criteria for one discovery run.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub text: String,
    pub criteria: Vec<String>,
    pub days_lookback: u32,
    pub result_count: u32,
    pub entity_type: String,
    pub enrichments: Vec<Enrichment>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Enrichment {
    pub description: String,
    pub format: String,
}

impl From<&EnrichmentConfig> for Enrichment {
    fn from(c: &EnrichmentConfig) -> Self {
        Self {
            description: c.description.clone(),
            format: c.format.clone(),
        }
    }
}

impl Query {
    pub fn from_config(config: &DiscoveryConfig, text_override: Option<&str>) -> Self {
        Self {
            text: text_override.unwrap_or(config.query.as_str()).to_string(),
            criteria: config.criteria.clone(),
            days_lookback: config.days_lookback,
            result_count: config.result_count,
            entity_type: config.entity_type.clone(),
            enrichments: config.enrichments.iter().map(Enrichment::from).collect(),
        }
    }

    /// Criteria sent to the provider, including the lookback date range
    /// ending on `today`.
    pub fn effective_criteria(&self, today: NaiveDate) -> Vec<String> {
        let mut criteria = self.criteria.clone();
        if self.days_lookback > 0 {
            let from = today - chrono::Duration::days(i64::from(self.days_lookback));
            criteria.push(format!(
                "completed a series a fundraising round between {} and {}",
                from.format("%Y-%m-%d"),
                today.format("%Y-%m-%d")
            ));
        }
        criteria
    }

    /// Webset creation payload.
    pub fn to_request(&self, today: NaiveDate) -> Value {
        let criteria: Vec<Value> = self
            .effective_criteria(today)
            .into_iter()
            .map(|description| json!({ "description": description }))
            .collect();

        json!({
            "search": {
                "query": self.text,
                "criteria": criteria,
                "count": self.result_count,
                "entity": { "type": self.entity_type },
            },
            "enrichments": self.enrichments,
        })
    }
}

/// One discovered company.
#[derive(Debug, Clone, PartialEq)]
pub struct CompanyRecord {
    pub name: String,
    pub description: String,
    pub funding: Option<String>,
    /// When the provider added the item to the webset.
    pub discovered_at: Option<String>,
    pub source_url: Option<String>,
    /// Item exactly as the provider returned it.
    pub raw: Value,
}

impl CompanyRecord {
    pub fn from_item(item: Value) -> Self {
        let props = &item["properties"];

        let url = props["url"].as_str().map(str::to_string);
        let name = props["company"]["name"]
            .as_str()
            .map(str::to_string)
            .or_else(|| url.as_deref().map(host_of))
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| "<Unknown>".to_string());

        let description = props["description"]
            .as_str()
            .unwrap_or("")
            .trim()
            .replace('\n', " ");

        let funding = funding_from_description(&description).or_else(|| enrichment_value(&item));

        let discovered_at = item["createdAt"]
            .as_str()
            .or_else(|| item["created_at"].as_str())
            .map(str::to_string);

        Self {
            name,
            description,
            funding,
            discovered_at,
            source_url: url,
            raw: item,
        }
    }
}

fn host_of(url: &str) -> String {
    url.trim_start_matches("https://")
        .trim_start_matches("http://")
        .split('/')
        .next()
        .unwrap_or("")
        .to_string()
}

/// First whitespace-delimited token after the first `$`.
fn funding_from_description(description: &str) -> Option<String> {
    let (_, after) = description.split_once('$')?;
    after
        .split_whitespace()
        .next()
        .map(|amount| format!("${amount}"))
}

fn enrichment_value(item: &Value) -> Option<String> {
    item["enrichments"]
        .as_array()?
        .iter()
        .filter_map(|e| e["result"].as_array().and_then(|r| r.first()))
        .find_map(|v| match v {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
}

/// Companies returned by one discovery run.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultSet {
    pub webset_id: String,
    pub reported_count: Option<usize>,
    pub records: Vec<CompanyRecord>,
}

impl ResultSet {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.records.iter().map(|r| r.name.as_str())
    }

    /// Raw provider items, as persisted to the discovery artifact.
    pub fn raw_items(&self) -> Value {
        Value::Array(self.records.iter().map(|r| r.raw.clone()).collect())
    }
}

/// Generated text summary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Memo(String);

impl Memo {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn text(&self) -> &str {
        &self.0
    }

    pub fn word_count(&self) -> usize {
        self.0.split_whitespace().count()
    }
}

/// Synthesized narration written to disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioArtifact {
    pub path: PathBuf,
    pub bytes: Vec<u8>,
    pub content_type: String,
}

impl AudioArtifact {
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "memo.mp3".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookback_appends_date_range() {
        let query = Query::from_config(&DiscoveryConfig::default(), Some("fintech in NYC"));
        let today = NaiveDate::from_ymd_opt(2025, 7, 3).unwrap();
        let criteria = query.effective_criteria(today);
        assert_eq!(criteria.len(), 3);
        assert_eq!(
            criteria[2],
            "completed a series a fundraising round between 2025-06-26 and 2025-07-03"
        );

        let body = query.to_request(today);
        assert_eq!(body["search"]["query"], "fintech in NYC");
        assert_eq!(body["search"]["entity"]["type"], "company");
        assert_eq!(body["enrichments"][0]["description"], "Series A Amount");
    }

    #[test]
    fn no_lookback_keeps_criteria() {
        let mut config = DiscoveryConfig::default();
        config.days_lookback = 0;
        let query = Query::from_config(&config, None);
        let today = NaiveDate::from_ymd_opt(2025, 7, 3).unwrap();
        assert_eq!(query.effective_criteria(today), config.criteria);
    }

    #[test]
    fn record_prefers_company_name() {
        let record = CompanyRecord::from_item(json!({
            "properties": {
                "url": "https://acme.dev/about",
                "company": { "name": "Acme" },
                "description": "Acme raised $12M\nin a Series A."
            }
        }));
        assert_eq!(record.name, "Acme");
        assert_eq!(record.funding.as_deref(), Some("$12M"));
        assert_eq!(record.description, "Acme raised $12M in a Series A.");
        assert_eq!(record.source_url.as_deref(), Some("https://acme.dev/about"));
        assert_eq!(record.discovered_at, None);
    }

    #[test]
    fn record_falls_back_to_host_and_enrichment() {
        let record = CompanyRecord::from_item(json!({
            "properties": { "url": "http://widgets.io/news", "description": "Widgets for all" },
            "enrichments": [ { "result": ["15000000"] } ]
        }));
        assert_eq!(record.name, "widgets.io");
        assert_eq!(record.funding.as_deref(), Some("15000000"));

        let unknown = CompanyRecord::from_item(json!({
            "properties": {},
            "createdAt": "2025-07-02T09:30:00Z"
        }));
        assert_eq!(unknown.name, "<Unknown>");
        assert_eq!(unknown.funding, None);
        assert_eq!(unknown.discovered_at.as_deref(), Some("2025-07-02T09:30:00Z"));
    }
}
