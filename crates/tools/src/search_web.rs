//! Web search through a SearXNG metasearch instance.
//!
//! Sends `GET {searxng_url}/search?q=..&format=json` and keeps the first
//! `count` results as `{title, url, snippet}`.

use async_trait::async_trait;
use agentrelay_config::{AppConfig, MAX_RESULTS_COUNT};
use agentrelay_core::{
    Arguments, Capability, CapabilityError, CapabilityOutput, CapabilitySpec, ParamSpec,
    TrackingContext,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::http::{build_client, request_failed};

pub struct SearchWebTool {
    client: reqwest::Client,
    base_url: String,
    default_count: u32,
}

impl SearchWebTool {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: build_client(&config.http),
            base_url: config.search.searxng_url.trim_end_matches('/').to_string(),
            default_count: config.search.results_count,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

#[derive(Debug, Deserialize)]
struct SearxResponse {
    #[serde(default)]
    results: Vec<SearxResult>,
}

#[derive(Debug, Deserialize)]
struct SearxResult {
    title: Option<String>,
    url: Option<String>,
    content: Option<String>,
}

/// Keep the first `count` hits of a SearXNG JSON response.
pub fn parse_results(body: Value, count: usize) -> Result<Vec<SearchHit>, CapabilityError> {
    let response: SearxResponse = serde_json::from_value(body).map_err(|e| {
        CapabilityError::implementation(format!("search_web: unexpected response format: {e}"))
    })?;
    Ok(response
        .results
        .into_iter()
        .take(count)
        .map(|r| SearchHit {
            title: r.title.unwrap_or_else(|| "No title".into()),
            url: r.url.unwrap_or_else(|| "No URL".into()),
            snippet: r.content.unwrap_or_else(|| "No content".into()),
        })
        .collect())
}

#[async_trait]
impl Capability for SearchWebTool {
    fn spec(&self) -> CapabilitySpec {
        CapabilitySpec::new(
            "search_web",
            "Search the web through a SearXNG metasearch instance. Supports operators such as \
             \"exact phrase\", AND/OR, -exclude, site:example.com, after:YYYY-MM-DD and \
             category prefixes like news: or it:. Returns titles, URLs and snippets.",
        )
        .param(ParamSpec::string(
            "query",
            "The search query, optionally with operators. Be specific.",
        ))
        .param(
            ParamSpec::integer(
                "count",
                format!("Number of results to return (max {MAX_RESULTS_COUNT})"),
            )
            .with_default(self.default_count),
        )
    }

    async fn invoke(
        &self,
        args: Arguments,
        _tracking: &TrackingContext,
    ) -> Result<CapabilityOutput, CapabilityError> {
        let query = args.require_str("query")?;
        let count = args
            .u64("count")
            .unwrap_or(u64::from(self.default_count))
            .clamp(1, u64::from(MAX_RESULTS_COUNT)) as usize;

        debug!(query, count, "Searching the web");
        let response = self
            .client
            .get(format!("{}/search", self.base_url))
            .query(&[("q", query), ("format", "json")])
            .send()
            .await
            .map_err(|e| request_failed("search_web", e))?;

        if !response.status().is_success() {
            return Err(CapabilityError::implementation(format!(
                "search_web: search backend returned HTTP {}",
                response.status().as_u16()
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| request_failed("search_web", e))?;
        let hits = parse_results(body, count)?;
        if hits.is_empty() {
            return Err(CapabilityError::implementation(format!(
                "search_web: no search results found for \"{query}\""
            )));
        }

        let found = hits.len();
        Ok(CapabilityOutput::new(serde_json::json!({
            "query": query,
            "count": found,
            "results": hits,
        }))
        .with_status(format!("Searched for \"{query}\" and found {found} results")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_takes_first_count_results() {
        let body = json!({
            "results": [
                {"title": "Rust", "url": "https://rust-lang.org", "content": "A language"},
                {"title": "Cargo", "url": "https://doc.rust-lang.org/cargo", "content": "Package manager"},
                {"title": "Crates", "url": "https://crates.io"}
            ]
        });
        let hits = parse_results(body, 2).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[1].title, "Cargo");
        assert_eq!(hits[0].snippet, "A language");
    }

    #[test]
    fn missing_fields_get_placeholders() {
        let hits = parse_results(json!({"results": [{}]}), 5).unwrap();
        assert_eq!(hits[0].title, "No title");
        assert_eq!(hits[0].snippet, "No content");
    }

    #[test]
    fn empty_body_yields_no_hits() {
        assert!(parse_results(json!({}), 5).unwrap().is_empty());
    }

    #[test]
    fn spec_defaults_count_from_config() {
        let mut config = AppConfig::default();
        config.search.results_count = 7;
        let spec = SearchWebTool::new(&config).spec();
        assert_eq!(spec.name, "search_web");
        assert_eq!(spec.parameter("count").unwrap().default, Some(json!(7)));
        assert!(spec.parameter("query").unwrap().required);

        let args = spec.validate(&json!({"query": "rust"})).unwrap();
        assert_eq!(args.u64("count"), Some(7));
    }
}
