//! `deep_search`: plan, search, read, synthesize.
//!
//! The agent asks its own conversation to split the topic into aspects,
//! searches each aspect, reads the two best hits per search and finally asks
//! the conversation for a summary of what it read. Every search and read goes
//! through the session's dispatcher, so it nests under the delegation in the
//! call tree.

use agentrelay_core::error::LoopError;
use agentrelay_core::report::truncate;
use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::{debug, info};

use super::{Agent, AgentOutput, AgentSpec};
use crate::session::AgentSession;

const MAX_ASPECTS: usize = 3;
const RESULTS_PER_SEARCH: u64 = 3;
const PAGES_PER_SEARCH: usize = 2;
const EXCERPT_CHARS: usize = 1500;
const SYNTHESIS_CHARS: usize = 500;

const SYSTEM_PROMPT: &str = "You are a specialized deep search agent. Your task is to gather \
comprehensive information from the web on specific topics. Today is {current_date}.

For each research task:
1. Break down the topic into 2-3 key aspects to investigate
2. Formulate precise search queries for each aspect
3. Analyze search results to extract relevant information
4. Synthesize findings into a coherent summary
5. Include all relevant sources

Focus on being thorough and objective in your research.";

pub fn spec() -> AgentSpec {
    AgentSpec::new(
        "deep_search",
        "Performs comprehensive web research on specific topics",
        SYSTEM_PROMPT,
        || Box::new(DeepSearchAgent),
    )
}

#[derive(Debug, Default)]
pub struct DeepSearchAgent;

#[derive(Debug, Clone, PartialEq)]
struct Finding {
    aspect: String,
    title: String,
    url: String,
    content: String,
}

/// Turn the planner's reply into at most three search queries.
///
/// Bullets and numbering are stripped; an empty plan falls back to the topic.
pub fn parse_aspects(plan: &str, topic: &str) -> Vec<String> {
    let aspects: Vec<String> = plan
        .lines()
        .map(strip_list_marker)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .take(MAX_ASPECTS)
        .collect();
    if aspects.is_empty() {
        vec![topic.to_string()]
    } else {
        aspects
    }
}

fn strip_list_marker(line: &str) -> &str {
    let line = line.trim();
    let unnumbered = line.trim_start_matches(|c: char| c.is_ascii_digit());
    let line = match unnumbered.strip_prefix(['.', ')']) {
        Some(rest) if unnumbered.len() < line.len() => rest,
        _ => line,
    };
    line.trim_start_matches(['-', '*', '•']).trim()
}

fn top_hits(search_payload: &Value) -> Vec<(String, String)> {
    search_payload["results"]
        .as_array()
        .map(|results| {
            results
                .iter()
                .take(PAGES_PER_SEARCH)
                .filter_map(|hit| {
                    let url = hit["url"].as_str()?;
                    let title = hit["title"].as_str().unwrap_or("Unknown title");
                    Some((title.to_string(), url.to_string()))
                })
                .collect()
        })
        .unwrap_or_default()
}

fn synthesis_prompt(topic: &str, findings: &[Finding]) -> String {
    let mut prompt = format!(
        "Based on the following research, provide a comprehensive summary about: {topic}\n\n\
         Research findings:\n"
    );
    for (i, finding) in findings.iter().enumerate() {
        prompt.push_str(&format!(
            "\nSOURCE {}: {} ({})\nAspect: {}\n{}\n",
            i + 1,
            finding.title,
            finding.url,
            finding.aspect,
            truncate(&finding.content, SYNTHESIS_CHARS)
        ));
    }
    if findings.is_empty() {
        prompt.push_str("\nNo pages could be read. Summarize what is known and say so.\n");
    }
    prompt
}

impl DeepSearchAgent {
    async fn research(&self, session: &AgentSession, aspect: &str) -> Vec<Finding> {
        let search = session
            .call("search_web", json!({"query": aspect, "count": RESULTS_PER_SEARCH}))
            .await;
        if !search.is_success() {
            debug!(aspect, status = %search.status_message, "Search failed, skipping aspect");
            return Vec::new();
        }

        let mut findings = Vec::new();
        for (title, url) in top_hits(&search.payload) {
            let page = session.call("webpage_reader", json!({"url": url})).await;
            if !page.is_success() {
                debug!(url, status = %page.status_message, "Could not read page");
                continue;
            }
            let content = page.payload["content"].as_str().unwrap_or_default();
            findings.push(Finding {
                aspect: aspect.to_string(),
                title,
                url,
                content: content.chars().take(EXCERPT_CHARS).collect(),
            });
        }
        findings
    }
}

#[async_trait]
impl Agent for DeepSearchAgent {
    async fn run(&self, session: &mut AgentSession, topic: &str) -> Result<AgentOutput, LoopError> {
        info!(topic, "Deep search started");
        let plan = session
            .send(&format!(
                "Break down this research topic into 2-3 key aspects to investigate, \
                 one per line: '{topic}'"
            ))
            .await?;
        let aspects = parse_aspects(&plan, topic);
        debug!(?aspects, "Research plan");

        let mut findings = Vec::new();
        for aspect in &aspects {
            findings.extend(self.research(session, aspect).await);
        }

        let summary = session.send(&synthesis_prompt(topic, &findings)).await?;
        let sources: Vec<Value> = findings
            .iter()
            .map(|f| json!({"title": f.title, "url": f.url}))
            .collect();
        info!(topic, sources = sources.len(), "Deep search completed");

        let status = format!(
            "Completed deep search on '{topic}' with {} sources",
            sources.len()
        );
        Ok(AgentOutput::new(json!({
            "topic": topic,
            "summary": summary,
            "sources": sources,
            "aspects_researched": aspects,
            "tokens_used": session.tokens_used(),
        }))
        .with_status(status))
    }
}
