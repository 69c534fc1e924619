//! `query_improver`: rewrite a query for clarity, optionally in a given style.

use agentrelay_core::error::LoopError;
use async_trait::async_trait;
use serde_json::json;

use super::{Agent, AgentOutput, AgentSpec};
use crate::session::AgentSession;

const SYSTEM_PROMPT: &str = "You are a query improvement specialist. Enhance queries by:
1. Fixing grammar and spelling errors
2. Improving clarity and precision
3. Adjusting style as requested
4. Preserving the original intent

Return only the improved query without explanations or commentary.";

pub fn spec() -> AgentSpec {
    AgentSpec::new(
        "query_improver",
        "Improves queries with better grammar, clarity, and precision",
        SYSTEM_PROMPT,
        || Box::new(QueryImproverAgent),
    )
}

#[derive(Debug, Default)]
pub struct QueryImproverAgent;

/// Split `"<query> style: <style>"` into the query and a known style.
///
/// Unrecognized or absent styles are `neutral`.
pub fn parse_style(task: &str) -> (&str, &'static str) {
    let Some(at) = task.to_ascii_lowercase().find("style:") else {
        return (task.trim(), "neutral");
    };
    let query = task[..at].trim();
    let requested = task[at + "style:".len()..].to_ascii_lowercase();
    let style = ["formal", "professional", "casual"]
        .into_iter()
        .find(|s| requested.contains(s))
        .unwrap_or("neutral");
    (query, style)
}

fn clean_answer(answer: &str) -> String {
    answer.trim().trim_matches('"').trim().to_string()
}

#[async_trait]
impl Agent for QueryImproverAgent {
    async fn run(&self, session: &mut AgentSession, task: &str) -> Result<AgentOutput, LoopError> {
        let (query, style) = parse_style(task);
        let answer = session
            .send(&format!(
                "Please improve this query: \"{query}\"\nUse a {style} style.\n\
                 Return only the improved query."
            ))
            .await?;

        Ok(AgentOutput::new(json!({
            "original_query": query,
            "improved_query": clean_answer(&answer),
            "style": style,
            "tokens_used": session.tokens_used(),
        }))
        .with_status(format!("Query improved using {style} style")))
    }
}
