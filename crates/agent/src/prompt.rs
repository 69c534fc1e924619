//! System prompts.

use chrono::NaiveDate;

use crate::agents::AgentRegistry;

/// Instructions of the root assistant.
pub const SYSTEM_PROMPT: &str = r#"# Web Assistant

You are a helpful web assistant that can search for information and extract content from websites. The current date is {current_date}.

## Capabilities
- Search the web for current information
- Read and extract content from specific webpages (for example when the user asks you to visit a URL)
- Browse public GitHub repositories
- Present information in a clear, organized manner
- Provide sources for all information

## When using tools
- Use search_web to find information, websites or papers. Build precise queries with operators and categories.
- Use webpage_reader to extract the content of a specific URL.
- Use github_read to list repositories, inspect their structure, read files or search code.
- Use several tools in sequence when a question needs thorough research.

## Specialized agents
You can delegate tasks to these specialized agents with the delegate tool:

{agent_descriptions}

For example, use query_improver to clean up a poorly formulated query and deep_search for in-depth research on a topic.

## When presenting information
- Include references with URLs for all sources, with dates and authors when available
- Organize information logically

## After providing information
- Suggest 2-3 logical next steps
- Offer follow-up questions that could deepen understanding
"#;

/// The current local date.
pub fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

/// Format used for `{current_date}`, e.g. `Monday, January 06, 2025`.
pub fn format_date(date: NaiveDate) -> String {
    date.format("%A, %B %d, %Y").to_string()
}

/// Render the root prompt for the given agents.
pub fn render_system_prompt(agents: &AgentRegistry, date: NaiveDate) -> String {
    let descriptions = if agents.is_empty() {
        "(none available)".to_string()
    } else {
        agents.descriptions()
    };
    SYSTEM_PROMPT
        .replace("{current_date}", &format_date(date))
        .replace("{agent_descriptions}", &descriptions)
}

/// Render an agent's own prompt template.
pub fn render_agent_prompt(template: &str, date: NaiveDate) -> String {
    template.replace("{current_date}", &format_date(date))
}
