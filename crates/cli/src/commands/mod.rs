//! CLI subcommands.

pub mod ask;
pub mod catalog;
pub mod chat;
pub mod onboard;
pub mod progress;

use agentrelay_agent::Assistant;
use agentrelay_config::AppConfig;

/// Load configuration and build the assistant.
///
/// With `require_key`, a missing API key fails early with setup instructions
/// instead of on the first model call.
pub fn load_assistant(require_key: bool) -> Result<(AppConfig, Assistant), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    if require_key && !config.has_api_key() {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set one of these environment variables:");
        eprintln!("    OPENROUTER_API_KEY=sk-or-v1-...   (recommended)");
        eprintln!("    OPENAI_API_KEY=sk-...             (for OpenAI direct)");
        eprintln!("    AGENTRELAY_API_KEY=sk-...         (generic)");
        eprintln!();
        eprintln!("  Or add it to your config file:");
        eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    }

    let assistant = Assistant::from_config(&config)?;
    Ok((config, assistant))
}
