//! `agentrelay tools` and `agentrelay agents`: what the model can call.

use super::load_assistant;

pub fn tools() -> Result<(), Box<dyn std::error::Error>> {
    let (_, assistant) = load_assistant(false)?;
    let definitions = assistant.session().dispatcher().definitions();
    println!("{}", serde_json::to_string_pretty(&definitions)?);
    Ok(())
}

pub fn agents() -> Result<(), Box<dyn std::error::Error>> {
    let (_, assistant) = load_assistant(false)?;
    let agents = &assistant.runtime().agents;
    println!("Specialized agents ({}), reachable through `delegate`:", agents.len());
    println!();
    for agent in agents.list() {
        println!("  {:<16} {}", agent.name, agent.description);
    }
    Ok(())
}
