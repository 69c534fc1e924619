//! The reserved `delegate` capability: the bridge from tools to agents.

use agentrelay_core::capability::{
    Arguments, CapabilityOutput, CapabilitySpec, DELEGATE_CAPABILITY, ParamSpec, TrackingContext,
};
use agentrelay_core::error::{CapabilityError, ErrorCategory, LoopError};
use agentrelay_core::event::DomainEvent;
use agentrelay_core::report::truncate;
use serde_json::json;
use tracing::info;

use crate::dispatcher::CapabilityDispatcher;
use crate::prompt;
use crate::session::AgentSession;

/// Declaration of `delegate`; `agent_names` become the `agent_name` enum.
pub fn spec(agent_names: &[&str]) -> CapabilitySpec {
    let mut agent_name = ParamSpec::string("agent_name", "Name of the specialized agent to use");
    if !agent_names.is_empty() {
        agent_name = agent_name.with_choices(agent_names.iter().copied());
    }
    CapabilitySpec::new(
        DELEGATE_CAPABILITY,
        "Delegate a task to a specialized agent. The agent works in its own conversation \
         with its own tool access and returns its result.",
    )
    .param(agent_name)
    .param(ParamSpec::string(
        "task",
        "The task or query for the agent, including any context it needs",
    ))
}

/// Run the named agent on `task` in a fresh session nested under `tracking`.
pub(crate) async fn run(
    dispatcher: &CapabilityDispatcher,
    args: Arguments,
    tracking: TrackingContext,
) -> Result<CapabilityOutput, CapabilityError> {
    let agent_name = args.require_str("agent_name")?;
    let task = args.require_str("task")?;
    let runtime = dispatcher.runtime();

    let spec = runtime.agents.get(agent_name).ok_or_else(|| {
        CapabilityError::new(
            ErrorCategory::UnknownAgent,
            format!(
                "delegate: unknown agent '{agent_name}' (available: {})",
                runtime.agents.names().join(", ")
            ),
        )
    })?;

    if let Some(call_id) = &tracking.call_id {
        runtime.events.publish(DomainEvent::AgentDelegated {
            call_id: call_id.clone(),
            agent: agent_name.to_string(),
            task_preview: truncate(task, 80),
            timestamp: chrono::Utc::now(),
        });
    }
    info!(agent = agent_name, depth = tracking.depth, "Delegating task");

    let system_prompt = prompt::render_agent_prompt(&spec.system_prompt, prompt::today());
    let mut session = AgentSession::new(system_prompt, dispatcher.fork(), tracking);
    let agent = spec.instantiate();

    match agent.run(&mut session, task).await {
        Ok(output) => {
            let status = output
                .status_message
                .unwrap_or_else(|| format!("Agent {agent_name} completed the task"));
            Ok(CapabilityOutput::new(json!({
                "agent": agent_name,
                "task": task,
                "answer": output.payload,
            }))
            .with_status(status))
        }
        Err(LoopError::Cancelled { reason }) => Err(CapabilityError::new(
            ErrorCategory::Cancelled,
            format!("delegate: agent {agent_name} was cancelled: {reason}"),
        )),
        Err(err) => Err(CapabilityError::new(
            ErrorCategory::AgentDidNotConverge,
            format!("delegate: agent {agent_name} did not converge: {err}"),
        )),
    }
}
