//! The conversation loop: the function-calling state machine.
//!
//! ```text
//! AwaitingModel ──answer──▶ Done
//!      ▲   │
//!      │   └─calls──▶ AwaitingToolResults
//!      └──────results────────┘
//! ```
//!
//! Each `AwaitingModel` visit is one turn. After `max_turns` turns without an
//! answer the loop stops with `TurnLimitExceeded`, or, under the
//! `final_answer` policy, asks the model once more with no tools offered.

use agentrelay_config::TurnLimitPolicy;
use agentrelay_core::capability::{CapabilityResult, TrackingContext};
use agentrelay_core::error::LoopError;
use agentrelay_core::event::DomainEvent;
use agentrelay_core::message::{History, Message, MessageToolCall};
use agentrelay_core::provider::{ProviderRequest, ProviderResponse, ToolDefinition, Usage};
use futures::future::join_all;
use tracing::{debug, info, warn};

use crate::dispatcher::CapabilityDispatcher;

/// Where the loop is between two steps.
#[derive(Debug)]
enum LoopState {
    AwaitingModel,
    AwaitingToolResults(Vec<MessageToolCall>),
    Done(String),
}

/// Drives one session's history to a final answer.
pub struct ConversationLoop<'a> {
    dispatcher: &'a CapabilityDispatcher,
    tracking: &'a TrackingContext,
}

impl<'a> ConversationLoop<'a> {
    pub fn new(dispatcher: &'a CapabilityDispatcher, tracking: &'a TrackingContext) -> Self {
        Self {
            dispatcher,
            tracking,
        }
    }

    /// Run until the model answers. Usage of every model call is added to `usage`.
    pub async fn run(&self, history: &mut History, usage: &mut Usage) -> Result<String, LoopError> {
        let settings = &self.dispatcher.runtime().settings;
        let definitions = self.dispatcher.definitions();
        let mut turns = 0u32;
        let mut state = LoopState::AwaitingModel;

        loop {
            state = match state {
                LoopState::AwaitingModel => {
                    if turns >= settings.max_turns {
                        return self.turn_limit_reached(history, usage, turns).await;
                    }
                    turns += 1;
                    debug!(turn = turns, depth = self.tracking.depth, "Awaiting model");

                    let response = self.complete(history, definitions.clone(), usage).await?;
                    let message = response.message;
                    if message.has_tool_calls() {
                        let calls = message.tool_calls.clone();
                        history.push(message);
                        LoopState::AwaitingToolResults(calls)
                    } else {
                        let answer = message.content.clone();
                        history.push(message);
                        LoopState::Done(answer)
                    }
                }
                LoopState::AwaitingToolResults(calls) => {
                    debug!(turn = turns, calls = calls.len(), "Executing capability calls");
                    let results = self.execute_calls(&calls).await;
                    for (call, result) in calls.iter().zip(results) {
                        history.push(Message::tool_result(&call.id, result.to_model_content()));
                    }
                    LoopState::AwaitingModel
                }
                LoopState::Done(answer) => {
                    info!(turns, depth = self.tracking.depth, "Conversation finished");
                    return Ok(answer);
                }
            };
        }
    }

    async fn complete(
        &self,
        history: &History,
        tools: Vec<ToolDefinition>,
        usage: &mut Usage,
    ) -> Result<ProviderResponse, LoopError> {
        let runtime = self.dispatcher.runtime();
        let settings = &runtime.settings;
        let request = ProviderRequest {
            model: settings.model.clone(),
            messages: history.messages().to_vec(),
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
            tools,
        };

        let response = runtime.provider.complete(request).await?;

        let turn_usage = response.usage.unwrap_or_default();
        usage.prompt_tokens += turn_usage.prompt_tokens;
        usage.completion_tokens += turn_usage.completion_tokens;
        usage.total_tokens += turn_usage.total_tokens;
        runtime.events.publish(DomainEvent::ResponseGenerated {
            model: response.model.clone(),
            tokens_used: turn_usage.total_tokens,
            tool_calls: response.message.tool_calls.len(),
            timestamp: chrono::Utc::now(),
        });
        Ok(response)
    }

    /// Results come back in request order, however the calls were scheduled.
    async fn execute_calls(&self, calls: &[MessageToolCall]) -> Vec<CapabilityResult> {
        if self.dispatcher.runtime().settings.parallel_tool_calls && calls.len() > 1 {
            join_all(
                calls
                    .iter()
                    .map(|call| self.dispatcher.execute_tool_call(call, self.tracking)),
            )
            .await
        } else {
            let mut results = Vec::with_capacity(calls.len());
            for call in calls {
                results.push(self.dispatcher.execute_tool_call(call, self.tracking).await);
            }
            results
        }
    }

    async fn turn_limit_reached(
        &self,
        history: &mut History,
        usage: &mut Usage,
        turns: u32,
    ) -> Result<String, LoopError> {
        warn!(turns, depth = self.tracking.depth, "Turn limit reached without an answer");
        match self.dispatcher.runtime().settings.on_turn_limit {
            TurnLimitPolicy::Fail => Err(LoopError::TurnLimitExceeded { turns }),
            TurnLimitPolicy::FinalAnswer => {
                history.push(Message::user(
                    "You have used all available tool calls. Answer now with what you know.",
                ));
                let response = self.complete(history, Vec::new(), usage).await?;
                let answer = response.message.content.clone();
                // Calls requested anyway are dropped; the answer is the text.
                history.push(Message::assistant(answer.clone()));
                Ok(answer)
            }
        }
    }
}
