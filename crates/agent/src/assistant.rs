//! The assistant: composition root of one user-facing conversation.
//!
//! Each `ask` gets a fresh [`CallTracker`], so the report always describes
//! the latest request. A request that fails or times out is rolled back out
//! of the history; its call tree stays available through [`Assistant::report`].

use std::sync::Arc;

use agentrelay_config::AppConfig;
use agentrelay_core::capability::TrackingContext;
use agentrelay_core::error::{Error, LoopError};
use agentrelay_core::event::{DomainEvent, EventBus};
use agentrelay_core::report::CallReport;
use agentrelay_core::tracker::CallTracker;
use serde::Serialize;
use tracing::{info, warn};

use crate::agents::builtin_agents;
use crate::dispatcher::CapabilityDispatcher;
use crate::prompt;
use crate::runtime::{Runtime, Settings};
use crate::session::AgentSession;

const USAGE_BAR_CELLS: usize = 20;

/// Cumulative counters over the assistant's lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AssistantStats {
    pub questions_answered: u64,
    pub capabilities_executed: u64,
    pub tokens_used: u64,
}

pub struct Assistant {
    runtime: Arc<Runtime>,
    session: AgentSession,
    tracker: Arc<CallTracker>,
    stats: AssistantStats,
}

impl Assistant {
    pub fn new(runtime: Arc<Runtime>) -> Self {
        let tracker = Arc::new(CallTracker::new());
        let system_prompt = prompt::render_system_prompt(&runtime.agents, prompt::today());
        let dispatcher = CapabilityDispatcher::new(Arc::clone(&runtime), Arc::clone(&tracker));
        Self {
            session: AgentSession::new(system_prompt, dispatcher, TrackingContext::root()),
            runtime,
            tracker,
            stats: AssistantStats::default(),
        }
    }

    /// Wire provider, built-in tools and built-in agents from configuration.
    pub fn from_config(config: &AppConfig) -> Result<Self, Error> {
        let provider = agentrelay_providers::build_from_config(config).primary()?;
        let tools = agentrelay_tools::default_registry(config)?;
        let agents = builtin_agents()?;
        let runtime = Runtime::new(provider, tools, agents, Settings::from_config(config));
        info!(
            provider = runtime.provider.name(),
            model = %runtime.settings.model,
            tools = runtime.tools.len(),
            agents = runtime.agents.len(),
            "Assistant ready"
        );
        Ok(Self::new(Arc::new(runtime)))
    }

    pub fn runtime(&self) -> &Arc<Runtime> {
        &self.runtime
    }

    pub fn events(&self) -> Arc<EventBus> {
        Arc::clone(&self.runtime.events)
    }

    pub fn session(&self) -> &AgentSession {
        &self.session
    }

    pub fn stats(&self) -> AssistantStats {
        self.stats
    }

    /// Answer `question`, using tools and agents as the model sees fit.
    pub async fn ask(&mut self, question: &str) -> Result<String, LoopError> {
        self.tracker = Arc::new(CallTracker::new());
        self.session.replace_dispatcher(CapabilityDispatcher::new(
            Arc::clone(&self.runtime),
            Arc::clone(&self.tracker),
        ));

        let history_len = self.session.history().len();
        let tokens_before = self.session.tokens_used();
        let timeout = self.runtime.settings.request_timeout;
        info!(chars = question.len(), "Answering question");

        let outcome = match tokio::time::timeout(timeout, self.session.send(question)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(LoopError::Cancelled {
                reason: format!("request timed out after {}s", timeout.as_secs()),
            }),
        };

        if let Err(err) = &outcome {
            let reason = err.to_string();
            self.tracker.cancel_outstanding(&reason);
            self.session.rollback(history_len);
            warn!(category = err.category().as_str(), error = %err, "Question failed");
            self.runtime.events.publish(DomainEvent::ErrorOccurred {
                context: "ask".into(),
                error_message: reason,
                timestamp: chrono::Utc::now(),
            });
        } else {
            self.stats.questions_answered += 1;
        }
        self.stats.capabilities_executed += self.tracker.len() as u64;
        self.stats.tokens_used += u64::from(self.session.tokens_used().saturating_sub(tokens_before));
        outcome
    }

    /// Call tree of the latest request.
    pub fn report(&self) -> CallReport {
        self.tracker.report()
    }

    pub fn render_report(&self, colored: bool) -> String {
        self.report().render(colored)
    }

    /// Start over: history back to the system prompt, empty report.
    pub fn clear(&mut self) {
        self.session.clear();
        self.tracker = Arc::new(CallTracker::new());
        self.session.replace_dispatcher(CapabilityDispatcher::new(
            Arc::clone(&self.runtime),
            Arc::clone(&self.tracker),
        ));
        info!("Conversation cleared");
    }

    /// Estimated context fill as a bar, e.g. `[████░░…] 512/128000 tokens (0.4%)`.
    pub fn context_usage(&self) -> String {
        let used = self.session.history().estimated_tokens();
        let size = self.runtime.settings.context_size.max(1);
        let filled = (used * USAGE_BAR_CELLS / size).min(USAGE_BAR_CELLS);
        let percent = used as f64 * 100.0 / size as f64;
        format!(
            "[{}{}] {used}/{size} tokens ({percent:.1}%)",
            "█".repeat(filled),
            "░".repeat(USAGE_BAR_CELLS - filled)
        )
    }

    /// Model, context usage, statistics and the latest tool report.
    pub fn system_report(&self, colored: bool) -> String {
        let settings = &self.runtime.settings;
        format!(
            "Model: {}\nProvider: {}\nContext: {}\nQuestions answered: {}\n\
             Capabilities executed: {}\nTokens used: {}\n\n{}",
            settings.model,
            self.runtime.provider.name(),
            self.context_usage(),
            self.stats.questions_answered,
            self.stats.capabilities_executed,
            self.stats.tokens_used,
            self.render_report(colored)
        )
    }
}
