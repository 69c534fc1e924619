//! End-to-end tests for the agentrelay orchestrator.
//!
//! These tests drive the full pipeline: assistant, conversation loop,
//! dispatcher, delegation into agent sessions and the call report, with a
//! scripted model in place of a real provider.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use agentrelay_agent::{AgentRegistry, AgentSpec, Assistant, CapabilityDispatcher, Runtime, Settings};
use agentrelay_config::AppConfig;
use agentrelay_core::capability::{
    Arguments, Capability, CapabilityOutput, CapabilitySpec, ParamSpec, TrackingContext,
};
use agentrelay_core::error::{CapabilityError, ErrorCategory, LoopError, ProviderError};
use agentrelay_core::event::DomainEvent;
use agentrelay_core::message::{Message, MessageToolCall};
use agentrelay_core::provider::{Provider, ProviderRequest, ProviderResponse, Usage};
use agentrelay_core::registry::CapabilityRegistry;
use agentrelay_core::tracker::{CallTracker, RecordStatus};
use serde_json::{Value, json};

// ── Mock Provider ────────────────────────────────────────────────────────

/// Replays responses in order across every session that talks to it.
struct ScriptedProvider {
    responses: std::sync::Mutex<VecDeque<ProviderResponse>>,
    repeat: Option<ProviderResponse>,
    calls: AtomicUsize,
}

impl ScriptedProvider {
    fn new(responses: Vec<ProviderResponse>) -> Arc<Self> {
        Arc::new(Self {
            responses: std::sync::Mutex::new(responses.into()),
            repeat: None,
            calls: AtomicUsize::new(0),
        })
    }

    fn repeating(response: ProviderResponse) -> Arc<Self> {
        Arc::new(Self {
            responses: std::sync::Mutex::new(VecDeque::new()),
            repeat: Some(response),
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "e2e_mock"
    }

    async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self.responses.lock().unwrap().pop_front();
        next.or_else(|| self.repeat.clone())
            .ok_or_else(|| ProviderError::Network(format!("script exhausted at call #{call}")))
    }
}

fn text_response(text: &str) -> ProviderResponse {
    ProviderResponse {
        message: Message::assistant(text),
        usage: Some(Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        }),
        model: "mock-model".into(),
    }
}

fn call_response(id: &str, name: &str, arguments: Value) -> ProviderResponse {
    ProviderResponse {
        message: Message::assistant_with_calls(
            "",
            vec![MessageToolCall {
                id: id.into(),
                name: name.into(),
                arguments: arguments.to_string(),
            }],
        ),
        usage: Some(Usage {
            prompt_tokens: 20,
            completion_tokens: 10,
            total_tokens: 30,
        }),
        model: "mock-model".into(),
    }
}

// ── Test capabilities ────────────────────────────────────────────────────

struct WeatherTool {
    calls: AtomicUsize,
}

impl WeatherTool {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait::async_trait]
impl Capability for WeatherTool {
    fn spec(&self) -> CapabilitySpec {
        CapabilitySpec::new("get_weather", "Current weather for a location")
            .param(ParamSpec::string("location", "City name"))
            .param(ParamSpec::string("unit", "Temperature unit").with_default("celsius"))
    }

    async fn invoke(
        &self,
        args: Arguments,
        _tracking: &TrackingContext,
    ) -> Result<CapabilityOutput, CapabilityError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let location = args.require_str("location")?;
        Ok(CapabilityOutput::new(json!({"location": location, "temperature": 21}))
            .with_status(format!("Weather for {location}")))
    }
}

struct FaultyTool;

#[async_trait::async_trait]
impl Capability for FaultyTool {
    fn spec(&self) -> CapabilitySpec {
        CapabilitySpec::new("faulty", "Crashes")
    }

    async fn invoke(
        &self,
        _args: Arguments,
        _tracking: &TrackingContext,
    ) -> Result<CapabilityOutput, CapabilityError> {
        panic!("index out of bounds");
    }
}

fn assistant_with(
    provider: Arc<ScriptedProvider>,
    tools: CapabilityRegistry,
    agents: AgentRegistry,
    settings: Settings,
) -> Assistant {
    Assistant::new(Arc::new(Runtime::new(provider, tools, agents, settings)))
}

fn two_agents() -> AgentRegistry {
    let mut agents = AgentRegistry::new();
    agents
        .register(AgentSpec::conversational("agentA", "First level", "You are agent A."))
        .unwrap();
    agents
        .register(AgentSpec::conversational("agentB", "Second level", "You are agent B."))
        .unwrap();
    agents
}

// ── Scenarios ────────────────────────────────────────────────────────────

#[tokio::test]
async fn e2e_depth_limit_rejects_third_level_call() {
    let weather = WeatherTool::new();
    let mut tools = CapabilityRegistry::new();
    tools.register(weather.clone()).unwrap();

    // Root delegates to A, A delegates to B, B tries a tool at depth 2.
    let provider = ScriptedProvider::new(vec![
        call_response("r1", "delegate", json!({"agent_name": "agentA", "task": "t"})),
        call_response("a1", "delegate", json!({"agent_name": "agentB", "task": "t2"})),
        call_response("b1", "get_weather", json!({"location": "Oslo"})),
        text_response("B could not check the weather."),
        text_response("A relays B's answer."),
        text_response("Final answer."),
    ]);
    let settings = Settings {
        max_depth: 2,
        ..Settings::default()
    };
    let mut assistant = assistant_with(provider, tools, two_agents(), settings);

    let answer = assistant.ask("Go deep").await.unwrap();
    assert_eq!(answer, "Final answer.");
    assert_eq!(weather.calls.load(Ordering::SeqCst), 0);

    let records: Vec<_> = assistant.report().iter().cloned().collect();
    assert_eq!(records.len(), 3);

    assert_eq!(records[0].capability_name, "delegate");
    assert_eq!(records[0].depth, 0);
    assert_eq!(records[0].status, RecordStatus::Success);

    assert_eq!(records[1].capability_name, "delegate");
    assert_eq!(records[1].depth, 1);
    assert_eq!(records[1].status, RecordStatus::Success);

    assert_eq!(records[2].capability_name, "get_weather");
    assert_eq!(records[2].depth, 2);
    assert_eq!(records[2].error_category(), Some(ErrorCategory::DepthLimitExceeded));

    let rendered = assistant.render_report(false);
    assert!(rendered.contains("Agent: agentA"));
    assert!(rendered.contains("Agent: agentB"));
    assert!(rendered.contains("[D2]"));
    assert!(rendered.contains('✗'));
}

#[tokio::test]
async fn e2e_call_tree_parent_links_are_consistent() {
    let mut tools = CapabilityRegistry::new();
    tools.register(WeatherTool::new()).unwrap();
    let provider = ScriptedProvider::new(vec![
        call_response("r1", "delegate", json!({"agent_name": "agentA", "task": "weather"})),
        call_response("a1", "get_weather", json!({"location": "Oslo"})),
        text_response("Oslo is 21 degrees."),
        call_response("r2", "get_weather", json!({"location": "Rome"})),
        text_response("Both checked."),
    ]);
    let mut assistant = assistant_with(provider, tools, two_agents(), Settings::default());
    assistant.ask("Weather in Oslo and Rome").await.unwrap();

    let report = assistant.report();
    let records: Vec<_> = report.iter().cloned().collect();
    assert_eq!(records.len(), 3);
    for record in &records {
        match &record.parent_call_id {
            None => assert_eq!(record.depth, 0),
            Some(parent) => {
                let parent = records.iter().find(|r| &r.call_id == parent).unwrap();
                assert_eq!(record.depth, parent.depth + 1);
            }
        }
    }
    // Two top-level calls; the delegate owns the nested weather call.
    assert_eq!(report.roots.len(), 2);
    assert_eq!(report.roots[0].children.len(), 1);
    assert_eq!(report.roots[0].children[0].record.capability_name, "get_weather");
}

#[tokio::test]
async fn e2e_missing_required_parameter_is_invalid_arguments() {
    let weather = WeatherTool::new();
    let mut tools = CapabilityRegistry::new();
    tools.register(weather.clone()).unwrap();
    let runtime = Arc::new(Runtime::new(
        ScriptedProvider::new(vec![]),
        tools,
        AgentRegistry::new(),
        Settings::default(),
    ));
    let dispatcher = CapabilityDispatcher::new(runtime, Arc::new(CallTracker::new()));

    let result = dispatcher
        .execute("get_weather", json!({"unit": "kelvin"}), &TrackingContext::root())
        .await;

    assert_eq!(result.category(), Some(ErrorCategory::InvalidArguments));
    assert!(result.status_message.contains("location"));
    assert_eq!(weather.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn e2e_turn_limit_keeps_partial_report() {
    let mut tools = CapabilityRegistry::new();
    tools.register(WeatherTool::new()).unwrap();
    let provider = ScriptedProvider::repeating(call_response(
        "again",
        "get_weather",
        json!({"location": "Bergen"}),
    ));
    let settings = Settings {
        max_turns: 5,
        ..Settings::default()
    };
    let mut assistant = assistant_with(provider.clone(), tools, AgentRegistry::new(), settings);

    let err = assistant.ask("Is it still raining?").await.unwrap_err();
    assert!(matches!(err, LoopError::TurnLimitExceeded { turns: 5 }));
    assert_eq!(err.category(), ErrorCategory::TurnLimitExceeded);
    assert_eq!(provider.calls(), 5);

    let report = assistant.report();
    assert_eq!(report.len(), 5);
    assert!(report.iter().all(|r| r.status == RecordStatus::Success));
    assert_eq!(assistant.stats().questions_answered, 0);
    assert_eq!(assistant.stats().capabilities_executed, 5);
}

#[tokio::test]
async fn e2e_panicking_tool_is_fed_back_to_the_model() {
    let mut tools = CapabilityRegistry::new();
    tools.register(Arc::new(FaultyTool)).unwrap();
    let provider = ScriptedProvider::new(vec![
        call_response("c1", "faulty", json!({})),
        text_response("The tool crashed, sorry."),
    ]);
    let mut assistant = assistant_with(provider, tools, AgentRegistry::new(), Settings::default());

    let answer = assistant.ask("Try the faulty tool").await.unwrap();
    assert_eq!(answer, "The tool crashed, sorry.");

    let record = assistant.report().iter().next().cloned().unwrap();
    assert_eq!(record.error_category(), Some(ErrorCategory::ImplementationError));
    assert!(record.status_message().contains("index out of bounds"));

    let tool_message = &assistant.session().history().messages()[3];
    assert!(tool_message.content.contains("implementation_error"));
}

#[tokio::test]
async fn e2e_unknown_agent_and_capability_do_not_abort() {
    let provider = ScriptedProvider::new(vec![
        call_response("c1", "delegate", json!({"agent_name": "nobody", "task": "x"})),
        call_response("c2", "fly_to_moon", json!({})),
        text_response("Neither worked."),
    ]);
    let mut assistant = assistant_with(
        provider,
        CapabilityRegistry::new(),
        two_agents(),
        Settings::default(),
    );

    assert_eq!(assistant.ask("Try things").await.unwrap(), "Neither worked.");
    let categories: Vec<_> = assistant
        .report()
        .iter()
        .map(|r| r.error_category())
        .collect();
    assert_eq!(
        categories,
        vec![Some(ErrorCategory::UnknownAgent), Some(ErrorCategory::UnknownCapability)]
    );
}

#[tokio::test]
async fn e2e_events_describe_the_request() {
    let mut tools = CapabilityRegistry::new();
    tools.register(WeatherTool::new()).unwrap();
    let provider = ScriptedProvider::new(vec![
        call_response("r1", "delegate", json!({"agent_name": "agentA", "task": "weather in Oslo"})),
        call_response("a1", "get_weather", json!({"location": "Oslo"})),
        text_response("21 degrees."),
        text_response("It is 21 degrees in Oslo."),
    ]);
    let mut assistant = assistant_with(provider, tools, two_agents(), Settings::default());
    let mut rx = assistant.events().subscribe();

    assistant.ask("Weather in Oslo?").await.unwrap();

    let mut delegated = Vec::new();
    let mut finished = Vec::new();
    let mut responses = 0;
    while let Ok(event) = rx.try_recv() {
        match event.as_ref() {
            DomainEvent::AgentDelegated { agent, .. } => delegated.push(agent.clone()),
            DomainEvent::CapabilityFinished { capability, .. } => finished.push(capability.clone()),
            DomainEvent::ResponseGenerated { .. } => responses += 1,
            _ => {}
        }
    }
    assert_eq!(delegated, vec!["agentA"]);
    assert_eq!(finished, vec!["get_weather", "delegate"]);
    assert_eq!(responses, 4);
}

#[test]
fn e2e_builtin_capability_surface_is_deterministic() {
    let config = AppConfig::default();
    let tools = agentrelay_tools::default_registry(&config).unwrap();
    let runtime = Arc::new(Runtime::new(
        ScriptedProvider::new(vec![]),
        tools,
        agentrelay_agent::builtin_agents().unwrap(),
        Settings::from_config(&config),
    ));
    let dispatcher = CapabilityDispatcher::new(runtime, Arc::new(CallTracker::new()));

    let first = dispatcher.list_specs();
    assert_eq!(first, dispatcher.list_specs());
    let names: Vec<&str> = first.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["search_web", "webpage_reader", "github_read", "delegate"]);

    let delegate = dispatcher.definitions().pop().unwrap();
    assert_eq!(
        delegate.parameters["properties"]["agent_name"]["enum"],
        json!(["deep_search", "query_improver"])
    );
    assert_eq!(delegate.parameters["required"], json!(["agent_name", "task"]));
}
