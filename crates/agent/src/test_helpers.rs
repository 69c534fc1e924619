//! Shared test doubles: a scripted provider and a few toy capabilities.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use agentrelay_core::capability::{
    Arguments, Capability, CapabilityOutput, CapabilitySpec, ParamSpec, TrackingContext,
};
use agentrelay_core::error::{CapabilityError, ProviderError};
use agentrelay_core::message::{Message, MessageToolCall};
use agentrelay_core::provider::{Provider, ProviderRequest, ProviderResponse, Usage};
use agentrelay_core::registry::CapabilityRegistry;
use async_trait::async_trait;
use serde_json::{Value, json};

use crate::agents::AgentRegistry;
use crate::runtime::{Runtime, Settings};

/// What the scripted provider does once its queue is empty.
enum WhenExhausted {
    Panic,
    Repeat(ProviderResponse),
    Fail,
    Hang,
}

/// A provider that replays queued responses and records every request.
pub struct ScriptedProvider {
    responses: Mutex<VecDeque<ProviderResponse>>,
    exhausted: WhenExhausted,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    fn build(responses: Vec<ProviderResponse>, exhausted: WhenExhausted) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into()),
            exhausted,
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn new(responses: Vec<ProviderResponse>) -> Arc<Self> {
        Self::build(responses, WhenExhausted::Panic)
    }

    /// Always answers with the same response.
    pub fn repeating(response: ProviderResponse) -> Arc<Self> {
        Self::build(Vec::new(), WhenExhausted::Repeat(response))
    }

    /// Every call fails with a network error.
    pub fn failing() -> Arc<Self> {
        Self::build(Vec::new(), WhenExhausted::Fail)
    }

    /// Replays `responses`, then never answers again.
    pub fn hanging_after(responses: Vec<ProviderResponse>) -> Arc<Self> {
        Self::build(responses, WhenExhausted::Hang)
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let call = {
            let mut requests = self.requests.lock().unwrap();
            requests.push(request);
            requests.len()
        };
        let next = self.responses.lock().unwrap().pop_front();
        match (next, &self.exhausted) {
            (Some(response), _) => Ok(response),
            (None, WhenExhausted::Repeat(response)) => Ok(response.clone()),
            (None, WhenExhausted::Fail) => Err(ProviderError::Network("connection refused".into())),
            (None, WhenExhausted::Hang) => std::future::pending().await,
            (None, WhenExhausted::Panic) => panic!("ScriptedProvider: no response for call #{call}"),
        }
    }
}

/// A text-only response.
pub fn text_response(text: &str) -> ProviderResponse {
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

/// A response requesting capability calls.
pub fn tool_call_response(calls: Vec<MessageToolCall>) -> ProviderResponse {
    ProviderResponse {
        message: Message::assistant_with_calls("", calls),
        usage: Some(Usage {
            prompt_tokens: 20,
            completion_tokens: 10,
            total_tokens: 30,
        }),
        model: "mock-model".into(),
    }
}

pub fn tool_call(id: &str, name: &str, arguments: Value) -> MessageToolCall {
    MessageToolCall {
        id: id.into(),
        name: name.into(),
        arguments: arguments.to_string(),
    }
}

pub fn runtime_with(
    provider: Arc<ScriptedProvider>,
    tools: CapabilityRegistry,
    agents: AgentRegistry,
    settings: Settings,
) -> Arc<Runtime> {
    Arc::new(Runtime::new(provider, tools, agents, settings))
}

/// Echoes its arguments back and counts invocations.
pub struct EchoTool {
    spec: CapabilitySpec,
    pub calls: AtomicUsize,
}

impl EchoTool {
    pub fn new(spec: CapabilitySpec) -> Self {
        Self {
            spec,
            calls: AtomicUsize::new(0),
        }
    }

    /// `get_weather(location)`.
    pub fn weather() -> Self {
        Self::new(
            CapabilitySpec::new("get_weather", "Current weather for a location")
                .param(ParamSpec::string("location", "City name")),
        )
    }
}

#[async_trait]
impl Capability for EchoTool {
    fn spec(&self) -> CapabilitySpec {
        self.spec.clone()
    }

    async fn invoke(
        &self,
        args: Arguments,
        _tracking: &TrackingContext,
    ) -> Result<CapabilityOutput, CapabilityError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(CapabilityOutput::new(args.to_value()))
    }
}

/// Panics whenever it runs.
pub struct PanicTool;

#[async_trait]
impl Capability for PanicTool {
    fn spec(&self) -> CapabilitySpec {
        CapabilitySpec::new("explode", "Always panics")
    }

    async fn invoke(
        &self,
        _args: Arguments,
        _tracking: &TrackingContext,
    ) -> Result<CapabilityOutput, CapabilityError> {
        panic!("boom");
    }
}

/// Sleeps, then appends its name to a shared log.
pub struct SleepTool {
    name: &'static str,
    millis: u64,
    finished: Arc<Mutex<Vec<&'static str>>>,
}

impl SleepTool {
    pub fn new(name: &'static str, millis: u64, finished: Arc<Mutex<Vec<&'static str>>>) -> Self {
        Self {
            name,
            millis,
            finished,
        }
    }
}

#[async_trait]
impl Capability for SleepTool {
    fn spec(&self) -> CapabilitySpec {
        CapabilitySpec::new(self.name, format!("Sleeps {} ms", self.millis))
    }

    async fn invoke(
        &self,
        _args: Arguments,
        _tracking: &TrackingContext,
    ) -> Result<CapabilityOutput, CapabilityError> {
        tokio::time::sleep(Duration::from_millis(self.millis)).await;
        self.finished.lock().unwrap().push(self.name);
        Ok(CapabilityOutput::new(json!({"slept_ms": self.millis})))
    }
}

/// Returns the same payload on every call, whatever the arguments.
pub struct FixedTool {
    spec: CapabilitySpec,
    payload: Value,
}

impl FixedTool {
    pub fn new(spec: CapabilitySpec, payload: Value) -> Self {
        Self { spec, payload }
    }

    /// A `search_web(query, count)` stand-in.
    pub fn search(payload: Value) -> Self {
        Self::new(
            CapabilitySpec::new("search_web", "Search the web")
                .param(ParamSpec::string("query", "Query"))
                .param(ParamSpec::integer("count", "Results").with_default(10)),
            payload,
        )
    }

    /// A `webpage_reader(url)` stand-in.
    pub fn reader(payload: Value) -> Self {
        Self::new(
            CapabilitySpec::new("webpage_reader", "Read a page")
                .param(ParamSpec::string("url", "URL")),
            payload,
        )
    }
}

#[async_trait]
impl Capability for FixedTool {
    fn spec(&self) -> CapabilitySpec {
        self.spec.clone()
    }

    async fn invoke(
        &self,
        _args: Arguments,
        _tracking: &TrackingContext,
    ) -> Result<CapabilityOutput, CapabilityError> {
        Ok(CapabilityOutput::new(self.payload.clone()))
    }
}
