//! Capability dispatcher: resolve, validate, depth-check, invoke, record.
//!
//! `execute` never fails. Whatever goes wrong below it (an unknown name, bad
//! arguments, the depth limit, an implementation error or panic) comes back
//! as an error [`CapabilityResult`] the conversation loop can hand to the
//! model as a tool result. Every call leaves exactly one record in the call
//! tracker, whatever its outcome.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use agentrelay_core::capability::{
    Capability, CallId, CapabilityOutput, CapabilityResult, CapabilitySpec, DELEGATE_CAPABILITY,
    TrackingContext,
};
use agentrelay_core::error::{CapabilityError, ErrorCategory};
use agentrelay_core::event::DomainEvent;
use agentrelay_core::message::MessageToolCall;
use agentrelay_core::provider::ToolDefinition;
use agentrelay_core::tracker::CallTracker;
use futures::FutureExt;
use futures::future::BoxFuture;
use serde_json::Value;
use tracing::{debug, warn};

use crate::delegate;
use crate::runtime::Runtime;

enum Target {
    Delegate,
    Tool(Arc<dyn Capability>),
}

/// Executes capabilities by name on behalf of one session.
pub struct CapabilityDispatcher {
    runtime: Arc<Runtime>,
    tracker: Arc<CallTracker>,
}

impl CapabilityDispatcher {
    pub fn new(runtime: Arc<Runtime>, tracker: Arc<CallTracker>) -> Self {
        Self { runtime, tracker }
    }

    pub fn runtime(&self) -> &Arc<Runtime> {
        &self.runtime
    }

    pub fn tracker(&self) -> &Arc<CallTracker> {
        &self.tracker
    }

    /// A new dispatcher for a child session, writing to the same ledger.
    pub fn fork(&self) -> Self {
        Self::new(Arc::clone(&self.runtime), Arc::clone(&self.tracker))
    }

    /// The model-facing capability surface: tools in registration order,
    /// then `delegate` when any agent is registered.
    pub fn list_specs(&self) -> Vec<CapabilitySpec> {
        let mut specs = self.runtime.tools.list_specs();
        if !self.runtime.agents.is_empty() {
            specs.push(delegate::spec(&self.runtime.agents.names()));
        }
        specs
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.list_specs().iter().map(CapabilitySpec::to_definition).collect()
    }

    /// Execute `name` with `arguments` under `tracking`.
    pub async fn execute(
        &self,
        name: &str,
        arguments: Value,
        tracking: &TrackingContext,
    ) -> CapabilityResult {
        self.dispatch(name, arguments.clone(), Ok(arguments), tracking).await
    }

    /// Execute a call requested by the model; its arguments are raw JSON text.
    pub async fn execute_tool_call(
        &self,
        call: &MessageToolCall,
        tracking: &TrackingContext,
    ) -> CapabilityResult {
        let raw = call.arguments.trim();
        let parsed = if raw.is_empty() {
            Ok(Value::Null)
        } else {
            serde_json::from_str::<Value>(raw).map_err(|e| {
                CapabilityError::invalid_arguments(format!(
                    "{}: arguments are not valid JSON: {e}",
                    call.name
                ))
            })
        };
        let recorded = match &parsed {
            Ok(value) => value.clone(),
            Err(_) => Value::String(call.arguments.clone()),
        };
        self.dispatch(&call.name, recorded, parsed, tracking).await
    }

    async fn dispatch(
        &self,
        name: &str,
        recorded: Value,
        arguments: Result<Value, CapabilityError>,
        tracking: &TrackingContext,
    ) -> CapabilityResult {
        let call_id = self.tracker.open(tracking.call_id.as_ref(), name, recorded);
        let depth = tracking.child_depth();
        self.runtime.events.publish(DomainEvent::CapabilityStarted {
            call_id: call_id.clone(),
            capability: name.to_string(),
            depth,
            timestamp: chrono::Utc::now(),
        });

        let started = Instant::now();
        let outcome = match arguments {
            Ok(arguments) => self.invoke(name, &arguments, tracking, &call_id, depth).await,
            Err(err) => Err(err),
        };
        let result = match outcome {
            Ok(output) => {
                let message = output
                    .status_message
                    .unwrap_or_else(|| format!("{name}: completed successfully"));
                CapabilityResult::success(output.payload, message)
            }
            Err(err) => {
                warn!(
                    call_id = %call_id,
                    capability = name,
                    depth,
                    category = err.category.as_str(),
                    error = %err.message,
                    "Capability failed"
                );
                CapabilityResult::failure(err)
            }
        };

        self.tracker.close(&call_id, result.clone());
        self.runtime.events.publish(DomainEvent::CapabilityFinished {
            call_id,
            capability: name.to_string(),
            success: result.is_success(),
            category: result.category(),
            status_message: result.status_message.clone(),
            duration_ms: started.elapsed().as_millis() as u64,
            timestamp: chrono::Utc::now(),
        });
        result
    }

    async fn invoke(
        &self,
        name: &str,
        arguments: &Value,
        tracking: &TrackingContext,
        call_id: &CallId,
        depth: u32,
    ) -> Result<CapabilityOutput, CapabilityError> {
        let (spec, target) = self.resolve(name)?;
        let args = spec.validate(arguments)?;

        let max_depth = self.runtime.settings.max_depth;
        if depth >= max_depth {
            return Err(CapabilityError::new(
                ErrorCategory::DepthLimitExceeded,
                format!("{name}: call at depth {depth} rejected, maximum delegation depth is {max_depth}"),
            ));
        }

        let inner = tracking.enter(call_id.clone());
        debug!(call_id = %call_id, capability = name, depth, "Invoking capability");

        let invocation: BoxFuture<'_, Result<CapabilityOutput, CapabilityError>> = match target {
            Target::Delegate => delegate::run(self, args, inner).boxed(),
            Target::Tool(implementation) => {
                async move { implementation.invoke(args, &inner).await }.boxed()
            }
        };

        AssertUnwindSafe(invocation)
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| {
                Err(CapabilityError::implementation(format!(
                    "{name}: implementation panicked: {}",
                    panic_message(panic.as_ref())
                )))
            })
    }

    fn resolve(&self, name: &str) -> Result<(CapabilitySpec, Target), CapabilityError> {
        if name == DELEGATE_CAPABILITY {
            // Unknown agent names must reach the delegate and fail as
            // UnknownAgent, so validation ignores the advertised choices.
            return Ok((delegate::spec(&[]), Target::Delegate));
        }
        let (spec, implementation) = self.runtime.tools.lookup(name)?;
        Ok((spec.clone(), Target::Tool(implementation)))
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
