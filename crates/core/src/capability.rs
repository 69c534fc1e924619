//! Capabilities: the named, schema-described units the model can invoke.
//!
//! A capability is either a tool (search the web, read a page, browse a
//! repository) or the reserved [`DELEGATE_CAPABILITY`] that hands a task to a
//! specialized agent. Every capability declares a [`CapabilitySpec`]; the
//! dispatcher validates model-supplied arguments against it before the
//! implementation ever runs.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{CapabilityError, ErrorCategory};
use crate::provider::ToolDefinition;

/// Name of the single capability that bridges the tool surface to agents.
pub const DELEGATE_CAPABILITY: &str = "delegate";

/// JSON type of a declared parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    String,
    Integer,
    Number,
    Boolean,
    Array,
    Object,
}

impl ParamType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Array => "array",
            Self::Object => "object",
        }
    }

    /// Convert `value` into this type, or `None` if it cannot be coerced.
    ///
    /// Models routinely send `"3"` for an integer or `5` for a string; both
    /// are accepted. Arrays and objects must match exactly.
    pub fn coerce(&self, value: &Value) -> Option<Value> {
        match (self, value) {
            (Self::String, Value::String(_)) => Some(value.clone()),
            (Self::String, Value::Number(n)) => Some(Value::String(n.to_string())),
            (Self::String, Value::Bool(b)) => Some(Value::String(b.to_string())),

            (Self::Integer, Value::Number(n)) => {
                if let Some(i) = n.as_i64() {
                    Some(Value::from(i))
                } else if n.is_u64() {
                    // Above i64::MAX.
                    None
                } else {
                    // i64::MAX as f64 rounds up to 2^63, so the upper bound is exclusive.
                    n.as_f64()
                        .filter(|f| f.fract() == 0.0 && *f >= i64::MIN as f64 && *f < i64::MAX as f64)
                        .map(|f| Value::from(f as i64))
                }
            }
            (Self::Integer, Value::String(s)) => s.trim().parse::<i64>().ok().map(Value::from),

            (Self::Number, Value::Number(_)) => Some(value.clone()),
            (Self::Number, Value::String(s)) => s
                .trim()
                .parse::<f64>()
                .ok()
                .and_then(serde_json::Number::from_f64)
                .map(Value::Number),

            (Self::Boolean, Value::Bool(_)) => Some(value.clone()),
            (Self::Boolean, Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
                "true" => Some(Value::Bool(true)),
                "false" => Some(Value::Bool(false)),
                _ => None,
            },

            (Self::Array, Value::Array(_)) => Some(value.clone()),
            (Self::Object, Value::Object(_)) => Some(value.clone()),
            _ => None,
        }
    }
}

impl std::fmt::Display for ParamType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Declaration of one parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ParamType,
    pub description: String,
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    /// Allowed values; empty means unrestricted.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<Value>,
}

impl ParamSpec {
    /// A required parameter of the given type.
    pub fn new(name: impl Into<String>, kind: ParamType, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            description: description.into(),
            required: true,
            default: None,
            choices: Vec::new(),
        }
    }

    pub fn string(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(name, ParamType::String, description)
    }

    pub fn integer(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(name, ParamType::Integer, description)
    }

    pub fn boolean(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(name, ParamType::Boolean, description)
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    /// Set a default value. A parameter with a default is never required.
    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self.required = false;
        self
    }

    pub fn with_choices<I, V>(mut self, choices: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.choices = choices.into_iter().map(Into::into).collect();
        self
    }

    fn json_schema(&self) -> Value {
        let mut schema = serde_json::json!({
            "type": self.kind.as_str(),
            "description": self.description,
        });
        if let Some(default) = &self.default {
            schema["default"] = default.clone();
        }
        if !self.choices.is_empty() {
            schema["enum"] = Value::Array(self.choices.clone());
        }
        schema
    }
}

/// Name, description and ordered parameter list of a capability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapabilitySpec {
    pub name: String,
    pub description: String,
    pub parameters: Vec<ParamSpec>,
}

impl CapabilitySpec {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: Vec::new(),
        }
    }

    /// Append a parameter declaration.
    pub fn param(mut self, param: ParamSpec) -> Self {
        self.parameters.push(param);
        self
    }

    pub fn parameter(&self, name: &str) -> Option<&ParamSpec> {
        self.parameters.iter().find(|p| p.name == name)
    }

    /// The function-calling parameter schema.
    pub fn json_schema(&self) -> Value {
        let mut properties = Map::new();
        let mut required = Vec::new();
        for p in &self.parameters {
            properties.insert(p.name.clone(), p.json_schema());
            if p.required {
                required.push(Value::String(p.name.clone()));
            }
        }
        serde_json::json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }

    /// Convert into a definition for the model's function list.
    pub fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name.clone(),
            description: self.description.clone(),
            parameters: self.json_schema(),
        }
    }

    /// Check `raw` against the declared parameters.
    ///
    /// Rejects non-object documents, unknown parameters, missing required
    /// parameters and values that cannot be coerced to the declared type.
    /// Returns the coerced arguments with declared defaults filled in.
    pub fn validate(&self, raw: &Value) -> Result<Arguments, CapabilityError> {
        let empty = Map::new();
        let supplied = match raw {
            Value::Object(map) => map,
            Value::Null => &empty,
            other => {
                return Err(CapabilityError::invalid_arguments(format!(
                    "{}: arguments must be a JSON object, got {}",
                    self.name,
                    json_kind(other)
                )));
            }
        };

        let unknown: Vec<&str> = supplied
            .keys()
            .filter(|k| self.parameter(k).is_none())
            .map(String::as_str)
            .collect();
        if !unknown.is_empty() {
            return Err(CapabilityError::invalid_arguments(format!(
                "{}: unknown parameter(s): {}",
                self.name,
                unknown.join(", ")
            )));
        }

        let mut validated = Map::new();
        let mut missing = Vec::new();
        let mut mistyped = Vec::new();

        for param in &self.parameters {
            match supplied.get(&param.name) {
                None | Some(Value::Null) => {
                    if let Some(default) = &param.default {
                        validated.insert(param.name.clone(), default.clone());
                    } else if param.required {
                        missing.push(param.name.as_str());
                    }
                }
                Some(value) => match param.kind.coerce(value) {
                    Some(coerced) => {
                        if !param.choices.is_empty() && !param.choices.contains(&coerced) {
                            let allowed: Vec<String> =
                                param.choices.iter().map(|c| c.to_string()).collect();
                            mistyped.push(format!(
                                "{} (expected one of {})",
                                param.name,
                                allowed.join(", ")
                            ));
                        } else {
                            validated.insert(param.name.clone(), coerced);
                        }
                    }
                    None => mistyped.push(format!(
                        "{} (expected {}, got {})",
                        param.name,
                        param.kind,
                        json_kind(value)
                    )),
                },
            }
        }

        if !missing.is_empty() {
            return Err(CapabilityError::invalid_arguments(format!(
                "{}: missing required parameter(s): {}",
                self.name,
                missing.join(", ")
            )));
        }
        if !mistyped.is_empty() {
            return Err(CapabilityError::invalid_arguments(format!(
                "{}: invalid parameter(s): {}",
                self.name,
                mistyped.join("; ")
            )));
        }

        Ok(Arguments(validated))
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Validated, coerced arguments handed to an implementation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Arguments(Map<String, Value>);

impl Arguments {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn str(&self, name: &str) -> Option<&str> {
        self.0.get(name).and_then(Value::as_str)
    }

    pub fn u64(&self, name: &str) -> Option<u64> {
        self.0.get(name).and_then(Value::as_u64)
    }

    pub fn bool(&self, name: &str) -> Option<bool> {
        self.0.get(name).and_then(Value::as_bool)
    }

    /// Required string argument; the spec guarantees presence after validation.
    pub fn require_str(&self, name: &str) -> Result<&str, CapabilityError> {
        self.str(name).ok_or_else(|| {
            CapabilityError::invalid_arguments(format!("missing required parameter: {name}"))
        })
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.0.clone())
    }
}

impl From<Map<String, Value>> for Arguments {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// Outcome classification of a finished invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CapabilityStatus {
    Success,
    Error,
}

/// The normalized result of exactly one invocation.
///
/// `error` is present iff `status` is `Error`; the constructors are the only
/// way to build one, so the two never disagree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapabilityResult {
    pub payload: Value,
    pub status: CapabilityStatus,
    pub status_message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<CapabilityError>,
}

impl CapabilityResult {
    pub fn success(payload: Value, status_message: impl Into<String>) -> Self {
        Self {
            payload,
            status: CapabilityStatus::Success,
            status_message: status_message.into(),
            error: None,
        }
    }

    pub fn failure(error: CapabilityError) -> Self {
        Self {
            payload: Value::Null,
            status: CapabilityStatus::Error,
            status_message: format!("Error: {}", error.message),
            error: Some(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == CapabilityStatus::Success
    }

    pub fn category(&self) -> Option<ErrorCategory> {
        self.error.as_ref().map(|e| e.category)
    }

    /// Content of the tool-result message fed back to the model.
    pub fn to_model_content(&self) -> String {
        let value = match &self.error {
            None => self.payload.clone(),
            Some(err) => serde_json::json!({
                "error": err.message,
                "category": err.category,
            }),
        };
        match value {
            Value::String(s) => s,
            other => other.to_string(),
        }
    }
}

/// What a well-behaved implementation returns on success.
#[derive(Debug, Clone, PartialEq)]
pub struct CapabilityOutput {
    pub payload: Value,
    /// One-line summary; the dispatcher supplies a generic one if absent.
    pub status_message: Option<String>,
}

impl CapabilityOutput {
    pub fn new(payload: Value) -> Self {
        Self {
            payload,
            status_message: None,
        }
    }

    pub fn with_status(mut self, message: impl Into<String>) -> Self {
        self.status_message = Some(message.into());
        self
    }
}

/// Process-unique identifier of one invocation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CallId(pub String);

impl CallId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CallId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Position of the current code in the call tree.
///
/// The root context (no enclosing call) is what the user-facing loop starts
/// with; calls opened under it have depth 0. Inside an invocation, the
/// context names that call and its depth, so anything it dispatches nests one
/// level deeper.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackingContext {
    pub call_id: Option<CallId>,
    pub parent_call_id: Option<CallId>,
    pub depth: u32,
}

impl TrackingContext {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn is_root(&self) -> bool {
        self.call_id.is_none()
    }

    /// Depth assigned to a call opened under this context.
    pub fn child_depth(&self) -> u32 {
        if self.call_id.is_some() {
            self.depth + 1
        } else {
            0
        }
    }

    /// The context seen by the implementation of `call_id`, opened here.
    pub fn enter(&self, call_id: CallId) -> Self {
        Self {
            depth: self.child_depth(),
            parent_call_id: self.call_id.clone(),
            call_id: Some(call_id),
        }
    }
}

/// The contract every tool implements.
///
/// Implementations receive arguments that already passed validation against
/// `spec()`, plus the tracking context of their own invocation. Failures are
/// returned, not thrown; the dispatcher also survives a panic.
#[async_trait]
pub trait Capability: Send + Sync {
    fn spec(&self) -> CapabilitySpec;

    async fn invoke(
        &self,
        args: Arguments,
        tracking: &TrackingContext,
    ) -> Result<CapabilityOutput, CapabilityError>;
}
