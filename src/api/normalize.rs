//! Classification of raw agent-service payloads into [`NormalizedEvent`]s.
//!
//! All field-name fallbacks live here. The agent service is not consistent
//! about where it puts the discriminant, the text, or the tool call, so each
//! lookup walks a short list of known spellings and takes the first hit.

use crate::error::{ArgumentParseError, NormalizationError};
use crate::runtime::mode::Mode;
use crate::runtime::policy::{default_tool_policy, ToolPolicy};
use crate::types::{NormalizedEvent, ToolRequest, ToolResult, ToolStatus, UsageStats};
use serde_json::{Map, Value};
use std::sync::Arc;

const DISCRIMINANT_KEYS: &[&str] = &["message_type", "type"];
const CONTENT_KEYS: &[&str] = &["content", "text"];
const REASONING_KEYS: &[&str] = &["content", "text", "reasoning"];
const TOOL_ID_KEYS: &[&str] = &["tool_call_id", "id"];
const TOOL_NAME_KEYS: &[&str] = &["tool_name", "name"];
const TOOL_ARGUMENT_KEYS: &[&str] = &["arguments", "args", "input"];
const TOOL_RESULT_KEYS: &[&str] = &["tool_return", "result", "content", "output"];
const INPUT_TOKEN_KEYS: &[&str] = &["input_tokens", "prompt_tokens"];
const OUTPUT_TOKEN_KEYS: &[&str] = &["output_tokens", "completion_tokens"];
const TOTAL_TOKEN_KEYS: &[&str] = &["total_tokens"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RawKind {
    User,
    Reasoning,
    AssistantText,
    ToolRequest,
    ToolResult,
    Usage,
}

impl RawKind {
    fn from_discriminant(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "user_message" | "user" => Some(Self::User),
            "reasoning_message" | "reasoning" | "thinking" => Some(Self::Reasoning),
            "assistant_message" | "assistant" | "text" | "text_delta" => Some(Self::AssistantText),
            "approval_request_message" | "tool_call_message" | "tool_call" | "tool_use" => {
                Some(Self::ToolRequest)
            }
            "tool_return_message" | "tool_return" | "tool_result" => Some(Self::ToolResult),
            "usage_statistics" | "usage" => Some(Self::Usage),
            _ => None,
        }
    }

    fn from_role(object: &Map<String, Value>) -> Option<Self> {
        let role = string_field(object, &["role"])?;
        match role.trim().to_ascii_lowercase().as_str() {
            "user" => Some(Self::User),
            "assistant" if has_tool_call(object) => Some(Self::ToolRequest),
            "assistant" => Some(Self::AssistantText),
            "tool" => Some(Self::ToolResult),
            "reasoning" => Some(Self::Reasoning),
            _ => None,
        }
    }
}

/// Turns raw payloads into normalized events, consulting a [`ToolPolicy`] for
/// every tool request.
#[derive(Debug, Clone)]
pub struct Normalizer {
    policy: Arc<ToolPolicy>,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(default_tool_policy())
    }
}

impl Normalizer {
    pub fn new(policy: Arc<ToolPolicy>) -> Self {
        Self { policy }
    }

    /// Normalizes `raw`, dropping anything that cannot be classified.
    pub fn normalize(&self, raw: &Value, mode: Mode) -> Option<NormalizedEvent> {
        match self.try_normalize(raw, mode) {
            Ok(event) => Some(event),
            Err(error) => {
                tracing::debug!(%error, "dropping raw event");
                None
            }
        }
    }

    pub fn try_normalize(
        &self,
        raw: &Value,
        mode: Mode,
    ) -> Result<NormalizedEvent, NormalizationError> {
        let object = raw.as_object().ok_or(NormalizationError::NotAnObject)?;

        match classify(object)? {
            RawKind::User => Ok(NormalizedEvent::UserText {
                content: required_text(object, CONTENT_KEYS, "user_message")?,
            }),
            RawKind::Reasoning => Ok(NormalizedEvent::Reasoning {
                content: required_text(object, REASONING_KEYS, "reasoning_message")?,
            }),
            RawKind::AssistantText => Ok(NormalizedEvent::AssistantTextDelta {
                content: required_text(object, CONTENT_KEYS, "assistant_message")?,
            }),
            RawKind::ToolRequest => self.tool_request(object, mode),
            RawKind::ToolResult => tool_result(object),
            RawKind::Usage => Ok(NormalizedEvent::UsageStats(UsageStats {
                input_tokens: u64_field(object, INPUT_TOKEN_KEYS),
                output_tokens: u64_field(object, OUTPUT_TOKEN_KEYS),
                total_tokens: u64_field(object, TOTAL_TOKEN_KEYS),
            })),
        }
    }

    fn tool_request(
        &self,
        object: &Map<String, Value>,
        mode: Mode,
    ) -> Result<NormalizedEvent, NormalizationError> {
        let call = tool_call_object(object);
        let function = call.get("function").and_then(Value::as_object);

        let id = string_field(call, TOOL_ID_KEYS)
            .or_else(|| string_field(object, &["tool_call_id"]))
            .ok_or(NormalizationError::MissingField {
                kind: "tool_request",
                field: "tool_call_id",
            })?;
        let name = string_field(call, TOOL_NAME_KEYS)
            .or_else(|| function.and_then(|f| string_field(f, &["name"])))
            .ok_or(NormalizationError::MissingField {
                kind: "tool_request",
                field: "tool_name",
            })?;
        let raw_arguments = first_present(call, TOOL_ARGUMENT_KEYS)
            .or_else(|| function.and_then(|f| f.get("arguments")));
        let arguments = parse_arguments(&name, raw_arguments);

        let decision = self.policy.decide(&name, &arguments, mode);
        if !decision.allowed {
            tracing::info!(tool = %name, id = %id, %mode, "tool request blocked");
        }

        Ok(NormalizedEvent::ToolInvocationRequest(ToolRequest {
            id,
            name,
            arguments,
            allowed: decision.allowed,
            block_reason: decision.block_reason,
        }))
    }
}

/// Normalizes with the process-wide default policy.
pub fn normalize(raw: &Value, mode: Mode) -> Option<NormalizedEvent> {
    Normalizer::default().normalize(raw, mode)
}

fn classify(object: &Map<String, Value>) -> Result<RawKind, NormalizationError> {
    let discriminant = string_field(object, DISCRIMINANT_KEYS);
    if let Some(kind) = discriminant.as_deref().and_then(RawKind::from_discriminant) {
        return Ok(kind);
    }
    if let Some(kind) = RawKind::from_role(object) {
        return Ok(kind);
    }
    match discriminant {
        Some(other) => Err(NormalizationError::UnknownKind(other)),
        None => Err(NormalizationError::MissingDiscriminant),
    }
}

fn tool_result(object: &Map<String, Value>) -> Result<NormalizedEvent, NormalizationError> {
    let id = string_field(object, TOOL_ID_KEYS).ok_or(NormalizationError::MissingField {
        kind: "tool_return",
        field: "tool_call_id",
    })?;
    let name = string_field(object, TOOL_NAME_KEYS).unwrap_or_default();
    let result_text = first_present(object, TOOL_RESULT_KEYS)
        .map(result_text)
        .unwrap_or_default();

    Ok(NormalizedEvent::ToolInvocationResult(ToolResult {
        id,
        name,
        status: tool_status(object),
        result_text,
    }))
}

/// `Success` only for an explicit indicator; anything else is an error.
fn tool_status(object: &Map<String, Value>) -> ToolStatus {
    let explicit_status = object
        .get("status")
        .and_then(Value::as_str)
        .is_some_and(|status| status.trim().eq_ignore_ascii_case("success"));
    let explicit_flag = object.get("success").and_then(Value::as_bool) == Some(true);

    if explicit_status || explicit_flag {
        ToolStatus::Success
    } else {
        ToolStatus::Error
    }
}

fn has_tool_call(object: &Map<String, Value>) -> bool {
    object.get("tool_call").is_some_and(Value::is_object)
        || object
            .get("tool_calls")
            .and_then(Value::as_array)
            .is_some_and(|calls| !calls.is_empty())
}

fn tool_call_object(object: &Map<String, Value>) -> &Map<String, Value> {
    if let Some(call) = object.get("tool_call").and_then(Value::as_object) {
        return call;
    }
    object
        .get("tool_calls")
        .and_then(Value::as_array)
        .and_then(|calls| calls.first())
        .and_then(Value::as_object)
        .unwrap_or(object)
}

fn parse_arguments(tool: &str, raw: Option<&Value>) -> Value {
    match raw {
        None | Some(Value::Null) => empty_arguments(),
        Some(Value::String(encoded)) if encoded.trim().is_empty() => empty_arguments(),
        Some(Value::String(encoded)) => match serde_json::from_str::<Value>(encoded) {
            Ok(Value::Null) => empty_arguments(),
            Ok(parsed) => parsed,
            Err(source) => {
                let error = ArgumentParseError {
                    tool: tool.to_string(),
                    source,
                };
                tracing::debug!(%error, "using empty tool arguments");
                empty_arguments()
            }
        },
        Some(structured) => structured.clone(),
    }
}

fn empty_arguments() -> Value {
    Value::Object(Map::new())
}

fn result_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => String::new(),
        Value::Array(_) => text_of(value).unwrap_or_else(|| value.to_string()),
        other => other.to_string(),
    }
}

fn required_text(
    object: &Map<String, Value>,
    keys: &[&str],
    kind: &'static str,
) -> Result<String, NormalizationError> {
    keys.iter()
        .filter_map(|key| object.get(*key))
        .find_map(text_of)
        .ok_or(NormalizationError::MissingField {
            kind,
            field: "content",
        })
}

/// Extracts text from a string, the first element of an array, or an
/// object's `text`/`content` field.
fn text_of(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Array(items) => items.first().and_then(text_of),
        Value::Object(object) => CONTENT_KEYS
            .iter()
            .filter_map(|key| object.get(*key))
            .find_map(text_of),
        _ => None,
    }
}

fn first_present<'a>(object: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|key| object.get(*key))
        .find(|value| !value.is_null())
}

fn string_field(object: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| object.get(*key))
        .find_map(|value| match value {
            Value::String(text) if !text.trim().is_empty() => Some(text.clone()),
            Value::Number(number) => Some(number.to_string()),
            _ => None,
        })
}

fn u64_field(object: &Map<String, Value>, keys: &[&str]) -> Option<u64> {
    keys.iter()
        .filter_map(|key| object.get(*key))
        .find_map(|value| match value {
            Value::Number(number) => number.as_u64(),
            Value::String(text) => text.trim().parse::<u64>().ok(),
            _ => None,
        })
}
