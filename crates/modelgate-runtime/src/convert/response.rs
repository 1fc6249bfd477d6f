use modelgate_config::ChatMode;
use serde_json::{Map, Value};

use crate::error::LlmError;
use crate::types::{AssistantMessage, ToolCall, ToolCallFunction, Usage};

/// Strip a gateway `{errorCode, errorMessage, success, data}` envelope
///
/// Fails when the envelope reports an error. Bodies without an object
/// `data` field are returned as-is.
pub fn unwrap_envelope(body: Value) -> Result<Value, LlmError> {
    let Value::Object(mut object) = body else {
        return Ok(body);
    };

    if let Some(code) = object.get("errorCode").filter(|code| is_error_code(code)) {
        return Err(LlmError::Invoke {
            status: code_number(code),
            message: format!(
                "API request failed with status code {}: {}",
                scalar_text(code),
                object.get("errorMessage").map(scalar_text).unwrap_or_default()
            ),
        });
    }

    if object.get("success").and_then(Value::as_bool) == Some(false) {
        return Err(LlmError::Invoke {
            status: None,
            message: format!(
                "API request failed: error={}, msg={}",
                object.get("errorCode").map(scalar_text).unwrap_or_default(),
                object.get("errorMessage").map(scalar_text).unwrap_or_default()
            ),
        });
    }

    match object.remove("data") {
        Some(data @ Value::Object(_)) => Ok(data),
        Some(other) => {
            object.insert("data".to_owned(), other);
            Ok(Value::Object(object))
        }
        None => Ok(Value::Object(object)),
    }
}

/// An `errorCode` signals failure unless it is empty, false, zero or 200
fn is_error_code(code: &Value) -> bool {
    match code {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(n) => n.as_u64().is_none_or(|n| n != 0 && n != 200),
        Value::String(s) => !s.is_empty() && s != "200",
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn code_number(code: &Value) -> Option<u16> {
    match code {
        Value::Number(n) => n.as_u64().and_then(|n| u16::try_from(n).ok()),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Read a count given as a JSON integer or a numeric string
pub fn parse_count(value: Option<&Value>) -> Option<u32> {
    match value? {
        Value::Number(n) => n.as_u64().map(|n| u32::try_from(n).unwrap_or(u32::MAX)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Provider-reported usage, trusted verbatim
///
/// Returns `None` when the object is absent or empty. Missing counts are
/// read as zero; a missing total is derived from the parts.
pub fn parse_usage(usage: Option<&Value>) -> Option<Usage> {
    let usage = usage?.as_object().filter(|u| !u.is_empty())?;
    let prompt = parse_count(usage.get("prompt_tokens")).unwrap_or(0);
    let completion = parse_count(usage.get("completion_tokens")).unwrap_or(0);
    Some(Usage::new(prompt, completion))
}

/// Tool calls that carry a function name; others are dropped
pub fn extract_tool_calls(calls: Option<&Value>) -> Vec<ToolCall> {
    calls
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(Value::as_object)
        .filter_map(tool_call_from_wire)
        .collect()
}

fn tool_call_from_wire(call: &Map<String, Value>) -> Option<ToolCall> {
    let function = call.get("function")?.as_object()?;
    let name = function.get("name")?.as_str()?.to_owned();
    let arguments = match function.get("arguments") {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    };

    Some(ToolCall {
        id: call.get("id").map(scalar_text).unwrap_or_default(),
        call_type: call
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or("function")
            .to_owned(),
        function: ToolCallFunction { name, arguments },
    })
}

/// Parsed non-streaming generation response
#[derive(Debug, Clone, PartialEq)]
pub struct GenerateResponse {
    /// Model echoed by the provider, if any
    pub model: Option<String>,
    pub message: AssistantMessage,
    /// Provider usage, when reported
    pub usage: Option<Usage>,
}

/// Parse an unwrapped generation body for the given completion mode
pub fn parse_generate_response(body: &Value, mode: ChatMode) -> Result<GenerateResponse, LlmError> {
    let choice = body
        .get("choices")
        .and_then(Value::as_array)
        .and_then(|choices| choices.first())
        .ok_or_else(|| LlmError::Invoke {
            status: None,
            message: format!("response contains no choices: {body}"),
        })?;

    let message = match mode {
        ChatMode::Chat => {
            let message = choice.get("message");
            AssistantMessage {
                content: message
                    .and_then(|m| m.get("content"))
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_owned(),
                tool_calls: extract_tool_calls(message.and_then(|m| m.get("tool_calls"))),
            }
        }
        ChatMode::Completion => AssistantMessage::text(choice.get("text").and_then(Value::as_str).unwrap_or_default()),
    };

    Ok(GenerateResponse {
        model: body.get("model").and_then(Value::as_str).map(str::to_owned),
        message,
        usage: parse_usage(body.get("usage")),
    })
}
