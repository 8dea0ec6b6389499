use serde::Deserialize;
use serde_json::{json, Number, Value};

use crate::agent::AgentError;
use crate::transcript::ToolCall;

pub const LOAD_PAGE: &str = "load_page";
pub const CLICK_ELEMENT: &str = "click_element";

/// A single model-issued browser action, parsed once at the loop boundary.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ActionRequest {
    Navigate { url: String },
    Click { element_id: usize },
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct LoadPageArgs {
    url: String,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct ClickElementArgs {
    element_id: Number,
}

impl ActionRequest {
    pub fn tool_name(&self) -> &'static str {
        match self {
            ActionRequest::Navigate { .. } => LOAD_PAGE,
            ActionRequest::Click { .. } => CLICK_ELEMENT,
        }
    }

    pub fn from_tool_call(call: &ToolCall) -> Result<Self, AgentError> {
        let name = call.function.name.as_str();
        let raw = call.function.arguments.as_str();
        match name {
            LOAD_PAGE => {
                let args: LoadPageArgs = parse_args(name, raw)?;
                Ok(ActionRequest::Navigate { url: args.url })
            }
            CLICK_ELEMENT => {
                let args: ClickElementArgs = parse_args(name, raw)?;
                Ok(ActionRequest::Click { element_id: element_index(&args.element_id)? })
            }
            other => Err(AgentError::MalformedAction(format!("unknown tool '{}'", other))),
        }
    }
}

fn parse_args<T: for<'de> Deserialize<'de>>(name: &str, raw: &str) -> Result<T, AgentError> {
    // Some providers send "" for an empty argument object.
    let raw = if raw.trim().is_empty() { "{}" } else { raw };
    serde_json::from_str(raw)
        .map_err(|e| AgentError::MalformedAction(format!("{} arguments {:?}: {}", name, raw, e)))
}

// The schema says "number", so 5.0 is as good as 5.
fn element_index(n: &Number) -> Result<usize, AgentError> {
    if let Some(i) = n.as_u64() {
        return usize::try_from(i)
            .map_err(|_| AgentError::MalformedAction(format!("element_id {} out of range", n)));
    }
    match n.as_f64() {
        Some(f) if f >= 0.0 && f.fract() == 0.0 && f <= usize::MAX as f64 => Ok(f as usize),
        _ => Err(AgentError::MalformedAction(format!("element_id {} is not a valid handle", n))),
    }
}

/// The two-tool function schema sent with every completion request.
pub fn tool_definitions() -> Value {
    json!([
        {
            "type": "function",
            "function": {
                "name": LOAD_PAGE,
                "description": "Go to a webpage.",
                "parameters": {
                    "type": "object",
                    "properties": { "url": { "type": "string" } },
                    "required": ["url"],
                    "additionalProperties": false
                },
                "strict": true
            }
        },
        {
            "type": "function",
            "function": {
                "name": CLICK_ELEMENT,
                "description": "Click on an element by ID.",
                "parameters": {
                    "type": "object",
                    "properties": { "element_id": { "type": "number" } },
                    "required": ["element_id"],
                    "additionalProperties": false
                },
                "strict": true
            }
        }
    ])
}
