//! Built-in text-transformation tools.

use crate::error::ToolResult;
use crate::protocol::types::LogMessageParams;
use crate::session;
use crate::tools::registry::{ParamSpec, ParamType, ToolHandler, ToolSpec};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};

/// Apply ROT13 to ASCII letters, leaving everything else unchanged.
///
/// ROT13 is its own inverse, so the same transform both obfuscates and
/// decodes.
pub fn rot13(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            'A'..='M' | 'a'..='m' => (c as u8 + 13) as char,
            'N'..='Z' | 'n'..='z' => (c as u8 - 13) as char,
            _ => c,
        })
        .collect()
}

#[derive(Debug, Deserialize)]
struct TextArgs {
    text: String,
}

/// Emit an info-level log notification for a tool call through the current
/// session, if one is bound. Outside a session this is a silent no-op.
fn log_tool_call(tool: &str, text: &str) {
    let Some(current) = session::current() else {
        return;
    };
    current.send_log_notification(LogMessageParams::info(json!({
        "function": tool,
        "message": format!("{} called", tool),
        "arguments": { "text": text },
    })));
}

/// Obfuscates a string using ROT13 encoding.
pub struct ObfuscateTool;

#[async_trait]
impl ToolHandler for ObfuscateTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec::new("obfuscate", "Obfuscates a string using ROT13 encoding").param(
            ParamSpec::required("text", ParamType::String).describe("The string to obfuscate"),
        )
    }

    async fn execute(&self, arguments: Value) -> ToolResult<Value> {
        let args: TextArgs = serde_json::from_value(arguments)
            .map_err(|e| crate::error::ToolError::InvalidArguments(vec![e.to_string()]))?;
        log_tool_call("obfuscate", &args.text);
        Ok(json!(rot13(&args.text)))
    }
}

/// Decodes a ROT13 obfuscated string back to its original form.
pub struct DecodeTool;

#[async_trait]
impl ToolHandler for DecodeTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec::new("decode", "Decodes a ROT13 obfuscated string").param(
            ParamSpec::required("text", ParamType::String)
                .describe("The obfuscated string to decode"),
        )
    }

    async fn execute(&self, arguments: Value) -> ToolResult<Value> {
        let args: TextArgs = serde_json::from_value(arguments)
            .map_err(|e| crate::error::ToolError::InvalidArguments(vec![e.to_string()]))?;
        log_tool_call("decode", &args.text);
        Ok(json!(rot13(&args.text)))
    }
}
