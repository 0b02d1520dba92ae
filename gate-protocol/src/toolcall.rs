use serde::Deserialize;
use serde::Serialize;
use strum_macros::Display;
use strum_macros::EnumString;

/// A single tool invocation proposed by the model, as handed to the gate by
/// the (external) LLM response parser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Opaque identifier, unique within the batch this call arrived in.
    pub id: String,
    pub name: String,
    /// The call's arguments, as a JSON object. Never an array or scalar.
    pub arguments: serde_json::Value,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: serde_json::Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }

    /// Looks up a string-valued argument by key, used to build a tool's
    /// declared match-target (e.g. `path` for `write_file`, `url` for
    /// `web_fetch`).
    pub fn arg_str(&self, key: &str) -> Option<&str> {
        self.arguments.get(key).and_then(|v| v.as_str())
    }
}

/// Closed set of risk categories a tool call is classified into. Process-wide
/// constants: this enum never grows at runtime, only the policy mapping to
/// `GateAction` per category does.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum GateCategory {
    FileWrite,
    FileRead,
    Shell,
    Network,
    Memory,
    Subagent,
    Mcp,
    Python,
}

/// The result of evaluating policy for a category. Immutable once the
/// `GateConfig` that owns it is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum GateAction {
    Allow,
    Gate,
    Deny,
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    #[test]
    fn tool_call_arg_str_reads_string_fields() {
        let call = ToolCall::new(
            "1",
            "write_file",
            serde_json::json!({"path": "./out.txt", "content": "hi"}),
        );
        assert_eq!(call.arg_str("path"), Some("./out.txt"));
        assert_eq!(call.arg_str("missing"), None);
    }

    #[test]
    fn category_round_trips_through_json() {
        let json = serde_json::to_string(&GateCategory::FileWrite).unwrap();
        assert_eq!(json, "\"file_write\"");
        let back: GateCategory = serde_json::from_str(&json).unwrap();
        assert_eq!(back, GateCategory::FileWrite);
    }
}
