//! Policy Evaluator: maps a `ToolCall` to a `GateAction` by consulting
//! category defaults and, for `Gate` categories, the allowlist. Layered
//! deny-first, then allow-if-trusted, then allowlist-or-ask.

use std::collections::HashMap;

use gate_protocol::GateAction;
use gate_protocol::GateCategory;
use gate_protocol::ToolCall;

use crate::allowlist::Allowlist;
use crate::shell::ParsedCommand;

pub type CategoryTable = HashMap<GateCategory, GateAction>;

/// The substring of a tool call's arguments an allowlist entry is tested
/// against. `Shell` is handled
/// separately by `check_shell` on the parsed command, not through this enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchTarget {
    Path,
    Url,
    FullArguments,
    /// Dynamic/Python-defined tools carry no match-target by design; a
    /// `Gate` category for them can never resolve to `Allow` via the
    /// allowlist.
    None,
}

/// Fixed table of tool name -> category. Unrecognized tool names default
/// to `Python`, per the Open Question resolution recorded in DESIGN.md:
/// the table is keyed by tool, not by source language, and an
/// operation-specific category always wins when the tool name matches one.
pub fn category_for_tool(tool_name: &str) -> GateCategory {
    match tool_name {
        "read_file" => GateCategory::FileRead,
        "write_file" | "append_file" | "delete_file" => GateCategory::FileWrite,
        "shell_execute" => GateCategory::Shell,
        "web_fetch" | "http_request" => GateCategory::Network,
        "remember" | "recall" | "forget" => GateCategory::Memory,
        "spawn_subagent" => GateCategory::Subagent,
        "mcp_call" => GateCategory::Mcp,
        _ => GateCategory::Python,
    }
}

/// Fixed table of tool name -> match-target.
pub fn match_target_for_tool(tool_name: &str) -> MatchTarget {
    match tool_name {
        "read_file" | "write_file" | "append_file" | "delete_file" => MatchTarget::Path,
        "web_fetch" | "http_request" => MatchTarget::Url,
        "remember" | "recall" | "forget" => MatchTarget::FullArguments,
        _ => MatchTarget::None,
    }
}

/// `GateCategory::Gate` is the implicit default for any category missing
/// from the table — an unconfigured category is never silently allowed.
fn action_for_category(categories: &CategoryTable, category: GateCategory) -> GateAction {
    categories.get(&category).copied().unwrap_or(GateAction::Gate)
}

/// Evaluates a tool call against category defaults and the allowlist.
/// `parsed_shell` must be `Some` iff `tool.name`'s category is `Shell`.
pub fn evaluate(
    tool: &ToolCall,
    parsed_shell: Option<&ParsedCommand>,
    categories: &CategoryTable,
    allowlist: &Allowlist,
) -> GateAction {
    let category = category_for_tool(&tool.name);
    match action_for_category(categories, category) {
        GateAction::Deny => GateAction::Deny,
        GateAction::Allow => GateAction::Allow,
        GateAction::Gate => {
            if category == GateCategory::Shell {
                return match parsed_shell {
                    Some(parsed) if parsed.is_allowlistable() && allowlist.check_shell(parsed) => {
                        GateAction::Allow
                    }
                    _ => GateAction::Gate,
                };
            }
            match match_target_for_tool(&tool.name) {
                MatchTarget::Path => match tool.arg_str("path") {
                    Some(path) if allowlist.check_regex(&tool.name, path) => GateAction::Allow,
                    _ => GateAction::Gate,
                },
                MatchTarget::Url => match tool.arg_str("url") {
                    Some(url) if allowlist.check_regex(&tool.name, url) => GateAction::Allow,
                    _ => GateAction::Gate,
                },
                MatchTarget::FullArguments => {
                    let full = tool.arguments.to_string();
                    if allowlist.check_regex(&tool.name, &full) {
                        GateAction::Allow
                    } else {
                        GateAction::Gate
                    }
                }
                MatchTarget::None => GateAction::Gate,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use gate_protocol::ShellKind;
    use serde_json::json;

    fn categories(pairs: &[(GateCategory, GateAction)]) -> CategoryTable {
        pairs.iter().copied().collect()
    }

    #[test]
    fn deny_category_wins_immediately() {
        let cats = categories(&[(GateCategory::Network, GateAction::Deny)]);
        let tool = ToolCall::new("1", "web_fetch", json!({"url": "https://example.com"}));
        let allowlist = Allowlist::new();
        assert_eq!(evaluate(&tool, None, &cats, &allowlist), GateAction::Deny);
    }

    #[test]
    fn allow_category_skips_allowlist() {
        let cats = categories(&[(GateCategory::FileRead, GateAction::Allow)]);
        let tool = ToolCall::new("1", "read_file", json!({"path": "anything"}));
        let allowlist = Allowlist::new();
        assert_eq!(evaluate(&tool, None, &cats, &allowlist), GateAction::Allow);
    }

    #[test]
    fn gate_category_resolves_to_allow_when_path_matches_allowlist() {
        let cats = categories(&[(GateCategory::FileRead, GateAction::Gate)]);
        let mut allowlist = Allowlist::new();
        allowlist.add_regex(crate::allowlist::AllowlistEntry::new("read_file", r"^\./src/.*$").unwrap());
        let tool = ToolCall::new("1", "read_file", json!({"path": "./src/main.rs"}));
        assert_eq!(evaluate(&tool, None, &cats, &allowlist), GateAction::Allow);
    }

    #[test]
    fn gate_category_stays_gate_without_a_match() {
        let cats = categories(&[(GateCategory::FileRead, GateAction::Gate)]);
        let allowlist = Allowlist::new();
        let tool = ToolCall::new("1", "read_file", json!({"path": "./docs/readme.md"}));
        assert_eq!(evaluate(&tool, None, &cats, &allowlist), GateAction::Gate);
    }

    #[test]
    fn hazardous_shell_command_never_resolves_via_allowlist() {
        let cats = categories(&[(GateCategory::Shell, GateAction::Gate)]);
        let mut allowlist = Allowlist::new();
        allowlist.add_shell(
            crate::allowlist::ShellAllowlistEntry::new(vec!["git".into(), "status".into()], None).unwrap(),
        );
        let tool = ToolCall::new("1", "shell_execute", json!({"command": "git status; rm -rf /"}));
        let parsed = ParsedCommand {
            tokens: vec!["git".into(), "status".into()],
            has_chain: true,
            has_pipe: false,
            has_subshell: false,
            has_redirect: false,
            is_dangerous: true,
            shell: ShellKind::Posix,
        };
        assert_eq!(evaluate(&tool, Some(&parsed), &cats, &allowlist), GateAction::Gate);
    }

    #[test]
    fn unrecognized_tool_defaults_to_python_category() {
        assert_eq!(category_for_tool("some_generated_tool"), GateCategory::Python);
        assert_eq!(match_target_for_tool("some_generated_tool"), MatchTarget::None);
    }
}
