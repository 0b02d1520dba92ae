//! Gate Orchestrator: the state machine wiring every other component
//! together behind one entry point, `check_and_execute`. Ordered "assess,
//! then act" — each failure transition jumps straight to a structured
//! result, never silently swallowed.

use std::path::Path;

use gate_protocol::ApprovalRequest;
use gate_protocol::ApprovalResponse;
use gate_protocol::GateAction;
use gate_protocol::GateCategory;
use gate_protocol::ReviewDecision;
use gate_protocol::ToolCall;

use crate::approval::pattern;
use crate::approval::ApprovalPrompt;
use crate::config::AllowAlwaysPattern;
use crate::config::GateConfig;
use crate::error::GateErr;
use crate::path_verifier;
use crate::path_verifier::ApprovedPath;
use crate::policy;
use crate::policy::MatchTarget;
use crate::protected_files::ProtectedFileRegistry;
use crate::shell;
use crate::shell::ParsedCommand;

/// What the tool executor is handed to perform the actual side effect.
pub enum ExecutionHandle {
    File(std::fs::File),
    ShellCommand(ParsedCommand),
    None,
}

/// External collaborator boundary: given a verified handle, perform the
/// I/O and report a tool result.
pub trait ToolExecutor {
    fn execute(&mut self, tool: &ToolCall, handle: ExecutionHandle) -> serde_json::Value;
}

/// Result of one `check_and_execute` call: the JSON tool result, plus
/// whether the containing batch must stop (only `InvalidConfig` and
/// `Aborted` propagate past the orchestrator).
pub struct GateOutcome {
    pub result: serde_json::Value,
    pub terminates_batch: bool,
}

pub struct GateOrchestrator {
    config: GateConfig,
    protected_files: ProtectedFileRegistry,
}

impl GateOrchestrator {
    pub fn new(config: GateConfig) -> Self {
        GateOrchestrator {
            config,
            protected_files: ProtectedFileRegistry::default(),
        }
    }

    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut GateConfig {
        &mut self.config
    }

    /// Forces the protected-file identity cache to refresh immediately;
    /// called once before a batch of tool calls begins.
    pub fn begin_batch(&mut self, cwd: &Path) {
        self.protected_files.force_refresh(cwd);
    }

    /// The single entry point: `Start -> ProtectionCheck -> RateCheck ->
    /// PolicyEval -> [Approval] -> PathVerify -> Execute -> Done`.
    pub fn check_and_execute(&mut self, tool: &ToolCall, executor: &mut dyn ToolExecutor) -> GateOutcome {
        match self.run(tool, executor) {
            Ok(result) => GateOutcome {
                result,
                terminates_batch: false,
            },
            Err(err) => {
                tracing::warn!(tool = %tool.name, error = %err, "tool call gated");
                GateOutcome {
                    result: err.to_tool_result(),
                    terminates_batch: err.terminates_session(),
                }
            }
        }
    }

    fn run(&mut self, tool: &ToolCall, executor: &mut dyn ToolExecutor) -> crate::Result<serde_json::Value> {
        let category = policy::category_for_tool(&tool.name);
        let parsed_shell = self.parse_shell_if_needed(tool, category)?;

        // ProtectionCheck
        if category == GateCategory::FileWrite {
            if let Some(path) = tool.arg_str("path") {
                if self.protected_files.is_protected(Path::new(path)) {
                    tracing::warn!(path, "refusing to modify protected file");
                    return Err(GateErr::ProtectedFile { path: path.into() });
                }
            }
        }

        // RateCheck
        if self.config.denial_tracker_ref().is_rate_limited(&tool.name) {
            let retry_after_secs = self.config.denial_tracker_ref().remaining_backoff(&tool.name).unwrap_or(0);
            tracing::warn!(tool = %tool.name, retry_after_secs, "tool call rate limited");
            return Err(GateErr::RateLimited { retry_after_secs });
        }

        // PolicyEval
        let mut action = self.config.evaluate(tool, parsed_shell.as_ref());
        // A dangerous command always requires a decision, even under a
        // category default of `Allow` — the allowlist/category table is
        // never sufficient authorization for it.
        if let Some(parsed) = &parsed_shell {
            if parsed.is_dangerous && action == GateAction::Allow {
                action = GateAction::Gate;
            }
        }

        match action {
            GateAction::Deny => {
                self.config.denial_tracker_mut().record_denial(&tool.name);
                return Err(GateErr::OperationDenied);
            }
            GateAction::Allow => {}
            GateAction::Gate => {
                self.run_approval(tool, category, &parsed_shell)?;
            }
        }

        // PathVerify + Execute
        let handle = self.build_execution_handle(tool, category, parsed_shell)?;
        Ok(executor.execute(tool, handle))
    }

    fn parse_shell_if_needed(&self, tool: &ToolCall, category: GateCategory) -> crate::Result<Option<ParsedCommand>> {
        if category != GateCategory::Shell {
            return Ok(None);
        }
        let command = tool
            .arg_str("command")
            .ok_or_else(|| GateErr::InvalidConfig("shell_execute call missing a command string".into()))?;
        Ok(Some(shell::parse(command, self.config.shell_kind())))
    }

    fn run_approval(&mut self, tool: &ToolCall, category: GateCategory, parsed_shell: &Option<ParsedCommand>) -> crate::Result<()> {
        let summary = build_summary(tool);
        let suggested = suggested_pattern(tool, category, parsed_shell);
        let prompt = ApprovalPrompt {
            tool: tool.name.clone(),
            summary,
            subagent_pid: None,
            suggested_pattern: suggested,
        };

        let is_dangerous = parsed_shell.as_ref().map(|p| p.is_dangerous).unwrap_or(false);
        let outcome = match self.config.approval_channel_mut() {
            Some(channel) => channel.request_approval(prompt),
            None => Err(GateErr::NonInteractiveGate),
        };

        match outcome {
            Ok(outcome) => match outcome.decision {
                ReviewDecision::AllowedOnce => {
                    self.config.denial_tracker_mut().reset(&tool.name);
                    Ok(())
                }
                ReviewDecision::AllowedAlways => {
                    self.config.denial_tracker_mut().reset(&tool.name);
                    if let Some(pattern) = outcome.pattern {
                        self.apply_allow_always(tool, category, &pattern)?;
                    }
                    Ok(())
                }
                ReviewDecision::Denied => {
                    self.config.denial_tracker_mut().record_denial(&tool.name);
                    Err(GateErr::OperationDenied)
                }
                ReviewDecision::Aborted => Err(GateErr::Aborted),
            },
            // Non-TTY, no approval channel: a `Gate` action becomes a
            // denial. A dangerous command gets its own error kind rather
            // than the generic one.
            Err(GateErr::NonInteractiveGate) if is_dangerous => Err(GateErr::DangerousCommand {
                reason: "matched a dangerous pattern with no approval channel available".into(),
            }),
            Err(other) => Err(other),
        }
    }

    fn apply_allow_always(&mut self, tool: &ToolCall, category: GateCategory, pattern: &str) -> crate::Result<()> {
        if category == GateCategory::Shell {
            let tokens: Vec<String> = pattern.split_whitespace().map(str::to_string).collect();
            self.config.add_allow_always(&tool.name, AllowAlwaysPattern::ShellPrefix(tokens))
        } else {
            self.config.add_allow_always(&tool.name, AllowAlwaysPattern::Regex(pattern.to_string()))
        }
    }

    fn build_execution_handle(
        &self,
        tool: &ToolCall,
        category: GateCategory,
        parsed_shell: Option<ParsedCommand>,
    ) -> crate::Result<ExecutionHandle> {
        match (category, parsed_shell) {
            (GateCategory::Shell, Some(parsed)) => Ok(ExecutionHandle::ShellCommand(parsed)),
            (GateCategory::Shell, None) => Err(GateErr::InvalidConfig(
                "shell category reached execution without a parsed command".into(),
            )),
            (GateCategory::FileRead | GateCategory::FileWrite, _) => {
                let Some(path) = tool.arg_str("path") else {
                    return Ok(ExecutionHandle::None);
                };
                let approved = ApprovedPath::snapshot(Path::new(path))?;
                let file = match tool.name.as_str() {
                    "append_file" => path_verifier::open_for_append(&approved)?,
                    "write_file" if approved.existed_at_approval => path_verifier::open_existing_for_write(&approved)?,
                    "write_file" => path_verifier::create_new(&approved)?,
                    _ => path_verifier::open_existing(&approved)?,
                };
                Ok(ExecutionHandle::File(file))
            }
            _ => Ok(ExecutionHandle::None),
        }
    }
}

fn build_summary(tool: &ToolCall) -> String {
    format!("{}: {}", tool.name, tool.arguments)
}

/// Builds the pattern shown to the user for confirmation when they pick
/// "allow always", one rule per category.
fn suggested_pattern(tool: &ToolCall, category: GateCategory, parsed_shell: &Option<ParsedCommand>) -> Option<String> {
    if category == GateCategory::Shell {
        return parsed_shell.as_ref().map(|p| pattern::shell_pattern(&p.tokens).join(" "));
    }
    match policy::match_target_for_tool(&tool.name) {
        MatchTarget::Path => tool.arg_str("path").map(pattern::path_pattern),
        MatchTarget::Url => tool.arg_str("url").and_then(pattern::url_pattern),
        MatchTarget::FullArguments | MatchTarget::None => None,
    }
}

/// Brokers a sub-agent's forwarded `ApprovalRequest` through the parent's
/// own channel. An "allow always" decision here adds the pattern to the
/// parent's own session allowlist, never the sub-agent's. The parent's
/// orchestrator calls this once per request it reads off a sub-agent's
/// pipe; the caller is responsible for the actual pipe I/O
/// (`approval::ipc::ParentMultiplexer`).
pub fn broker_subagent_request(
    parent_config: &mut GateConfig,
    pid: u32,
    request: &ApprovalRequest,
) -> crate::Result<ApprovalResponse> {
    let category = policy::category_for_tool(&request.tool);
    let arguments: serde_json::Value = serde_json::from_str(&request.arguments).unwrap_or(serde_json::Value::Null);
    let tool = ToolCall::new(request.request_id.to_string(), request.tool.clone(), arguments);
    let parsed_shell = if category == GateCategory::Shell {
        tool.arg_str("command").map(|cmd| shell::parse(cmd, parent_config.shell_kind()))
    } else {
        None
    };

    let prompt = ApprovalPrompt {
        tool: request.tool.clone(),
        summary: request.summary.clone(),
        subagent_pid: Some(pid),
        suggested_pattern: suggested_pattern(&tool, category, &parsed_shell),
    };

    let channel = parent_config.approval_channel_mut().ok_or(GateErr::NonInteractiveGate)?;
    let outcome = channel.request_approval(prompt)?;

    if outcome.decision == ReviewDecision::AllowedAlways {
        if let Some(pattern) = &outcome.pattern {
            if category == GateCategory::Shell {
                let tokens: Vec<String> = pattern.split_whitespace().map(str::to_string).collect();
                parent_config.add_allow_always(&request.tool, AllowAlwaysPattern::ShellPrefix(tokens))?;
            } else {
                parent_config.add_allow_always(&request.tool, AllowAlwaysPattern::Regex(pattern.clone()))?;
            }
        }
    }

    Ok(ApprovalResponse {
        request_id: request.request_id,
        decision: outcome.decision,
        pattern: outcome.pattern,
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::approval::ApprovalChannel;
    use crate::approval::ApprovalOutcome;
    use crate::config::GateConfig;
    use gate_protocol::GateCategory;

    struct RecordingExecutor {
        executed: bool,
    }

    impl ToolExecutor for RecordingExecutor {
        fn execute(&mut self, _tool: &ToolCall, _handle: ExecutionHandle) -> serde_json::Value {
            self.executed = true;
            serde_json::json!({"ok": true})
        }
    }

    struct FixedChannel(ReviewDecision);

    impl ApprovalChannel for FixedChannel {
        fn request_approval(&mut self, _prompt: ApprovalPrompt) -> crate::Result<ApprovalOutcome> {
            Ok(ApprovalOutcome {
                decision: self.0,
                pattern: None,
            })
        }
    }

    #[test]
    fn protected_file_write_is_blocked_before_any_prompt() {
        let dir = tempfile::tempdir().unwrap();
        let config = GateConfig::minimal();
        let mut orchestrator = GateOrchestrator::new(config);
        let target = dir.path().join("ralph.config.json");
        let tool = ToolCall::new("1", "write_file", serde_json::json!({"path": target.to_string_lossy()}));
        let mut executor = RecordingExecutor { executed: false };
        let outcome = orchestrator.check_and_execute(&tool, &mut executor);
        assert_eq!(outcome.result["error"], "protected_file");
        assert!(!executor.executed);
    }

    #[test]
    fn disabled_config_skips_the_gate_but_not_protected_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = GateConfig::minimal();
        config.set_enabled(false);
        let mut orchestrator = GateOrchestrator::new(config);

        let readable = dir.path().join("readme.md");
        std::fs::write(&readable, "hi").unwrap();
        let tool = ToolCall::new("1", "read_file", serde_json::json!({"path": readable.to_string_lossy()}));
        let mut executor = RecordingExecutor { executed: false };
        let outcome = orchestrator.check_and_execute(&tool, &mut executor);
        assert!(executor.executed);
        assert_eq!(outcome.result["ok"], true);

        let protected = dir.path().join("ralph.config.json");
        let tool = ToolCall::new("2", "write_file", serde_json::json!({"path": protected.to_string_lossy()}));
        let mut executor = RecordingExecutor { executed: false };
        let outcome = orchestrator.check_and_execute(&tool, &mut executor);
        assert_eq!(outcome.result["error"], "protected_file");
        assert!(!executor.executed);
    }

    #[test]
    fn gate_category_without_channel_is_non_interactive() {
        let mut config = GateConfig::minimal();
        config.allow_category(GateCategory::FileRead); // no-op override target below
        let mut orchestrator = GateOrchestrator::new(GateConfig::minimal());
        let tool = ToolCall::new("1", "read_file", serde_json::json!({"path": "./docs/readme.md"}));
        let mut executor = RecordingExecutor { executed: false };
        let outcome = orchestrator.check_and_execute(&tool, &mut executor);
        assert_eq!(outcome.result["error"], "non_interactive_gate");
        assert!(!executor.executed);
        let _ = config;
    }

    #[test]
    fn allow_category_executes_without_prompt() {
        let mut config = GateConfig::minimal();
        config.allow_category(GateCategory::FileRead);
        let mut orchestrator = GateOrchestrator::new(config);
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("readme.md");
        std::fs::write(&target, "hi").unwrap();
        let tool = ToolCall::new("1", "read_file", serde_json::json!({"path": target.to_string_lossy()}));
        let mut executor = RecordingExecutor { executed: false };
        let outcome = orchestrator.check_and_execute(&tool, &mut executor);
        assert!(executor.executed);
        assert_eq!(outcome.result["ok"], true);
    }

    #[test]
    fn approved_once_executes_and_resets_denials() {
        let mut config = GateConfig::minimal();
        config.set_approval_channel(Box::new(FixedChannel(ReviewDecision::AllowedOnce)));
        let mut orchestrator = GateOrchestrator::new(config);
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("out.txt");
        let tool = ToolCall::new("1", "write_file", serde_json::json!({"path": target.to_string_lossy()}));
        let mut executor = RecordingExecutor { executed: false };
        let outcome = orchestrator.check_and_execute(&tool, &mut executor);
        assert!(executor.executed);
        assert_eq!(outcome.result["ok"], true);
    }

    #[test]
    fn denied_records_denial_and_returns_operation_denied() {
        let mut config = GateConfig::minimal();
        config.set_approval_channel(Box::new(FixedChannel(ReviewDecision::Denied)));
        let mut orchestrator = GateOrchestrator::new(config);
        let tool = ToolCall::new("1", "web_fetch", serde_json::json!({"url": "https://example.com"}));
        let mut executor = RecordingExecutor { executed: false };
        let outcome = orchestrator.check_and_execute(&tool, &mut executor);
        assert_eq!(outcome.result["error"], "operation_denied");
        assert!(!executor.executed);
    }

    #[test]
    fn aborted_terminates_the_batch() {
        let mut config = GateConfig::minimal();
        config.set_approval_channel(Box::new(FixedChannel(ReviewDecision::Aborted)));
        let mut orchestrator = GateOrchestrator::new(config);
        let tool = ToolCall::new("1", "web_fetch", serde_json::json!({"url": "https://example.com"}));
        let mut executor = RecordingExecutor { executed: false };
        let outcome = orchestrator.check_and_execute(&tool, &mut executor);
        assert!(outcome.terminates_batch);
    }

    #[test]
    fn dangerous_shell_command_gates_even_under_allow_category() {
        let mut config = GateConfig::minimal();
        config.allow_category(GateCategory::Shell);
        config.set_approval_channel(Box::new(FixedChannel(ReviewDecision::Denied)));
        let mut orchestrator = GateOrchestrator::new(config);
        let tool = ToolCall::new("1", "shell_execute", serde_json::json!({"command": "git status; rm -rf /"}));
        let mut executor = RecordingExecutor { executed: false };
        let outcome = orchestrator.check_and_execute(&tool, &mut executor);
        assert_eq!(outcome.result["error"], "operation_denied");
        assert!(!executor.executed);
    }
}
