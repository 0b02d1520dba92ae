//! `GateConfig`: the single value a session builds once from the JSON
//! config file and CLI flags, then threads explicitly through the tool
//! executor. Load-then-merge: deserialize into a typed struct with
//! `#[serde(default)]` fields and `deny_unknown_fields`, then apply CLI
//! overrides on top.

use std::collections::HashMap;

use gate_protocol::GateAction;
use gate_protocol::GateCategory;
use gate_protocol::ShellKind;
use serde::Deserialize;

use crate::allowlist::Allowlist;
use crate::allowlist::AllowlistEntry;
use crate::allowlist::ShellAllowlistEntry;
use crate::approval::ApprovalChannel;
use crate::denial::DenialTracker;
use crate::error::GateErr;
use crate::policy;
use crate::policy::CategoryTable;
use crate::shell::ParsedCommand;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    approval_gates: ApprovalGatesSection,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ApprovalGatesSection {
    #[serde(default = "default_enabled")]
    enabled: bool,
    #[serde(default)]
    categories: HashMap<GateCategory, GateAction>,
    #[serde(default)]
    allowlist: Vec<AllowlistEntryConfig>,
}

fn default_enabled() -> bool {
    true
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum AllowlistEntryConfig {
    Shell(ShellAllowlistEntryConfig),
    Regex(RegexAllowlistEntryConfig),
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ShellAllowlistEntryConfig {
    tool: String,
    command: Vec<String>,
    #[serde(default)]
    shell: Option<ShellKind>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RegexAllowlistEntryConfig {
    tool: String,
    pattern: String,
}

/// Owns its allowlist, denial tracker, and (optionally) its approval
/// channel exclusively. Built once at session start; a sub-agent gets a
/// narrowed copy via `for_subagent`, never a pointer to the parent's.
pub struct GateConfig {
    enabled: bool,
    yolo: bool,
    categories: CategoryTable,
    allowlist: Allowlist,
    denial_tracker: DenialTracker,
    approval_channel: Option<Box<dyn ApprovalChannel>>,
    shell_kind: ShellKind,
}

impl GateConfig {
    /// Builds a `GateConfig` with every category defaulting to `Gate` and
    /// an empty allowlist — used by tests and as the base before loading a
    /// config file.
    pub fn minimal() -> Self {
        GateConfig {
            enabled: true,
            yolo: false,
            categories: CategoryTable::new(),
            allowlist: Allowlist::new(),
            denial_tracker: DenialTracker::new(),
            approval_channel: None,
            shell_kind: ShellKind::detect_from_env(|k| std::env::var(k).ok()),
        }
    }

    /// Parses the `approval_gates` JSON config. Unknown category names and
    /// unknown keys on any entry are rejected at load time, surfaced as
    /// `GateErr::InvalidConfig`-kind errors (via the
    /// `serde_json::Error -> GateErr::Json` conversion).
    pub fn from_json(raw: &str) -> crate::Result<Self> {
        let parsed: ConfigFile = serde_json::from_str(raw)?;
        let section = parsed.approval_gates;

        let mut config = GateConfig::minimal();
        config.enabled = section.enabled;
        config.categories = section.categories;

        for entry in section.allowlist {
            match entry {
                AllowlistEntryConfig::Shell(shell_entry) => {
                    let entry = ShellAllowlistEntry::new(shell_entry.command, shell_entry.shell)
                        .ok_or_else(|| GateErr::InvalidConfig("shell allowlist entry has an empty command".into()))?;
                    config.allowlist.add_shell(entry);
                }
                AllowlistEntryConfig::Regex(regex_entry) => {
                    let entry = AllowlistEntry::new(regex_entry.tool, regex_entry.pattern)
                        .map_err(|e| GateErr::InvalidConfig(format!("invalid allowlist regex: {e}")))?;
                    config.allowlist.add_regex(entry);
                }
            }
        }
        config.allowlist.commit_config_baseline();
        Ok(config)
    }

    /// `--yolo`: demotes every `Gate` category to `Allow` for the process,
    /// but never protected-file or dangerous-pattern enforcement — those
    /// are checked independently by the orchestrator, outside this table.
    pub fn apply_yolo(&mut self) {
        self.yolo = true;
    }

    /// `--allow-category=<name>`: upgrades a category to `Allow` for the
    /// session.
    pub fn allow_category(&mut self, category: GateCategory) {
        self.categories.insert(category, GateAction::Allow);
    }

    /// Sets a category's default action outright, for callers building a
    /// `GateConfig` directly rather than through `from_json`.
    pub fn set_category(&mut self, category: GateCategory, action: GateAction) {
        self.categories.insert(category, action);
    }

    /// `--allow <tool:tok,tok,...>`: session-adds a shell allowlist entry.
    pub fn add_session_shell_allow(&mut self, prefix: Vec<String>, shell: Option<ShellKind>) -> crate::Result<()> {
        let entry = ShellAllowlistEntry::new(prefix, shell)
            .ok_or_else(|| GateErr::InvalidConfig("--allow prefix must not be empty".into()))?;
        self.allowlist.add_shell(entry);
        Ok(())
    }

    /// Adds a pattern generated by an "allow always" decision. `target`
    /// distinguishes a shell entry (token prefix) from a regex entry
    /// (tool + pattern against a match-target).
    pub fn add_allow_always(&mut self, tool: &str, pattern: AllowAlwaysPattern) -> crate::Result<()> {
        match pattern {
            AllowAlwaysPattern::ShellPrefix(prefix) => {
                let entry = ShellAllowlistEntry::new(prefix, None)
                    .ok_or_else(|| GateErr::InvalidConfig("generated shell pattern was empty".into()))?;
                self.allowlist.add_shell(entry);
            }
            AllowAlwaysPattern::Regex(pattern) => {
                let entry = AllowlistEntry::new(tool, pattern)
                    .map_err(|e| GateErr::InvalidConfig(format!("invalid generated pattern: {e}")))?;
                self.allowlist.add_regex(entry);
            }
        }
        Ok(())
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Sets the `enabled` flag outright, for callers building a
    /// `GateConfig` directly rather than through `from_json`.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn shell_kind(&self) -> ShellKind {
        self.shell_kind
    }

    /// Overrides shell-dialect detection, e.g. when a host's environment
    /// variables don't reflect the shell the model's commands are actually
    /// written for.
    pub fn set_shell_kind(&mut self, shell_kind: ShellKind) {
        self.shell_kind = shell_kind;
    }

    pub fn denial_tracker_ref(&self) -> &DenialTracker {
        &self.denial_tracker
    }

    pub fn denial_tracker_mut(&mut self) -> &mut DenialTracker {
        &mut self.denial_tracker
    }

    pub fn approval_channel_mut(&mut self) -> Option<&mut dyn ApprovalChannel> {
        self.approval_channel.as_deref_mut()
    }

    pub fn set_approval_channel(&mut self, channel: Box<dyn ApprovalChannel>) {
        self.approval_channel = Some(channel);
    }

    pub fn is_subagent(&self) -> bool {
        self.approval_channel.is_some()
    }

    /// The effective category table, with every `Gate` demoted to `Allow`
    /// when `--yolo` is set or the config's `enabled` flag is off. Either
    /// way, an explicit `Deny` category stays denied, and protected-file
    /// and dangerous-command enforcement sit outside this table entirely,
    /// so neither switch can touch them.
    fn effective_categories(&self) -> CategoryTable {
        if self.yolo || !self.enabled {
            return self
                .categories
                .iter()
                .map(|(k, v)| {
                    let effective = if *v == GateAction::Gate { GateAction::Allow } else { *v };
                    (*k, effective)
                })
                .collect();
        }
        self.categories.clone()
    }

    /// Evaluates policy for a tool call, using the yolo/enabled-adjusted
    /// category table and this config's allowlist.
    pub fn evaluate(&self, tool: &gate_protocol::ToolCall, parsed_shell: Option<&ParsedCommand>) -> GateAction {
        let categories = self.effective_categories();
        policy::evaluate(tool, parsed_shell, &categories, &self.allowlist)
    }

    /// Derives the narrowed view a sub-agent receives: category defaults
    /// and config-file allowlist entries, but never session-added entries,
    /// and a fresh denial tracker. The caller is responsible for attaching
    /// the sub-agent's own `SubagentClient` as its approval channel.
    pub fn for_subagent(&self) -> GateConfig {
        GateConfig {
            enabled: self.enabled,
            yolo: self.yolo,
            categories: self.categories.clone(),
            allowlist: self.allowlist.config_only_view(),
            denial_tracker: DenialTracker::new(),
            approval_channel: None,
            shell_kind: self.shell_kind,
        }
    }
}

/// What an "allow always" decision adds to the allowlist, distinguished by
/// whether the approved tool call was a shell command or a regex
/// match-target.
pub enum AllowAlwaysPattern {
    ShellPrefix(Vec<String>),
    Regex(String),
}
