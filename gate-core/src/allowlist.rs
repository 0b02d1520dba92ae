//! Allowlist: two flat, append-only collections — regex entries for
//! non-shell tools and token-prefix entries for shell commands. Shell
//! entries match on exact token prefixes rather than a regex over the raw
//! command text, since a regex like `^ls` is itself an injection hole
//! (`ls; rm -rf /` still starts with `ls`).

use gate_protocol::ShellKind;
use regex_lite::Regex;

use crate::shell::ParsedCommand;

#[derive(Debug, Clone)]
pub struct AllowlistEntry {
    pub tool: String,
    pub pattern: String,
    regex: Regex,
}

impl AllowlistEntry {
    pub fn new(tool: impl Into<String>, pattern: impl Into<String>) -> Result<Self, regex_lite::Error> {
        let pattern = pattern.into();
        let regex = Regex::new(&pattern)?;
        Ok(AllowlistEntry {
            tool: tool.into(),
            pattern,
            regex,
        })
    }
}

#[derive(Debug, Clone)]
pub struct ShellAllowlistEntry {
    pub prefix: Vec<String>,
    pub shell: Option<ShellKind>,
}

impl ShellAllowlistEntry {
    pub fn new(prefix: Vec<String>, shell: Option<ShellKind>) -> Option<Self> {
        if prefix.is_empty() || prefix.iter().any(String::is_empty) {
            return None;
        }
        Some(ShellAllowlistEntry { prefix, shell })
    }
}

/// Rows of cross-shell equivalent command names, compared
/// case-insensitively. A caller's first token and an entry's first token
/// match if both appear in the same row.
const EQUIVALENCE_TABLE: &[&[&str]] = &[
    &["ls", "dir", "get-childitem", "gci"],
    &["cat", "type", "get-content", "gc"],
    &["rm", "del", "remove-item", "ri"],
    &["cp", "copy", "copy-item", "ci"],
    &["mv", "move", "move-item", "mi"],
    &["pwd", "get-location", "gl"],
];

fn first_tokens_equivalent(a: &str, b: &str) -> bool {
    if a.eq_ignore_ascii_case(b) {
        return true;
    }
    let a_lower = a.to_ascii_lowercase();
    let b_lower = b.to_ascii_lowercase();
    EQUIVALENCE_TABLE
        .iter()
        .any(|row| row.contains(&a_lower.as_str()) && row.contains(&b_lower.as_str()))
}

/// Holds config-file entries followed by session-added ("Allow always")
/// entries. `reset_session` truncates back to the config-file-only state.
#[derive(Debug, Clone, Default)]
pub struct Allowlist {
    regex_entries: Vec<AllowlistEntry>,
    shell_entries: Vec<ShellAllowlistEntry>,
    regex_config_len: usize,
    shell_config_len: usize,
}

impl Allowlist {
    pub fn new() -> Self {
        Allowlist::default()
    }

    /// Marks the entries currently present as "from config" — everything
    /// added after this call is session-scoped and removed by
    /// `reset_session`. Called once, right after config-file entries are
    /// loaded.
    pub fn commit_config_baseline(&mut self) {
        self.regex_config_len = self.regex_entries.len();
        self.shell_config_len = self.shell_entries.len();
    }

    pub fn add_regex(&mut self, entry: AllowlistEntry) {
        self.regex_entries.push(entry);
    }

    pub fn add_shell(&mut self, entry: ShellAllowlistEntry) {
        self.shell_entries.push(entry);
    }

    pub fn reset_session(&mut self) {
        self.regex_entries.truncate(self.regex_config_len);
        self.shell_entries.truncate(self.shell_config_len);
    }

    /// A view containing only the config-file entries — what a sub-agent
    /// inherits. Session-added entries never carry over to a sub-agent.
    pub fn config_only_view(&self) -> Allowlist {
        Allowlist {
            regex_entries: self.regex_entries[..self.regex_config_len].to_vec(),
            shell_entries: self.shell_entries[..self.shell_config_len].to_vec(),
            regex_config_len: self.regex_config_len,
            shell_config_len: self.shell_config_len,
        }
    }

    /// Linear scan, last-added-first: a more specific session-added entry
    /// can shadow a broader config-file one.
    pub fn check_regex(&self, tool: &str, target: &str) -> bool {
        self.regex_entries
            .iter()
            .rev()
            .any(|e| e.tool == tool && e.regex.is_match(target))
    }

    /// Never called when `parsed.has_any_hazard()` or `parsed.is_dangerous`
    /// — the orchestrator/policy evaluator enforce that upstream.
    pub fn check_shell(&self, parsed: &ParsedCommand) -> bool {
        self.shell_entries.iter().rev().any(|entry| {
            let shell_ok = match entry.shell {
                Some(required) => required == parsed.shell,
                None => true,
            };
            shell_ok && is_token_prefix(&entry.prefix, &parsed.tokens)
        })
    }
}

fn is_token_prefix(prefix: &[String], tokens: &[String]) -> bool {
    if prefix.len() > tokens.len() {
        return false;
    }
    prefix.iter().zip(tokens.iter()).enumerate().all(|(i, (p, t))| {
        if i == 0 {
            first_tokens_equivalent(p, t)
        } else {
            p == t
        }
    })
}
