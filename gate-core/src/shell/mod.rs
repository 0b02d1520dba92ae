//! Shell Parser: three conservative tokenizers sharing one output
//! structure. `tree-sitter-bash` handles rigorous POSIX parsing; `cmd`/
//! `powershell` have no equivalent grammar available, so they get a
//! hand-rolled scanner in the same "flag on ambiguity" spirit.

mod cmd;
mod dangerous;
mod posix;
mod powershell;

pub use gate_protocol::ShellKind;

/// Output of parsing a shell command string. A `ParsedCommand` with any
/// hazard flag set, or `is_dangerous`, must never be matched against the
/// allowlist — see `policy::evaluate`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand {
    pub tokens: Vec<String>,
    pub has_chain: bool,
    pub has_pipe: bool,
    pub has_subshell: bool,
    pub has_redirect: bool,
    pub is_dangerous: bool,
    pub shell: ShellKind,
}

impl ParsedCommand {
    /// `true` when any hazard flag is set, regardless of `is_dangerous`.
    /// The condition under which the allowlist must never be consulted.
    pub fn has_any_hazard(&self) -> bool {
        self.has_chain || self.has_pipe || self.has_subshell || self.has_redirect
    }

    /// `true` when the command must never be allowlist-matched: either a
    /// hazard flag is set or the command is outright dangerous.
    pub fn is_allowlistable(&self) -> bool {
        !self.has_any_hazard() && !self.is_dangerous
    }
}

/// Parses `command` as the given shell dialect.
pub fn parse(command: &str, shell: ShellKind) -> ParsedCommand {
    let mut parsed = match shell {
        ShellKind::Posix => posix::parse(command),
        ShellKind::Cmd => cmd::parse(command),
        ShellKind::PowerShell => powershell::parse(command),
    };

    if dangerous::is_universally_dangerous(command) {
        parsed.is_dangerous = true;
    }
    if shell == ShellKind::PowerShell && dangerous::matches_dangerous_powershell_cmdlet(command) {
        parsed.is_dangerous = true;
    }

    parsed
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    #[test]
    fn empty_command_does_not_crash() {
        let parsed = parse("", ShellKind::Posix);
        assert!(parsed.tokens.is_empty() || parsed.has_chain);
    }

    #[test]
    fn single_token_is_handled() {
        let parsed = parse("ls", ShellKind::Posix);
        assert_eq!(parsed.tokens, vec!["ls".to_string()]);
        assert!(!parsed.has_any_hazard());
        assert!(!parsed.is_dangerous);
    }

    #[test]
    fn command_ending_in_unclosed_quote_is_flagged_not_crashed() {
        let parsed = parse("echo \"unterminated", ShellKind::Posix);
        assert!(parsed.has_chain);
    }
}
