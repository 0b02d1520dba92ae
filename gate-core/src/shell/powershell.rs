//! PowerShell tokenizer. Hand-rolled for the same reason as `cmd.rs`: no
//! off-the-shelf grammar crate covers this dialect. The dangerous-cmdlet
//! substring check lives in `dangerous.rs`; this module only computes the
//! hazard flags.

use super::ParsedCommand;
use gate_protocol::ShellKind;

pub fn parse(command: &str) -> ParsedCommand {
    let mut has_chain = false;
    let mut has_pipe = false;
    let mut has_subshell = false;
    let mut has_redirect = false;

    let mut in_single = false;
    let mut in_double = false;
    let chars: Vec<char> = command.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match c {
            '\'' if !in_double => in_single = !in_single,
            '"' if !in_single => in_double = !in_double,
            ';' if !in_single && !in_double => has_chain = true,
            '&' if !in_single && !in_double => {
                // `&&` (PS7 chain) or a bare `&` call operator at an
                // expression boundary: both are chain-equivalent hazards.
                has_chain = true;
                if chars.get(i + 1) == Some(&'&') {
                    i += 1;
                }
            }
            '|' if !in_single && !in_double => {
                if chars.get(i + 1) == Some(&'|') {
                    has_chain = true;
                    i += 1;
                } else {
                    has_pipe = true;
                }
            }
            '$' if !in_single => {
                // `$(...)` subexpression or a bare `$var` expansion; both are
                // not staticaly resolvable.
                has_subshell = true;
                if chars.get(i + 1) == Some(&'(') {
                    i += 1;
                }
            }
            '`' if !in_single && !in_double => {
                // Backtick is PowerShell's escape character; at end of input
                // it escapes nothing knowable.
                i += 1;
                if i >= chars.len() {
                    has_chain = true;
                }
            }
            '>' | '<' if !in_single && !in_double => has_redirect = true,
            '.' if !in_single && !in_double && i == 0 => {
                // Leading `. ` dot-sourcing runs a script in the caller's
                // scope; treat the same as a subshell hazard.
                if chars.get(1) == Some(&' ') {
                    has_subshell = true;
                }
            }
            _ => {}
        }
        i += 1;
    }

    if in_single || in_double {
        has_chain = true;
    }

    ParsedCommand {
        tokens: fallback_tokens(command),
        has_chain,
        has_pipe,
        has_subshell,
        has_redirect,
        is_dangerous: false,
        shell: ShellKind::PowerShell,
    }
}

fn fallback_tokens(command: &str) -> Vec<String> {
    shlex::split(command).unwrap_or_else(|| command.split_whitespace().map(str::to_owned).collect())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    #[test]
    fn plain_command_has_no_hazard() {
        let parsed = parse("Get-ChildItem -Recurse");
        assert!(!parsed.has_chain && !parsed.has_pipe && !parsed.has_subshell && !parsed.has_redirect);
    }

    #[test]
    fn semicolon_chain_is_flagged() {
        let parsed = parse("Get-Item foo; Remove-Item foo");
        assert!(parsed.has_chain);
    }

    #[test]
    fn pipe_is_flagged() {
        let parsed = parse("Get-ChildItem | Where-Object { $_.Length -gt 0 }");
        assert!(parsed.has_pipe);
        assert!(parsed.has_subshell);
    }

    #[test]
    fn subexpression_is_flagged_as_subshell() {
        let parsed = parse("Write-Output $(Get-Date)");
        assert!(parsed.has_subshell);
    }

    #[test]
    fn redirect_is_flagged() {
        let parsed = parse("Get-Content file.txt > out.txt");
        assert!(parsed.has_redirect);
    }

    #[test]
    fn dot_sourcing_is_flagged_as_subshell() {
        let parsed = parse(". .\\script.ps1");
        assert!(parsed.has_subshell);
    }

    #[test]
    fn unterminated_string_is_flagged() {
        let parsed = parse("Write-Output \"unterminated");
        assert!(parsed.has_chain);
    }
}
