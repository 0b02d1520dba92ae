//! `cmd.exe` tokenizer. No grammar crate covers this dialect, so this is a
//! hand-rolled scanner in the style of `codex-core::parse_command`: a
//! single forward pass over characters, tracking quote state, that prefers
//! setting a hazard flag over guessing.

use super::ParsedCommand;
use gate_protocol::ShellKind;

pub fn parse(command: &str) -> ParsedCommand {
    let mut has_chain = false;
    let mut has_pipe = false;
    let mut has_subshell = false;
    let mut has_redirect = false;

    let mut in_quotes = false;
    let mut caret_taint = false;
    let chars: Vec<char> = command.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match c {
            '"' => in_quotes = !in_quotes,
            '^' if !in_quotes => {
                // `^` escapes the next character in cmd.exe; if it escapes
                // something we'd otherwise treat as a hazard, the command is
                // deliberately obscuring intent.
                caret_taint = true;
                i += 1;
            }
            '&' if !in_quotes => {
                // `&&` and a bare `&` (background/sequence) are both chains.
                has_chain = true;
                if chars.get(i + 1) == Some(&'&') {
                    i += 1;
                }
            }
            '|' if !in_quotes => has_pipe = true,
            '%' if !in_quotes => {
                // `%VAR%` environment expansion: treat as subshell-equivalent
                // since its expansion is not knowable statically.
                if let Some(end_rel) = chars[i + 1..].iter().position(|c| *c == '%') {
                    has_subshell = true;
                    i += end_rel + 1;
                }
            }
            '>' | '<' if !in_quotes => has_redirect = true,
            '(' if !in_quotes => has_subshell = true,
            _ => {}
        }
        i += 1;
    }

    if in_quotes {
        // Unterminated quote: ambiguous where the command actually ends.
        has_chain = true;
    }
    if caret_taint {
        has_chain = true;
    }

    ParsedCommand {
        tokens: fallback_tokens(command),
        has_chain,
        has_pipe,
        has_subshell,
        has_redirect,
        is_dangerous: false,
        shell: ShellKind::Cmd,
    }
}

fn fallback_tokens(command: &str) -> Vec<String> {
    shlex::split(command).unwrap_or_else(|| command.split_whitespace().map(str::to_owned).collect())
}
