//! POSIX shell tokenizer. Grounded on
//! `codex-core::is_safe_command::{try_parse_bash, try_parse_single_word_only_command}`:
//! `tree-sitter-bash` does the parsing because a hand-rolled POSIX
//! tokenizer is too easy to get wrong in exactly the way that matters for
//! a security boundary.

use tree_sitter::Node;
use tree_sitter::Parser;
use tree_sitter::Tree;
use tree_sitter_bash::LANGUAGE as BASH;

use super::ParsedCommand;
use gate_protocol::ShellKind;

#[derive(Default)]
struct Hazards {
    chain: bool,
    pipe: bool,
    subshell: bool,
    redirect: bool,
}

pub fn parse(command: &str) -> ParsedCommand {
    let forced_chain = raw_text_forces_chain(command);

    let tree = try_parse_bash(command);
    let Some(tree) = tree else {
        return ParsedCommand {
            tokens: fallback_tokens(command),
            has_chain: true,
            has_pipe: false,
            has_subshell: false,
            has_redirect: false,
            is_dangerous: false,
            shell: ShellKind::Posix,
        };
    };

    let root = tree.root_node();
    if root.has_error() {
        return ParsedCommand {
            tokens: fallback_tokens(command),
            has_chain: true,
            has_pipe: false,
            has_subshell: false,
            has_redirect: false,
            is_dangerous: false,
            shell: ShellKind::Posix,
        };
    }

    if let Some(words) = try_single_word_command(&root, command) {
        return ParsedCommand {
            tokens: words,
            has_chain: forced_chain,
            has_pipe: false,
            has_subshell: false,
            has_redirect: false,
            is_dangerous: false,
            shell: ShellKind::Posix,
        };
    }

    let mut hazards = Hazards::default();
    walk(root, &mut hazards);

    ParsedCommand {
        tokens: fallback_tokens(command),
        has_chain: forced_chain || hazards.chain,
        has_pipe: hazards.pipe,
        has_subshell: hazards.subshell,
        has_redirect: hazards.redirect,
        is_dangerous: false,
        shell: ShellKind::Posix,
    }
}

fn try_parse_bash(script: &str) -> Option<Tree> {
    let lang = BASH.into();
    let mut parser = Parser::new();
    parser.set_language(&lang).ok()?;
    let old_tree: Option<&Tree> = None;
    parser.parse(script, old_tree)
}

/// Mirrors `is_safe_command::try_parse_single_word_only_command`: if `root`
/// is a single `command` made only of ordinary words, returns those words.
fn try_single_word_command(root: &Node, src: &str) -> Option<Vec<String>> {
    if root.kind() != "program" || root.named_child_count() != 1 {
        return None;
    }
    let cmd = root.named_child(0)?;
    if cmd.kind() != "command" {
        return None;
    }

    let mut words = Vec::new();
    let mut cursor = cmd.walk();
    for child in cmd.named_children(&mut cursor) {
        match child.kind() {
            "command_name" => {
                let word_node = child.named_child(0)?;
                if word_node.kind() != "word" {
                    return None;
                }
                words.push(word_node.utf8_text(src.as_bytes()).ok()?.to_owned());
            }
            "word" | "number" => {
                words.push(child.utf8_text(src.as_bytes()).ok()?.to_owned());
            }
            "string" => {
                if child.child_count() == 3
                    && child.child(0)?.kind() == "\""
                    && child.child(1)?.kind() == "string_content"
                    && child.child(2)?.kind() == "\""
                {
                    words.push(child.child(1)?.utf8_text(src.as_bytes()).ok()?.to_owned());
                } else {
                    return None;
                }
            }
            "raw_string" => {
                let raw = child.utf8_text(src.as_bytes()).ok()?;
                let stripped = raw.strip_prefix('\'').and_then(|s| s.strip_suffix('\''))?;
                words.push(stripped.to_owned());
            }
            _ => return None,
        }
    }
    Some(words)
}

/// Walks the whole tree (not just the top level) looking for chaining,
/// piping, subshell, and redirect node kinds. Unlike
/// `try_single_word_command` this never bails — an unmatched/unknown
/// construct simply contributes no additional flag, but the caller still
/// has `forced_chain` from the raw text scan as a backstop.
fn walk(node: Node, hazards: &mut Hazards) {
    match node.kind() {
        "&&" | "||" | ";" | "terminator" => hazards.chain = true,
        "|" => hazards.pipe = true,
        "subshell" | "command_substitution" | "process_substitution" | "compound_statement" => {
            hazards.subshell = true
        }
        "simple_expansion" | "expansion" => hazards.subshell = true,
        "file_redirect" | "heredoc_redirect" | "herestring_redirect" => hazards.redirect = true,
        "ERROR" => hazards.chain = true,
        _ => {}
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        walk(child, hazards);
    }
}

/// Raw-text backstop independent of the parser: null bytes, non-ASCII
/// bytes, and a dangling odd run of trailing backslashes (an escape that
/// would cross whatever token boundary follows) all force `has_chain`.
fn raw_text_forces_chain(command: &str) -> bool {
    if command.as_bytes().contains(&0) {
        return true;
    }
    if !command.is_ascii() {
        return true;
    }
    let trailing_backslashes = command.chars().rev().take_while(|c| *c == '\\').count();
    if trailing_backslashes % 2 == 1 {
        return true;
    }
    false
}

fn fallback_tokens(command: &str) -> Vec<String> {
    shlex::split(command).unwrap_or_else(|| command.split_whitespace().map(str::to_owned).collect())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    fn vec_str(args: &[&str]) -> Vec<String> {
        args.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn simple_command_has_no_hazard() {
        let parsed = parse("git status");
        assert_eq!(parsed.tokens, vec_str(&["git", "status"]));
        assert!(!parsed.has_chain && !parsed.has_pipe && !parsed.has_subshell && !parsed.has_redirect);
    }

    #[test]
    fn semicolon_chain_is_flagged() {
        let parsed = parse("git status; rm -rf /");
        assert!(parsed.has_chain);
    }

    #[test]
    fn pipe_is_flagged() {
        let parsed = parse("cat foo | wc -l");
        assert!(parsed.has_pipe);
    }

    #[test]
    fn command_substitution_is_flagged_as_subshell() {
        let parsed = parse("echo $(whoami)");
        assert!(parsed.has_subshell);
    }

    #[test]
    fn backtick_substitution_is_flagged_as_subshell() {
        let parsed = parse("echo `whoami`");
        assert!(parsed.has_subshell);
    }

    #[test]
    fn redirect_is_flagged() {
        let parsed = parse("echo hi > out.txt");
        assert!(parsed.has_redirect);
    }

    #[test]
    fn dollar_var_is_flagged_as_subshell() {
        let parsed = parse("echo $HOME");
        assert!(parsed.has_subshell);
    }

    #[test]
    fn unbalanced_quote_is_flagged_and_does_not_panic() {
        let parsed = parse("echo \"unterminated");
        assert!(parsed.has_chain);
    }

    #[test]
    fn non_ascii_bytes_are_flagged() {
        let parsed = parse("echo héllo");
        assert!(parsed.has_chain);
    }

    #[test]
    fn single_quoted_literal_has_no_hazard() {
        let parsed = parse("sed -n '1,5p' file.txt");
        assert_eq!(parsed.tokens, vec_str(&["sed", "-n", "1,5p", "file.txt"]));
        assert!(!parsed.has_any_hazard_for_test());
    }

    impl ParsedCommand {
        fn has_any_hazard_for_test(&self) -> bool {
            self.has_chain || self.has_pipe || self.has_subshell || self.has_redirect
        }
    }
}
