//! Pattern generation for "allow always". Each function builds the
//! narrowest regex (or token prefix) that still covers the operation the
//! user just approved — never a pattern that would also match siblings
//! the user hasn't seen yet.

/// Escapes regex metacharacters in a literal fragment that will be spliced
/// into a generated pattern. `regex-lite` doesn't export an `escape`
/// helper, so this mirrors the standard approach of backslash-prefixing
/// every ASCII punctuation character a regex engine treats specially.
fn escape_literal(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(
            c,
            '.' | '^' | '$' | '*' | '+' | '?' | '(' | ')' | '[' | ']' | '{' | '}' | '|' | '\\' | '/'
        ) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Builds a pattern for a path-bearing approval. A root-level file (no
/// directory component) gets an exact-match pattern; otherwise the
/// directory is kept literal and the extension is wildcarded, e.g.
/// `./src/foo/bar.c` -> `^\./src/foo/.*\.c$`.
pub fn path_pattern(path: &str) -> String {
    match path.rfind('/') {
        Some(idx) => {
            let dir = &path[..idx];
            let filename = &path[idx + 1..];
            let ext = filename.rsplit_once('.').map(|(_, ext)| ext);
            match ext {
                Some(ext) => format!("^{}/.*\\.{}$", escape_literal(dir), escape_literal(ext)),
                None => format!("^{}/{}$", escape_literal(dir), escape_literal(filename)),
            }
        }
        None => format!("^{}$", escape_literal(path)),
    }
}

/// Builds a shell allowlist prefix from approved tokens: base command plus
/// first argument, e.g. `["git", "commit", "-m", "msg"]` -> `["git",
/// "commit"]`. Never includes operator-bearing tokens — the caller must
/// only call this for a command with no hazard flags.
pub fn shell_pattern(tokens: &[String]) -> Vec<String> {
    tokens.iter().take(2).cloned().collect()
}

/// Builds a pattern for a URL approval: scheme + exact hostname + `(/|$)`,
/// which prevents a sibling subdomain (`evil.example.com`) from matching a
/// pattern meant for `example.com`.
pub fn url_pattern(url: &str) -> Option<String> {
    let (scheme, rest) = url.split_once("://")?;
    let host_end = rest.find(['/', '?', '#']).unwrap_or(rest.len());
    let host = &rest[..host_end];
    if host.is_empty() {
        return None;
    }
    Some(format!("^{}://{}(/|$)", escape_literal(scheme), escape_literal(host)))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    #[test]
    fn nested_path_gets_directory_plus_wildcard_extension() {
        assert_eq!(path_pattern("./src/foo/bar.c"), r"^\./src/foo/.*\.c$");
    }

    #[test]
    fn root_level_file_gets_exact_match() {
        assert_eq!(path_pattern("Cargo.toml"), r"^Cargo\.toml$");
    }

    #[test]
    fn shell_pattern_keeps_only_first_two_tokens() {
        let tokens = vec!["git".to_string(), "commit".to_string(), "-m".to_string(), "msg".to_string()];
        assert_eq!(shell_pattern(&tokens), vec!["git".to_string(), "commit".to_string()]);
    }

    #[test]
    fn url_pattern_pins_scheme_and_host() {
        assert_eq!(
            url_pattern("https://example.com/api/v1?x=1").unwrap(),
            r"^https://example\.com(/|$)"
        );
    }

    #[test]
    fn url_pattern_does_not_match_sibling_subdomain() {
        let pattern = url_pattern("https://example.com/api").unwrap();
        let re = regex_lite::Regex::new(&pattern).unwrap();
        assert!(re.is_match("https://example.com/anything"));
        assert!(!re.is_match("https://evil-example.com/anything"));
        assert!(!re.is_match("https://sub.example.com/anything"));
    }
}
