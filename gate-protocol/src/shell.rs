use serde::Deserialize;
use serde::Serialize;
use strum_macros::Display;
use strum_macros::EnumString;

/// Shell dialect a command was (or should be) parsed as. Detected from
/// environment variables at session start; also carried explicitly on a
/// `ShellAllowlistEntry` so an entry can be scoped to one shell or left
/// open to any.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ShellKind {
    Posix,
    Cmd,
    PowerShell,
}

impl ShellKind {
    /// Detects the shell in effect from environment variables: `COMSPEC`,
    /// `PSModulePath`, `SHELL`. PowerShell takes precedence over a bare
    /// `COMSPEC` because `pwsh`/`powershell.exe` set both.
    pub fn detect_from_env<F>(get_var: F) -> ShellKind
    where
        F: Fn(&str) -> Option<String>,
    {
        if get_var("PSModulePath").is_some() {
            ShellKind::PowerShell
        } else if get_var("SHELL").is_some() {
            ShellKind::Posix
        } else if get_var("COMSPEC").is_some() {
            ShellKind::Cmd
        } else if cfg!(windows) {
            ShellKind::Cmd
        } else {
            ShellKind::Posix
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use std::collections::HashMap;

    fn env_of(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn powershell_wins_over_comspec() {
        let env = env_of(&[("PSModulePath", "C:\\ps"), ("COMSPEC", "C:\\cmd.exe")]);
        let kind = ShellKind::detect_from_env(|k| env.get(k).cloned());
        assert_eq!(kind, ShellKind::PowerShell);
    }

    #[test]
    fn shell_wins_when_no_windows_vars_present() {
        let env = env_of(&[("SHELL", "/bin/bash")]);
        let kind = ShellKind::detect_from_env(|k| env.get(k).cloned());
        assert_eq!(kind, ShellKind::Posix);
    }

    #[test]
    fn comspec_alone_selects_cmd() {
        let env = env_of(&[("COMSPEC", "C:\\Windows\\system32\\cmd.exe")]);
        let kind = ShellKind::detect_from_env(|k| env.get(k).cloned());
        assert_eq!(kind, ShellKind::Cmd);
    }
}
