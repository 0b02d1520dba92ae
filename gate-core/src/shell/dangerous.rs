//! Universal dangerous-pattern list and the PowerShell dangerous-cmdlet
//! table. These apply regardless of which tokenizer produced the command
//! and always set `is_dangerous`, independent of the hazard flags.

/// Substrings that, found anywhere in the raw (un-tokenized) command text,
/// mark it dangerous regardless of shell. Matching on the raw text rather
/// than tokens is deliberate: these are meant to catch the command even
/// when wrapped in `bash -lc "..."` or similar.
const UNIVERSAL_DANGEROUS_SUBSTRINGS: &[&str] = &[
    "rm -rf",
    "rm -fr",
    "chmod 777",
    "chmod -R",
    ":(){:|:&};:",
];

/// Regex-shaped patterns that need more than a substring check.
fn matches_dangerous_regex_like(raw: &str) -> bool {
    // `> /dev/sd*`
    if let Some(idx) = raw.find("> /dev/sd") {
        let _ = idx;
        return true;
    }
    // `dd if=... of=/dev/...`
    if raw.contains("dd ") && raw.contains("if=") && raw.contains("of=/dev/") {
        return true;
    }
    // `curl ... | ...sh` / `wget ... | ...sh`
    if (raw.contains("curl ") || raw.contains("wget ")) && raw.contains('|') {
        for part in raw.split('|').skip(1) {
            let trimmed = part.trim();
            if trimmed.ends_with("sh")
                && (trimmed.starts_with("sh")
                    || trimmed.starts_with("bash")
                    || trimmed.starts_with("zsh")
                    || trimmed.contains(" sh")
                    || trimmed.contains(" bash"))
            {
                return true;
            }
        }
    }
    false
}

pub fn is_universally_dangerous(raw: &str) -> bool {
    UNIVERSAL_DANGEROUS_SUBSTRINGS
        .iter()
        .any(|pat| raw.contains(pat))
        || matches_dangerous_regex_like(raw)
}

/// Cmdlets (and their short aliases) that always force `is_dangerous` for
/// PowerShell, matched case-insensitively as a substring of the raw command.
const DANGEROUS_POWERSHELL_CMDLETS: &[&str] = &[
    "invoke-expression",
    "invoke-command",
    "iex",
    "icm",
    "-encodedcommand",
    "downloadstring",
    "downloadfile",
];

pub fn matches_dangerous_powershell_cmdlet(raw: &str) -> bool {
    let lower = raw.to_ascii_lowercase();
    DANGEROUS_POWERSHELL_CMDLETS
        .iter()
        .any(|needle| lower.contains(needle))
}
