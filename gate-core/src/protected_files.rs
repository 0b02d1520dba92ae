//! Protected-File Registry. Determines whether a path refers to a file
//! that is hard-blocked from modification, regardless of gate
//! configuration or "yolo" mode. Owns a periodically refreshed identity
//! cache and uses `wildmatch` for the glob stage.

use std::cell::RefCell;
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;
use std::time::Instant;

use wildmatch::WildMatch;

use crate::normalize::NormalizedPath;

/// Identifies a file regardless of the path used to reach it. POSIX uses
/// device+inode; Windows uses volume serial + file index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileIdentity {
    pub device_or_volume: u64,
    pub index_hi: u64,
    pub index_lo: u64,
}

impl FileIdentity {
    #[cfg(unix)]
    pub fn from_metadata(meta: &std::fs::Metadata) -> Option<Self> {
        use std::os::unix::fs::MetadataExt;
        Some(FileIdentity {
            device_or_volume: meta.dev(),
            index_hi: 0,
            index_lo: meta.ino(),
        })
    }

    #[cfg(windows)]
    pub fn from_metadata(meta: &std::fs::Metadata) -> Option<Self> {
        use std::os::windows::fs::MetadataExt;
        let index = meta.file_index()?;
        let volume = meta.volume_serial_number()? as u64;
        Some(FileIdentity {
            device_or_volume: volume,
            index_hi: index >> 32,
            index_lo: index & 0xffff_ffff,
        })
    }

    #[cfg(not(any(unix, windows)))]
    pub fn from_metadata(_meta: &std::fs::Metadata) -> Option<Self> {
        None
    }

    /// Identity following a final-component symlink, matching ordinary
    /// path resolution.
    pub fn of(path: &Path) -> Option<Self> {
        let meta = std::fs::metadata(path).ok()?;
        Self::from_metadata(&meta)
    }

    /// Identity of `path` itself, even when `path` is a symlink — the
    /// same thing an `O_NOFOLLOW` open would stat. Used by the path
    /// verifier to snapshot identity without ever resolving through a
    /// symlink at the final component.
    pub fn of_no_follow(path: &Path) -> Option<Self> {
        let meta = std::fs::symlink_metadata(path).ok()?;
        Self::from_metadata(&meta)
    }
}

/// Default refresh interval (at least every 30s).
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(30);

/// Number of ancestor directories (beyond the current directory itself)
/// scanned for protected basenames when building the identity cache.
const PARENT_SCAN_DEPTH: usize = 3;

struct IdentityCache {
    identities: HashSet<FileIdentity>,
    refreshed_at: Option<Instant>,
}

pub struct ProtectedFileRegistry {
    exact_basenames: Vec<String>,
    prefix_basenames: Vec<String>,
    globs: Vec<WildMatch>,
    cache_ttl: Duration,
    cache: RefCell<IdentityCache>,
}

impl Default for ProtectedFileRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_TTL)
    }
}

impl ProtectedFileRegistry {
    pub fn new(cache_ttl: Duration) -> Self {
        ProtectedFileRegistry {
            exact_basenames: vec!["ralph.config.json".to_string(), ".env".to_string()],
            prefix_basenames: vec![".env.".to_string()],
            globs: vec![WildMatch::new("**/ralph.config.json"), WildMatch::new(".ralph/config.json")],
            cache_ttl,
            cache: RefCell::new(IdentityCache {
                identities: HashSet::new(),
                refreshed_at: None,
            }),
        }
    }

    /// Stages 1–3: basename/prefix/glob matching against the path string
    /// alone, no filesystem access required.
    fn matches_by_name(&self, normalized: &NormalizedPath) -> bool {
        let basename = normalized.basename();
        if self.exact_basenames.iter().any(|b| b == basename) {
            return true;
        }
        if self.prefix_basenames.iter().any(|p| basename.starts_with(p.as_str())) {
            return true;
        }
        self.globs.iter().any(|g| g.matches(normalized.as_str()))
    }

    /// Stage 4: the file's identity matches something discovered while
    /// scanning the cwd and its ancestors for protected basenames. This is
    /// what defeats symlink/hardlink tricks that stage 1–3 would miss.
    fn matches_by_identity(&self, path: &Path) -> bool {
        self.refresh_if_stale(path);
        match FileIdentity::of(path) {
            Some(identity) => self.cache.borrow().identities.contains(&identity),
            None => false,
        }
    }

    fn refresh_if_stale(&self, start_dir_hint: &Path) {
        let stale = {
            let cache = self.cache.borrow();
            match cache.refreshed_at {
                Some(t) => t.elapsed() >= self.cache_ttl,
                None => true,
            }
        };
        if stale {
            self.refresh(start_dir_hint);
        }
    }

    /// Forces a rescan regardless of staleness. The orchestrator calls this
    /// immediately before any batch of file-write tool calls.
    pub fn force_refresh(&self, cwd: &Path) {
        self.refresh(cwd);
    }

    fn refresh(&self, path_hint: &Path) {
        let start = if path_hint.is_dir() {
            path_hint.to_path_buf()
        } else {
            path_hint
                .parent()
                .map(|p| p.to_path_buf())
                .unwrap_or_else(|| path_hint.to_path_buf())
        };

        let mut identities = HashSet::new();
        let mut dir = Some(start.as_path());
        for _ in 0..=PARENT_SCAN_DEPTH {
            let Some(d) = dir else { break };
            if let Ok(entries) = std::fs::read_dir(d) {
                for entry in entries.flatten() {
                    let name = entry.file_name();
                    let name = name.to_string_lossy();
                    let is_protected_name = self.exact_basenames.iter().any(|b| b == name.as_ref())
                        || self.prefix_basenames.iter().any(|p| name.starts_with(p.as_str()));
                    if is_protected_name
                        && let Some(identity) = FileIdentity::of(&entry.path())
                    {
                        identities.insert(identity);
                    }
                }
            }
            dir = d.parent();
        }

        let mut cache = self.cache.borrow_mut();
        cache.identities = identities;
        cache.refreshed_at = Some(Instant::now());
    }

    /// `true` iff `path` refers to a protected file. Callers must treat
    /// `true` as an unconditional, non-overridable block.
    pub fn is_protected(&self, path: &Path) -> bool {
        let Ok(normalized) = NormalizedPath::new(&path.to_string_lossy()) else {
            // An unparseable path can't be opened anyway; let the path
            // verifier reject it downstream rather than silently trusting it.
            return false;
        };
        if self.matches_by_name(&normalized) {
            return true;
        }
        self.matches_by_identity(path)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use std::fs;

    #[test]
    fn exact_basename_is_protected() {
        let reg = ProtectedFileRegistry::default();
        assert!(reg.is_protected(Path::new("ralph.config.json")));
        assert!(reg.is_protected(Path::new("sub/dir/ralph.config.json")));
    }

    #[test]
    fn env_prefix_is_protected() {
        let reg = ProtectedFileRegistry::default();
        assert!(reg.is_protected(Path::new(".env")));
        assert!(reg.is_protected(Path::new(".env.production")));
        assert!(!reg.is_protected(Path::new("environment.txt")));
    }

    #[test]
    fn ordinary_file_is_not_protected() {
        let reg = ProtectedFileRegistry::default();
        assert!(!reg.is_protected(Path::new("src/main.rs")));
    }

    #[test]
    fn symlink_to_protected_file_is_caught_by_identity_cache() {
        let dir = tempfile::tempdir().unwrap();
        let real = dir.path().join("ralph.config.json");
        fs::write(&real, "{}").unwrap();

        let link_dir = dir.path().join("elsewhere");
        fs::create_dir(&link_dir).unwrap();
        let link = link_dir.join("innocuous.json");
        #[cfg(unix)]
        std::os::unix::fs::symlink(&real, &link).unwrap();
        #[cfg(windows)]
        std::os::windows::fs::symlink_file(&real, &link).unwrap();

        let reg = ProtectedFileRegistry::default();
        reg.force_refresh(dir.path());
        // The link's basename doesn't match any protected pattern, but its
        // resolved identity (through the symlink) equals the real file's.
        assert!(reg.is_protected(&link));
    }

    #[test]
    fn force_refresh_picks_up_files_created_after_first_scan() {
        let dir = tempfile::tempdir().unwrap();
        let reg = ProtectedFileRegistry::default();
        reg.force_refresh(dir.path());

        let real = dir.path().join("ralph.config.json");
        fs::write(&real, "{}").unwrap();
        let link = dir.path().join("looks_fine.txt");
        #[cfg(unix)]
        std::os::unix::fs::symlink(&real, &link).unwrap();
        #[cfg(windows)]
        std::os::windows::fs::symlink_file(&real, &link).unwrap();

        reg.force_refresh(dir.path());
        assert!(reg.is_protected(&link));
    }
}
