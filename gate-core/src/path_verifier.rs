//! Path Verifier: turns an `ApprovedPath` capability into a file
//! descriptor, closing the TOCTOU window between approval and execution at
//! the type level. Never re-resolves a path after a security decision has
//! been made about it; instead opens with `O_NOFOLLOW` and compares the
//! live file identity against the one snapshotted at approval time.

use std::fs::File;
use std::fs::OpenOptions;
use std::path::Path;
use std::path::PathBuf;

use crate::error::GateErr;
use crate::protected_files::FileIdentity;

/// A path-bearing approval, bound to a single subsequent open. Constructed
/// by the orchestrator right after the user approves a path-bearing tool
/// call; consumed by exactly one of this module's open functions.
#[derive(Debug, Clone)]
pub struct ApprovedPath {
    pub original: PathBuf,
    pub resolved: PathBuf,
    pub existed_at_approval: bool,
    /// `Some` iff `existed_at_approval`: the file's own identity (not
    /// following a final symlink).
    pub identity: Option<FileIdentity>,
    /// `Some` iff `!existed_at_approval`: the parent directory's identity,
    /// checked again immediately before the atomic create.
    pub parent_identity: Option<FileIdentity>,
    pub parent_resolved: Option<PathBuf>,
    pub is_network_fs: bool,
}

impl ApprovedPath {
    /// Snapshots `path`'s current state. Called once, at approval time.
    pub fn snapshot(path: &Path) -> crate::Result<Self> {
        let resolved = path.to_path_buf();
        match std::fs::symlink_metadata(&resolved) {
            Ok(meta) => {
                let identity = FileIdentity::from_metadata(&meta);
                Ok(ApprovedPath {
                    original: path.to_path_buf(),
                    resolved: resolved.clone(),
                    existed_at_approval: true,
                    identity,
                    parent_identity: None,
                    parent_resolved: None,
                    is_network_fs: is_network_fs(&resolved),
                })
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let parent_resolved = resolved
                    .parent()
                    .map(Path::to_path_buf)
                    .filter(|p| !p.as_os_str().is_empty())
                    .unwrap_or_else(|| PathBuf::from("."));
                let parent_identity = FileIdentity::of(&parent_resolved);
                Ok(ApprovedPath {
                    original: path.to_path_buf(),
                    resolved,
                    existed_at_approval: false,
                    identity: None,
                    parent_identity,
                    is_network_fs: is_network_fs(&parent_resolved),
                    parent_resolved: Some(parent_resolved),
                })
            }
            Err(e) => Err(GateErr::Io(e)),
        }
    }
}

/// Opens an existing approved path with no-follow-at-final-component
/// semantics, then verifies the live identity matches the snapshot.
pub fn open_existing(approved: &ApprovedPath) -> crate::Result<File> {
    let file = open_no_follow(&approved.resolved).map_err(|e| classify_open_error(e, &approved.original))?;
    let live = FileIdentity::from_metadata(&file.metadata().map_err(GateErr::Io)?);
    if live != approved.identity {
        return Err(GateErr::PathChanged {
            path: approved.original.clone(),
        });
    }
    Ok(file)
}

/// Opens an existing approved path for overwrite (`write_file` on a path
/// that already existed at approval time), with the same no-follow and
/// identity-check protection as `open_existing`.
pub fn open_existing_for_write(approved: &ApprovedPath) -> crate::Result<File> {
    let mut options = OpenOptions::new();
    options.write(true).truncate(true);
    let file = open_with_options(&approved.resolved, &options).map_err(|e| classify_open_error(e, &approved.original))?;
    let live = FileIdentity::from_metadata(&file.metadata().map_err(GateErr::Io)?);
    if live != approved.identity {
        return Err(GateErr::PathChanged {
            path: approved.original.clone(),
        });
    }
    Ok(file)
}

/// Opens (or creates) an approved path in append mode, with the same
/// no-follow protection and identity check as `open_existing`.
pub fn open_for_append(approved: &ApprovedPath) -> crate::Result<File> {
    let mut options = OpenOptions::new();
    options.append(true);
    if !approved.existed_at_approval {
        options.create(true);
    }
    let file = open_with_options(&approved.resolved, &options).map_err(|e| classify_open_error(e, &approved.original))?;
    if approved.existed_at_approval {
        let live = FileIdentity::from_metadata(&file.metadata().map_err(GateErr::Io)?);
        if live != approved.identity {
            return Err(GateErr::PathChanged {
                path: approved.original.clone(),
            });
        }
    }
    Ok(file)
}

/// Creates a brand-new file through a freshly opened parent directory
/// descriptor, atomically (`O_CREAT|O_EXCL`), so the create itself fails
/// if something appeared at the target between approval and execution.
pub fn create_new(approved: &ApprovedPath) -> crate::Result<File> {
    let parent_resolved = approved
        .parent_resolved
        .as_ref()
        .ok_or_else(|| GateErr::InvalidConfig("create_new called on a path that existed at approval".into()))?;
    let parent_file = File::open(parent_resolved).map_err(GateErr::Io)?;
    let live_parent = FileIdentity::from_metadata(&parent_file.metadata().map_err(GateErr::Io)?);
    if live_parent != approved.parent_identity {
        return Err(GateErr::PathChanged {
            path: approved.original.clone(),
        });
    }
    let file_name = approved
        .resolved
        .file_name()
        .ok_or_else(|| GateErr::InvalidConfig("approved path has no file name".into()))?;

    create_exclusive_in_dir(&parent_file, file_name, &approved.resolved)
}

#[cfg(unix)]
fn open_no_follow(path: &Path) -> std::io::Result<File> {
    use std::os::unix::fs::OpenOptionsExt;
    OpenOptions::new().read(true).custom_flags(libc::O_NOFOLLOW).open(path)
}

#[cfg(windows)]
fn open_no_follow(path: &Path) -> std::io::Result<File> {
    use std::os::windows::fs::OpenOptionsExt;
    const FILE_FLAG_OPEN_REPARSE_POINT: u32 = 0x0020_0000;
    let file = OpenOptions::new()
        .read(true)
        .custom_flags(FILE_FLAG_OPEN_REPARSE_POINT)
        .open(path)?;
    if file.metadata()?.file_type().is_symlink() {
        return Err(std::io::Error::new(std::io::ErrorKind::Other, "reparse point at final component"));
    }
    Ok(file)
}

#[cfg(unix)]
fn open_with_options(path: &Path, options: &OpenOptions) -> std::io::Result<File> {
    use std::os::unix::fs::OpenOptionsExt;
    let mut options = options.clone();
    options.custom_flags(libc::O_NOFOLLOW).open(path)
}

#[cfg(windows)]
fn open_with_options(path: &Path, options: &OpenOptions) -> std::io::Result<File> {
    use std::os::windows::fs::OpenOptionsExt;
    const FILE_FLAG_OPEN_REPARSE_POINT: u32 = 0x0020_0000;
    let mut options = options.clone();
    let file = options.custom_flags(FILE_FLAG_OPEN_REPARSE_POINT).open(path)?;
    if file.metadata()?.file_type().is_symlink() {
        return Err(std::io::Error::new(std::io::ErrorKind::Other, "reparse point at final component"));
    }
    Ok(file)
}

#[cfg(unix)]
fn create_exclusive_in_dir(parent: &File, file_name: &std::ffi::OsStr, full_path_for_error: &Path) -> crate::Result<File> {
    use std::ffi::CString;
    use std::os::unix::ffi::OsStrExt;
    use std::os::unix::io::AsRawFd;
    use std::os::unix::io::FromRawFd;

    let name = CString::new(file_name.as_bytes())
        .map_err(|_| GateErr::InvalidConfig("file name contains a null byte".into()))?;
    // SAFETY: `parent` is a valid open directory descriptor owned by this
    // function for its whole lifetime; `openat` either returns a fresh
    // owned fd or -1, and we only call `from_raw_fd` in the former case.
    let fd = unsafe {
        libc::openat(
            parent.as_raw_fd(),
            name.as_ptr(),
            libc::O_CREAT | libc::O_EXCL | libc::O_NOFOLLOW | libc::O_WRONLY,
            0o644,
        )
    };
    if fd < 0 {
        let err = std::io::Error::last_os_error();
        return Err(classify_open_error(err, full_path_for_error));
    }
    Ok(unsafe { File::from_raw_fd(fd) })
}

#[cfg(windows)]
fn create_exclusive_in_dir(_parent: &File, _file_name: &std::ffi::OsStr, full_path_for_error: &Path) -> crate::Result<File> {
    // Windows has no exact equivalent of `openat` in std; `create_new`
    // against the full path is still atomic against a concurrent creator,
    // just not routed through the already-opened parent descriptor.
    OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(full_path_for_error)
        .map_err(|e| classify_open_error(e, full_path_for_error))
}

fn classify_open_error(err: std::io::Error, path: &Path) -> GateErr {
    if err.kind() == std::io::ErrorKind::AlreadyExists {
        return GateErr::AlreadyExists { path: path.to_path_buf() };
    }
    #[cfg(unix)]
    if err.raw_os_error() == Some(libc::ELOOP) {
        return GateErr::SymlinkRejected { path: path.to_path_buf() };
    }
    GateErr::Io(err)
}

/// Best-effort network-filesystem detection by mount type. A `false`
/// result does not guarantee a local filesystem — callers only
/// use this to decide whether to warn the user once, not to change
/// correctness-relevant behavior.
#[cfg(target_os = "linux")]
fn is_network_fs(path: &Path) -> bool {
    use std::ffi::CString;
    use std::os::unix::ffi::OsStrExt;

    const NFS_SUPER_MAGIC: i64 = 0x6969;
    const CIFS_MAGIC_NUMBER: i64 = 0xFF53_4D42_u32 as i64;
    const SMB2_MAGIC_NUMBER: i64 = 0xFE53_4D42_u32 as i64;

    let Some(cstr) = CString::new(path.as_os_str().as_bytes()).ok() else {
        return false;
    };
    let mut statfs: libc::statfs = unsafe { std::mem::zeroed() };
    let rc = unsafe { libc::statfs(cstr.as_ptr(), &mut statfs) };
    if rc != 0 {
        return false;
    }
    let fs_type = statfs.f_type as i64;
    matches!(fs_type, NFS_SUPER_MAGIC | CIFS_MAGIC_NUMBER | SMB2_MAGIC_NUMBER)
}

#[cfg(not(target_os = "linux"))]
fn is_network_fs(_path: &Path) -> bool {
    false
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use std::io::Write as _;

    #[test]
    fn snapshot_of_missing_path_records_parent_identity() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("out.txt");
        let approved = ApprovedPath::snapshot(&target).unwrap();
        assert!(!approved.existed_at_approval);
        assert!(approved.parent_identity.is_some());
    }

    #[test]
    fn create_new_succeeds_when_nothing_races() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("out.txt");
        let approved = ApprovedPath::snapshot(&target).unwrap();
        let mut file = create_new(&approved).unwrap();
        file.write_all(b"hello").unwrap();
        assert_eq!(std::fs::read_to_string(&target).unwrap(), "hello");
    }

    #[test]
    fn create_new_fails_when_target_appears_after_approval() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("out.txt");
        let approved = ApprovedPath::snapshot(&target).unwrap();
        std::fs::write(&target, "raced").unwrap();
        let result = create_new(&approved);
        assert!(matches!(result, Err(GateErr::AlreadyExists { .. })));
    }

    #[test]
    fn open_existing_detects_identity_change() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("out.txt");
        std::fs::write(&target, "original").unwrap();
        let approved = ApprovedPath::snapshot(&target).unwrap();

        std::fs::remove_file(&target).unwrap();
        std::fs::write(&target, "replaced").unwrap();

        let result = open_existing(&approved);
        assert!(matches!(result, Err(GateErr::PathChanged { .. })));
    }

    #[cfg(unix)]
    #[test]
    fn open_existing_rejects_symlink_swap() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("out.txt");
        std::fs::write(&target, "original").unwrap();
        let approved = ApprovedPath::snapshot(&target).unwrap();

        let secret = dir.path().join("secret.txt");
        std::fs::write(&secret, "private").unwrap();
        std::fs::remove_file(&target).unwrap();
        std::os::unix::fs::symlink(&secret, &target).unwrap();

        let result = open_existing(&approved);
        assert!(matches!(
            result,
            Err(GateErr::SymlinkRejected { .. }) | Err(GateErr::PathChanged { .. })
        ));
    }
}
