//! Error taxonomy for the gate: one `thiserror` variant per error kind,
//! plus `#[error(transparent)]` conversions for the handful of external
//! error types this crate actually produces (`io::Error`,
//! `serde_json::Error`).

use std::path::PathBuf;

use gate_protocol::GateErrorKind;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, GateErr>;

#[derive(Error, Debug)]
pub enum GateErr {
    #[error("refusing to modify protected file: {path}")]
    ProtectedFile { path: PathBuf },

    #[error("operation denied by user")]
    OperationDenied,

    #[error("rate limited; retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("path changed between approval and execution: {path}")]
    PathChanged { path: PathBuf },

    #[error("refusing to follow symlink at final path component: {path}")]
    SymlinkRejected { path: PathBuf },

    #[error("file appeared between approval and creation: {path}")]
    AlreadyExists { path: PathBuf },

    #[error("command matched a dangerous pattern: {reason}")]
    DangerousCommand { reason: String },

    #[error("stdin is not a tty and no approval channel is available")]
    NonInteractiveGate,

    #[error("sub-agent approval request timed out")]
    ApprovalTimeout,

    #[error("aborted by user")]
    Aborted,

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl GateErr {
    pub fn kind(&self) -> GateErrorKind {
        match self {
            GateErr::ProtectedFile { .. } => GateErrorKind::ProtectedFile,
            GateErr::OperationDenied => GateErrorKind::OperationDenied,
            GateErr::RateLimited { .. } => GateErrorKind::RateLimited,
            GateErr::PathChanged { .. } => GateErrorKind::PathChanged,
            GateErr::SymlinkRejected { .. } => GateErrorKind::SymlinkRejected,
            GateErr::AlreadyExists { .. } => GateErrorKind::AlreadyExists,
            GateErr::DangerousCommand { .. } => GateErrorKind::DangerousCommand,
            GateErr::NonInteractiveGate => GateErrorKind::NonInteractiveGate,
            GateErr::ApprovalTimeout => GateErrorKind::ApprovalTimeout,
            GateErr::Aborted => GateErrorKind::Aborted,
            GateErr::InvalidConfig(_) => GateErrorKind::InvalidConfig,
            // Bare I/O and JSON errors only ever occur while evaluating a
            // path-bearing or config-bearing operation; surface them as
            // configuration failures since they are not one of the
            // spec-named recoverable kinds.
            GateErr::Io(_) | GateErr::Json(_) => GateErrorKind::InvalidConfig,
        }
    }

    /// Builds the structured JSON object returned to the tool executor:
    /// always `error` + `message`, with `path` / `retry_after` added for
    /// the kinds that carry them.
    pub fn to_tool_result(&self) -> serde_json::Value {
        let mut obj = serde_json::json!({
            "error": self.kind().to_string(),
            "message": self.to_string(),
        });
        if let Some(map) = obj.as_object_mut() {
            match self {
                GateErr::ProtectedFile { path }
                | GateErr::PathChanged { path }
                | GateErr::SymlinkRejected { path }
                | GateErr::AlreadyExists { path } => {
                    map.insert("path".to_string(), serde_json::json!(path));
                }
                GateErr::RateLimited { retry_after_secs } => {
                    map.insert(
                        "retry_after".to_string(),
                        serde_json::json!(retry_after_secs),
                    );
                }
                _ => {}
            }
        }
        obj
    }

    /// `true` for the two kinds that must propagate past the orchestrator
    /// instead of being handed to the model as a tool result.
    pub fn terminates_session(&self) -> bool {
        self.kind().terminates_session()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    #[test]
    fn protected_file_result_includes_path() {
        let err = GateErr::ProtectedFile {
            path: PathBuf::from("ralph.config.json"),
        };
        let result = err.to_tool_result();
        assert_eq!(result["error"], "protected_file");
        assert_eq!(result["path"], "ralph.config.json");
    }

    #[test]
    fn rate_limited_result_includes_retry_after() {
        let err = GateErr::RateLimited {
            retry_after_secs: 5,
        };
        let result = err.to_tool_result();
        assert_eq!(result["error"], "rate_limited");
        assert_eq!(result["retry_after"], 5);
    }

    #[test]
    fn only_invalid_config_and_aborted_terminate_session() {
        assert!(GateErr::InvalidConfig("bad".into()).terminates_session());
        assert!(GateErr::Aborted.terminates_session());
        assert!(!GateErr::OperationDenied.terminates_session());
        assert!(!GateErr::RateLimited { retry_after_secs: 5 }.terminates_session());
    }
}
