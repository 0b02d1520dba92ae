use serde::Deserialize;
use serde::Serialize;
use strum_macros::Display;
use strum_macros::EnumString;

/// Discriminant for every way a tool call can fail to reach the executor.
/// This is the `kind` field of the structured JSON object the gate returns
/// to the tool executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum GateErrorKind {
    /// Hard block; never overridable regardless of config or yolo mode.
    ProtectedFile,
    /// The user (or proxying parent) refused; tracked for rate limiting.
    OperationDenied,
    /// Backed off; `retry_after` on the error object is populated.
    RateLimited,
    /// TOCTOU verification failed between approval and execution.
    PathChanged,
    /// The final path component was a symlink/reparse point.
    SymlinkRejected,
    /// Atomic creation of a new file raced with another writer.
    AlreadyExists,
    /// The shell command matched a dangerous pattern.
    DangerousCommand,
    /// stdin is not a TTY and no approval channel is present.
    NonInteractiveGate,
    /// A sub-agent received no response within its approval deadline.
    ApprovalTimeout,
    /// The user aborted the containing batch.
    Aborted,
    /// Configuration was rejected at load time; fatal to the session.
    InvalidConfig,
}

impl GateErrorKind {
    /// `true` for the two kinds that must propagate past the orchestrator to
    /// terminate the session/batch rather than being handed to the model as
    /// a tool result.
    pub fn terminates_session(self) -> bool {
        matches!(self, GateErrorKind::InvalidConfig | GateErrorKind::Aborted)
    }
}
