use serde::Deserialize;
use serde::Serialize;
use strum_macros::Display;

/// The human's (or, when proxied, the parent's) decision on a pending
/// approval request: the one value that crosses from the approval UI
/// back into the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[strum(serialize_all = "snake_case")]
pub enum ReviewDecision {
    /// Approved for this single tool call only.
    #[serde(rename = "allow_once")]
    AllowedOnce,
    /// Approved, and a generated pattern should be added to the allowlist.
    #[serde(rename = "allow_always")]
    AllowedAlways,
    #[serde(rename = "deny")]
    Denied,
    /// The user aborted the whole batch; processing further tool calls in
    /// this batch must stop.
    #[serde(rename = "abort")]
    Aborted,
}

impl ReviewDecision {
    pub fn is_denial(self) -> bool {
        matches!(self, ReviewDecision::Denied)
    }
}
