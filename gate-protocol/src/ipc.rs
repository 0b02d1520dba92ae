use serde::Deserialize;
use serde::Serialize;

/// Upper bound on a serialized IPC message. Longer argument summaries must
/// be truncated with an ellipsis marker before the message is built, not
/// after — see `gate-core::approval::ipc`.
pub const IPC_MAX_MESSAGE_BYTES: usize = 4096;

/// A sub-agent's request for a human decision, written NUL-terminated to
/// its write end of the request pipe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalRequest {
    pub request_id: u32,
    pub tool: String,
    pub arguments: String,
    pub summary: String,
}

/// The parent's reply, written NUL-terminated to the sub-agent's response
/// pipe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalResponse {
    pub request_id: u32,
    pub decision: crate::ReviewDecision,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub pattern: Option<String>,
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::ReviewDecision;

    #[test]
    fn request_round_trips_as_json() {
        let req = ApprovalRequest {
            request_id: 7,
            tool: "write_file".to_string(),
            arguments: "{\"path\":\"src/new.c\"}".to_string(),
            summary: "write src/new.c".to_string(),
        };
        let json = serde_json::to_string(&req).unwrap();
        let back: ApprovalRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(req, back);
    }

    #[test]
    fn response_omits_pattern_when_absent() {
        let resp = ApprovalResponse {
            request_id: 7,
            decision: ReviewDecision::Denied,
            pattern: None,
        };
        let json = serde_json::to_string(&resp).unwrap();
        assert!(!json.contains("pattern"));
    }
}
