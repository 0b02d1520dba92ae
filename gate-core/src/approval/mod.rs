//! Approval UI / Approval Channel: two implementations of one small
//! capability interface — a direct TTY prompter for the root process
//! (`tty`) and an IPC proxy for sub-agent processes (`ipc`) — plus the
//! shared pattern-generation logic (`pattern`) used by both when the user
//! picks "allow always". The TTY surface is a plain line-oriented prompt,
//! not a full-screen widget.

pub mod ipc;
pub mod pattern;
pub mod tty;

use gate_protocol::ReviewDecision;

pub use ipc::SubagentClient;
pub use tty::TtyApprover;

/// What the orchestrator shows the user (or forwards to the parent) when
/// asking for a decision.
#[derive(Debug, Clone)]
pub struct ApprovalPrompt {
    pub tool: String,
    pub summary: String,
    /// `Some` when this prompt originated from a sub-agent; displayed
    /// alongside the prompt so the user knows which process asked.
    pub subagent_pid: Option<u32>,
    /// Precomputed by the orchestrator (via `pattern::{path,shell,url}_pattern`)
    /// from the tool call's match-target. `None` for tools with no
    /// generatable pattern (e.g. Python-category tools), in which case
    /// "allow always" degrades to "allow once" for this call.
    pub suggested_pattern: Option<String>,
}

/// The result of a single approval round: a decision plus, for
/// `AllowedAlways`, the pattern to add to the allowlist.
#[derive(Debug, Clone)]
pub struct ApprovalOutcome {
    pub decision: ReviewDecision,
    pub pattern: Option<String>,
}

/// The capability interface the orchestrator calls through — identical
/// whether the concrete implementation prompts a local TTY or proxies to a
/// parent process over IPC.
pub trait ApprovalChannel {
    fn request_approval(&mut self, prompt: ApprovalPrompt) -> crate::Result<ApprovalOutcome>;
}
