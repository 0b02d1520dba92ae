//! Wire vocabulary shared by every crate that sits on either side of the
//! approval-gate trust boundary: the gate orchestrator, the root process's
//! TTY approver, and a sub-agent's IPC client all depend on this crate
//! instead of on each other.

mod error_kind;
mod ipc;
mod review;
mod shell;
mod toolcall;

pub use error_kind::GateErrorKind;
pub use ipc::ApprovalRequest;
pub use ipc::ApprovalResponse;
pub use ipc::IPC_MAX_MESSAGE_BYTES;
pub use review::ReviewDecision;
pub use shell::ShellKind;
pub use toolcall::GateAction;
pub use toolcall::GateCategory;
pub use toolcall::ToolCall;
