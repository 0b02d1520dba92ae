//! A minimal `ToolExecutor` wired to the `gate` binary so the gate can be
//! exercised end-to-end from a shell. A real agent supplies its own
//! executor; this one only proves the verified handle is usable.

use std::io::Read;
use std::io::Write;
use std::process::Command;

use gate_core::orchestrator::ExecutionHandle;
use gate_core::orchestrator::ToolExecutor;
use gate_protocol::ToolCall;

pub struct DemoExecutor;

impl DemoExecutor {
    pub fn new() -> Self {
        DemoExecutor
    }
}

impl Default for DemoExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolExecutor for DemoExecutor {
    fn execute(&mut self, tool: &ToolCall, handle: ExecutionHandle) -> serde_json::Value {
        match handle {
            ExecutionHandle::File(mut file) => match tool.name.as_str() {
                "read_file" => {
                    let mut contents = String::new();
                    match file.read_to_string(&mut contents) {
                        Ok(_) => serde_json::json!({"content": contents}),
                        Err(e) => serde_json::json!({"error": "io_error", "message": e.to_string()}),
                    }
                }
                "write_file" | "append_file" => {
                    let content = tool.arg_str("content").unwrap_or("");
                    match file.write_all(content.as_bytes()) {
                        Ok(()) => serde_json::json!({"ok": true, "bytes_written": content.len()}),
                        Err(e) => serde_json::json!({"error": "io_error", "message": e.to_string()}),
                    }
                }
                "delete_file" => {
                    drop(file);
                    match tool.arg_str("path").map(std::fs::remove_file) {
                        Some(Ok(())) => serde_json::json!({"ok": true}),
                        Some(Err(e)) => serde_json::json!({"error": "io_error", "message": e.to_string()}),
                        None => serde_json::json!({"error": "missing_path"}),
                    }
                }
                other => serde_json::json!({"error": "unsupported_tool", "tool": other}),
            },
            ExecutionHandle::ShellCommand(parsed) => {
                let Some(program) = parsed.tokens.first() else {
                    return serde_json::json!({"error": "empty_command"});
                };
                match Command::new(program).args(&parsed.tokens[1..]).output() {
                    Ok(output) => serde_json::json!({
                        "status": output.status.code(),
                        "stdout": String::from_utf8_lossy(&output.stdout),
                        "stderr": String::from_utf8_lossy(&output.stderr),
                    }),
                    Err(e) => serde_json::json!({"error": "spawn_failed", "message": e.to_string()}),
                }
            }
            ExecutionHandle::None => {
                serde_json::json!({"ok": true, "note": "no-op for this tool category in the demo executor"})
            }
        }
    }
}
