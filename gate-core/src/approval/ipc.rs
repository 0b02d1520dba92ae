//! Sub-agent IPC proxy: one NUL-terminated JSON message per direction per
//! pipe. `SubagentClient` is the sub-agent side (blocks on its response
//! pipe with a timeout); `ParentMultiplexer` is the parent side, polling
//! its own TTY readiness alongside every open sub-agent request pipe with
//! a single `mio::Poll` instance, a select-over-readiness-sources loop
//! that works without an async runtime driving the root process.

use std::collections::HashMap;
use std::io::Read;
use std::io::Write;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use gate_protocol::ApprovalRequest;
use gate_protocol::ApprovalResponse;
use gate_protocol::IPC_MAX_MESSAGE_BYTES;

use super::ApprovalOutcome;
use crate::error::GateErr;

/// Default sub-agent approval timeout: 300s (5m).
pub const DEFAULT_SUBAGENT_TIMEOUT: Duration = Duration::from_secs(300);

/// Serializes `req`, truncating `summary` with an ellipsis marker if the
/// encoded message would exceed `IPC_MAX_MESSAGE_BYTES`, then appends the
/// NUL frame terminator.
fn encode_request(req: &ApprovalRequest) -> crate::Result<Vec<u8>> {
    let mut req = req.clone();
    loop {
        let mut bytes = serde_json::to_vec(&req)?;
        bytes.push(0);
        if bytes.len() <= IPC_MAX_MESSAGE_BYTES || req.summary.is_empty() {
            return Ok(bytes);
        }
        let keep = req.summary.len().saturating_sub((bytes.len() - IPC_MAX_MESSAGE_BYTES) + 1);
        let keep = keep.min(req.summary.len());
        let mut truncated: String = req.summary.chars().take(keep).collect();
        truncated.push('\u{2026}');
        req.summary = truncated;
    }
}

fn encode_response(resp: &ApprovalResponse) -> crate::Result<Vec<u8>> {
    let mut bytes = serde_json::to_vec(resp)?;
    bytes.push(0);
    Ok(bytes)
}

/// Reads one NUL-terminated frame, or `Ok(None)` on a clean EOF before any
/// bytes arrived. A bound of `2 * IPC_MAX_MESSAGE_BYTES` guards against a
/// misbehaving peer that never sends a NUL.
fn read_framed<R: Read>(reader: &mut R) -> std::io::Result<Option<Vec<u8>>> {
    let mut buf = Vec::new();
    let mut byte = [0u8; 1];
    loop {
        match reader.read(&mut byte) {
            Ok(0) => {
                return if buf.is_empty() { Ok(None) } else { Ok(Some(buf)) };
            }
            Ok(_) => {
                if byte[0] == 0 {
                    return Ok(Some(buf));
                }
                buf.push(byte[0]);
                if buf.len() > 2 * IPC_MAX_MESSAGE_BYTES {
                    return Err(std::io::Error::new(
                        std::io::ErrorKind::InvalidData,
                        "ipc frame exceeded maximum size without a terminator",
                    ));
                }
            }
            Err(e) => return Err(e),
        }
    }
}

/// Sub-agent side of the channel. Owns the write end of its request pipe
/// directly; a background thread owns the read end of its response pipe
/// and forwards complete `ApprovalResponse` frames over an `mpsc` channel,
/// so `request_approval` can wait on it with a deadline.
pub struct SubagentClient {
    writer: Box<dyn Write + Send>,
    responses: mpsc::Receiver<ApprovalResponse>,
    next_request_id: u32,
    timeout: Duration,
}

impl SubagentClient {
    pub fn spawn<R, W>(reader: R, writer: W, timeout: Duration) -> Self
    where
        R: Read + Send + 'static,
        W: Write + Send + 'static,
    {
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let mut reader = reader;
            loop {
                match read_framed(&mut reader) {
                    Ok(Some(bytes)) => {
                        if let Ok(resp) = serde_json::from_slice::<ApprovalResponse>(&bytes) {
                            if tx.send(resp).is_err() {
                                break;
                            }
                        }
                    }
                    _ => break,
                }
            }
        });
        SubagentClient {
            writer: Box::new(writer),
            responses: rx,
            next_request_id: 0,
            timeout,
        }
    }

    /// Sends an `ApprovalRequest` and blocks for at most `self.timeout`.
    /// On timeout, the sub-agent must treat the request as denied — the
    /// caller sees this as `Err(GateErr::ApprovalTimeout)` and the
    /// orchestrator maps it to a denial.
    pub fn request_approval(&mut self, tool: &str, arguments: &str, summary: &str) -> crate::Result<ApprovalOutcome> {
        self.next_request_id = self.next_request_id.wrapping_add(1);
        let request_id = self.next_request_id;
        let req = ApprovalRequest {
            request_id,
            tool: tool.to_string(),
            arguments: arguments.to_string(),
            summary: summary.to_string(),
        };
        let bytes = encode_request(&req)?;
        self.writer.write_all(&bytes).map_err(GateErr::Io)?;
        self.writer.flush().map_err(GateErr::Io)?;

        let deadline = std::time::Instant::now() + self.timeout;
        loop {
            let remaining = deadline.saturating_duration_since(std::time::Instant::now());
            if remaining.is_zero() {
                return Err(GateErr::ApprovalTimeout);
            }
            match self.responses.recv_timeout(remaining) {
                Ok(resp) if resp.request_id == request_id => {
                    return Ok(ApprovalOutcome {
                        decision: resp.decision,
                        pattern: resp.pattern,
                    });
                }
                // A response for a stale or mismatched request_id: the
                // parent and sub-agent have drifted (a dropped message);
                // keep waiting for ours until the deadline.
                Ok(_) => continue,
                Err(_) => return Err(GateErr::ApprovalTimeout),
            }
        }
    }
}

#[cfg(unix)]
pub use unix_parent::ParentMultiplexer;
#[cfg(unix)]
pub use unix_parent::PendingSubagentRequest;

#[cfg(unix)]
mod unix_parent {
    use super::*;
    use mio::unix::pipe::Receiver as PipeReceiver;
    use mio::unix::pipe::Sender as PipeSender;
    use mio::unix::SourceFd;
    use mio::Events;
    use mio::Interest;
    use mio::Poll;
    use mio::Token;

    const TTY_TOKEN: Token = Token(0);

    struct SubagentConnection {
        pid: u32,
        request_reader: PipeReceiver,
        response_writer: PipeSender,
        buffer: Vec<u8>,
    }

    pub struct PendingSubagentRequest {
        pub token: Token,
        pub pid: u32,
        pub request: ApprovalRequest,
    }

    /// Parent-process side: one `mio::Poll` instance multiplexing stdin
    /// (token 0) with every registered sub-agent's request pipe. At most
    /// one approval prompt is serviced at a time; this type only surfaces
    /// readiness, it doesn't itself serialize prompts.
    pub struct ParentMultiplexer {
        poll: Poll,
        events: Events,
        subagents: HashMap<Token, SubagentConnection>,
        next_token: usize,
    }

    impl ParentMultiplexer {
        pub fn new() -> std::io::Result<Self> {
            let poll = Poll::new()?;
            poll.registry()
                .register(&mut SourceFd(&0), TTY_TOKEN, Interest::READABLE)?;
            Ok(ParentMultiplexer {
                poll,
                events: Events::with_capacity(16),
                subagents: HashMap::new(),
                next_token: 1,
            })
        }

        pub fn register_subagent(
            &mut self,
            pid: u32,
            mut request_reader: PipeReceiver,
            response_writer: PipeSender,
        ) -> std::io::Result<Token> {
            let token = Token(self.next_token);
            self.next_token += 1;
            self.poll
                .registry()
                .register(&mut request_reader, token, Interest::READABLE)?;
            self.subagents.insert(
                token,
                SubagentConnection {
                    pid,
                    request_reader,
                    response_writer,
                    buffer: Vec::new(),
                },
            );
            Ok(token)
        }

        pub fn deregister_subagent(&mut self, token: Token) -> std::io::Result<()> {
            if let Some(mut conn) = self.subagents.remove(&token) {
                self.poll.registry().deregister(&mut conn.request_reader)?;
            }
            Ok(())
        }

        /// Polls once with a ~100ms bounded timeout. Returns whether the
        /// TTY became readable, plus every complete
        /// sub-agent request frame that arrived.
        pub fn poll_once(
            &mut self,
            timeout: Duration,
        ) -> std::io::Result<(bool, Vec<PendingSubagentRequest>)> {
            self.poll.poll(&mut self.events, Some(timeout))?;

            let mut tty_ready = false;
            let mut ready_tokens = Vec::new();
            for event in self.events.iter() {
                if event.token() == TTY_TOKEN {
                    tty_ready = true;
                } else {
                    ready_tokens.push(event.token());
                }
            }

            let mut pending = Vec::new();
            for token in ready_tokens {
                if let Some(conn) = self.subagents.get_mut(&token) {
                    let mut chunk = [0u8; 256];
                    loop {
                        match conn.request_reader.read(&mut chunk) {
                            Ok(0) => break,
                            Ok(n) => conn.buffer.extend_from_slice(&chunk[..n]),
                            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => break,
                            Err(e) => return Err(e),
                        }
                    }
                    while let Some(nul_idx) = conn.buffer.iter().position(|b| *b == 0) {
                        let frame: Vec<u8> = conn.buffer.drain(..=nul_idx).collect();
                        let frame = &frame[..frame.len() - 1];
                        if let Ok(request) = serde_json::from_slice::<ApprovalRequest>(frame) {
                            pending.push(PendingSubagentRequest {
                                token,
                                pid: conn.pid,
                                request,
                            });
                        }
                    }
                }
            }
            Ok((tty_ready, pending))
        }

        /// Sends the parent's decision back to the sub-agent that asked.
        /// When the decision is `AllowedAlways`, the caller is responsible
        /// for adding the pattern to the *parent's own* session allowlist
        /// before calling this — this method only delivers the wire
        /// message.
        pub fn respond(&mut self, token: Token, response: &ApprovalResponse) -> crate::Result<()> {
            let Some(conn) = self.subagents.get_mut(&token) else {
                return Ok(());
            };
            let bytes = encode_response(response)?;
            conn.response_writer.write_all(&bytes).map_err(GateErr::Io)?;
            Ok(())
        }
    }
}
