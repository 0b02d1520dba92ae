//! Direct TTY prompter (root process only). The only place in this
//! crate allowed to write to stdout — everywhere else uses
//! `tracing`, per the `#![deny(clippy::print_stdout, clippy::print_stderr)]`
//! at the crate root.

use std::io::BufRead;
use std::io::IsTerminal;
use std::io::Write;

use gate_protocol::ReviewDecision;

use super::ApprovalChannel;
use super::ApprovalOutcome;
use super::ApprovalPrompt;
use crate::error::GateErr;

pub struct TtyApprover;

impl TtyApprover {
    pub fn new() -> Self {
        TtyApprover
    }

    fn is_available() -> bool {
        std::io::stdin().is_terminal()
    }
}

impl Default for TtyApprover {
    fn default() -> Self {
        Self::new()
    }
}

#[allow(clippy::print_stdout)]
impl ApprovalChannel for TtyApprover {
    fn request_approval(&mut self, prompt: ApprovalPrompt) -> crate::Result<ApprovalOutcome> {
        if !Self::is_available() {
            return Err(GateErr::NonInteractiveGate);
        }

        let stdin = std::io::stdin();
        let mut lines = stdin.lock().lines();

        loop {
            println!("--- approval requested ---");
            if let Some(pid) = prompt.subagent_pid {
                println!("from sub-agent pid {pid}");
            }
            println!("tool: {}", prompt.tool);
            println!("{}", prompt.summary);
            println!("[y] allow once  [a] allow always  [n] deny  [d] details  [q] abort");
            print!("> ");
            std::io::stdout().flush().ok();

            let Some(line) = lines.next() else {
                return Err(GateErr::Aborted);
            };
            let line = line.map_err(GateErr::Io)?;
            let choice = line.trim().chars().next().map(|c| c.to_ascii_lowercase());

            match choice {
                Some('y') => {
                    return Ok(ApprovalOutcome {
                        decision: ReviewDecision::AllowedOnce,
                        pattern: None,
                    });
                }
                Some('n') => {
                    return Ok(ApprovalOutcome {
                        decision: ReviewDecision::Denied,
                        pattern: None,
                    });
                }
                Some('q') => {
                    return Ok(ApprovalOutcome {
                        decision: ReviewDecision::Aborted,
                        pattern: None,
                    });
                }
                Some('d') => {
                    println!("arguments: {}", prompt.summary);
                    continue;
                }
                Some('a') => match &prompt.suggested_pattern {
                    Some(pattern) => {
                        println!("add pattern `{pattern}` to the allowlist? [y/n]");
                        print!("> ");
                        std::io::stdout().flush().ok();
                        let Some(confirm) = lines.next() else {
                            return Err(GateErr::Aborted);
                        };
                        let confirm = confirm.map_err(GateErr::Io)?;
                        if confirm.trim().eq_ignore_ascii_case("y") {
                            return Ok(ApprovalOutcome {
                                decision: ReviewDecision::AllowedAlways,
                                pattern: Some(pattern.clone()),
                            });
                        }
                        // Declined the generated pattern: fall back to a
                        // one-time allow rather than looping forever.
                        return Ok(ApprovalOutcome {
                            decision: ReviewDecision::AllowedOnce,
                            pattern: None,
                        });
                    }
                    None => {
                        return Ok(ApprovalOutcome {
                            decision: ReviewDecision::AllowedOnce,
                            pattern: None,
                        });
                    }
                },
                _ => continue,
            }
        }
    }
}
