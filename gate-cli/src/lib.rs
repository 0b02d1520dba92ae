//! `gate` binary support: CLI flags, config assembly, and the stdin/stdout
//! batch loop that drives `GateOrchestrator::check_and_execute` once per
//! line. Clap-derived flags, a `run_main` testable independently of
//! `main`, and a `tracing_subscriber::EnvFilter` bootstrap.

mod demo_executor;

use std::io::BufRead;
use std::io::IsTerminal;
use std::path::PathBuf;

use clap::Parser;
use gate_core::approval::tty::TtyApprover;
use gate_core::config::GateConfig;
use gate_core::orchestrator::GateOrchestrator;
use gate_protocol::GateCategory;
use gate_protocol::ToolCall;
use tracing_subscriber::EnvFilter;

pub use demo_executor::DemoExecutor;

#[derive(Debug, Parser)]
#[command(version, about = "Approval gate for tool calls issued by an agent.")]
pub struct Cli {
    /// Path to a JSON config file with an `approval_gates` section.
    #[arg(long = "config", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Disables gating for this process. Protected-file and dangerous-
    /// pattern enforcement still apply.
    #[arg(long, default_value_t = false)]
    pub yolo: bool,

    /// Session-adds a shell allowlist entry: `tool:tok,tok,...`, e.g.
    /// `shell:git,status`.
    #[arg(long = "allow", value_name = "TOOL:TOKENS")]
    pub allow: Vec<String>,

    /// Upgrades a category to `Allow` for this session.
    #[arg(long = "allow-category", value_name = "CATEGORY")]
    pub allow_category: Vec<String>,
}

pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

fn build_config(cli: &Cli) -> anyhow::Result<GateConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            let raw = std::fs::read_to_string(path)?;
            GateConfig::from_json(&raw)?
        }
        None => GateConfig::minimal(),
    };

    if cli.yolo {
        config.apply_yolo();
    }

    for spec in &cli.allow {
        let (tool, tokens) = spec
            .split_once(':')
            .ok_or_else(|| anyhow::anyhow!("--allow expects tool:tok,tok,...; got {spec}"))?;
        if tool != "shell" && tool != "shell_execute" {
            anyhow::bail!("--allow only supports shell entries; got tool {tool}");
        }
        let tokens: Vec<String> = tokens.split(',').map(str::to_string).collect();
        config.add_session_shell_allow(tokens, None)?;
    }

    for name in &cli.allow_category {
        let category: GateCategory = name
            .parse()
            .map_err(|_| anyhow::anyhow!("unknown category: {name}"))?;
        config.allow_category(category);
    }

    if std::io::stdin().is_terminal() {
        config.set_approval_channel(Box::new(TtyApprover::new()));
    }

    Ok(config)
}

/// Runs the batch loop: one JSON `ToolCall` per line on stdin, one JSON
/// tool result per line on stdout. Returns the process exit code: 0 on
/// success, 1 if the batch was aborted, 2 on a fatal config error.
pub fn run_main(cli: Cli) -> anyhow::Result<i32> {
    let config = match build_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "configuration rejected");
            return Ok(2);
        }
    };

    let mut orchestrator = GateOrchestrator::new(config);
    orchestrator.begin_batch(&std::env::current_dir()?);
    let mut executor = DemoExecutor::new();

    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let tool: ToolCall = serde_json::from_str(&line)?;
        let outcome = orchestrator.check_and_execute(&tool, &mut executor);
        println!("{}", outcome.result);
        if outcome.terminates_batch {
            return Ok(1);
        }
    }

    Ok(0)
}
