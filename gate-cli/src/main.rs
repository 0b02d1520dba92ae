use clap::Parser;
use gate_cli::Cli;
use gate_cli::run_main;

fn main() -> anyhow::Result<()> {
    gate_cli::init_tracing();
    let cli = Cli::parse();
    let exit_code = run_main(cli)?;
    std::process::exit(exit_code);
}
