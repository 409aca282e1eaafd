use anyhow::Result;
use clap::Parser;

mod cli;
mod hook_cmds;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing (output to stderr, initialize only once)
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init()
        .ok();

    let cli = Cli::parse();

    let outcome = match cli.command {
        Commands::Run {
            stage,
            bundle,
            id,
            pid,
            config,
        } => hook_cmds::handle_run(stage, bundle, id, pid, config).await,
        Commands::State {
            stage,
            bundle,
            id,
            pid,
        } => hook_cmds::handle_state(stage, bundle, id, pid),
        Commands::Exec {
            bundle,
            id,
            timeout,
            command,
        } => hook_cmds::handle_exec(bundle, id, timeout, command).await,
    };

    match outcome {
        Ok(hook_cmds::EXIT_OK) => Ok(()),
        Ok(exit_code) => std::process::exit(exit_code),
        Err(e) => {
            eprintln!("Error: {e:#}");
            std::process::exit(hook_cmds::EXIT_USAGE);
        }
    }
}
