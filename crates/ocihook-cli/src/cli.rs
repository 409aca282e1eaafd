use std::path::PathBuf;

use clap::{Parser, Subcommand};
use ocihook_core::Stage;

#[derive(Parser)]
#[command(name = "ocihook")]
#[command(about = "OCI lifecycle hook runner")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run every hook a bundle declares for one lifecycle stage
    Run {
        /// Lifecycle stage to run
        #[arg(value_enum)]
        stage: Stage,

        /// Bundle directory containing config.json
        #[arg(long)]
        bundle: PathBuf,

        /// Container or sandbox id reported to hooks
        #[arg(long)]
        id: String,

        /// Process id reported to prestart and poststart hooks
        #[arg(long)]
        pid: Option<u32>,

        /// Engine config file (overrides the global hooks.toml)
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Print the state JSON a hook of the given stage would receive
    State {
        #[arg(value_enum)]
        stage: Stage,

        #[arg(long)]
        bundle: PathBuf,

        #[arg(long)]
        id: String,

        #[arg(long)]
        pid: Option<u32>,
    },

    /// Run a single hook command as a prestart hook
    Exec {
        #[arg(long)]
        bundle: PathBuf,

        #[arg(long)]
        id: String,

        /// Seconds before the hook is killed
        #[arg(long)]
        timeout: Option<i64>,

        /// Hook executable (absolute path) followed by its arguments
        #[arg(last = true, required = true, value_name = "PATH [ARGS]")]
        command: Vec<String>,
    },
}
