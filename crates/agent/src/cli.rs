use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "agent", version, about = "NithronOS privileged local agent")]
pub struct Cli {
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
    #[arg(long, global = true)]
    pub state_dir: Option<PathBuf>,
    #[arg(long, global = true)]
    pub socket: Option<PathBuf>,

    /// Internal: re-exec target for the background daemonizing technique.
    #[arg(long, hide = true)]
    pub background_child: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    Start {
        #[arg(long)]
        foreground: bool,
    },
    Stop {
        #[arg(long)]
        force: bool,
    },
    Restart {
        #[arg(long)]
        foreground: bool,
    },
    Status,
    Logs {
        #[arg(long)]
        follow: bool,
    },
}
