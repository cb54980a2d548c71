use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "nosd", version, about = "NithronOS control daemon")]
pub struct Cli {
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
    #[arg(long, global = true, env = "NOS_STATE_DIR")]
    pub state_dir: Option<PathBuf>,
    #[arg(long, global = true, env = "NOS_SOCKET")]
    pub socket: Option<PathBuf>,

    /// Internal: re-exec target used by the background start technique.
    #[arg(long, hide = true)]
    pub background_child: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    Start {
        #[arg(short, long)]
        foreground: bool,
    },
    Stop {
        #[arg(long)]
        force: bool,
    },
    Restart {
        #[arg(short, long)]
        foreground: bool,
    },
    Status,
    Logs {
        #[arg(short, long)]
        follow: bool,
    },
}
