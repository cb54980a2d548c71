mod cli;
mod client;
mod commands;
mod session;

use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    match cli::Cli::run().await {
        Ok(()) => ExitCode::from(0),
        Err(err) => {
            eprintln!("Error: {err:#}");
            ExitCode::from(1)
        }
    }
}
