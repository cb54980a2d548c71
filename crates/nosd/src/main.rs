mod agent_client;
mod api;
mod auth;
mod cli;
mod config;
mod daemon;
mod firstboot;
mod workflows;

use clap::Parser;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if cli.background_child {
        let config = resolve_config(&cli);
        if let Err(err) = shared::logging::init(false, &config.log_file()) {
            eprintln!("failed to initialize logging: {err:#}");
            std::process::exit(2);
        }
        if let Err(err) = daemon::manager::run_background_child(config).await {
            tracing::error!(error = %err, "nosd exited with error");
            std::process::exit(1);
        }
        return;
    }

    let command = cli.command.unwrap_or(Commands::Start { foreground: false });
    let config = resolve_config(&cli);

    let foreground = matches!(
        command,
        Commands::Start { foreground: true } | Commands::Restart { foreground: true }
    );
    if let Err(err) = shared::logging::init(foreground, &config.log_file()) {
        eprintln!("failed to initialize logging: {err:#}");
        std::process::exit(2);
    }

    let result = match command {
        Commands::Start { foreground } => daemon::manager::start_daemon(config, foreground).await,
        Commands::Stop { force } => daemon::manager::stop_daemon(&config, force),
        Commands::Restart { foreground } => {
            daemon::manager::restart_daemon(config, foreground).await
        }
        Commands::Status => daemon::manager::status_daemon(&config),
        Commands::Logs { follow } => daemon::manager::logs_daemon(&config, follow),
    };

    if let Err(err) = result {
        tracing::error!(error = %err, "command failed");
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn resolve_config(cli: &Cli) -> config::NosdConfig {
    let mut cfg = match &cli.config {
        Some(path) => config::load_config(path).unwrap_or_else(|err| {
            eprintln!("warning: failed to load config {}: {err:#}", path.display());
            config::default_config()
        }),
        None => config::default_config(),
    };
    if let Some(state_dir) = &cli.state_dir {
        cfg.state_dir = state_dir.clone();
    }
    if let Some(socket) = &cli.socket {
        cfg.agent_socket = socket.clone();
    }
    cfg
}
