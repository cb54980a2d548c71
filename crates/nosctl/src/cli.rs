use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::client::NosClient;
use crate::commands::firewall::FirewallCommands;
use crate::commands::pool::PoolCommands;
use crate::commands::share::ShareCommands;
use crate::commands::tx::TxCommands;
use crate::commands::updates::UpdatesCommands;
use crate::commands::user::UserCommands;
use crate::commands::{create_admin, doctor, firewall, login, pool, share, tx, updates, user};

#[derive(Debug, Parser)]
#[command(name = "nosctl")]
#[command(bin_name = "nosctl")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "NithronOS control daemon admin client")]
pub struct Cli {
    /// Base URL of the nosd HTTP API
    #[arg(long, global = true, env = "NOSD_URL", default_value = "http://127.0.0.1:8500")]
    server_url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Complete first-boot setup and create the initial admin account
    CreateAdmin {
        username: String,
        /// Setup OTP printed on the nosd console; prompted for if omitted
        #[arg(long)]
        otp: Option<String>,
    },
    /// Authenticate and cache a session cookie in ~/.config/nosctl/session
    Login {
        username: String,
        /// TOTP code, if the account has two-factor enrolled
        #[arg(long)]
        code: Option<String>,
        #[arg(long)]
        remember_me: bool,
    },
    /// Clear the cached session
    Logout,
    /// User/session management
    User {
        #[command(subcommand)]
        command: UserCommands,
    },
    /// Transaction inspection across pools/net/updates domains
    Tx {
        #[command(subcommand)]
        command: TxCommands,
    },
    /// Storage pool management
    Pool {
        #[command(subcommand)]
        command: PoolCommands,
    },
    /// Share management
    Share {
        #[command(subcommand)]
        command: ShareCommands,
    },
    /// Firewall mode changes
    Firewall {
        #[command(subcommand)]
        command: FirewallCommands,
    },
    /// System updates with snapshot protection
    Updates {
        #[command(subcommand)]
        command: UpdatesCommands,
    },
    /// Check that nosd is reachable
    Doctor,
}

impl Cli {
    pub async fn run() -> Result<()> {
        let cli = Cli::parse();
        tracing_subscriber::fmt().with_max_level(tracing::Level::WARN).init();

        match cli.command {
            Commands::CreateAdmin { username, otp } => {
                let client = NosClient::new(cli.server_url)?;
                create_admin::create_admin(client, &username, otp.as_deref()).await
            }
            Commands::Login { username, code, remember_me } => {
                let client = NosClient::new(cli.server_url)?;
                login::login(client, &username, code.as_deref(), remember_me).await
            }
            Commands::Logout => {
                let client = NosClient::new(cli.server_url)?;
                login::logout(client).await
            }
            Commands::User { command } => {
                let client = NosClient::new(cli.server_url)?;
                user::user_commands(&command, client).await
            }
            Commands::Tx { command } => {
                let client = NosClient::new(cli.server_url)?;
                tx::tx_commands(&command, client).await
            }
            Commands::Pool { command } => {
                let client = NosClient::new(cli.server_url)?;
                pool::pool_commands(&command, client).await
            }
            Commands::Share { command } => {
                let client = NosClient::new(cli.server_url)?;
                share::share_commands(&command, client).await
            }
            Commands::Firewall { command } => {
                let client = NosClient::new(cli.server_url)?;
                firewall::firewall_commands(&command, client).await
            }
            Commands::Updates { command } => {
                let client = NosClient::new(cli.server_url)?;
                updates::updates_commands(&command, client).await
            }
            Commands::Doctor => doctor::doctor(&cli.server_url).await,
        }
    }
}
