use anyhow::{Context, Result};
use clap::{Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::client::NosClient;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum FirewallModeArg {
    LanOnly,
    Wireguard,
    PublicHttps,
}

impl FirewallModeArg {
    fn wire(self) -> &'static str {
        match self {
            FirewallModeArg::LanOnly => "lan-only",
            FirewallModeArg::Wireguard => "wireguard",
            FirewallModeArg::PublicHttps => "public-https",
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum FirewallCommands {
    /// Show the current firewall mode and status
    State,
    /// Preview the ruleset for a mode change without applying it
    Plan {
        #[arg(long, value_enum)]
        mode: FirewallModeArg,
        #[arg(long)]
        enable_wg: bool,
        #[arg(long)]
        enable_https: bool,
    },
    /// Apply a mode change; must be confirmed within the rollback window
    Apply {
        #[arg(long, value_enum)]
        mode: FirewallModeArg,
        #[arg(long)]
        enable_wg: bool,
        #[arg(long)]
        enable_https: bool,
    },
    /// Confirm a pending firewall change before the rollback timer fires
    Confirm,
    /// Manually roll back a pending or in-progress firewall change
    Rollback,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FirewallRequest {
    mode: &'static str,
    enable_wg: bool,
    enable_https: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FirewallStateView {
    mode: String,
    status: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FirewallPlanView {
    rendered: String,
    diff: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TxIdView {
    tx_id: Uuid,
}

pub async fn firewall_commands(command: &FirewallCommands, mut client: NosClient) -> Result<()> {
    match command {
        FirewallCommands::State => {
            let state: FirewallStateView = client.get("/net/firewall/state").await.context("fetching firewall state")?;
            println!("mode:   {}", state.mode);
            println!("status: {}", state.status);
            Ok(())
        }
        FirewallCommands::Plan { mode, enable_wg, enable_https } => {
            let body = FirewallRequest { mode: mode.wire(), enable_wg: *enable_wg, enable_https: *enable_https };
            let plan: FirewallPlanView = client.post("/net/firewall/plan", &body).await.context("planning firewall change")?;
            println!("{}", plan.diff);
            println!("--- rendered ruleset ---\n{}", plan.rendered);
            Ok(())
        }
        FirewallCommands::Apply { mode, enable_wg, enable_https } => {
            let body = FirewallRequest { mode: mode.wire(), enable_wg: *enable_wg, enable_https: *enable_https };
            let result: TxIdView = client.post("/net/firewall/apply", &body).await.context("applying firewall change")?;
            println!("applied as tx {}; confirm within the rollback window or it reverts automatically", result.tx_id);
            Ok(())
        }
        FirewallCommands::Confirm => {
            let _: serde_json::Value = client.post("/net/firewall/confirm", &()).await.context("confirming firewall change")?;
            println!("firewall change confirmed");
            Ok(())
        }
        FirewallCommands::Rollback => {
            let result: TxIdView = client.post("/net/firewall/rollback", &()).await.context("rolling back firewall change")?;
            println!("rolled back as tx {}", result.tx_id);
            Ok(())
        }
    }
}
