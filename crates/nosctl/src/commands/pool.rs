use anyhow::{Context, Result};
use clap::{Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::client::NosClient;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum RaidArg {
    Single,
    Raid1,
    Raid10,
}

impl RaidArg {
    fn wire(self) -> &'static str {
        match self {
            RaidArg::Single => "single",
            RaidArg::Raid1 => "raid1",
            RaidArg::Raid10 => "raid10",
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum PoolCommands {
    /// List registered storage pools
    List,
    /// Show a single pool by uuid
    Get { uuid: Uuid },
    /// Preview the create plan without applying it
    PlanCreate {
        label: String,
        #[arg(long, value_delimiter = ',')]
        devices: Vec<String>,
        #[arg(long, value_delimiter = ',')]
        device_sizes: Vec<u64>,
        #[arg(long, value_enum, default_value = "single")]
        raid: RaidArg,
        /// Confirm formatting devices that already carry a filesystem signature
        #[arg(long)]
        wipe: bool,
    },
    /// Create a pool and apply it
    Create {
        label: String,
        #[arg(long, value_delimiter = ',')]
        devices: Vec<String>,
        #[arg(long, value_delimiter = ',')]
        device_sizes: Vec<u64>,
        #[arg(long, value_enum, default_value = "single")]
        raid: RaidArg,
        /// Confirm formatting devices that already carry a filesystem signature
        #[arg(long)]
        wipe: bool,
    },
    /// Register an already-formatted btrfs filesystem
    Import { uuid: Uuid, device: String, label: String },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PoolCreateRequest<'a> {
    label: &'a str,
    devices: &'a [String],
    device_sizes: &'a [u64],
    raid: &'static str,
    wipe: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PoolImportRequest {
    uuid: Uuid,
    device: String,
    label: String,
}

#[derive(Deserialize)]
struct PoolView {
    label: String,
    mountpoint: String,
    uuid: Uuid,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PoolPlanView {
    pool: PoolView,
    capacity_bytes: u64,
    fstab_preview: String,
    steps: Vec<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PoolApplyView {
    tx_id: Uuid,
    pool: PoolView,
}

pub async fn pool_commands(command: &PoolCommands, mut client: NosClient) -> Result<()> {
    match command {
        PoolCommands::List => {
            let pools: Vec<PoolView> = client.get("/pools").await.context("listing pools")?;
            for pool in pools {
                println!("{}  {}  {}", pool.label, pool.uuid, pool.mountpoint);
            }
            Ok(())
        }
        PoolCommands::Get { uuid } => {
            let pool: PoolView = client.get(&format!("/pools/{uuid}")).await.context("fetching pool")?;
            println!("{}  {}  {}", pool.label, pool.uuid, pool.mountpoint);
            Ok(())
        }
        PoolCommands::PlanCreate { label, devices, device_sizes, raid, wipe } => {
            let body = PoolCreateRequest { label, devices, device_sizes, raid: raid.wire(), wipe: *wipe };
            let plan: PoolPlanView = client.post("/pools/plan-create", &body).await.context("planning pool create")?;
            println!("capacity: {} bytes", plan.capacity_bytes);
            println!("fstab:    {}", plan.fstab_preview);
            println!("steps:");
            for step in plan.steps {
                println!("  {step}");
            }
            Ok(())
        }
        PoolCommands::Create { label, devices, device_sizes, raid, wipe } => {
            let body = PoolCreateRequest { label, devices, device_sizes, raid: raid.wire(), wipe: *wipe };
            let applied: PoolApplyView = client.post("/pools/apply-create", &body).await.context("creating pool")?;
            println!("pool {} created as tx {}", applied.pool.label, applied.tx_id);
            Ok(())
        }
        PoolCommands::Import { uuid, device, label } => {
            let body = PoolImportRequest { uuid: *uuid, device: device.clone(), label: label.clone() };
            let applied: PoolApplyView = client.post("/pools/import", &body).await.context("importing pool")?;
            println!("pool {} imported as tx {}", applied.pool.label, applied.tx_id);
            Ok(())
        }
    }
}
