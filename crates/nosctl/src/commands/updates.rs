use anyhow::{Context, Result};
use clap::Subcommand;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::client::NosClient;

#[derive(Debug, Subcommand)]
pub enum UpdatesCommands {
    /// Snapshot-protect targets, then install packages and restart services
    Apply {
        #[arg(long, value_delimiter = ',')]
        packages: Vec<String>,
        #[arg(long, default_value = "")]
        reason: String,
        #[arg(long, value_delimiter = ',')]
        btrfs_targets: Vec<String>,
        #[arg(long, value_delimiter = ',')]
        services_to_restart: Vec<String>,
    },
    /// Show an update transaction's recorded outcome
    Progress { id: Uuid },
    /// Restore the Btrfs snapshots taken before an update
    Rollback { id: Uuid },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UpdateApplyRequest<'a> {
    packages: &'a [String],
    reason: &'a str,
    btrfs_targets: &'a [String],
    services_to_restart: &'a [String],
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TxIdView {
    tx_id: Uuid,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateTxView {
    tx_id: Uuid,
    success: Option<bool>,
    packages: Vec<String>,
}

pub async fn updates_commands(command: &UpdatesCommands, mut client: NosClient) -> Result<()> {
    match command {
        UpdatesCommands::Apply { packages, reason, btrfs_targets, services_to_restart } => {
            let body = UpdateApplyRequest { packages, reason, btrfs_targets, services_to_restart };
            let result: TxIdView = client.post("/updates/apply", &body).await.context("applying update")?;
            println!("update dispatched as tx {}", result.tx_id);
            Ok(())
        }
        UpdatesCommands::Progress { id } => {
            let tx: UpdateTxView = client.get(&format!("/updates/progress/{id}")).await.context("fetching update progress")?;
            println!("tx {}  success={:?}  packages={:?}", tx.tx_id, tx.success, tx.packages);
            Ok(())
        }
        UpdatesCommands::Rollback { id } => {
            let result: TxIdView = client.post(&format!("/updates/rollback/{id}"), &()).await.context("rolling back update")?;
            println!("rollback dispatched as tx {}", result.tx_id);
            Ok(())
        }
    }
}
