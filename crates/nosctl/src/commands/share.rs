use anyhow::{Context, Result};
use clap::Subcommand;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::client::NosClient;

#[derive(Debug, Subcommand)]
pub enum ShareCommands {
    /// List configured shares
    List,
    /// Create an SMB and/or NFS share
    Create {
        name: String,
        #[arg(long)]
        smb: bool,
        #[arg(long)]
        nfs: bool,
        #[arg(long, value_delimiter = ',')]
        owners: Vec<String>,
        #[arg(long, value_delimiter = ',')]
        readers: Vec<String>,
        #[arg(long, default_value = "")]
        description: String,
    },
    /// Update an existing share's protocol config or ACL principals
    Update {
        name: String,
        #[arg(long)]
        smb: bool,
        #[arg(long)]
        nfs: bool,
        #[arg(long, value_delimiter = ',')]
        owners: Vec<String>,
        #[arg(long, value_delimiter = ',')]
        readers: Vec<String>,
        #[arg(long, default_value = "")]
        description: String,
    },
    /// Remove a share
    Delete { name: String },
    /// Dry-run check that a share's protocol services are active
    Test { name: String },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SmbConfigWire {
    enabled: bool,
    guest_ok: bool,
    time_machine: bool,
    recycle_bin: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct NfsConfigWire {
    enabled: bool,
    read_only: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ShareRequest {
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    smb: Option<SmbConfigWire>,
    #[serde(skip_serializing_if = "Option::is_none")]
    nfs: Option<NfsConfigWire>,
    owners: Vec<String>,
    readers: Vec<String>,
    description: String,
}

#[derive(Deserialize)]
struct ShareView {
    name: String,
    path: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TxIdView {
    tx_id: Uuid,
}

pub async fn share_commands(command: &ShareCommands, mut client: NosClient) -> Result<()> {
    match command {
        ShareCommands::List => {
            let shares: Vec<ShareView> = client.get("/shares").await.context("listing shares")?;
            for share in shares {
                println!("{}  {}", share.name, share.path);
            }
            Ok(())
        }
        ShareCommands::Create { name, smb, nfs, owners, readers, description } => {
            let body = ShareRequest {
                name: name.clone(),
                smb: smb.then_some(SmbConfigWire { enabled: true, guest_ok: false, time_machine: false, recycle_bin: false }),
                nfs: nfs.then_some(NfsConfigWire { enabled: true, read_only: false }),
                owners: owners.clone(),
                readers: readers.clone(),
                description: description.clone(),
            };
            let result: TxIdView = client.post("/shares", &body).await.context("creating share")?;
            println!("share {name} created as tx {}", result.tx_id);
            Ok(())
        }
        ShareCommands::Update { name, smb, nfs, owners, readers, description } => {
            let body = ShareRequest {
                name: name.clone(),
                smb: smb.then_some(SmbConfigWire { enabled: true, guest_ok: false, time_machine: false, recycle_bin: false }),
                nfs: nfs.then_some(NfsConfigWire { enabled: true, read_only: false }),
                owners: owners.clone(),
                readers: readers.clone(),
                description: description.clone(),
            };
            let result: TxIdView = client.patch(&format!("/shares/{name}"), &body).await.context("updating share")?;
            println!("share {name} updated as tx {}", result.tx_id);
            Ok(())
        }
        ShareCommands::Delete { name } => {
            let result: TxIdView = client.delete(&format!("/shares/{name}")).await.context("deleting share")?;
            println!("share {name} deleted as tx {}", result.tx_id);
            Ok(())
        }
        ShareCommands::Test { name } => {
            let result: TxIdView = client.post(&format!("/shares/{name}/test"), &()).await.context("testing share")?;
            println!("share {name} test dispatched as tx {}", result.tx_id);
            Ok(())
        }
    }
}
