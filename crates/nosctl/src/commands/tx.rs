use anyhow::{Context, Result};
use clap::{Subcommand, ValueEnum};
use serde::Deserialize;
use uuid::Uuid;

use crate::client::NosClient;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum TxDomain {
    Pools,
    Net,
    Updates,
}

impl TxDomain {
    fn path_prefix(self) -> &'static str {
        match self {
            TxDomain::Pools => "/pools/tx",
            TxDomain::Net => "/net/tx",
            TxDomain::Updates => "/updates/tx",
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum TxCommands {
    /// Show a transaction's current status and steps
    Status {
        #[arg(long, value_enum, default_value = "pools")]
        domain: TxDomain,
        id: Uuid,
    },
    /// Page through a transaction's log
    Log {
        #[arg(long, value_enum, default_value = "pools")]
        domain: TxDomain,
        id: Uuid,
        #[arg(long, default_value_t = 0)]
        cursor: u64,
    },
}

pub async fn tx_commands(command: &TxCommands, mut client: NosClient) -> Result<()> {
    match command {
        TxCommands::Status { domain, id } => {
            let tx: shared::model::Tx = client
                .get(&format!("{}/{id}/status", domain.path_prefix()))
                .await
                .context("fetching transaction status")?;
            println!("tx {}  ok={:?}", tx.id, tx.ok);
            for step in &tx.steps {
                println!("  [{:?}] {} ({})", step.status, step.name, step.id);
            }
            Ok(())
        }
        TxCommands::Log { domain, id, cursor } => {
            let page: LogPage = client
                .get(&format!("{}/{id}/log?cursor={cursor}", domain.path_prefix()))
                .await
                .context("fetching transaction log")?;
            for line in &page.lines {
                println!("{line}");
            }
            println!("-- next cursor: {}", page.next_cursor);
            Ok(())
        }
    }
}

#[derive(Deserialize)]
struct LogPage {
    lines: Vec<String>,
    #[serde(rename = "nextCursor")]
    next_cursor: u64,
}
