use anyhow::{Context, Result};
use clap::Subcommand;
use serde::Deserialize;

use crate::client::NosClient;

#[derive(Debug, Subcommand)]
pub enum UserCommands {
    /// Show the currently authenticated session and its elevation state
    Whoami,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionView {
    user_id: uuid::Uuid,
    username: String,
    roles: Vec<shared::model::Role>,
    elevated: bool,
}

pub async fn user_commands(command: &UserCommands, mut client: NosClient) -> Result<()> {
    match command {
        UserCommands::Whoami => {
            let session: SessionView = client.get("/auth/session").await.context("fetching session")?;
            println!("user:     {} ({})", session.username, session.user_id);
            println!("roles:    {:?}", session.roles);
            println!("elevated: {}", session.elevated);
            Ok(())
        }
    }
}
