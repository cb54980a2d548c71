use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::client::NosClient;
use crate::session;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
    code: Option<&'a str>,
    remember_me: bool,
}

#[derive(Deserialize)]
struct LoginResponse {
    #[serde(rename = "userId")]
    user_id: uuid::Uuid,
}

pub async fn login(mut client: NosClient, username: &str, code: Option<&str>, remember_me: bool) -> Result<()> {
    let password = rpassword::prompt_password("Password: ").context("reading password")?;

    let response: LoginResponse = client
        .post(
            "/auth/login",
            &LoginRequest {
                username,
                password: &password,
                code,
                remember_me,
            },
        )
        .await
        .context("logging in")?;

    println!("logged in as {username} ({})", response.user_id);
    Ok(())
}

pub async fn logout(mut client: NosClient) -> Result<()> {
    let _: serde_json::Value = client.post("/auth/logout", &serde_json::json!({})).await.unwrap_or_default();
    session::clear()?;
    println!("logged out");
    Ok(())
}
