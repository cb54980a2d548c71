use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::client::NosClient;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct VerifyOtpRequest<'a> {
    otp: &'a str,
}

#[derive(Serialize)]
struct CreateAdminRequest<'a> {
    otp: &'a str,
    username: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct CreateAdminResponse {
    #[serde(rename = "userId")]
    user_id: uuid::Uuid,
}

pub async fn create_admin(mut client: NosClient, username: &str, otp_override: Option<&str>) -> Result<()> {
    let otp = match otp_override {
        Some(otp) => otp.to_string(),
        None => {
            print!("Setup OTP (printed on the nosd console at first boot): ");
            std::io::Write::flush(&mut std::io::stdout()).ok();
            let mut line = String::new();
            std::io::stdin().read_line(&mut line).context("reading otp")?;
            line.trim().to_string()
        }
    };

    let _: Value = client
        .post("/setup/verify-otp", &VerifyOtpRequest { otp: &otp })
        .await
        .context("verifying setup otp")?;

    let password = rpassword::prompt_password("New admin password: ").context("reading password")?;
    let confirm = rpassword::prompt_password("Confirm password: ").context("reading password")?;
    if password != confirm {
        anyhow::bail!("passwords did not match");
    }

    let response: CreateAdminResponse = client
        .post(
            "/setup/create-admin",
            &CreateAdminRequest {
                otp: &otp,
                username,
                password: &password,
            },
        )
        .await
        .context("creating admin account")?;

    println!("admin account created: {username} ({})", response.user_id);
    Ok(())
}
