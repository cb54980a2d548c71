use anyhow::{Context, Result};

/// Checks that `nosd` is reachable at `base_url`. Doesn't require a session,
/// so it works even before `create-admin` has run.
pub async fn doctor(base_url: &str) -> Result<()> {
    let url = format!("{}/healthz", base_url.trim_end_matches('/'));
    let response = reqwest::get(&url).await.with_context(|| format!("reaching {url}"))?;

    if response.status().is_success() {
        println!("nosd is reachable at {base_url}");
        Ok(())
    } else {
        anyhow::bail!("nosd at {base_url} returned {}", response.status());
    }
}
