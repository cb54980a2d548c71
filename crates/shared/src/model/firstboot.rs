use jiff::Timestamp;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FirstBootState {
    pub otp: String,
    pub issued_at: Timestamp,
    pub expires_at: Timestamp,
}

impl FirstBootState {
    pub fn is_expired(&self, now: Timestamp) -> bool {
        now >= self.expires_at
    }
}

/// Prior on-disk shape, tolerated on read and promoted to `FirstBootState`
/// by adding the configured TTL to `created_at`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyFirstBootState {
    pub otp: String,
    pub created_at: Timestamp,
    #[serde(default)]
    pub used: bool,
}
