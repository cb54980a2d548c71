use jiff::Timestamp;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FirewallMode {
    LanOnly,
    Wireguard,
    PublicHttps,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FirewallStatus {
    Active,
    PendingConfirm,
    RollingBack,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FirewallState {
    pub mode: FirewallMode,
    pub rules: Vec<String>,
    pub last_applied_at: Timestamp,
    pub checksum: String,
    pub status: FirewallStatus,
    pub rollback_at: Option<Timestamp>,
}

impl FirewallState {
    pub fn is_pending_confirm(&self) -> bool {
        self.status == FirewallStatus::PendingConfirm
    }
}
