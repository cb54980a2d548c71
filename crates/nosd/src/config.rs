use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use ipnet::IpNet;
use serde::{Deserialize, Serialize};

use shared::konst::{
    DEFAULT_ELEVATION_WINDOW_SECS, DEFAULT_FIREWALL_ROLLBACK_TIMEOUT_SECS,
    DEFAULT_FIRSTBOOT_OTP_TTL_SECS, DEFAULT_LOGIN_LOCKOUT_ATTEMPTS,
    DEFAULT_LOGIN_LOCKOUT_WINDOW_SECS, DEFAULT_SESSION_ROLLING_CEILING_SECS,
    DEFAULT_SESSION_TTL_SECS, DEFAULT_SNAPSHOT_RETENTION_COUNT, NOS_DEFAULT_SNAPDB_DIR,
    NOS_DEFAULT_SOCKET, NOS_DEFAULT_STATE_DIR, NOSD_HOST, NOSD_LOG_FILE, NOSD_PID_FILE, NOSD_PORT,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NosdConfig {
    pub state_dir: PathBuf,
    pub snapdb_dir: PathBuf,
    pub agent_socket: PathBuf,
    pub http_host: String,
    pub http_port: u16,
    /// CIDR of the WireGuard interface, if enabled; classified as LAN.
    pub wireguard_subnet: Option<IpNet>,
    pub session_ttl_secs: i64,
    pub session_rolling_ceiling_secs: i64,
    pub elevation_window_secs: i64,
    pub login_lockout_attempts: u32,
    pub login_lockout_window_secs: i64,
    pub firstboot_otp_ttl_secs: i64,
    pub firewall_rollback_timeout_secs: u64,
    pub snapshot_retention_count: usize,
}

impl Default for NosdConfig {
    fn default() -> Self {
        Self {
            state_dir: PathBuf::from(NOS_DEFAULT_STATE_DIR),
            snapdb_dir: PathBuf::from(NOS_DEFAULT_SNAPDB_DIR),
            agent_socket: PathBuf::from(NOS_DEFAULT_SOCKET),
            http_host: NOSD_HOST.to_string(),
            http_port: NOSD_PORT,
            wireguard_subnet: None,
            session_ttl_secs: DEFAULT_SESSION_TTL_SECS,
            session_rolling_ceiling_secs: DEFAULT_SESSION_ROLLING_CEILING_SECS,
            elevation_window_secs: DEFAULT_ELEVATION_WINDOW_SECS,
            login_lockout_attempts: DEFAULT_LOGIN_LOCKOUT_ATTEMPTS,
            login_lockout_window_secs: DEFAULT_LOGIN_LOCKOUT_WINDOW_SECS,
            firstboot_otp_ttl_secs: DEFAULT_FIRSTBOOT_OTP_TTL_SECS,
            firewall_rollback_timeout_secs: DEFAULT_FIREWALL_ROLLBACK_TIMEOUT_SECS,
            snapshot_retention_count: DEFAULT_SNAPSHOT_RETENTION_COUNT,
        }
    }
}

impl NosdConfig {
    pub fn pid_file(&self) -> PathBuf {
        self.state_dir.join(NOSD_PID_FILE)
    }

    pub fn log_file(&self) -> PathBuf {
        self.state_dir.join("logs").join(NOSD_LOG_FILE)
    }

    pub fn users_path(&self) -> PathBuf {
        self.state_dir.join("users.json")
    }

    pub fn sessions_path(&self) -> PathBuf {
        self.state_dir.join("sessions.json")
    }

    pub fn firstboot_path(&self) -> PathBuf {
        self.state_dir.join("firstboot.json")
    }

    pub fn shares_path(&self) -> PathBuf {
        PathBuf::from(shared::konst::NOS_CONFIG_DIR).join(shared::konst::NOS_SHARES_FILE)
    }

    pub fn firewall_rules_path(&self) -> PathBuf {
        self.state_dir.join(shared::konst::FIREWALL_RULES_FILE)
    }

    pub fn firewall_status_path(&self) -> PathBuf {
        self.state_dir.join(shared::konst::FIREWALL_STATUS_FILE)
    }

    pub fn pools_path(&self) -> PathBuf {
        self.state_dir.join(shared::konst::POOLS_FILE)
    }

    pub fn updates_index_path(&self) -> PathBuf {
        self.snapdb_dir.join(shared::konst::SNAPSHOT_INDEX_FILE)
    }
}

pub fn default_config() -> NosdConfig {
    NosdConfig::default()
}

pub fn load_config(path: &Path) -> Result<NosdConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading config file {}", path.display()))?;
    toml::from_str(&text).with_context(|| format!("parsing config file {}", path.display()))
}

pub fn create_config(path: &Path) -> Result<()> {
    let config = default_config();
    let text = toml::to_string_pretty(&config).context("serializing default config")?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating config directory {}", parent.display()))?;
    }
    std::fs::write(path, text).with_context(|| format!("writing config file {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn create_then_load_round_trips() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nosd.toml");
        create_config(&path).unwrap();
        let loaded = load_config(&path).unwrap();
        assert_eq!(loaded.http_port, NOSD_PORT);
    }
}
