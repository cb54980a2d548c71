use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use shared::konst::{AGENT_LOG_FILE, AGENT_PID_FILE, AGENT_SOCKET_MODE, NOS_DEFAULT_SOCKET};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub state_dir: PathBuf,
    pub socket_path: PathBuf,
    pub socket_mode: u32,
    pub allowed_path_prefixes: Vec<PathBuf>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            state_dir: PathBuf::from("/var/lib/nos-agent"),
            socket_path: PathBuf::from(NOS_DEFAULT_SOCKET),
            socket_mode: AGENT_SOCKET_MODE,
            allowed_path_prefixes: vec![
                PathBuf::from("/srv/shares"),
                PathBuf::from("/etc/samba/smb.conf.d"),
                PathBuf::from("/etc/exports.d"),
                PathBuf::from("/etc/avahi/services"),
                PathBuf::from("/etc/nftables.conf"),
            ],
        }
    }
}

impl AgentConfig {
    pub fn pid_file(&self) -> PathBuf {
        self.state_dir.join(AGENT_PID_FILE)
    }

    pub fn log_file(&self) -> PathBuf {
        self.state_dir.join("logs").join(AGENT_LOG_FILE)
    }
}

pub fn default_config() -> AgentConfig {
    AgentConfig::default()
}

pub fn load_config(path: &Path) -> Result<AgentConfig> {
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
        let path = dir.path().join("agent.toml");
        create_config(&path).unwrap();
        let loaded = load_config(&path).unwrap();
        assert_eq!(loaded.socket_mode, AGENT_SOCKET_MODE);
    }
}
