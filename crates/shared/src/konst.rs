// Filesystem layout

pub const NOS_CONFIG_DIR: &str = "/etc/nos";
pub const NOS_SHARES_FILE: &str = "shares.json";
pub const NOS_DEFAULT_STATE_DIR: &str = "/var/lib/nos";
pub const NOS_DEFAULT_SOCKET: &str = "/run/nos-agent.sock";
pub const NOS_DEFAULT_SNAPDB_DIR: &str = "/var/lib/nos/snapshots";

pub const FIRSTBOOT_FILE: &str = "firstboot.json";
pub const USERS_FILE: &str = "users.json";
pub const SESSIONS_FILE: &str = "sessions.json";
pub const FIREWALL_RULES_FILE: &str = "firewall_rules.json";
pub const FIREWALL_STATUS_FILE: &str = "firewall_status.json";
pub const WIREGUARD_CONFIG_FILE: &str = "wireguard_config.json";
pub const WIREGUARD_PEERS_FILE: &str = "wireguard_peers.json";
pub const SNAPSHOT_INDEX_FILE: &str = "index.json";
pub const POOLS_FILE: &str = "pools.json";
pub const UPDATES_INDEX_FILE: &str = "updates.json";

pub const SHARES_MOUNT_ROOT: &str = "/srv/shares";
pub const SMB_CONFIG_DIR: &str = "/etc/samba/smb.conf.d";
pub const NFS_EXPORTS_DIR: &str = "/etc/exports.d";
pub const AVAHI_SERVICES_DIR: &str = "/etc/avahi/services";
pub const NFTABLES_CONF_PATH: &str = "/etc/nftables.conf";

// Environment variables

pub const ENV_STATE_DIR: &str = "NOS_STATE_DIR";
pub const ENV_SOCKET: &str = "NOS_SOCKET";
pub const ENV_FIRSTBOOT_PATH: &str = "NOS_FIRSTBOOT_PATH";
pub const ENV_USERS_PATH: &str = "NOS_USERS_PATH";
pub const ENV_SNAPDB_DIR: &str = "NOS_SNAPDB_DIR";

// Daemon / agent process constants

pub const NOSD_PID_FILE: &str = "nosd.pid";
pub const NOSD_LOG_FILE: &str = "nosd.log";
pub const NOSD_HOST: &str = "127.0.0.1";
pub const NOSD_PORT: u16 = 8500;

pub const AGENT_PID_FILE: &str = "nos-agent.pid";
pub const AGENT_LOG_FILE: &str = "nos-agent.log";
pub const AGENT_SOCKET_MODE: u32 = 0o660;

// Canonical Btrfs subvolume layout

pub const BTRFS_SUBVOLUMES: &[&str] = &["@", "@home", "@var", "@log", "@snapshots"];
pub const BTRFS_DATA_MOUNT_OPTIONS: &str = "noatime,compress=zstd:3";
pub const BTRFS_SNAPSHOT_MOUNT_OPTIONS: &str = "noatime";

// Auth core

pub const TOTP_PERIOD_SECS: u64 = 30;
pub const TOTP_DIGITS: usize = 6;
pub const TOTP_SKEW_STEPS: u8 = 1;
pub const TOTP_ISSUER: &str = "NithronOS";
pub const RECOVERY_CODE_COUNT: usize = 10;

pub const SESSION_COOKIE_NAME: &str = "nos_session";
pub const CSRF_COOKIE_NAME: &str = "csrf";
pub const CSRF_HEADER_NAME: &str = "x-csrf-token";

pub const DEFAULT_SESSION_TTL_SECS: i64 = 12 * 3600;
pub const DEFAULT_SESSION_ROLLING_CEILING_SECS: i64 = 7 * 24 * 3600;
pub const DEFAULT_ELEVATION_WINDOW_SECS: i64 = 5 * 60;

pub const DEFAULT_LOGIN_LOCKOUT_ATTEMPTS: u32 = 5;
pub const DEFAULT_LOGIN_LOCKOUT_WINDOW_SECS: i64 = 15 * 60;

pub const DEFAULT_FIRSTBOOT_OTP_TTL_SECS: i64 = 15 * 60;

// Firewall

pub const DEFAULT_FIREWALL_ROLLBACK_TIMEOUT_SECS: u64 = 60;

// Updates / snapshots

pub const DEFAULT_SNAPSHOT_RETENTION_COUNT: usize = 10;
