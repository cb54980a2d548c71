use std::sync::Arc;

use anyhow::{Context, Result};

use txengine::Engine;

use crate::agent_client::UnixSocketAgentClient;
use crate::auth::ipclass::IpClassifier;
use crate::auth::ratelimit::RateLimiter;
use crate::auth::session::SessionStore;
use crate::auth::totp::PendingEnrollments;
use crate::auth::users::UserStore;
use crate::config::NosdConfig;
use crate::firstboot::FirstBootStore;
use crate::workflows::firewall::FirewallStore;
use crate::workflows::pool::PoolStore;
use crate::workflows::share::ShareStore;
use crate::workflows::updates::UpdateStore;

/// Shared application state. Cloned into every axum handler; everything
/// inside is already `Arc`-wrapped or cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<NosdConfig>,
    pub users: Arc<UserStore>,
    pub sessions: Arc<SessionStore>,
    pub login_limiter: Arc<RateLimiter>,
    pub ipclass: Arc<IpClassifier>,
    pub firstboot: Arc<FirstBootStore>,
    pub pending_totp: Arc<PendingEnrollments>,
    pub engine: Arc<Engine>,
    pub pools: Arc<PoolStore>,
    pub shares: Arc<ShareStore>,
    pub firewall: Arc<FirewallStore>,
    pub updates: Arc<UpdateStore>,
}

impl AppState {
    pub async fn new(config: NosdConfig) -> Result<Self> {
        let agent = Arc::new(UnixSocketAgentClient::new(config.agent_socket.clone()));
        let engine = Engine::new(config.state_dir.clone(), agent)
            .await
            .context("initializing transaction engine")?;

        let users = Arc::new(
            UserStore::new(config.users_path())
                .with_lockout_policy(config.login_lockout_attempts, config.login_lockout_window_secs),
        );
        let sessions = Arc::new(SessionStore::new(
            config.sessions_path(),
            config.session_ttl_secs,
            config.session_rolling_ceiling_secs,
            config.elevation_window_secs,
        ));
        let login_limiter = Arc::new(RateLimiter::new(config.login_lockout_attempts, config.login_lockout_window_secs));
        let ipclass = Arc::new(IpClassifier::new(config.wireguard_subnet));
        let firstboot = Arc::new(FirstBootStore::new(config.firstboot_path(), config.firstboot_otp_ttl_secs));
        let pending_totp = Arc::new(PendingEnrollments::new());

        let pools = Arc::new(PoolStore::new(config.pools_path()));
        let shares = Arc::new(ShareStore::new(config.shares_path()));
        let firewall = Arc::new(FirewallStore::new(
            config.firewall_status_path(),
            config.firewall_rules_path(),
        ));
        let updates = Arc::new(
            UpdateStore::new(config.updates_index_path(), config.snapdb_dir.clone())
                .with_retention(config.snapshot_retention_count),
        );

        Ok(Self {
            config: Arc::new(config),
            users,
            sessions,
            login_limiter,
            ipclass,
            firstboot,
            pending_totp,
            engine,
            pools,
            shares,
            firewall,
            updates,
        })
    }
}
