use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use jiff::{Span, Timestamp};
use uuid::Uuid;

use agentproto::{AgentOp, FirewallApplyArgs, FirewallDryRunArgs, FirewallWriteRulesetArgs};
use shared::error::ErrorCode;
use shared::model::{FirewallMode, FirewallState, FirewallStatus};
use template::{NftablesTemplate, Template};
use txengine::{Engine, Plan, PlanStep};

use super::{to_args, WorkflowError};

/// Holds the live firewall state (`state_dir/firewall_status.json`) and a
/// plain-text backup of the last-active ruleset used for rollback.
pub struct FirewallStore {
    state_path: PathBuf,
    backup_path: PathBuf,
}

impl FirewallStore {
    pub fn new(state_path: impl Into<PathBuf>, backup_path: impl Into<PathBuf>) -> Self {
        Self { state_path: state_path.into(), backup_path: backup_path.into() }
    }

    pub fn load(&self) -> anyhow::Result<FirewallState> {
        Ok(fsatomic::load_json(&self.state_path)?.unwrap_or_else(default_state))
    }

    fn save(&self, state: &FirewallState) -> anyhow::Result<()> {
        fsatomic::save_json(&self.state_path, state, 0o640)
    }

    fn read_backup(&self) -> String {
        std::fs::read_to_string(&self.backup_path).unwrap_or_default()
    }

    fn write_backup(&self, rendered: &str) -> anyhow::Result<()> {
        if let Some(parent) = self.backup_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.backup_path, rendered)?;
        Ok(())
    }
}

/// WireGuard is off in the fresh-install default, so this only ever feeds
/// the unused `{% if enable_wg %}` branch of the template.
const DEFAULT_WG_PORT: u16 = 51820;

/// The hardcoded LAN-only ruleset a fresh install starts from: established/
/// related/loopback/ICMP accepted, SSH and HTTP/HTTPS accepted only from
/// RFC1918/ULA sources, everything else on input dropped. Populating this
/// into `rules` up front means the very first `apply_firewall` call has a
/// real prior ruleset to back up, so a rollback before that point restores
/// this instead of an empty ruleset.
fn default_state() -> FirewallState {
    let rendered = NftablesTemplate::new(FirewallMode::LanOnly, false, false, DEFAULT_WG_PORT, Vec::new())
        .and_then(|tpl| tpl.render().map_err(Into::into))
        .expect("default LAN-only ruleset must always render");
    FirewallState {
        mode: FirewallMode::LanOnly,
        rules: rendered.lines().map(str::to_string).collect(),
        last_applied_at: Timestamp::now(),
        checksum: checksum(&rendered),
        status: FirewallStatus::Active,
        rollback_at: None,
    }
}

fn checksum(rendered: &str) -> String {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};
    let mut hasher = DefaultHasher::new();
    rendered.hash(&mut hasher);
    format!("{:x}", hasher.finish())
}

#[derive(Debug, Clone)]
pub struct FirewallDesired {
    pub mode: FirewallMode,
    pub enable_wg: bool,
    pub enable_https: bool,
    pub wg_port: u16,
    pub custom_rules: Vec<String>,
}

pub struct FirewallPlan {
    pub rendered: String,
    pub diff: String,
}

/// Renders the desired ruleset and the diff summary shown to the user
/// before they confirm. Never touches the agent; the dry-run call happens
/// in `apply_firewall`, which is the only function that mutates state.
pub fn plan_firewall(current: &FirewallState, desired: &FirewallDesired) -> Result<FirewallPlan, WorkflowError> {
    let rendered = NftablesTemplate::new(
        desired.mode,
        desired.enable_wg,
        desired.enable_https,
        desired.wg_port,
        desired.custom_rules.clone(),
    )
    .map_err(WorkflowError::Internal)?
    .render()
    .map_err(|e| WorkflowError::Internal(e.into()))?;

    let diff = format!(
        "- mode: {:?} ({} rules)\n+ mode: {:?} ({} rules)",
        current.mode,
        current.rules.len(),
        desired.mode,
        rendered.lines().count(),
    );

    Ok(FirewallPlan { rendered, diff })
}

/// Dry-runs then installs the new ruleset, backing up the prior one first.
/// Leaves the state `pending-confirm` with a background timer that rolls
/// back automatically if nobody confirms within `rollback_timeout_secs`, per
/// the at-most-one-pending-confirm rule.
pub async fn apply_firewall(
    store: &Arc<FirewallStore>,
    engine: &Arc<Engine>,
    desired: FirewallDesired,
    rollback_timeout_secs: u64,
) -> Result<Uuid, WorkflowError> {
    let mut state = store.load()?;
    if state.is_pending_confirm() {
        return Err(WorkflowError::conflict(
            ErrorCode::FirewallPendingConfirm,
            "a firewall change is already awaiting confirmation",
        ));
    }

    let built = plan_firewall(&state, &desired)?;
    store.write_backup(&state.rules.join("\n"))?;

    let mut plan = Plan::new("firewall");
    plan.push(PlanStep::new(
        "dry-run",
        AgentOp::FirewallDryRun,
        to_args(FirewallDryRunArgs { rendered: built.rendered.clone() })?,
        false,
    ));
    plan.push(PlanStep::new(
        "write-ruleset",
        AgentOp::FirewallWriteRuleset,
        to_args(FirewallWriteRulesetArgs { rendered: built.rendered.clone() })?,
        true,
    ));
    plan.push(PlanStep::new(
        "apply-ruleset",
        AgentOp::FirewallApply,
        to_args(FirewallApplyArgs { rendered: built.rendered.clone() })?,
        true,
    ));

    let tx_id = engine.apply(plan).await?;

    let now = Timestamp::now();
    let rollback_at = now
        .checked_add(Span::new().seconds(rollback_timeout_secs as i64))
        .unwrap_or(now);
    state.mode = desired.mode;
    state.rules = built.rendered.lines().map(str::to_string).collect();
    state.last_applied_at = now;
    state.checksum = checksum(&built.rendered);
    state.status = FirewallStatus::PendingConfirm;
    state.rollback_at = Some(rollback_at);
    store.save(&state)?;

    spawn_rollback_timer(Arc::clone(store), Arc::clone(engine), Duration::from_secs(rollback_timeout_secs));

    Ok(tx_id)
}

fn spawn_rollback_timer(store: Arc<FirewallStore>, engine: Arc<Engine>, timeout: Duration) {
    tokio::spawn(async move {
        tokio::time::sleep(timeout).await;
        if let Err(err) = rollback_if_still_pending(&store, &engine).await {
            tracing::error!(error = %err, "firewall rollback timer failed");
        }
    });
}

async fn rollback_if_still_pending(store: &Arc<FirewallStore>, engine: &Arc<Engine>) -> anyhow::Result<()> {
    let state = store.load()?;
    if state.status != FirewallStatus::PendingConfirm {
        return Ok(());
    }
    rollback(store, engine).await.map_err(|e| anyhow::anyhow!(e.to_string()))?;
    Ok(())
}

pub fn confirm_firewall(store: &FirewallStore) -> Result<(), WorkflowError> {
    let mut state = store.load()?;
    if state.status != FirewallStatus::PendingConfirm {
        return Err(WorkflowError::conflict(
            ErrorCode::FirewallRollbackRequired,
            "no firewall change is awaiting confirmation",
        ));
    }
    state.status = FirewallStatus::Active;
    state.rollback_at = None;
    store.save(&state)?;
    Ok(())
}

/// Restores the backed-up ruleset, whether invoked by the rollback timer or
/// by a user hitting the manual rollback endpoint while still pending.
pub async fn rollback(store: &Arc<FirewallStore>, engine: &Arc<Engine>) -> Result<Uuid, WorkflowError> {
    let mut state = store.load()?;
    if !matches!(state.status, FirewallStatus::PendingConfirm | FirewallStatus::RollingBack) {
        return Err(WorkflowError::conflict(
            ErrorCode::FirewallRollbackRequired,
            "firewall is not in a rollback-eligible state",
        ));
    }
    state.status = FirewallStatus::RollingBack;
    store.save(&state)?;

    let backup = store.read_backup();
    let mut plan = Plan::new("firewall");
    plan.push(PlanStep::new(
        "rollback-ruleset",
        AgentOp::FirewallRollback,
        to_args(FirewallApplyArgs { rendered: backup.clone() })?,
        true,
    ));
    let tx_id = engine.apply(plan).await?;

    state.status = FirewallStatus::Active;
    state.rules = backup.lines().map(str::to_string).collect();
    state.rollback_at = None;
    store.save(&state)?;

    Ok(tx_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn desired() -> FirewallDesired {
        FirewallDesired { mode: FirewallMode::LanOnly, enable_wg: false, enable_https: false, wg_port: 51820, custom_rules: vec![] }
    }

    #[test]
    fn plan_firewall_renders_and_summarizes_diff() {
        let current = default_state();
        let built = plan_firewall(&current, &desired()).unwrap();
        assert!(built.rendered.contains("policy drop"));
        assert!(built.diff.contains("LanOnly"));
    }

    #[test]
    fn store_defaults_to_active_lan_only() {
        let dir = TempDir::new().unwrap();
        let store = FirewallStore::new(dir.path().join("status.json"), dir.path().join("backup.nft"));
        let state = store.load().unwrap();
        assert_eq!(state.mode, FirewallMode::LanOnly);
        assert_eq!(state.status, FirewallStatus::Active);
    }

    #[test]
    fn default_state_carries_the_rendered_lan_only_ruleset() {
        let state = default_state();
        assert!(!state.rules.is_empty());
        assert!(state.rules.iter().any(|l| l.contains("policy drop")));
        assert!(!state.checksum.is_empty());
    }

    #[test]
    fn confirm_requires_pending_state() {
        let dir = TempDir::new().unwrap();
        let store = FirewallStore::new(dir.path().join("status.json"), dir.path().join("backup.nft"));
        assert!(confirm_firewall(&store).is_err());
    }

    #[test]
    fn confirm_clears_pending_status() {
        let dir = TempDir::new().unwrap();
        let store = FirewallStore::new(dir.path().join("status.json"), dir.path().join("backup.nft"));
        let mut state = store.load().unwrap();
        state.status = FirewallStatus::PendingConfirm;
        state.rollback_at = Some(Timestamp::now());
        store.save(&state).unwrap();

        confirm_firewall(&store).unwrap();
        let reloaded = store.load().unwrap();
        assert_eq!(reloaded.status, FirewallStatus::Active);
        assert!(reloaded.rollback_at.is_none());
    }
}
