use std::path::PathBuf;
use std::sync::Arc;

use uuid::Uuid;

use agentproto::{
    AgentOp, BtrfsCheckDeviceSignaturesArgs, BtrfsMkfsArgs, BtrfsMountArgs,
    BtrfsSubvolumeCreateArgs, BtrfsSubvolumeDeleteArgs, SystemctlUnitArgs,
};
use shared::error::ErrorCode;
use shared::konst::{BTRFS_DATA_MOUNT_OPTIONS, BTRFS_SNAPSHOT_MOUNT_OPTIONS, BTRFS_SUBVOLUMES};
use shared::model::{estimate_capacity, Pool, RaidProfile};
use txengine::{CompensatingAction, Engine, Plan, PlanStep};
use validate::{validate_pool_label, validate_raid_device_count};

use super::{to_args, WorkflowError};

const POOL_MOUNT_ROOT: &str = "/mnt/pools";

/// fsatomic-backed pool registry, one JSON array under `state_dir/pools.json`.
pub struct PoolStore {
    path: PathBuf,
}

impl PoolStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn list(&self) -> anyhow::Result<Vec<Pool>> {
        Ok(fsatomic::load_json(&self.path)?.unwrap_or_default())
    }

    pub fn find(&self, uuid: Uuid) -> anyhow::Result<Option<Pool>> {
        Ok(self.list()?.into_iter().find(|p| p.uuid == uuid))
    }

    fn insert(&self, pool: Pool) -> anyhow::Result<()> {
        fsatomic::with_lock(&self.path, || {
            let mut pools = self.list()?;
            if pools.iter().any(|p| p.label == pool.label) {
                anyhow::bail!("pool label {} already exists", pool.label);
            }
            pools.push(pool);
            fsatomic::save_json(&self.path, &pools, 0o640)
        })
    }
}

#[derive(Debug, Clone)]
pub struct PoolCreateIntent {
    pub label: String,
    pub devices: Vec<String>,
    pub device_sizes: Vec<u64>,
    pub raid: RaidProfile,
    /// Confirms formatting devices that already carry a filesystem signature.
    /// Without this, the agent refuses `mkfs` if `btrfs-check-device-signatures`
    /// finds one, so an existing filesystem can't be destroyed by accident.
    pub wipe: bool,
}

/// Output of `plan_create`/`plan_import`: the steps to execute plus what the
/// UI needs before the user confirms.
pub struct PoolPlan {
    pub plan: Plan,
    pub pool: Pool,
    pub capacity_bytes: u64,
    pub fstab_preview: String,
}

fn raid_label(raid: RaidProfile) -> &'static str {
    match raid {
        RaidProfile::Single => "single",
        RaidProfile::Raid1 => "raid1",
        RaidProfile::Raid10 => "raid10",
    }
}

fn fstab_line(pool: &Pool) -> String {
    format!(
        "UUID={}  {}  btrfs  {}  0  0",
        pool.uuid, pool.mountpoint, pool.mount_options
    )
}

/// Builds the pool-create plan: mkfs, mount, the canonical subvolume set,
/// and a scrub timer. Pure aside from the label-collision check against the
/// persisted pool list; never touches the agent.
pub fn plan_create(store: &PoolStore, intent: PoolCreateIntent) -> Result<PoolPlan, WorkflowError> {
    validate_pool_label(&intent.label)?;
    validate_raid_device_count(intent.raid, intent.devices.len())?;
    if intent.devices.len() != intent.device_sizes.len() {
        return Err(WorkflowError::conflict(
            ErrorCode::ValidationPoolDeviceCount,
            "device list and device size list must be the same length",
        ));
    }
    if store.list()?.iter().any(|p| p.label == intent.label) {
        return Err(WorkflowError::conflict(
            ErrorCode::ValidationPoolLabelInvalid,
            format!("pool label {} already exists", intent.label),
        ));
    }

    let uuid = Uuid::new_v4();
    let mountpoint = format!("{POOL_MOUNT_ROOT}/{}", intent.label);
    let capacity_bytes = estimate_capacity(intent.raid, &intent.device_sizes);

    let mut plan = Plan::new("pool");

    plan.push(PlanStep::new(
        "check-device-signatures",
        AgentOp::BtrfsCheckDeviceSignatures,
        to_args(BtrfsCheckDeviceSignaturesArgs {
            devices: intent.devices.clone(),
            wipe: intent.wipe,
        })?,
        false,
    ));

    plan.push(PlanStep::new(
        "mkfs",
        AgentOp::BtrfsMkfs,
        to_args(BtrfsMkfsArgs {
            devices: intent.devices.clone(),
            raid: raid_label(intent.raid).to_string(),
            label: intent.label.clone(),
        })?,
        true,
    ));

    plan.push(PlanStep::new(
        "mount-top",
        AgentOp::BtrfsMount,
        to_args(BtrfsMountArgs {
            device: intent.devices[0].clone(),
            mountpoint: mountpoint.clone(),
            options: BTRFS_DATA_MOUNT_OPTIONS.to_string(),
        })?,
        false,
    ));

    for subvol in BTRFS_SUBVOLUMES {
        let path = format!("{mountpoint}/{subvol}");
        plan.push(
            PlanStep::new(
                format!("create-subvolume-{subvol}"),
                AgentOp::BtrfsSubvolumeCreate,
                to_args(BtrfsSubvolumeCreateArgs { path: path.clone() })?,
                true,
            )
            .with_compensation(CompensatingAction::new(
                format!("delete-subvolume-{subvol}"),
                AgentOp::BtrfsSubvolumeDelete,
                to_args(BtrfsSubvolumeDeleteArgs { path })?,
            )),
        );
    }

    let snapshots_mount = format!("{mountpoint}/@snapshots");
    plan.push(PlanStep::new(
        "mount-snapshots",
        AgentOp::BtrfsMount,
        to_args(BtrfsMountArgs {
            device: intent.devices[0].clone(),
            mountpoint: snapshots_mount,
            options: BTRFS_SNAPSHOT_MOUNT_OPTIONS.to_string(),
        })?,
        false,
    ));

    plan.push(PlanStep::new(
        "enable-scrub-timer",
        AgentOp::SystemctlEnable,
        to_args(SystemctlUnitArgs { unit: "btrfs-scrub@-.timer".to_string() })?,
        false,
    ));

    let pool = Pool {
        uuid,
        label: intent.label,
        mountpoint,
        raid: intent.raid,
        devices: intent.devices,
        subvolumes: BTRFS_SUBVOLUMES.iter().map(|s| s.to_string()).collect(),
        mount_options: BTRFS_DATA_MOUNT_OPTIONS.to_string(),
    };
    let fstab_preview = fstab_line(&pool);

    Ok(PoolPlan { plan, pool, capacity_bytes, fstab_preview })
}

/// Builds the import plan for an already-formatted btrfs filesystem. RAID
/// layout discovery lives on the agent side in a full deployment; here the
/// imported pool is registered as `Single` until the agent's mount response
/// is threaded back through (see DESIGN.md).
pub fn plan_import(store: &PoolStore, uuid: Uuid, device: String, label: String) -> Result<PoolPlan, WorkflowError> {
    validate_pool_label(&label)?;
    if store.list()?.iter().any(|p| p.uuid == uuid || p.label == label) {
        return Err(WorkflowError::conflict(
            ErrorCode::ValidationPoolLabelInvalid,
            format!("pool {label} or uuid {uuid} is already registered"),
        ));
    }

    let mountpoint = format!("{POOL_MOUNT_ROOT}/{label}");
    let mut plan = Plan::new("pool");
    plan.push(PlanStep::new(
        "mount-imported",
        AgentOp::BtrfsMount,
        to_args(BtrfsMountArgs {
            device: device.clone(),
            mountpoint: mountpoint.clone(),
            options: BTRFS_DATA_MOUNT_OPTIONS.to_string(),
        })?,
        false,
    ));

    let pool = Pool {
        uuid,
        label,
        mountpoint,
        raid: RaidProfile::Single,
        devices: vec![device],
        subvolumes: BTRFS_SUBVOLUMES.iter().map(|s| s.to_string()).collect(),
        mount_options: BTRFS_DATA_MOUNT_OPTIONS.to_string(),
    };
    let fstab_preview = fstab_line(&pool);

    Ok(PoolPlan { plan, pool, capacity_bytes: 0, fstab_preview })
}

pub async fn apply_create(
    store: &PoolStore,
    engine: &Arc<Engine>,
    intent: PoolCreateIntent,
) -> Result<(Uuid, PoolPlan), WorkflowError> {
    let pool_plan = plan_create(store, intent)?;
    store.insert(pool_plan.pool.clone())?;
    let tx_id = engine.apply(pool_plan.plan.clone()).await?;
    Ok((tx_id, pool_plan))
}

pub async fn apply_import(
    store: &PoolStore,
    engine: &Arc<Engine>,
    uuid: Uuid,
    device: String,
    label: String,
) -> Result<(Uuid, PoolPlan), WorkflowError> {
    let pool_plan = plan_import(store, uuid, device, label)?;
    store.insert(pool_plan.pool.clone())?;
    let tx_id = engine.apply(pool_plan.plan.clone()).await?;
    Ok((tx_id, pool_plan))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store() -> (TempDir, PoolStore) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("pools.json");
        (dir, PoolStore::new(path))
    }

    fn intent() -> PoolCreateIntent {
        PoolCreateIntent {
            label: "tank".into(),
            devices: vec!["/dev/sda".into(), "/dev/sdb".into()],
            device_sizes: vec![1_000_000_000, 2_000_000_000],
            raid: RaidProfile::Raid1,
            wipe: false,
        }
    }

    #[test]
    fn plan_create_estimates_capacity_and_previews_fstab() {
        let (_dir, store) = store();
        let pool_plan = plan_create(&store, intent()).unwrap();
        assert_eq!(pool_plan.capacity_bytes, 1_000_000_000);
        assert!(pool_plan.fstab_preview.contains("btrfs"));
        assert!(pool_plan.plan.steps.iter().any(|s| s.name == "mkfs"));
        assert_eq!(pool_plan.plan.steps.len(), BTRFS_SUBVOLUMES.len() + 5);
    }

    #[test]
    fn plan_create_checks_device_signatures_before_mkfs() {
        let (_dir, store) = store();
        let pool_plan = plan_create(&store, intent()).unwrap();
        let check_idx = pool_plan
            .plan
            .steps
            .iter()
            .position(|s| s.name == "check-device-signatures")
            .unwrap();
        let mkfs_idx = pool_plan.plan.steps.iter().position(|s| s.name == "mkfs").unwrap();
        assert_eq!(check_idx, 0, "signature check must run before any destructive step");
        assert!(check_idx < mkfs_idx);
    }

    #[test]
    fn plan_create_threads_wipe_flag_into_signature_check_args() {
        let (_dir, store) = store();
        let mut wiped = intent();
        wiped.label = "tank2".into();
        wiped.wipe = true;
        let pool_plan = plan_create(&store, wiped).unwrap();
        let check = pool_plan
            .plan
            .steps
            .iter()
            .find(|s| s.name == "check-device-signatures")
            .unwrap();
        assert_eq!(check.args["wipe"], serde_json::json!(true));
    }

    #[test]
    fn plan_create_rejects_invalid_label() {
        let (_dir, store) = store();
        let mut bad = intent();
        bad.label = "bad label".into();
        assert!(plan_create(&store, bad).is_err());
    }

    #[test]
    fn plan_create_rejects_insufficient_devices_for_raid1() {
        let (_dir, store) = store();
        let mut bad = intent();
        bad.devices = vec!["/dev/sda".into()];
        bad.device_sizes = vec![1_000_000_000];
        assert!(plan_create(&store, bad).is_err());
    }

    #[test]
    fn plan_create_rejects_duplicate_label() {
        let (_dir, store) = store();
        let pool_plan = plan_create(&store, intent()).unwrap();
        store.insert(pool_plan.pool).unwrap();
        assert!(matches!(
            plan_create(&store, intent()),
            Err(WorkflowError::Conflict { code: ErrorCode::ValidationPoolLabelInvalid, .. })
        ));
    }

    #[test]
    fn every_subvolume_step_carries_a_delete_compensation() {
        let (_dir, store) = store();
        let pool_plan = plan_create(&store, intent()).unwrap();
        let compensated = pool_plan
            .plan
            .steps
            .iter()
            .filter(|s| s.name.starts_with("create-subvolume-"))
            .all(|s| s.compensation.is_some());
        assert!(compensated);
    }
}
