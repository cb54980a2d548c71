use std::path::PathBuf;
use std::sync::Arc;

use jiff::Timestamp;
use uuid::Uuid;

use agentproto::{
    AclEntry, AgentOp, SharesApplyAclArgs, SharesCreateDirArgs, SharesEnsureGroupArgs,
    SharesRemoveAvahiServiceArgs, SharesRemoveNfsExportArgs, SharesRemoveSmbConfigArgs,
    SharesWriteAvahiServiceArgs, SharesWriteNfsExportArgs, SharesWriteSmbConfigArgs,
    SystemctlUnitArgs,
};
use shared::error::ErrorCode;
use shared::konst::SHARES_MOUNT_ROOT;
use shared::model::{NfsConfig, Principal, Share, SmbConfig};
use template::{AvahiAdiskTemplate, NfsExportTemplate, NfsNetworkEntry, SambaShareTemplate, Template};
use txengine::{CompensatingAction, Engine, Plan, PlanStep};
use validate::{validate_principal, validate_share_name};

use super::{to_args, WorkflowError};

/// fsatomic-backed share registry at `/etc/nos/shares.json`.
pub struct ShareStore {
    path: PathBuf,
}

impl ShareStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn list(&self) -> anyhow::Result<Vec<Share>> {
        Ok(fsatomic::load_json(&self.path)?.unwrap_or_default())
    }

    pub fn find(&self, name: &str) -> anyhow::Result<Option<Share>> {
        Ok(self.list()?.into_iter().find(|s| s.name == name))
    }

    fn upsert(&self, share: Share) -> anyhow::Result<()> {
        fsatomic::with_lock(&self.path, || {
            let mut shares = self.list()?;
            if let Some(existing) = shares.iter_mut().find(|s| s.name == share.name) {
                *existing = share;
            } else {
                shares.push(share);
            }
            fsatomic::save_json(&self.path, &shares, 0o640)
        })
    }

    fn remove(&self, name: &str) -> anyhow::Result<()> {
        fsatomic::with_lock(&self.path, || {
            let mut shares = self.list()?;
            shares.retain(|s| s.name != name);
            fsatomic::save_json(&self.path, &shares, 0o640)
        })
    }
}

#[derive(Debug, Clone)]
pub struct ShareIntent {
    pub name: String,
    pub smb: Option<SmbConfig>,
    pub nfs: Option<NfsConfig>,
    pub owners: Vec<String>,
    pub readers: Vec<String>,
    pub description: String,
    pub nfs_networks: Vec<NfsNetworkEntry>,
}

fn share_path(name: &str) -> String {
    format!("{SHARES_MOUNT_ROOT}/{name}")
}

fn principal_wire(p: &Principal) -> String {
    match p {
        Principal::User { name } => format!("user:{name}"),
        Principal::Group { name } => format!("group:{name}"),
    }
}

fn parse_principals(values: &[String]) -> Result<Vec<Principal>, WorkflowError> {
    values.iter().map(|p| Ok(validate_principal(p)?)).collect()
}

/// Builds the create/update plan for a share: directory + group + ACL,
/// then SMB/NFS config with an Avahi `_adisk` advert when Time Machine is
/// enabled. `is_update` only changes the name-collision check and whether
/// the directory step is allowed to assume the path is already a subvolume.
pub fn plan_create_or_update(
    store: &ShareStore,
    intent: ShareIntent,
    is_update: bool,
) -> Result<Plan, WorkflowError> {
    validate_share_name(&intent.name)?;
    let owners = parse_principals(&intent.owners)?;
    let readers = parse_principals(&intent.readers)?;

    let smb_enabled = intent.smb.as_ref().is_some_and(|s| s.enabled);
    let nfs_enabled = intent.nfs.as_ref().is_some_and(|n| n.enabled);
    if !smb_enabled && !nfs_enabled {
        return Err(WorkflowError::conflict(
            ErrorCode::ValidationSmbConfigInvalid,
            "at least one of smb or nfs must be enabled",
        ));
    }

    let existing = store.find(&intent.name)?;
    if !is_update && existing.is_some() {
        return Err(WorkflowError::conflict(
            ErrorCode::ValidationShareNameExists,
            format!("share {} already exists", intent.name),
        ));
    }
    if is_update && existing.is_none() {
        return Err(WorkflowError::conflict(
            ErrorCode::ValidationShareNameExists,
            format!("share {} does not exist", intent.name),
        ));
    }

    let path = share_path(&intent.name);
    let group = format!("nos-share-{}", intent.name);

    let mut plan = Plan::new("share");

    plan.push(PlanStep::new(
        "create-dir",
        AgentOp::SharesCreateDir,
        to_args(SharesCreateDirArgs { path: path.clone(), mode: 0o2770, as_subvolume: !is_update })?,
        false,
    ));

    plan.push(PlanStep::new(
        "ensure-group",
        AgentOp::SharesEnsureGroup,
        to_args(SharesEnsureGroupArgs { group })?,
        false,
    ));

    let mut acl_entries = Vec::new();
    for principal in &owners {
        let wire = principal_wire(principal);
        acl_entries.push(AclEntry { principal: wire.clone(), perms: "rwx".into(), default: true });
        acl_entries.push(AclEntry { principal: wire, perms: "rwx".into(), default: false });
    }
    for principal in &readers {
        let wire = principal_wire(principal);
        acl_entries.push(AclEntry { principal: wire.clone(), perms: "r-x".into(), default: true });
        acl_entries.push(AclEntry { principal: wire, perms: "r-x".into(), default: false });
    }
    plan.push(PlanStep::new(
        "apply-acl",
        AgentOp::SharesApplyAcl,
        to_args(SharesApplyAclArgs { path: path.clone(), entries: acl_entries })?,
        false,
    ));

    if smb_enabled {
        let smb = intent.smb.clone().unwrap_or_default();
        let recycle_dir = smb.recycle_bin.then(|| format!("{path}/.recycle"));
        let rendered = SambaShareTemplate::new(
            intent.name.clone(),
            path.clone(),
            smb.guest_ok,
            recycle_dir,
            smb.time_machine,
            intent.description.clone(),
        )
        .map_err(WorkflowError::Internal)?
        .render()
        .map_err(|e| WorkflowError::Internal(e.into()))?;

        plan.push(
            PlanStep::new(
                "write-smb-config",
                AgentOp::SharesWriteSmbConfig,
                to_args(SharesWriteSmbConfigArgs { name: intent.name.clone(), rendered })?,
                false,
            )
            .with_compensation(CompensatingAction::new(
                "remove-smb-config",
                AgentOp::SharesRemoveSmbConfig,
                to_args(SharesRemoveSmbConfigArgs { name: intent.name.clone() })?,
            )),
        );
        plan.push(PlanStep::new(
            "validate-smb-config",
            AgentOp::SharesValidateSmbConfig,
            to_args(serde_json::json!({}))?,
            false,
        ));
        plan.push(PlanStep::new(
            "reload-smbd",
            AgentOp::SystemctlReloadOrRestart,
            to_args(SystemctlUnitArgs { unit: "smbd.service".into() })?,
            false,
        ));

        if smb.time_machine {
            let rendered = AvahiAdiskTemplate::new(intent.name.clone())
                .map_err(WorkflowError::Internal)?
                .render()
                .map_err(|e| WorkflowError::Internal(e.into()))?;
            plan.push(
                PlanStep::new(
                    "write-avahi-service",
                    AgentOp::SharesWriteAvahiService,
                    to_args(SharesWriteAvahiServiceArgs { name: intent.name.clone(), rendered })?,
                    false,
                )
                .with_compensation(CompensatingAction::new(
                    "remove-avahi-service",
                    AgentOp::SharesRemoveAvahiService,
                    to_args(SharesRemoveAvahiServiceArgs { name: intent.name.clone() })?,
                )),
            );
        }
    }

    if nfs_enabled {
        let nfs = intent.nfs.clone().unwrap_or_default();
        let networks = if intent.nfs_networks.is_empty() {
            vec![NfsNetworkEntry { network: "0.0.0.0/0".into(), read_only: nfs.read_only }]
        } else {
            intent.nfs_networks
        };
        let rendered = NfsExportTemplate::new(path.clone(), networks)
            .map_err(WorkflowError::Internal)?
            .render()
            .map_err(|e| WorkflowError::Internal(e.into()))?;
        plan.push(
            PlanStep::new(
                "write-nfs-export",
                AgentOp::SharesWriteNfsExport,
                to_args(SharesWriteNfsExportArgs { name: intent.name.clone(), rendered })?,
                false,
            )
            .with_compensation(CompensatingAction::new(
                "remove-nfs-export",
                AgentOp::SharesRemoveNfsExport,
                to_args(SharesRemoveNfsExportArgs { name: intent.name.clone() })?,
            )),
        );
        plan.push(PlanStep::new(
            "reload-exports",
            AgentOp::SystemctlReloadOrRestart,
            to_args(SystemctlUnitArgs { unit: "nfs-server.service".into() })?,
            false,
        ));
    }

    Ok(plan)
}

pub async fn apply_create_or_update(
    store: &ShareStore,
    engine: &Arc<Engine>,
    intent: ShareIntent,
    is_update: bool,
) -> Result<Uuid, WorkflowError> {
    let owners = parse_principals(&intent.owners)?;
    let readers = parse_principals(&intent.readers)?;
    let created_at = if is_update {
        store.find(&intent.name)?.map(|s| s.created_at).unwrap_or_else(Timestamp::now)
    } else {
        Timestamp::now()
    };

    let plan = plan_create_or_update(store, intent.clone(), is_update)?;

    let share = Share {
        name: intent.name.clone(),
        path: share_path(&intent.name),
        smb: intent.smb,
        nfs: intent.nfs,
        owners,
        readers,
        description: intent.description,
        created_at,
        updated_at: Timestamp::now(),
    };
    store.upsert(share)?;

    let tx_id = engine.apply(plan).await?;
    Ok(tx_id)
}

pub async fn apply_delete(store: &ShareStore, engine: &Arc<Engine>, name: &str) -> Result<Uuid, WorkflowError> {
    let existing = store.find(name)?.ok_or_else(|| {
        WorkflowError::conflict(ErrorCode::ValidationShareNameExists, format!("share {name} does not exist"))
    })?;

    let mut plan = Plan::new("share");
    if existing.smb.as_ref().is_some_and(|s| s.enabled) {
        plan.push(PlanStep::new(
            "remove-smb-config",
            AgentOp::SharesRemoveSmbConfig,
            to_args(SharesRemoveSmbConfigArgs { name: name.to_string() })?,
            true,
        ));
        plan.push(PlanStep::new(
            "validate-smb-config",
            AgentOp::SharesValidateSmbConfig,
            to_args(serde_json::json!({}))?,
            false,
        ));
        plan.push(PlanStep::new(
            "reload-smbd",
            AgentOp::SystemctlReloadOrRestart,
            to_args(SystemctlUnitArgs { unit: "smbd.service".into() })?,
            false,
        ));
        if existing.is_time_machine() {
            plan.push(PlanStep::new(
                "remove-avahi-service",
                AgentOp::SharesRemoveAvahiService,
                to_args(SharesRemoveAvahiServiceArgs { name: name.to_string() })?,
                true,
            ));
        }
    }
    if existing.nfs.as_ref().is_some_and(|n| n.enabled) {
        plan.push(PlanStep::new(
            "remove-nfs-export",
            AgentOp::SharesRemoveNfsExport,
            to_args(SharesRemoveNfsExportArgs { name: name.to_string() })?,
            true,
        ));
        plan.push(PlanStep::new(
            "reload-exports",
            AgentOp::SystemctlReloadOrRestart,
            to_args(SystemctlUnitArgs { unit: "nfs-server.service".into() })?,
            false,
        ));
    }

    store.remove(name)?;
    let tx_id = engine.apply(plan).await?;
    Ok(tx_id)
}

/// Issues a dry-run check of the share's exported services without
/// changing any state, for the "/shares/{name}/test" endpoint.
pub async fn test_share(engine: &Arc<Engine>, name: &str, smb_enabled: bool, nfs_enabled: bool) -> Result<Uuid, WorkflowError> {
    let mut plan = Plan::new("share");
    if smb_enabled {
        plan.push(PlanStep::new(
            "check-smbd",
            AgentOp::SystemctlIsActive,
            to_args(SystemctlUnitArgs { unit: "smbd.service".into() })?,
            false,
        ));
    }
    if nfs_enabled {
        plan.push(PlanStep::new(
            "check-nfs-server",
            AgentOp::SystemctlIsActive,
            to_args(SystemctlUnitArgs { unit: "nfs-server.service".into() })?,
            false,
        ));
    }
    let tx_id = engine.apply(plan).await?;
    Ok(tx_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store() -> (TempDir, ShareStore) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("shares.json");
        (dir, ShareStore::new(path))
    }

    fn intent() -> ShareIntent {
        ShareIntent {
            name: "docs".into(),
            smb: Some(SmbConfig { enabled: true, guest_ok: false, time_machine: false, recycle_bin: true }),
            nfs: None,
            owners: vec!["user:alice".into()],
            readers: vec!["group:family".into()],
            description: "Docs share".into(),
            nfs_networks: vec![],
        }
    }

    #[test]
    fn plan_create_requires_at_least_one_protocol() {
        let (_dir, store) = store();
        let mut bad = intent();
        bad.smb = None;
        bad.nfs = None;
        assert!(plan_create_or_update(&store, bad, false).is_err());
    }

    #[test]
    fn plan_create_rejects_invalid_owner_principal() {
        let (_dir, store) = store();
        let mut bad = intent();
        bad.owners = vec!["nobody".into()];
        assert!(plan_create_or_update(&store, bad, false).is_err());
    }

    #[test]
    fn plan_create_includes_smb_and_acl_steps() {
        let (_dir, store) = store();
        let plan = plan_create_or_update(&store, intent(), false).unwrap();
        let names: Vec<_> = plan.steps.iter().map(|s| s.name.as_str()).collect();
        assert!(names.contains(&"create-dir"));
        assert!(names.contains(&"apply-acl"));
        assert!(names.contains(&"write-smb-config"));
        assert!(names.contains(&"validate-smb-config"));
        assert!(names.contains(&"reload-smbd"));
        assert!(!names.contains(&"write-avahi-service"));

        let validate_idx = names.iter().position(|n| *n == "validate-smb-config").unwrap();
        let reload_idx = names.iter().position(|n| *n == "reload-smbd").unwrap();
        assert!(validate_idx < reload_idx, "smb config must be validated before it is reloaded");
    }

    #[test]
    fn time_machine_share_gets_avahi_step_with_compensation() {
        let (_dir, store) = store();
        let mut tm = intent();
        tm.smb = Some(SmbConfig { enabled: true, guest_ok: false, time_machine: true, recycle_bin: false });
        let plan = plan_create_or_update(&store, tm, false).unwrap();
        let avahi_step = plan.steps.iter().find(|s| s.name == "write-avahi-service").unwrap();
        assert!(avahi_step.compensation.is_some());
    }

    #[test]
    fn update_of_nonexistent_share_is_rejected() {
        let (_dir, store) = store();
        assert!(matches!(
            plan_create_or_update(&store, intent(), true),
            Err(WorkflowError::Conflict { code: ErrorCode::ValidationShareNameExists, .. })
        ));
    }
}
