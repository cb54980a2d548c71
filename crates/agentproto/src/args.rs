use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BtrfsCheckDeviceSignaturesArgs {
    pub devices: Vec<String>,
    pub wipe: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BtrfsMkfsArgs {
    pub devices: Vec<String>,
    pub raid: String,
    pub label: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BtrfsMountArgs {
    pub device: String,
    pub mountpoint: String,
    pub options: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BtrfsSubvolumeCreateArgs {
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BtrfsSubvolumeSnapshotArgs {
    pub source: String,
    pub dest: String,
    pub read_only: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BtrfsSubvolumeDeleteArgs {
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BtrfsSendArgs {
    pub snapshot: String,
    pub parent: Option<String>,
    pub dest: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BtrfsReceiveArgs {
    pub archive: String,
    pub dest: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BtrfsScrubArgs {
    pub mountpoint: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BtrfsBalanceArgs {
    pub mountpoint: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BtrfsReplaceArgs {
    pub mountpoint: String,
    pub old_device: String,
    pub new_device: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SharesCreateDirArgs {
    pub path: String,
    pub mode: u32,
    pub as_subvolume: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SharesEnsureGroupArgs {
    pub group: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AclEntry {
    pub principal: String,
    pub perms: String,
    pub default: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SharesApplyAclArgs {
    pub path: String,
    pub entries: Vec<AclEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SharesWriteSmbConfigArgs {
    pub name: String,
    pub rendered: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SharesRemoveSmbConfigArgs {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SharesWriteNfsExportArgs {
    pub name: String,
    pub rendered: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SharesRemoveNfsExportArgs {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SharesWriteAvahiServiceArgs {
    pub name: String,
    pub rendered: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SharesRemoveAvahiServiceArgs {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FirewallWriteRulesetArgs {
    pub rendered: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FirewallDryRunArgs {
    pub rendered: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FirewallApplyArgs {
    pub rendered: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemctlUnitArgs {
    pub unit: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PkgArgs {
    pub packages: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DockerComposeArgs {
    pub project_dir: String,
}
