use serde::{Deserialize, Serialize};

/// The closed whitelist of operations the agent will execute. Keyed by URL
/// path (`/v1/<domain>/<op>`); any request for an op not listed here is
/// rejected before the agent touches an external tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AgentOp {
    #[serde(rename = "btrfs.scrub.start")]
    BtrfsScrubStart,
    #[serde(rename = "btrfs.scrub.status")]
    BtrfsScrubStatus,
    #[serde(rename = "btrfs.balance.start")]
    BtrfsBalanceStart,
    #[serde(rename = "btrfs.balance.status")]
    BtrfsBalanceStatus,
    #[serde(rename = "btrfs.replace.start")]
    BtrfsReplaceStart,
    #[serde(rename = "btrfs.replace.status")]
    BtrfsReplaceStatus,
    #[serde(rename = "btrfs.check-device-signatures")]
    BtrfsCheckDeviceSignatures,
    #[serde(rename = "btrfs.mkfs")]
    BtrfsMkfs,
    #[serde(rename = "btrfs.subvolume.create")]
    BtrfsSubvolumeCreate,
    #[serde(rename = "btrfs.subvolume.snapshot")]
    BtrfsSubvolumeSnapshot,
    #[serde(rename = "btrfs.subvolume.delete")]
    BtrfsSubvolumeDelete,
    #[serde(rename = "btrfs.send")]
    BtrfsSend,
    #[serde(rename = "btrfs.receive")]
    BtrfsReceive,
    #[serde(rename = "btrfs.mount")]
    BtrfsMount,

    #[serde(rename = "shares.create-dir")]
    SharesCreateDir,
    #[serde(rename = "shares.apply-acl")]
    SharesApplyAcl,
    #[serde(rename = "shares.write-smb-config")]
    SharesWriteSmbConfig,
    #[serde(rename = "shares.remove-smb-config")]
    SharesRemoveSmbConfig,
    #[serde(rename = "shares.write-nfs-export")]
    SharesWriteNfsExport,
    #[serde(rename = "shares.remove-nfs-export")]
    SharesRemoveNfsExport,
    #[serde(rename = "shares.write-avahi-service")]
    SharesWriteAvahiService,
    #[serde(rename = "shares.remove-avahi-service")]
    SharesRemoveAvahiService,
    #[serde(rename = "shares.ensure-group")]
    SharesEnsureGroup,
    #[serde(rename = "shares.validate-smb-config")]
    SharesValidateSmbConfig,

    #[serde(rename = "firewall.write-ruleset")]
    FirewallWriteRuleset,
    #[serde(rename = "firewall.apply")]
    FirewallApply,
    #[serde(rename = "firewall.rollback")]
    FirewallRollback,
    #[serde(rename = "firewall.dry-run")]
    FirewallDryRun,

    #[serde(rename = "systemctl.is-active")]
    SystemctlIsActive,
    #[serde(rename = "systemctl.start")]
    SystemctlStart,
    #[serde(rename = "systemctl.stop")]
    SystemctlStop,
    #[serde(rename = "systemctl.enable")]
    SystemctlEnable,
    #[serde(rename = "systemctl.disable")]
    SystemctlDisable,
    #[serde(rename = "systemctl.reload-or-restart")]
    SystemctlReloadOrRestart,

    #[serde(rename = "pkg.install")]
    PkgInstall,
    #[serde(rename = "pkg.remove")]
    PkgRemove,

    #[serde(rename = "docker.compose-up")]
    DockerComposeUp,
    #[serde(rename = "docker.compose-down")]
    DockerComposeDown,
    #[serde(rename = "docker.compose-ps")]
    DockerComposePs,
}

impl AgentOp {
    /// The socket path this op is dispatched on, e.g. `/v1/btrfs/scrub/start`.
    pub fn path(self) -> &'static str {
        match self {
            AgentOp::BtrfsScrubStart => "/v1/btrfs/scrub/start",
            AgentOp::BtrfsScrubStatus => "/v1/btrfs/scrub/status",
            AgentOp::BtrfsBalanceStart => "/v1/btrfs/balance/start",
            AgentOp::BtrfsBalanceStatus => "/v1/btrfs/balance/status",
            AgentOp::BtrfsReplaceStart => "/v1/btrfs/replace/start",
            AgentOp::BtrfsReplaceStatus => "/v1/btrfs/replace/status",
            AgentOp::BtrfsCheckDeviceSignatures => "/v1/btrfs/check-device-signatures",
            AgentOp::BtrfsMkfs => "/v1/btrfs/mkfs",
            AgentOp::BtrfsSubvolumeCreate => "/v1/btrfs/subvolume/create",
            AgentOp::BtrfsSubvolumeSnapshot => "/v1/btrfs/subvolume/snapshot",
            AgentOp::BtrfsSubvolumeDelete => "/v1/btrfs/subvolume/delete",
            AgentOp::BtrfsSend => "/v1/btrfs/send",
            AgentOp::BtrfsReceive => "/v1/btrfs/receive",
            AgentOp::BtrfsMount => "/v1/btrfs/mount",
            AgentOp::SharesCreateDir => "/v1/shares/create-dir",
            AgentOp::SharesApplyAcl => "/v1/shares/apply-acl",
            AgentOp::SharesWriteSmbConfig => "/v1/shares/write-smb-config",
            AgentOp::SharesRemoveSmbConfig => "/v1/shares/remove-smb-config",
            AgentOp::SharesWriteNfsExport => "/v1/shares/write-nfs-export",
            AgentOp::SharesRemoveNfsExport => "/v1/shares/remove-nfs-export",
            AgentOp::SharesWriteAvahiService => "/v1/shares/write-avahi-service",
            AgentOp::SharesRemoveAvahiService => "/v1/shares/remove-avahi-service",
            AgentOp::SharesEnsureGroup => "/v1/shares/ensure-group",
            AgentOp::SharesValidateSmbConfig => "/v1/shares/validate-smb-config",
            AgentOp::FirewallWriteRuleset => "/v1/firewall/write-ruleset",
            AgentOp::FirewallApply => "/v1/firewall/apply",
            AgentOp::FirewallRollback => "/v1/firewall/rollback",
            AgentOp::FirewallDryRun => "/v1/firewall/dry-run",
            AgentOp::SystemctlIsActive => "/v1/systemctl/is-active",
            AgentOp::SystemctlStart => "/v1/systemctl/start",
            AgentOp::SystemctlStop => "/v1/systemctl/stop",
            AgentOp::SystemctlEnable => "/v1/systemctl/enable",
            AgentOp::SystemctlDisable => "/v1/systemctl/disable",
            AgentOp::SystemctlReloadOrRestart => "/v1/systemctl/reload-or-restart",
            AgentOp::PkgInstall => "/v1/pkg/install",
            AgentOp::PkgRemove => "/v1/pkg/remove",
            AgentOp::DockerComposeUp => "/v1/docker/compose-up",
            AgentOp::DockerComposeDown => "/v1/docker/compose-down",
            AgentOp::DockerComposePs => "/v1/docker/compose-ps",
        }
    }

    /// Ops whose output is streamed as NDJSON log lines terminated by a
    /// `TerminalEnvelope`, rather than returning a single JSON body.
    pub fn is_streaming(self) -> bool {
        matches!(
            self,
            AgentOp::BtrfsScrubStart
                | AgentOp::BtrfsBalanceStart
                | AgentOp::BtrfsReplaceStart
                | AgentOp::BtrfsMkfs
                | AgentOp::BtrfsSend
                | AgentOp::BtrfsReceive
                | AgentOp::PkgInstall
                | AgentOp::PkgRemove
                | AgentOp::DockerComposeUp
                | AgentOp::DockerComposeDown
        )
    }

    pub const ALL: &'static [AgentOp] = &[
        AgentOp::BtrfsScrubStart,
        AgentOp::BtrfsScrubStatus,
        AgentOp::BtrfsBalanceStart,
        AgentOp::BtrfsBalanceStatus,
        AgentOp::BtrfsReplaceStart,
        AgentOp::BtrfsReplaceStatus,
        AgentOp::BtrfsCheckDeviceSignatures,
        AgentOp::BtrfsMkfs,
        AgentOp::BtrfsSubvolumeCreate,
        AgentOp::BtrfsSubvolumeSnapshot,
        AgentOp::BtrfsSubvolumeDelete,
        AgentOp::BtrfsSend,
        AgentOp::BtrfsReceive,
        AgentOp::BtrfsMount,
        AgentOp::SharesCreateDir,
        AgentOp::SharesApplyAcl,
        AgentOp::SharesWriteSmbConfig,
        AgentOp::SharesRemoveSmbConfig,
        AgentOp::SharesWriteNfsExport,
        AgentOp::SharesRemoveNfsExport,
        AgentOp::SharesWriteAvahiService,
        AgentOp::SharesRemoveAvahiService,
        AgentOp::SharesEnsureGroup,
        AgentOp::SharesValidateSmbConfig,
        AgentOp::FirewallWriteRuleset,
        AgentOp::FirewallApply,
        AgentOp::FirewallRollback,
        AgentOp::FirewallDryRun,
        AgentOp::SystemctlIsActive,
        AgentOp::SystemctlStart,
        AgentOp::SystemctlStop,
        AgentOp::SystemctlEnable,
        AgentOp::SystemctlDisable,
        AgentOp::SystemctlReloadOrRestart,
        AgentOp::PkgInstall,
        AgentOp::PkgRemove,
        AgentOp::DockerComposeUp,
        AgentOp::DockerComposeDown,
        AgentOp::DockerComposePs,
    ];
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_matches_dispatch_convention() {
        assert_eq!(AgentOp::BtrfsScrubStart.path(), "/v1/btrfs/scrub/start");
        assert_eq!(AgentOp::SharesEnsureGroup.path(), "/v1/shares/ensure-group");
    }

    #[test]
    fn every_op_has_a_distinct_path() {
        let mut paths: Vec<&str> = AgentOp::ALL.iter().map(|op| op.path()).collect();
        let before = paths.len();
        paths.sort_unstable();
        paths.dedup();
        assert_eq!(paths.len(), before);
    }

    #[test]
    fn serializes_to_dotted_wire_name() {
        let json = serde_json::to_string(&AgentOp::BtrfsScrubStart).unwrap();
        assert_eq!(json, "\"btrfs.scrub.start\"");
    }

    #[test]
    fn long_running_ops_stream() {
        assert!(AgentOp::BtrfsScrubStart.is_streaming());
        assert!(!AgentOp::SystemctlIsActive.is_streaming());
    }
}
