use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow, bail};
use tokio::sync::mpsc;

use agentproto::{
    AclEntry, AgentOp, BtrfsBalanceArgs, BtrfsCheckDeviceSignaturesArgs, BtrfsMkfsArgs,
    BtrfsMountArgs, BtrfsReceiveArgs, BtrfsReplaceArgs, BtrfsScrubArgs, BtrfsSendArgs,
    BtrfsSubvolumeCreateArgs, BtrfsSubvolumeDeleteArgs, BtrfsSubvolumeSnapshotArgs,
    DockerComposeArgs, FirewallApplyArgs, FirewallDryRunArgs, FirewallWriteRulesetArgs, PkgArgs,
    SharesApplyAclArgs, SharesCreateDirArgs, SharesEnsureGroupArgs,
    SharesRemoveAvahiServiceArgs, SharesRemoveNfsExportArgs, SharesRemoveSmbConfigArgs,
    SharesWriteAvahiServiceArgs, SharesWriteNfsExportArgs, SharesWriteSmbConfigArgs,
    SystemctlUnitArgs,
};

use crate::canon::canonicalize_under;
use crate::config::AgentConfig;
use crate::exec::{remove_file_if_exists, run_streaming, run_to_completion, write_rendered_file};

fn parse_args<T: serde::de::DeserializeOwned>(args: serde_json::Value) -> Result<T> {
    serde_json::from_value(args).context("deserializing operation arguments")
}

fn require_under_allowed(config: &AgentConfig, path: &str) -> Result<PathBuf> {
    canonicalize_under(Path::new(path), &config.allowed_path_prefixes)
}

/// Non-streaming ops: run to completion, return the JSON body to send back.
pub async fn dispatch_json(
    op: AgentOp,
    args: serde_json::Value,
    config: &AgentConfig,
) -> Result<serde_json::Value> {
    match op {
        AgentOp::BtrfsScrubStatus => {
            let a: BtrfsScrubArgs = parse_args(args)?;
            let out = run_to_completion("btrfs", &["scrub", "status", &a.mountpoint]).await?;
            Ok(serde_json::json!({ "output": out }))
        }
        AgentOp::BtrfsBalanceStatus => {
            let a: BtrfsBalanceArgs = parse_args(args)?;
            let out = run_to_completion("btrfs", &["balance", "status", &a.mountpoint]).await?;
            Ok(serde_json::json!({ "output": out }))
        }
        AgentOp::BtrfsReplaceStatus => {
            let a: BtrfsReplaceArgs = parse_args(args)?;
            let out = run_to_completion("btrfs", &["replace", "status", &a.mountpoint]).await?;
            Ok(serde_json::json!({ "output": out }))
        }
        AgentOp::BtrfsCheckDeviceSignatures => {
            let a: BtrfsCheckDeviceSignaturesArgs = parse_args(args)?;
            let mut signatures = Vec::new();
            for device in &a.devices {
                let out = run_to_completion("wipefs", &["--output=TYPE", "--noheadings", device])
                    .await
                    .unwrap_or_default();
                let found: Vec<&str> = out.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
                if !found.is_empty() {
                    signatures.push(serde_json::json!({ "device": device, "types": found }));
                }
            }
            if !signatures.is_empty() && !a.wipe {
                anyhow::bail!(
                    "existing filesystem signature found on device(s), refusing to format without wipe=true: {signatures:?}"
                );
            }
            Ok(serde_json::json!({ "signatures": signatures }))
        }
        AgentOp::BtrfsSubvolumeCreate => {
            let a: BtrfsSubvolumeCreateArgs = parse_args(args)?;
            let path = require_under_allowed(config, &a.path)?;
            run_to_completion("btrfs", &["subvolume", "create", &path.to_string_lossy()]).await?;
            Ok(serde_json::json!({}))
        }
        AgentOp::BtrfsSubvolumeSnapshot => {
            let a: BtrfsSubvolumeSnapshotArgs = parse_args(args)?;
            let source = require_under_allowed(config, &a.source)?;
            let dest = require_under_allowed(config, &a.dest)?;
            let mut cmd_args = vec!["subvolume", "snapshot"];
            if a.read_only {
                cmd_args.push("-r");
            }
            let source_str = source.to_string_lossy().into_owned();
            let dest_str = dest.to_string_lossy().into_owned();
            cmd_args.push(&source_str);
            cmd_args.push(&dest_str);
            run_to_completion("btrfs", &cmd_args).await?;
            Ok(serde_json::json!({}))
        }
        AgentOp::BtrfsSubvolumeDelete => {
            let a: BtrfsSubvolumeDeleteArgs = parse_args(args)?;
            let path = require_under_allowed(config, &a.path)?;
            run_to_completion("btrfs", &["subvolume", "delete", &path.to_string_lossy()]).await?;
            Ok(serde_json::json!({}))
        }
        AgentOp::BtrfsMount => {
            let a: BtrfsMountArgs = parse_args(args)?;
            let mountpoint = require_under_allowed(config, &a.mountpoint)?;
            run_to_completion(
                "mount",
                &["-o", &a.options, &a.device, &mountpoint.to_string_lossy()],
            )
            .await?;
            Ok(serde_json::json!({}))
        }

        AgentOp::SharesCreateDir => {
            let a: SharesCreateDirArgs = parse_args(args)?;
            let path = require_under_allowed(config, &a.path)?;
            if a.as_subvolume {
                run_to_completion("btrfs", &["subvolume", "create", &path.to_string_lossy()])
                    .await?;
            } else {
                std::fs::create_dir_all(&path)
                    .with_context(|| format!("creating directory {}", path.display()))?;
            }
            let mode_str = format!("{:o}", a.mode);
            run_to_completion("chmod", &[&mode_str, &path.to_string_lossy()]).await?;
            Ok(serde_json::json!({}))
        }
        AgentOp::SharesEnsureGroup => {
            let a: SharesEnsureGroupArgs = parse_args(args)?;
            let existing = run_to_completion("getent", &["group", &a.group]).await;
            if existing.is_err() {
                run_to_completion("groupadd", &[&a.group]).await?;
            }
            Ok(serde_json::json!({}))
        }
        AgentOp::SharesValidateSmbConfig => {
            // Dry-runs the merged smb.conf (including every fragment under
            // smb.conf.d) before a reload is allowed to pick it up, so a
            // malformed fragment never reaches a running smbd.
            let out = run_to_completion("testparm", &["-s"]).await?;
            Ok(serde_json::json!({ "output": out }))
        }
        AgentOp::SharesApplyAcl => {
            let a: SharesApplyAclArgs = parse_args(args)?;
            let path = require_under_allowed(config, &a.path)?;
            apply_acl_entries(&path, &a.entries).await?;
            Ok(serde_json::json!({}))
        }
        AgentOp::SharesWriteSmbConfig => {
            let a: SharesWriteSmbConfigArgs = parse_args(args)?;
            let path = smb_fragment_path(config, &a.name)?;
            write_rendered_file(&path, &a.rendered)?;
            Ok(serde_json::json!({}))
        }
        AgentOp::SharesRemoveSmbConfig => {
            let a: SharesRemoveSmbConfigArgs = parse_args(args)?;
            let path = smb_fragment_path(config, &a.name)?;
            remove_file_if_exists(&path)?;
            Ok(serde_json::json!({}))
        }
        AgentOp::SharesWriteNfsExport => {
            let a: SharesWriteNfsExportArgs = parse_args(args)?;
            let path = nfs_fragment_path(config, &a.name)?;
            write_rendered_file(&path, &a.rendered)?;
            run_to_completion("exportfs", &["-ra"]).await?;
            Ok(serde_json::json!({}))
        }
        AgentOp::SharesRemoveNfsExport => {
            let a: SharesRemoveNfsExportArgs = parse_args(args)?;
            let path = nfs_fragment_path(config, &a.name)?;
            remove_file_if_exists(&path)?;
            run_to_completion("exportfs", &["-ra"]).await?;
            Ok(serde_json::json!({}))
        }
        AgentOp::SharesWriteAvahiService => {
            let a: SharesWriteAvahiServiceArgs = parse_args(args)?;
            let path = avahi_fragment_path(config, &a.name)?;
            write_rendered_file(&path, &a.rendered)?;
            Ok(serde_json::json!({}))
        }
        AgentOp::SharesRemoveAvahiService => {
            let a: SharesRemoveAvahiServiceArgs = parse_args(args)?;
            let path = avahi_fragment_path(config, &a.name)?;
            remove_file_if_exists(&path)?;
            Ok(serde_json::json!({}))
        }

        AgentOp::FirewallWriteRuleset => {
            let a: FirewallWriteRulesetArgs = parse_args(args)?;
            let path = nftables_path(config)?;
            write_rendered_file(&path, &a.rendered)?;
            Ok(serde_json::json!({}))
        }
        AgentOp::FirewallDryRun => {
            let a: FirewallDryRunArgs = parse_args(args)?;
            let tmp = std::env::temp_dir().join(format!("nftables-dry-{}.conf", std::process::id()));
            std::fs::write(&tmp, &a.rendered).context("writing dry-run ruleset")?;
            let result = run_to_completion("nft", &["-c", "-f", &tmp.to_string_lossy()]).await;
            let _ = std::fs::remove_file(&tmp);
            result?;
            Ok(serde_json::json!({}))
        }
        AgentOp::FirewallApply => {
            let a: FirewallApplyArgs = parse_args(args)?;
            let path = nftables_path(config)?;
            write_rendered_file(&path, &a.rendered)?;
            run_to_completion("nft", &["-f", &path.to_string_lossy()]).await?;
            Ok(serde_json::json!({}))
        }
        AgentOp::FirewallRollback => {
            // Re-applies whatever is currently on disk at the canonical path,
            // which the caller must have already restored to the prior ruleset.
            let path = nftables_path(config)?;
            run_to_completion("nft", &["-f", &path.to_string_lossy()]).await?;
            Ok(serde_json::json!({}))
        }

        AgentOp::SystemctlIsActive => {
            let a: SystemctlUnitArgs = parse_args(args)?;
            let out = run_to_completion("systemctl", &["is-active", &a.unit]).await;
            Ok(serde_json::json!({ "active": out.is_ok() }))
        }
        AgentOp::SystemctlStart => {
            let a: SystemctlUnitArgs = parse_args(args)?;
            run_to_completion("systemctl", &["start", &a.unit]).await?;
            Ok(serde_json::json!({}))
        }
        AgentOp::SystemctlStop => {
            let a: SystemctlUnitArgs = parse_args(args)?;
            run_to_completion("systemctl", &["stop", &a.unit]).await?;
            Ok(serde_json::json!({}))
        }
        AgentOp::SystemctlEnable => {
            let a: SystemctlUnitArgs = parse_args(args)?;
            run_to_completion("systemctl", &["enable", &a.unit]).await?;
            Ok(serde_json::json!({}))
        }
        AgentOp::SystemctlDisable => {
            let a: SystemctlUnitArgs = parse_args(args)?;
            run_to_completion("systemctl", &["disable", &a.unit]).await?;
            Ok(serde_json::json!({}))
        }
        AgentOp::SystemctlReloadOrRestart => {
            let a: SystemctlUnitArgs = parse_args(args)?;
            run_to_completion("systemctl", &["reload-or-restart", &a.unit]).await?;
            Ok(serde_json::json!({}))
        }

        AgentOp::DockerComposePs => {
            let a: DockerComposeArgs = parse_args(args)?;
            let dir = require_under_allowed(config, &a.project_dir)?;
            let out = run_to_completion(
                "docker",
                &["compose", "--project-directory", &dir.to_string_lossy(), "ps"],
            )
            .await?;
            Ok(serde_json::json!({ "output": out }))
        }

        op if op.is_streaming() => {
            bail!("{op:?} is a streaming op, not dispatchable as JSON")
        }
        other => bail!("unhandled non-streaming op {other:?}"),
    }
}

/// Streaming ops: stdout/stderr lines are forwarded on `tx` as they arrive;
/// returns the child's exit code once it terminates.
pub async fn dispatch_streaming(
    op: AgentOp,
    args: serde_json::Value,
    config: &AgentConfig,
    tx: mpsc::Sender<String>,
) -> Result<i32> {
    match op {
        AgentOp::BtrfsScrubStart => {
            let a: BtrfsScrubArgs = parse_args(args)?;
            run_streaming("btrfs", &["scrub", "start", "-B", &a.mountpoint], tx).await
        }
        AgentOp::BtrfsBalanceStart => {
            let a: BtrfsBalanceArgs = parse_args(args)?;
            run_streaming("btrfs", &["balance", "start", &a.mountpoint], tx).await
        }
        AgentOp::BtrfsReplaceStart => {
            let a: BtrfsReplaceArgs = parse_args(args)?;
            run_streaming(
                "btrfs",
                &[
                    "replace",
                    "start",
                    "-B",
                    &a.old_device,
                    &a.new_device,
                    &a.mountpoint,
                ],
                tx,
            )
            .await
        }
        AgentOp::BtrfsMkfs => {
            let a: BtrfsMkfsArgs = parse_args(args)?;
            let mut cmd_args: Vec<&str> = vec!["-L", &a.label, "-d", &a.raid, "-m", &a.raid];
            for device in &a.devices {
                cmd_args.push(device);
            }
            run_streaming("mkfs.btrfs", &cmd_args, tx).await
        }
        AgentOp::BtrfsSend => {
            let a: BtrfsSendArgs = parse_args(args)?;
            let snapshot = require_under_allowed(config, &a.snapshot)?;
            let snapshot_str = snapshot.to_string_lossy().into_owned();
            let parent_str = match &a.parent {
                Some(parent) => Some(
                    require_under_allowed(config, parent)?
                        .to_string_lossy()
                        .into_owned(),
                ),
                None => None,
            };
            let mut cmd_args = vec!["send"];
            if let Some(parent_str) = &parent_str {
                cmd_args.push("-p");
                cmd_args.push(parent_str);
            }
            cmd_args.push(&snapshot_str);
            // destination path is where the daemon pipes the stream to
            // (a file, ssh target, or local receive); the agent just
            // produces the send stream on stdout.
            let _ = &a.dest;
            run_streaming("btrfs", &cmd_args, tx).await
        }
        AgentOp::BtrfsReceive => {
            let a: BtrfsReceiveArgs = parse_args(args)?;
            let dest = require_under_allowed(config, &a.dest)?;
            run_streaming("btrfs", &["receive", &dest.to_string_lossy()], tx).await
        }
        AgentOp::PkgInstall => {
            let a: PkgArgs = parse_args(args)?;
            let mut cmd_args = vec!["install", "-y"];
            cmd_args.extend(a.packages.iter().map(String::as_str));
            run_streaming("apt-get", &cmd_args, tx).await
        }
        AgentOp::PkgRemove => {
            let a: PkgArgs = parse_args(args)?;
            let mut cmd_args = vec!["remove", "-y"];
            cmd_args.extend(a.packages.iter().map(String::as_str));
            run_streaming("apt-get", &cmd_args, tx).await
        }
        AgentOp::DockerComposeUp => {
            let a: DockerComposeArgs = parse_args(args)?;
            let dir = require_under_allowed(config, &a.project_dir)?;
            let dir_str = dir.to_string_lossy().into_owned();
            run_streaming(
                "docker",
                &["compose", "--project-directory", &dir_str, "up", "-d"],
                tx,
            )
            .await
        }
        AgentOp::DockerComposeDown => {
            let a: DockerComposeArgs = parse_args(args)?;
            let dir = require_under_allowed(config, &a.project_dir)?;
            let dir_str = dir.to_string_lossy().into_owned();
            run_streaming(
                "docker",
                &["compose", "--project-directory", &dir_str, "down"],
                tx,
            )
            .await
        }
        other => bail!("unhandled streaming op {other:?}"),
    }
}

async fn apply_acl_entries(path: &Path, entries: &[AclEntry]) -> Result<()> {
    for entry in entries {
        let spec = if entry.default {
            format!("default:{}:{}", entry.principal, entry.perms)
        } else {
            format!("{}:{}", entry.principal, entry.perms)
        };
        run_to_completion("setfacl", &["-m", &spec, &path.to_string_lossy()]).await?;
    }
    Ok(())
}

fn smb_fragment_path(config: &AgentConfig, name: &str) -> Result<PathBuf> {
    fragment_path(config, "/etc/samba/smb.conf.d", name, "conf")
}

fn nfs_fragment_path(config: &AgentConfig, name: &str) -> Result<PathBuf> {
    fragment_path(config, "/etc/exports.d", name, "exports")
}

fn avahi_fragment_path(config: &AgentConfig, name: &str) -> Result<PathBuf> {
    fragment_path(config, "/etc/avahi/services", name, "service")
}

fn fragment_path(config: &AgentConfig, dir: &str, name: &str, ext: &str) -> Result<PathBuf> {
    if name.contains('/') || name.contains("..") {
        bail!("invalid fragment name {name}");
    }
    let candidate = Path::new(dir).join(format!("{name}.{ext}"));
    config
        .allowed_path_prefixes
        .iter()
        .find(|prefix| prefix.as_path() == Path::new(dir))
        .ok_or_else(|| anyhow!("{dir} is not an allowed prefix"))?;
    Ok(candidate)
}

fn nftables_path(config: &AgentConfig) -> Result<PathBuf> {
    let path = Path::new("/etc/nftables.conf");
    config
        .allowed_path_prefixes
        .iter()
        .find(|prefix| prefix.as_path() == path)
        .ok_or_else(|| anyhow!("/etc/nftables.conf is not an allowed prefix"))?;
    Ok(path.to_path_buf())
}
