use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use jiff::Timestamp;
use uuid::Uuid;

use shared::model::tx::{StepStatus, Tx};

use crate::client::AgentClient;

const TX_FILE_MODE: u32 = 0o640;

pub fn tx_path(state_dir: &Path, id: Uuid) -> PathBuf {
    state_dir.join("tx").join(format!("{id}.json"))
}

/// Persists `tx` under its per-tx coarse lock. Every state transition
/// (start, each step enter/leave, finish) calls this so a restart can
/// reconcile from whatever was last durably written.
pub fn save_tx(state_dir: &Path, tx: &Tx) -> Result<()> {
    let path = tx_path(state_dir, tx.id);
    fsatomic::with_lock(&path, || {
        fsatomic::save_json(&path, tx, TX_FILE_MODE)
    })
}

pub fn load_tx(state_dir: &Path, id: Uuid) -> Result<Option<Tx>> {
    let path = tx_path(state_dir, id);
    fsatomic::load_json(&path)
}

pub fn list_tx_ids(state_dir: &Path) -> Result<Vec<Uuid>> {
    let dir = state_dir.join("tx");
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut ids = Vec::new();
    for entry in std::fs::read_dir(&dir).with_context(|| format!("reading {}", dir.display()))? {
        let entry = entry?;
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        if let Some(stem) = path.file_stem().and_then(|s| s.to_str())
            && let Ok(id) = stem.parse::<Uuid>()
        {
            ids.push(id);
        }
    }
    Ok(ids)
}

/// Loads every persisted tx and marks any step observed `running` as
/// `error("interrupted")`, closing out the transaction as failed, then
/// replays the compensation of every step that had already completed
/// before that point, in reverse order, through `agent`. Called once at
/// `Engine::new` before any new work is accepted, satisfying the
/// restart-reconciliation rule: an interrupted step must never be resumed
/// silently, and whatever it left applied must not be left uncompensated.
pub async fn reconcile(state_dir: &Path, agent: &dyn AgentClient) -> Result<Vec<Tx>> {
    let mut reconciled = Vec::new();
    for id in list_tx_ids(state_dir)? {
        let Some(mut tx) = load_tx(state_dir, id)? else {
            continue;
        };
        if tx.is_finished() {
            continue;
        }
        let interrupted_at = tx.steps.iter().position(|s| s.status == StepStatus::Running);
        let mut touched = false;
        for step in &mut tx.steps {
            if step.status == StepStatus::Running {
                step.status = StepStatus::Error;
                step.err = Some("interrupted".to_string());
                step.finished_at = Some(now());
                touched = true;
            }
        }
        if !touched {
            continue;
        }
        tx.ok = Some(false);
        tx.error = Some("interrupted by restart".to_string());
        tx.finished_at = Some(now());
        save_tx(state_dir, &tx)?;
        tracing::warn!(tx_id = %tx.id, "reconciled interrupted transaction on restart");

        if let Some(boundary) = interrupted_at {
            run_startup_compensations(&tx, boundary, agent).await;
        }
        reconciled.push(tx);
    }
    Ok(reconciled)
}

/// Mirrors `Engine::run_compensations`: walks the steps preceding the
/// interrupted one in reverse, running the compensation of each that had
/// completed successfully. Compensation failures are logged but never
/// abort the walk.
async fn run_startup_compensations(tx: &Tx, boundary: usize, agent: &dyn AgentClient) {
    for step in tx.steps[..boundary].iter().rev() {
        if step.status != StepStatus::Ok {
            continue;
        }
        let Some(compensation) = &step.compensation else {
            continue;
        };
        match agent.call(compensation.op, compensation.args.clone()).await {
            Ok(_) => {
                tracing::info!(tx_id = %tx.id, compensation = %compensation.name, "compensated interrupted transaction on restart");
            }
            Err(err) => {
                tracing::error!(tx_id = %tx.id, compensation = %compensation.name, error = %err, "restart compensation failed");
            }
        }
    }
}

fn now() -> Timestamp {
    Timestamp::now()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::AgentClientError;
    use agentproto::AgentOp;
    use async_trait::async_trait;
    use shared::model::tx::{PersistedCompensation, TxStep};
    use std::sync::Mutex;
    use tempfile::TempDir;

    #[derive(Default)]
    struct StubClient {
        calls: Mutex<Vec<AgentOp>>,
    }

    #[async_trait]
    impl AgentClient for StubClient {
        async fn call(
            &self,
            op: AgentOp,
            _args: serde_json::Value,
        ) -> Result<serde_json::Value, AgentClientError> {
            self.calls.lock().unwrap().push(op);
            Ok(serde_json::json!({}))
        }
    }

    fn sample_tx(id: Uuid, running: bool) -> Tx {
        let mut step = TxStep::new(0, "create", "btrfs.mkfs", true);
        if running {
            step.status = StepStatus::Running;
            step.started_at = Some(now());
        }
        Tx {
            id,
            domain: "pool".into(),
            started_at: now(),
            finished_at: None,
            ok: None,
            error: None,
            steps: vec![step],
        }
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = TempDir::new().unwrap();
        let id = Uuid::new_v4();
        let tx = sample_tx(id, false);
        save_tx(dir.path(), &tx).unwrap();
        let loaded = load_tx(dir.path(), id).unwrap().unwrap();
        assert_eq!(loaded.id, id);
    }

    #[tokio::test]
    async fn reconcile_marks_running_steps_interrupted() {
        let dir = TempDir::new().unwrap();
        let id = Uuid::new_v4();
        save_tx(dir.path(), &sample_tx(id, true)).unwrap();

        let client = StubClient::default();
        let reconciled = reconcile(dir.path(), &client).await.unwrap();
        assert_eq!(reconciled.len(), 1);

        let loaded = load_tx(dir.path(), id).unwrap().unwrap();
        assert_eq!(loaded.steps[0].status, StepStatus::Error);
        assert_eq!(loaded.steps[0].err.as_deref(), Some("interrupted"));
        assert!(loaded.is_finished());
    }

    #[tokio::test]
    async fn reconcile_leaves_finished_tx_alone() {
        let dir = TempDir::new().unwrap();
        let id = Uuid::new_v4();
        let mut tx = sample_tx(id, false);
        tx.finished_at = Some(now());
        tx.ok = Some(true);
        save_tx(dir.path(), &tx).unwrap();

        let client = StubClient::default();
        let reconciled = reconcile(dir.path(), &client).await.unwrap();
        assert!(reconciled.is_empty());
    }

    #[tokio::test]
    async fn reconcile_replays_compensation_of_completed_step_before_interruption() {
        let dir = TempDir::new().unwrap();
        let id = Uuid::new_v4();

        let mut done_step = TxStep::new(0, "create-subvolume", "btrfs.subvolume.create", true)
            .with_compensation(PersistedCompensation {
                name: "delete-subvolume".into(),
                op: AgentOp::BtrfsSubvolumeDelete,
                args: serde_json::json!({"path": "/mnt/pools/tank/@data"}),
            });
        done_step.status = StepStatus::Ok;
        done_step.started_at = Some(now());
        done_step.finished_at = Some(now());

        let mut interrupted_step = TxStep::new(1, "mount-top", "btrfs.mount", false);
        interrupted_step.status = StepStatus::Running;
        interrupted_step.started_at = Some(now());

        let tx = Tx {
            id,
            domain: "pool".into(),
            started_at: now(),
            finished_at: None,
            ok: None,
            error: None,
            steps: vec![done_step, interrupted_step],
        };
        save_tx(dir.path(), &tx).unwrap();

        let client = StubClient::default();
        let reconciled = reconcile(dir.path(), &client).await.unwrap();
        assert_eq!(reconciled.len(), 1);
        assert_eq!(client.calls.lock().unwrap().as_slice(), &[AgentOp::BtrfsSubvolumeDelete]);
    }

    #[tokio::test]
    async fn reconcile_does_not_compensate_step_that_never_completed() {
        let dir = TempDir::new().unwrap();
        let id = Uuid::new_v4();

        let mut pending_step = TxStep::new(0, "create-subvolume", "btrfs.subvolume.create", true)
            .with_compensation(PersistedCompensation {
                name: "delete-subvolume".into(),
                op: AgentOp::BtrfsSubvolumeDelete,
                args: serde_json::json!({}),
            });
        pending_step.status = StepStatus::Running;
        pending_step.started_at = Some(now());

        let tx = Tx {
            id,
            domain: "pool".into(),
            started_at: now(),
            finished_at: None,
            ok: None,
            error: None,
            steps: vec![pending_step],
        };
        save_tx(dir.path(), &tx).unwrap();

        let client = StubClient::default();
        reconcile(dir.path(), &client).await.unwrap();
        assert!(client.calls.lock().unwrap().is_empty());
    }
}
