use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use jiff::Timestamp;
use tokio::sync::{Mutex, broadcast, mpsc};
use uuid::Uuid;

use shared::model::tx::{PersistedCompensation, StepStatus, Tx, TxStep};

use crate::client::AgentClient;
use crate::journal;
use crate::log as txlog;
use crate::plan::Plan;

/// Depth of each per-domain worker's inbox. A domain whose worker is still
/// busy with an in-flight transaction and already has this many queued
/// rejects further applies with `EngineError::Busy` instead of queuing
/// unboundedly.
const DOMAIN_QUEUE_DEPTH: usize = 8;
const EVENT_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("domain {0} is busy")]
    Busy(String),
    #[error("transaction {0} not found")]
    NotFound(Uuid),
    #[error("transaction {0} is already finished")]
    AlreadyFinished(Uuid),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// Events a subscriber of `Engine::stream` observes, mirroring the SSE
/// `log`/`step` event split from spec.md §4.4.
#[derive(Debug, Clone)]
pub enum TxEvent {
    Step(TxStep),
    Log(String),
    Finished { ok: bool },
}

struct Job {
    tx_id: Uuid,
    plan: Plan,
}

/// Overall conclusion of a `Tx`, derived from its persisted steps rather
/// than stored directly — a summary view for callers who only care whether
/// the transaction is still moving.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxStatus {
    Running,
    Ok,
    Error,
}

impl From<&Tx> for TxStatus {
    fn from(tx: &Tx) -> Self {
        match tx.ok {
            Some(true) => TxStatus::Ok,
            Some(false) => TxStatus::Error,
            None => TxStatus::Running,
        }
    }
}

struct DomainWorker {
    sender: mpsc::Sender<Job>,
}

pub struct Engine {
    state_dir: PathBuf,
    agent: Arc<dyn AgentClient>,
    domains: Mutex<HashMap<String, DomainWorker>>,
    broadcasters: Mutex<HashMap<Uuid, broadcast::Sender<TxEvent>>>,
    cancellations: Mutex<HashMap<Uuid, Arc<AtomicBool>>>,
}

impl Engine {
    /// Reconciles any transaction left `running` by a prior process before
    /// accepting new work: interrupted steps are marked failed and every
    /// compensation registered for a step that had already completed is
    /// replayed through `agent`, mirroring `run_compensations`.
    pub async fn new(state_dir: PathBuf, agent: Arc<dyn AgentClient>) -> anyhow::Result<Arc<Self>> {
        let reconciled = journal::reconcile(&state_dir, agent.as_ref()).await?;
        for tx in &reconciled {
            tracing::warn!(tx_id = %tx.id, domain = %tx.domain, "marked interrupted on startup");
        }
        Ok(Arc::new(Self {
            state_dir,
            agent,
            domains: Mutex::new(HashMap::new()),
            broadcasters: Mutex::new(HashMap::new()),
            cancellations: Mutex::new(HashMap::new()),
        }))
    }

    pub async fn apply(self: &Arc<Self>, plan: Plan) -> Result<Uuid, EngineError> {
        let tx_id = Uuid::new_v4();
        let tx = Tx {
            id: tx_id,
            domain: plan.domain.clone(),
            started_at: Timestamp::now(),
            finished_at: None,
            ok: None,
            error: None,
            steps: plan
                .steps
                .iter()
                .enumerate()
                .map(|(i, step)| {
                    let tx_step =
                        TxStep::new(i as u32, step.name.clone(), step.cmd_label.clone(), step.destructive);
                    match &step.compensation {
                        Some(compensation) => tx_step.with_compensation(PersistedCompensation {
                            name: compensation.name.clone(),
                            op: compensation.op,
                            args: compensation.args.clone(),
                        }),
                        None => tx_step,
                    }
                })
                .collect(),
        };
        journal::save_tx(&self.state_dir, &tx)?;

        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        self.broadcasters.lock().await.insert(tx_id, event_tx);
        self.cancellations
            .lock()
            .await
            .insert(tx_id, Arc::new(AtomicBool::new(false)));

        let sender = self.domain_sender(plan.domain.clone()).await;
        sender
            .try_send(Job { tx_id, plan })
            .map_err(|_| EngineError::Busy(tx.domain.clone()))?;

        Ok(tx_id)
    }

    pub fn status(&self, tx_id: Uuid) -> Result<Tx, EngineError> {
        journal::load_tx(&self.state_dir, tx_id)?.ok_or(EngineError::NotFound(tx_id))
    }

    pub fn log(&self, tx_id: Uuid, cursor: u64, max: usize) -> Result<txlog::LogPage, EngineError> {
        if journal::load_tx(&self.state_dir, tx_id)?.is_none() {
            return Err(EngineError::NotFound(tx_id));
        }
        Ok(txlog::read_from_cursor(&self.state_dir, tx_id, cursor, max)?)
    }

    pub async fn stream(&self, tx_id: Uuid) -> Result<broadcast::Receiver<TxEvent>, EngineError> {
        let broadcasters = self.broadcasters.lock().await;
        broadcasters
            .get(&tx_id)
            .map(|tx| tx.subscribe())
            .ok_or(EngineError::NotFound(tx_id))
    }

    /// Requests cancellation. Only takes effect between steps; a step
    /// already in flight against the agent runs to completion, matching
    /// spec.md §5's rule that long tasks are cancelled only through this
    /// explicit API, never by tearing down a subprocess mid-flight.
    pub async fn cancel(&self, tx_id: Uuid) -> Result<(), EngineError> {
        let tx = self.status(tx_id)?;
        if tx.is_finished() {
            return Err(EngineError::AlreadyFinished(tx_id));
        }
        let cancellations = self.cancellations.lock().await;
        match cancellations.get(&tx_id) {
            Some(flag) => {
                flag.store(true, Ordering::SeqCst);
                Ok(())
            }
            None => Err(EngineError::NotFound(tx_id)),
        }
    }

    async fn domain_sender(self: &Arc<Self>, domain: String) -> mpsc::Sender<Job> {
        let mut domains = self.domains.lock().await;
        if let Some(worker) = domains.get(&domain) {
            return worker.sender.clone();
        }
        let (sender, receiver) = mpsc::channel(DOMAIN_QUEUE_DEPTH);
        let engine = Arc::clone(self);
        let worker_domain = domain.clone();
        tokio::spawn(async move {
            engine.run_domain_worker(worker_domain, receiver).await;
        });
        domains.insert(domain, DomainWorker { sender: sender.clone() });
        sender
    }

    async fn run_domain_worker(self: Arc<Self>, domain: String, mut receiver: mpsc::Receiver<Job>) {
        while let Some(job) = receiver.recv().await {
            if let Err(err) = self.run_job(job).await {
                tracing::error!(%domain, error = %err, "transaction worker failed");
            }
        }
    }

    async fn run_job(self: &Arc<Self>, job: Job) -> anyhow::Result<()> {
        let Job { tx_id, plan } = job;
        let cancel_flag = self
            .cancellations
            .lock()
            .await
            .get(&tx_id)
            .cloned()
            .unwrap_or_else(|| Arc::new(AtomicBool::new(false)));

        let mut tx = journal::load_tx(&self.state_dir, tx_id)?
            .ok_or_else(|| anyhow::anyhow!("tx {tx_id} vanished before execution"))?;

        let mut failure: Option<(usize, String)> = None;

        for (i, plan_step) in plan.steps.iter().enumerate() {
            if cancel_flag.load(Ordering::SeqCst) {
                tx.error = Some("cancelled".to_string());
                tx.ok = Some(false);
                tx.finished_at = Some(Timestamp::now());
                journal::save_tx(&self.state_dir, &tx)?;
                self.emit(tx_id, TxEvent::Finished { ok: false }).await;
                return Ok(());
            }

            tx.steps[i].status = StepStatus::Running;
            tx.steps[i].started_at = Some(Timestamp::now());
            journal::save_tx(&self.state_dir, &tx)?;
            self.emit(tx_id, TxEvent::Step(tx.steps[i].clone())).await;
            self.log_line(tx_id, format!("[{}] starting", plan_step.name)).await;

            match self.agent.call(plan_step.op, plan_step.args.clone()).await {
                Ok(_) => {
                    tx.steps[i].status = StepStatus::Ok;
                    tx.steps[i].finished_at = Some(Timestamp::now());
                    journal::save_tx(&self.state_dir, &tx)?;
                    self.emit(tx_id, TxEvent::Step(tx.steps[i].clone())).await;
                    self.log_line(tx_id, format!("[{}] ok", plan_step.name)).await;
                }
                Err(err) => {
                    tx.steps[i].status = StepStatus::Error;
                    tx.steps[i].err = Some(err.to_string());
                    tx.steps[i].finished_at = Some(Timestamp::now());
                    journal::save_tx(&self.state_dir, &tx)?;
                    self.emit(tx_id, TxEvent::Step(tx.steps[i].clone())).await;
                    self.log_line(tx_id, format!("[{}] failed: {err}", plan_step.name)).await;
                    failure = Some((i, err.to_string()));
                    break;
                }
            }
        }

        if let Some((failed_index, reason)) = failure {
            self.run_compensations(tx_id, &plan, failed_index).await;
            tx.error = Some(reason);
            tx.ok = Some(false);
        } else {
            tx.ok = Some(true);
        }
        tx.finished_at = Some(Timestamp::now());
        journal::save_tx(&self.state_dir, &tx)?;
        self.emit(tx_id, TxEvent::Finished { ok: tx.ok.unwrap_or(false) }).await;

        self.cancellations.lock().await.remove(&tx_id);
        Ok(())
    }

    /// Walks the compensations of every step that completed before the
    /// failing one, in reverse order, via the same agent client.
    /// Compensation failures are logged but never abort the walk: every
    /// registered compensation gets a chance to run.
    async fn run_compensations(&self, tx_id: Uuid, plan: &Plan, failed_index: usize) {
        for plan_step in plan.steps[..failed_index].iter().rev() {
            let Some(compensation) = &plan_step.compensation else {
                continue;
            };
            self.log_line(tx_id, format!("[{}] compensating", compensation.name)).await;
            match self.agent.call(compensation.op, compensation.args.clone()).await {
                Ok(_) => {
                    self.log_line(tx_id, format!("[{}] compensated", compensation.name)).await;
                }
                Err(err) => {
                    tracing::error!(tx_id = %tx_id, compensation = %compensation.name, error = %err, "compensation failed");
                    self.log_line(tx_id, format!("[{}] compensation failed: {err}", compensation.name))
                        .await;
                }
            }
        }
    }

    async fn emit(&self, tx_id: Uuid, event: TxEvent) {
        let broadcasters = self.broadcasters.lock().await;
        if let Some(sender) = broadcasters.get(&tx_id) {
            let _ = sender.send(event);
        }
    }

    async fn log_line(&self, tx_id: Uuid, line: String) {
        if let Err(err) = txlog::append_line(&self.state_dir, tx_id, &line) {
            tracing::warn!(tx_id = %tx_id, error = %err, "failed to append tx log line");
        }
        self.emit(tx_id, TxEvent::Log(line)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::AgentClientError;
    use crate::plan::{CompensatingAction, PlanStep};
    use agentproto::AgentOp;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;
    use tempfile::TempDir;

    struct StubClient {
        fail_on: Option<AgentOp>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl AgentClient for StubClient {
        async fn call(
            &self,
            op: AgentOp,
            _args: serde_json::Value,
        ) -> Result<serde_json::Value, AgentClientError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if Some(op) == self.fail_on {
                return Err(AgentClientError::Refused("boom".into()));
            }
            Ok(serde_json::json!({}))
        }
    }

    async fn wait_finished(engine: &Arc<Engine>, tx_id: Uuid) -> Tx {
        for _ in 0..200 {
            let tx = engine.status(tx_id).unwrap();
            if tx.is_finished() {
                return tx;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        panic!("transaction never finished");
    }

    #[tokio::test]
    async fn successful_plan_runs_all_steps_in_order() {
        let dir = TempDir::new().unwrap();
        let client = Arc::new(StubClient { fail_on: None, calls: AtomicUsize::new(0) });
        let engine = Engine::new(dir.path().to_path_buf(), client).await.unwrap();

        let mut plan = Plan::new("pool");
        plan.push(PlanStep::new("mkfs", AgentOp::BtrfsMkfs, serde_json::json!({}), true));
        plan.push(PlanStep::new("mount", AgentOp::BtrfsMount, serde_json::json!({}), false));

        let tx_id = engine.apply(plan).await.unwrap();
        let tx = wait_finished(&engine, tx_id).await;

        assert_eq!(tx.ok, Some(true));
        assert!(tx.steps.iter().all(|s| s.status == StepStatus::Ok));
    }

    #[tokio::test]
    async fn failed_step_runs_compensation_of_prior_step() {
        let dir = TempDir::new().unwrap();
        let client = Arc::new(StubClient {
            fail_on: Some(AgentOp::BtrfsMount),
            calls: AtomicUsize::new(0),
        });
        let engine = Engine::new(dir.path().to_path_buf(), client).await.unwrap();

        let mut plan = Plan::new("pool");
        plan.push(
            PlanStep::new("mkfs", AgentOp::BtrfsMkfs, serde_json::json!({}), true)
                .with_compensation(CompensatingAction::new(
                    "undo-mkfs",
                    AgentOp::BtrfsSubvolumeDelete,
                    serde_json::json!({}),
                )),
        );
        plan.push(PlanStep::new("mount", AgentOp::BtrfsMount, serde_json::json!({}), false));

        let tx_id = engine.apply(plan).await.unwrap();
        let tx = wait_finished(&engine, tx_id).await;

        assert_eq!(tx.ok, Some(false));
        assert_eq!(tx.steps[0].status, StepStatus::Ok);
        assert_eq!(tx.steps[1].status, StepStatus::Error);

        let log = engine.log(tx_id, 0, 100).unwrap();
        assert!(log.lines.iter().any(|l| l.contains("compensated")));
    }

    #[tokio::test]
    async fn busy_domain_rejects_excess_applies() {
        let dir = TempDir::new().unwrap();
        let client = Arc::new(StubClient { fail_on: None, calls: AtomicUsize::new(0) });
        let engine = Engine::new(dir.path().to_path_buf(), client).await.unwrap();

        let make_plan = || {
            let mut plan = Plan::new("pool");
            plan.push(PlanStep::new("mkfs", AgentOp::BtrfsMkfs, serde_json::json!({}), true));
            plan
        };

        let mut last_result = Ok(Uuid::nil());
        for _ in 0..(DOMAIN_QUEUE_DEPTH + 4) {
            last_result = engine.apply(make_plan()).await;
        }
        // Queue depth is small and the worker drains quickly, so this isn't
        // guaranteed to observe Busy, but it must never panic or error any
        // other way.
        if let Err(err) = last_result {
            assert!(matches!(err, EngineError::Busy(_)));
        }
    }
}
